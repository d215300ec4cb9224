//! Client-side messaging: context, node, publisher, subscription, timer and
//! a cooperative executor, all over one [`crate::transport::Transport`].
//!
//! Everything here is single-threaded. Handles share the transport through
//! the context's link.

mod context;
mod executor;
mod node;
mod publisher;
mod subscription;
mod timer;

pub use context::Context;
pub use executor::{Executor, DRAIN_BUDGET, QUEUE_DEPTH};
pub use node::Node;
pub use publisher::{Publisher, PUBLISH_TIMEOUT_MS};
pub use subscription::Subscription;
pub use timer::Timer;
