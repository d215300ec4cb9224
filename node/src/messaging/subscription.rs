//! Typed subscription. Frames are queued and decoded by the executor.

use std::marker::PhantomData;

use super::node::Node;
use crate::error::MessagingError;
use crate::msg::Message;

pub struct Subscription<M: Message> {
    topic: String,
    _msg: PhantomData<fn() -> M>,
}

impl<M: Message> Subscription<M> {
    pub fn new(node: &Node, topic: &str) -> Result<Self, MessagingError> {
        node.ensure_open()?;
        let topic = node.qualify(topic)?;
        log::info!("[NODE] Subscription {} ({})", topic, M::TYPE_NAME);
        Ok(Self { topic, _msg: PhantomData })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn fini(self, node: &Node) -> Result<(), MessagingError> {
        node.ensure_open()?;
        log::info!("[NODE] {} dropped subscription {}", node.name(), self.topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::Context;
    use crate::msg::Int32;
    use crate::testing::FakeTransport;
    use crate::transport::TransportConfig;

    #[test]
    fn test_fini_needs_open_link() {
        let ctx = Context::init(Box::new(FakeTransport::new()), &TransportConfig::default()).unwrap();
        let node = Node::new(&ctx, "node", "ns").unwrap();
        let first = Subscription::<Int32>::new(&node, "in").unwrap();
        let second = Subscription::<Int32>::new(&node, "in").unwrap();
        assert_eq!(first.topic(), "/ns/in");

        first.fini(&node).unwrap();
        ctx.fini().unwrap();
        assert!(matches!(second.fini(&node), Err(MessagingError::LinkClosed)));
    }
}
