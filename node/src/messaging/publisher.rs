//! Typed publisher.

use std::marker::PhantomData;

use super::context::SharedLink;
use super::node::Node;
use crate::error::{MessagingError, PublishError};
use crate::msg::Message;
use crate::wire::Frame;

/// How long one publish may wait for the transport.
pub const PUBLISH_TIMEOUT_MS: u64 = 100;

pub struct Publisher<M: Message> {
    topic: String,
    link: SharedLink,
    _msg: PhantomData<fn(&M)>,
}

impl<M: Message> Publisher<M> {
    pub fn new(node: &Node, topic: &str) -> Result<Self, MessagingError> {
        node.ensure_open()?;
        let topic = node.qualify(topic)?;
        log::info!("[NODE] Publisher {} ({})", topic, M::TYPE_NAME);
        Ok(Self { topic, link: node.link(), _msg: PhantomData })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Send one message as a single frame.
    pub fn publish(&self, msg: &M) -> Result<(), PublishError> {
        let mut payload = Vec::new();
        msg.encode(&mut payload);
        self.link
            .borrow_mut()
            .send(&Frame::new(&self.topic, &payload), PUBLISH_TIMEOUT_MS)
    }

    pub fn fini(self, node: &Node) -> Result<(), MessagingError> {
        node.ensure_open()?;
        log::info!("[NODE] {} dropped publisher {}", node.name(), self.topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::messaging::Context;
    use crate::msg::Int32;
    use crate::testing::FakeTransport;
    use crate::transport::TransportConfig;

    #[test]
    fn test_publish_frames() {
        let transport = FakeTransport::new();
        let ctx = Context::init(Box::new(transport.clone()), &TransportConfig::default()).unwrap();
        let node = Node::new(&ctx, "node", "").unwrap();
        let publisher = Publisher::<Int32>::new(&node, "out").unwrap();

        publisher.publish(&Int32::new(3)).unwrap();
        publisher.publish(&Int32::new(4)).unwrap();
        assert_eq!(transport.published::<Int32>("/out"), [Int32::new(3), Int32::new(4)]);
    }

    #[test]
    fn test_publish_errors() {
        let transport = FakeTransport::new();
        let ctx = Context::init(Box::new(transport.clone()), &TransportConfig::default()).unwrap();
        let node = Node::new(&ctx, "node", "").unwrap();
        let publisher = Publisher::<Int32>::new(&node, "out").unwrap();

        transport.log().failing_writes = 1;
        assert!(matches!(publisher.publish(&Int32::new(1)), Err(PublishError::Transport(_))));

        transport.log().short_writes = true;
        assert!(matches!(
            publisher.publish(&Int32::new(1)),
            Err(PublishError::ShortWrite { written: 10, len: 11 })
        ));

        ctx.fini().unwrap();
        assert!(matches!(
            publisher.publish(&Int32::new(1)),
            Err(PublishError::Transport(TransportError::NotOpen))
        ));
        assert!(publisher.fini(&node).is_err());
    }
}
