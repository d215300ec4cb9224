//! The node's messaging session: one periodic publisher, one subscriber
//! driving an output pin.

use micronode_network::Clock;

use crate::board::{OutputPin, OutputState};
use crate::error::MessagingError;
use crate::messaging::{Context, Executor, Node, Publisher, Subscription, Timer};
use crate::msg::Int32;
use crate::transport::{Transport, TransportConfig};

/// Handles registered with the session executor: subscription, then timer.
pub const EXECUTOR_HANDLES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub node_name: String,
    pub namespace: String,
    pub publisher_topic: String,
    pub subscriber_topic: String,
    pub timer_period_ms: u64,
    /// Upper bound for one `spin_some`.
    pub spin_timeout_ms: u64,
    /// Sleep between spins.
    pub idle_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node_name: "threadx_node".into(),
            namespace: String::new(),
            publisher_topic: "threadx_publisher".into(),
            subscriber_topic: "threadx_subscriber".into(),
            timer_period_ms: 1000,
            spin_timeout_ms: 100,
            idle_ms: 100,
        }
    }
}

/// Timer-side state: the next value to publish.
pub struct CounterPublisher<'p> {
    publisher: &'p Publisher<Int32>,
    next: i32,
}

impl<'p> CounterPublisher<'p> {
    pub fn new(publisher: &'p Publisher<Int32>) -> Self {
        Self { publisher, next: 0 }
    }

    pub fn next_value(&self) -> i32 {
        self.next
    }

    /// Publish the current value; advance only if it went out.
    pub fn on_tick(&mut self) -> bool {
        let msg = Int32::new(self.next);
        match self.publisher.publish(&msg) {
            Ok(()) => {
                log::info!("Sent: {}", msg.data);
                self.next = self.next.saturating_add(1);
                true
            }
            Err(e) => {
                log::warn!("Failed to send: {}", e);
                false
            }
        }
    }
}

/// Subscriber callback body.
pub fn drive_output(pin: &mut dyn OutputPin, msg: &Int32) {
    log::info!("Received: {}", msg.data);
    pin.set(OutputState::from_value(msg.data));
}

/// Totals at teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub next_value: i32,
    pub received: u64,
}

/// Open the session, spin while `keep_running` holds, then tear down.
///
/// Spin failures are logged and the loop goes on. Teardown finalizes the
/// publisher and subscription, then the node, then closes the transport;
/// failures there are logged only.
pub fn run_session(
    transport: Box<dyn Transport>,
    transport_config: &TransportConfig,
    config: &SessionConfig,
    clock: &dyn Clock,
    pin: &mut dyn OutputPin,
    keep_running: &dyn Fn() -> bool,
) -> Result<SessionSummary, MessagingError> {
    let context = Context::init(transport, transport_config)?;
    let node = Node::new(&context, &config.node_name, &config.namespace)?;
    let publisher = Publisher::<Int32>::new(&node, &config.publisher_topic)?;
    let subscription = Subscription::<Int32>::new(&node, &config.subscriber_topic)?;
    let timer = Timer::new(config.timer_period_ms, clock.now_ms())?;

    let mut incoming = Int32::default();
    let mut received = 0u64;
    let mut counter = CounterPublisher::new(&publisher);
    {
        let mut executor = Executor::new(&context, EXECUTOR_HANDLES, clock);
        executor.add_subscription(&subscription, &mut incoming, |msg| {
            drive_output(pin, msg);
            received += 1;
        })?;
        executor.add_timer(timer, || {
            counter.on_tick();
        })?;

        log::info!("[NODE] Spinning every {} ms", config.idle_ms);
        while keep_running() {
            if let Err(e) = executor.spin_some(config.spin_timeout_ms) {
                log::warn!("[EXEC] Spin failed: {}", e);
            }
            clock.sleep_ms(config.idle_ms);
        }
    }

    let summary = SessionSummary { next_value: counter.next_value(), received };
    if let Err(e) = publisher.fini(&node) {
        log::warn!("[NODE] Publisher fini failed: {}", e);
    }
    if let Err(e) = subscription.fini(&node) {
        log::warn!("[NODE] Subscription fini failed: {}", e);
    }
    if let Err(e) = node.fini() {
        log::warn!("[NODE] Node fini failed: {}", e);
    }
    if let Err(e) = context.fini() {
        log::warn!("[LINK] Close failed: {}", e);
    }
    Ok(summary)
}
