//! Process entry points: worker thread, node task and the idle "kernel".

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use micronode_network::{
    BringUp, CancelToken, Clock, NetBackend, NetworkDriver, Ready, SmoltcpBackend,
};

use crate::board::OutputPin;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::session::{run_session, SessionSummary};
use crate::transport::{StackUdpTransport, Transport};

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep_ms(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// The running messaging thread.
pub struct Worker {
    handle: JoinHandle<()>,
    stop: CancelToken,
}

impl Worker {
    pub fn name(&self) -> Option<&str> {
        self.handle.thread().name()
    }

    /// Ask the task to wind down. It notices at its next wait.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

/// Start `task` on the worker thread and return at once.
///
/// If the thread cannot be created this logs, waits
/// `spawn_failure_delay_ms` and returns `None`; the process carries on
/// without a worker.
pub fn define<F>(config: &NodeConfig, task: F) -> Option<Worker>
where
    F: FnOnce(CancelToken) + Send + 'static,
{
    let stop = CancelToken::new();
    let token = stop.clone();
    let spawned = thread::Builder::new()
        .name(config.thread_name.clone())
        .stack_size(config.thread_stack_size)
        .spawn(move || task(token));

    match spawned {
        Ok(handle) => {
            log::info!("[APP] Started '{}'", config.thread_name);
            Some(Worker { handle, stop })
        }
        Err(e) => {
            log::error!("Thread creation failed: {}", e);
            thread::sleep(Duration::from_millis(config.spawn_failure_delay_ms));
            None
        }
    }
}

/// Hand the process over to the worker. Never returns.
pub fn kernel_enter(worker: Option<Worker>) -> ! {
    if let Some(worker) = worker {
        let name = worker.name().unwrap_or("worker").to_owned();
        match worker.join() {
            Ok(()) => log::warn!("[APP] '{}' exited", name),
            Err(_) => log::error!("[APP] '{}' panicked", name),
        }
    }
    loop {
        thread::park();
    }
}

/// Bring the network up on `backend`, hand the ready stack to `connect` for
/// a transport, then run the messaging session until `stop` fires.
///
/// Nothing messaging-related starts unless bring-up succeeds.
pub fn serve<B, T, F>(
    backend: &mut B,
    config: &NodeConfig,
    clock: &dyn Clock,
    pin: &mut dyn OutputPin,
    stop: &CancelToken,
    connect: F,
) -> Result<SessionSummary, NodeError>
where
    B: NetBackend,
    T: Transport + 'static,
    F: FnOnce(Ready<B>) -> T,
{
    let bring_up = BringUp::new(backend, config.bring_up.clone()).with_cancel(stop.clone());
    #[cfg(feature = "tls")]
    let security = crate::security::RustlsSecurity;
    #[cfg(feature = "tls")]
    let bring_up = if config.tls { bring_up.with_security(&security) } else { bring_up };
    #[cfg(not(feature = "tls"))]
    if config.tls {
        log::warn!("[TLS] Built without TLS support, skipping");
    }

    let ready = bring_up.run(clock)?;
    let lease = ready.lease();
    log::info!("[NET] {}/{} via {:?}", lease.address, lease.prefix_len, lease.router());

    let transport = connect(ready);
    let summary = run_session(
        Box::new(transport),
        &config.transport,
        &config.session,
        clock,
        pin,
        &|| !stop.is_cancelled(),
    )?;
    Ok(summary)
}

/// [`serve`] over a smoltcp stack on `driver`, speaking UDP to the agent.
///
/// `region` backs the packet pool; it must hold
/// `config.bring_up.pool.region_size()` bytes.
pub fn run_node<D, C>(
    driver: D,
    region: &'static mut [u8],
    config: &NodeConfig,
    clock: C,
    pin: &mut dyn OutputPin,
    stop: &CancelToken,
) -> Result<SessionSummary, NodeError>
where
    D: NetworkDriver + 'static,
    C: Clock + Clone + 'static,
{
    let mut backend = SmoltcpBackend::new(driver, region);
    let port = config.local_port;
    let transport_clock = clock.clone();
    serve(&mut backend, config, &clock, pin, stop, move |ready| {
        StackUdpTransport::new(ready, transport_clock, port)
    })
}

/// The worker body used by the binary: TAP driver, bring-up, session.
#[cfg(target_os = "linux")]
pub fn micro_ros_task(config: NodeConfig, mut led: Box<dyn OutputPin + Send>, stop: CancelToken) {
    let driver = match crate::tap::TapDriver::open(&config.tap, config.mac) {
        Ok(driver) => driver,
        Err(e) => {
            log::error!("[TAP] Cannot open {}: {}", config.tap, e);
            return;
        }
    };
    let region = Vec::leak(vec![0u8; config.bring_up.pool.region_size()]);

    match run_node(driver, region, &config, SystemClock::new(), led.as_mut(), &stop) {
        Ok(summary) => log::info!("[APP] Session ended after {} messages", summary.next_value),
        Err(e) => log::error!("[APP] {}", e),
    }
}
