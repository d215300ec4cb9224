use std::process::ExitCode;

use clap::Parser;
use micronode::app;
use micronode::board::{Board, SimBoard};
use micronode::config::{Cli, NodeConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = NodeConfig::from_cli(&cli);

    let mut board = SimBoard::new();
    if let Err(e) = board.init() {
        log::error!("[BOARD] {}", e);
        return ExitCode::FAILURE;
    }
    let Some(led) = board.take_led() else {
        log::error!("[BOARD] No LED");
        return ExitCode::FAILURE;
    };

    #[cfg(target_os = "linux")]
    let worker = {
        let task_config = config.clone();
        app::define(&config, move |stop| app::micro_ros_task(task_config, led, stop))
    };
    #[cfg(not(target_os = "linux"))]
    let worker = {
        drop(led);
        log::error!("[APP] No packet driver for this host; running without a worker");
        None
    };

    app::kernel_enter(worker)
}
