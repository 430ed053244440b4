mod clock;
mod config;
mod constants;
mod error;
mod event_loop;
mod icmp;
mod iface;
mod netlink_abi;
mod packet;
mod random;
mod scheduler;

use clock::SystemClock;
use event_loop::{log_fatal, Daemon};
use random::OsRandomSource;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = match config::parse_args(std::env::args_os()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let clock = SystemClock;
    let random = OsRandomSource;

    let mut daemon = match Daemon::new(cfg, &clock, &random) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = daemon.run().await {
        log_fatal(&e);
        std::process::exit(1);
    }
}
