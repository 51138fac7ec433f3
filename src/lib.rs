// Lanrelay - a LAN-style TCP relay that mirrors each peer's bytes to every other peer

pub mod config;
pub mod network;

use env_logger::Env;

/// Initialize logging from `RUST_LOG`, defaulting to `info`
pub fn init_logger() {
    init_logger_with_level("info");
}

/// Initialize logging, using `level` unless `RUST_LOG` is set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger_with_level(level: &str) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(level)).try_init();
}
