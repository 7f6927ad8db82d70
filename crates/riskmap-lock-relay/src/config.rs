use std::time::Duration;

use clap::Parser;

/// Upper bound for `--lock-duration-ms`: one day.
const MAX_LOCK_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration for the riskmap lock relay.
#[derive(Parser, Debug, Clone)]
#[command(name = "riskmap-lock-relay")]
#[command(about = "WebSocket relay for riskmap collaborative-editing locks")]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "RELAY_HOST")]
    pub host: String,

    /// Port to bind to
    #[arg(long, default_value = "3000", env = "RELAY_PORT")]
    pub port: u16,

    /// How long an editing lock lasts, in milliseconds (at most one day)
    #[arg(
        long,
        default_value = "30000",
        env = "LOCK_DURATION_MS",
        value_parser = clap::value_parser!(u64).range(0..=MAX_LOCK_DURATION_MS)
    )]
    pub lock_duration_ms: u64,

    /// Interval between expired-lock sweeps, in milliseconds
    #[arg(long, default_value = "60000", env = "SWEEP_INTERVAL_MS")]
    pub sweep_interval_ms: u64,

    /// Send the current locks to each newly connected client
    #[arg(long, default_value_t = false, env = "REPLAY_LOCKS_ON_CONNECT")]
    pub replay_locks_on_connect: bool,
}

impl Config {
    pub fn lock_duration(&self) -> Duration {
        Duration::from_millis(self.lock_duration_ms)
    }

    /// Sweep interval, clamped to at least one millisecond.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}
