//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::state::DispatchSettings;

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "night-timer")]
#[command(about = "A recurring-reminder daemon with day/night aware notifications")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// SQLite database holding the timers
    #[arg(long, default_value = "timers.db")]
    pub db: PathBuf,

    /// Minimum repeat interval of an armed wakeup, in minutes
    #[arg(long, default_value = "5")]
    pub repeat_guard_minutes: u64,

    /// How long a firing waits for an open edit session to claim it
    #[arg(long, default_value = "500")]
    pub claim_wait_ms: u64,

    /// Delay after the last edit before an edit session saves
    #[arg(long, default_value = "1000")]
    pub save_debounce_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            repeat_guard: Duration::from_secs(self.repeat_guard_minutes.max(1) * 60),
            claim_wait: Duration::from_millis(self.claim_wait_ms),
            save_debounce: Duration::from_millis(self.save_debounce_ms),
        }
    }
}
