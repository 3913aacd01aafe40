// src/lib.rs
//! Job search agent: queries job and freelance platforms, filters and ranks
//! the results, prepares cover letters and tracks applications in SQLite.

/// `app_log!(info, "...", args)`: log through `tracing` at the named level.
#[macro_export]
macro_rules! app_log {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!($($arg)+)
    };
}

pub mod agent;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod letters;
pub mod notify;
pub mod platforms;
pub mod reports;
pub mod scheduler;
pub mod search;
pub mod tracker;
pub mod types;

pub use agent::{JobSearchAgent, SearchOutcome};
pub use config::{load_config, AgentConfig};
pub use tracker::Tracker;

#[cfg(test)]
mod tests {
    #[test]
    fn test_app_log_forwards_level_fields_and_arguments() {
        let count = 3;
        app_log!(info, "Found {} listings", count);
        app_log!(warn, platform = "indeed", "Slow response after {}s", 12);
        app_log!(debug, "plain message");
    }
}
