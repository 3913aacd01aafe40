// src/scheduler.rs
//! Recurring search runs: hourly, daily or weekly.

use anyhow::Result;
use chrono::{Datelike, Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

use crate::app_log;
use crate::config::SchedulerConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        })
    }
}

/// Parse an `HH:MM` time of day.
pub fn parse_time(text: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|_| format!("expected a time as HH:MM, got '{}'", text))
}

/// The first slot strictly after `now`: the top of the next hour, the next
/// occurrence of `at`, or the next Monday at `at`.
pub fn next_run(now: NaiveDateTime, frequency: Frequency, at: NaiveTime) -> NaiveDateTime {
    match frequency {
        Frequency::Hourly => {
            let top_of_hour = now
                - Duration::minutes(i64::from(now.minute()))
                - Duration::seconds(i64::from(now.second()))
                - Duration::nanoseconds(i64::from(now.nanosecond()));
            top_of_hour + Duration::hours(1)
        }
        Frequency::Daily => {
            let today = now.date().and_time(at);
            if today > now {
                today
            } else {
                today + Duration::days(1)
            }
        }
        Frequency::Weekly => {
            let days_until_monday = (7 - i64::from(now.weekday().num_days_from_monday())) % 7;
            let candidate = (now.date() + Duration::days(days_until_monday)).and_time(at);
            if candidate > now {
                candidate
            } else {
                candidate + Duration::weeks(1)
            }
        }
    }
}

pub struct JobSearchScheduler {
    frequency: Frequency,
    at: NaiveTime,
    enabled: bool,
}

impl JobSearchScheduler {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        let at = parse_time(&config.time).map_err(|e| anyhow::anyhow!("scheduler.time: {}", e))?;
        Ok(Self {
            frequency: config.frequency,
            at,
            enabled: config.enabled,
        })
    }

    pub fn next_run_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        next_run(now, self.frequency, self.at)
    }

    /// Run `job` at every slot until Ctrl-C. A failing run is logged and the
    /// schedule continues.
    pub async fn run_forever<F, Fut>(&self, job: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.run_until(job, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                app_log!(error, "Unable to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run `job` at every slot until `shutdown` resolves, whether the loop is
    /// waiting for the next slot or in the middle of a run.
    pub async fn run_until<F, Fut, S>(&self, mut job: F, shutdown: S) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
        S: Future<Output = ()>,
    {
        if !self.enabled {
            app_log!(info, "Scheduler is disabled in the configuration");
            return Ok(());
        }

        tokio::pin!(shutdown);
        app_log!(info, "Scheduler started: {} at {}", self.frequency, self.at.format("%H:%M"));
        loop {
            let now = Local::now().naive_local();
            let next = self.next_run_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            app_log!(info, "Next job search scheduled for {}", next.format("%Y-%m-%d %H:%M"));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    app_log!(info, "Scheduler stopped by user");
                    return Ok(());
                }
            }

            app_log!(info, "Running scheduled job search");
            tokio::select! {
                result = job() => {
                    if let Err(e) = result {
                        app_log!(error, "Scheduled job search failed: {:#}", e);
                    }
                }
                _ = &mut shutdown => {
                    app_log!(info, "Scheduler stopped by user, current search cancelled");
                    return Ok(());
                }
            }
        }
    }
}
