// src/notify.rs
//! Digest notifications after a search run.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::config::AgentConfig;
use crate::core::FsOps;
use crate::types::ScoredListing;

const DIGEST_SIZE: usize = 10;
const SENDER: &str = "job-scout@localhost";

#[derive(Debug, Clone)]
pub struct Digest {
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Local>,
}

impl Digest {
    /// `None` when there is nothing to report.
    pub fn from_listings(listings: &[ScoredListing], created_at: DateTime<Local>) -> Option<Self> {
        if listings.is_empty() {
            return None;
        }

        let subject = format!(
            "Job search: {} matching listings ({})",
            listings.len(),
            created_at.format("%Y-%m-%d %H:%M")
        );

        let mut body = String::new();
        let _ = writeln!(body, "Top {} results:\n", listings.len().min(DIGEST_SIZE));
        for (i, scored) in listings.iter().take(DIGEST_SIZE).enumerate() {
            let l = &scored.listing;
            let _ = writeln!(body, "{}. {} - {} [{}]", i + 1, l.title, l.company, l.platform);
            if !l.salary.is_empty() {
                let _ = writeln!(body, "   Pay: {}", l.salary);
            }
            if !scored.matched_skills.is_empty() {
                let _ = writeln!(body, "   Skills: {}", scored.matched_skills.join(", "));
            }
            let _ = writeln!(body, "   Score: {}  Key: {}", scored.score, l.key());
            let _ = writeln!(body, "   {}\n", l.url);
        }
        if listings.len() > DIGEST_SIZE {
            let _ = writeln!(body, "...and {} more in the saved reports.", listings.len() - DIGEST_SIZE);
        }

        Some(Self {
            subject,
            body,
            created_at,
        })
    }

    /// RFC 822 style message text.
    pub fn to_message(&self, to: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            SENDER,
            to,
            self.subject,
            self.created_at.to_rfc2822(),
            self.body.replace('\n', "\r\n")
        )
    }
}

pub struct Notifier {
    email_to: Option<String>,
    desktop: bool,
    outbox_dir: PathBuf,
}

impl Notifier {
    pub fn from_config(config: &AgentConfig) -> Self {
        let email = &config.notifications.email;
        let email_to = if email.enabled {
            match email.address.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
                Some(address) => Some(address.to_string()),
                None => {
                    app_log!(warn, "Email notifications enabled without an address, skipping email");
                    None
                }
            }
        } else {
            None
        };

        Self {
            email_to,
            desktop: config.notifications.desktop.enabled,
            outbox_dir: config.paths.outbox_dir(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.email_to.is_some() || self.desktop
    }

    /// Deliver on every enabled channel. Channel failures are logged only.
    pub async fn send(&self, digest: &Digest) {
        if let Some(to) = &self.email_to {
            match write_outbox(&self.outbox_dir, to, digest).await {
                Ok(path) => app_log!(info, "Email digest for {} queued at {}", to, path.display()),
                Err(e) => app_log!(error, "Failed to queue email digest: {:#}", e),
            }
        }
        if self.desktop {
            app_log!(info, "Notification: {}", digest.subject);
        }
    }
}

async fn write_outbox(outbox_dir: &Path, to: &str, digest: &Digest) -> Result<PathBuf> {
    let path = outbox_dir.join(format!(
        "digest_{}.eml",
        digest.created_at.format("%Y%m%d_%H%M%S")
    ));
    FsOps::write_file_safe(&path, &digest.to_message(to)).await?;
    Ok(path)
}
