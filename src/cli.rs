// src/cli.rs
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::agent::JobSearchAgent;
use crate::config::{load_config, write_default_config, AgentConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
use crate::core::{Database, LetterEngine};
use crate::core::template_engine::BUILTIN_TEMPLATE_ID;
use crate::error::TrackerError;
use crate::letters::LetterWriter;
use crate::notify::{Digest, Notifier};
use crate::platforms::{build_platform, JobPlatform};
use crate::reports::{export_applications, render_summary, save_results};
use crate::scheduler::JobSearchScheduler;
use crate::search::Scorer;
use crate::tracker::Tracker;
use crate::types::{ApplicationStatus, Listing, ListingKey, ScoredListing, Transition};

#[derive(Parser)]
#[command(name = "job-scout")]
#[command(about = "Search job and freelance platforms, prepare cover letters and track applications")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file
    #[arg(long, short, global = true, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the default configuration file
    Init,
    /// Run one search across all enabled platforms
    Search {
        /// Do not write CSV/JSON reports
        #[arg(long)]
        no_save: bool,
    },
    /// Run searches on the configured schedule until interrupted
    Schedule,
    /// Generate a cover letter for a stored listing (platform:id)
    Letter {
        key: String,
        /// Template id, or "builtin"
        #[arg(long)]
        template: Option<String>,
    },
    /// Mark a stored listing as applied
    Apply {
        key: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Move an application to a later status
    Status {
        key: String,
        status: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// List tracked applications
    Applications {
        #[arg(long)]
        status: Option<String>,
        /// Write the list as CSV to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Show the status history of an application
    History { key: String },
    /// List available cover letter templates
    Templates,
}

pub async fn handle_command(cli: Cli) -> Result<()> {
    if let Command::Init = cli.command {
        return init_config(&cli.config);
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Init => Ok(()),
        Command::Search { no_save } => run_search(&config, !no_save).await,
        Command::Schedule => {
            let scheduler = JobSearchScheduler::from_config(&config.scheduler)?;
            scheduler.run_forever(|| run_search(&config, true)).await
        }
        Command::Letter { key, template } => {
            let key: ListingKey = key.parse()?;
            let tracker = open_tracker(&config).await?;
            generate_letter(&config, &tracker, &key, template.as_deref()).await
        }
        Command::Apply { key, note } => {
            let key: ListingKey = key.parse()?;
            let tracker = open_tracker(&config).await?;
            let application = tracker
                .record_application(&key, ApplicationStatus::Applied, None, note.as_deref())
                .await?;
            app_log!(info, "✅ {} is now {}", application.key(), application.status);
            Ok(())
        }
        Command::Status { key, status, note } => {
            let key: ListingKey = key.parse()?;
            let status: ApplicationStatus = status.parse()?;
            let tracker = open_tracker(&config).await?;
            match tracker.transition(&key, status, note.as_deref()).await? {
                (application, Transition::Advanced) => {
                    app_log!(info, "✅ {} moved to {}", application.key(), application.status)
                }
                (application, Transition::Unchanged) => {
                    app_log!(info, "{} is already {}", application.key(), application.status)
                }
            }
            Ok(())
        }
        Command::Applications { status, export } => {
            let status = status.map(|s| s.parse::<ApplicationStatus>()).transpose()?;
            let tracker = open_tracker(&config).await?;
            let applications = tracker.list_applications(status).await?;

            if applications.is_empty() {
                app_log!(info, "No applications tracked");
            } else {
                println!(
                    "{:<28} {:<14} {:<40} {:<25} {:<16}",
                    "Key", "Status", "Title", "Company", "Updated"
                );
                println!("{}", "-".repeat(126));
                for app in &applications {
                    println!(
                        "{:<28} {:<14} {:<40} {:<25} {:<16}",
                        truncate(&app.key(), 28),
                        app.status.as_str(),
                        truncate(&app.title, 40),
                        truncate(&app.company, 25),
                        app.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                    );
                }
            }

            if let Some(path) = export {
                export_applications(&applications, &path).await?;
            }
            Ok(())
        }
        Command::History { key } => {
            let key: ListingKey = key.parse()?;
            let tracker = open_tracker(&config).await?;
            for event in tracker.history(&key).await? {
                println!(
                    "{}  {:<14} {}",
                    event.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    event.status.as_str(),
                    event.note.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Templates => {
            let engine = LetterEngine::new(config.paths.templates_dir.clone())?;
            for template in engine.templates() {
                let platforms = if template.manifest.platforms.is_empty() {
                    "all platforms".to_string()
                } else {
                    template.manifest.platforms.join(", ")
                };
                println!(
                    "{:<20} {:<30} {}",
                    template.id, template.manifest.name, platforms
                );
                if let Some(description) = &template.manifest.description {
                    println!("{:<20} {}", "", description);
                }
            }
            println!("{:<20} {:<30} all platforms", BUILTIN_TEMPLATE_ID, "Built-in letter");
            Ok(())
        }
    }
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        app_log!(warn, "Configuration already exists at {}, leaving it untouched", path.display());
        return Ok(());
    }
    write_default_config(path)?;
    app_log!(info, "✅ Edit {} with your profile, then run `job-scout search`", path.display());
    Ok(())
}

async fn open_tracker(config: &AgentConfig) -> Result<Tracker> {
    let db = Database::new(&config.paths.database_path).await?;
    db.health_check().await?;
    Ok(Tracker::new(db, config.application.daily_application_limit))
}

/// One full run: search, reports, storage, notifications and optional
/// application preparation.
pub async fn run_search(config: &AgentConfig, save: bool) -> Result<()> {
    let agent = JobSearchAgent::from_config(config);
    app_log!(info, "Starting job search on: {}", agent.platform_names().join(", "));
    let outcome = agent.run().await;

    if save {
        save_results(&outcome.listings, &config.paths.reports_dir, &outcome.timestamp()).await?;
    }
    println!("{}", render_summary(&outcome.listings));

    let tracker = open_tracker(config).await?;
    let new = tracker.upsert_listings(&outcome.listings).await?;
    app_log!(info, "{} new listings stored", new);

    let notifier = Notifier::from_config(config);
    if notifier.is_enabled() {
        if let Some(digest) = Digest::from_listings(&outcome.listings, outcome.started_at) {
            notifier.send(&digest).await;
        }
    }

    if config.application.auto_apply {
        let prepared = auto_apply(config, &tracker, &outcome.listings).await?;
        app_log!(info, "Prepared {} applications", prepared);
    }
    Ok(())
}

/// Write letters and `prepared` records for the best listings not tracked
/// yet, up to the remaining daily limit.
pub async fn auto_apply(
    config: &AgentConfig,
    tracker: &Tracker,
    listings: &[ScoredListing],
) -> Result<u32> {
    let remaining = tracker.remaining_today().await?;
    if remaining == 0 {
        app_log!(info, "Daily application limit reached, no applications prepared");
        return Ok(0);
    }

    let engine = LetterEngine::new(config.paths.templates_dir.clone())?;
    let writer = LetterWriter::new(&engine, config);
    let today = Local::now().date_naive();
    let mut prepared = 0;

    for scored in listings
        .iter()
        .filter(|s| s.score >= config.application.min_score)
    {
        if prepared >= remaining {
            break;
        }
        let key = scored.listing.key();
        if tracker.find_application(&key).await?.is_some() {
            continue;
        }

        let letter = match writer.write(scored, None, today).await {
            Ok(letter) => letter,
            Err(e) => {
                app_log!(error, "Failed to write cover letter for {}: {:#}", key, e);
                continue;
            }
        };
        let path = letter.path.to_string_lossy().into_owned();
        match tracker
            .record_application(&key, ApplicationStatus::Prepared, Some(path.as_str()), None)
            .await
        {
            Ok(_) => prepared += 1,
            Err(TrackerError::DailyLimitReached(limit)) => {
                app_log!(info, "Daily application limit of {} reached", limit);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(prepared)
}

/// Full details for a listing stored without a description, or `None` when
/// the platform cannot provide them.
async fn refresh_listing(platform: &dyn JobPlatform, stored: &Listing) -> Option<Listing> {
    match platform.job_details(&stored.id).await {
        Ok(mut fresh) => {
            fresh.date_posted = fresh.date_posted.or(stored.date_posted);
            app_log!(info, "Fetched details for {}", stored.key());
            Some(fresh)
        }
        Err(e) => {
            app_log!(warn, "Could not fetch details for {}: {}", stored.key(), e);
            None
        }
    }
}

fn connector_for(config: &AgentConfig, name: &str) -> Option<Box<dyn JobPlatform>> {
    let settings = config.platforms.get(name).cloned().unwrap_or_default();
    match build_platform(name, &settings) {
        Ok(connector) => connector,
        Err(e) => {
            app_log!(warn, "Failed to initialize platform {}: {}", name, e);
            None
        }
    }
}

async fn generate_letter(
    config: &AgentConfig,
    tracker: &Tracker,
    key: &ListingKey,
    template: Option<&str>,
) -> Result<()> {
    let stored = tracker
        .find_listing(key)
        .await?
        .with_context(|| format!("Unknown listing {}, run a search first", key))?;

    let refreshed = if stored.description.trim().is_empty() {
        match connector_for(config, &stored.platform) {
            Some(platform) => refresh_listing(platform.as_ref(), &stored).await,
            None => None,
        }
    } else {
        None
    };
    let is_refreshed = refreshed.is_some();
    let listing = refreshed.unwrap_or(stored);

    let today = Local::now().date_naive();
    let scored = Scorer::from_config(config).score(listing, today);
    if is_refreshed {
        tracker.upsert_listings(std::slice::from_ref(&scored)).await?;
    }

    let engine = LetterEngine::new(config.paths.templates_dir.clone())?;
    let letter = LetterWriter::new(&engine, config)
        .write(&scored, template, today)
        .await?;

    if let Some(application) = tracker.find_application(key).await? {
        let path = letter.path.to_string_lossy().into_owned();
        tracker
            .record_application(key, application.status, Some(path.as_str()), None)
            .await?;
    }

    app_log!(info, "✅ Cover letter written to {}", letter.path.display());
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
