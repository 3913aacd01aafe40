// src/reports.rs
//! CSV/JSON result files, the console summary and application exports.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::core::FsOps;
use crate::types::{Application, ScoredListing};

const RECENT_IN_SUMMARY: usize = 5;

/// Flat CSV row; list fields are joined with `; `.
#[derive(Debug, Serialize)]
struct ListingRecord<'a> {
    platform: &'a str,
    id: &'a str,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    url: &'a str,
    salary: &'a str,
    job_type: &'a str,
    experience_level: &'a str,
    date_posted: String,
    is_remote: bool,
    skills: String,
    score: u32,
    matched_skills: String,
    matched_keywords: String,
}

impl<'a> From<&'a ScoredListing> for ListingRecord<'a> {
    fn from(scored: &'a ScoredListing) -> Self {
        let l = &scored.listing;
        Self {
            platform: &l.platform,
            id: &l.id,
            title: &l.title,
            company: &l.company,
            location: &l.location,
            url: &l.url,
            salary: &l.salary,
            job_type: &l.job_type,
            experience_level: &l.experience_level,
            date_posted: l.date_posted.map(|d| d.to_string()).unwrap_or_default(),
            is_remote: l.is_remote,
            skills: l.skills.join("; "),
            score: scored.score,
            matched_skills: scored.matched_skills.join("; "),
            matched_keywords: scored.matched_keywords.join("; "),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApplicationRecord<'a> {
    key: String,
    platform: &'a str,
    listing_id: &'a str,
    title: &'a str,
    company: &'a str,
    status: &'static str,
    cover_letter_path: &'a str,
    notes: &'a str,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone)]
pub struct SavedReports {
    pub csv: PathBuf,
    pub json: PathBuf,
}

fn to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).context("Failed to write CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Write `job_search_<timestamp>.csv` and `.json`. Nothing is written for an
/// empty result set.
pub async fn save_results(
    listings: &[ScoredListing],
    reports_dir: &Path,
    timestamp: &str,
) -> Result<Option<SavedReports>> {
    if listings.is_empty() {
        app_log!(warn, "No jobs to save");
        return Ok(None);
    }

    let csv_path = reports_dir.join(format!("job_search_{}.csv", timestamp));
    let json_path = reports_dir.join(format!("job_search_{}.json", timestamp));

    let csv = to_csv(listings.iter().map(ListingRecord::from))?;
    FsOps::write_file_safe(&csv_path, &csv).await?;

    let json = serde_json::to_string_pretty(listings).context("Failed to serialize results")?;
    FsOps::write_file_safe(&json_path, &json).await?;

    app_log!(
        info,
        "Saved {} jobs to {} and {}",
        listings.len(),
        csv_path.display(),
        json_path.display()
    );
    Ok(Some(SavedReports {
        csv: csv_path,
        json: json_path,
    }))
}

fn or_unspecified(value: &str) -> &str {
    if value.trim().is_empty() {
        "Unspecified"
    } else {
        value
    }
}

/// Human readable summary of a result set.
pub fn render_summary(listings: &[ScoredListing]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job Search Results Summary");
    let _ = writeln!(out, "==========================");
    let _ = writeln!(out, "Total jobs found: {}", listings.len());
    if listings.is_empty() {
        return out;
    }

    let mut by_platform: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for scored in listings {
        *by_platform.entry(&scored.listing.platform).or_default() += 1;
        *by_type.entry(or_unspecified(&scored.listing.job_type)).or_default() += 1;
    }

    let _ = writeln!(out, "\nJobs by platform:");
    for (platform, count) in &by_platform {
        let _ = writeln!(out, "  {}: {}", platform, count);
    }
    let _ = writeln!(out, "\nJobs by type:");
    for (job_type, count) in &by_type {
        let _ = writeln!(out, "  {}: {}", job_type, count);
    }

    let mut recent: Vec<&ScoredListing> = listings.iter().collect();
    recent.sort_by(|a, b| b.listing.date_posted.cmp(&a.listing.date_posted));
    let _ = writeln!(out, "\nMost recent jobs:");
    for (i, scored) in recent.iter().take(RECENT_IN_SUMMARY).enumerate() {
        let l = &scored.listing;
        let _ = writeln!(
            out,
            "  {}. {} at {} ({}) - {} [score {}]",
            i + 1,
            l.title,
            or_unspecified(&l.company),
            l.platform,
            l.date_posted
                .map(|d| d.to_string())
                .unwrap_or_else(|| "date unknown".to_string()),
            scored.score
        );
        let _ = writeln!(out, "     {}  key: {}", l.url, l.key());
    }

    out
}

/// Write tracked applications as CSV. Returns the number of rows.
pub async fn export_applications(applications: &[Application], path: &Path) -> Result<usize> {
    let rows = applications.iter().map(|a| ApplicationRecord {
        key: a.key(),
        platform: &a.platform,
        listing_id: &a.listing_id,
        title: &a.title,
        company: &a.company,
        status: a.status.as_str(),
        cover_letter_path: a.cover_letter_path.as_deref().unwrap_or_default(),
        notes: a.notes.as_deref().unwrap_or_default(),
        created_at: a.created_at.to_rfc3339(),
        updated_at: a.updated_at.to_rfc3339(),
    });
    let csv = to_csv(rows)?;
    FsOps::write_file_safe(path, &csv).await?;
    app_log!(info, "Exported {} applications to {}", applications.len(), path.display());
    Ok(applications.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplicationStatus, Listing};
    use chrono::{NaiveDate, Utc};

    fn scored(platform: &str, id: &str, job_type: &str, day: u32) -> ScoredListing {
        let mut listing = Listing::new(platform, id);
        listing.title = format!("Job {}", id);
        listing.company = "Acme".to_string();
        listing.job_type = job_type.to_string();
        listing.skills = vec!["Rust".into(), "SQL".into()];
        listing.date_posted = NaiveDate::from_ymd_opt(2024, 5, day);
        ScoredListing {
            listing,
            score: day,
            matched_skills: vec!["Rust".into()],
            matched_keywords: vec![],
        }
    }

    #[tokio::test]
    async fn test_save_results_writes_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let listings = vec![scored("indeed", "a", "Full-time", 1), scored("upwork", "b", "", 2)];

        let saved = save_results(&listings, dir.path(), "20240520_101500")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.csv, dir.path().join("job_search_20240520_101500.csv"));

        let csv = std::fs::read_to_string(&saved.csv).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("platform,id,title,company"));
        assert!(lines.next().unwrap().contains("Rust; SQL"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&saved.json).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["platform"], "indeed");
        assert_eq!(json[0]["score"], 1);
    }

    #[tokio::test]
    async fn test_empty_results_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_results(&[], dir.path(), "ts").await.unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_summary_counts_and_recent() {
        let listings: Vec<ScoredListing> = (1..=7)
            .map(|day| {
                let platform = if day % 2 == 0 { "linkedin" } else { "indeed" };
                scored(platform, &day.to_string(), if day > 5 { "Contract" } else { "" }, day)
            })
            .collect();
        let summary = render_summary(&listings);

        assert!(summary.contains("Total jobs found: 7"));
        assert!(summary.contains("  indeed: 4\n"));
        assert!(summary.contains("  linkedin: 3\n"));
        assert!(summary.contains("  Contract: 2\n"));
        assert!(summary.contains("  Unspecified: 5\n"));
        assert!(summary.contains("  1. Job 7 at Acme (indeed) - 2024-05-07"));
        assert!(summary.contains("  5. Job 3"));
        assert!(!summary.contains("6. "));
    }

    #[tokio::test]
    async fn test_export_applications() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("applications.csv");
        let now = Utc::now();
        let apps = vec![Application {
            id: 1,
            platform: "linkedin".into(),
            listing_id: "42".into(),
            title: "Rust Engineer".into(),
            company: "Acme, Inc.".into(),
            status: ApplicationStatus::Interviewing,
            cover_letter_path: None,
            notes: Some("second round".into()),
            created_at: now,
            updated_at: now,
        }];
        assert_eq!(export_applications(&apps, &path).await.unwrap(), 1);
        let csv = std::fs::read_to_string(&path).unwrap();
        assert!(csv.contains("linkedin:42,linkedin,42,Rust Engineer,\"Acme, Inc.\",interviewing,,second round"));
    }
}
