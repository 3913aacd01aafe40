// src/tracker.rs
//! Persistent record of seen listings and the applications made for them.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::FromRow;

use crate::app_log;
use crate::core::Database;
use crate::error::TrackerError;
use crate::types::{
    Application, ApplicationEvent, ApplicationStatus, Listing, ListingKey, ScoredListing,
    Transition,
};

#[derive(Debug, FromRow)]
struct ListingRow {
    id: i64,
    platform: String,
    listing_id: String,
    title: String,
    company: String,
    location: String,
    url: String,
    salary: String,
    job_type: String,
    description: String,
    date_posted: Option<NaiveDate>,
}

impl ListingRow {
    fn into_listing(self) -> Listing {
        let mut listing = Listing::new(&self.platform, self.listing_id);
        listing.title = self.title;
        listing.company = self.company;
        listing.is_remote = self.location.to_lowercase().contains("remote");
        listing.location = self.location;
        listing.url = self.url;
        listing.salary = self.salary;
        listing.job_type = self.job_type;
        listing.description = self.description;
        listing.date_posted = self.date_posted;
        listing
    }
}

#[derive(Debug, FromRow)]
struct ApplicationRow {
    id: i64,
    platform: String,
    listing_id: String,
    title: String,
    company: String,
    status: String,
    cover_letter_path: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = TrackerError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Application {
            id: row.id,
            platform: row.platform,
            listing_id: row.listing_id,
            title: row.title,
            company: row.company,
            status: row.status.parse()?,
            cover_letter_path: row.cover_letter_path,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    status: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

const APPLICATION_SELECT: &str = r#"
    SELECT a.id, l.platform, l.listing_id, l.title, l.company, a.status,
           a.cover_letter_path, a.notes, a.created_at, a.updated_at
    FROM applications a
    JOIN listings l ON l.id = a.listing_ref
"#;

pub struct Tracker {
    db: Database,
    daily_limit: u32,
}

impl Tracker {
    pub fn new(db: Database, daily_limit: u32) -> Self {
        Self { db, daily_limit }
    }

    /// Store listings from a search run. Known listings are refreshed;
    /// returns how many were new.
    pub async fn upsert_listings(&self, listings: &[ScoredListing]) -> Result<usize, TrackerError> {
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;

        for scored in listings {
            let l = &scored.listing;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO listings
                    (platform, listing_id, title, company, location, url, salary, job_type,
                     description, date_posted, score, first_seen_at, last_seen_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&l.platform)
            .bind(&l.id)
            .bind(&l.title)
            .bind(&l.company)
            .bind(&l.location)
            .bind(&l.url)
            .bind(&l.salary)
            .bind(&l.job_type)
            .bind(&l.description)
            .bind(l.date_posted)
            .bind(i64::from(scored.score))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
                continue;
            }

            sqlx::query(
                r#"
                UPDATE listings
                SET title = ?, company = ?, location = ?, url = ?, salary = ?, job_type = ?,
                    description = CASE WHEN ? = '' THEN description ELSE ? END,
                    date_posted = COALESCE(?, date_posted), score = ?, last_seen_at = ?
                WHERE platform = ? AND listing_id = ?
                "#,
            )
            .bind(&l.title)
            .bind(&l.company)
            .bind(&l.location)
            .bind(&l.url)
            .bind(&l.salary)
            .bind(&l.job_type)
            .bind(&l.description)
            .bind(&l.description)
            .bind(l.date_posted)
            .bind(i64::from(scored.score))
            .bind(now)
            .bind(&l.platform)
            .bind(&l.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        app_log!(
            info,
            "Stored {} listings ({} new)",
            listings.len(),
            inserted
        );
        Ok(inserted)
    }

    async fn listing_row(&self, key: &ListingKey) -> Result<Option<ListingRow>, TrackerError> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT id, platform, listing_id, title, company, location, url, salary, job_type,
                   description, date_posted
            FROM listings WHERE platform = ? AND listing_id = ?
            "#,
        )
        .bind(&key.platform)
        .bind(&key.id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row)
    }

    pub async fn find_listing(&self, key: &ListingKey) -> Result<Option<Listing>, TrackerError> {
        Ok(self.listing_row(key).await?.map(ListingRow::into_listing))
    }

    pub async fn find_application(
        &self,
        key: &ListingKey,
    ) -> Result<Option<Application>, TrackerError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "{} WHERE l.platform = ? AND l.listing_id = ?",
            APPLICATION_SELECT
        ))
        .bind(&key.platform)
        .bind(&key.id)
        .fetch_optional(self.db.pool())
        .await?;
        row.map(Application::try_from).transpose()
    }

    /// Applications created during a local calendar day.
    pub async fn applications_created_on(&self, date: NaiveDate) -> Result<u32, TrackerError> {
        let start = local_midnight(date);
        let end = local_midnight(date.succ_opt().unwrap_or(date));
        // Timestamps are stored as RFC 3339 UTC text, so text order is time order.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM applications WHERE created_at >= ? AND created_at < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.db.pool())
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Applications still allowed today under the daily limit.
    pub async fn remaining_today(&self) -> Result<u32, TrackerError> {
        let used = self.applications_created_on(Local::now().date_naive()).await?;
        Ok(self.daily_limit.saturating_sub(used))
    }

    /// Create the application for a listing, or move the existing one to
    /// `status`. Only new records count against the daily limit.
    pub async fn record_application(
        &self,
        key: &ListingKey,
        status: ApplicationStatus,
        cover_letter_path: Option<&str>,
        note: Option<&str>,
    ) -> Result<Application, TrackerError> {
        if let Some(existing) = self.find_application(key).await? {
            if let Some(path) = cover_letter_path {
                sqlx::query("UPDATE applications SET cover_letter_path = ? WHERE id = ?")
                    .bind(path)
                    .bind(existing.id)
                    .execute(self.db.pool())
                    .await?;
            }
            let (application, _) = self.transition(key, status, note).await?;
            return Ok(application);
        }

        let listing = self
            .listing_row(key)
            .await?
            .ok_or_else(|| TrackerError::UnknownListing(key.to_string()))?;

        if self.remaining_today().await? == 0 {
            return Err(TrackerError::DailyLimitReached(self.daily_limit));
        }

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        let application_id = sqlx::query(
            r#"
            INSERT INTO applications (listing_ref, status, cover_letter_path, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(listing.id)
        .bind(status.as_str())
        .bind(cover_letter_path)
        .bind(note)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO application_events (application_id, status, note, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(application_id)
        .bind(status.as_str())
        .bind(note)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        app_log!(info, "Recorded application for {} as {}", key, status);
        self.find_application(key)
            .await?
            .ok_or_else(|| TrackerError::NoApplication(key.to_string()))
    }

    /// Move an application forward. Repeating the current status changes
    /// nothing and records no event.
    pub async fn transition(
        &self,
        key: &ListingKey,
        status: ApplicationStatus,
        note: Option<&str>,
    ) -> Result<(Application, Transition), TrackerError> {
        let current = self
            .find_application(key)
            .await?
            .ok_or_else(|| TrackerError::NoApplication(key.to_string()))?;

        let transition = current.status.check_transition(status)?;
        if transition == Transition::Unchanged {
            return Ok((current, transition));
        }

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        sqlx::query(
            r#"
            UPDATE applications
            SET status = ?, updated_at = ?, notes = COALESCE(?, notes)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(note)
        .bind(current.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO application_events (application_id, status, note, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(current.id)
        .bind(status.as_str())
        .bind(note)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        app_log!(info, "Application {} moved from {} to {}", key, current.status, status);
        let updated = self
            .find_application(key)
            .await?
            .ok_or_else(|| TrackerError::NoApplication(key.to_string()))?;
        Ok((updated, transition))
    }

    pub async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>, TrackerError> {
        let filter = if status.is_some() { "WHERE a.status = ?" } else { "" };
        let sql = format!("{} {} ORDER BY a.updated_at DESC", APPLICATION_SELECT, filter);
        let mut query = sqlx::query_as::<_, ApplicationRow>(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(self.db.pool()).await?;
        rows.into_iter().map(Application::try_from).collect()
    }

    /// Status history of an application, oldest first.
    pub async fn history(&self, key: &ListingKey) -> Result<Vec<ApplicationEvent>, TrackerError> {
        let application = self
            .find_application(key)
            .await?
            .ok_or_else(|| TrackerError::NoApplication(key.to_string()))?;

        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT status, note, created_at FROM application_events WHERE application_id = ? ORDER BY id",
        )
        .bind(application.id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ApplicationEvent {
                    status: row.status.parse()?,
                    note: row.note,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}

/// Start of a local calendar day. When a DST change skips midnight the day
/// starts at the first hour that exists.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(platform: &str, id: &str, title: &str) -> ScoredListing {
        let mut listing = Listing::new(platform, id);
        listing.title = title.to_string();
        listing.company = "Acme".to_string();
        listing.location = "Remote".to_string();
        ScoredListing {
            listing,
            score: 7,
            matched_skills: vec![],
            matched_keywords: vec![],
        }
    }

    async fn tracker(limit: u32) -> Tracker {
        Tracker::new(Database::in_memory().await.unwrap(), limit)
    }

    fn key(s: &str) -> ListingKey {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_upsert_counts_new_listings_only() {
        let tracker = tracker(10).await;
        let batch = vec![scored("indeed", "a", "Rust"), scored("indeed", "b", "Go")];
        assert_eq!(tracker.upsert_listings(&batch).await.unwrap(), 2);

        let mut again = batch.clone();
        again[0].listing.title = "Rust (updated)".to_string();
        again.push(scored("linkedin", "a", "Same id, other platform"));
        assert_eq!(tracker.upsert_listings(&again).await.unwrap(), 1);

        let stored = tracker.find_listing(&key("indeed:a")).await.unwrap().unwrap();
        assert_eq!(stored.title, "Rust (updated)");
        assert!(stored.is_remote);
        assert!(tracker.find_listing(&key("indeed:zzz")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_application_is_idempotent() {
        let tracker = tracker(10).await;
        tracker.upsert_listings(&[scored("upwork", "~01", "Rust CLI")]).await.unwrap();
        let k = key("upwork:~01");

        let first = tracker
            .record_application(&k, ApplicationStatus::Prepared, Some("letters/upwork_01.txt"), None)
            .await
            .unwrap();
        let second = tracker
            .record_application(&k, ApplicationStatus::Prepared, None, None)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.cover_letter_path.as_deref(), Some("letters/upwork_01.txt"));
        assert_eq!(tracker.list_applications(None).await.unwrap().len(), 1);
        assert_eq!(tracker.history(&k).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_listing_is_rejected() {
        let tracker = tracker(10).await;
        let err = tracker
            .record_application(&key("indeed:nope"), ApplicationStatus::Applied, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::UnknownListing(_)));
    }

    #[tokio::test]
    async fn test_transitions_are_monotonic_and_logged() {
        let tracker = tracker(10).await;
        tracker.upsert_listings(&[scored("linkedin", "42", "Rust")]).await.unwrap();
        let k = key("linkedin:42");
        tracker
            .record_application(&k, ApplicationStatus::Applied, None, Some("sent via site"))
            .await
            .unwrap();

        let (app, t) = tracker
            .transition(&k, ApplicationStatus::Interviewing, Some("call on Monday"))
            .await
            .unwrap();
        assert_eq!(t, Transition::Advanced);
        assert_eq!(app.status, ApplicationStatus::Interviewing);
        assert_eq!(app.notes.as_deref(), Some("call on Monday"));

        let (_, t) = tracker
            .transition(&k, ApplicationStatus::Interviewing, None)
            .await
            .unwrap();
        assert_eq!(t, Transition::Unchanged);

        let err = tracker
            .transition(&k, ApplicationStatus::Applied, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));

        let history = tracker.history(&k).await.unwrap();
        let statuses: Vec<_> = history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![ApplicationStatus::Applied, ApplicationStatus::Interviewing]
        );

        let interviewing = tracker
            .list_applications(Some(ApplicationStatus::Interviewing))
            .await
            .unwrap();
        assert_eq!(interviewing.len(), 1);
        assert!(tracker
            .list_applications(Some(ApplicationStatus::Rejected))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_daily_limit_applies_to_new_records() {
        let tracker = tracker(2).await;
        let batch = vec![
            scored("indeed", "1", "a"),
            scored("indeed", "2", "b"),
            scored("indeed", "3", "c"),
        ];
        tracker.upsert_listings(&batch).await.unwrap();

        for id in ["indeed:1", "indeed:2"] {
            tracker
                .record_application(&key(id), ApplicationStatus::Applied, None, None)
                .await
                .unwrap();
        }
        assert_eq!(tracker.remaining_today().await.unwrap(), 0);
        assert_eq!(
            tracker
                .applications_created_on(Local::now().date_naive())
                .await
                .unwrap(),
            2
        );

        let err = tracker
            .record_application(&key("indeed:3"), ApplicationStatus::Applied, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::DailyLimitReached(2)));

        // Updating an existing application is still allowed.
        tracker
            .record_application(&key("indeed:1"), ApplicationStatus::Responded, None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_daily_count_follows_the_local_calendar_day() {
        let tracker = tracker(5).await;
        let batch = vec![scored("indeed", "1", "a"), scored("indeed", "2", "b")];
        tracker.upsert_listings(&batch).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let local = |d: NaiveDate, h: u32, m: u32| {
            Local
                .from_local_datetime(&d.and_hms_opt(h, m, 0).unwrap())
                .earliest()
                .unwrap()
                .with_timezone(&Utc)
        };
        let stamps = [
            ("indeed:1", local(day, 0, 30)),
            ("indeed:2", local(day.pred_opt().unwrap(), 23, 30)),
        ];
        for (k, created_at) in stamps {
            let application = tracker
                .record_application(&key(k), ApplicationStatus::Applied, None, None)
                .await
                .unwrap();
            sqlx::query("UPDATE applications SET created_at = ? WHERE id = ?")
                .bind(created_at)
                .bind(application.id)
                .execute(tracker.db.pool())
                .await
                .unwrap();
        }

        assert_eq!(tracker.applications_created_on(day).await.unwrap(), 1);
        assert_eq!(
            tracker
                .applications_created_on(day.pred_opt().unwrap())
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            tracker
                .applications_created_on(day.succ_opt().unwrap())
                .await
                .unwrap(),
            0
        );
        assert_eq!(tracker.remaining_today().await.unwrap(), 5);
    }
}
