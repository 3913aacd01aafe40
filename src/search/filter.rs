// src/search/filter.rs
use std::collections::HashMap;
use std::fmt;
use crate::app_log;

use super::salary::{parse_salary, PayPeriod};
use super::{matched_skills, matchers, TermMatcher};
use crate::config::{AgentConfig, RateRange};
use crate::platforms::is_remote_location;
use crate::types::Listing;

/// Why a listing was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    ExcludedKeyword(String),
    NotRemote,
    JobType(String),
    ExperienceLevel(String),
    BelowSalaryFloor(f64),
    OutsideHourlyRange(f64, f64),
    TooFewSkills(usize),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludedKeyword(k) => write!(f, "mentions excluded keyword '{}'", k),
            Self::NotRemote => write!(f, "not remote"),
            Self::JobType(t) => write!(f, "job type '{}' not wanted", t),
            Self::ExperienceLevel(l) => write!(f, "experience level '{}' not wanted", l),
            Self::BelowSalaryFloor(max) => write!(f, "pays at most {:.0} a year", max),
            Self::OutsideHourlyRange(min, max) => write!(f, "hourly rate {}-{} out of range", min, max),
            Self::TooFewSkills(n) => write!(f, "matches only {} profile skills", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum JobKind {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
    Volunteer,
}

fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Canonical kind of a job type label. Freelance contract labels (Hourly,
/// Fixed-Price) count as contract work. Unknown labels yield `None`.
fn job_kind(label: &str) -> Option<JobKind> {
    let normalized = normalize_label(label);
    match normalized.as_str() {
        "fulltime" | "permanent" => Some(JobKind::FullTime),
        "parttime" => Some(JobKind::PartTime),
        "contract" | "contractor" | "freelance" | "hourly" | "fixedprice" => Some(JobKind::Contract),
        "temporary" | "temp" => Some(JobKind::Temporary),
        "internship" | "intern" => Some(JobKind::Internship),
        "volunteer" => Some(JobKind::Volunteer),
        _ => None,
    }
}

/// Project budgets and price benchmarks are not pay per period, whatever
/// their size.
fn is_budget_label(label: &str) -> bool {
    let normalized = normalize_label(label);
    matches!(normalized.as_str(), "fixedprice" | "fixed" | "marketinsight")
}

/// Seniority ranks a label covers; "Mid-Senior level" spans two.
fn level_ranks(label: &str) -> Vec<u8> {
    let lower = label.to_lowercase();
    if lower.contains("mid") && lower.contains("senior") {
        vec![4, 5]
    } else if lower.contains("intern") {
        vec![1]
    } else if lower.contains("entry") || lower.contains("junior") {
        vec![2]
    } else if lower.contains("associate") {
        vec![3]
    } else if lower.contains("mid") || lower.contains("intermediate") {
        vec![4]
    } else if lower.contains("senior") || lower.contains("expert") || lower.contains("lead") {
        vec![5]
    } else if lower.contains("director") {
        vec![6]
    } else if lower.contains("executive") {
        vec![7]
    } else {
        Vec::new()
    }
}

pub struct ListingFilter {
    exclude: Vec<TermMatcher>,
    remote_only: bool,
    job_kinds: Vec<JobKind>,
    levels: Vec<u8>,
    salary_floor: Option<f64>,
    hourly_ranges: HashMap<String, RateRange>,
    skills: Vec<TermMatcher>,
    min_skill_matches: usize,
}

impl ListingFilter {
    pub fn from_config(config: &AgentConfig) -> Self {
        let search = &config.job_search;
        let configured_locations: Vec<&String> =
            search.locations.iter().filter(|l| !l.trim().is_empty()).collect();

        Self {
            exclude: matchers(&search.exclude_keywords),
            remote_only: search.remote
                && !configured_locations.is_empty()
                && configured_locations.iter().all(|l| is_remote_location(l)),
            job_kinds: search.job_types.iter().filter_map(|t| job_kind(t)).collect(),
            levels: search
                .experience_level
                .iter()
                .flat_map(|l| level_ranks(l))
                .collect(),
            salary_floor: search
                .salary_range
                .as_ref()
                .filter(|r| r.min > 0)
                .map(|r| f64::from(r.min)),
            hourly_ranges: config
                .platforms
                .iter()
                .filter_map(|(name, s)| s.search_criteria.hourly_rate.map(|r| (name.clone(), r)))
                .collect(),
            skills: matchers(&config.user_profile.skills),
            min_skill_matches: search.min_skill_matches,
        }
    }

    pub fn check(&self, listing: &Listing) -> Result<(), Rejection> {
        let text = listing.searchable_text();
        if let Some(excluded) = self.exclude.iter().find(|k| k.is_match(&text)) {
            return Err(Rejection::ExcludedKeyword(excluded.term().to_string()));
        }

        if self.remote_only && !listing.is_remote {
            return Err(Rejection::NotRemote);
        }

        if !self.job_kinds.is_empty() {
            if let Some(kind) = job_kind(&listing.job_type) {
                if !self.job_kinds.contains(&kind) {
                    return Err(Rejection::JobType(listing.job_type.clone()));
                }
            }
        }

        if !self.levels.is_empty() {
            let ranks = level_ranks(&listing.experience_level);
            if !ranks.is_empty() && !ranks.iter().any(|r| self.levels.contains(r)) {
                return Err(Rejection::ExperienceLevel(listing.experience_level.clone()));
            }
        }

        self.check_pay(listing)?;

        if self.min_skill_matches > 0 {
            let matched = matched_skills(&self.skills, listing).len();
            if matched < self.min_skill_matches {
                return Err(Rejection::TooFewSkills(matched));
            }
        }

        Ok(())
    }

    fn check_pay(&self, listing: &Listing) -> Result<(), Rejection> {
        let Some(mut range) = parse_salary(&listing.salary) else {
            return Ok(());
        };
        if is_budget_label(&listing.job_type) {
            range.period = PayPeriod::Unspecified;
        }

        let hourly = range.period == PayPeriod::Hour
            || (range.period == PayPeriod::Unspecified
                && listing.job_type.eq_ignore_ascii_case("hourly"));
        if hourly {
            if let Some(rate) = self.hourly_ranges.get(&listing.platform) {
                if range.max < rate.min || range.min > rate.max {
                    return Err(Rejection::OutsideHourlyRange(range.min, range.max));
                }
            }
        }

        if let (Some(floor), Some((_, yearly_max))) = (self.salary_floor, range.annualized()) {
            if yearly_max < floor {
                return Err(Rejection::BelowSalaryFloor(yearly_max));
            }
        }

        Ok(())
    }

    pub fn apply(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let before = listings.len();
        let kept: Vec<Listing> = listings
            .into_iter()
            .filter(|listing| match self.check(listing) {
                Ok(()) => true,
                Err(reason) => {
                    app_log!(debug, "Filtered out {} ({}): {}", listing.key(), listing.title, reason);
                    false
                }
            })
            .collect();
        app_log!(info, "Filtered {} listings down to {}", before, kept.len());
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::MINIMAL_YAML;
    use crate::config::SalaryRangeConfig;

    fn config() -> AgentConfig {
        AgentConfig::from_yaml(MINIMAL_YAML).unwrap()
    }

    fn listing(title: &str, description: &str) -> Listing {
        let mut listing = Listing::new("linkedin", title);
        listing.title = title.to_string();
        listing.description = description.to_string();
        listing.is_remote = true;
        listing
    }

    #[test]
    fn test_excluded_keywords_are_dropped() {
        let filter = ListingFilter::from_config(&config());
        let php = listing("Backend developer", "Laravel and PHP experience");
        assert_eq!(
            filter.check(&php),
            Err(Rejection::ExcludedKeyword("PHP".to_string()))
        );
        assert!(filter.check(&listing("Rust developer", "Async Rust")).is_ok());
    }

    #[test]
    fn test_remote_only_when_all_locations_remote() {
        let mut config = config();
        config.job_search.remote = true;
        let filter = ListingFilter::from_config(&config);
        let mut onsite = listing("Rust developer", "");
        onsite.is_remote = false;
        assert_eq!(filter.check(&onsite), Err(Rejection::NotRemote));

        config.job_search.locations.push("Berlin".to_string());
        let filter = ListingFilter::from_config(&config);
        assert!(filter.check(&onsite).is_ok());
    }

    #[test]
    fn test_job_type_and_level_only_checked_when_stated() {
        let mut config = config();
        config.job_search.job_types = vec!["Contract".into(), "Freelance".into()];
        config.job_search.experience_level = vec!["Senior".into()];
        let filter = ListingFilter::from_config(&config);

        let mut full_time = listing("Rust developer", "");
        full_time.job_type = "Full-time".into();
        assert!(matches!(filter.check(&full_time), Err(Rejection::JobType(_))));

        let mut hourly = listing("Rust developer", "");
        hourly.job_type = "Hourly".into();
        hourly.experience_level = "Mid-Senior level".into();
        assert!(filter.check(&hourly).is_ok());

        let mut junior = listing("Rust developer", "");
        junior.experience_level = "Entry level".into();
        assert!(matches!(filter.check(&junior), Err(Rejection::ExperienceLevel(_))));

        let unstated = listing("Rust developer", "");
        assert!(filter.check(&unstated).is_ok());
    }

    #[test]
    fn test_salary_floor_uses_annualized_max() {
        let mut config = config();
        config.job_search.salary_range = Some(SalaryRangeConfig {
            min: 90_000,
            max: 150_000,
            currency: "USD".into(),
        });
        let filter = ListingFilter::from_config(&config);

        let mut low = listing("Rust developer", "");
        low.salary = "$60,000 - $80,000 a year".into();
        assert!(matches!(filter.check(&low), Err(Rejection::BelowSalaryFloor(_))));

        let mut hourly = listing("Rust developer", "");
        hourly.salary = "$50 an hour".into();
        assert!(filter.check(&hourly).is_ok());

        let mut budget = listing("Rust developer", "");
        budget.salary = "$500".into();
        assert!(filter.check(&budget).is_ok());
    }

    #[test]
    fn test_fixed_price_budgets_skip_salary_floor() {
        let mut config = config();
        config.job_search.job_types = vec!["Full-time".into(), "Contract".into(), "Freelance".into()];
        config.job_search.salary_range = Some(SalaryRangeConfig {
            min: 80_000,
            max: 150_000,
            currency: "USD".into(),
        });
        let filter = ListingFilter::from_config(&config);

        let mut project = listing("Rust scraper", "");
        project.platform = "freelancer".into();
        project.job_type = "Fixed-Price".into();
        project.salary = "$10000 - $30000".into();
        assert_eq!(filter.check(&project), Ok(()));

        let mut tile = listing("Rust CLI tool", "");
        tile.platform = "upwork".into();
        tile.job_type = "Fixed-Price".into();
        tile.salary = "$15,000".into();
        assert_eq!(filter.check(&tile), Ok(()));

        // The same amount on a salaried listing is still yearly pay.
        tile.job_type = "Full-time".into();
        assert!(matches!(filter.check(&tile), Err(Rejection::BelowSalaryFloor(_))));
    }

    #[test]
    fn test_hourly_range_per_platform() {
        let mut config = config();
        let mut upwork = crate::config::PlatformSettings::default();
        upwork.search_criteria.hourly_rate = Some(RateRange { min: 40.0, max: 100.0 });
        config.platforms.insert("upwork".into(), upwork);
        let filter = ListingFilter::from_config(&config);

        let mut cheap = listing("Rust developer", "");
        cheap.platform = "upwork".into();
        cheap.job_type = "Hourly".into();
        cheap.salary = "$15.00 - $25.00".into();
        assert!(matches!(
            filter.check(&cheap),
            Err(Rejection::OutsideHourlyRange(_, _))
        ));

        let mut overlapping = cheap.clone();
        overlapping.salary = "$30.00 - $45.00".into();
        assert!(filter.check(&overlapping).is_ok());

        // Same rate on a platform without a configured range.
        cheap.platform = "linkedin".into();
        assert!(filter.check(&cheap).is_ok());
    }

    #[test]
    fn test_min_skill_matches() {
        let mut config = config();
        config.job_search.min_skill_matches = 2;
        let filter = ListingFilter::from_config(&config);

        assert_eq!(
            filter.check(&listing("Rust developer", "Some Python")),
            Ok(())
        );
        assert_eq!(
            filter.check(&listing("Rust developer", "Great team")),
            Err(Rejection::TooFewSkills(1))
        );
    }

    #[test]
    fn test_apply_keeps_order() {
        let filter = ListingFilter::from_config(&config());
        let kept = filter.apply(vec![
            listing("A Rust", ""),
            listing("B PHP", ""),
            listing("C Python", ""),
        ]);
        let titles: Vec<&str> = kept.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["A Rust", "C Python"]);
    }
}
