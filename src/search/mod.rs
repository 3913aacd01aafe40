// src/search/mod.rs
//! Filtering and ranking of listings against the user's profile.

use chrono::NaiveDate;
use regex::Regex;

use crate::config::AgentConfig;
use crate::types::{Listing, ScoredListing};

pub mod filter;
pub mod salary;

pub use filter::{ListingFilter, Rejection};
pub use salary::{parse_salary, PayPeriod, SalaryRange};

const SKILL_WEIGHT: u32 = 2;
const KEYWORD_WEIGHT: u32 = 3;

/// Case-insensitive whole-term matcher. Terms like `C++` or `Node.js` are
/// matched literally, bounded by non-alphanumeric characters.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: String,
    pattern: Option<Regex>,
}

impl TermMatcher {
    pub fn new(term: &str) -> Self {
        let term = term.trim().to_string();
        let pattern = Regex::new(&format!(
            r"(?i)(?:^|[^\p{{L}}\p{{N}}]){}(?:$|[^\p{{L}}\p{{N}}])",
            regex::escape(&term)
        ))
        .ok();
        Self { term, pattern }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_match(&self, text: &str) -> bool {
        if self.term.is_empty() {
            return false;
        }
        match &self.pattern {
            Some(pattern) => pattern.is_match(text),
            None => text.to_lowercase().contains(&self.term.to_lowercase()),
        }
    }
}

pub(crate) fn matchers(terms: &[String]) -> Vec<TermMatcher> {
    terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| TermMatcher::new(t))
        .collect()
}

/// Profile skills a listing mentions, in its text or its skill tags.
pub(crate) fn matched_skills(skills: &[TermMatcher], listing: &Listing) -> Vec<String> {
    let text = listing.searchable_text();
    skills
        .iter()
        .filter(|skill| {
            skill.is_match(&text) || listing.skills.iter().any(|tag| skill.is_match(tag))
        })
        .map(|skill| skill.term().to_string())
        .collect()
}

/// Relevance scoring: profile skills, search keywords (title hits count
/// double) and a bonus for fresh listings.
pub struct Scorer {
    skills: Vec<TermMatcher>,
    keywords: Vec<TermMatcher>,
}

impl Scorer {
    pub fn new(skills: &[String], keywords: &[String]) -> Self {
        Self {
            skills: matchers(skills),
            keywords: matchers(keywords),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(&config.user_profile.skills, &config.job_search.keywords)
    }

    pub fn score(&self, listing: Listing, today: NaiveDate) -> ScoredListing {
        let matched_skills = matched_skills(&self.skills, &listing);
        let text = listing.searchable_text();

        let mut score = matched_skills.len() as u32 * SKILL_WEIGHT;
        let mut matched_keywords = Vec::new();
        for keyword in &self.keywords {
            if keyword.is_match(&listing.title) {
                score += KEYWORD_WEIGHT * 2;
            } else if keyword.is_match(&text) {
                score += KEYWORD_WEIGHT;
            } else {
                continue;
            }
            matched_keywords.push(keyword.term().to_string());
        }
        score += recency_bonus(listing.date_posted, today);

        ScoredListing {
            listing,
            score,
            matched_skills,
            matched_keywords,
        }
    }
}

fn recency_bonus(posted: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match posted.map(|d| (today - d).num_days()) {
        Some(age) if age <= 1 => 3,
        Some(age) if age <= 3 => 2,
        Some(age) if age <= 7 => 1,
        _ => 0,
    }
}

/// Highest score first; ties go to the most recent listing.
pub fn rank(listings: &mut [ScoredListing]) {
    listings.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.listing.date_posted.cmp(&a.listing.date_posted))
    });
}
