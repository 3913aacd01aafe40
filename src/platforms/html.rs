// src/platforms/html.rs
//! Tolerant HTML extraction helpers shared by the scraping connectors.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Selector};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static RELATIVE_AGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\+?\s*(minute|min|hour|hr|day|week|month)s?").unwrap());
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

/// All elements under `scope` matching `css`. Invalid selectors match nothing.
pub fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Text of the first non-empty match, trying selectors in order.
pub fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    for css in selectors {
        if let Ok(selector) = Selector::parse(css) {
            if let Some(element) = scope.select(&selector).next() {
                let text = element_text(element);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Attribute of the first match that carries it, trying selectors in order.
pub fn first_attr(scope: ElementRef<'_>, selectors: &[&str], attr: &str) -> Option<String> {
    for css in selectors {
        if let Ok(selector) = Selector::parse(css) {
            let found = scope
                .select(&selector)
                .find_map(|element| element.value().attr(attr))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

pub fn all_texts(scope: ElementRef<'_>, css: &str) -> Vec<String> {
    select_all(scope, css)
        .into_iter()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn "Posted 3 days ago", "Just posted", "yesterday", "30+ days ago" or an
/// ISO date into a calendar date relative to `today`.
pub fn parse_relative_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_lowercase();

    if let Some(found) = ISO_DATE.find(&lower) {
        if let Ok(date) = NaiveDate::parse_from_str(found.as_str(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    if lower.contains("just") || lower.contains("today") || lower.contains("moments ago") {
        return Some(today);
    }
    if lower.contains("yesterday") {
        return Some(today - Duration::days(1));
    }

    let caps = RELATIVE_AGE.captures(&lower)?;
    let amount: i64 = caps[1].parse().ok()?;
    let days = match &caps[2] {
        "minute" | "min" | "hour" | "hr" => 0,
        "day" => amount,
        "week" => amount * 7,
        "month" => amount * 30,
        _ => return None,
    };
    Some(today - Duration::days(days))
}

/// Stable identifier for listings whose platform exposes none.
pub fn content_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.trim().as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(&hasher.finalize()[..8])
}
