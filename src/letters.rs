// src/letters.rs
//! Cover letter generation for individual listings.

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::config::{AgentConfig, UserProfile};
use crate::core::{FsOps, LetterEngine};
use crate::types::ScoredListing;

#[derive(Debug, Clone)]
pub struct GeneratedLetter {
    pub path: PathBuf,
    pub template_id: String,
    pub unresolved: Vec<String>,
}

/// Values available to letter templates.
pub fn letter_variables(
    profile: &UserProfile,
    scored: &ScoredListing,
    today: NaiveDate,
) -> HashMap<String, String> {
    let listing = &scored.listing;
    let mut vars: HashMap<String, String> = [
        ("name", profile.name.clone()),
        ("email", profile.email.clone()),
        ("phone", profile.phone.clone()),
        ("title", profile.title.clone()),
        ("location", profile.location.clone()),
        ("experience", profile.experience.clone()),
        ("skills", profile.skills.join(", ")),
        ("job_title", listing.title.clone()),
        ("company", listing.company.clone()),
        ("platform", listing.platform.clone()),
        ("listing_url", listing.url.clone()),
        ("date", today.format("%B %-d, %Y").to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let matched = if scored.matched_skills.is_empty() {
        profile.skills.iter().take(3).cloned().collect::<Vec<_>>()
    } else {
        scored.matched_skills.clone()
    };
    vars.insert("matched_skills".to_string(), matched.join(", "));

    for (key, value) in [
        ("portfolio_url", &profile.portfolio_url),
        ("github_url", &profile.github_url),
        ("linkedin_url", &profile.linkedin_url),
    ] {
        if let Some(value) = value.as_ref().filter(|v| !v.trim().is_empty()) {
            vars.insert(key.to_string(), value.clone());
        }
    }

    vars
}

pub struct LetterWriter<'a> {
    engine: &'a LetterEngine,
    profile: &'a UserProfile,
    configured_template: Option<PathBuf>,
    letters_dir: PathBuf,
}

impl<'a> LetterWriter<'a> {
    pub fn new(engine: &'a LetterEngine, config: &'a AgentConfig) -> Self {
        Self {
            engine,
            profile: &config.user_profile,
            configured_template: config
                .application
                .cover_letter_template
                .as_ref()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            letters_dir: config.paths.letters_dir(),
        }
    }

    pub fn letter_path(&self, scored: &ScoredListing) -> PathBuf {
        let listing = &scored.listing;
        let stem = FsOps::sanitize_file_name(&format!("{}_{}", listing.platform, listing.id));
        self.letters_dir.join(format!("{}.txt", stem))
    }

    /// Render and write the letter for a listing.
    pub async fn write(
        &self,
        scored: &ScoredListing,
        template_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<GeneratedLetter> {
        let template = self.engine.select(
            template_id,
            self.configured_template.as_deref().map(Path::new),
            &scored.listing.platform,
        )?;
        let variables = letter_variables(self.profile, scored, today);
        let rendered = LetterEngine::render(&template.body, &variables);

        if !rendered.unresolved.is_empty() {
            app_log!(
                warn,
                "Letter for {} has unresolved placeholders: {}",
                scored.listing.key(),
                rendered.unresolved.join(", ")
            );
        }

        let path = self.letter_path(scored);
        FsOps::write_file_safe(&path, &rendered.text).await?;
        app_log!(
            info,
            "Cover letter for {} written to {} (template: {})",
            scored.listing.key(),
            path.display(),
            template.id
        );

        Ok(GeneratedLetter {
            path,
            template_id: template.id,
            unresolved: rendered.unresolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::MINIMAL_YAML;
    use crate::types::Listing;

    fn scored() -> ScoredListing {
        let mut listing = Listing::new("upwork", "~01abc");
        listing.title = "Rust CLI".to_string();
        listing.company = "Upwork Client".to_string();
        ScoredListing {
            listing,
            score: 9,
            matched_skills: vec!["Rust".to_string()],
            matched_keywords: vec![],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    #[test]
    fn test_variables() {
        let config = AgentConfig::from_yaml(MINIMAL_YAML).unwrap();
        let vars = letter_variables(&config.user_profile, &scored(), today());
        assert_eq!(vars["name"], "Ada Lovelace");
        assert_eq!(vars["experience"], "7");
        assert_eq!(vars["skills"], "Rust, Python, SQL");
        assert_eq!(vars["matched_skills"], "Rust");
        assert_eq!(vars["job_title"], "Rust CLI");
        assert_eq!(vars["date"], "May 20, 2024");
        assert!(!vars.contains_key("github_url"));
    }

    #[tokio::test]
    async fn test_write_letter_to_reports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AgentConfig::from_yaml(MINIMAL_YAML).unwrap();
        config.paths.reports_dir = dir.path().join("reports");
        config.paths.templates_dir = dir.path().join("templates");

        let template_dir = config.paths.templates_dir.join("short");
        std::fs::create_dir_all(&template_dir).unwrap();
        std::fs::write(template_dir.join("manifest.toml"), "name = \"Short\"\n").unwrap();
        std::fs::write(
            template_dir.join("letter.txt"),
            "Hello {{ company }}, {{name}} here about ${job_title}. {{ github_url }}",
        )
        .unwrap();

        let engine = LetterEngine::new(config.paths.templates_dir.clone()).unwrap();
        let writer = LetterWriter::new(&engine, &config);
        let letter = writer.write(&scored(), None, today()).await.unwrap();

        assert_eq!(letter.template_id, "short");
        assert_eq!(letter.unresolved, vec!["github_url"]);
        assert_eq!(
            letter.path,
            dir.path().join("reports").join("letters").join("upwork_01abc.txt")
        );
        let text = std::fs::read_to_string(&letter.path).unwrap();
        assert!(text.starts_with("Hello Upwork Client, Ada Lovelace here about Rust CLI."));
    }
}
