// src/config.rs
//! User configuration: profile, search parameters, platforms and paths,
//! loaded from a YAML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::core::FsOps;
use crate::error::ConfigError;
use crate::scheduler::{self, Frequency};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
pub const CONFIG_ENV_VAR: &str = "JOB_SCOUT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub user_profile: UserProfile,
    pub job_search: JobSearchConfig,
    pub platforms: BTreeMap<String, PlatformSettings>,
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(deserialize_with = "string_or_number")]
    pub experience: String,
    #[serde(default)]
    pub education: Vec<Education>,
    pub skills: Vec<String>,
    pub resume_path: String,
    #[serde(default)]
    pub portfolio_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub year: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSearchConfig {
    pub job_types: Vec<String>,
    #[serde(default)]
    pub experience_level: Vec<String>,
    #[serde(default)]
    pub remote: bool,
    pub locations: Vec<String>,
    #[serde(default)]
    pub salary_range: Option<SalaryRangeConfig>,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// Listings must mention at least this many profile skills.
    #[serde(default)]
    pub min_skill_matches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryRangeConfig {
    pub min: u32,
    pub max: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub search_criteria: SearchCriteria,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Raw `Cookie` header copied from a logged-in browser session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        [&self.username, &self.password, &self.session_cookie]
            .iter()
            .all(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_distance: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<RateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub auto_apply: bool,
    #[serde(default)]
    pub cover_letter_template: Option<String>,
    #[serde(default = "default_daily_limit")]
    pub daily_application_limit: u32,
    /// Minimum relevance score for automatically prepared applications.
    #[serde(default = "default_min_score")]
    pub min_score: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            auto_apply: false,
            cover_letter_template: None,
            daily_application_limit: default_daily_limit(),
            min_score: default_min_score(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub email: EmailNotification,
    #[serde(default)]
    pub desktop: DesktopNotification,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailNotification {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesktopNotification {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_run_time")]
    pub time: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: Frequency::Daily,
            time: default_run_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
            logs_dir: default_logs_dir(),
            database_path: default_database_path(),
            templates_dir: default_templates_dir(),
        }
    }
}

impl PathsConfig {
    /// Make every path absolute against the current working directory.
    pub fn resolved(&self) -> Result<Self> {
        Ok(Self {
            reports_dir: resolve_path(&self.reports_dir)?,
            logs_dir: resolve_path(&self.logs_dir)?,
            database_path: resolve_path(&self.database_path)?,
            templates_dir: resolve_path(&self.templates_dir)?,
        })
    }

    pub fn letters_dir(&self) -> PathBuf {
        self.reports_dir.join("letters")
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.reports_dir.join("outbox")
    }
}

fn default_currency() -> String {
    "USD".to_string()
}
fn default_daily_limit() -> u32 {
    10
}
fn default_min_score() -> u32 {
    5
}
fn default_run_time() -> String {
    "09:00".to_string()
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_database_path() -> PathBuf {
    PathBuf::from("data/job_scout.db")
}
fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {:?}",
            other
        ))),
    }
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    Ok(FsOps::normalize_path(&current_dir, path))
}

impl AgentConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AgentConfig =
            serde_yaml::from_str(content).context("Failed to parse configuration YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Enabled platforms with no username, password or session cookie.
    pub fn platforms_missing_credentials(&self) -> Vec<&str> {
        self.enabled_platforms()
            .filter(|(_, settings)| settings.credentials.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Enabled platforms, in name order.
    pub fn enabled_platforms(&self) -> impl Iterator<Item = (&String, &PlatformSettings)> {
        self.platforms.iter().filter(|(_, settings)| settings.enabled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let profile = &self.user_profile;
        for (field, value) in [
            ("user_profile.name", &profile.name),
            ("user_profile.experience", &profile.experience),
            ("user_profile.resume_path", &profile.resume_path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }
        if profile.skills.is_empty() {
            return Err(ConfigError::invalid(
                "user_profile.skills",
                "list at least one skill",
            ));
        }

        let search = &self.job_search;
        for (field, values) in [
            ("job_search.job_types", &search.job_types),
            ("job_search.locations", &search.locations),
            ("job_search.keywords", &search.keywords),
        ] {
            if values.iter().all(|v| v.trim().is_empty()) {
                return Err(ConfigError::invalid(field, "list at least one value"));
            }
        }
        if let Some(range) = &search.salary_range {
            if range.min > range.max {
                return Err(ConfigError::invalid(
                    "job_search.salary_range",
                    format!("min {} is greater than max {}", range.min, range.max),
                ));
            }
        }

        for (name, settings) in &self.platforms {
            if let Some(rate) = settings.search_criteria.hourly_rate {
                if rate.min > rate.max || rate.min < 0.0 {
                    return Err(ConfigError::invalid(
                        format!("platforms.{}.search_criteria.hourly_rate", name),
                        format!("invalid range {} - {}", rate.min, rate.max),
                    ));
                }
            }
        }
        for name in self.platforms_missing_credentials() {
            app_log!(
                warn,
                "Platform {} is enabled but credentials are missing; results may be limited",
                name
            );
        }

        if self.application.daily_application_limit == 0 {
            return Err(ConfigError::invalid(
                "application.daily_application_limit",
                "must be greater than zero",
            ));
        }

        scheduler::parse_time(&self.scheduler.time)
            .map_err(|reason| ConfigError::invalid("scheduler.time", reason))?;

        Ok(())
    }

    /// The configuration written for first-time users.
    pub fn default_template() -> Self {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            "linkedin".to_string(),
            PlatformSettings {
                enabled: true,
                credentials: Credentials::default(),
                search_criteria: SearchCriteria {
                    post_days: Some(7),
                    location_distance: Some(25),
                    max_pages: Some(3),
                    ..Default::default()
                },
            },
        );
        platforms.insert(
            "indeed".to_string(),
            PlatformSettings {
                enabled: true,
                credentials: Credentials::default(),
                search_criteria: SearchCriteria {
                    post_days: Some(14),
                    location_distance: Some(50),
                    max_pages: Some(3),
                    ..Default::default()
                },
            },
        );
        platforms.insert(
            "upwork".to_string(),
            PlatformSettings {
                enabled: true,
                credentials: Credentials {
                    session_cookie: Some(String::new()),
                    ..Default::default()
                },
                search_criteria: SearchCriteria {
                    hourly_rate: Some(RateRange {
                        min: 40.0,
                        max: 100.0,
                    }),
                    max_pages: Some(2),
                    ..Default::default()
                },
            },
        );
        platforms.insert(
            "fiverr".to_string(),
            PlatformSettings {
                enabled: false,
                credentials: Credentials {
                    session_cookie: Some(String::new()),
                    ..Default::default()
                },
                search_criteria: SearchCriteria::default(),
            },
        );
        platforms.insert(
            "freelancer".to_string(),
            PlatformSettings {
                enabled: true,
                credentials: Credentials::default(),
                search_criteria: SearchCriteria {
                    post_days: Some(14),
                    ..Default::default()
                },
            },
        );

        Self {
            user_profile: UserProfile {
                name: "Your Name".to_string(),
                title: "Your Professional Title".to_string(),
                email: "your.email@example.com".to_string(),
                phone: "+1234567890".to_string(),
                location: "City, Country".to_string(),
                experience: "5 years".to_string(),
                education: vec![Education {
                    degree: "Bachelor of Science".to_string(),
                    field: "Computer Science".to_string(),
                    institution: "University Name".to_string(),
                    year: Some(2020),
                }],
                skills: [
                    "Python",
                    "Data Analysis",
                    "Machine Learning",
                    "Web Development",
                    "Project Management",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                resume_path: "path/to/your/resume.pdf".to_string(),
                portfolio_url: Some("https://yourportfolio.com".to_string()),
                github_url: Some("https://github.com/yourusername".to_string()),
                linkedin_url: Some("https://linkedin.com/in/yourusername".to_string()),
            },
            job_search: JobSearchConfig {
                job_types: vec![
                    "Full-time".to_string(),
                    "Contract".to_string(),
                    "Freelance".to_string(),
                ],
                experience_level: vec!["Mid-level".to_string(), "Senior".to_string()],
                remote: true,
                locations: vec!["New York, NY".to_string(), "Remote".to_string()],
                salary_range: Some(SalaryRangeConfig {
                    min: 80_000,
                    max: 150_000,
                    currency: default_currency(),
                }),
                keywords: vec![
                    "Python Developer".to_string(),
                    "Data Scientist".to_string(),
                    "Full Stack Developer".to_string(),
                ],
                exclude_keywords: vec!["PHP".to_string(), "WordPress".to_string()],
                min_skill_matches: 0,
            },
            platforms,
            application: ApplicationConfig {
                cover_letter_template: Some("templates/cover_letter.txt".to_string()),
                ..Default::default()
            },
            notifications: NotificationsConfig {
                email: EmailNotification {
                    enabled: true,
                    address: Some("your.email@example.com".to_string()),
                },
                desktop: DesktopNotification { enabled: true },
            },
            scheduler: SchedulerConfig {
                enabled: true,
                ..Default::default()
            },
            paths: PathsConfig::default(),
        }
    }
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let yaml = serde_yaml::to_string(&AgentConfig::default_template())
        .context("Failed to serialize default configuration")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write configuration: {}", path.display()))?;
    app_log!(info, "Created default configuration file at {}", path.display());
    Ok(())
}

/// Load and validate the configuration. A missing file is replaced by the
/// default template and reported as an error so the user edits it first.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        write_default_config(path)?;
        return Err(ConfigError::DefaultCreated(path.display().to_string()).into());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
    let mut config = AgentConfig::from_yaml(&content)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.paths = config.paths.resolved()?;

    app_log!(
        info,
        "Loaded configuration for {} ({} platforms enabled)",
        config.user_profile.name,
        config.enabled_platforms().count()
    );
    Ok(config)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MINIMAL_YAML: &str = r#"
user_profile:
  name: Ada Lovelace
  experience: 7
  skills: [Rust, Python, SQL]
  resume_path: cv.pdf
job_search:
  job_types: [Full-time]
  locations: [Remote]
  keywords: [Rust Developer]
  exclude_keywords: [PHP]
platforms:
  linkedin:
    enabled: true
  indeed:
    enabled: false
"#;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config = AgentConfig::from_yaml(MINIMAL_YAML).unwrap();
        assert_eq!(config.user_profile.experience, "7");
        assert_eq!(config.application.daily_application_limit, 10);
        assert_eq!(config.scheduler.frequency, Frequency::Daily);
        assert_eq!(config.scheduler.time, "09:00");
        assert_eq!(config.paths.reports_dir, PathBuf::from("reports"));
        let enabled: Vec<_> = config.enabled_platforms().map(|(n, _)| n.as_str()).collect();
        assert_eq!(enabled, vec!["linkedin"]);
    }

    #[test]
    fn test_missing_section_is_rejected() {
        let yaml = MINIMAL_YAML.replace("platforms:\n  linkedin:\n    enabled: true\n  indeed:\n    enabled: false\n", "");
        let err = AgentConfig::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("platforms"));
    }

    #[test]
    fn test_empty_keywords_are_rejected() {
        let yaml = MINIMAL_YAML.replace("keywords: [Rust Developer]", "keywords: []");
        let err = AgentConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("job_search.keywords"));
    }

    #[test]
    fn test_bad_schedule_time_is_rejected() {
        let yaml = format!("{}scheduler:\n  enabled: true\n  time: \"25:61\"\n", MINIMAL_YAML);
        let err = AgentConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("scheduler.time"));
    }

    #[test]
    fn test_unsupported_frequency_is_rejected() {
        let yaml = format!("{}scheduler:\n  frequency: monthly\n", MINIMAL_YAML);
        assert!(AgentConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_inverted_salary_range_is_rejected() {
        let yaml = MINIMAL_YAML.replace(
            "  exclude_keywords: [PHP]\n",
            "  exclude_keywords: [PHP]\n  salary_range: {min: 150000, max: 80000}\n",
        );
        let err = AgentConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("salary_range"));
    }

    #[test]
    fn test_default_template_is_valid_and_round_trips() {
        let yaml = serde_yaml::to_string(&AgentConfig::default_template()).unwrap();
        let config = AgentConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.platforms.len(), 5);
        assert!(config.platforms["upwork"].search_criteria.hourly_rate.is_some());
    }

    #[test]
    fn test_load_config_writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("config.yaml");

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("default"));
        assert!(path.exists());

        // The written file loads cleanly on the next run.
        let config = load_config(&path).unwrap();
        assert!(config.paths.reports_dir.is_absolute());
    }

    #[test]
    fn test_every_enabled_platform_without_credentials_is_reported() {
        let yaml = format!(
            "{}  upwork:\n    enabled: true\n    credentials:\n      session_cookie: abc\n  freelancer:\n    enabled: true\n",
            MINIMAL_YAML
        );
        let config = AgentConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.platforms_missing_credentials(), vec!["freelancer", "linkedin"]);
    }

    #[test]
    fn test_credentials_emptiness() {
        let mut creds = Credentials {
            session_cookie: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(creds.is_empty());
        creds.session_cookie = Some("li_at=abc".to_string());
        assert!(!creds.is_empty());
    }
}
