// src/core/template_engine.rs
//! Cover letter template discovery, selection and rendering

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use crate::app_log;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}")
        .unwrap()
});

pub const BUILTIN_TEMPLATE_ID: &str = "builtin";
const DEFAULT_MAIN_FILE: &str = "letter.txt";

const BUILTIN_LETTER: &str = "\
Dear {{ company }} hiring team,

I am writing to express my interest in the {{ job_title }} position I found on {{ platform }}.
As a {{ title }} with {{ experience }} of experience, I believe my background in
{{ matched_skills }} makes me a strong fit for this role.

My core skills include {{ skills }}. You can find examples of my work at {{ portfolio_url }}
and {{ github_url }}.

I would welcome the opportunity to discuss how I can contribute to {{ company }}.
I can be reached at {{ email }} or {{ phone }}.

Best regards,
{{ name }}
{{ date }}
";

#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub id: String,
    pub path: PathBuf,
    pub manifest: TemplateManifest,
}

impl TemplateInfo {
    pub fn main_path(&self) -> PathBuf {
        self.path.join(
            self.manifest
                .main_file
                .as_deref()
                .unwrap_or(DEFAULT_MAIN_FILE),
        )
    }

    /// A template without a platform list applies everywhere.
    fn is_generic(&self) -> bool {
        self.manifest.platforms.is_empty()
    }

    fn supports(&self, platform: &str) -> bool {
        self.manifest
            .platforms
            .iter()
            .any(|p| p.eq_ignore_ascii_case(platform))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateManifest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    pub main_file: Option<String>,
}

/// Template body picked for a listing, with where it came from.
#[derive(Debug, Clone)]
pub struct LetterTemplate {
    pub id: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders with no value, in order of first appearance.
    pub unresolved: Vec<String>,
}

pub struct LetterEngine {
    templates_dir: PathBuf,
    templates: Vec<TemplateInfo>,
}

impl LetterEngine {
    /// Create the engine and discover templates under `templates_dir`
    pub fn new(templates_dir: PathBuf) -> Result<Self> {
        let mut engine = Self {
            templates_dir,
            templates: Vec::new(),
        };
        engine.discover_templates()?;
        Ok(engine)
    }

    fn discover_templates(&mut self) -> Result<()> {
        self.templates.clear();

        if !self.templates_dir.exists() {
            app_log!(
                debug,
                "Templates directory does not exist: {}",
                self.templates_dir.display()
            );
            return Ok(());
        }

        let entries = std::fs::read_dir(&self.templates_dir).with_context(|| {
            format!(
                "Failed to read templates directory: {}",
                self.templates_dir.display()
            )
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir() && path.join("manifest.toml").exists())
            .collect();
        dirs.sort();

        for path in dirs {
            let Some(template_id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            match Self::load_template_info(&template_id, &path) {
                Ok(template) => {
                    app_log!(
                        trace,
                        "Loaded template: {} from {}",
                        template.id,
                        template.path.display()
                    );
                    self.templates.push(template);
                }
                Err(e) => app_log!(warn, "Failed to load template {}: {:#}", template_id, e),
            }
        }

        app_log!(info, "Discovered {} letter templates", self.templates.len());
        Ok(())
    }

    fn load_template_info(template_id: &str, template_path: &Path) -> Result<TemplateInfo> {
        let manifest_path = template_path.join("manifest.toml");
        let content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read manifest: {}", manifest_path.display()))?;
        let manifest: TemplateManifest = toml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", manifest_path.display()))?;

        let info = TemplateInfo {
            id: template_id.to_string(),
            path: template_path.to_path_buf(),
            manifest,
        };
        if !info.main_path().exists() {
            anyhow::bail!("Missing template body: {}", info.main_path().display());
        }
        Ok(info)
    }

    pub fn templates(&self) -> &[TemplateInfo] {
        &self.templates
    }

    pub fn get_template(&self, template_id: &str) -> Option<&TemplateInfo> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Pick the template for a listing: an explicit id, then the configured
    /// file, then a template for the platform, then a generic template, then
    /// the built-in letter.
    pub fn select(
        &self,
        explicit_id: Option<&str>,
        configured_file: Option<&Path>,
        platform: &str,
    ) -> Result<LetterTemplate> {
        if let Some(id) = explicit_id {
            if id == BUILTIN_TEMPLATE_ID {
                return Ok(Self::builtin());
            }
            let template = self.get_template(id).ok_or_else(|| {
                anyhow::anyhow!(
                    "Template '{}' not found. Available templates: {:?}",
                    id,
                    self.templates.iter().map(|t| t.id.as_str()).collect::<Vec<_>>()
                )
            })?;
            return Self::read_template(template);
        }

        if let Some(path) = configured_file {
            if path.is_file() {
                let body = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read template: {}", path.display()))?;
                return Ok(LetterTemplate {
                    id: path.display().to_string(),
                    body,
                });
            }
            app_log!(
                warn,
                "Configured cover letter template not found: {}",
                path.display()
            );
        }

        let chosen = self
            .templates
            .iter()
            .find(|t| t.supports(platform))
            .or_else(|| self.templates.iter().find(|t| t.is_generic()));
        match chosen {
            Some(template) => Self::read_template(template),
            None => Ok(Self::builtin()),
        }
    }

    fn read_template(template: &TemplateInfo) -> Result<LetterTemplate> {
        let path = template.main_path();
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template: {}", path.display()))?;
        Ok(LetterTemplate {
            id: template.id.clone(),
            body,
        })
    }

    pub fn builtin() -> LetterTemplate {
        LetterTemplate {
            id: BUILTIN_TEMPLATE_ID.to_string(),
            body: BUILTIN_LETTER.to_string(),
        }
    }

    /// Substitute `{{ var }}` and `${var}` placeholders. Unknown ones are
    /// left in place and reported.
    pub fn render(body: &str, variables: &HashMap<String, String>) -> Rendered {
        let mut unresolved: Vec<String> = Vec::new();
        let text = PLACEHOLDER
            .replace_all(body, |caps: &Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match variables.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        if !unresolved.iter().any(|u| u == name) {
                            unresolved.push(name.to_string());
                        }
                        caps[0].to_string()
                    }
                }
            })
            .into_owned();

        Rendered { text, unresolved }
    }
}
