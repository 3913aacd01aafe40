// src/core/fs_ops.rs
//! File system helpers shared by reports, letters and notifications

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use crate::app_log;

pub struct FsOps;

impl FsOps {
    /// Ensure directory exists
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            app_log!(info, "Created directory: {}", path.display());
        }
        Ok(())
    }

    /// Write file, creating parent directories as needed
    pub async fn write_file_safe(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        app_log!(debug, "Written file: {}", path.display());
        Ok(())
    }

    /// Resolve `relative` against `base` unless it is already absolute
    pub fn normalize_path(base: &Path, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            base.join(relative)
        }
    }

    /// Make a string safe to use as a file name component
    pub fn sanitize_file_name(name: &str) -> String {
        name.trim()
            .chars()
            .filter_map(|c| match c {
                '~' => None,
                c if c.is_alphanumeric() => Some(c),
                '-' | '_' | '.' => Some(c),
                _ => Some('-'),
            })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
            .trim_matches(|c| c == '.' || c == '-')
            .to_string()
    }
}
