// src/core/mod.rs
//! Shared services: storage, file system and letter templates

pub mod database;
pub mod fs_ops;
pub mod template_engine;

pub use database::Database;
pub use fs_ops::FsOps;
pub use template_engine::{LetterEngine, LetterTemplate, Rendered, TemplateInfo};
