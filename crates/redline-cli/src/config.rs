//! Configuration file support
//!
//! Settings are read from `~/.redline.toml` (user) and `./.redline.toml`
//! (project). Precedence, highest first:
//! 1. Command-line arguments
//! 2. Environment variables (`REDLINE_AUTHOR`, `REDLINE_MERGE_REVISIONS`,
//!    `REDLINE_INCLUDE_COMMENTS`)
//! 3. Project config
//! 4. User config
//! 5. Built-in defaults

use anyhow::{Context, Result};
use colored::Colorize;
use redline_core::{ReviewOptions, TagConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".redline.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults for the read command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<ReadConfig>,

    /// Defaults for the write command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<WriteConfig>,

    /// Delimiter overrides; missing fields keep their defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Default view (tagged, added, deleted, comments, final, original, all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_revisions: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_comments: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
}

impl Config {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).with_context(|| {
            format!("Failed to parse config file: {}", path.display())
        })
    }

    /// Load the user and project configs and merge them
    pub fn discover() -> Self {
        Self::merge(Self::load_user_config(), Self::load_project_config())
    }

    /// Load user config from ~/.redline.toml
    fn load_user_config() -> Option<Self> {
        let config_path = dirs::home_dir()?.join(CONFIG_FILE_NAME);
        Self::load_if_present(&config_path, "user")
    }

    /// Load project config from ./.redline.toml
    fn load_project_config() -> Option<Self> {
        Self::load_if_present(&PathBuf::from(CONFIG_FILE_NAME), "project")
    }

    fn load_if_present(path: &Path, scope: &str) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!(
                    "{} Failed to load {scope} config from {}: {e:#}",
                    "Warning:".yellow().bold(),
                    path.display()
                );
                None
            }
        }
    }

    /// Merge with precedence project > user > defaults
    ///
    /// Each table is taken whole from the highest-precedence file that has it.
    pub fn merge(user_config: Option<Self>, project_config: Option<Self>) -> Self {
        let mut merged = Self::default();
        for config in [user_config, project_config].into_iter().flatten() {
            if config.read.is_some() {
                merged.read = config.read;
            }
            if config.write.is_some() {
                merged.write = config.write;
            }
            if config.tags.is_some() {
                merged.tags = config.tags;
            }
        }
        merged
    }

    /// Review options before command-line overrides are applied
    pub fn review_options(&self) -> ReviewOptions {
        let mut options = ReviewOptions::default();
        if let Some(tags) = &self.tags {
            options.tags = tags.clone();
        }
        if let Some(read) = &self.read {
            if let Some(merge) = read.merge_revisions {
                options.merge_revisions = merge;
            }
            if let Some(include) = read.include_comments {
                options.include_comments = include;
            }
        }
        if let Some(write) = &self.write {
            if let Some(author) = &write.author {
                options.author.clone_from(author);
            }
            if let Some(color) = &write.highlight_color {
                options.highlight_color.clone_from(color);
            }
        }
        options
    }

    /// The configured default view name, if any
    pub fn default_view(&self) -> Option<&str> {
        self.read.as_ref()?.view.as_deref()
    }
}
