//! Config manager for loading, saving, and atomic updates.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Section-level updates (only modified section is changed)
//! - Validation on load
//! - Preserves comments in untouched sections with toml_edit

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages the offset finder configuration file.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` or `load_or_create()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to the current settings.
    ///
    /// Changes stay in memory until `save()` or `update_section()` is called.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file.
    ///
    /// Returns error if file doesn't exist or holds invalid values.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = parse_and_validate(&content)?;
        Ok(())
    }

    /// Load config from file, creating with defaults if it doesn't exist.
    ///
    /// Unknown tables or missing keys are normalized and written back.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let settings = parse_and_validate(&content)?;
            let was_modified = needs_rewrite(&content, &settings)?;
            self.settings = settings;

            if was_modified {
                tracing::debug!("Normalizing config at {}", self.config_path.display());
                self.save()?;
            }
        } else {
            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Update a specific section atomically.
    ///
    /// Re-reads the file from disk, replaces only the given table and writes
    /// back atomically. Other tables keep their on-disk content and comments.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        self.settings.validate().map_err(ConfigError::Invalid)?;

        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let section_doc: DocumentMut = self.section_toml(section)?.parse()?;
        doc[section.table_name()] = Item::Table(section_doc.as_table().clone());

        self.atomic_write(&doc.to_string())?;
        Ok(())
    }

    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        let content = match section {
            ConfigSection::Search => toml::to_string_pretty(&self.settings.search)?,
            ConfigSection::Features => toml::to_string_pretty(&self.settings.features)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
        };
        Ok(content)
    }

    /// Generate config content with a comment above every section.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();

        output.push_str("# Audio offset finder configuration\n");
        output.push_str(
            "# This file is auto-generated. Comments may be preserved on section updates.\n",
        );

        for section in ConfigSection::ALL {
            let comment = match section {
                ConfigSection::Search => "# Windowed offset search",
                ConfigSection::Features => "# Per-frame feature extraction",
                ConfigSection::Logging => "# Logging configuration",
            };
            output.push('\n');
            output.push_str(comment);
            output.push('\n');
            output.push_str(&format!("[{}]\n", section.table_name()));
            for line in self.section_toml(section)?.lines() {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    /// Write content to config file atomically.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Same directory as the target so the rename stays on one filesystem
        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;
        Ok(())
    }
}

/// Parse config content and check its values.
fn parse_and_validate(content: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    settings.validate().map_err(ConfigError::Invalid)?;
    Ok(settings)
}

/// Whether the file has unknown tables or lacks keys the defaults fill in.
fn needs_rewrite(content: &str, settings: &Settings) -> ConfigResult<bool> {
    let doc: DocumentMut = content.parse()?;
    let has_unknown = doc.iter().any(|(key, _)| {
        !ConfigSection::ALL
            .iter()
            .any(|section| section.table_name() == key)
    });

    let mut has_missing = false;
    for section in ConfigSection::ALL {
        let expected: DocumentMut = match section {
            ConfigSection::Search => toml::to_string_pretty(&settings.search)?,
            ConfigSection::Features => toml::to_string_pretty(&settings.features)?,
            ConfigSection::Logging => toml::to_string_pretty(&settings.logging)?,
        }
        .parse()?;

        let present = doc.get(section.table_name()).and_then(Item::as_table);
        has_missing |= match present {
            Some(table) => expected.iter().any(|(key, _)| !table.contains_key(key)),
            None => true,
        };
    }

    Ok(has_unknown || has_missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SliceFailurePolicy;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("offset.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[search]"));
        assert!(content.contains("[features]"));
        assert!(content.contains("[logging]"));

        // Generated file parses back to the defaults
        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().search.sample_rate, 16000);
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("offset.toml");
        fs::write(&config_path, "[search]\nwindow_seconds = 300.0\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().search.window_seconds, 300.0);
        // Missing tables were filled in on disk
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[features]"));
        assert!(content.contains("window_seconds = 300.0"));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("offset.toml");
        fs::write(&config_path, "[features]\nn_mfcc = 80\nn_mels = 40\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        assert!(matches!(manager.load(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("offset.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        // Hand edit in another section survives the update
        let content = fs::read_to_string(&config_path).unwrap();
        fs::write(
            &config_path,
            content.replace("n_chroma = 10", "n_chroma = 12 # tuned"),
        )
        .unwrap();

        manager.settings_mut().search.slice_failure = SliceFailurePolicy::Abort;
        manager.update_section(ConfigSection::Search).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("slice_failure = \"abort\""));
        assert!(content.contains("n_chroma = 12 # tuned"));
    }

    #[test]
    fn update_section_refuses_invalid_settings() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("offset.toml"));
        manager.settings_mut().search.sample_rate = 0;
        assert!(matches!(
            manager.update_section(ConfigSection::Search),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("offset.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(!temp_path.exists());
    }
}
