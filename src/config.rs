use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};
use crate::fs::fsync_dir;

/// on-disk format version written by this crate
pub const FORMAT_VERSION: u32 = 1;

/// repository configuration stored in config.toml
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// on-disk format version of the store
    pub format_version: u32,
    /// re-hash blob bytes when reading them back
    #[serde(default)]
    pub verify_blobs: bool,
    /// fsync files and directories after writes
    #[serde(default = "default_fsync")]
    pub fsync: bool,
    /// glob patterns (root-relative) excluded from scanning
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

fn default_fsync() -> bool {
    true
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        if config.format_version > FORMAT_VERSION {
            return Err(Error::UnsupportedFormat {
                found: config.format_version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(config)
    }

    /// atomically replace the config file
    ///
    /// staged in `tmp_dir`, then renamed over `path`.
    pub fn save(&self, path: &Path, tmp_dir: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        let tmp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(content.as_bytes()).with_path(&tmp_path)?;
            if self.fsync {
                tmp_file.sync_all().with_path(&tmp_path)?;
            }
        }

        fs::rename(&tmp_path, path).with_path(path)?;

        if self.fsync {
            if let Some(parent) = path.parent() {
                fsync_dir(parent)?;
            }
        }

        Ok(())
    }

    /// add an ignore pattern, validating it
    pub fn add_ignore(&mut self, pattern: impl Into<String>) -> Result<()> {
        let pattern = pattern.into();
        glob::Pattern::new(&pattern).map_err(|e| Error::InvalidPattern(format!("{pattern}: {e}")))?;
        if !self.ignore.contains(&pattern) {
            self.ignore.push(pattern);
        }
        Ok(())
    }

    /// compile ignore patterns
    pub fn ignore_patterns(&self) -> Result<Vec<glob::Pattern>> {
        self.ignore
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| Error::InvalidPattern(format!("{p}: {e}")))
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            verify_blobs: false,
            fsync: true,
            ignore: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config {
            format_version: FORMAT_VERSION,
            verify_blobs: true,
            fsync: false,
            ignore: vec!["*.tmp".to_string(), "cache/**".to_string()],
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_minimal_toml() {
        let config: Config = toml::from_str("format_version = 1\n").unwrap();
        assert!(!config.verify_blobs);
        assert!(config.fsync);
        assert!(config.ignore.is_empty());
    }

    #[test]
    fn test_config_rejects_newer_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "format_version = 99\n").unwrap();

        let result = Config::load(&path);
        assert!(matches!(
            result,
            Err(Error::UnsupportedFormat {
                found: 99,
                supported: FORMAT_VERSION
            })
        ));
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.add_ignore("*.bak").unwrap();
        config.save(&path, dir.path()).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.ignore, vec!["*.bak".to_string()]);
    }

    #[test]
    fn test_config_save_replaces_atomically() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        fs::create_dir(&tmp).unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "format_version = 1\nverify_blobs = true\n").unwrap();

        let config = Config::default();
        config.save(&path, &tmp).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
        // nothing left behind in the staging directory
        assert_eq!(fs::read_dir(&tmp).unwrap().count(), 0);
    }

    #[test]
    fn test_config_save_missing_tmp_dir_keeps_old_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "format_version = 1\nverify_blobs = true\n").unwrap();

        let result = Config::default().save(&path, &dir.path().join("missing"));

        assert!(matches!(result, Err(Error::Io { .. })));
        assert!(Config::load(&path).unwrap().verify_blobs);
    }

    #[test]
    fn test_add_ignore() {
        let mut config = Config::default();

        config.add_ignore("*.tmp").unwrap();
        config.add_ignore("*.tmp").unwrap();
        assert_eq!(config.ignore.len(), 1);

        // unclosed character class
        assert!(matches!(
            config.add_ignore("[abc"),
            Err(Error::InvalidPattern(_))
        ));
        assert_eq!(config.ignore_patterns().unwrap().len(), 1);
    }
}
