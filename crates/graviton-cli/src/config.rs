//! `graviton.toml` loading.
//!
//! ```toml
//! store_dir = ".graviton"
//! db_name = "graviton"
//! test_mode = false   # appends "-test" to db_name
//! demo_data = false   # ensure the demo set on every run
//! log_filter = "graviton=info"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "graviton.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GravitonConfig {
    pub store_dir: PathBuf,
    pub db_name: String,
    pub test_mode: bool,
    pub demo_data: bool,
    pub log_filter: String,
}

impl Default for GravitonConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(".graviton"),
            db_name: "graviton".to_string(),
            test_mode: false,
            demo_data: false,
            log_filter: "graviton=info".to_string(),
        }
    }
}

impl GravitonConfig {
    /// Load `path`. A missing file yields the defaults unless the path was
    /// requested explicitly.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.db_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "db_name",
                message: "must not be empty".to_string(),
            });
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::Invalid {
                field: "db_name",
                message: format!("`{name}` must be a plain directory name"),
            });
        }
        Ok(())
    }

    pub fn effective_db_name(&self) -> String {
        if self.test_mode {
            format!("{}-test", self.db_name)
        } else {
            self.db_name.clone()
        }
    }

    /// Directory holding the collection files.
    pub fn store_path(&self) -> PathBuf {
        self.store_dir.join(self.effective_db_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = GravitonConfig::load(Path::new("/nonexistent/graviton.toml"), false)
            .expect("defaults");
        assert_eq!(config, GravitonConfig::default());
        assert_eq!(config.store_path(), PathBuf::from(".graviton/graviton"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = GravitonConfig::load(Path::new("/nonexistent/graviton.toml"), true)
            .expect_err("explicit path must exist");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_mode_suffixes_database() {
        let config = GravitonConfig::parse(
            "store_dir = \"/var/lib/graviton\"\ntest_mode = true\n",
            Path::new("graviton.toml"),
        )
        .expect("parse");
        assert_eq!(config.effective_db_name(), "graviton-test");
        assert_eq!(
            config.store_path(),
            PathBuf::from("/var/lib/graviton/graviton-test")
        );
        assert_eq!(config.log_filter, "graviton=info");
    }

    #[test]
    fn rejects_unknown_keys_and_bad_names() {
        let err = GravitonConfig::parse("mongo_address = \"localhost\"\n", Path::new("g.toml"))
            .expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = GravitonConfig::parse("db_name = \"../escape\"\n", Path::new("g.toml"))
            .expect_err("path-like name");
        assert!(matches!(err, ConfigError::Invalid { field: "db_name", .. }));
    }
}
