//! Pack configuration: the JSON document the driver reads and the core
//! consumes as a parsed tree.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::paths::build_globset;
use crate::FileProvider;

fn default_database() -> String {
    "phpack.db".to_string()
}

/// Complete representation of a `phpack.json` configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackConfig {
    /// Entry script, relative to the project root.
    pub entry: String,

    /// Destination path of the packed artifact.
    pub output: String,

    /// Store location, relative to the project root.
    #[serde(default = "default_database")]
    pub database: String,

    /// Glob patterns pre-scanned into the store before resolution.
    #[serde(default)]
    pub include_paths: Vec<String>,

    /// Glob patterns never analyzed.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Embedded autoload definitions, composer-shaped.
    #[serde(default)]
    pub autoload: AutoloadSection,

    #[serde(default)]
    pub optimization: OptimizationSection,

    /// Opaque keys passed through to the output preamble.
    #[serde(default)]
    pub runtime: BTreeMap<String, Value>,

    /// Persist decomposed ASTs for analyzed files.
    #[serde(default)]
    pub store_asts: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoloadSection {
    #[serde(default, rename = "psr-4")]
    pub psr4: BTreeMap<String, Value>,

    #[serde(default, rename = "psr-0")]
    pub psr0: BTreeMap<String, Value>,

    #[serde(default)]
    pub classmap: Vec<String>,

    #[serde(default)]
    pub files: Vec<String>,
}

impl AutoloadSection {
    pub fn is_empty(&self) -> bool {
        self.psr4.is_empty()
            && self.psr0.is_empty()
            && self.classmap.is_empty()
            && self.files.is_empty()
    }

    /// The composer-shaped document the autoload registrar consumes.
    pub fn as_document(&self) -> Value {
        serde_json::json!({
            "psr-4": self.psr4,
            "psr-0": self.psr0,
            "classmap": self.classmap,
            "files": self.files,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OptimizationSection {
    #[serde(default)]
    pub remove_comments: bool,

    #[serde(default)]
    pub remove_whitespace: bool,
}

impl PackConfig {
    pub fn load(fs: &dyn FileProvider, path: &Path) -> Result<Self, ConfigError> {
        let content = fs.read_file(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: PackConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.entry.trim().is_empty() {
            return Err(ConfigError::Invalid("entry must not be empty".to_string()));
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::Invalid("output must not be empty".to_string()));
        }
        // Pattern syntax surfaces at load time, not mid-scan.
        build_globset(&self.include_paths)?;
        build_globset(&self.exclude_patterns)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryFileProvider;

    fn load(json: &str) -> Result<PackConfig, ConfigError> {
        let fs = InMemoryFileProvider::new();
        fs.add_file("/proj/phpack.json", json);
        PackConfig::load(&fs, Path::new("/proj/phpack.json"))
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = load(r#"{"entry": "main.php", "output": "dist/app.php"}"#).unwrap();
        assert_eq!(config.database, "phpack.db");
        assert!(config.include_paths.is_empty());
        assert!(!config.optimization.remove_comments);
        assert!(config.autoload.is_empty());
    }

    #[test]
    fn missing_entry_is_configuration_error() {
        let err = load(r#"{"output": "dist/app.php"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));

        let err = load(r#"{"entry": " ", "output": "dist/app.php"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn full_config_round_trips() {
        let config = load(
            r#"{
                "entry": "bin/app.php",
                "output": "dist/app.php",
                "database": "var/pack.db",
                "include_paths": ["src/**/*.php"],
                "exclude_patterns": ["**/*Test.php"],
                "autoload": {"psr-4": {"App\\": "src/"}, "files": ["helpers.php"]},
                "optimization": {"remove_comments": true},
                "runtime": {"memory_limit": "512M"},
                "store_asts": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.entry, "bin/app.php");
        assert_eq!(config.database, "var/pack.db");
        assert!(config.optimization.remove_comments);
        assert!(!config.optimization.remove_whitespace);
        assert!(config.store_asts);
        assert_eq!(config.autoload.files, vec!["helpers.php"]);
        assert_eq!(
            config.runtime.get("memory_limit").and_then(Value::as_str),
            Some("512M")
        );
    }

    #[test]
    fn bad_glob_is_rejected() {
        let err = load(
            r#"{"entry": "main.php", "output": "o.php", "include_paths": ["src/[.php"]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::BadPattern { .. }));
    }
}
