//! Stenolens configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::LensError;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");

/// Default interval between quota probes while the quota is exhausted.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 60 * 60;

/// Configuration for the annotation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensConfig {
    /// API key for the explanation service.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whether inline annotations are shown at all.
    #[serde(default = "default_true")]
    pub annotations: bool,

    /// Place annotations at column zero.
    #[serde(default)]
    pub zero_column: bool,

    /// Append the attribution footer to tooltips.
    #[serde(default = "default_true")]
    pub generated_by: bool,

    /// Locate fragments with a dry run and explain each one on demand.
    #[serde(default)]
    pub lazy_resolve: bool,

    /// File extension to service language identifier.
    #[serde(default = "default_languages")]
    pub languages: BTreeMap<String, String>,

    /// Base URL of the explanation service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Cooldown between quota probes, in seconds.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Transport timeout for remote calls, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Whether the cache snapshot is written to disk.
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Directory for the cache snapshot. Defaults to the user cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    stenolens_client::DEFAULT_BASE_URL.to_string()
}

fn default_probe_interval() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECS
}

fn default_timeout() -> u64 {
    stenolens_client::DEFAULT_TIMEOUT.as_secs()
}

/// Extensions the service understands out of the box.
pub fn default_languages() -> BTreeMap<String, String> {
    [
        ("ts", "typescript"),
        ("tsx", "tsx"),
        ("jsx", "javascript"),
        ("js", "javascript"),
        ("py", "python"),
        ("html", "html"),
        ("rb", "ruby"),
        ("vue", "vue"),
        ("sol", "solidity"),
    ]
    .into_iter()
    .map(|(ext, lang)| (ext.to_string(), lang.to_string()))
    .collect()
}

impl LensConfig {
    /// Configuration file names, in order of precedence.
    pub const CONFIG_FILES: &'static [&'static str] = &[".stenolens.json", "stenolens.json"];

    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            api_key: None,
            annotations: true,
            zero_column: false,
            generated_by: true,
            lazy_resolve: false,
            languages: default_languages(),
            base_url: default_base_url(),
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            timeout_secs: default_timeout(),
            persist: true,
            cache_dir: None,
        }
    }

    /// Finds a configuration file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        Self::CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LensError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| LensError::config(format!("Failed to read config: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parses configuration from a JSON string with schema validation.
    pub fn from_json(json: &str) -> Result<Self, LensError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| LensError::config(format!("Invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Parses configuration from a JSON value with schema validation.
    pub fn from_value(value: serde_json::Value) -> Result<Self, LensError> {
        let schema_json: serde_json::Value = serde_json::from_str(SCHEMA_JSON)
            .map_err(|e| LensError::config(format!("Invalid embedded schema: {}", e)))?;
        let schema = Validator::new(&schema_json)
            .map_err(|e| LensError::config(format!("Invalid config schema: {}", e)))?;

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(LensError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| LensError::config(format!("Invalid config: {}", e)))
    }

    /// Returns the service language for a file, based on its extension.
    pub fn language_for(&self, path: &Path) -> Option<&str> {
        let extension = path.extension()?.to_str()?;
        self.languages.get(extension).map(String::as_str)
    }

    /// Returns the API key if one is set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Extensions that have a language mapping.
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.languages.keys().map(String::as_str).collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory for the cache snapshot, or `None` when persistence is off.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if !self.persist {
            return None;
        }
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("stenolens")))
    }
}

impl Default for LensConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_config_new() {
        let config = LensConfig::new();
        assert!(config.annotations);
        assert!(config.generated_by);
        assert!(!config.zero_column);
        assert!(!config.lazy_resolve);
        assert_eq!(config.api_key(), None);
        assert_eq!(config.probe_interval_secs, 3600);
        assert_eq!(config.languages.len(), 9);
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = LensConfig::from_json("{}").unwrap();
        assert_eq!(config, LensConfig::default());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "apiKey": "secret",
            "annotations": false,
            "zeroColumn": true,
            "lazyResolve": true,
            "languages": { "py": "python", "pyi": "python" },
            "probeIntervalSecs": 60,
            "persist": false
        }"#;

        let config = LensConfig::from_json(json).unwrap();
        assert_eq!(config.api_key(), Some("secret"));
        assert!(!config.annotations);
        assert!(config.zero_column);
        assert!(config.lazy_resolve);
        assert_eq!(config.languages.len(), 2);
        assert_eq!(config.probe_interval_secs, 60);
        assert_eq!(config.resolved_cache_dir(), None);
    }

    #[rstest]
    #[case::python("a.py", Some("python"))]
    #[case::tsx("src/App.tsx", Some("tsx"))]
    #[case::solidity("/contracts/Token.sol", Some("solidity"))]
    #[case::unsupported("notes.md", None)]
    #[case::no_extension("Makefile", None)]
    fn test_language_for(#[case] path: &str, #[case] expected: Option<&str>) {
        let config = LensConfig::new();
        assert_eq!(config.language_for(Path::new(path)), expected);
    }

    #[test]
    fn test_supported_extensions_sorted() {
        let mut config = LensConfig::new();
        config.languages = [("py", "python"), ("go", "go")]
            .into_iter()
            .map(|(ext, lang)| (ext.to_string(), lang.to_string()))
            .collect();
        assert_eq!(config.supported_extensions(), vec!["go", "py"]);
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let config = LensConfig {
            api_key: Some("   ".to_string()),
            ..LensConfig::new()
        };
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn test_explicit_cache_dir() {
        let config = LensConfig {
            cache_dir: Some(PathBuf::from("/tmp/stenolens-test")),
            ..LensConfig::new()
        };
        assert_eq!(
            config.resolved_cache_dir(),
            Some(PathBuf::from("/tmp/stenolens-test"))
        );
    }

    #[test]
    fn test_discover() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(LensConfig::discover(temp_dir.path()), None);

        let path = temp_dir.path().join("stenolens.json");
        fs::write(&path, "{}").unwrap();
        assert_eq!(LensConfig::discover(temp_dir.path()), Some(path));
    }

    #[rstest]
    #[case::unknown_property(r#"{ "apiKeyy": "x" }"#)]
    #[case::type_mismatch(r#"{ "annotations": "yes" }"#)]
    #[case::empty_language(r#"{ "languages": { "py": "" } }"#)]
    #[case::zero_timeout(r#"{ "timeoutSecs": 0 }"#)]
    fn test_config_validation_errors(#[case] json: &str) {
        let result = LensConfig::from_json(json);
        assert!(result.is_err(), "Expected error for JSON: {}", json);
        let err = result.unwrap_err();
        assert!(
            err.to_string().contains("Config validation failed"),
            "Unexpected error message '{}'",
            err
        );
    }
}
