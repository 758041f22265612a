//! Analysis configuration
//!
//! Read from a JSON file; every field is optional and falls back to
//! [`AnalysisConfig::default`].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "BRANCHSCOPE_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Annotate vertices with distances to mutations
    pub compute_distances: bool,
    /// Produce probe edit lists
    pub instrument: bool,
    /// Treat non-private `<init>` methods as usable
    pub analyze_constructors: bool,
    /// Method names (bare, without descriptor) never analyzed
    pub excluded_methods: BTreeSet<String>,
    /// Keep a minimal decision graph next to each full graph
    pub minimize_graphs: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            compute_distances: true,
            instrument: true,
            analyze_constructors: true,
            excluded_methods: BTreeSet::new(),
            minimize_graphs: false,
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load `path` if one was given, defaults otherwise
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn is_excluded(&self, method: &str) -> bool {
        self.excluded_methods.contains(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = AnalysisConfig::from_json(r#"{"instrument": false}"#).unwrap();
        assert!(!config.instrument);
        assert!(config.compute_distances);
        assert!(config.excluded_methods.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"excluded_methods": ["toString"], "minimize_graphs": true}}"#
        )
        .unwrap();
        let config = AnalysisConfig::resolve(Some(file.path())).unwrap();
        assert!(config.is_excluded("toString"));
        assert!(config.minimize_graphs);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let err = AnalysisConfig::load(Path::new("/nonexistent/branchscope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/branchscope.json"));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = AnalysisConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_resolve_without_path() {
        assert_eq!(AnalysisConfig::resolve(None).unwrap(), AnalysisConfig::default());
    }
}
