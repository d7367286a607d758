use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Built-in pain-point vocabulary, in reporting order.
pub const DEFAULT_PAIN_POINTS: &[&str] = &[
    "collections",
    "late payments",
    "charge off",
    "bankruptcy",
    "foreclosure",
    "repossession",
    "identity theft",
    "judgment",
    "tax lien",
    "medical bills",
    "student loans",
    "denied",
    "high interest",
];

pub const DEFAULT_URGENCY_KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "emergency",
    "immediately",
    "right away",
    "as soon as possible",
    "deadline",
];

/// Keyword vocabulary used by the feature extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub pain_points: Vec<String>,
    pub urgency: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            pain_points: DEFAULT_PAIN_POINTS.iter().map(|s| (*s).to_string()).collect(),
            urgency: DEFAULT_URGENCY_KEYWORDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Load and validate a keyword override file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_keywords(path: &Path) -> Result<KeywordConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::KeywordsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_keywords(&content)
}

fn parse_keywords(content: &str) -> Result<KeywordConfig, ConfigError> {
    let config: KeywordConfig = serde_yaml::from_str(content)?;
    validate_keywords(&config)?;
    Ok(config)
}

fn validate_keywords(config: &KeywordConfig) -> Result<(), ConfigError> {
    if config.pain_points.is_empty() {
        return Err(ConfigError::KeywordsValidation(
            "pain_points must not be empty".to_string(),
        ));
    }
    if config.urgency.is_empty() {
        return Err(ConfigError::KeywordsValidation(
            "urgency must not be empty".to_string(),
        ));
    }
    if let Some(blank) = config
        .pain_points
        .iter()
        .chain(config.urgency.iter())
        .find(|k| k.trim().is_empty())
    {
        return Err(ConfigError::KeywordsValidation(format!(
            "blank keyword entry: {blank:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lists_are_valid() {
        assert!(validate_keywords(&KeywordConfig::default()).is_ok());
    }

    #[test]
    fn parses_yaml_override() {
        let yaml = "pain_points:\n  - collections\n  - eviction\nurgency:\n  - urgent\n";
        let config = parse_keywords(yaml).expect("valid yaml");
        assert_eq!(config.pain_points, vec!["collections", "eviction"]);
        assert_eq!(config.urgency, vec!["urgent"]);
    }

    #[test]
    fn empty_pain_points_rejected() {
        let yaml = "pain_points: []\nurgency:\n  - urgent\n";
        assert!(matches!(
            parse_keywords(yaml),
            Err(ConfigError::KeywordsValidation(_))
        ));
    }

    #[test]
    fn blank_entry_rejected() {
        let yaml = "pain_points:\n  - collections\n  - '  '\nurgency:\n  - urgent\n";
        assert!(matches!(
            parse_keywords(yaml),
            Err(ConfigError::KeywordsValidation(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_keywords(Path::new("/nonexistent/keywords.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/keywords.yaml"));
    }

    #[test]
    fn sample_file_matches_builtin_lists() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/keywords.yaml");
        let config = load_keywords(&path).expect("sample keywords file");
        assert_eq!(config, KeywordConfig::default());
    }
}
