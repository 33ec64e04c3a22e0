// Scan configuration loading for idorscan
// YAML config files and CLI header arguments map onto ScanConfig

use std::fs;
use std::path::Path;

use crate::error::ScanError;
use crate::models::ScanConfig;

/// Load and validate a scan config from a YAML file.
///
/// `concurrency` and `timeout_secs` fall back to their defaults when
/// omitted; everything else is required.
pub fn load_config(path: &Path) -> Result<ScanConfig, ScanError> {
    let content = fs::read_to_string(path)?;
    let config: ScanConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Split a CLI header argument of the form `KEY: VALUE` at the first
/// colon, trimming both sides. Names keep their original case.
pub fn parse_header(raw: &str) -> Result<(String, String), ScanError> {
    let (name, value) = raw.split_once(':').ok_or_else(|| {
        ScanError::InvalidConfig(format!("headers must be in 'KEY: VALUE' format: {}", raw))
    })?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_splits_at_first_colon() {
        let (name, value) = parse_header("Authorization: Bearer a:b:c").unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Bearer a:b:c");
    }

    #[test]
    fn test_parse_header_preserves_case() {
        let (name, _) = parse_header("X-Api-Key: secret").unwrap();
        assert_eq!(name, "X-Api-Key");
    }

    #[test]
    fn test_parse_header_rejects_missing_colon() {
        let result = parse_header("not-a-header");
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    }

    #[test]
    fn test_yaml_defaults_apply() {
        let yaml = "target: \"http://localhost/items/{id}\"\nid_start: 1\nid_end: 50\n";
        let config: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.timeout_secs, 10);
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_yaml_full_config() {
        let yaml = concat!(
            "target: \"http://localhost/items/{id}\"\n",
            "id_start: 10\n",
            "id_end: 20\n",
            "concurrency: 8\n",
            "timeout_secs: 3\n",
            "headers:\n",
            "  Authorization: Bearer token\n",
            "  X-Trace: \"1\"\n",
        );
        let config: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.headers["Authorization"], "Bearer token");
        // Declaration order survives the round trip.
        let names: Vec<&str> = config.headers.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["Authorization", "X-Trace"]);
    }
}
