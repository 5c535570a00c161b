//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::StorybookConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    MissingSecrets(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::MissingSecrets(names) => {
                write!(f, "Environment variable(s) not set: {}", names.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<StorybookConfig, ConfigError> {
    let config: StorybookConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<StorybookConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Load from `path` when given, otherwise validated defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<StorybookConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => parse_config(""),
    }
}

/// API keys read from the environment at startup.
#[derive(Clone)]
pub struct Secrets {
    pub text_api_key: String,
    pub image_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("text_api_key", &"<redacted>")
            .field("image_api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    /// Read both keys, reporting every missing variable at once.
    pub fn from_env(config: &StorybookConfig) -> Result<Self, ConfigError> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Read both keys through `lookup`.
    pub fn from_lookup<F>(config: &StorybookConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |name: &str| match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let text_api_key = read(&config.text.api_key_env);
        let image_api_key = read(&config.image.api_key_env);

        if !missing.is_empty() {
            return Err(ConfigError::MissingSecrets(missing));
        }

        Ok(Self {
            text_api_key,
            image_api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ConverterKind;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[story]\nchapters = 3\n\n[image]\nconcurrency = 2").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.story.chapters, 3);
        assert_eq!(config.image.concurrency, 2);
    }

    #[test]
    fn test_example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("storybook.example.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.text.models.len(), 2);
        assert_eq!(config.convert.methods.last(), Some(&ConverterKind::Html));
        assert_eq!(config.retries.image.max_attempts, 3);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[story\nchapters = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_lists_all() {
        let err = parse_config("[story]\nchapters = 0\nwords_per_chapter = 0").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed: "));
        assert!(msg.contains("story.chapters"));
        assert!(msg.contains("story.words_per_chapter"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_secrets_report_every_missing_variable() {
        let config = StorybookConfig::default();
        let err = Secrets::from_lookup(&config, |_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable(s) not set: GOOGLE_API_KEY, HUGGINGFACE_API_KEY"
        );

        let secrets = Secrets::from_lookup(&config, |name| Some(format!("{name}-value"))).unwrap();
        assert_eq!(secrets.text_api_key, "GOOGLE_API_KEY-value");
        assert!(!format!("{secrets:?}").contains("value"));
    }
}
