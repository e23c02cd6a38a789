//! Configuration for modbot.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MODBOT_CLASSIFIER_URL, MODBOT_LLM_API_KEY, ...)
//! 2. Config file (.modbot/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .modbot/config.yaml
//! - Falls back to <config dir>/modbot/config.yaml (e.g. ~/.config on Linux)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::core::{ChannelNames, RetryPolicy, DEFAULT_LANES};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Priorities derived from harm assessments go up to 2
const MIN_LANES: usize = 3;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsConfig {
    /// Channel whose messages are auto-reviewed
    pub user: Option<String>,
    /// Channel for notices, verdicts and queue commands
    pub moderation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueConfig {
    /// Lane names, most urgent first
    pub lanes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub delay_seconds: Option<u64>,
}

/// Classifier endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSettings {
    pub url: String,
    pub token: Option<String>,
}

/// LLM endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub channels: ChannelNames,
    /// Queue lane names, most urgent first
    pub lanes: Vec<String>,
    /// `None` disables automatic review
    pub classifier: Option<ClassifierSettings>,
    /// `None` disables categorization and recommendations
    pub llm: Option<LlmSettings>,
    pub retry: RetryPolicy,
}

/// Find config file by searching current directory and parents, then the
/// user config directory
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".modbot").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("modbot").join("config.yaml"))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge a parsed file with environment overrides
fn resolve(
    config_file: Option<PathBuf>,
    file: ConfigFile,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let defaults = ChannelNames::default();
    let channels = ChannelNames {
        user_channel: file.channels.user.unwrap_or(defaults.user_channel),
        mod_channel: file.channels.moderation.unwrap_or(defaults.mod_channel),
    };

    let lanes = file
        .queue
        .lanes
        .unwrap_or_else(|| DEFAULT_LANES.iter().map(|s| s.to_string()).collect());
    if lanes.len() < MIN_LANES {
        anyhow::bail!(
            "queue.lanes must name at least {} lanes, got {}",
            MIN_LANES,
            lanes.len()
        );
    }

    let classifier = env("MODBOT_CLASSIFIER_URL")
        .or(file.classifier.url)
        .map(|url| ClassifierSettings {
            url,
            token: env("MODBOT_CLASSIFIER_TOKEN").or(file.classifier.token.clone()),
        });

    let llm = env("MODBOT_LLM_API_KEY")
        .or_else(|| env("OPENAI_API_KEY"))
        .or(file.llm.api_key)
        .map(|api_key| LlmSettings {
            base_url: env("MODBOT_LLM_BASE_URL")
                .or(file.llm.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: env("MODBOT_LLM_MODEL")
                .or(file.llm.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
        });

    let retry = RetryPolicy::fixed(
        file.retry.max_attempts.unwrap_or(3),
        Duration::from_secs(file.retry.delay_seconds.unwrap_or(60)),
    );

    Ok(ResolvedConfig {
        config_file,
        channels,
        lanes,
        classifier,
        llm,
        retry,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(config_file, file, |key| {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Hide all but the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, ConfigFile::default(), no_env).unwrap();

        assert_eq!(config.channels, ChannelNames::default());
        assert_eq!(config.lanes.len(), 3);
        assert_eq!(config.lanes[0], DEFAULT_LANES[0]);
        assert!(config.classifier.is_none());
        assert!(config.llm.is_none());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(60));
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let modbot_dir = temp.path().join(".modbot");
        std::fs::create_dir_all(&modbot_dir).unwrap();

        let config_path = modbot_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
channels:
  user: group-7
  moderation: group-7-mod
queue:
  lanes: [urgent, soon, later, someday]
classifier:
  url: https://classifier.example/classify
llm:
  model: gpt-4o
  api_key: sk-file-key
retry:
  max_attempts: 5
  delay_seconds: 2
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        let config = resolve(Some(config_path.clone()), parsed, no_env).unwrap();

        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(config.channels.mod_channel, "group-7-mod");
        assert_eq!(config.lanes, vec!["urgent", "soon", "later", "someday"]);
        assert_eq!(
            config.classifier.unwrap().url,
            "https://classifier.example/classify"
        );
        let llm = config.llm.unwrap();
        assert_eq!(llm.model, "gpt-4o");
        assert_eq!(llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("MODBOT_CLASSIFIER_URL", "http://localhost:8080/classify"),
            ("OPENAI_API_KEY", "sk-env-key"),
            ("MODBOT_LLM_BASE_URL", "http://localhost:11434/v1"),
        ]
        .into_iter()
        .collect();
        let file = ConfigFile {
            classifier: ClassifierConfig {
                url: Some("https://from-file".to_string()),
                token: Some("file-token".to_string()),
            },
            ..Default::default()
        };

        let config = resolve(None, file, |key| env.get(key).map(|v| v.to_string())).unwrap();

        let classifier = config.classifier.unwrap();
        assert_eq!(classifier.url, "http://localhost:8080/classify");
        assert_eq!(classifier.token.as_deref(), Some("file-token"));
        let llm = config.llm.unwrap();
        assert_eq!(llm.api_key, "sk-env-key");
        assert_eq!(llm.base_url, "http://localhost:11434/v1");
        assert_eq!(llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_too_few_lanes_rejected() {
        let file = ConfigFile {
            queue: QueueConfig {
                lanes: Some(vec!["only".to_string(), "two".to_string()]),
            },
            ..Default::default()
        };
        assert!(resolve(None, file, no_env).is_err());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdef123456"), "****3456");
        assert_eq!(mask_secret("abc"), "****");
    }
}
