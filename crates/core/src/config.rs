use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TOML at line {line}, column {column}: {message}")]
    InvalidToml {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("missing required fields: {fields:?}")]
    MissingRequiredFields { fields: Vec<String> },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    pub rest: RestConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub event_bus: EventBusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub jid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// Backend id of the signed-in user, used by `/users/{id}` endpoints.
    pub user_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
        }
    }
}

impl PresenceConfig {
    pub fn confirmation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.confirmation_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct ConfigOverrides {
    jid: Option<String>,
    rest_url: Option<String>,
    token: Option<String>,
    log_level: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_confirmation_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const DEFAULT_CONFIG_TOML: &str = r#"[account]
jid = ""

[rest]
base_url = ""
# token = ""
# user_id = ""
timeout_secs = 30

[presence]
confirmation_timeout_ms = 10000

[logging]
level = "info"

[event_bus]
channel_capacity = 1024
"#;

/// Return the resolved platform-appropriate configuration file path.
pub fn config_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "huddle", "huddle") {
        proj_dirs.config_dir().join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}

/// Load configuration from the platform config path, merging environment
/// variable overrides.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(config_path())
}

pub fn load_config_from(path: PathBuf) -> Result<Config, ConfigError> {
    load_config_from_with_overrides(path, config_overrides_from_env())
}

pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    load_config_from_str_with_overrides(toml_str, config_overrides_from_env())
}

fn load_config_from_with_overrides(
    path: PathBuf,
    overrides: ConfigOverrides,
) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            create_default_config(&path)?;
            return Err(ConfigError::MissingRequiredFields {
                fields: vec!["account.jid".to_string(), "rest.base_url".to_string()],
            });
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    load_config_from_str_with_overrides(&contents, overrides)
}

fn load_config_from_str_with_overrides(
    toml_str: &str,
    overrides: ConfigOverrides,
) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(toml_str).map_err(|e| {
        let (line, column) = e.span().map_or((0, 0), |span| {
            let before = &toml_str[..span.start];
            let line = before.chars().filter(|&c| c == '\n').count() + 1;
            let column = before
                .rfind('\n')
                .map_or(span.start + 1, |nl| span.start - nl);
            (line, column)
        });
        ConfigError::InvalidToml {
            line,
            column,
            message: e.message().to_string(),
        }
    })?;

    apply_overrides(&mut config, overrides);
    validate(&config)?;

    Ok(config)
}

fn config_overrides_from_env() -> ConfigOverrides {
    ConfigOverrides {
        jid: std::env::var("HUDDLE_JID").ok(),
        rest_url: std::env::var("HUDDLE_REST_URL").ok(),
        token: std::env::var("HUDDLE_TOKEN").ok(),
        log_level: std::env::var("HUDDLE_LOG_LEVEL").ok(),
    }
}

fn apply_overrides(config: &mut Config, overrides: ConfigOverrides) {
    if let Some(jid) = overrides.jid {
        config.account.jid = jid;
    }
    if let Some(url) = overrides.rest_url {
        config.rest.base_url = url;
    }
    if let Some(token) = overrides.token {
        config.rest.token = Some(token);
    }
    if let Some(level) = overrides.log_level {
        config.logging.level = level;
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut missing = Vec::new();

    if config.account.jid.is_empty() {
        missing.push("account.jid".to_string());
    }
    if config.rest.base_url.is_empty() {
        missing.push("rest.base_url".to_string());
    }

    if !missing.is_empty() {
        return Err(ConfigError::MissingRequiredFields { fields: missing });
    }

    match url::Url::parse(&config.rest.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => {
            return Err(ConfigError::InvalidValue {
                field: "rest.base_url".to_string(),
                message: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Err(e) => {
            return Err(ConfigError::InvalidValue {
                field: "rest.base_url".to_string(),
                message: e.to_string(),
            });
        }
    }

    if config.presence.confirmation_timeout_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "presence.confirmation_timeout_ms".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if !VALID_LOG_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::InvalidValue {
            field: "logging.level".to_string(),
            message: format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
        });
    }

    Ok(())
}

fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML)?;
    Ok(())
}
