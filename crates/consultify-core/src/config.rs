use crate::error::Result;
use crate::types::Provider;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEV_JWT_SECRET: &str = "consultify-dev-secret-change-me";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3005
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "consultify.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_password_min")]
    pub password_min_length: usize,
}

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_token_ttl() -> i64 {
    24
}

fn default_password_min() -> usize {
    8
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl(),
            password_min_length: default_password_min(),
        }
    }
}

// ---------------------------------------------------------------------------
// BillingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Tokens credited to a freshly registered organization.
    #[serde(default = "default_signup_grant")]
    pub signup_grant: i64,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    /// Headroom required on top of the prompt estimate before a chat call.
    #[serde(default = "default_min_reserve")]
    pub min_chat_reserve: i64,
    #[serde(default = "default_research_cost")]
    pub research_cost: i64,
}

fn default_signup_grant() -> i64 {
    100_000
}

fn default_chars_per_token() -> usize {
    4
}

fn default_min_reserve() -> i64 {
    500
}

fn default_research_cost() -> i64 {
    200
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            signup_grant: default_signup_grant(),
            chars_per_token: default_chars_per_token(),
            min_chat_reserve: default_min_reserve(),
            research_cost: default_research_cost(),
        }
    }
}

// ---------------------------------------------------------------------------
// AiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub default_provider: Provider,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_max_output")]
    pub max_output_tokens: u32,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: usize,
}

fn default_provider() -> Provider {
    Provider::OpenAi
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_max_output() -> u32 {
    1024
}

fn default_rpm() -> usize {
    20
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            gemini_model: default_gemini_model(),
            max_output_tokens: default_max_output(),
            requests_per_minute: default_rpm(),
        }
    }
}

impl AiConfig {
    pub fn model_for(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAi => &self.openai_model,
            Provider::Anthropic => &self.anthropic_model,
            Provider::Gemini => &self.gemini_model,
            Provider::Tavily => "tavily-search",
        }
    }
}

// ---------------------------------------------------------------------------
// DemoConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_session_ttl() -> i64 {
    60
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Overlay secrets from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("CONSULTIFY_JWT_SECRET").filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = secret;
        }
        if let Some(path) = lookup("CONSULTIFY_DB").filter(|s| !s.is_empty()) {
            self.database.path = path;
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.auth.jwt_secret == DEV_JWT_SECRET {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "auth.jwt_secret uses the development default; set CONSULTIFY_JWT_SECRET"
                    .to_string(),
            });
        } else if self.auth.jwt_secret.len() < 32 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "auth.jwt_secret is shorter than 32 characters".to_string(),
            });
        }
        if self.auth.token_ttl_hours <= 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "auth.token_ttl_hours must be positive".to_string(),
            });
        }
        if self.auth.password_min_length < 6 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "auth.password_min_length below 6 is weak".to_string(),
            });
        }
        if self.billing.chars_per_token == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "billing.chars_per_token must be at least 1".to_string(),
            });
        }
        if self.billing.signup_grant < 0 || self.billing.min_chat_reserve < 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "billing amounts must not be negative".to_string(),
            });
        }
        if !self.ai.default_provider.is_chat() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "ai.default_provider '{}' cannot serve chat",
                    self.ai.default_provider
                ),
            });
        }
        if self.ai.requests_per_minute == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "ai.requests_per_minute must be at least 1".to_string(),
            });
        }
        if self.demo.session_ttl_minutes <= 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "demo.session_ttl_minutes must be positive".to_string(),
            });
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 3005);
        assert_eq!(config.database.path, "consultify.db");
        assert_eq!(config.billing.signup_grant, 100_000);
        assert_eq!(config.ai.default_provider, Provider::OpenAi);
        assert_eq!(config.demo.session_ttl_minutes, 60);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "server:\n  port: 8080\nai:\n  default_provider: anthropic\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.ai.default_provider, Provider::Anthropic);
        assert_eq!(config.ai.model_for(Provider::Anthropic), "claude-3-5-sonnet-latest");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf/consultify.yaml");
        let mut config = AppConfig::default();
        config.billing.signup_grant = 42;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.billing.signup_grant, 42);
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("missing.yaml")).unwrap();
        assert_eq!(config.auth.token_ttl_hours, 24);
    }

    #[test]
    fn default_secret_is_flagged() {
        let warnings = AppConfig::default().validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("jwt_secret")));
        assert!(!AppConfig::default().has_errors());
    }

    #[test]
    fn env_overrides_secret_and_db() {
        let mut config = AppConfig::default();
        config.apply_env_from(|key| match key {
            "CONSULTIFY_JWT_SECRET" => Some("x".repeat(40)),
            "CONSULTIFY_DB" => Some("/tmp/other.db".to_string()),
            _ => None,
        });
        assert_eq!(config.database.path, "/tmp/other.db");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn tavily_default_provider_is_an_error() {
        let mut config = AppConfig::default();
        config.ai.default_provider = Provider::Tavily;
        assert!(config.has_errors());
    }
}
