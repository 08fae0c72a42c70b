use anyhow::{Context, Result, anyhow};
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SERVER_PORT: u16 = 8000;
const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub upload_limit_bytes: usize,
    pub llm: LlmSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow!("Missing DATABASE_URL. Set it in the environment or in .env"))?;

        let server_port = match get("SERVER_PORT") {
            Some(v) => v.parse().with_context(|| format!("Invalid SERVER_PORT: {}", v))?,
            None => DEFAULT_SERVER_PORT,
        };

        let upload_limit_bytes = match get("UPLOAD_LIMIT_BYTES") {
            Some(v) => v.parse().with_context(|| format!("Invalid UPLOAD_LIMIT_BYTES: {}", v))?,
            None => DEFAULT_UPLOAD_LIMIT_BYTES,
        };

        let timeout_secs = match get("LLM_TIMEOUT_SECS") {
            Some(v) => v.parse().with_context(|| format!("Invalid LLM_TIMEOUT_SECS: {}", v))?,
            None => DEFAULT_LLM_TIMEOUT_SECS,
        };

        let llm = LlmSettings {
            api_key: get("LLM_API_KEY").or_else(|| get("GROQ_API_KEY")),
            base_url: get("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Config {
            database_url,
            server_port,
            upload_limit_bytes,
            llm,
        })
    }

    /// Filesystem path (or `:memory:`) for SQLite, accepting `sqlite://` URLs.
    pub fn sqlite_path(&self) -> &str {
        let url = self.database_url.as_str();
        url.strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_missing_database_url_fails() {
        let err = config_from(&[("LLM_API_KEY", "abc")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        assert!(config_from(&[("DATABASE_URL", "   ")]).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "reports.db")]).unwrap();
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.upload_limit_bytes, 25 * 1024 * 1024);
        assert_eq!(config.llm.api_key, None);
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.llm.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_groq_key_fallback_and_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "sqlite:///var/lib/reports.db"),
            ("GROQ_API_KEY", "gsk_test"),
            ("LLM_BASE_URL", "http://localhost:11434/v1/"),
            ("SERVER_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.sqlite_path(), "/var/lib/reports.db");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = config_from(&[("DATABASE_URL", ":memory:"), ("SERVER_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }
}
