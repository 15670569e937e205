//! Server configuration, loaded from environment variables at startup.
//!
//! Both provider credentials are mandatory: [`Config::from_env`] fails before
//! any listener is bound when either one is absent or empty.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use relay_providers::ImageFormat;
use thiserror::Error;

use crate::session::SessionLimits;

pub const STABILITY_API_KEY: &str = "STABILITY_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Multipart framing allowance accepted on top of the file size limit.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

const DEFAULT_CORS_ORIGIN: &str = "https://serverbudxeedev.up.railway.app";

/// Errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {key}='{value}' is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for relay-server.
#[derive(Clone)]
pub struct Config {
    /// TCP port bound on all interfaces (default: `4000`).
    pub port: u16,

    pub stability_api_key: String,
    pub openai_api_key: String,

    pub stability_base_url: String,
    pub openai_base_url: String,

    /// Per-request timeout for outbound provider calls; `None` keeps the
    /// transport defaults.
    pub provider_timeout: Option<Duration>,

    /// Origins allowed by the CORS layer. Empty means any origin.
    pub cors_allowed_origins: Vec<String>,

    /// Directory holding uploads while they are analysed; also served
    /// read-only under `/uploads`.
    pub upload_dir: PathBuf,

    pub max_upload_bytes: usize,

    pub image_format: ImageFormat,

    pub chat_model: String,
    pub vision_model: String,

    /// System message prepended to every chat request (never stored).
    pub chat_system_prompt: Option<String>,

    pub session: SessionLimits,

    /// Mount the Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let max_upload_mb: usize = env.parse("RELAY_MAX_UPLOAD_MB", 10)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .filter(|bytes| bytes.checked_add(MULTIPART_OVERHEAD).is_some())
            .ok_or_else(|| ConfigError::Invalid {
                key: "RELAY_MAX_UPLOAD_MB",
                value: max_upload_mb.to_string(),
                reason: "upload limit does not fit in memory".to_owned(),
            })?;
        let timeout_secs: u64 = env.parse("RELAY_PROVIDER_TIMEOUT_SECS", 0)?;
        let idle_ttl_secs: u64 = env.parse("RELAY_SESSION_IDLE_TTL_SECS", 86_400)?;

        Ok(Self {
            port: env.parse("PORT", 4000)?,
            stability_api_key: env.required(STABILITY_API_KEY)?,
            openai_api_key: env.required(OPENAI_API_KEY)?,
            stability_base_url: env.or(
                "RELAY_STABILITY_BASE_URL",
                relay_providers::stability::DEFAULT_BASE_URL,
            ),
            openai_base_url: env.or(
                "RELAY_OPENAI_BASE_URL",
                relay_providers::openai::DEFAULT_BASE_URL,
            ),
            provider_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            cors_allowed_origins: env
                .or("RELAY_CORS_ORIGINS", DEFAULT_CORS_ORIGIN)
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            upload_dir: PathBuf::from(env.or("RELAY_UPLOAD_DIR", "uploads")),
            max_upload_bytes,
            image_format: env.parse("RELAY_IMAGE_FORMAT", ImageFormat::Jpeg)?,
            chat_model: env.or("RELAY_CHAT_MODEL", relay_providers::openai::DEFAULT_MODEL),
            vision_model: env.or("RELAY_VISION_MODEL", relay_providers::openai::DEFAULT_MODEL),
            chat_system_prompt: env.get("RELAY_CHAT_SYSTEM_PROMPT"),
            session: SessionLimits {
                max_users: env.parse("RELAY_SESSION_MAX_USERS", 10_000)?,
                idle_ttl: (idle_ttl_secs > 0).then(|| Duration::from_secs(idle_ttl_secs)),
                max_messages: env.parse("RELAY_SESSION_MAX_MESSAGES", 200)?,
            },
            enable_swagger: env.flag("RELAY_ENABLE_SWAGGER", true),
            log_level: env.or("RELAY_LOG", "info"),
            log_json: env.flag("RELAY_LOG_JSON", false),
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Largest request body accepted by `POST /upload-image`.
    pub fn upload_body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("stability_api_key", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("stability_base_url", &self.stability_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("provider_timeout", &self.provider_timeout)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("image_format", &self.image_format)
            .field("chat_model", &self.chat_model)
            .field("vision_model", &self.vision_model)
            .field("chat_system_prompt", &self.chat_system_prompt)
            .field("session", &self.session)
            .field("enable_swagger", &self.enable_swagger)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .finish()
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value for `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}
