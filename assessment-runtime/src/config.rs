use crate::types::{Result, RuntimeError};
use std::env;
use std::str::FromStr;

pub const DEFAULT_FENCE_TAG: &str = "interaction";

/// Runtime-wide settings shared by every handler on a page.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Info string marking fenced interaction blocks
    pub fence_tag: String,
    pub user_id: Option<String>,
    /// Privileged viewers (instructors) see live survey tallies on mount
    pub privileged_viewer: bool,
    /// Learner turns before the teaching dialogue is asked to conclude
    pub teaching_max_turns: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fence_tag: DEFAULT_FENCE_TAG.to_string(),
            user_id: None,
            privileged_viewer: false,
            teaching_max_turns: 6,
        }
    }
}

impl RuntimeConfig {
    /// Reads `ASSESSMENT_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            fence_tag: env::var("ASSESSMENT_FENCE_TAG").unwrap_or(defaults.fence_tag),
            user_id: env::var("ASSESSMENT_USER_ID").ok().filter(|id| !id.is_empty()),
            privileged_viewer: parse_var("ASSESSMENT_PRIVILEGED", defaults.privileged_viewer)?,
            teaching_max_turns: parse_var("ASSESSMENT_TEACHING_MAX_TURNS", defaults.teaching_max_turns)?,
        })
    }
}

/// Settings for the HTTP collaborator client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_string(),
            api_token: None,
            user_agent: "Assessment-Runtime/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            base_url: env::var("ASSESSMENT_API_URL").unwrap_or(defaults.base_url),
            api_token: env::var("ASSESSMENT_API_TOKEN").ok().filter(|token| !token.is_empty()),
            user_agent: defaults.user_agent,
            timeout_seconds: parse_var("ASSESSMENT_API_TIMEOUT_SECONDS", defaults.timeout_seconds)?,
            max_retries: parse_var("ASSESSMENT_API_MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: parse_var("ASSESSMENT_API_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RuntimeError::Config(format!("{} has an invalid value '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}
