//! config-rs/lib.rs
//! Shared configuration utilities for the analyst services
//! Provides env-driven bind addresses, log source locations and backend settings

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Default chat completions endpoint (OpenAI-compatible)
pub const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default model identifier for explanations
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";

/// Default request timeout for the reasoning backend, in seconds
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Environment variables checked for the backend credential, in order
pub const CREDENTIAL_VARS: [&str; 2] = ["GROQ_API_KEY", "LLM_API_KEY"];

/// Load a `.env` file from the working directory if one exists
pub fn load_dotenv() {
    if let Ok(path) = dotenv::dotenv() {
        log::debug!("Loaded environment from {}", path.display());
    }
}

/// Read a string variable, falling back to `default` when unset
pub fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read and parse a variable, warning and falling back on malformed values
pub fn get_env_parsed<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            log::warn!("Invalid value {:?} in {}, using default", raw, name);
            default
        }),
        Err(_) => default,
    }
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "API_GATEWAY")
/// * `default_port` - The default port to use if not specified in environment
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    get_env_parsed(&var_name, default_port)
}

/// Create a SocketAddr for binding a service
///
/// `<NAME>_SERVICE_ADDR` wins when it holds a socket address (optionally with an
/// `http://` or `https://` prefix); otherwise binds 0.0.0.0 on the resolved port.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let stripped = addr_str
            .strip_prefix("http://")
            .or_else(|| addr_str.strip_prefix("https://"))
            .unwrap_or(&addr_str);
        match stripped.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Directory holding the `benign_events.csv` and `malicious_events.csv` sources
pub fn get_logs_dir() -> PathBuf {
    PathBuf::from(get_env_or("LOGS_DIR", "logs"))
}

/// Settings for the reasoning backend client
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// `None` when no credential variable is set or all are empty
    pub api_key: Option<String>,
}

impl BackendSettings {
    /// Reads:
    /// - LLM_API_URL: chat completions endpoint
    /// - LLM_MODEL: model identifier
    /// - LLM_TIMEOUT_SECS: per-request timeout
    /// - GROQ_API_KEY, then LLM_API_KEY: bearer credential
    pub fn from_env() -> Self {
        let api_key = CREDENTIAL_VARS
            .iter()
            .filter_map(|name| env::var(name).ok())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty());

        Self {
            api_url: get_env_or("LLM_API_URL", DEFAULT_LLM_API_URL),
            model: get_env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            timeout_secs: get_env_parsed("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS),
            api_key,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LLM_API_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            api_key: None,
        }
    }
}
