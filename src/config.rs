use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default)]
    pub face: FaceConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceConfig {
    #[serde(default = "default_face_detect_url")]
    pub detect_url: String,
    #[serde(default = "default_face_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_face_api_secret_env")]
    pub api_secret_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    #[serde(default = "default_weather_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_completions_url")]
    pub completions_url: String,
    #[serde(default = "default_chat_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_chat_temperature")]
    pub temperature: f64,
    #[serde(default = "default_chat_max_tokens")]
    pub max_tokens: u64,
}

/// API keys resolved from the environment once at startup. Handlers only ever
/// see this immutable copy.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub face_api_key: String,
    pub face_api_secret: String,
    pub weather_api_key: String,
    pub chat_api_key: String,
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_face_detect_url() -> String {
    "https://api-us.faceplusplus.com/facepp/v3/detect".to_string()
}

fn default_face_api_key_env() -> String {
    "FACE_API_KEY".to_string()
}

fn default_face_api_secret_env() -> String {
    "FACE_API_SECRET".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".to_string()
}

fn default_weather_api_key_env() -> String {
    "WEATHER_API_KEY".to_string()
}

fn default_chat_completions_url() -> String {
    "https://api.llama-api.com/chat/completions".to_string()
}

fn default_chat_api_key_env() -> String {
    "LLAMA_API_KEY".to_string()
}

fn default_chat_model() -> String {
    "llama-2-70b-chat".to_string()
}

fn default_chat_temperature() -> f64 {
    0.7
}

fn default_chat_max_tokens() -> u64 {
    2000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
            face: FaceConfig::default(),
            weather: WeatherConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            detect_url: default_face_detect_url(),
            api_key_env: default_face_api_key_env(),
            api_secret_env: default_face_api_secret_env(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            api_key_env: default_weather_api_key_env(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            completions_url: default_chat_completions_url(),
            api_key_env: default_chat_api_key_env(),
            model: default_chat_model(),
            temperature: default_chat_temperature(),
            max_tokens: default_chat_max_tokens(),
        }
    }
}

impl RelayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir. The relay runs fine
    /// from environment variables alone, so a missing file means defaults.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        Ok(Self::default())
    }

    /// Resolve all upstream API keys from the configured environment variables.
    pub fn resolve_credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            face_api_key: require_env(&self.face.api_key_env)?,
            face_api_secret: require_env(&self.face.api_secret_env)?,
            weather_api_key: require_env(&self.weather.api_key_env)?,
            chat_api_key: require_env(&self.chat.api_key_env)?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| {
        RelayError::config(format!(
            "Environment variable '{}' not set. Set it with the upstream API key.",
            name
        ))
    })
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("api-relay.toml"));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("api-relay")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("api-relay").join("config.toml"));
        }
        if let Some(home) = dirs_path() {
            paths.push(home.join(".config").join("api-relay").join("config.toml"));
        }
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(".api-relay.toml"));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
