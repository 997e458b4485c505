// pod-core/src/config.rs
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Central configuration for the login flow, the pod layer and the web server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    /// Externally visible origin of the web server, used to derive redirect URIs
    pub public_url: String,

    pub client: ClientConfig,
    pub pod: PodConfig,
    pub login: LoginConfig,
}

/// Static client metadata published in the client-id document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id_document: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub scope: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PodConfig {
    /// Fixed identifier of this application in the private type index
    pub app_id: String,
    pub request_timeout_secs: u64,
    /// Number of words of the first message used to name a new thread
    pub thread_name_words: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub state_ttl_secs: i64,
    pub registration_ttl_secs: i64,
    /// Identity providers offered to the user
    pub providers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8501".to_string(),
            public_url: "http://localhost:8501".to_string(),
            client: ClientConfig::default(),
            pod: PodConfig::default(),
            login: LoginConfig::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id_document:
                "https://raw.githubusercontent.com/Vidminas/socialgenpod/main/src/chat_app/data/client_id.json"
                    .to_string(),
            client_name: "Social Gen Pod".to_string(),
            redirect_uris: vec!["http://localhost:8501/callback".to_string()],
            post_logout_redirect_uris: vec!["http://localhost:8501".to_string()],
            scope: "openid offline_access webid".to_string(),
        }
    }
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            app_id: "https://github.com/Vidminas/socialgenpod".to_string(),
            request_timeout_secs: 30,
            thread_name_words: 3,
        }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: 300,
            registration_ttl_secs: 86400,
            providers: vec![
                "https://solidcommunity.net/".to_string(),
                "https://login.inrupt.com/".to_string(),
                "https://solidweb.org/".to_string(),
                "https://trinpod.us/".to_string(),
                "https://get.use.id/".to_string(),
                "https://solidweb.me/".to_string(),
                "https://datapod.igrant.io/".to_string(),
                "https://solid.redpencil.io/".to_string(),
                "https://teamid.live/".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP__POD__APP_ID
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();

                if let Ok(addr) = env::var("WEB_SERVER_ADDR") {
                    config.web_server_addr = addr;
                }
                // Same convention as the hosting platform: https://{WEBSITE_HOSTNAME}
                if let Ok(hostname) = env::var("WEBSITE_HOSTNAME") {
                    config.public_url = format!("https://{}", hostname);
                }
                if let Ok(document) = env::var("CLIENT_ID_DOCUMENT") {
                    config.client.client_id_document = document;
                }
                if let Ok(app_id) = env::var("APP_ID") {
                    config.pod.app_id = app_id;
                }

                config
            }
        }
    }

    /// Where the provider sends the user back after authorization
    pub fn callback_uri(&self) -> String {
        format!("{}/callback", self.public_url.trim_end_matches('/'))
    }

    pub fn post_logout_redirect_uri(&self) -> String {
        self.public_url.trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_uris() {
        let mut config = Config::default();
        assert_eq!(config.callback_uri(), "http://localhost:8501/callback");
        assert_eq!(config.post_logout_redirect_uri(), "http://localhost:8501");

        config.public_url = "https://genpod.example/".to_string();
        assert_eq!(config.callback_uri(), "https://genpod.example/callback");
        assert_eq!(config.post_logout_redirect_uri(), "https://genpod.example");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "pod": { "thread_name_words": 5 }
        }))
        .unwrap();
        assert_eq!(config.pod.thread_name_words, 5);
        assert_eq!(config.pod.app_id, PodConfig::default().app_id);
        assert_eq!(config.login.state_ttl_secs, 300);
    }
}
