use std::time::Duration;

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_timeout_ms() -> u64 {
    120_000
}

/// Configuration for the HTTP remote backend.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HttpRemoteConfig {
    /// Base URL the endpoint paths are appended to (e.g. `https://host/api`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. Item submissions are single shot and can run
    /// long, so this bounds the whole request including the response body.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HttpRemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
