use std::env;
use std::path::PathBuf;

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Credential for the analysis agent. `None` puts the service in
    /// degraded mode: analysis is disabled with a visible notice, everything
    /// else still serves.
    pub api_key: Option<String>,
    pub port: u16,
    /// Root directory for per-session image and audio artifacts.
    pub artifact_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let artifact_dir = env::var("MEDISENSE_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("medisense"));

        Self {
            api_key,
            port,
            artifact_dir,
        }
    }

    pub fn analysis_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Directory holding one session's uploaded image and generated audio.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.artifact_dir.join(session_id)
    }
}
