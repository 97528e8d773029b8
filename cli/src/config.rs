use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use nutrisense_core::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_SCAN_URL: &str = "http://127.0.0.1:8000";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub images_dir: PathBuf,
    pub gemini: GeminiSettings,
    pub scan_url: String,
}

/// Connection settings for the hosted language model.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl GeminiSettings {
    fn from_env() -> Self {
        let api_key = env_var("GEMINI_API_KEY").or_else(|| env_var("GOOGLE_API_KEY"));
        Self {
            api_key,
            model: env_var("NUTRISENSE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env_var("NUTRISENSE_GEMINI_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nutrisense").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let images_dir = data_dir.join("images");
        let db_path = data_dir.join("nutrisense.db");

        Ok(Config {
            db_path,
            data_dir,
            images_dir,
            gemini: GeminiSettings::from_env(),
            scan_url: env_var("NUTRISENSE_SCAN_URL")
                .unwrap_or_else(|| DEFAULT_SCAN_URL.to_string()),
        })
    }

    /// Load the server's API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)`.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        Ok((key, true))
    }
}
