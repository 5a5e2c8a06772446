use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR_NAME: &str = "feed-relay";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file, or `memory` to keep posts in process memory only.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory of the daily rotated log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Site root, used for the login page and for canonical post links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    pub login: Option<String>,
    pub password: Option<String>,

    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// Posts requested when the store is still empty.
    #[serde(default = "default_bootstrap_posts")]
    pub bootstrap_posts: usize,

    /// Upper bound on posts requested once the store holds history.
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,

    #[serde(default = "default_link_text")]
    pub link_text: String,

    #[serde(default = "default_min_update_interval")]
    pub min_update_interval_minutes: u32,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("posts.db").to_string_lossy().to_string()
}

fn default_log_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("logs")
        .to_string_lossy()
        .to_string()
}

fn default_feed_url() -> String {
    "https://d.facebook.com/home.php?sk=h_chr".to_string()
}

fn default_base_url() -> String {
    "https://d.facebook.com/".to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_bootstrap_posts() -> usize {
    10
}

fn default_max_posts() -> usize {
    200
}

fn default_link_text() -> String {
    "link".to_string()
}

fn default_min_update_interval() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_dir: default_log_dir(),
            feed_url: default_feed_url(),
            base_url: default_base_url(),
            login: None,
            password: None,
            telegram_token: None,
            telegram_chat_id: None,
            telegram_api_url: default_telegram_api_url(),
            bootstrap_posts: default_bootstrap_posts(),
            max_posts: default_max_posts(),
            link_text: default_link_text(),
            min_update_interval_minutes: default_min_update_interval(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join("config.toml")
    }

    /// Credentials may come from the environment instead of the file.
    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(login) = lookup("FEED_RELAY_LOGIN") {
            self.login = Some(login);
        }
        if let Some(password) = lookup("FEED_RELAY_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(token) = lookup("FEED_RELAY_TELEGRAM_TOKEN") {
            self.telegram_token = Some(token);
        }
        if let Some(chat_id) = lookup("FEED_RELAY_TELEGRAM_CHAT_ID") {
            self.telegram_chat_id = Some(chat_id);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_posts == 0 {
            return Err(AppError::Config("bootstrap_posts must be at least 1".into()));
        }
        if self.max_posts == 0 {
            return Err(AppError::Config("max_posts must be at least 1".into()));
        }
        url::Url::parse(&self.feed_url)?;
        url::Url::parse(&self.base_url)?;
        Ok(())
    }

    /// Token and destination chat, both needed before anything can be delivered.
    pub fn telegram_credentials(&self) -> Result<(&str, &str)> {
        match (&self.telegram_token, &self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Ok((token, chat_id)),
            _ => Err(AppError::Config(
                "telegram_token and telegram_chat_id are required for delivery".into(),
            )),
        }
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Some((login, password)),
            _ => None,
        }
    }
}
