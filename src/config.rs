use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::controller::Limit;
use crate::gallery::SortKey;
use crate::reddit::{self, Category};

const DEFAULT_ENV_PREFIX: &str = "LOON";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedditConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            region: default_region(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    reddit::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("loon/{}", crate::VERSION)
}

fn default_region() -> String {
    reddit::DEFAULT_REGION.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_subreddit")]
    pub subreddit: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Empty disables sorting.
    #[serde(default = "default_sort")]
    pub sort: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            subreddit: default_subreddit(),
            category: Category::default(),
            limit: default_limit(),
            sort: default_sort(),
        }
    }
}

impl UIConfig {
    pub fn limit(&self) -> Limit {
        Limit::from_value(self.limit).unwrap_or_default()
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        SortKey::from_key(&self.sort)
    }
}

fn default_subreddit() -> String {
    "meme".into()
}

fn default_limit() -> u32 {
    15
}

fn default_sort() -> String {
    SortKey::Score.as_str().into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.reddit.base_url.is_empty() {
        base.reddit.base_url = other.reddit.base_url;
    }
    if !other.reddit.user_agent.is_empty() {
        base.reddit.user_agent = other.reddit.user_agent;
    }
    base.reddit.region = other.reddit.region;
    if !other.reddit.timeout.is_zero() {
        base.reddit.timeout = other.reddit.timeout;
    }

    if !other.ui.subreddit.is_empty() {
        base.ui.subreddit = other.ui.subreddit;
    }
    base.ui.category = other.ui.category;
    if other.ui.limit != 0 {
        base.ui.limit = other.ui.limit;
    }
    base.ui.sort = other.ui.sort;

    base
}

// Only variables that are actually set are applied, so unset keys keep file values.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "reddit.base_url" => cfg.reddit.base_url = value,
        "reddit.user_agent" => cfg.reddit.user_agent = value,
        "reddit.region" => cfg.reddit.region = value,
        "reddit.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.reddit.timeout = duration;
            }
        }
        "ui.subreddit" => cfg.ui.subreddit = value,
        "ui.category" => {
            if let Some(category) = Category::from_key(&value) {
                cfg.ui.category = category;
            }
        }
        "ui.limit" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.ui.limit = parsed;
            }
        }
        "ui.sort" => cfg.ui.sort = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("loon").join("config.yaml"))
}
