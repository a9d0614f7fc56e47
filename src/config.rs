//! Configuration for the relay bot
//!
//! Loads `config.yml` (optional) after `.env`, then lets environment
//! variables override string values. The bot token and monitored group id
//! are required; everything else has a default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::search::{DEFAULT_LIMIT, DEFAULT_THRESHOLD};
use crate::telegram::API_BASE;
use crate::{Error, Result};

pub const CONFIG_FILE: &str = "config.yml";
pub const CATALOG_FILE: &str = "songs.json";
pub const INLINE_CATALOG_FILE: &str = "inline_songs.json";
pub const LYRICS_API_BASE: &str = "https://api.genius.com";
pub const DEFAULT_TIMEZONE: &str = "Asia/Tehran";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    bot: Option<BotSection>,
    catalog: Option<CatalogSection>,
    broadcast: Option<BroadcastSection>,
    search: Option<SearchSection>,
    lyrics: Option<LyricsSection>,
    random: Option<RandomSection>,
}

#[derive(Debug, Default, Deserialize)]
struct BotSection {
    token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    group_id: Option<String>,
    api_base: Option<String>,
    poll_timeout_secs: Option<u64>,
    admin_ids: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSection {
    path: Option<PathBuf>,
    inline_path: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    inline_channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BroadcastSection {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    thread_id: Option<String>,
    hour: Option<u32>,
    minute: Option<u32>,
    timezone: Option<String>,
    exclude_threads: Option<Vec<i64>>,
    sample_size: Option<usize>,
    check_interval_secs: Option<u64>,
    cooldown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchSection {
    limit: Option<usize>,
    threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LyricsSection {
    api_key: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RandomSection {
    sample_size: Option<usize>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Nightly broadcast settings.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Destination topic; the scheduler is disabled without one.
    pub thread_id: Option<i64>,
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
    pub exclude_threads: Vec<i64>,
    pub sample_size: usize,
    pub check_interval: Duration,
    pub cooldown: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            thread_id: None,
            hour: 23,
            minute: 11,
            timezone: chrono_tz::Asia::Tehran,
            exclude_threads: Vec::new(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            check_interval: Duration::from_secs(30),
            cooldown: Duration::from_secs(70),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub group_id: i64,
    pub api_base: String,
    pub poll_timeout_secs: u64,
    /// Users allowed to replace catalogs by uploading a file.
    pub admin_ids: Vec<i64>,
    pub catalog_path: PathBuf,
    pub inline_catalog_path: PathBuf,
    pub inline_channel_id: Option<i64>,
    pub broadcast: BroadcastConfig,
    pub random_sample_size: usize,
    pub search_limit: usize,
    pub search_threshold: f64,
    pub lyrics_api_key: Option<String>,
    pub lyrics_api_base: String,
}

impl Config {
    /// Load from `config.yml` (current or parent directory) plus environment.
    pub fn load() -> Result<Self> {
        Self::load_dotenv();
        let candidates = [PathBuf::from(CONFIG_FILE), Path::new("..").join(CONFIG_FILE)];
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load_from_file(path),
            None => Self::from_yaml(YamlConfig::default()),
        }
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        Self::from_yaml(yaml)
    }

    /// Resolve a value: `${VAR}` placeholders and explicit env vars win.
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return Some(env_val);
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            if !env_val.trim().is_empty() {
                return Some(env_val);
            }
        }
        value.filter(|v| !(v.starts_with("${") && v.ends_with('}')) && !v.trim().is_empty())
    }

    fn resolve_env_i64(value: Option<String>, env_key: &str) -> Result<Option<i64>> {
        match Self::resolve_env_string(value, env_key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| Error::Config(format!("{} must be an integer, got {:?}", env_key, raw))),
        }
    }

    fn parse_id_list(raw: &str) -> Vec<i64> {
        raw.split(',').filter_map(|x| x.trim().parse().ok()).collect()
    }

    fn from_yaml(yaml: YamlConfig) -> Result<Self> {
        let bot = yaml.bot.unwrap_or_default();
        let catalog = yaml.catalog.unwrap_or_default();
        let broadcast = yaml.broadcast.unwrap_or_default();
        let search = yaml.search.unwrap_or_default();
        let lyrics = yaml.lyrics.unwrap_or_default();
        let random = yaml.random.unwrap_or_default();

        let bot_token = Self::resolve_env_string(bot.token, "BOT_TOKEN")
            .ok_or_else(|| Error::Config("BOT_TOKEN is not set".to_string()))?;
        let group_id = Self::resolve_env_i64(bot.group_id, "GROUP_ID")?
            .ok_or_else(|| Error::Config("GROUP_ID is not set".to_string()))?;

        let admin_ids = match std::env::var("ADMIN_IDS") {
            Ok(raw) => Self::parse_id_list(&raw),
            Err(_) => bot.admin_ids.unwrap_or_default(),
        };

        let timezone_name = Self::resolve_env_string(broadcast.timezone, "TIMEZONE")
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| Error::Config(format!("Unknown timezone: {}", timezone_name)))?;

        let defaults = BroadcastConfig::default();
        let hour = broadcast.hour.unwrap_or(defaults.hour);
        let minute = broadcast.minute.unwrap_or(defaults.minute);
        if hour > 23 || minute > 59 {
            return Err(Error::Config(format!(
                "Invalid broadcast time {:02}:{:02}",
                hour, minute
            )));
        }

        let search_threshold = search.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&search_threshold) {
            return Err(Error::Config(format!(
                "search.threshold must be within 0..1, got {}",
                search_threshold
            )));
        }

        Ok(Self {
            bot_token,
            group_id,
            api_base: bot.api_base.unwrap_or_else(|| API_BASE.to_string()),
            poll_timeout_secs: bot.poll_timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            admin_ids,
            catalog_path: catalog.path.unwrap_or_else(|| PathBuf::from(CATALOG_FILE)),
            inline_catalog_path: catalog
                .inline_path
                .unwrap_or_else(|| PathBuf::from(INLINE_CATALOG_FILE)),
            inline_channel_id: Self::resolve_env_i64(
                catalog.inline_channel_id,
                "INLINE_CHANNEL_ID",
            )?,
            broadcast: BroadcastConfig {
                thread_id: Self::resolve_env_i64(broadcast.thread_id, "BROADCAST_THREAD_ID")?,
                hour,
                minute,
                timezone,
                exclude_threads: broadcast.exclude_threads.unwrap_or_default(),
                sample_size: broadcast.sample_size.unwrap_or(defaults.sample_size),
                check_interval: broadcast
                    .check_interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.check_interval),
                cooldown: broadcast
                    .cooldown_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cooldown),
            },
            random_sample_size: random.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE),
            search_limit: search.limit.unwrap_or(DEFAULT_LIMIT),
            search_threshold,
            lyrics_api_key: Self::resolve_env_string(lyrics.api_key, "GENIUS_API_KEY"),
            lyrics_api_base: lyrics
                .api_base
                .unwrap_or_else(|| LYRICS_API_BASE.to_string()),
        })
    }

    /// Configuration for tests and offline tooling.
    pub fn for_tests(bot_token: &str, group_id: i64, catalog_path: PathBuf) -> Self {
        let inline_catalog_path = catalog_path.with_file_name(INLINE_CATALOG_FILE);
        Self {
            bot_token: bot_token.to_string(),
            group_id,
            api_base: API_BASE.to_string(),
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            admin_ids: Vec::new(),
            catalog_path,
            inline_catalog_path,
            inline_channel_id: None,
            broadcast: BroadcastConfig::default(),
            random_sample_size: DEFAULT_SAMPLE_SIZE,
            search_limit: DEFAULT_LIMIT,
            search_threshold: DEFAULT_THRESHOLD,
            lyrics_api_key: None,
            lyrics_api_base: LYRICS_API_BASE.to_string(),
        }
    }
}
