// src/config.rs
//! Static service configuration, loaded once at startup.
//!
//! Source order:
//! 1) `$FEED_CONFIG_PATH` (must exist when set)
//! 2) `config/feeds.toml`
//! 3) built-in seed
//!
//! Fields missing from a file fall back to the seed. Selected env vars
//! override file values, then everything is sanitized into [`AppConfig`].

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::feeds::{FeedOrdering, FeedPolicy, FeedTable};
use crate::ingest::providers::bsky::DEFAULT_SERVICE_URL;
use crate::ingest::AggregateOptions;
use crate::rank::RankParams;
use crate::scoring::DEFAULT_GRAVITY;

pub const DEFAULT_FEED_CONFIG_PATH: &str = "config/feeds.toml";

pub const ENV_FEED_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const ENV_HOSTNAME: &str = "FEED_HOSTNAME";
pub const ENV_PUBLISHER_DID: &str = "FEED_PUBLISHER_DID";
pub const ENV_CACHE_TTL_SECS: &str = "FEED_CACHE_TTL_SECS";
pub const ENV_TOP_N: &str = "FEED_TOP_N";
pub const ENV_GRAVITY: &str = "FEED_GRAVITY";
pub const ENV_SERVICE_URL: &str = "BSKY_SERVICE_URL";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Public hostname, used for `did:web` and the service endpoint.
    pub hostname: String,
    /// DID of the account that published the feed generator records.
    pub publisher_did: String,
    pub service_url: String,
    pub cache_ttl: Duration,
    pub top_n: usize,
    pub aggregate: AggregateOptions,
    pub rank: RankParams,
    pub badwords: Vec<String>,
    pub feeds: FeedTable,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawConfig {
    hostname: String,
    publisher_did: Option<String>,
    service_url: String,
    cache_ttl_secs: u64,
    gravity: f64,
    top_n: usize,
    search_limit: u32,
    pages_per_keyword: u32,
    search_timeout_ms: u64,
    priority_language: String,
    badwords: Vec<String>,
    keyword_sets: BTreeMap<String, Vec<String>>,
    default_feed: String,
    feeds: Vec<RawFeed>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeed {
    key: String,
    #[serde(default)]
    markers: Vec<String>,
    keyword_set: String,
    #[serde(default)]
    min_text_length: Option<usize>,
    ordering: FeedOrdering,
}

impl Default for RawConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut keyword_sets = BTreeMap::new();
        keyword_sets.insert(
            "primary".to_string(),
            strings(&["ヒカトキ", "#ヒカトキ", "光時", "光时", "hikatoki"]),
        );
        keyword_sets.insert(
            "novel".to_string(),
            strings(&["ヒカトキ小説", "光時小説", "ヒカトキSS"]),
        );

        Self {
            hostname: "localhost".to_string(),
            publisher_did: None,
            service_url: DEFAULT_SERVICE_URL.to_string(),
            cache_ttl_secs: 30,
            gravity: DEFAULT_GRAVITY,
            top_n: 50,
            search_limit: 100,
            pages_per_keyword: 2,
            search_timeout_ms: 8_000,
            priority_language: "ja".to_string(),
            badwords: strings(&["nsfw", "r18", "r-18", "フォロバ100"]),
            keyword_sets,
            default_feed: "hikatoki".to_string(),
            feeds: vec![
                RawFeed {
                    key: "hikatoki".to_string(),
                    markers: Vec::new(),
                    keyword_set: "primary".to_string(),
                    min_text_length: None,
                    ordering: FeedOrdering::ScoredLanguagePriority,
                },
                RawFeed {
                    key: "hikatoki-novel".to_string(),
                    markers: strings(&["novel"]),
                    keyword_set: "novel".to_string(),
                    min_text_length: Some(140),
                    ordering: FeedOrdering::Recency,
                },
                RawFeed {
                    key: "hikatoki-new".to_string(),
                    markers: strings(&["new"]),
                    keyword_set: "primary".to_string(),
                    min_text_length: None,
                    ordering: FeedOrdering::Recency,
                },
            ],
        }
    }
}

impl AppConfig {
    /// Load using env var + fallbacks, then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut raw = load_raw_default()?;
        apply_env_overrides(&mut raw);
        Self::from_raw(raw)
    }

    /// Load from an explicit TOML file (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_raw(read_raw(path)?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(s).context("parsing feed config toml")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let hostname = clean_hostname(&raw.hostname);
        let publisher_did = raw
            .publisher_did
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("did:web:{hostname}"));

        let gravity = if raw.gravity.is_finite() && raw.gravity > 0.0 {
            raw.gravity
        } else {
            DEFAULT_GRAVITY
        };
        let priority_language = match raw.priority_language.trim().to_ascii_lowercase() {
            l if l.is_empty() => "ja".to_string(),
            l => l,
        };

        let keyword_sets: BTreeMap<String, Vec<String>> = raw
            .keyword_sets
            .into_iter()
            .map(|(name, words)| (name, clean_list(words)))
            .collect();

        let mut seen_keys = HashSet::new();
        let mut default = None;
        let mut variants = Vec::new();
        for feed in raw.feeds {
            let key = feed.key.trim().to_string();
            if key.is_empty() {
                bail!("feed with empty key");
            }
            if !seen_keys.insert(key.clone()) {
                bail!("duplicate feed key {key:?}");
            }
            let keywords = keyword_sets.get(&feed.keyword_set).cloned().ok_or_else(|| {
                anyhow!(
                    "feed {key:?} references unknown keyword set {:?}",
                    feed.keyword_set
                )
            })?;
            if keywords.is_empty() {
                bail!("keyword set {:?} of feed {key:?} is empty", feed.keyword_set);
            }

            let policy = FeedPolicy {
                key: key.clone(),
                markers: clean_list(feed.markers),
                keywords,
                min_text_length: feed.min_text_length.filter(|m| *m > 0),
                ordering: feed.ordering,
            };
            if key == raw.default_feed.trim() {
                default = Some(policy);
            } else {
                variants.push(policy);
            }
        }
        let default = default
            .ok_or_else(|| anyhow!("default feed {:?} is not defined", raw.default_feed))?;

        Ok(Self {
            hostname,
            publisher_did,
            service_url: raw.service_url.trim().trim_end_matches('/').to_string(),
            cache_ttl: Duration::from_secs(raw.cache_ttl_secs.clamp(1, 3_600)),
            top_n: raw.top_n.clamp(1, 100),
            aggregate: AggregateOptions {
                search_limit: raw.search_limit.clamp(1, 100),
                pages_per_keyword: raw.pages_per_keyword.clamp(1, 5),
                timeout: Duration::from_millis(raw.search_timeout_ms.clamp(500, 60_000)),
            },
            rank: RankParams {
                gravity,
                priority_language,
            },
            badwords: clean_list(raw.badwords.iter().map(|w| w.to_lowercase()).collect()),
            feeds: FeedTable::new(default, variants),
        })
    }
}

fn load_raw_default() -> Result<RawConfig> {
    if let Ok(p) = env::var(ENV_FEED_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return read_raw(&pb);
        }
        bail!("{ENV_FEED_CONFIG_PATH} points to non-existent path");
    }
    let default_path = PathBuf::from(DEFAULT_FEED_CONFIG_PATH);
    if default_path.exists() {
        return read_raw(&default_path);
    }
    Ok(RawConfig::default())
}

fn read_raw(path: &Path) -> Result<RawConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing feed config {}", path.display()))
}

fn apply_env_overrides(raw: &mut RawConfig) {
    if let Ok(v) = env::var(ENV_HOSTNAME) {
        raw.hostname = v;
    }
    if let Ok(v) = env::var(ENV_PUBLISHER_DID) {
        raw.publisher_did = Some(v);
    }
    if let Ok(v) = env::var(ENV_SERVICE_URL) {
        raw.service_url = v;
    }
    if let Some(v) = parse_env(ENV_CACHE_TTL_SECS) {
        raw.cache_ttl_secs = v;
    }
    if let Some(v) = parse_env(ENV_TOP_N) {
        raw.top_n = v;
    }
    if let Some(v) = parse_env(ENV_GRAVITY) {
        raw.gravity = v;
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

/// Strip scheme, path and whitespace: `https://feed.example.com/` → `feed.example.com`.
fn clean_hostname(raw: &str) -> String {
    let t = raw.trim();
    let t = t
        .strip_prefix("https://")
        .or_else(|| t.strip_prefix("http://"))
        .unwrap_or(t);
    let t = t.split('/').next().unwrap_or_default();
    if t.is_empty() {
        "localhost".to_string()
    } else {
        t.to_string()
    }
}

/// Trim, drop blanks, drop repeats; first occurrence keeps its position.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_seed() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.hostname, "localhost");
        assert_eq!(cfg.publisher_did, "did:web:localhost");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(30));
        assert_eq!(cfg.top_n, 50);
        assert_eq!(cfg.feeds.default_feed().key, "hikatoki");
        assert_eq!(cfg.feeds.iter().count(), 3);
        let novel = cfg.feeds.get("hikatoki-novel").unwrap();
        assert_eq!(novel.min_text_length, Some(140));
        assert_eq!(novel.ordering, FeedOrdering::Recency);
    }

    #[test]
    fn values_are_sanitized() {
        let cfg = AppConfig::from_toml_str(
            r#"
hostname = "https://feed.example.com/"
cache_ttl_secs = 0
top_n = 5000
gravity = -1.0
search_limit = 0
pages_per_keyword = 50
badwords = [" NSFW ", "", "nsfw"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.hostname, "feed.example.com");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(1));
        assert_eq!(cfg.top_n, 100);
        assert_eq!(cfg.rank.gravity, DEFAULT_GRAVITY);
        assert_eq!(cfg.aggregate.search_limit, 1);
        assert_eq!(cfg.aggregate.pages_per_keyword, 5);
        assert_eq!(cfg.badwords, vec!["nsfw".to_string()]);
    }

    #[test]
    fn unknown_keyword_set_is_an_error() {
        let err = AppConfig::from_toml_str(
            r#"
default_feed = "a"
[[feeds]]
key = "a"
keyword_set = "missing"
ordering = "recency"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown keyword set"));
    }

    #[test]
    fn missing_default_feed_is_an_error() {
        let err = AppConfig::from_toml_str(r#"default_feed = "nope""#).unwrap_err();
        assert!(err.to_string().contains("default feed"));
    }

    #[test]
    fn unknown_feed_fields_are_rejected() {
        let err = AppConfig::from_toml_str(
            r#"
default_feed = "a"
[keyword_sets]
main = ["a"]
[[feeds]]
key = "a"
keyword_set = "main"
ordering = "recency"
display_name = "A feed"
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("display_name"));
    }

    #[test]
    fn clean_list_keeps_order() {
        let out = clean_list(vec![" b ".into(), "a".into(), "b".into(), "".into()]);
        assert_eq!(out, vec!["b".to_string(), "a".to_string()]);
    }
}
