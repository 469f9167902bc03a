// tests/feeds_config.rs
//! Config file discovery, env overrides and validation.

use std::time::Duration;
use std::{env, fs};

use bsky_keyword_feed::config::{
    ENV_CACHE_TTL_SECS, ENV_FEED_CONFIG_PATH, ENV_GRAVITY, ENV_HOSTNAME, ENV_PUBLISHER_DID,
    ENV_SERVICE_URL, ENV_TOP_N,
};
use bsky_keyword_feed::feeds::FeedOrdering;
use bsky_keyword_feed::AppConfig;

fn clear_env() {
    for var in [
        ENV_FEED_CONFIG_PATH,
        ENV_HOSTNAME,
        ENV_PUBLISHER_DID,
        ENV_CACHE_TTL_SECS,
        ENV_TOP_N,
        ENV_GRAVITY,
        ENV_SERVICE_URL,
    ] {
        env::remove_var(var);
    }
}

const CUSTOM: &str = r##"
hostname = "feeds.example.org"
cache_ttl_secs = 120
top_n = 20
badwords = [" Spoiler ", ""]
default_feed = "main"

[keyword_sets]
main = ["#Foo", "foo", " foo "]
long = ["foo小説"]

[[feeds]]
key = "main"
keyword_set = "main"
ordering = "scored_language_priority"

[[feeds]]
key = "main-long"
markers = ["long"]
keyword_set = "long"
min_text_length = 200
ordering = "recency"
"##;

#[test]
fn explicit_file_replaces_seed_feeds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feeds.toml");
    fs::write(&path, CUSTOM).unwrap();

    let cfg = AppConfig::load_from(&path).unwrap();
    assert_eq!(cfg.hostname, "feeds.example.org");
    assert_eq!(cfg.publisher_did, "did:web:feeds.example.org");
    assert_eq!(cfg.cache_ttl, Duration::from_secs(120));
    assert_eq!(cfg.top_n, 20);
    assert_eq!(cfg.badwords, vec!["spoiler".to_string()]);

    let keys: Vec<&str> = cfg.feeds.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["main", "main-long"]);
    assert_eq!(cfg.feeds.default_feed().keywords, vec!["#Foo", "foo"]);

    let long = cfg.feeds.resolve("at://did:plc:x/app.bsky.feed.generator/longform");
    assert_eq!(long.key, "main-long");
    assert_eq!(long.min_text_length, Some(200));
    assert_eq!(long.ordering, FeedOrdering::Recency);
}

#[test]
fn shipped_config_matches_builtin_defaults() {
    let shipped = AppConfig::load_from(std::path::Path::new("config/feeds.toml")).unwrap();
    let seed = AppConfig::from_toml_str("").unwrap();

    let keys = |c: &AppConfig| c.feeds.iter().map(|f| f.key.clone()).collect::<Vec<_>>();
    assert_eq!(keys(&shipped), keys(&seed));
    assert_eq!(shipped.feeds, seed.feeds);
    assert_eq!(shipped.badwords, seed.badwords);
    assert_eq!(shipped.aggregate, seed.aggregate);
    assert_eq!(shipped.rank, seed.rank);
}

#[serial_test::serial]
#[test]
fn env_path_and_overrides_win() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, CUSTOM).unwrap();

    env::set_var(ENV_FEED_CONFIG_PATH, &path);
    env::set_var(ENV_HOSTNAME, "https://override.example.net/");
    env::set_var(ENV_PUBLISHER_DID, "did:plc:owner");
    env::set_var(ENV_TOP_N, "7");
    env::set_var(ENV_GRAVITY, "not-a-number");

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.hostname, "override.example.net");
    assert_eq!(cfg.publisher_did, "did:plc:owner");
    assert_eq!(cfg.top_n, 7);
    // unparseable override is ignored, file/seed value stays
    assert_eq!(cfg.rank.gravity, 2.2);
    assert_eq!(cfg.feeds.default_feed().key, "main");

    clear_env();
}

#[serial_test::serial]
#[test]
fn env_path_must_exist() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    env::set_var(ENV_FEED_CONFIG_PATH, dir.path().join("missing.toml"));

    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains(ENV_FEED_CONFIG_PATH));

    clear_env();
}

#[serial_test::serial]
#[test]
fn out_of_range_values_are_clamped() {
    clear_env();
    env::set_var(ENV_CACHE_TTL_SECS, "0");
    env::set_var(ENV_TOP_N, "1000");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feeds.toml");
    fs::write(&path, "search_limit = 0\npages_per_keyword = 50\ngravity = -1.0\n").unwrap();
    env::set_var(ENV_FEED_CONFIG_PATH, &path);

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.cache_ttl, Duration::from_secs(1));
    assert_eq!(cfg.top_n, 100);
    assert_eq!(cfg.aggregate.search_limit, 1);
    assert_eq!(cfg.aggregate.pages_per_keyword, 5);
    assert_eq!(cfg.rank.gravity, 2.2);

    clear_env();
}

#[test]
fn invalid_tables_are_rejected() {
    let unknown_set = r#"
default_feed = "x"
[[feeds]]
key = "x"
keyword_set = "nope"
ordering = "recency"
"#;
    assert!(AppConfig::from_toml_str(unknown_set).is_err());

    let duplicate = r#"
default_feed = "hikatoki"
[[feeds]]
key = "hikatoki"
keyword_set = "primary"
ordering = "recency"
[[feeds]]
key = "hikatoki"
keyword_set = "primary"
ordering = "recency"
"#;
    assert!(AppConfig::from_toml_str(duplicate).is_err());

    let no_default = r#"default_feed = "missing""#;
    assert!(AppConfig::from_toml_str(no_default).is_err());
}
