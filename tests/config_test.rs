// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Configuration file loading.
//!
//! Run with: `cargo test`

use std::time::Duration;

use tempfile::TempDir;

use nvr_media::clip::ClipRetriever;
use nvr_media::config::Config;
use nvr_media::error::MediaError;

fn tmp_dir() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

#[test]
fn test_load_full_file() {
    let dir = tmp_dir();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[server]
base_url = "http://10.1.1.252:5000"
api_key = "secret"
request_timeout_secs = 0

[scheduler]
max_active = 4
rotation_threshold = 6
rotation_floor = 2

[clip]
max_attempts = 5
retry_delay_ms = 250
segment_concurrency = 8
deadline_secs = 90

[api]
enabled = false
port = 9090
"#,
    )
    .unwrap();

    let cfg = Config::from_file(&path).expect("load config");
    assert_eq!(cfg.server.base_url, "http://10.1.1.252:5000");
    assert_eq!(cfg.server.api_key.as_deref(), Some("secret"));
    assert!(cfg.server.request_timeout().is_none());
    assert_eq!(cfg.server.connect_timeout(), Duration::from_secs(10));
    assert_eq!(cfg.scheduler.max_active, 4);
    assert_eq!(cfg.scheduler.rotation_threshold, 6);
    assert_eq!(cfg.scheduler.rotation_floor, 2);
    assert_eq!(cfg.scheduler.visible_priority, 3);
    assert_eq!(cfg.clip.max_attempts, 5);
    assert_eq!(cfg.clip.retry_delay(), Duration::from_millis(250));
    assert_eq!(cfg.clip.segment_concurrency, 8);
    assert_eq!(cfg.clip.deadline(), Some(Duration::from_secs(90)));
    assert!(!cfg.api.enabled);
    assert_eq!(cfg.api.port, 9090);

    assert!(ClipRetriever::from_config(&cfg).is_ok());
}

#[test]
fn test_missing_file() {
    let dir = tmp_dir();
    let err = Config::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, MediaError::Config(ref msg) if msg.contains("Cannot read")));
}

#[test]
fn test_malformed_toml() {
    let dir = tmp_dir();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[scheduler\nmax_active = ").unwrap();
    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, MediaError::Config(ref msg) if msg.contains("Invalid TOML")));
}

#[test]
fn test_zero_deadline_rejected() {
    let dir = tmp_dir();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[clip]\ndeadline_secs = 0\n").unwrap();
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_floor_above_threshold_rejected() {
    let dir = tmp_dir();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[scheduler]\nrotation_threshold = 4\nrotation_floor = 5\n").unwrap();
    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, MediaError::Config(ref msg) if msg.contains("rotation_floor")));
}
