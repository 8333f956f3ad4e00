use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BannerError, Result};
use crate::github::DEFAULT_API_URL;

const DEFAULT_CREDENTIALS_FILE: &str = "config.json";
const MAX_REFRESH_DAYS: i64 = 366;

/// Credentials file layout
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    github_token: String,
    username: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: String,
    pub tracked_username: String,
    pub assets_dir: PathBuf,
    pub bind_address: String,
    pub refresh_window: TimeDelta,
    pub api_url: String,
    pub upstream_timeout: Duration,
}

impl Config {
    /// Reads settings from the process environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let (access_token, tracked_username) = match var("BANNER_CONFIG") {
            Some(path) => read_credentials_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CREDENTIALS_FILE).exists() => {
                read_credentials_file(Path::new(DEFAULT_CREDENTIALS_FILE))?
            }
            None => (required(&var, "GITHUB_TOKEN")?, required(&var, "GITHUB_USERNAME")?),
        };

        let refresh_minutes: i64 = parsed(&var, "REFRESH_MINUTES", 10)?;
        let refresh_window = refresh_window(refresh_minutes)?;
        let timeout_secs: u64 = parsed(&var, "UPSTREAM_TIMEOUT_SECS", 30)?;

        Ok(Self {
            access_token,
            tracked_username,
            assets_dir: var("ASSETS_DIR").unwrap_or_else(|| "assets".into()).into(),
            bind_address: var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            refresh_window,
            api_url: var("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Positive and small enough that a timestamp plus the window cannot overflow
fn refresh_window(minutes: i64) -> Result<TimeDelta> {
    if minutes <= 0 {
        return Err(BannerError::Config(format!(
            "REFRESH_MINUTES must be positive, got {}",
            minutes
        )));
    }

    TimeDelta::try_minutes(minutes)
        .filter(|window| window.num_days() <= MAX_REFRESH_DAYS)
        .ok_or_else(|| BannerError::Config(format!("REFRESH_MINUTES={} is out of range", minutes)))
}

fn read_credentials_file(path: &Path) -> Result<(String, String)> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| BannerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let creds: CredentialsFile = serde_json::from_str(&raw)
        .map_err(|e| BannerError::Config(format!("invalid {}: {}", path.display(), e)))?;

    if creds.github_token.trim().is_empty() || creds.username.trim().is_empty() {
        return Err(BannerError::Config(format!(
            "{} must set github_token and username",
            path.display()
        )));
    }

    Ok((creds.github_token, creds.username))
}

fn required(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    var(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| BannerError::Config(format!("{} must be set", key)))
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| BannerError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_credentials_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, r#"{"github_token": "from-file", "username": "stella"}"#).unwrap();

        let config = Config::from_lookup(lookup(&[
            ("BANNER_CONFIG", path.to_str().unwrap()),
            ("GITHUB_TOKEN", "from-env"),
            ("REFRESH_MINUTES", "15"),
        ]))
        .unwrap();

        assert_eq!(config.access_token, "from-file");
        assert_eq!(config.tracked_username, "stella");
        assert_eq!(config.refresh_window, TimeDelta::minutes(15));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_credentials_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, r#"{"github_token": ""}"#).unwrap();

        let err = Config::from_lookup(lookup(&[("BANNER_CONFIG", path.to_str().unwrap())])).unwrap_err();
        assert!(matches!(err, BannerError::Config(_)));

        let missing = dir.path().join("missing.json");
        let err = Config::from_lookup(lookup(&[("BANNER_CONFIG", missing.to_str().unwrap())])).unwrap_err();
        assert!(matches!(err, BannerError::Config(_)));
    }

    #[test]
    fn test_bad_number_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, r#"{"github_token": "t", "username": "u"}"#).unwrap();

        let err = Config::from_lookup(lookup(&[
            ("BANNER_CONFIG", path.to_str().unwrap()),
            ("REFRESH_MINUTES", "ten"),
        ]))
        .unwrap_err();
        assert!(matches!(err, BannerError::Config(ref msg) if msg.contains("REFRESH_MINUTES")));
    }

    fn config_with_refresh(minutes: &str) -> Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, r#"{"github_token": "t", "username": "u"}"#).unwrap();

        Config::from_lookup(lookup(&[
            ("BANNER_CONFIG", path.to_str().unwrap()),
            ("REFRESH_MINUTES", minutes),
        ]))
    }

    #[test]
    fn test_refresh_window_must_be_positive() {
        for minutes in ["0", "-5"] {
            let err = config_with_refresh(minutes).unwrap_err();
            assert!(matches!(err, BannerError::Config(ref msg) if msg.contains("positive")));
        }
    }

    #[test]
    fn test_refresh_window_out_of_range_is_config_error() {
        for minutes in ["9223372036854775807", "1000000000000"] {
            let err = config_with_refresh(minutes).unwrap_err();
            assert!(matches!(err, BannerError::Config(ref msg) if msg.contains("out of range")));
        }
    }

    #[test]
    fn test_refresh_window_upper_bound_accepted() {
        let config = config_with_refresh("527040").unwrap();
        assert_eq!(config.refresh_window, TimeDelta::days(366));
    }
}
