// src/config/settings.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::sighting::{DEFAULT_EXPIRY_SECS, MAX_EXPIRY_SECS};
use crate::store::{DEFAULT_DB_MAX_CONNECTIONS, DEFAULT_MAX_LIST_LIMIT};
use crate::sweeper::DEFAULT_SWEEP_INTERVAL_SECS;

pub const ENV_CONFIG_PATH: &str = "SIGHTINGS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/sightings.toml";

const DEFAULT_DATABASE_URL: &str = "memory://";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const MAX_IMAGE_BYTES_CEILING: usize = 100 * 1024 * 1024;
const MAX_MEDIA_TIMEOUT_SECS: u64 = 600;

fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from("static"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Datastore connection string: `memory://` or `postgres://...`.
    pub database_url: String,
    /// Pool size for the Postgres backend.
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Expiry window; a sighting is active while younger than this.
    pub expiry_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_list_limit: usize,
    /// Directory with the map UI; served as a fallback when it exists.
    pub static_dir: Option<PathBuf>,
    pub media: MediaSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub upload_url: Option<String>,
    pub api_key: Option<String>,
    pub upload_preset: Option<String>,
    pub timeout_secs: u64,
    pub max_image_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            expiry_secs: DEFAULT_EXPIRY_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            max_list_limit: DEFAULT_MAX_LIST_LIMIT,
            static_dir: default_static_dir(),
            media: MediaSettings::default(),
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            upload_url: None,
            api_key: None,
            upload_preset: None,
            timeout_secs: DEFAULT_MEDIA_TIMEOUT_SECS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl Settings {
    /// Load settings from an explicit TOML file, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let mut s: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        s.apply_env(|k| std::env::var(k).ok());
        s.sanitize();
        Ok(s)
    }

    /// Load settings using env var + fallbacks:
    /// 1) $SIGHTINGS_CONFIG_PATH
    /// 2) config/sightings.toml
    /// 3) built-in defaults
    ///
    /// Environment variables override whatever the file says.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        let mut s = Settings::default();
        s.apply_env(|k| std::env::var(k).ok());
        s.sanitize();
        Ok(s)
    }

    /// Overlay values from an env-like lookup. Unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("DATABASE_URL") {
            self.database_url = v;
        }
        set_parsed(
            &mut self.db_max_connections,
            "DB_MAX_CONNECTIONS",
            get("DB_MAX_CONNECTIONS"),
        );
        if let Some(v) = get("HOST") {
            self.host = v;
        }
        set_parsed(&mut self.port, "PORT", get("PORT"));
        set_parsed(&mut self.expiry_secs, "SIGHTING_EXPIRY_SECS", get("SIGHTING_EXPIRY_SECS"));
        set_parsed(
            &mut self.sweep_interval_secs,
            "SWEEP_INTERVAL_SECS",
            get("SWEEP_INTERVAL_SECS"),
        );
        set_parsed(&mut self.max_list_limit, "MAX_LIST_LIMIT", get("MAX_LIST_LIMIT"));
        if let Some(v) = get("STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(v));
        }

        if let Some(v) = get("MEDIA_UPLOAD_URL") {
            self.media.upload_url = Some(v);
        }
        if let Some(v) = get("MEDIA_API_KEY") {
            self.media.api_key = Some(v);
        }
        if let Some(v) = get("MEDIA_UPLOAD_PRESET") {
            self.media.upload_preset = Some(v);
        }
        set_parsed(
            &mut self.media.timeout_secs,
            "MEDIA_TIMEOUT_SECS",
            get("MEDIA_TIMEOUT_SECS"),
        );
        set_parsed(
            &mut self.media.max_image_bytes,
            "MAX_IMAGE_BYTES",
            get("MAX_IMAGE_BYTES"),
        );
    }

    /// Replace zero values with defaults, cap oversized ones, and keep the
    /// sweep no slower than the expiry window.
    pub fn sanitize(&mut self) {
        if self.expiry_secs == 0 {
            self.expiry_secs = DEFAULT_EXPIRY_SECS;
        }
        if self.expiry_secs > MAX_EXPIRY_SECS {
            tracing::warn!(target: "sightings::config", value = self.expiry_secs, max = MAX_EXPIRY_SECS, "expiry window capped");
            self.expiry_secs = MAX_EXPIRY_SECS;
        }
        if self.sweep_interval_secs == 0 {
            self.sweep_interval_secs = DEFAULT_SWEEP_INTERVAL_SECS;
        }
        if self.sweep_interval_secs > self.expiry_secs {
            self.sweep_interval_secs = self.expiry_secs;
        }
        if self.db_max_connections == 0 {
            self.db_max_connections = DEFAULT_DB_MAX_CONNECTIONS;
        }
        if self.max_list_limit == 0 {
            self.max_list_limit = DEFAULT_MAX_LIST_LIMIT;
        }
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.media.timeout_secs == 0 {
            self.media.timeout_secs = DEFAULT_MEDIA_TIMEOUT_SECS;
        }
        self.media.timeout_secs = self.media.timeout_secs.min(MAX_MEDIA_TIMEOUT_SECS);
        if self.media.max_image_bytes == 0 {
            self.media.max_image_bytes = DEFAULT_MAX_IMAGE_BYTES;
        }
        if self.media.max_image_bytes > MAX_IMAGE_BYTES_CEILING {
            tracing::warn!(target: "sightings::config", value = self.media.max_image_bytes, max = MAX_IMAGE_BYTES_CEILING, "image size limit capped");
            self.media.max_image_bytes = MAX_IMAGE_BYTES_CEILING;
        }
        if self.database_url.trim().is_empty() {
            self.database_url = DEFAULT_DATABASE_URL.to_string();
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, key: &str, raw: Option<String>) {
    let Some(raw) = raw else { return };
    match raw.parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(target: "sightings::config", key, value = %raw, "ignoring unparseable setting"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let s = Settings::default();
        assert_eq!(s.database_url, "memory://");
        assert_eq!(s.expiry_secs, 3600);
        assert_eq!(s.sweep_interval_secs, 300);
        assert_eq!(s.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn env_overrides_and_ignores_garbage() {
        let mut s = Settings::default();
        s.apply_env(env(&[
            ("DATABASE_URL", "postgres://sightings@localhost/sightings"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("PORT", "not-a-port"),
            ("SWEEP_INTERVAL_SECS", "1800"),
            ("MEDIA_UPLOAD_URL", "  https://media.example/upload "),
            ("MEDIA_API_KEY", ""),
        ]));
        assert_eq!(s.database_url, "postgres://sightings@localhost/sightings");
        assert_eq!(s.db_max_connections, 12);
        assert_eq!(s.port, 8000);
        assert_eq!(s.sweep_interval_secs, 1800);
        assert_eq!(s.media.upload_url.as_deref(), Some("https://media.example/upload"));
        assert_eq!(s.media.api_key, None);
    }

    #[test]
    fn sanitize_clamps_sweep_to_window_and_fills_zeros() {
        let mut s = Settings {
            expiry_secs: 600,
            sweep_interval_secs: 1800,
            max_list_limit: 0,
            ..Settings::default()
        };
        s.sanitize();
        assert_eq!(s.sweep_interval_secs, 600);
        assert_eq!(s.max_list_limit, DEFAULT_MAX_LIST_LIMIT);

        let mut z = Settings {
            expiry_secs: 0,
            sweep_interval_secs: 0,
            ..Settings::default()
        };
        z.sanitize();
        assert_eq!(z.expiry_secs, DEFAULT_EXPIRY_SECS);
        assert_eq!(z.sweep_interval_secs, DEFAULT_SWEEP_INTERVAL_SECS);
    }

    #[test]
    fn sanitize_caps_oversized_window_and_image_limit() {
        let mut s = Settings::default();
        s.apply_env(env(&[
            ("SIGHTING_EXPIRY_SECS", "18446744073709551615"),
            ("MAX_IMAGE_BYTES", "18446744073709551615"),
            ("SWEEP_INTERVAL_SECS", "10000000000000000"),
        ]));
        s.sanitize();
        assert_eq!(s.expiry_secs, MAX_EXPIRY_SECS);
        assert_eq!(s.sweep_interval_secs, MAX_EXPIRY_SECS);
        assert_eq!(s.media.max_image_bytes, MAX_IMAGE_BYTES_CEILING);
    }

    #[test]
    fn toml_sections_deserialize_with_defaults() {
        let raw = r#"
            database_url = "postgres://localhost/sightings"
            expiry_secs = 1800

            [media]
            upload_url = "https://api.cloudinary.com/v1_1/demo/image/upload"
            upload_preset = "sightings"
        "#;
        let s: Settings = toml::from_str(raw).unwrap();
        assert_eq!(s.expiry_secs, 1800);
        assert_eq!(s.port, 8000);
        assert_eq!(s.media.upload_preset.as_deref(), Some("sightings"));
        assert_eq!(s.media.timeout_secs, 30);
    }
}
