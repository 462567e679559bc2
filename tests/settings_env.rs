// tests/settings_env.rs
use std::{env, fs};

use serial_test::serial;
use wildlife_sightings::config::{Settings, ENV_CONFIG_PATH};

const TOUCHED: [&str; 4] = [ENV_CONFIG_PATH, "DATABASE_URL", "PORT", "SWEEP_INTERVAL_SECS"];

fn clear_env() {
    for k in TOUCHED {
        env::remove_var(k);
    }
}

#[test]
#[serial]
fn default_uses_env_path_then_fallbacks() {
    // Isolate CWD in a temp dir so a real config/ in the repo doesn't interfere
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // No files, no env -> defaults
    let s = Settings::load_default().unwrap();
    assert_eq!(s, {
        let mut d = Settings::default();
        d.sanitize();
        d
    });

    // config/sightings.toml fallback
    fs::create_dir_all("config").unwrap();
    fs::write("config/sightings.toml", "port = 9100\nexpiry_secs = 1800\n").unwrap();
    let s = Settings::load_default().unwrap();
    assert_eq!(s.port, 9100);
    assert_eq!(s.expiry_secs, 1800);

    // Explicit path wins over the fallback
    let explicit = tmp.path().join("custom.toml");
    fs::write(&explicit, "port = 9200\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, explicit.display().to_string());
    assert_eq!(Settings::load_default().unwrap().port, 9200);

    // Env vars override the file
    env::set_var("PORT", "9300");
    env::set_var("DATABASE_URL", "postgres://sightings@localhost/sightings");
    let s = Settings::load_default().unwrap();
    assert_eq!(s.port, 9300);
    assert_eq!(s.database_url, "postgres://sightings@localhost/sightings");

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[test]
#[serial]
fn missing_explicit_path_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/sightings.toml");
    assert!(Settings::load_default().is_err());
    clear_env();
}

#[test]
#[serial]
fn sweep_interval_is_clamped_to_the_window() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("s.toml");
    fs::write(&path, "expiry_secs = 600\n").unwrap();
    env::set_var("SWEEP_INTERVAL_SECS", "1800");
    let s = Settings::load_from(&path).unwrap();
    assert_eq!(s.sweep_interval_secs, 600);
    clear_env();
}
