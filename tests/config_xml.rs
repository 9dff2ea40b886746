use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

use sponge::{Config, LogLevel, default_config_path, load_config, load_config_from_xml_path};

const ENV: &str = "SPONGE_CONFIG";

#[test]
#[serial]
fn env_override_is_used_verbatim() {
    let td = tempdir().unwrap();
    let cfg = td.path().join("custom.xml");
    fs::write(
        &cfg,
        "<config>\n  <log_level>info</log_level>\n  <retry_limit>12</retry_limit>\n  <durable>false</durable>\n</config>\n",
    )
    .unwrap();

    unsafe {
        std::env::set_var(ENV, &cfg);
    }
    assert_eq!(default_config_path(), Some(cfg.clone()));
    let loaded = load_config().unwrap();
    unsafe {
        std::env::remove_var(ENV);
    }

    assert_eq!(loaded.log_level, LogLevel::Info);
    assert_eq!(loaded.retry_limit, 12);
    assert!(!loaded.durable);
    assert_eq!(loaded.log_file, None);
}

#[test]
#[serial]
fn missing_env_file_means_defaults() {
    let td = tempdir().unwrap();
    unsafe {
        std::env::set_var(ENV, td.path().join("nope.xml"));
    }
    let loaded = load_config().unwrap();
    unsafe {
        std::env::remove_var(ENV);
    }
    assert_eq!(loaded, Config::default());
}

#[test]
#[serial]
fn relative_env_path_resolves_against_cwd() {
    unsafe {
        std::env::set_var(ENV, "rel/config.xml");
    }
    let got = default_config_path();
    unsafe {
        std::env::remove_var(ENV);
    }
    let expected = std::env::current_dir().unwrap().join("rel/config.xml");
    assert_eq!(got, Some(expected));
}

#[test]
#[serial]
fn default_path_ends_with_sponge_config_xml() {
    unsafe {
        std::env::remove_var(ENV);
    }
    if let Some(p) = default_config_path() {
        assert!(p.ends_with(PathBuf::from("sponge").join("config.xml")));
    }
}

#[test]
fn malformed_file_is_an_error() {
    let td = tempdir().unwrap();
    let cfg = td.path().join("config.xml");
    fs::write(&cfg, "<config><log_level>info</config>").unwrap();
    let err = load_config_from_xml_path(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("config.xml"));
}

#[test]
fn unknown_element_is_an_error() {
    let td = tempdir().unwrap();
    let cfg = td.path().join("config.xml");
    fs::write(&cfg, "<config><download_base>/x</download_base></config>").unwrap();
    assert!(load_config_from_xml_path(&cfg).is_err());
}

#[test]
fn log_file_is_trimmed() {
    let td = tempdir().unwrap();
    let cfg = td.path().join("config.xml");
    fs::write(&cfg, "<config>\n  <log_file>\n    /var/log/sponge.log\n  </log_file>\n</config>").unwrap();
    let loaded = load_config_from_xml_path(&cfg).unwrap().unwrap();
    assert_eq!(loaded.log_file, Some(PathBuf::from("/var/log/sponge.log")));
}
