//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the core runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::env;
use std::fs;

use procsig_common::{ProcsigConfig, SinkKind};

#[test]
fn config_loading_prefers_env_then_candidates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = dir.path().join("first.toml");
    let second = dir.path().join("second.toml");
    let missing = dir.path().join("missing.toml");
    fs::write(&first, "[runtime]\nthread_name = \"from-first\"\n").unwrap();
    fs::write(&second, "[diagnostics]\nsink = \"tracing\"\n").unwrap();

    env::remove_var(ProcsigConfig::ENV_CONFIG_PATH);
    let loaded = ProcsigConfig::load_with_source(&[&missing, &first, &second])
        .expect("first existing candidate wins");
    assert_eq!(loaded.source, first);
    assert_eq!(loaded.config.runtime.thread_name, "from-first");

    env::set_var(ProcsigConfig::ENV_CONFIG_PATH, &second);
    let config = ProcsigConfig::load(&[&first]).expect("env override wins");
    assert_eq!(config.diagnostics.sink, SinkKind::Tracing);
    assert_eq!(config.runtime.thread_name, "procsig-worker");
    env::remove_var(ProcsigConfig::ENV_CONFIG_PATH);

    let err = ProcsigConfig::load(&[&missing]).expect_err("nothing to load");
    assert!(err.to_string().contains("no configuration files found"));
}

#[test]
fn malformed_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[runtime\nworker_threads = ").unwrap();
    let err = ProcsigConfig::load_or_default(Some(&path)).expect_err("parse failure");
    assert!(err.to_string().contains("broken.toml"));

    let defaults = ProcsigConfig::load_or_default(None).expect("defaults");
    assert_eq!(defaults.benchmark.times, 10_000);
}
