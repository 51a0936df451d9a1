//! Tests for global options and how they override the config file.

use super::{parse_cli, parse_err};
use crate::cli::{BackoffArg, CliCommand};
use retryhttp_core::retry::BackoffKind;
use std::io::Write;
use std::time::Duration;

#[test]
fn cli_parse_no_globals() {
    let cli = parse_cli(&["retryhttp", "config"]);
    let g = &cli.global;
    assert!(g.max_retries.is_none());
    assert!(g.wait_min.is_none());
    assert!(g.wait_max.is_none());
    assert!(g.backoff.is_none());
    assert!(g.timeout.is_none());
    assert!(g.config.is_none());
    assert!(!g.metrics);
    assert!(!g.verbose);
}

#[test]
fn cli_parse_globals_before_and_after_command() {
    let cli = parse_cli(&[
        "retryhttp",
        "--max-retries",
        "2",
        "--backoff",
        "linear-jitter",
        "get",
        "https://example.com/",
        "--wait-min",
        "0.1",
        "--wait-max",
        "2",
        "--timeout",
        "30",
        "--metrics",
        "-v",
    ]);
    let g = &cli.global;
    assert_eq!(g.max_retries, Some(2));
    assert_eq!(g.backoff, Some(BackoffArg::LinearJitter));
    assert_eq!(g.wait_min, Some(0.1));
    assert_eq!(g.wait_max, Some(2.0));
    assert_eq!(g.timeout, Some(30.0));
    assert!(g.metrics);
    assert!(g.verbose);
    assert!(matches!(cli.command, CliCommand::Get { .. }));
}

#[test]
fn cli_parse_unknown_backoff_rejected() {
    parse_err(&["retryhttp", "--backoff", "fibonacci", "config"]);
}

#[test]
fn overrides_apply_on_top_of_config_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "max_retries = 9\nretry_wait_max_secs = 10.0").unwrap();
    let path = f.path().to_str().unwrap().to_string();

    let cli = parse_cli(&[
        "retryhttp",
        "--config",
        &path,
        "--wait-min",
        "0.5",
        "--backoff",
        "linear-jitter",
        "config",
    ]);
    let cfg = cli.global.load_config().unwrap();
    assert_eq!(cfg.max_retries, 9);
    assert!((cfg.retry_wait_min_secs - 0.5).abs() < 1e-9);
    assert!((cfg.retry_wait_max_secs - 10.0).abs() < 1e-9);
    assert_eq!(cfg.backoff, BackoffKind::LinearJitter);
}

#[test]
fn timeout_becomes_a_deadline() {
    let cli = parse_cli(&["retryhttp", "--timeout", "5", "config"]);
    let token = cli.global.cancel_token().unwrap();
    let left = token.remaining().unwrap();
    assert!(left <= Duration::from_secs(5) && left > Duration::from_secs(4));

    let cli = parse_cli(&["retryhttp", "config"]);
    assert!(cli.global.cancel_token().unwrap().deadline().is_none());

    let cli = parse_cli(&["retryhttp", "--timeout=-1", "config"]);
    assert!(cli.global.cancel_token().is_err());
}
