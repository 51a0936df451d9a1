//! Tests for bench and config.

use super::{parse, parse_err};
use crate::cli::CliCommand;
use std::path::Path;

#[test]
fn cli_parse_bench_defaults() {
    match parse(&[
        "retryhttp",
        "bench",
        "--put-url",
        "https://bucket.test/k?sig=1",
        "--get-url",
        "https://bucket.test/k?sig=2",
    ]) {
        CliCommand::Bench {
            put_url,
            get_url,
            size_mib,
            dir,
        } => {
            assert_eq!(put_url, "https://bucket.test/k?sig=1");
            assert_eq!(get_url, "https://bucket.test/k?sig=2");
            assert_eq!(size_mib, 100);
            assert_eq!(dir, Path::new("."));
        }
        _ => panic!("expected Bench"),
    }
}

#[test]
fn cli_parse_bench_size_and_dir() {
    match parse(&[
        "retryhttp",
        "bench",
        "--put-url",
        "u1",
        "--get-url",
        "u2",
        "--size-mib",
        "8",
        "--dir",
        "/tmp/bench",
    ]) {
        CliCommand::Bench { size_mib, dir, .. } => {
            assert_eq!(size_mib, 8);
            assert_eq!(dir, Path::new("/tmp/bench"));
        }
        _ => panic!("expected Bench with size and dir"),
    }
}

#[test]
fn cli_parse_bench_needs_both_urls() {
    parse_err(&["retryhttp", "bench", "--put-url", "u1"]);
}

#[test]
fn cli_parse_config() {
    match parse(&["retryhttp", "config"]) {
        CliCommand::Config => {}
        _ => panic!("expected Config"),
    }
}

#[test]
fn cli_parse_unknown_command() {
    parse_err(&["retryhttp", "download", "https://example.com/"]);
}
