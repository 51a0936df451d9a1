//! CLI for the retryhttp client.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use retryhttp_core::config::{self, ClientConfig};
use retryhttp_core::metrics::MetricsInstrumentation;
use retryhttp_core::retry::BackoffKind;
use retryhttp_core::{CancelToken, Client, ClientBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use commands::{
    run_bench, run_config, run_get, run_head, run_post, run_post_form, run_put, BenchArgs,
    Context as CommandContext, PostBody,
};

/// Top-level CLI for the retryhttp client.
#[derive(Debug, Parser)]
#[command(name = "retryhttp")]
#[command(about = "HTTP client that retries failed requests with backoff", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Options that override the config file for this invocation.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Retries after the first attempt.
    #[arg(long, global = true, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Shortest wait between attempts, in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub wait_min: Option<f64>,

    /// Longest wait between attempts, in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub wait_max: Option<f64>,

    #[arg(long, global = true, value_enum)]
    pub backoff: Option<BackoffArg>,

    /// Give up on the whole call (all attempts and waits) after this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Read configuration from this file instead of the XDG config dir.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print Prometheus metrics for the call to stderr when done.
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Log to stderr instead of the log file.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffArg {
    Exponential,
    LinearJitter,
}

impl From<BackoffArg> for BackoffKind {
    fn from(arg: BackoffArg) -> Self {
        match arg {
            BackoffArg::Exponential => BackoffKind::Exponential,
            BackoffArg::LinearJitter => BackoffKind::LinearJitter,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// GET a URL; body to stdout or a file.
    Get {
        url: String,
        /// Extra request header, "Name: value". Repeatable.
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Write the body here instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// HEAD a URL and print the status and headers.
    Head {
        url: String,
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// POST a string or a file.
    Post {
        url: String,
        /// Request body as a literal string.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,
        /// Request body read from a file.
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// PUT a file.
    Put {
        url: String,
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// POST key=value pairs as a url-encoded form.
    PostForm {
        url: String,
        #[arg(value_parser = parse_field, required = true)]
        fields: Vec<(String, String)>,
    },

    /// Upload a generated file with PUT, download it again with GET, report timings.
    Bench {
        /// Pre-signed URL to upload to.
        #[arg(long)]
        put_url: String,
        /// Pre-signed URL to download from.
        #[arg(long)]
        get_url: String,
        /// Size of the generated file in MiB.
        #[arg(long, default_value = "100", value_name = "N")]
        size_mib: u64,
        /// Where to write the generated and downloaded files.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Show the config file location and the values in effect.
    Config,
}

/// "Name: value" -> (Name, value). The value may be empty.
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("header {s:?} must look like \"Name: value\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header {s:?} has no name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// "key=value" -> (key, value).
fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("form field {s:?} must look like key=value"))
}

impl GlobalArgs {
    fn load_config(&self) -> Result<ClientConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        if let Some(n) = self.max_retries {
            cfg.max_retries = n;
        }
        if let Some(secs) = self.wait_min {
            cfg.retry_wait_min_secs = secs;
        }
        if let Some(secs) = self.wait_max {
            cfg.retry_wait_max_secs = secs;
        }
        if let Some(backoff) = self.backoff {
            cfg.backoff = backoff.into();
        }
        Ok(cfg)
    }

    fn cancel_token(&self) -> Result<CancelToken> {
        match self.timeout {
            Some(secs) => {
                let timeout = Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid --timeout {secs}"))?;
                Ok(CancelToken::with_timeout(timeout))
            }
            None => Ok(CancelToken::new()),
        }
    }
}

fn build_client(cfg: &ClientConfig, metrics: bool) -> Result<(Client, Option<PrometheusHandle>)> {
    let mut builder = ClientBuilder::from_config(cfg)?;
    let mut handle = None;
    if metrics {
        let recorder = PrometheusBuilder::new().build_recorder();
        handle = Some(recorder.handle());
        let instrumentation = MetricsInstrumentation::new(Arc::new(recorder));
        instrumentation.register();
        builder = builder.instrumentation(instrumentation);
    }
    Ok((builder.build()?, handle))
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let cfg = self.global.load_config()?;
        tracing::debug!("loaded config: {:?}", cfg);

        if let CliCommand::Config = self.command {
            return run_config(self.global.config.as_deref(), &cfg);
        }

        let (client, metrics) = build_client(&cfg, self.global.metrics)?;
        let ctx = CommandContext {
            client,
            cancel: self.global.cancel_token()?,
        };

        let result = match self.command {
            CliCommand::Get {
                url,
                headers,
                output,
            } => run_get(&ctx, &url, headers, output.as_deref()),
            CliCommand::Head { url, headers } => run_head(&ctx, &url, headers),
            CliCommand::Post {
                url,
                data,
                file,
                content_type,
                headers,
            } => {
                let body = match (data, file) {
                    (Some(data), _) => PostBody::Data(data),
                    (None, Some(path)) => PostBody::File(path),
                    (None, None) => anyhow::bail!("post needs --data or --file"),
                };
                run_post(&ctx, &url, body, &content_type, headers)
            }
            CliCommand::Put { url, file, headers } => run_put(&ctx, &url, &file, headers),
            CliCommand::PostForm { url, fields } => run_post_form(&ctx, &url, &fields),
            CliCommand::Bench {
                put_url,
                get_url,
                size_mib,
                dir,
            } => run_bench(
                &ctx,
                &BenchArgs {
                    put_url,
                    get_url,
                    size_mib,
                    dir,
                },
            ),
            CliCommand::Config => Ok(()),
        };

        // stderr, so it never mixes with a body on stdout; also printed when the call failed
        if let Some(handle) = metrics {
            eprint!("{}", handle.render());
        }
        result
    }
}

#[cfg(test)]
mod tests;
