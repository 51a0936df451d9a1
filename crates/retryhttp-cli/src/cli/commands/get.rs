//! `retryhttp get <url>` and `retryhttp head <url>`.

use anyhow::Result;
use retryhttp_core::Request;
use std::path::Path;

use super::output::{print_head, write_response};
use super::{to_headers, Context};

pub fn run_get(
    ctx: &Context,
    url: &str,
    headers: Vec<(String, String)>,
    output: Option<&Path>,
) -> Result<()> {
    let request = Request::new("GET", url)?.with_headers(to_headers(headers));
    let resp = ctx.send(request)?;
    let written = write_response(resp, output)?;
    if let Some(path) = output {
        tracing::info!("wrote {} bytes to {}", written, path.display());
    }
    Ok(())
}

pub fn run_head(ctx: &Context, url: &str, headers: Vec<(String, String)>) -> Result<()> {
    let request = Request::new("HEAD", url)?.with_headers(to_headers(headers));
    let resp = ctx.send(request)?;
    print_head(&resp);
    Ok(())
}
