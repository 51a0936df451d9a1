//! `retryhttp put <url> --file PATH`

use anyhow::{Context as _, Result};
use retryhttp_core::{Body, Request};
use std::fs::File;
use std::path::Path;

use super::output::write_response;
use super::{to_headers, Context};

/// Uploads `path` as the body. The file is re-read from the start on every attempt.
pub fn run_put(
    ctx: &Context,
    url: &str,
    path: &Path,
    headers: Vec<(String, String)>,
) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let body = Body::from_seekable(file)?;
    let request = Request::new("PUT", url)?
        .with_headers(to_headers(headers))
        .with_body(body);
    let resp = ctx.send(request)?;
    write_response(resp, None)?;
    Ok(())
}
