//! `retryhttp post <url>` and `retryhttp post-form <url> k=v...`

use anyhow::{Context as _, Result};
use retryhttp_core::{Body, Request};
use std::fs::File;
use std::path::PathBuf;

use super::output::write_response;
use super::{to_headers, Context};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostBody {
    Data(String),
    File(PathBuf),
}

impl PostBody {
    fn into_body(self) -> Result<Body> {
        match self {
            PostBody::Data(data) => Ok(Body::from(data)),
            PostBody::File(path) => {
                let file =
                    File::open(&path).with_context(|| format!("opening {}", path.display()))?;
                Ok(Body::from_seekable(file)?)
            }
        }
    }
}

pub fn run_post(
    ctx: &Context,
    url: &str,
    body: PostBody,
    content_type: &str,
    headers: Vec<(String, String)>,
) -> Result<()> {
    let mut headers = to_headers(headers);
    if !headers.contains("content-type") {
        headers.insert("Content-Type", content_type);
    }
    let request = Request::new("POST", url)?
        .with_headers(headers)
        .with_body(body.into_body()?);
    let resp = ctx.send(request)?;
    write_response(resp, None)?;
    Ok(())
}

pub fn run_post_form(ctx: &Context, url: &str, fields: &[(String, String)]) -> Result<()> {
    let request = Request::form("POST", url, fields)?;
    let resp = ctx.send(request)?;
    write_response(resp, None)?;
    Ok(())
}
