//! Printing responses: status and headers to stderr, body to stdout or a file.

use anyhow::{Context, Result};
use retryhttp_core::Response;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub fn print_head(resp: &Response) {
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "HTTP {}", resp.status());
    for (name, value) in resp.headers().iter() {
        let _ = writeln!(err, "{name}: {value}");
    }
}

/// Prints the head, then copies the body. Returns the number of body bytes written.
pub fn write_response(resp: Response, output: Option<&Path>) -> Result<u64> {
    print_head(&resp);
    let mut body = resp.into_body();
    let written = match output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            io::copy(&mut body, &mut file).with_context(|| format!("writing {}", path.display()))?
        }
        None => {
            let mut out = io::stdout().lock();
            let n = io::copy(&mut body, &mut out).context("writing response body")?;
            out.flush()?;
            n
        }
    };
    Ok(written)
}
