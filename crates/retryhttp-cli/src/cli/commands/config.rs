//! `retryhttp config` – show where the config lives and what is in effect.

use anyhow::Result;
use retryhttp_core::config::{self, ClientConfig};
use std::path::Path;

/// `explicit` is the `--config` path, if one was given. `cfg` already has
/// command-line overrides applied.
pub fn run_config(explicit: Option<&Path>, cfg: &ClientConfig) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", cfg.to_toml()?);
    Ok(())
}
