//! `retryhttp bench` – upload a generated file with PUT, download it with GET.
//!
//! Both URLs are expected to be pre-signed (e.g. S3/R2 presigned URLs); this
//! command only moves bytes and reports how long each leg took.

use anyhow::{ensure, Context as _, Result};
use rand::RngCore;
use retryhttp_core::{Body, Request};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::Context;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BenchArgs {
    pub put_url: String,
    pub get_url: String,
    pub size_mib: u64,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegResult {
    pub bytes: u64,
    pub elapsed_secs: f64,
}

impl LegResult {
    pub fn throughput_mib_s(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / MIB as f64 / self.elapsed_secs
    }
}

/// Writes `size` random bytes to a new file under `dir` and returns its path.
pub fn generate_file(dir: &Path, size: u64) -> Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let name = format!("test_{}MB_{}_{}", size / MIB, size, nanos);
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let mut rng = rand::thread_rng();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut left = size;
    while left > 0 {
        let n = left.min(chunk.len() as u64) as usize;
        rng.fill_bytes(&mut chunk[..n]);
        out.write_all(&chunk[..n])?;
        left -= n as u64;
    }
    out.flush()?;
    Ok(path)
}

/// `<file>_downloaded`, next to the uploaded file.
pub fn downloaded_path(uploaded: &Path) -> PathBuf {
    let mut name = uploaded.as_os_str().to_owned();
    name.push("_downloaded");
    PathBuf::from(name)
}

fn upload(ctx: &Context, url: &str, path: &Path) -> Result<LegResult> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let body = Body::from_seekable(file)?;
    let bytes = body.len().unwrap_or(0);
    let request = Request::new("PUT", url)?
        .header("Content-Type", "application/octet-stream")
        .with_body(body);
    let started = Instant::now();
    let resp = ctx.send(request)?;
    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    ensure!(status == 200, "upload failed with status {}: {}", status, text.trim());
    Ok(LegResult {
        bytes,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

fn download(ctx: &Context, url: &str, dest: &Path) -> Result<LegResult> {
    let started = Instant::now();
    let resp = ctx.send(Request::new("GET", url)?)?;
    let status = resp.status();
    ensure!(status == 200, "download failed with status {}", status);
    let mut file = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    let bytes = io::copy(&mut resp.into_body(), &mut file)
        .with_context(|| format!("writing {}", dest.display()))?;
    Ok(LegResult {
        bytes,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

fn print_leg(label: &str, leg: &LegResult) {
    println!(
        "  {:<8}  {:>12}  {:>8.2}  {:>8.2}",
        label,
        leg.bytes,
        leg.elapsed_secs,
        leg.throughput_mib_s()
    );
}

pub fn run_bench(ctx: &Context, args: &BenchArgs) -> Result<()> {
    let size = args.size_mib * MIB;
    let path = generate_file(&args.dir, size)?;
    println!("Generated {} ({} bytes)", path.display(), size);

    let put = upload(ctx, &args.put_url, &path)?;
    println!("File uploaded successfully.");

    let dest = downloaded_path(&path);
    let get = download(ctx, &args.get_url, &dest)?;
    println!("File downloaded successfully to {}.", dest.display());

    println!(
        "  {:<8}  {:>12}  {:>8}  {:>8}",
        "Leg", "Bytes", "Time(s)", "MiB/s"
    );
    print_leg("PUT", &put);
    print_leg("GET", &get);
    if get.bytes != put.bytes {
        tracing::warn!(
            uploaded = put.bytes,
            downloaded = get.bytes,
            "downloaded size differs from uploaded size"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_file_has_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = generate_file(dir.path(), 100_000).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 100_000);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("test_0MB_100000_"), "{name}");
    }

    #[test]
    fn downloaded_path_appends_suffix() {
        let p = downloaded_path(Path::new("/tmp/test_1MB_1048576_42"));
        assert_eq!(p, Path::new("/tmp/test_1MB_1048576_42_downloaded"));
    }

    #[test]
    fn throughput_handles_zero_time() {
        let leg = LegResult {
            bytes: 2 * MIB,
            elapsed_secs: 0.0,
        };
        assert_eq!(leg.throughput_mib_s(), 0.0);
        let leg = LegResult {
            bytes: 2 * MIB,
            elapsed_secs: 0.5,
        };
        assert!((leg.throughput_mib_s() - 4.0).abs() < 1e-9);
    }
}
