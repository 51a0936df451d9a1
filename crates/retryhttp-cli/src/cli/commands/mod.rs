//! CLI command handlers. Each command is in its own file.

mod bench;
mod config;
mod get;
mod output;
mod post;
mod put;

use retryhttp_core::{CancelToken, Client, Error, Headers, Request, Response};

pub use bench::{run_bench, BenchArgs};
pub use config::run_config;
pub use get::{run_get, run_head};
pub use post::{run_post, run_post_form, PostBody};
pub use put::run_put;

/// What every network command needs: the configured client and the call's cancel token.
pub struct Context {
    pub client: Client,
    pub cancel: CancelToken,
}

impl Context {
    pub fn send(&self, request: Request) -> Result<Response, Error> {
        self.client.send_with_cancel(request, &self.cancel)
    }
}

fn to_headers(pairs: Vec<(String, String)>) -> Headers {
    pairs.into_iter().collect()
}
