//! xq-api - HTTP API over package repodata
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Loads `<arch>-repodata` archives and serves their packages as cacheable
//! JSON:
//!
//! ```text
//! GET /v1/archs                         architecture names
//! GET /v1/packages/:arch                package names
//! GET /v1/packages/:arch/:package       one package record
//! GET /v1/query/:arch?q=                substring match on pkgver/short_desc
//! GET /v1/search/:arch?q=&limit=        ranked full-text search (--search-index)
//! ```

pub mod error;
pub mod handlers;
pub mod server;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub use error::ApiError;
pub use server::{ServerConfig, ServerState, router};

#[derive(Debug, Parser)]
#[command(name = "xq-api")]
#[command(author, version, about = "xq-api - HTTP API over package repodata")]
pub struct Cli {
    /// Repodata files (`<arch>-repodata`) or directories to search for them
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Listen address
    #[arg(long, env = "XQ_LISTEN", default_value = "127.0.0.1:8197")]
    pub listen: SocketAddr,

    /// Maximum number of filter queries running at once
    #[arg(
        long,
        env = "XQ_MAX_QUERIES",
        default_value_t = server::DEFAULT_MAX_QUERIES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_queries: u32,

    /// Log every request
    #[arg(long, env = "XQ_ACCESS_LOG")]
    pub access_log: bool,

    /// Build a full-text index per architecture and serve /v1/search
    #[arg(long, env = "XQ_SEARCH_INDEX")]
    pub search_index: bool,

    /// Compress responses with gzip when the client accepts it
    #[arg(long, env = "XQ_GZIP", default_value_t = true, action = ArgAction::Set)]
    pub gzip: bool,

    /// Allow cross-origin GET requests from any origin
    #[arg(long, env = "XQ_CORS")]
    pub cors: bool,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            max_queries: self.max_queries,
            access_log: self.access_log,
            gzip: self.gzip,
            cors: self.cors,
        }
    }
}
