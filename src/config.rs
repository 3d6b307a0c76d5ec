use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_STORAGE_DIR: &str = "server-files";

#[derive(Debug, Clone, Parser)]
#[command(name = "filedeck", version, about = "Serve a directory tree to a browser file manager")]
pub struct Config {
    /// Directory holding the managed tree. Defaults to `server-files` under
    /// the working directory.
    #[arg(long, env = "FILE_STORAGE_PATH")]
    pub storage_root: Option<PathBuf>,

    #[arg(long, env = "FILEDECK_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Largest accepted upload request body, in MiB.
    #[arg(long, env = "FILEDECK_MAX_UPLOAD_MB", default_value_t = 1024)]
    pub max_upload_mb: usize,

    /// Built front-end assets, served for any path the API does not claim.
    #[arg(long, env = "FILEDECK_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn storage_root(&self) -> anyhow::Result<PathBuf> {
        match &self.storage_root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()
                .context("cannot resolve working directory for the default storage root")?
                .join(DEFAULT_STORAGE_DIR)),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
