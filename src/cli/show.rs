use clap::Subcommand;
use sheets_api::config::Config;
use sheets_api::error::Result;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum ShowResource {
    /// Show configuration and cache paths
    Paths,
}

impl ShowResource {
    pub async fn execute(&self) -> Result<()> {
        match self {
            ShowResource::Paths => show_paths(),
        }
    }
}

fn show_paths() -> Result<()> {
    let config_path = Config::config_file()?;
    let cache_dir = Config::cache_dir()?;
    let google = Config::load()?.google;

    info!(path = ?config_path, "Config path");
    info!(path = ?cache_dir, "Cache path");
    info!(path = ?google.credentials_path(), "Credentials path");

    Ok(())
}
