mod auth;
mod call;
mod show;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sheets_api::error::Result;
use sheets_api::{Collection, Config, SheetsClient};
use std::path::PathBuf;

pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "sheets-api")]
#[command(about = "Call the Google Sheets API with a locally authorized account", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Auth { reset, client } => auth::execute(*reset, client).await,
            Commands::Call {
                collection,
                method,
                payload,
                client,
            } => call::execute((*collection).into(), method, payload.as_deref(), client).await,
            Commands::Show { resource } => resource.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize access to Google Sheets
    Auth {
        /// Discard cached tokens and authorize from scratch
        #[arg(long)]
        reset: bool,

        #[command(flatten)]
        client: ClientArgs,
    },
    /// Call a method on one of the spreadsheet collections
    Call {
        #[arg(value_enum)]
        collection: CollectionArg,

        /// Method name, e.g. `get` or `batchUpdate`
        method: String,

        /// Request payload as a JSON object
        #[arg(long)]
        payload: Option<String>,

        #[command(flatten)]
        client: ClientArgs,
    },
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}

/// Collection names as accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionArg {
    Spreadsheets,
    Sheets,
    Values,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Spreadsheets => Collection::Spreadsheets,
            CollectionArg::Sheets => Collection::Sheets,
            CollectionArg::Values => Collection::Values,
        }
    }
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Path to the OAuth client credentials file [default: from config, or credentials.json]
    #[arg(long)]
    credentials: Option<PathBuf>,
}

impl ClientArgs {
    fn build_client(&self) -> Result<SheetsClient> {
        let mut config = Config::load()?.google;
        if let Some(path) = &self.credentials {
            config.credentials_path = Some(path.clone());
        }

        SheetsClient::from_config(&config)
    }
}
