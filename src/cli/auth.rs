use super::ClientArgs;
use sheets_api::error::Result;
use sheets_api::sheets::clear_tokens;
use tracing::info;

pub async fn execute(reset: bool, args: &ClientArgs) -> Result<()> {
    if reset {
        clear_tokens()?;
    }

    let client = args.build_client()?;
    client.authorize().await?;

    info!(credentials = ?client.credentials_path(), "Google Sheets authorization verified");

    Ok(())
}
