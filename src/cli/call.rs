use super::ClientArgs;
use sheets_api::error::{AppError, Result};
use sheets_api::{Collection, Payload};
use tracing::info;

pub async fn execute(
    collection: Collection,
    method: &str,
    payload: Option<&str>,
    args: &ClientArgs,
) -> Result<()> {
    let mut payload = parse_payload(payload)?;

    let client = args.build_client()?;
    let auth = client.authorize().await?;
    let result = client
        .collection(collection, method, &auth, &mut payload)
        .await?;

    info!(%collection, method, "Call completed");
    println!("{}", serde_json::to_string_pretty(&result.response)?);

    Ok(())
}

fn parse_payload(payload: Option<&str>) -> Result<Payload> {
    let Some(raw) = payload else {
        return Ok(Payload::new());
    };

    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AppError::Config(format!(
            "Payload must be a JSON object, got: {}",
            other
        ))),
    }
}
