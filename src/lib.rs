//! Authorization-aware wrapper around the Google Sheets API v4.
//!
//! [`SheetsClient::authorize`] obtains an [`Authorization`] for the
//! spreadsheets scope; [`SheetsClient::spreadsheets`], [`SheetsClient::sheets`]
//! and [`SheetsClient::values`] call a named method on the matching collection,
//! adding the authorization to the request payload when the caller hasn't.
//!
//! ```no_run
//! use sheets_api::{Payload, SheetsClient};
//! use serde_json::json;
//!
//! # async fn run() -> sheets_api::Result<()> {
//! let client = SheetsClient::new(None)?;
//! let auth = client.authorize().await?;
//!
//! let mut payload = Payload::new();
//! payload.insert("spreadsheetId".to_string(), json!("abc"));
//! payload.insert("range".to_string(), json!("Sheet1!A1:B2"));
//!
//! let result = client.values("get", &auth, &mut payload).await?;
//! println!("{}", result.response);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod sheets;

pub use config::{Config, GoogleConfig};
pub use error::{AppError, AuthorizationError, RequestError, Result};
pub use sheets::{
    AUTH_FIELD, Authorization, Authorizer, Collection, CollectionResult, Payload, SheetsApi,
    SheetsClient,
};
