mod auth;
mod client;
pub mod completion;
mod rest;

pub use auth::{AUTH_SCOPE, Authorization, Authorizer, GoogleAuthorizer, clear_tokens};
pub use client::{CollectionResult, SheetsClient};
pub use completion::{Completion, Deferred, deferred};
pub use rest::RestTransport;

use serde_json::{Map, Value};
use std::fmt;

/// Name of the payload field carrying the authorization handle.
pub const AUTH_FIELD: &str = "auth";

/// Parameters of a single API call, keyed by field name.
pub type Payload = Map<String, Value>;

/// Sub-collections of the Sheets v4 `spreadsheets` resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Spreadsheets,
    Sheets,
    Values,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Spreadsheets => "spreadsheets",
            Collection::Sheets => "spreadsheets.sheets",
            Collection::Values => "spreadsheets.values",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The spreadsheet API surface: named methods on each collection, each taking
/// a payload and reporting back through a [`Completion`] exactly once.
pub trait SheetsApi: Send + Sync {
    fn invoke(
        &self,
        collection: Collection,
        method: &str,
        payload: &Payload,
        done: Completion<Value>,
    );
}
