use super::auth::AUTH_SCOPE;
use super::completion::Completion;
use super::{AUTH_FIELD, Collection, Payload, SheetsApi};
use crate::error::{AppError, RequestError, Result};
use google_sheets4::api::Sheets;
use google_sheets4::common;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Instrument, debug, debug_span};
use url::Url;

const SPREADSHEET_ID: &str = "spreadsheetId";
const RANGE: &str = "range";
const SHEET_ID: &str = "sheetId";

// Payload fields sent as the JSON request body
const BODY_FIELDS: &[&str] = &["resource", "requestBody"];

// Fields consumed before the rest of the payload becomes query parameters
const RESERVED_FIELDS: &[&str] = &[
    SPREADSHEET_ID,
    RANGE,
    SHEET_ID,
    "resource",
    "requestBody",
    AUTH_FIELD,
];

type Connector = HttpsConnector<HttpConnector>;

/// [`SheetsApi`] over the google-sheets4 hub.
///
/// A hub is built per call so that each request is sent with the access
/// token carried in its own payload.
#[derive(Clone, Debug)]
pub struct RestTransport {
    client: common::Client<Connector>,
    base_url: String,
}

impl RestTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid API base URL {}: {}", base_url, e)))?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

        Self::with_client(client, base_url)
    }

    pub fn with_client(client: common::Client<Connector>, mut base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Invalid API base URL {}: cannot be a base",
                base_url
            )));
        }

        // The hub appends `v4/...` directly to the base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn hub(&self, token: String) -> Sheets<Connector> {
        let mut hub = Sheets::new(self.client.clone(), token);
        hub.base_url(self.base_url.clone());
        hub.root_url(self.base_url.clone());
        hub
    }
}

impl SheetsApi for RestTransport {
    fn invoke(
        &self,
        collection: Collection,
        method: &str,
        payload: &Payload,
        done: Completion<Value>,
    ) {
        let (operation, token) = match lookup(collection, method)
            .and_then(|operation| Ok((operation, bearer(payload)?)))
        {
            Ok(prepared) => prepared,
            Err(e) => return done.fail(e),
        };

        let hub = self.hub(token);
        let payload = payload.clone();
        let span = debug_span!("Sheets API request", %collection, method);
        tokio::spawn(
            async move {
                done.complete(execute(hub, operation, payload).await);
            }
            .instrument(span),
        );
    }
}

/// Sheets v4 methods reachable through the three collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Get,
    Create,
    BatchUpdate,
    GetByDataFilter,
    CopyTo,
    ValuesGet,
    ValuesUpdate,
    ValuesAppend,
    ValuesClear,
    ValuesBatchGet,
    ValuesBatchUpdate,
    ValuesBatchClear,
    ValuesBatchGetByDataFilter,
    ValuesBatchUpdateByDataFilter,
    ValuesBatchClearByDataFilter,
}

const SPREADSHEETS: &[(&str, Operation)] = &[
    ("get", Operation::Get),
    ("create", Operation::Create),
    ("batchUpdate", Operation::BatchUpdate),
    ("getByDataFilter", Operation::GetByDataFilter),
];

const SHEETS: &[(&str, Operation)] = &[("copyTo", Operation::CopyTo)];

const VALUES: &[(&str, Operation)] = &[
    ("get", Operation::ValuesGet),
    ("update", Operation::ValuesUpdate),
    ("append", Operation::ValuesAppend),
    ("clear", Operation::ValuesClear),
    ("batchGet", Operation::ValuesBatchGet),
    ("batchUpdate", Operation::ValuesBatchUpdate),
    ("batchClear", Operation::ValuesBatchClear),
    ("batchGetByDataFilter", Operation::ValuesBatchGetByDataFilter),
    (
        "batchUpdateByDataFilter",
        Operation::ValuesBatchUpdateByDataFilter,
    ),
    (
        "batchClearByDataFilter",
        Operation::ValuesBatchClearByDataFilter,
    ),
];

fn lookup(collection: Collection, method: &str) -> std::result::Result<Operation, RequestError> {
    let table = match collection {
        Collection::Spreadsheets => SPREADSHEETS,
        Collection::Sheets => SHEETS,
        Collection::Values => VALUES,
    };

    table
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, operation)| *operation)
        .ok_or_else(|| RequestError::UnknownMethod {
            collection: collection.name(),
            method: method.to_string(),
        })
}

/// Apply the leftover query parameters, then send the call and turn the typed
/// response back into JSON.
macro_rules! send {
    ($call:expr, $query:expr) => {
        finish(
            $query
                .into_params()
                .fold($call, |call, (name, value)| call.param(name, value))
                .add_scope(AUTH_SCOPE)
                .doit()
                .await,
        )
    };
}

async fn execute(
    hub: Sheets<Connector>,
    operation: Operation,
    payload: Payload,
) -> std::result::Result<Value, RequestError> {
    let mut query = Query::new(&payload);
    let spreadsheets = hub.spreadsheets();

    match operation {
        Operation::Get => {
            let mut call = spreadsheets.get(&path_param(&payload, SPREADSHEET_ID)?);
            for range in query.take_all("ranges") {
                call = call.add_ranges(&range);
            }
            if let Some(include) = query.take_bool("includeGridData")? {
                call = call.include_grid_data(include);
            }
            send!(call, query)
        }
        Operation::Create => send!(spreadsheets.create(body(&payload)?), query),
        Operation::BatchUpdate => send!(
            spreadsheets.batch_update(body(&payload)?, &path_param(&payload, SPREADSHEET_ID)?),
            query
        ),
        Operation::GetByDataFilter => send!(
            spreadsheets
                .get_by_data_filter(body(&payload)?, &path_param(&payload, SPREADSHEET_ID)?),
            query
        ),
        Operation::CopyTo => send!(
            spreadsheets.sheets_copy_to(
                body(&payload)?,
                &path_param(&payload, SPREADSHEET_ID)?,
                sheet_id(&payload)?,
            ),
            query
        ),
        Operation::ValuesGet => {
            let mut call = spreadsheets.values_get(
                &path_param(&payload, SPREADSHEET_ID)?,
                &path_param(&payload, RANGE)?,
            );
            if let Some(option) = query.take("valueRenderOption") {
                call = call.value_render_option(&option);
            }
            if let Some(dimension) = query.take("majorDimension") {
                call = call.major_dimension(&dimension);
            }
            if let Some(option) = query.take("dateTimeRenderOption") {
                call = call.date_time_render_option(&option);
            }
            send!(call, query)
        }
        Operation::ValuesUpdate => {
            let mut call = spreadsheets.values_update(
                body(&payload)?,
                &path_param(&payload, SPREADSHEET_ID)?,
                &path_param(&payload, RANGE)?,
            );
            if let Some(option) = query.take("valueInputOption") {
                call = call.value_input_option(&option);
            }
            if let Some(option) = query.take("responseValueRenderOption") {
                call = call.response_value_render_option(&option);
            }
            if let Some(option) = query.take("responseDateTimeRenderOption") {
                call = call.response_date_time_render_option(&option);
            }
            if let Some(include) = query.take_bool("includeValuesInResponse")? {
                call = call.include_values_in_response(include);
            }
            send!(call, query)
        }
        Operation::ValuesAppend => {
            let mut call = spreadsheets.values_append(
                body(&payload)?,
                &path_param(&payload, SPREADSHEET_ID)?,
                &path_param(&payload, RANGE)?,
            );
            if let Some(option) = query.take("valueInputOption") {
                call = call.value_input_option(&option);
            }
            if let Some(option) = query.take("insertDataOption") {
                call = call.insert_data_option(&option);
            }
            if let Some(option) = query.take("responseValueRenderOption") {
                call = call.response_value_render_option(&option);
            }
            if let Some(option) = query.take("responseDateTimeRenderOption") {
                call = call.response_date_time_render_option(&option);
            }
            if let Some(include) = query.take_bool("includeValuesInResponse")? {
                call = call.include_values_in_response(include);
            }
            send!(call, query)
        }
        Operation::ValuesClear => send!(
            spreadsheets.values_clear(
                body(&payload)?,
                &path_param(&payload, SPREADSHEET_ID)?,
                &path_param(&payload, RANGE)?,
            ),
            query
        ),
        Operation::ValuesBatchGet => {
            let mut call = spreadsheets.values_batch_get(&path_param(&payload, SPREADSHEET_ID)?);
            for range in query.take_all("ranges") {
                call = call.add_ranges(&range);
            }
            if let Some(option) = query.take("valueRenderOption") {
                call = call.value_render_option(&option);
            }
            if let Some(dimension) = query.take("majorDimension") {
                call = call.major_dimension(&dimension);
            }
            if let Some(option) = query.take("dateTimeRenderOption") {
                call = call.date_time_render_option(&option);
            }
            send!(call, query)
        }
        Operation::ValuesBatchUpdate => send!(
            spreadsheets
                .values_batch_update(body(&payload)?, &path_param(&payload, SPREADSHEET_ID)?),
            query
        ),
        Operation::ValuesBatchClear => send!(
            spreadsheets
                .values_batch_clear(body(&payload)?, &path_param(&payload, SPREADSHEET_ID)?),
            query
        ),
        Operation::ValuesBatchGetByDataFilter => send!(
            spreadsheets.values_batch_get_by_data_filter(
                body(&payload)?,
                &path_param(&payload, SPREADSHEET_ID)?,
            ),
            query
        ),
        Operation::ValuesBatchUpdateByDataFilter => send!(
            spreadsheets.values_batch_update_by_data_filter(
                body(&payload)?,
                &path_param(&payload, SPREADSHEET_ID)?,
            ),
            query
        ),
        Operation::ValuesBatchClearByDataFilter => send!(
            spreadsheets.values_batch_clear_by_data_filter(
                body(&payload)?,
                &path_param(&payload, SPREADSHEET_ID)?,
            ),
            query
        ),
    }
}

fn finish<T: Serialize>(
    result: google_sheets4::Result<(common::Response, T)>,
) -> std::result::Result<Value, RequestError> {
    let (response, body) = result?;
    debug!(status = %response.status(), "Received response");

    let mut value = serde_json::to_value(body)?;
    // Unset fields of the typed response come back as nulls
    common::remove_json_null_values(&mut value);

    Ok(value)
}

/// The access token the call is sent with.
fn bearer(payload: &Payload) -> std::result::Result<String, RequestError> {
    match payload.get(AUTH_FIELD) {
        Some(Value::String(token)) if !token.is_empty() => Ok(token.clone()),
        None => Err(RequestError::MissingParameter(AUTH_FIELD.to_string())),
        Some(other) => Err(RequestError::InvalidParameter {
            name: AUTH_FIELD.to_string(),
            reason: format!("expected an access token string, got {}", other),
        }),
    }
}

fn path_param(payload: &Payload, name: &str) -> std::result::Result<String, RequestError> {
    match payload.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            Err(RequestError::MissingParameter(name.to_string()))
        }
        Some(other) => Err(RequestError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected a string or number, got {}", other),
        }),
    }
}

fn sheet_id(payload: &Payload) -> std::result::Result<i32, RequestError> {
    let raw = path_param(payload, SHEET_ID)?;
    raw.parse().map_err(|_| RequestError::InvalidParameter {
        name: SHEET_ID.to_string(),
        reason: format!("expected a sheet ID, got {}", raw),
    })
}

/// Deserialize the request body, defaulting to an empty request when absent.
fn body<T>(payload: &Payload) -> std::result::Result<T, RequestError>
where
    T: DeserializeOwned + Default,
{
    let Some((name, value)) = BODY_FIELDS
        .iter()
        .find_map(|name| payload.get(*name).map(|value| (*name, value)))
    else {
        return Ok(T::default());
    };

    serde_json::from_value(value.clone()).map_err(|e| RequestError::InvalidParameter {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Payload fields left over for the query string.
#[derive(Debug, Default, PartialEq)]
struct Query(Vec<(String, String)>);

impl Query {
    fn new(payload: &Payload) -> Self {
        let mut params = Vec::new();
        for (key, value) in payload {
            if !RESERVED_FIELDS.contains(&key.as_str()) {
                push_param(&mut params, key, value);
            }
        }
        Self(params)
    }

    /// Remove and return every value given for `name`.
    fn take_all(&mut self, name: &str) -> Vec<String> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.0)
            .into_iter()
            .partition(|(key, _)| key == name);
        self.0 = rest;
        taken.into_iter().map(|(_, value)| value).collect()
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.take_all(name).pop()
    }

    fn take_bool(&mut self, name: &str) -> std::result::Result<Option<bool>, RequestError> {
        self.take(name)
            .map(|value| {
                value.parse().map_err(|_| RequestError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("expected true or false, got {}", value),
                })
            })
            .transpose()
    }

    fn into_params(self) -> impl Iterator<Item = (String, String)> {
        self.0.into_iter()
    }
}

fn push_param(params: &mut Vec<(String, String)>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => params.push((key.to_string(), s.clone())),
        Value::Array(items) => items.iter().for_each(|item| push_param(params, key, item)),
        other => params.push((key.to_string(), other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::completion::deferred;
    use google_sheets4::api::ValueRange;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn transport() -> RestTransport {
        RestTransport::new("http://127.0.0.1:9/").unwrap()
    }

    #[test]
    fn test_invalid_base_url() {
        let err = RestTransport::new("not a url").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let transport = RestTransport::new("http://127.0.0.1:8080/proxy").unwrap();
        assert_eq!(transport.base_url, "http://127.0.0.1:8080/proxy/");

        let transport = RestTransport::new("http://127.0.0.1:8080").unwrap();
        assert_eq!(transport.base_url, "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_lookup_per_collection() {
        assert_eq!(
            lookup(Collection::Spreadsheets, "get").unwrap(),
            Operation::Get
        );
        assert_eq!(
            lookup(Collection::Values, "get").unwrap(),
            Operation::ValuesGet
        );
        assert_eq!(
            lookup(Collection::Values, "batchClearByDataFilter").unwrap(),
            Operation::ValuesBatchClearByDataFilter
        );
        assert_eq!(
            lookup(Collection::Sheets, "copyTo").unwrap(),
            Operation::CopyTo
        );
    }

    #[test]
    fn test_lookup_unknown_method() {
        let err = lookup(Collection::Sheets, "get").unwrap_err();
        match err {
            RequestError::UnknownMethod { collection, method } => {
                assert_eq!(collection, "spreadsheets.sheets");
                assert_eq!(method, "get");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_method_fails_without_request() {
        let transport = transport();
        let payload = payload(json!({"auth": "tok1"}));

        let result = deferred(|done| {
            transport.invoke(Collection::Spreadsheets, "copyTo", &payload, done)
        })
        .await;

        assert!(matches!(
            result,
            Err(RequestError::UnknownMethod { collection: "spreadsheets", .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_parameter_fails_without_request() {
        let transport = transport();
        let payload = payload(json!({"range": "A1", "auth": "tok1"}));

        let result =
            deferred(|done| transport.invoke(Collection::Values, "get", &payload, done)).await;

        assert!(
            matches!(result, Err(RequestError::MissingParameter(name)) if name == "spreadsheetId")
        );
    }

    #[tokio::test]
    async fn test_non_string_auth_is_rejected() {
        let transport = transport();
        let payload = payload(json!({
            "spreadsheetId": "abc",
            "range": "Sheet1",
            "auth": {"token": "tok2"},
        }));

        let result =
            deferred(|done| transport.invoke(Collection::Values, "get", &payload, done)).await;

        assert!(matches!(result, Err(RequestError::InvalidParameter { name, .. }) if name == "auth"));
    }

    #[test]
    fn test_bearer() {
        assert_eq!(bearer(&payload(json!({"auth": "tok1"}))).unwrap(), "tok1");
        assert!(matches!(
            bearer(&Payload::new()),
            Err(RequestError::MissingParameter(name)) if name == "auth"
        ));
        assert!(matches!(
            bearer(&payload(json!({"auth": ""}))),
            Err(RequestError::InvalidParameter { name, .. }) if name == "auth"
        ));
        assert!(matches!(
            bearer(&payload(json!({"auth": 42}))),
            Err(RequestError::InvalidParameter { name, .. }) if name == "auth"
        ));
    }

    #[test]
    fn test_path_params() {
        let request = payload(json!({
            "spreadsheetId": "abc",
            "sheetId": 0,
            "range": "",
        }));

        assert_eq!(path_param(&request, SPREADSHEET_ID).unwrap(), "abc");
        assert_eq!(sheet_id(&request).unwrap(), 0);
        assert!(matches!(
            path_param(&request, RANGE),
            Err(RequestError::MissingParameter(name)) if name == "range"
        ));
        assert!(matches!(
            path_param(&payload(json!({"spreadsheetId": ["abc"]})), SPREADSHEET_ID),
            Err(RequestError::InvalidParameter { .. })
        ));
        assert_eq!(sheet_id(&payload(json!({"sheetId": "12"}))).unwrap(), 12);
        assert!(matches!(
            sheet_id(&payload(json!({"sheetId": 4294967296u64}))),
            Err(RequestError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_body_from_resource_or_request_body() {
        let from_resource: ValueRange =
            body(&payload(json!({"resource": {"values": [["a", 1]]}}))).unwrap();
        assert_eq!(from_resource.values, Some(vec![vec![json!("a"), json!(1)]]));

        let from_request_body: ValueRange =
            body(&payload(json!({"requestBody": {"range": "Sheet1!A1"}}))).unwrap();
        assert_eq!(from_request_body.range.as_deref(), Some("Sheet1!A1"));

        let empty: ValueRange = body(&Payload::new()).unwrap();
        assert_eq!(empty.values, None);
    }

    #[test]
    fn test_invalid_body() {
        let err = body::<ValueRange>(&payload(json!({"resource": {"values": "nope"}})))
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidParameter { name, .. } if name == "resource"));
    }

    #[test]
    fn test_query_skips_reserved_fields() {
        let mut query = Query::new(&payload(json!({
            "spreadsheetId": "abc",
            "auth": "tok1",
            "resource": {},
            "ranges": ["A1:B2", "C3"],
            "includeGridData": true,
            "dateTimeRenderOption": null,
            "fields": "sheets.properties",
        })));

        assert_eq!(query.take_all("ranges"), vec!["A1:B2", "C3"]);
        assert_eq!(query.take_bool("includeGridData").unwrap(), Some(true));
        assert_eq!(query.take("dateTimeRenderOption"), None);
        assert_eq!(
            query.into_params().collect::<Vec<_>>(),
            vec![("fields".to_string(), "sheets.properties".to_string())]
        );
    }

    #[test]
    fn test_query_invalid_bool() {
        let mut query = Query::new(&payload(json!({"includeGridData": "sometimes"})));
        assert!(matches!(
            query.take_bool("includeGridData"),
            Err(RequestError::InvalidParameter { name, .. }) if name == "includeGridData"
        ));
    }
}
