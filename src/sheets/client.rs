use super::auth::{AUTH_SCOPE, Authorization, Authorizer, GoogleAuthorizer};
use super::completion::deferred;
use super::rest::RestTransport;
use super::{AUTH_FIELD, Collection, Payload, SheetsApi};
use crate::config::GoogleConfig;
use crate::error::{AuthorizationError, RequestError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Outcome of a collection call, handing the authorization back for chaining.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionResult {
    pub authorization: Authorization,
    pub response: Value,
}

/// Sheets API client that injects the authorization into every request.
pub struct SheetsClient<A = GoogleAuthorizer, S = RestTransport> {
    credentials_path: PathBuf,
    authorizer: A,
    api: S,
}

impl SheetsClient {
    /// Create a client for the public Sheets API.
    ///
    /// `credentials_path` defaults to `credentials.json` in the working directory.
    pub fn new(credentials_path: Option<PathBuf>) -> Result<Self> {
        Self::from_config(&GoogleConfig {
            credentials_path,
            api_base_url: None,
        })
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        Ok(Self::with_parts(
            config.credentials_path(),
            GoogleAuthorizer::new(),
            RestTransport::new(config.api_base_url())?,
        ))
    }
}

impl<A, S> SheetsClient<A, S>
where
    A: Authorizer,
    S: SheetsApi,
{
    pub fn with_parts(credentials_path: PathBuf, authorizer: A, api: S) -> Self {
        Self {
            credentials_path,
            authorizer,
            api,
        }
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Obtain an authorization for the spreadsheets scope.
    #[instrument(name = "Authorizing Google Sheets access", skip_all)]
    pub async fn authorize(&self) -> std::result::Result<Authorization, AuthorizationError> {
        self.authorizer
            .authorize(&[AUTH_SCOPE.as_ref()], &self.credentials_path)
            .await
    }

    /// Call `method` on the `spreadsheets` collection.
    pub async fn spreadsheets(
        &self,
        method: &str,
        authorization: &Authorization,
        payload: &mut Payload,
    ) -> std::result::Result<CollectionResult, RequestError> {
        self.collection(Collection::Spreadsheets, method, authorization, payload)
            .await
    }

    /// Call `method` on the `spreadsheets.sheets` collection.
    pub async fn sheets(
        &self,
        method: &str,
        authorization: &Authorization,
        payload: &mut Payload,
    ) -> std::result::Result<CollectionResult, RequestError> {
        self.collection(Collection::Sheets, method, authorization, payload)
            .await
    }

    /// Call `method` on the `spreadsheets.values` collection.
    pub async fn values(
        &self,
        method: &str,
        authorization: &Authorization,
        payload: &mut Payload,
    ) -> std::result::Result<CollectionResult, RequestError> {
        self.collection(Collection::Values, method, authorization, payload)
            .await
    }

    /// Call `method` on any collection.
    ///
    /// The payload is modified in place: an `auth` field is added when missing,
    /// a caller-supplied one is left alone. Errors from the API are returned
    /// as-is.
    #[instrument(name = "Calling Sheets API", skip(self, authorization, payload))]
    pub async fn collection(
        &self,
        collection: Collection,
        method: &str,
        authorization: &Authorization,
        payload: &mut Payload,
    ) -> std::result::Result<CollectionResult, RequestError> {
        inject_authorization(payload, authorization);

        let payload: &Payload = payload;
        let response = deferred(|done| self.api.invoke(collection, method, payload, done)).await?;
        debug!("Sheets API call completed");

        Ok(CollectionResult {
            authorization: authorization.clone(),
            response,
        })
    }
}

fn inject_authorization(payload: &mut Payload, authorization: &Authorization) {
    let missing = match payload.get(AUTH_FIELD) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };

    if missing {
        payload.insert(
            AUTH_FIELD.to_string(),
            Value::String(authorization.as_str().to_string()),
        );
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::{MockAuthorizer, mock_client};
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn values_response() -> std::result::Result<Value, RequestError> {
        Ok(json!({"values": [[1, 2]]}))
    }

    fn not_found() -> std::result::Result<Value, RequestError> {
        Err(RequestError::Api {
            status: 404,
            message: "not found".to_string(),
        })
    }

    #[tokio::test]
    async fn test_authorize_uses_spreadsheets_scope() {
        let (client, _api) = mock_client(values_response);

        let auth = client.authorize().await.unwrap();

        assert_eq!(auth, Authorization::from("tok1"));
        let calls = client.authorizer.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(
                vec!["https://www.googleapis.com/auth/spreadsheets".to_string()],
                PathBuf::from("credentials.json"),
            )]
        );
    }

    #[tokio::test]
    async fn test_authorize_error_passes_through() {
        let authorizer = MockAuthorizer {
            result: Err("refresh failed"),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        let (_, api) = mock_client(values_response);
        let client =
            SheetsClient::with_parts(PathBuf::from("/secrets/client.json"), authorizer, api);

        let err = client.authorize().await.unwrap_err();

        assert!(matches!(err, AuthorizationError::Token(ref msg) if msg == "refresh failed"));
        assert_eq!(
            client.authorizer.calls.lock().unwrap()[0].1,
            PathBuf::from("/secrets/client.json")
        );
    }

    #[tokio::test]
    async fn test_values_injects_authorization() {
        let (client, api) = mock_client(values_response);
        let auth = Authorization::from("tok1");
        let mut request = payload(json!({"spreadsheetId": "abc"}));

        let result = client.values("get", &auth, &mut request).await.unwrap();

        assert_eq!(
            result,
            CollectionResult {
                authorization: Authorization::from("tok1"),
                response: json!({"values": [[1, 2]]}),
            }
        );

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (collection, method, sent) = &calls[0];
        assert_eq!(*collection, Collection::Values);
        assert_eq!(method, "get");
        assert_eq!(*sent, payload(json!({"spreadsheetId": "abc", "auth": "tok1"})));
        assert_eq!(request, *sent, "payload should be modified in place");
    }

    #[tokio::test]
    async fn test_preserves_caller_authorization() {
        let (client, api) = mock_client(values_response);
        let auth = Authorization::from("tok1");
        let mut request = payload(json!({"spreadsheetId": "abc", "auth": "tok2"}));

        let result = client.values("get", &auth, &mut request).await.unwrap();

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0].2["auth"], "tok2");
        assert_eq!(
            result.authorization,
            Authorization::from("tok1"),
            "result should carry the handle passed to the call"
        );
    }

    #[tokio::test]
    async fn test_replaces_blank_authorization() {
        let (client, api) = mock_client(values_response);
        let auth = Authorization::from("tok1");

        let mut null_auth = payload(json!({"spreadsheetId": "abc", "auth": null}));
        client.values("get", &auth, &mut null_auth).await.unwrap();
        let mut empty_auth = payload(json!({"spreadsheetId": "abc", "auth": ""}));
        client.values("get", &auth, &mut empty_auth).await.unwrap();

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0].2["auth"], "tok1");
        assert_eq!(calls[1].2["auth"], "tok1");
    }

    #[tokio::test]
    async fn test_spreadsheets_error_passes_through() {
        let (client, api) = mock_client(not_found);
        let auth = Authorization::from("tok1");
        let mut request = payload(json!({"spreadsheetId": "abc"}));

        let err = client
            .spreadsheets("get", &auth, &mut request)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "not found");
        assert!(matches!(err, RequestError::Api { status: 404, .. }));
        assert_eq!(api.calls.lock().unwrap()[0].0, Collection::Spreadsheets);
    }

    #[tokio::test]
    async fn test_sheets_targets_sheets_collection() {
        let (client, api) = mock_client(|| Ok(json!({"sheetId": 7})));
        let auth = Authorization::from("tok1");
        let mut request = payload(json!({"spreadsheetId": "abc", "sheetId": 0}));

        let result = client.sheets("copyTo", &auth, &mut request).await.unwrap();

        assert_eq!(result.response, json!({"sheetId": 7}));
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0].0, Collection::Sheets);
        assert_eq!(calls[0].1, "copyTo");
    }

    #[tokio::test]
    async fn test_method_name_is_not_validated() {
        let (client, api) = mock_client(|| {
            Err(RequestError::UnknownMethod {
                collection: "spreadsheets.values",
                method: "fetch".to_string(),
            })
        });
        let auth = Authorization::from("tok1");

        let err = client
            .values("fetch", &auth, &mut Payload::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::UnknownMethod { .. }));
        assert_eq!(api.calls.lock().unwrap()[0].1, "fetch");
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let (client, api) = mock_client(values_response);
        let auth = Authorization::from("tok1");
        let mut first = payload(json!({"spreadsheetId": "one"}));
        let mut second = payload(json!({"spreadsheetId": "two"}));

        let (a, b) = tokio::join!(
            client.values("get", &auth, &mut first),
            client.spreadsheets("get", &auth, &mut second),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(api.calls.lock().unwrap().len(), 2);
        assert_eq!(first["auth"], "tok1");
        assert_eq!(second["auth"], "tok1");
    }
}
