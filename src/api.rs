// VK API client module: a small blocking client for the `method/*`
// endpoints. Every call carries the access token and API version, and every
// reply goes through `check_response` before anyone reads fields from it.

use crate::config::{ApiConfig, Credentials};
use crate::error::{PublishError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Authenticated access to API methods. Cheap to clone; the underlying
/// `reqwest` client is reference counted.
#[derive(Clone)]
pub struct VkApi {
    client: Client,
    config: ApiConfig,
    credentials: Credentials,
}

impl VkApi {
    pub fn new(client: Client, config: ApiConfig, credentials: Credentials) -> Self {
        VkApi {
            client,
            config,
            credentials,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn group_id(&self) -> u64 {
        self.credentials.group_id
    }

    /// Parameters every call sends: token and version.
    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("access_token", self.credentials.access_token.expose().to_string()),
            ("v", self.config.version.clone()),
        ]
    }

    /// GET `method` with `params` in the query string.
    pub fn get<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.config.method_url(method);
        debug!(method, %url, "GET API method");
        let request = self.client.get(&url).query(&self.base_params()).query(params);
        self.call(method, request)
    }

    /// POST `method` with `params` form-encoded in the body.
    pub fn post<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.config.method_url(method);
        debug!(method, %url, "POST API method");
        let mut form: Vec<(&str, String)> = self.base_params();
        form.extend(params.iter().map(|(k, v)| (*k, v.clone())));
        let request = self.client.post(&url).form(&form);
        self.call(method, request)
    }

    fn call<T: DeserializeOwned>(&self, method: &str, request: RequestBuilder) -> Result<T> {
        let body = send(request, &format!("calling {method}"))?;
        let value: Value = decode_json(&body, method)?;
        let payload = check_response(method, value)?;
        serde_json::from_value(payload).map_err(|e| PublishError::malformed(method, e.to_string()))
    }
}

/// Send a request and return the body of a 2xx response.
pub(crate) fn send(request: RequestBuilder, context: &str) -> Result<Vec<u8>> {
    let response = request
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| PublishError::transport(context, e))?;
    let body = response
        .bytes()
        .map_err(|e| PublishError::transport(context, e))?;
    Ok(body.to_vec())
}

pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8], origin: &str) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| PublishError::malformed(origin, e.to_string()))
}

/// Checks a decoded reply for a provider-signalled error and, if there is
/// none, returns the `response` payload.
///
/// Failure replies look like `{"error": {"error_code": 5, "error_msg": "..."}}`,
/// successful ones like `{"response": ...}`.
pub fn check_response(method: &str, mut value: Value) -> Result<Value> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("error_msg")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        let code = error.get("error_code").and_then(Value::as_i64);
        return Err(PublishError::RemoteApi {
            method: method.to_string(),
            code,
            message,
        });
    }

    value
        .get_mut("response")
        .map(Value::take)
        .ok_or_else(|| PublishError::malformed(method, "reply has neither `response` nor `error`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn error_object_becomes_remote_api_error() {
        let err = check_response(
            "photos.getWallUploadServer",
            json!({"error": {"error_code": 5, "error_msg": "invalid token"}}),
        )
        .unwrap_err();
        match err {
            PublishError::RemoteApi { method, code, message } => {
                assert_eq!(method, "photos.getWallUploadServer");
                assert_eq!(code, Some(5));
                assert_eq!(message, "invalid token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_without_message_keeps_raw_object() {
        let err = check_response("wall.post", json!({"error": {"foo": 1}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteApi);
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn success_returns_response_payload() {
        let payload = check_response("m", json!({"response": {"upload_url": "http://u"}})).unwrap();
        assert_eq!(payload, json!({"upload_url": "http://u"}));
    }

    #[test]
    fn missing_response_is_malformed() {
        let err = check_response("m", json!({"something": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn get_sends_token_version_and_params() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/method/groups.getById")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("access_token".into(), "tok".into()),
                mockito::Matcher::UrlEncoded("v".into(), "5.131".into()),
                mockito::Matcher::UrlEncoded("group_id".into(), "42".into()),
            ]))
            .with_body(r#"{"response": [1, 2]}"#)
            .create();

        let api = VkApi::new(
            Client::new(),
            ApiConfig {
                base_url: format!("{}/method", server.url()),
                version: "5.131".into(),
            },
            Credentials::new("tok", 42),
        );
        let ids: Vec<u32> = api
            .get("groups.getById", &[("group_id", "42".to_string())])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        mock.assert();
    }

    #[test]
    fn non_2xx_is_transport_error() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("POST", "/method/wall.post").with_status(502).create();
        let api = VkApi::new(
            Client::new(),
            ApiConfig {
                base_url: format!("{}/method", server.url()),
                version: "5.131".into(),
            },
            Credentials::new("tok", 42),
        );
        let err = api.post::<Value>("wall.post", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
