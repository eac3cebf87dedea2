use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};
use serde_json::Value;
use tracing::debug;

use crate::application::upstream::{IgdbUpstream, UpstreamError};
use crate::config::IgdbSettings;
use crate::domain::query::IgdbQuery;
use crate::infra::error::InfraError;

use super::query;

const LOG_TARGET: &str = "igdb_cache::igdb";

/// Twitch application credentials used by IGDB.
#[derive(Clone, PartialEq, Eq)]
pub struct IgdbCredentials {
    pub client_id: String,
    pub access_token: String,
}

impl IgdbCredentials {
    /// Both values must be present and non-blank.
    pub fn from_parts(client_id: Option<&str>, access_token: Option<&str>) -> Option<Self> {
        let client_id = client_id.map(str::trim).filter(|v| !v.is_empty())?;
        let access_token = access_token.map(str::trim).filter(|v| !v.is_empty())?;
        Some(Self {
            client_id: client_id.to_string(),
            access_token: access_token.to_string(),
        })
    }
}

impl fmt::Debug for IgdbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgdbCredentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct IgdbClient {
    http: Client,
    base_url: Url,
    credentials: Option<IgdbCredentials>,
}

impl IgdbClient {
    pub fn new(settings: &IgdbSettings) -> Result<Self, InfraError> {
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            credentials: IgdbCredentials::from_parts(
                settings.client_id.as_deref(),
                settings.access_token.as_deref(),
            ),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("igdb-cache/", env!("CARGO_PKG_VERSION"))
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn url(&self, query: &IgdbQuery) -> Result<Url, UpstreamError> {
        self.base_url
            .join(query.endpoint().provider_path())
            .map_err(|err| UpstreamError::Transport(format!("invalid IGDB url: {err}")))
    }

    fn decode(status: StatusCode, bytes: &[u8]) -> Result<Value, UpstreamError> {
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(bytes).into_owned(),
            });
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes).map_err(|err| UpstreamError::Decode(err.to_string()))
    }
}

#[async_trait]
impl IgdbUpstream for IgdbClient {
    async fn fetch(&self, query: &IgdbQuery) -> Result<Value, UpstreamError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(UpstreamError::MissingCredentials)?;
        let url = self.url(query)?;
        let body = query::render(query);

        debug!(
            target: LOG_TARGET,
            endpoint = %query.endpoint(),
            url = %url,
            "issuing IGDB query"
        );

        let response = self
            .http
            .post(url)
            .header("Client-ID", &credentials.client_id)
            .bearer_auth(&credentials.access_token)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|err| UpstreamError::Transport(err.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::Transport(err.to_string()))?;

        Self::decode(status, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    fn settings(base_url: &str, client_id: Option<&str>, token: Option<&str>) -> IgdbSettings {
        IgdbSettings {
            base_url: Url::parse(&format!("{base_url}/")).expect("base url"),
            client_id: client_id.map(str::to_string),
            access_token: token.map(str::to_string),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn posts_query_text_with_credentials() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/games")
                .header("Client-ID", "client-123")
                .header("Authorization", "Bearer token-abc")
                .body_includes("where rating > 75 & rating_count > 100")
                .body_includes("limit 5;");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"id":1,"name":"Chrono Trigger"}]"#);
        });

        let client =
            IgdbClient::new(&settings(&server.base_url(), Some("client-123"), Some("token-abc")))
                .expect("client");
        let data = client
            .fetch(&IgdbQuery::Popular { limit: 5 })
            .await
            .expect("fetch succeeds");

        mock.assert();
        assert_eq!(data, json!([{ "id": 1, "name": "Chrono Trigger" }]));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.any_request();
            then.status(200).body("[]");
        });

        let client = IgdbClient::new(&settings(&server.base_url(), Some("client"), None))
            .expect("client");
        let err = client
            .fetch(&IgdbQuery::Popular { limit: 5 })
            .await
            .expect_err("credentials missing");

        assert!(matches!(err, UpstreamError::MissingCredentials));
        mock.assert_calls(0);
    }

    #[tokio::test]
    async fn non_success_status_carries_status_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/games");
            then.status(401).body("Authorization Failure");
        });

        let client = IgdbClient::new(&settings(&server.base_url(), Some("c"), Some("t")))
            .expect("client");
        let err = client
            .fetch(&IgdbQuery::GameById { game_id: 7 })
            .await
            .expect_err("401");

        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Authorization Failure");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_decodes_to_null() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/games");
            then.status(200).body("");
        });

        let client = IgdbClient::new(&settings(&server.base_url(), Some("c"), Some("t")))
            .expect("client");
        let data = client
            .fetch(&IgdbQuery::RawGames {
                query: "fields name;".into(),
            })
            .await
            .expect("empty body is not an error here");
        assert!(data.is_null());
    }

    #[tokio::test]
    async fn raw_query_is_sent_verbatim() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/games")
                .body("fields name; where id = (1,2);");
            then.status(200).body("[]");
        });

        let client = IgdbClient::new(&settings(&server.base_url(), Some("c"), Some("t")))
            .expect("client");
        client
            .fetch(&IgdbQuery::RawGames {
                query: "fields name; where id = (1,2);".into(),
            })
            .await
            .expect("fetch");
        mock.assert();
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = IgdbClient::new(&settings("http://127.0.0.1:9", Some("c"), Some("t")))
            .expect("client");
        let err = client
            .fetch(&IgdbQuery::Popular { limit: 1 })
            .await
            .expect_err("connection refused");
        assert!(matches!(err, UpstreamError::Transport(_)));
    }

    #[test]
    fn blank_credentials_are_treated_as_missing() {
        assert!(IgdbCredentials::from_parts(Some("  "), Some("token")).is_none());
        assert!(IgdbCredentials::from_parts(Some("id"), Some("token")).is_some());
    }

    #[test]
    fn debug_output_redacts_token() {
        let creds = IgdbCredentials::from_parts(Some("id"), Some("secret-token")).unwrap();
        assert!(!format!("{creds:?}").contains("secret-token"));
    }
}
