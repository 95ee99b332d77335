//! HTTP client for the inbox server

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::messages::{
    ActionResult, AssignRequest, InboxState, LoginRequest, LoginResponse, SkipRequest,
    VerifyResponse,
};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: StatusCode, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub struct InboxClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl InboxClient {
    pub fn new(server: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(server)?,
            token,
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.send_json(self.request(Method::POST, "/api/login")?.json(&body))
            .await
    }

    pub async fn logout(&self) -> Result<()> {
        let response = self.request(Method::POST, "/api/logout")?.send().await?;
        check(response).await.map(|_| ())
    }

    pub async fn verify(&self) -> Result<VerifyResponse> {
        self.send_json(self.request(Method::GET, "/api/verify")?)
            .await
    }

    pub async fn state(&self) -> Result<InboxState> {
        self.send_json(self.request(Method::GET, "/api/state")?)
            .await
    }

    pub async fn skip(&self, card_id: u64) -> Result<InboxState> {
        self.post("/api/skip", &SkipRequest { card_id }).await
    }

    pub async fn assign(&self, request: &AssignRequest) -> Result<ActionResult> {
        self.post("/api/assign", request).await
    }

    pub async fn undo(&self) -> Result<ActionResult> {
        self.post("/api/undo", &serde_json::json!({})).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send_json(self.request(Method::POST, path)?.json(body))
            .await
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        tracing::debug!(%method, %url, "Sending request");
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = check(builder.send().await?).await?;
        Ok(response.json().await?)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Server { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state_json(count: usize) -> serde_json::Value {
        serde_json::json!({
            "queue_count": count,
            "deferred_count": 0,
            "assigned_session_count": 0,
            "current_card": null
        })
    }

    #[tokio::test]
    async fn test_state_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/state"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(state_json(3)))
            .mount(&server)
            .await;

        let client = InboxClient::new(&server.uri(), Some("tok".to_string())).unwrap();
        let state = client.state().await.unwrap();
        assert_eq!(state.queue_count, 3);
    }

    #[tokio::test]
    async fn test_skip_posts_card_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/skip"))
            .and(body_json(serde_json::json!({"card_id": 42})))
            .respond_with(ResponseTemplate::new(200).set_body_json(state_json(1)))
            .mount(&server)
            .await;

        let client = InboxClient::new(&server.uri(), None).unwrap();
        assert_eq!(client.skip(42).await.unwrap().queue_count, 1);
    }

    #[tokio::test]
    async fn test_server_error_keeps_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/undo"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Nothing to undo"))
            .mount(&server)
            .await;

        let client = InboxClient::new(&server.uri(), None).unwrap();
        match client.undo().await {
            Err(ClientError::Server { status, message }) => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(message, "Nothing to undo");
            }
            other => panic!("expected server error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_server_url() {
        assert!(matches!(
            InboxClient::new("not a url", None),
            Err(ClientError::Url(_))
        ));
    }
}
