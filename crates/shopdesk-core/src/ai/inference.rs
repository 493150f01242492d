use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ChatRequest, ChatTransport};
use crate::error::ChatError;

pub const DEFAULT_ENDPOINT: &str = "https://models.github.ai/inference";
pub const DEFAULT_MODEL: &str = "mistral-ai/mistral-small-2503";
const COMPLETIONS_PATH: &str = "/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Used when an error response carries no message of its own.
pub const UNEXPECTED_RESPONSE: &str = "Unexpected response";

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

// Some deployments send a bare string, others an object with a message.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Text(String),
    Detail { message: Option<String> },
}

/// HTTP client for an OpenAI-style chat-completions endpoint.
///
/// The bearer credential is handed in at construction. Without one, requests
/// still go out and the endpoint's authentication error comes back as
/// [`ChatError::Upstream`].
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl InferenceClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let url = format!("{}{}", base_url.trim_end_matches('/'), COMPLETIONS_PATH);
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("No inference credential configured; requests to {} will be rejected", url);
        }

        Self {
            client: http_client(Client::builder().timeout(REQUEST_TIMEOUT).build()),
            url,
            api_key,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

// A builder failure falls back to an untimed client rather than aborting startup.
fn http_client(built: reqwest::Result<Client>) -> Client {
    built.unwrap_or_else(|e| {
        warn!("Failed to configure HTTP client, request timeout disabled: {}", e);
        Client::new()
    })
}

#[async_trait]
impl ChatTransport for InferenceClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("Inference endpoint answered {} ({} bytes)", status, body.len());

        parse_response(status, &body)
    }
}

/// Classify a raw endpoint response into assistant text or a typed error.
pub fn parse_response(status: StatusCode, body: &str) -> Result<String, ChatError> {
    if !status.is_success() {
        return Err(ChatError::upstream(error_message(body)));
    }

    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::transport(format!("malformed response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ChatError::transport("malformed response: no completion choices"))
}

fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| match error {
            ErrorBody::Text(text) => Some(text),
            ErrorBody::Detail { message } => message,
        })
        .filter(|m| !m.trim().is_empty());

    message.unwrap_or_else(|| UNEXPECTED_RESPONSE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatMessage;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one HTTP exchange with `reply_body`, returning the raw request text.
    async fn one_shot_server(reply_body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/inference", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
                if request_complete(&raw) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply_body.len(),
                reply_body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (base_url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn header_value<'a>(request: &'a str, name: &str) -> Option<&'a str> {
        request
            .lines()
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    fn sample_request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user("where is my order?")],
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1000,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    const SHIPS_FRIDAY: &str = r#"{"choices":[{"message":{"content":"Your order ships Friday."}}]}"#;

    #[tokio::test]
    async fn test_chat_posts_to_completions_with_bearer_token() {
        let (base_url, server) = one_shot_server(SHIPS_FRIDAY).await;
        let client = InferenceClient::new(&base_url, Some("tok".into()));

        let reply = client.chat(&sample_request()).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(reply, "Your order ships Friday.");
        assert!(request.starts_with("POST /inference/chat/completions "));
        assert_eq!(header_value(&request, "authorization"), Some("Bearer tok"));
        assert!(request.contains(r#""model":"mistral-ai/mistral-small-2503""#));
        assert!(request.contains("where is my order?"));
    }

    #[tokio::test]
    async fn test_chat_without_credential_sends_no_authorization() {
        let (base_url, server) = one_shot_server(SHIPS_FRIDAY).await;
        let client = InferenceClient::new(&base_url, None);

        let reply = client.chat(&sample_request()).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(reply, "Your order ships Friday.");
        assert_eq!(header_value(&request, "authorization"), None);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        // Bind then drop to get a port with nothing listening on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = InferenceClient::new(&format!("http://{}", addr), Some("tok".into()));
        let err = client.chat(&sample_request()).await.unwrap_err();

        assert!(err.is_transport());
        assert!(!err.reason().is_empty());
    }

    #[test]
    fn test_http_client_survives_builder_error() {
        let built = Client::builder().user_agent("bad\nagent").build();
        assert!(built.is_err());

        // Falls back instead of panicking
        let _client = http_client(built);
    }

    #[test]
    fn test_success_returns_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"Your order ships Friday."}},{"message":{"content":"ignored"}}]}"#;
        let text = parse_response(StatusCode::OK, body).unwrap();
        assert_eq!(text, "Your order ships Friday.");
    }

    #[test]
    fn test_error_string_is_passed_through() {
        let body = r#"{"error":"Rate limit exceeded"}"#;
        let err = parse_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(err.reason(), "Rate limit exceeded");
    }

    #[test]
    fn test_error_object_message_is_passed_through() {
        let body = r#"{"error":{"code":"unauthorized","message":"Bad credentials"}}"#;
        let err = parse_response(StatusCode::UNAUTHORIZED, body).unwrap_err();
        assert_eq!(err.reason(), "Bad credentials");
    }

    #[test]
    fn test_error_without_message_uses_fallback() {
        let err = parse_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(err.reason(), UNEXPECTED_RESPONSE);

        let err = parse_response(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":{"code":"x"}}"#)
            .unwrap_err();
        assert_eq!(err.reason(), UNEXPECTED_RESPONSE);
    }

    #[test]
    fn test_empty_choices_is_transport_error() {
        let err = parse_response(StatusCode::OK, r#"{"choices":[]}"#).unwrap_err();
        assert!(err.is_transport());
        assert!(err.reason().starts_with("malformed response"));
    }

    #[test]
    fn test_unparseable_success_body_is_transport_error() {
        let err = parse_response(StatusCode::OK, "not json").unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_url_joins_completions_path() {
        let client = InferenceClient::new("https://example.test/inference/", Some("tok".into()));
        assert_eq!(client.url(), "https://example.test/inference/chat/completions");
        assert!(client.has_credential());
    }

    #[test]
    fn test_blank_credential_is_treated_as_missing() {
        let client = InferenceClient::new(DEFAULT_ENDPOINT, Some("   ".into()));
        assert!(!client.has_credential());
    }
}
