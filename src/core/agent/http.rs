use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AgentError, AgentResult};

/// Agent reachable over HTTP. Each query is a single JSON `POST`.
#[derive(Debug, Clone)]
pub struct HttpAgent {
    client: Client,
    url: String,
    shutdown: CancellationToken,
}

impl HttpAgent {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `request` and return the response body.
    ///
    /// JSON bodies are parsed; anything else comes back as a JSON string.
    pub async fn query(&self, request: &Value) -> AgentResult<Value> {
        if self.shutdown.is_cancelled() {
            return Err(AgentError::Closed);
        }

        let exchange = async {
            let response = self
                .client
                .post(&self.url)
                .json(request)
                .send()
                .await
                .map_err(|e| AgentError::Request(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| AgentError::Request(e.to_string()))?;

            if !status.is_success() {
                return Err(AgentError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            Ok(match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(_) => Value::String(text),
            })
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!(url = %self.url, "Agent request cancelled by close");
                Err(AgentError::Closed)
            }
            result = exchange => result,
        }
    }

    /// Cancel in-flight requests and reject future ones.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_json_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"question": "hours?"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "9-5"})))
            .expect(1)
            .mount(&server)
            .await;

        let agent = HttpAgent::new(format!("{}/agent", server.uri()));
        let result = agent.query(&json!({"question": "hours?"})).await.unwrap();
        assert_eq!(result, json!({"answer": "9-5"}));
    }

    #[tokio::test]
    async fn test_text_response_becomes_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain answer"))
            .mount(&server)
            .await;

        let agent = HttpAgent::new(server.uri());
        let result = agent.query(&json!({})).await.unwrap();
        assert_eq!(result, json!("plain answer"));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let agent = HttpAgent::new(server.uri());
        let err = agent.query(&json!({})).await.unwrap_err();
        assert_eq!(
            err,
            AgentError::Status {
                status: 502,
                body: "upstream down".to_string()
            }
        );
        assert_eq!(err.to_string(), "Agent HTTP 502: upstream down");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let agent = HttpAgent::new("http://127.0.0.1:1/agent");
        let err = agent.query(&json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::Request(_)));
    }

    #[tokio::test]
    async fn test_close_cancels_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let agent = HttpAgent::new(server.uri());
        let pending = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.query(&json!({"slow": true})).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        agent.close();

        let result = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(AgentError::Closed));
        assert_eq!(agent.query(&json!({})).await, Err(AgentError::Closed));
    }
}
