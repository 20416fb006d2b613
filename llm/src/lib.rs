use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use reportomat_common::config::{LlmConfig, LlmProvider};
use reportomat_types::{is_transient_status, Classified, ErrorCode};

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub transcript_text: String,
    pub prompt_version: String,
    pub schema_version: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub provider: String,
    pub model: String,
    pub prompt_version: String,
    pub schema_version: String,
    pub raw_text: String,
    pub parsed_json: Value,
}

/// Provider-agnostic call seam, generalized from the teacher's direct
/// `reqwest`/SDK client fields into a trait so the processor (§4.7) can
/// run against a fake in tests. The contract is narrow on purpose: the
/// adapter only guarantees it attempted a structured-output request,
/// schema validation happens externally (§4.4).
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn generate_report(&self, request: LlmRequest) -> Result<LlmResponse, Classified>;
}

/// OpenAI-compatible chat-completions adapter. Requests strict JSON
/// output via `response_format`, and never lets the HTTP client retry
/// on its own -- the worker (§4.8) is the sole retry authority.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(model: String, api_key: String, timeout: Duration) -> OpenAiAdapter {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build is infallible for this configuration");
        OpenAiAdapter { client, model, api_key }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

const SYSTEM_PROMPT: &str =
    "You analyze a call transcript and return a structured JSON report. Respond with JSON only.";

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    async fn generate_report(&self, request: LlmRequest) -> Result<LlmResponse, Classified> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &request.transcript_text },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let res = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_http_status(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse =
            res.json().await.map_err(classify_reqwest_error)?;

        let raw_text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let parsed_json: Value = serde_json::from_str(&raw_text).map_err(|e| {
            Classified::fatal(ErrorCode::LlmCallFailed, format!("non-JSON model output: {e}"))
        })?;

        Ok(LlmResponse {
            provider: "openai".to_string(),
            model: self.model.clone(),
            prompt_version: request.prompt_version,
            schema_version: request.schema_version,
            raw_text,
            parsed_json,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> Classified {
    if e.is_timeout() {
        return Classified::new(ErrorCode::LlmTimeout, true, e.to_string());
    }
    if e.is_connect() {
        return Classified::new(ErrorCode::LlmTransient, true, e.to_string());
    }
    if let Some(status) = e.status() {
        return classify_http_status(status.as_u16(), &e.to_string());
    }
    Classified::new(ErrorCode::LlmTransient, true, e.to_string())
}

fn classify_http_status(status: u16, message: &str) -> Classified {
    if status == 429 {
        return Classified::new(ErrorCode::LlmRateLimited, true, message);
    }
    if is_transient_status(status) {
        return Classified::new(ErrorCode::LlmTransient, true, message);
    }
    Classified::fatal(ErrorCode::LlmCallFailed, message)
}

/// Build the configured adapter. `LlmProvider::Fake` only resolves
/// under the `testing` feature; `Config::from_env` already refuses to
/// produce that provider outside test builds (§4.3's guardrail), so
/// reaching this branch in production is a configuration bug, not a
/// runtime condition to handle gracefully.
pub fn build_adapter(config: &LlmConfig) -> std::sync::Arc<dyn LlmAdapter> {
    match config.provider {
        LlmProvider::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .expect("LLM_API_KEY is required for provider=openai");
            std::sync::Arc::new(OpenAiAdapter::new(
                config.model.clone(),
                api_key,
                config.timeout,
            ))
        }
        LlmProvider::Fake => {
            #[cfg(any(test, feature = "testing"))]
            {
                std::sync::Arc::new(fake::FakeLlmAdapter::default())
            }
            #[cfg(not(any(test, feature = "testing")))]
            {
                unreachable!("LLM_PROVIDER=fake is rejected by Config::from_env outside tests")
            }
        }
    }
}

/// Scripted adapter used by the core's integration tests (§4.13).
#[cfg(any(test, feature = "testing"))]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    pub enum ScriptedOutcome {
        Success(Value),
        Fail(Classified),
    }

    #[derive(Default)]
    pub struct FakeLlmAdapter {
        script: Mutex<Vec<ScriptedOutcome>>,
    }

    impl FakeLlmAdapter {
        pub fn new(script: Vec<ScriptedOutcome>) -> Self {
            FakeLlmAdapter { script: Mutex::new(script) }
        }

        /// Always returns the same success payload.
        pub fn always_succeeding(payload: Value) -> Self {
            FakeLlmAdapter { script: Mutex::new(vec![ScriptedOutcome::Success(payload)]) }
        }
    }

    #[async_trait]
    impl LlmAdapter for FakeLlmAdapter {
        async fn generate_report(
            &self,
            request: LlmRequest,
        ) -> Result<LlmResponse, Classified> {
            let mut script = self.script.lock().unwrap();
            let outcome = if script.len() > 1 {
                script.remove(0)
            } else if let Some(last) = script.last() {
                match last {
                    ScriptedOutcome::Success(v) => ScriptedOutcome::Success(v.clone()),
                    ScriptedOutcome::Fail(c) => ScriptedOutcome::Fail(c.clone()),
                }
            } else {
                ScriptedOutcome::Success(Value::Null)
            };

            match outcome {
                ScriptedOutcome::Success(parsed_json) => Ok(LlmResponse {
                    provider: "fake".to_string(),
                    model: "fake".to_string(),
                    prompt_version: request.prompt_version,
                    schema_version: request.schema_version,
                    raw_text: parsed_json.to_string(),
                    parsed_json,
                }),
                ScriptedOutcome::Fail(c) => Err(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_status_classifies_as_retriable() {
        let c = classify_http_status(429, "too many requests");
        assert_eq!(c.code, ErrorCode::LlmRateLimited);
        assert!(c.retriable);
    }

    #[test]
    fn server_error_status_classifies_as_transient() {
        let c = classify_http_status(503, "unavailable");
        assert_eq!(c.code, ErrorCode::LlmTransient);
        assert!(c.retriable);
    }

    #[test]
    fn client_error_status_classifies_as_fatal() {
        let c = classify_http_status(400, "bad request");
        assert_eq!(c.code, ErrorCode::LlmCallFailed);
        assert!(!c.retriable);
    }

    #[tokio::test]
    async fn fake_adapter_replays_its_script_in_order_then_holds_the_last_entry() {
        use fake::{FakeLlmAdapter, ScriptedOutcome};

        let adapter = FakeLlmAdapter::new(vec![
            ScriptedOutcome::Fail(Classified::new(ErrorCode::LlmTimeout, true, "first call timed out")),
            ScriptedOutcome::Success(serde_json::json!({"summary": "ok", "items": []})),
        ]);

        let request = |now: &str| LlmRequest {
            transcript_text: now.to_string(),
            prompt_version: "v1".to_string(),
            schema_version: "v1".to_string(),
            timeout: Duration::from_secs(1),
        };

        let first = adapter.generate_report(request("a")).await;
        assert!(first.is_err());

        let second = adapter.generate_report(request("b")).await.unwrap();
        assert_eq!(second.parsed_json["summary"], "ok");

        let third = adapter.generate_report(request("c")).await.unwrap();
        assert_eq!(third.parsed_json["summary"], "ok");
    }
}
