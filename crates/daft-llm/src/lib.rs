use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use daft_core::{ChatMessage, ChatRequest, LlmConfig, LlmResponse, LlmToolCall, ResponsePart};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde_json::{Value, json};
use std::error::Error as StdError;
use std::thread;
use std::time::Duration;

/// Base delay for network/transport error retries (1s, 2s, 4s exponential backoff).
const NETWORK_RETRY_BASE_MS: u64 = 1000;

pub trait LlmClient {
    /// Chat completion with tool definitions (function calling).
    /// Sends the whole conversation and returns the first candidate, split
    /// into parts.
    fn complete_chat(&self, req: &ChatRequest) -> Result<LlmResponse>;
}

/// Client for any OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    cfg: LlmConfig,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self { cfg, client })
    }

    fn build_chat_payload(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| match m {
                ChatMessage::System { content } => json!({"role": "system", "content": content}),
                ChatMessage::User { content } => json!({"role": "user", "content": content}),
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut msg = json!({"role": "assistant"});
                    if let Some(c) = content {
                        msg["content"] = json!(c);
                    }
                    if !tool_calls.is_empty() {
                        let tc: Vec<Value> = tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments
                                    }
                                })
                            })
                            .collect();
                        msg["tool_calls"] = json!(tc);
                    }
                    msg
                }
                ChatMessage::Tool {
                    tool_call_id,
                    content,
                } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
            })
            .collect();

        let mut payload = json!({
            "model": req.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
            "stream": false
        });
        if let Some(temp) = req.temperature {
            payload["temperature"] = json!(temp);
        }
        if !req.tools.is_empty() {
            payload["tools"] = serde_json::to_value(&req.tools).unwrap_or(json!([]));
            payload["tool_choice"] =
                serde_json::to_value(&req.tool_choice).unwrap_or(json!("auto"));
        }
        payload
    }

    fn complete_chat_inner(&self, req: &ChatRequest, api_key: &str) -> Result<LlmResponse> {
        let payload = self.build_chat_payload(req);

        let mut last_err: Option<anyhow::Error> = None;
        let mut attempt: u8 = 0;
        while attempt <= self.cfg.max_retries {
            let response = self
                .client
                .post(&self.cfg.endpoint)
                .bearer_auth(api_key)
                .json(&payload)
                .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = parse_retry_after_seconds(resp.headers().get(RETRY_AFTER));
                    let body = resp.text()?;
                    if status.is_success() {
                        return parse_chat_payload(&body);
                    }
                    last_err = Some(format_api_error(
                        status,
                        &body,
                        attempt,
                        self.cfg.max_retries,
                        &self.cfg.api_key_env,
                    ));
                    if should_retry_status(status) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay_ms(self.cfg.retry_base_ms, attempt, retry_after));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    last_err = Some(format_transport_error(&e));
                    if should_retry_transport_error(&e) && attempt < self.cfg.max_retries {
                        thread::sleep(retry_delay_ms(NETWORK_RETRY_BASE_MS, attempt, None));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    break;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("chat request failed")))
    }

    /// The key is read at call time so a key exported mid-session is honored.
    fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.cfg.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.cfg
                    .api_key
                    .as_ref()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
    }
}

impl LlmClient for OpenAiCompatClient {
    fn complete_chat(&self, req: &ChatRequest) -> Result<LlmResponse> {
        let key = self
            .resolve_api_key()
            .ok_or_else(|| anyhow!("{} not set and llm.api_key is empty", self.cfg.api_key_env))?;
        self.complete_chat_inner(req, &key)
    }
}

/// Produce a user-friendly error from an HTTP error response.
fn format_api_error(
    status: StatusCode,
    body: &str,
    attempt: u8,
    max_retries: u8,
    api_key_env: &str,
) -> anyhow::Error {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            // Some providers wrap the error object in a one-element array.
            let v = v.as_array().and_then(|arr| arr.first().cloned()).unwrap_or(v);
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => anyhow!(
            "Invalid or missing API key (HTTP {}).\n\
             Set the {} environment variable or configure llm.api_key in ~/.daft/settings.json.",
            status.as_u16(),
            api_key_env
        ),
        StatusCode::TOO_MANY_REQUESTS => anyhow!(
            "Rate limited (HTTP 429). Exhausted {}/{} retries. Try again shortly or reduce request frequency. Detail: {}",
            attempt + 1,
            max_retries + 1,
            detail
        ),
        StatusCode::PAYMENT_REQUIRED => anyhow!(
            "Insufficient balance or quota (HTTP 402). Check your provider account."
        ),
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => anyhow!(
            "Model server error (HTTP {}). Exhausted {}/{} retries. The service may be temporarily unavailable. Detail: {}",
            status.as_u16(),
            attempt + 1,
            max_retries + 1,
            detail
        ),
        _ => anyhow!("Model API error (HTTP {}): {}", status.as_u16(), detail),
    }
}

/// Produce a user-friendly error from a transport/network failure.
fn format_transport_error(err: &reqwest::Error) -> anyhow::Error {
    let inner_msg = err
        .source()
        .map(|e| e.to_string())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_dns = inner_msg.contains("dns")
        || inner_msg.contains("resolve")
        || inner_msg.contains("name or service not known")
        || inner_msg.contains("no such host")
        || inner_msg.contains("getaddrinfo");

    if err.is_timeout() {
        anyhow!(
            "Request timed out. The model API did not respond in time.\n\
             If this persists, try increasing llm.timeout_seconds in your settings."
        )
    } else if is_dns {
        anyhow!(
            "DNS resolution failed. Could not resolve the model API hostname.\n\
             Check your internet connection and DNS settings."
        )
    } else if err.is_connect() {
        anyhow!(
            "Connection refused. Could not reach the model API at the configured endpoint.\n\
             Check your network connection and llm.endpoint."
        )
    } else {
        anyhow!("Network error: {err}")
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn should_retry_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn parse_retry_after_seconds(header: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    let value = header?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    parse_retry_after_http_date(value)
}

fn parse_retry_after_http_date(value: &str) -> Option<u64> {
    let retry_at = DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        })
        .ok()?;
    let delta = retry_at.signed_duration_since(Utc::now()).num_seconds();
    Some(delta.max(0) as u64)
}

fn retry_delay_ms(base_ms: u64, attempt: u8, retry_after_seconds: Option<u64>) -> Duration {
    if let Some(seconds) = retry_after_seconds {
        return Duration::from_millis(seconds.saturating_mul(1000));
    }
    let exponent = u32::from(attempt);
    let exponential = base_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(exponential.max(base_ms.max(100)))
}

/// Split the first choice into ordered parts. A body without `choices[0]`
/// is a valid response with no candidate, not an error.
fn parse_chat_payload(body: &str) -> Result<LlmResponse> {
    let value: Value = serde_json::from_str(body)?;
    let choice = value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first());
    let Some(choice) = choice else {
        return Ok(LlmResponse {
            parts: Vec::new(),
            finish_reason: "no_candidates".to_string(),
        });
    };
    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .unwrap_or("stop")
        .to_string();
    let message = choice.get("message").cloned().unwrap_or_else(|| json!({}));
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let tool_calls = message
        .get("tool_calls")
        .map(parse_tool_calls_array)
        .unwrap_or_default();

    let mut parts: Vec<ResponsePart> = tool_calls
        .into_iter()
        .map(|call| ResponsePart::ToolCall { call })
        .collect();
    if !content.trim().is_empty() {
        parts.push(ResponsePart::Text { text: content });
    }
    if parts.is_empty() {
        parts.push(ResponsePart::Unrecognized {
            finish_reason: finish_reason.clone(),
        });
    }
    Ok(LlmResponse {
        parts,
        finish_reason,
    })
}

fn parse_tool_calls_array(value: &Value) -> Vec<LlmToolCall> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let name = item
                .get("function")
                .and_then(|v| v.get("name"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if name.trim().is_empty() {
                return None;
            }
            let arguments = item
                .get("function")
                .and_then(|v| v.get("arguments"))
                .and_then(|v| v.as_str())
                .map(ToString::to_string)
                .unwrap_or_else(|| {
                    item.get("function")
                        .and_then(|v| v.get("arguments"))
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "{}".to_string())
                });
            let id = item
                .get("id")
                .and_then(|v| v.as_str())
                .filter(|id| !id.trim().is_empty())
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("tool_call_{}", idx + 1));
            Some(LlmToolCall {
                id,
                name,
                arguments,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use daft_core::{ToolChoice, ToolDefinition};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, mpsc};
    use std::time::Duration as StdDuration;

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: "gemini-2.5-flash".to_string(),
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::auto(),
            max_tokens: 64,
            temperature: None,
        }
    }

    #[test]
    fn parses_text_answer() {
        let body = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let got = parse_chat_payload(body).expect("parse");
        assert_eq!(
            got.parts,
            vec![ResponsePart::Text {
                text: "hello".to_string()
            }]
        );
        assert_eq!(got.finish_reason, "stop");
    }

    #[test]
    fn missing_choices_is_a_response_without_candidates() {
        let got = parse_chat_payload(r#"{"choices":[]}"#).expect("parse");
        assert!(!got.has_candidate());
        let got = parse_chat_payload(r#"{"id":"x"}"#).expect("parse");
        assert!(!got.has_candidate());
    }

    #[test]
    fn empty_message_is_unrecognized_part() {
        let body = r#"{"choices":[{"finish_reason":"content_filter","message":{"content":""}}]}"#;
        let got = parse_chat_payload(body).expect("parse");
        assert_eq!(
            got.first_part(),
            Some(&ResponsePart::Unrecognized {
                finish_reason: "content_filter".to_string()
            })
        );
    }

    #[test]
    fn parses_tool_calls_ahead_of_text() {
        let body = r#"{
          "choices": [
            {
              "finish_reason": "tool_calls",
              "message": {
                "content": "Let me look.",
                "tool_calls": [
                  {
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "read_file", "arguments": "{\"filename\":\"README.md\"}" }
                  },
                  {
                    "type": "function",
                    "function": { "name": "exec_command", "arguments": {"command": "ls"} }
                  }
                ]
              }
            }
          ]
        }"#;
        let got = parse_chat_payload(body).expect("parse");
        assert_eq!(got.finish_reason, "tool_calls");
        assert_eq!(got.parts.len(), 3);
        let calls = got.requested_tool_calls();
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].arguments, "{\"filename\":\"README.md\"}");
        assert_eq!(calls[1].id, "tool_call_2");
        assert_eq!(calls[1].arguments, "{\"command\":\"ls\"}");
        assert!(matches!(got.parts[2], ResponsePart::Text { .. }));
    }

    #[test]
    fn chat_payload_carries_tools_and_tool_messages() {
        let cfg = LlmConfig::default();
        let client = OpenAiCompatClient::new(cfg).expect("client");
        let mut req = request(vec![
            ChatMessage::System {
                content: "rules".to_string(),
            },
            ChatMessage::User {
                content: "hi".to_string(),
            },
            ChatMessage::Assistant {
                content: None,
                tool_calls: vec![LlmToolCall {
                    id: "call_1".to_string(),
                    name: "read_file".to_string(),
                    arguments: "{\"filename\":\"a\"}".to_string(),
                }],
            },
            ChatMessage::Tool {
                tool_call_id: "call_1".to_string(),
                content: "User denied permission.".to_string(),
            },
        ]);
        req.tools = vec![ToolDefinition {
            tool_type: "function".to_string(),
            function: daft_core::FunctionDefinition {
                name: "read_file".to_string(),
                description: "read".to_string(),
                parameters: json!({"type": "object"}),
            },
        }];
        let payload = client.build_chat_payload(&req);
        assert_eq!(payload["messages"].as_array().map(Vec::len), Some(4));
        assert_eq!(payload["messages"][2]["tool_calls"][0]["function"]["name"], "read_file");
        assert!(payload["messages"][2].get("content").is_none());
        assert_eq!(payload["messages"][3]["role"], "tool");
        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(payload["tools"][0]["type"], "function");
        assert!(payload.get("temperature").is_none());
    }

    #[test]
    fn missing_api_key_is_rejected_before_network_call() {
        let cfg = LlmConfig {
            endpoint: "http://127.0.0.1:9/unused".to_string(),
            api_key_env: "DAFT_API_KEY_MISSING_TEST".to_string(),
            api_key: None,
            ..LlmConfig::default()
        };
        let client = OpenAiCompatClient::new(cfg).expect("client");
        let err = client
            .complete_chat(&request(vec![]))
            .expect_err("must fail without a key");
        assert!(err.to_string().contains("DAFT_API_KEY_MISSING_TEST not set"));
    }

    #[test]
    fn resolve_api_key_uses_config_fallback() {
        let cfg = LlmConfig {
            api_key_env: "DAFT_API_KEY_FALLBACK_TEST".to_string(),
            api_key: Some("  from-config  ".to_string()),
            ..LlmConfig::default()
        };
        let client = OpenAiCompatClient::new(cfg).expect("client");
        assert_eq!(client.resolve_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn retry_status_classification() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!should_retry_status(StatusCode::UNAUTHORIZED));
        assert!(!should_retry_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn retry_after_parses_seconds_and_http_date() {
        let seconds_header = reqwest::header::HeaderValue::from_static("7");
        assert_eq!(parse_retry_after_seconds(Some(&seconds_header)), Some(7));

        let future = Utc::now() + chrono::Duration::seconds(5);
        let http_date = future.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let date_header = reqwest::header::HeaderValue::from_str(&http_date).expect("header");
        let parsed = parse_retry_after_seconds(Some(&date_header)).expect("parsed");
        assert!(parsed <= 10);
    }

    #[test]
    fn network_retry_base_uses_one_second_delays() {
        assert_eq!(
            retry_delay_ms(NETWORK_RETRY_BASE_MS, 0, None),
            Duration::from_millis(1000)
        );
        assert_eq!(
            retry_delay_ms(NETWORK_RETRY_BASE_MS, 2, None),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn complete_retries_transient_status_then_succeeds() {
        let server = start_mock_server(vec![
            MockHttpResponse {
                status: 503,
                body: r#"{"error":"temporarily_unavailable"}"#.to_string(),
                retry_after: Some("0".to_string()),
            },
            MockHttpResponse {
                status: 200,
                body: r#"{"choices":[{"message":{"content":"ok-after-retry"}}]}"#.to_string(),
                retry_after: None,
            },
        ]);
        let cfg = LlmConfig {
            endpoint: server.endpoint.clone(),
            api_key: Some("test-key".to_string()),
            api_key_env: "DAFT_API_KEY_RETRY_TEST_UNSET".to_string(),
            max_retries: 3,
            retry_base_ms: 1,
            ..LlmConfig::default()
        };
        let client = OpenAiCompatClient::new(cfg).expect("client");
        let out = client
            .complete_chat(&request(vec![ChatMessage::User {
                content: "retry test".to_string(),
            }]))
            .expect("response should eventually succeed");
        assert_eq!(
            out.first_part(),
            Some(&ResponsePart::Text {
                text: "ok-after-retry".to_string()
            })
        );
        assert_eq!(server.request_count(), 2);
        let bodies = server.bodies();
        assert!(bodies[0].contains("\"retry test\""));
    }

    #[test]
    fn complete_stops_after_bounded_retries() {
        let server = start_mock_server(vec![MockHttpResponse {
            status: 429,
            body: r#"{"error":{"message":"rate_limited"}}"#.to_string(),
            retry_after: Some("0".to_string()),
        }]);
        let cfg = LlmConfig {
            endpoint: server.endpoint.clone(),
            api_key: Some("test-key".to_string()),
            api_key_env: "DAFT_API_KEY_LIMIT_TEST_UNSET".to_string(),
            max_retries: 2,
            retry_base_ms: 1,
            ..LlmConfig::default()
        };
        let client = OpenAiCompatClient::new(cfg).expect("client");
        let err = client
            .complete_chat(&request(vec![]))
            .expect_err("request should fail after retries are exhausted");
        assert!(err.to_string().contains("Rate limited (HTTP 429)"));
        assert!(err.to_string().contains("rate_limited"));
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn unauthorized_is_not_retried_and_names_the_env_var() {
        let server = start_mock_server(vec![MockHttpResponse {
            status: 401,
            body: r#"{"error":{"message":"invalid_api_key"}}"#.to_string(),
            retry_after: None,
        }]);
        let cfg = LlmConfig {
            endpoint: server.endpoint.clone(),
            api_key: Some("bad-key".to_string()),
            api_key_env: "DAFT_API_KEY_401_TEST_UNSET".to_string(),
            max_retries: 2,
            retry_base_ms: 1,
            ..LlmConfig::default()
        };
        let client = OpenAiCompatClient::new(cfg).expect("client");
        let err = client
            .complete_chat(&request(vec![]))
            .expect_err("401 should fail without retrying");
        let msg = err.to_string();
        assert!(msg.contains("Invalid or missing API key"), "{msg}");
        assert!(msg.contains("DAFT_API_KEY_401_TEST_UNSET"), "{msg}");
        assert_eq!(server.request_count(), 1);
    }

    #[derive(Clone)]
    struct MockHttpResponse {
        status: u16,
        body: String,
        retry_after: Option<String>,
    }

    struct MockServer {
        endpoint: String,
        request_count: Arc<AtomicUsize>,
        bodies: Arc<Mutex<Vec<String>>>,
        stop_tx: Option<mpsc::Sender<()>>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl MockServer {
        fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        fn bodies(&self) -> Vec<String> {
            self.bodies.lock().expect("bodies lock").clone()
        }
    }

    impl Drop for MockServer {
        fn drop(&mut self) {
            if let Some(tx) = self.stop_tx.take() {
                let _ = tx.send(());
            }
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn start_mock_server(responses: Vec<MockHttpResponse>) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        listener
            .set_nonblocking(true)
            .expect("set nonblocking listener");
        let addr = listener.local_addr().expect("addr");
        let request_count = Arc::new(AtomicUsize::new(0));
        let request_count_thread = Arc::clone(&request_count);
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let bodies_thread = Arc::clone(&bodies);
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                if rx.try_recv().is_ok() {
                    break;
                }
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        let body = read_http_body(&mut stream).unwrap_or_default();
                        bodies_thread.lock().expect("bodies lock").push(body);
                        let idx = request_count_thread.fetch_add(1, Ordering::SeqCst);
                        let selected = responses
                            .get(idx)
                            .or_else(|| responses.last())
                            .cloned()
                            .expect("scripted response");
                        let mut headers = format!(
                            "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                            selected.status,
                            selected.body.len()
                        );
                        if let Some(retry_after) = selected.retry_after {
                            headers.push_str(&format!("Retry-After: {retry_after}\r\n"));
                        }
                        headers.push_str("\r\n");
                        let response = format!("{headers}{}", selected.body);
                        let _ = stream.write_all(response.as_bytes());
                        let _ = stream.flush();
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(StdDuration::from_millis(2));
                    }
                    Err(_) => break,
                }
            }
        });
        MockServer {
            endpoint: format!("http://{addr}/chat/completions"),
            request_count,
            bodies,
            stop_tx: Some(tx),
            handle: Some(handle),
        }
    }

    fn read_http_body(stream: &mut std::net::TcpStream) -> std::io::Result<String> {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 1024];
        let mut header_end = None;
        while header_end.is_none() {
            let read = stream.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            header_end = find_subsequence(&buffer, b"\r\n\r\n").map(|idx| idx + 4);
        }
        let header_len = header_end.unwrap_or(buffer.len());
        let content_length = parse_content_length(&buffer[..header_len]);
        let mut body = buffer[header_len..].to_vec();
        while body.len() < content_length {
            let read = stream.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }
        Ok(String::from_utf8_lossy(&body).to_string())
    }

    fn parse_content_length(headers: &[u8]) -> usize {
        let raw = String::from_utf8_lossy(headers);
        for line in raw.lines() {
            let mut parts = line.splitn(2, ':');
            let key = parts.next().unwrap_or_default().trim();
            if key.eq_ignore_ascii_case("content-length")
                && let Some(value) = parts.next()
                && let Ok(parsed) = value.trim().parse::<usize>()
            {
                return parsed;
            }
        }
        0
    }

    fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || haystack.len() < needle.len() {
            return None;
        }
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }
}
