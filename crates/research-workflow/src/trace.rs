//! Observability sink for model calls
//!
//! Generators report every request/response pair here. The sink is
//! injected, so tests and embedders choose where traces go.

use async_trait::async_trait;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Console output is cut after this many characters
const MAX_LOGGED_CHARS: usize = 500;

/// One message of a traced request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMessage {
    pub role: String,
    pub content: String,
}

impl TraceMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRequest {
    /// e.g. "create_analysts", "generate_expert_answer"
    pub operation: String,
    pub messages: Vec<TraceMessage>,
    pub model: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl TraceRequest {
    pub fn new(operation: impl Into<String>, messages: Vec<TraceMessage>) -> Self {
        Self {
            operation: operation.into(),
            messages,
            model: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResponse {
    pub trace_id: String,
    pub response: String,
    pub success: bool,
    pub error: Option<String>,
    /// Seconds
    pub execution_time: f64,
}

impl TraceResponse {
    pub fn success(trace_id: impl Into<String>, response: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            trace_id: trace_id.into(),
            response: response.into(),
            success: true,
            error: None,
            execution_time: elapsed.as_secs_f64(),
        }
    }

    /// A failed call; `response` holds the fallback that was used instead
    pub fn failure(
        trace_id: impl Into<String>,
        response: impl Into<String>,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            response: response.into(),
            success: false,
            error: Some(error.into()),
            execution_time: elapsed.as_secs_f64(),
        }
    }
}

#[async_trait]
pub trait TraceSink: Send + Sync {
    /// Record a request and return the trace id to correlate its response
    async fn record_request(&self, request: TraceRequest) -> String;

    async fn record_response(&self, response: TraceResponse);
}

/// `{YYYYmmdd_HHMMSS}_{counter:04}` ids, unique per generator
#[derive(Debug, Default)]
pub struct TraceIdGenerator {
    counter: AtomicUsize,
}

impl TraceIdGenerator {
    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{:04}", Local::now().format("%Y%m%d_%H%M%S"), n)
    }
}

/// Cut `text` to the console budget, noting how much was dropped
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}... [{} more chars]", head, total - max_chars)
}

/// Discards every trace
#[derive(Debug, Default)]
pub struct NoopTraceSink {
    ids: TraceIdGenerator,
}

#[async_trait]
impl TraceSink for NoopTraceSink {
    async fn record_request(&self, _request: TraceRequest) -> String {
        self.ids.next_id()
    }

    async fn record_response(&self, _response: TraceResponse) {}
}

/// Emits traces as `tracing` events on the `llm_trace` target
#[derive(Debug, Default)]
pub struct LoggingTraceSink {
    ids: TraceIdGenerator,
}

impl LoggingTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn log_request(trace_id: &str, request: &TraceRequest) {
        info!(
            target: "llm_trace",
            trace_id,
            operation = %request.operation,
            model = request.model.as_deref().unwrap_or("default"),
            message_count = request.messages.len(),
            "LLM request"
        );
        for (i, message) in request.messages.iter().enumerate() {
            debug!(
                target: "llm_trace",
                trace_id,
                index = i + 1,
                role = %message.role,
                content = %truncate_for_log(&message.content, MAX_LOGGED_CHARS),
                "LLM request message"
            );
        }
    }

    fn log_response(response: &TraceResponse) {
        if response.success {
            info!(
                target: "llm_trace",
                trace_id = %response.trace_id,
                execution_time = response.execution_time,
                response = %truncate_for_log(&response.response, MAX_LOGGED_CHARS),
                "LLM response"
            );
        } else {
            warn!(
                target: "llm_trace",
                trace_id = %response.trace_id,
                execution_time = response.execution_time,
                error = response.error.as_deref().unwrap_or("unknown"),
                "LLM call failed"
            );
        }
    }
}

#[async_trait]
impl TraceSink for LoggingTraceSink {
    async fn record_request(&self, request: TraceRequest) -> String {
        let trace_id = self.ids.next_id();
        Self::log_request(&trace_id, &request);
        trace_id
    }

    async fn record_response(&self, response: TraceResponse) {
        Self::log_response(&response);
    }
}

/// Logs like [`LoggingTraceSink`] and also writes full JSON records
///
/// Files: `trace_{id}_request.json` and `trace_{id}_response.json`.
#[derive(Debug)]
pub struct FileTraceSink {
    dir: PathBuf,
    ids: TraceIdGenerator,
}

impl FileTraceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ids: TraceIdGenerator::default(),
        }
    }

    async fn write_json(&self, name: String, value: serde_json::Value) {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "Failed to create trace directory");
            return;
        }
        let bytes = match serde_json::to_vec_pretty(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to serialize trace");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(self.dir.join(&name), bytes).await {
            warn!(file = %name, error = %e, "Failed to write trace file");
        }
    }
}

#[async_trait]
impl TraceSink for FileTraceSink {
    async fn record_request(&self, request: TraceRequest) -> String {
        let trace_id = self.ids.next_id();
        LoggingTraceSink::log_request(&trace_id, &request);

        let record = serde_json::json!({
            "trace_id": trace_id,
            "timestamp": Utc::now().to_rfc3339(),
            "operation": request.operation,
            "request": {
                "messages": request.messages,
                "model": request.model,
                "message_count": request.messages.len(),
                "additional_params": request.params,
            },
        });
        self.write_json(format!("trace_{}_request.json", trace_id), record)
            .await;
        trace_id
    }

    async fn record_response(&self, response: TraceResponse) {
        LoggingTraceSink::log_response(&response);

        let name = format!("trace_{}_response.json", response.trace_id);
        let record = serde_json::json!({
            "trace_id": response.trace_id,
            "timestamp": Utc::now().to_rfc3339(),
            "response": {
                "content": response.response,
                "success": response.success,
                "error": response.error,
                "execution_time": response.execution_time,
                "response_length": response.response.len(),
            },
        });
        self.write_json(name, record).await;
    }
}

/// Keeps traces in memory; handy for assertions and embedding
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    ids: TraceIdGenerator,
    requests: RwLock<Vec<(String, TraceRequest)>>,
    responses: RwLock<Vec<TraceResponse>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requests(&self) -> Vec<(String, TraceRequest)> {
        self.requests.read().await.clone()
    }

    pub async fn responses(&self) -> Vec<TraceResponse> {
        self.responses.read().await.clone()
    }
}

#[async_trait]
impl TraceSink for MemoryTraceSink {
    async fn record_request(&self, request: TraceRequest) -> String {
        let trace_id = self.ids.next_id();
        self.requests.write().await.push((trace_id.clone(), request));
        trace_id
    }

    async fn record_response(&self, response: TraceResponse) {
        self.responses.write().await.push(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_ids_are_sequential() {
        let ids = TraceIdGenerator::default();
        let first = ids.next_id();
        let second = ids.next_id();
        assert!(first.ends_with("_0001"));
        assert!(second.ends_with("_0002"));
        // YYYYmmdd_HHMMSS_NNNN
        assert_eq!(first.len(), 8 + 1 + 6 + 1 + 4);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdefghij", 4), "abcd... [6 more chars]");
    }

    #[tokio::test]
    async fn test_memory_sink_records_pairs() {
        let sink = MemoryTraceSink::new();
        let id = sink
            .record_request(
                TraceRequest::new("create_analysts", vec![TraceMessage::new("system", "hi")])
                    .with_model("gpt-4o")
                    .with_param("max_analysts", 3),
            )
            .await;
        sink.record_response(TraceResponse::success(&id, "ok", Duration::from_millis(5)))
            .await;

        let requests = sink.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, id);
        assert_eq!(requests[0].1.params["max_analysts"], 3);

        let responses = sink.responses().await;
        assert_eq!(responses[0].trace_id, id);
        assert!(responses[0].success);
    }

    #[tokio::test]
    async fn test_file_sink_writes_both_records() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileTraceSink::new(dir.path());

        let id = sink
            .record_request(TraceRequest::new("write_research_section", vec![]))
            .await;
        sink.record_response(TraceResponse::failure(
            &id,
            "fallback",
            "provider down",
            Duration::from_millis(1),
        ))
        .await;

        let request = std::fs::read_to_string(dir.path().join(format!("trace_{}_request.json", id))).unwrap();
        let request: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert_eq!(request["operation"], "write_research_section");

        let response = std::fs::read_to_string(dir.path().join(format!("trace_{}_response.json", id))).unwrap();
        let response: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(response["response"]["success"], false);
        assert_eq!(response["response"]["error"], "provider down");
    }
}
