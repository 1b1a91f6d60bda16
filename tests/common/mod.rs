//! Shared helpers for the stdio server integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use toolbridge_lib::api::{ApiClient, ApiError, ApiRequest};
use toolbridge_lib::core::tool::ToolDescriptor;
use toolbridge_lib::mcp::types::CallToolResult;
use toolbridge_lib::mcp::{McpServer, TransportError};
use toolbridge_lib::tools::types::arg_str;
use toolbridge_lib::tools::{
    Dispatcher, ObjectSchema, OperationAdapter, OperationSpec, ToolError, ToolRegistry,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// API client that records requests and always answers with one value.
pub struct MockApiClient {
    response: Value,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockApiClient {
    pub fn new(response: Value) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.requests.lock().await.push(request);
        Ok(self.response.clone())
    }
}

/// Sleeps, then echoes the `id` argument.
pub struct DelayedEcho(pub Duration);

#[async_trait]
impl OperationAdapter for DelayedEcho {
    async fn invoke(
        &self,
        args: &Map<String, Value>,
        _client: &dyn ApiClient,
    ) -> Result<CallToolResult, ToolError> {
        tokio::time::sleep(self.0).await;
        Ok(CallToolResult::text(arg_str(args, "id")?))
    }
}

fn echo_descriptor(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        "Echoes its id after a delay",
        ObjectSchema::new()
            .string("id", "Value to echo")
            .required(&["id"])
            .build(),
    )
}

/// `get_thing` hits the API; `slow_echo` and `fast_echo` never do.
pub fn test_dispatcher(client: Arc<MockApiClient>) -> Dispatcher {
    let registry = ToolRegistry::builder()
        .operation(OperationSpec::get(
            "get_thing",
            "Fetch a thing by id",
            ObjectSchema::new()
                .string("id", "Thing id")
                .required(&["id"]),
            "/things/{id}",
        ))
        .register(
            echo_descriptor("slow_echo"),
            DelayedEcho(Duration::from_millis(300)),
        )
        .register(echo_descriptor("fast_echo"), DelayedEcho(Duration::ZERO))
        .build()
        .expect("test registry builds");
    Dispatcher::new(Arc::new(registry), client)
}

/// A server running on in-memory pipes, driven line by line.
pub struct ServerHarness {
    input: Option<DuplexStream>,
    output: Lines<BufReader<DuplexStream>>,
    task: JoinHandle<Result<(), TransportError>>,
}

impl ServerHarness {
    pub fn start(dispatcher: Dispatcher) -> Self {
        let (client_tx, server_rx) = tokio::io::duplex(64 * 1024);
        let (server_tx, client_rx) = tokio::io::duplex(64 * 1024);
        let server = McpServer::new(dispatcher, toolbridge_lib::server_info());
        let task = tokio::spawn(async move { server.serve(server_rx, server_tx).await });
        Self {
            input: Some(client_tx),
            output: BufReader::new(client_rx).lines(),
            task,
        }
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    /// Writes one line of arbitrary bytes, not necessarily UTF-8.
    pub async fn send_bytes(&mut self, line: &[u8]) {
        let input = self.input.as_mut().expect("input still open");
        input.write_all(line).await.unwrap();
        input.write_all(b"\n").await.unwrap();
        input.flush().await.unwrap();
    }

    pub async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    pub async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.output.next_line())
            .await
            .expect("response within timeout")
            .unwrap()
            .expect("server output still open");
        serde_json::from_str(&line).expect("server writes valid JSON")
    }

    pub async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;
        self.recv().await
    }

    /// Closes the input and collects everything written until the server exits.
    pub async fn close(mut self) -> Vec<Value> {
        drop(self.input.take());
        let mut remaining = Vec::new();
        while let Some(line) = tokio::time::timeout(RECV_TIMEOUT, self.output.next_line())
            .await
            .expect("server finishes within timeout")
            .unwrap()
        {
            remaining.push(serde_json::from_str(&line).unwrap());
        }
        self.task
            .await
            .expect("server task completes")
            .expect("server exits cleanly");
        remaining
    }
}
