//! MCP server loop over a line-framed byte stream.
//!
//! Handshake, `ping` and `tools/list` are answered inline. Every `tools/call`
//! runs on its own task so a slow backend never holds up other requests;
//! responses are written as they finish, correlated by request id. At end of
//! input the server waits for calls still in flight before returning.

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::transport::{Frame, FrameWriter, LineReader, TransportError};
use super::types::{
    CallToolRequest, Implementation, InitializeRequest, InitializeResponse, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, ServerCapabilities,
    ToolsCapability, JSON_RPC_VERSION,
};
use crate::tools::{Dispatcher, ToolCallInput};

/// What to do with one inbound frame.
#[derive(Debug)]
enum Incoming {
    Reply(JsonRpcResponse),
    Call(RequestId, ToolCallInput),
    Ignore,
}

#[derive(Clone)]
pub struct McpServer {
    dispatcher: Dispatcher,
    info: Implementation,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher, info: Implementation) -> Self {
        Self { dispatcher, info }
    }

    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Serves until `reader` reaches end of input, then drains in-flight calls.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = LineReader::new(reader);
        let writer = FrameWriter::new(writer);
        let mut in_flight = JoinSet::new();

        info!(
            server = %self.info.name,
            tools = self.dispatcher.registry().len(),
            "serving on stdio"
        );

        let outcome = loop {
            let frame = match reader.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(()),
                Err(e) => {
                    warn!("input failed: {e}");
                    break Err(e);
                }
            };
            let incoming = match frame {
                Frame::Text(text) => self.classify(&text),
                Frame::InvalidUtf8(e) => {
                    warn!("frame is not valid UTF-8: {e}");
                    Incoming::Reply(JsonRpcResponse::error(
                        None,
                        JsonRpcError::parse_error(format!("Parse error: invalid UTF-8: {e}")),
                    ))
                }
            };
            match incoming {
                Incoming::Reply(response) => {
                    if let Err(e) = writer.write(&response).await {
                        break Err(e);
                    }
                }
                Incoming::Call(id, call) => {
                    let server = self.clone();
                    let writer = writer.clone();
                    in_flight.spawn(async move {
                        let response = server.call(id, call).await;
                        writer.write(&response).await
                    });
                }
                Incoming::Ignore => {}
            }
            // Reap finished calls so the set does not grow with the session.
            while let Some(done) = in_flight.try_join_next() {
                log_call_outcome(done);
            }
        };

        // Calls already accepted still get their answer, even when input failed.
        debug!(pending = in_flight.len(), "input closed, draining calls");
        while let Some(done) = in_flight.join_next().await {
            log_call_outcome(done);
        }
        let closed = writer.shutdown().await;
        outcome?;
        closed?;
        info!("client disconnected");
        Ok(())
    }

    /// Handles one frame to completion, including any tool call it carries.
    pub async fn handle_message(&self, frame: &str) -> Option<JsonRpcResponse> {
        match self.classify(frame) {
            Incoming::Reply(response) => Some(response),
            Incoming::Call(id, call) => Some(self.call(id, call).await),
            Incoming::Ignore => None,
        }
    }

    fn classify(&self, frame: &str) -> Incoming {
        let value: Value = match serde_json::from_str(frame) {
            Ok(value) => value,
            Err(e) => {
                warn!("unparseable frame: {e}");
                return Incoming::Reply(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(format!("Parse error: {e}")),
                ));
            }
        };

        // Responses to requests we never send; nothing to answer.
        if value.get("method").is_none()
            && (value.get("result").is_some() || value.get("error").is_some())
        {
            return Incoming::Ignore;
        }

        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Incoming::Reply(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request(format!("Invalid request: {e}")),
                ))
            }
        };
        if request.jsonrpc != JSON_RPC_VERSION {
            return Incoming::Reply(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!(
                    "unsupported jsonrpc version '{}'",
                    request.jsonrpc
                )),
            ));
        }

        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            return Incoming::Ignore;
        };

        match request.method.as_str() {
            "initialize" => Incoming::Reply(self.initialize(id, request.params)),
            "ping" => Incoming::Reply(JsonRpcResponse::success(Some(id), json!({}))),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.dispatcher.list_tools(),
                };
                Incoming::Reply(reply(id, &result))
            }
            "tools/call" => match parse_call(request.params) {
                Ok(call) => Incoming::Call(id, call),
                Err(error) => Incoming::Reply(JsonRpcResponse::error(Some(id), error)),
            },
            other => {
                debug!(method = other, "unknown method");
                Incoming::Reply(JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::method_not_found(other),
                ))
            }
        }
    }

    fn initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let request: InitializeRequest = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();
        let version = request.negotiated_version().to_string();
        if let Some(client) = &request.client_info {
            info!(client = %client.name, version = %client.version, protocol = %version, "initialize");
        }
        let response = InitializeResponse {
            protocol_version: version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.info.clone(),
        };
        reply(id, &response)
    }

    async fn call(&self, id: RequestId, call: ToolCallInput) -> JsonRpcResponse {
        let result = self.dispatcher.call_tool(call).await;
        reply(id, &result)
    }
}

fn parse_call(params: Option<Value>) -> Result<ToolCallInput, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
    let request: CallToolRequest = serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?;
    Ok(ToolCallInput {
        name: request.name,
        args: request.arguments.unwrap_or_default(),
    })
}

fn reply<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(Some(id), value),
        Err(e) => JsonRpcResponse::error(Some(id), JsonRpcError::internal_error(e.to_string())),
    }
}

fn log_call_outcome(done: Result<Result<(), TransportError>, tokio::task::JoinError>) {
    match done {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("failed to write tool response: {e}"),
        Err(e) => warn!("tool call task aborted: {e}"),
    }
}
