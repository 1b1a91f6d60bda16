//! MCP (Model Context Protocol) server side.
//!
//! - `types`: JSON-RPC envelope and MCP payloads
//! - `transport`: newline-delimited framing over async streams
//! - `server`: the request loop that feeds `tools/call` into the dispatcher

pub mod server;
pub mod transport;
pub mod types;

pub use server::McpServer;
pub use transport::TransportError;
