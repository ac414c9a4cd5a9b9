//! HTTP server for the linemate teammate graph: read API, guessing
//! sessions, and live WebSocket rooms.

pub mod http;
pub mod session;
pub mod ws;
