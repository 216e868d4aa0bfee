//! WebSocket transport: protocol, connection registry, message dispatch

pub mod dispatch;
pub mod handler;
pub mod protocol;
pub mod registry;
