//! Chat services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the conversation log, fan-out, and streaming so route
//! handlers can stay focused on protocol translation.

pub mod catalog;
pub mod conversation;
pub mod dispatch;
pub mod exchange;
pub mod session;
