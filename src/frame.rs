//! Frame — JSON envelope shared by websocket replies and session events.
//!
//! A client sends `{ id, syscall: "chat:send", status: "request", data }`.
//! The server answers with one frame whose `parent_id` is the request id and
//! whose status is `done` or `error`. Session events (`turn:created`,
//! `turn:delta`, `model:busy`, ...) are pushed as fresh request frames with
//! no parent. Handlers are picked by the part of `syscall` before the colon.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FRAME_MESSAGE: &str = "message";
pub const FRAME_CODE: &str = "code";
pub const FRAME_RETRYABLE: &str = "retryable";

/// Payload of every frame.
pub type Data = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Server send time in epoch milliseconds; clients may omit it.
    #[serde(default)]
    pub ts: i64,
    pub syscall: String,
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

/// Errors that can be reported to clients as `{ code, message, retryable }`.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Epoch milliseconds, or 0 if the clock is before 1970.
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// New unparented frame, used for session events and in tests for client requests.
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self { id: Uuid::new_v4(), parent_id: None, ts: now_ms(), syscall: syscall.into(), status: Status::Request, data }
    }

    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Data::new())
    }

    #[must_use]
    pub fn done_with(&self, data: Data) -> Self {
        self.reply(Status::Done, data)
    }

    /// Error reply for malformed requests (missing fields, unknown ops).
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_MESSAGE.into(), serde_json::Value::String(message.into()));
        self.reply(Status::Error, data)
    }

    /// Error reply carrying the code and retryable flag of a domain error.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_CODE.into(), err.error_code().into());
        data.insert(FRAME_MESSAGE.into(), err.to_string().into());
        data.insert(FRAME_RETRYABLE.into(), err.retryable().into());
        self.reply(Status::Error, data)
    }

    fn reply(&self, status: Status, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// `"chat"` for `"chat:send"`; the whole syscall when there is no colon.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.syscall.split_once(':').map_or(self.syscall.as_str(), |(prefix, _)| prefix)
    }

    /// `"send"` for `"chat:send"`; empty when there is no colon.
    #[must_use]
    pub fn op(&self) -> &str {
        self.syscall.split_once(':').map_or("", |(_, op)| op)
    }

    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}
