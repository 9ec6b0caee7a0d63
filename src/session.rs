//! Session contract
//!
//! The bridge never talks to a Julia process directly. Everything goes
//! through a [`Session`]: an interactive channel that runs code in the guest
//! and returns Jupyter-style messages. Calls are strictly sequential; a
//! session is borrowed mutably for the whole of a transfer so requests cannot
//! be pipelined.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a message returned by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ExecuteResult,
    Stream,
    DisplayData,
    Error,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ExecuteResult => "execute_result",
            MessageKind::Stream => "stream",
            MessageKind::DisplayData => "display_data",
            MessageKind::Error => "error",
        }
    }
}

/// Messages produced by one request, in arrival order. Payloads are the
/// message `content` objects, e.g. `{"data": {"text/plain": "1"}}` or
/// `{"name": "stdout", "text": "..."}`.
pub type Response = Vec<(MessageKind, serde_json::Value)>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("No response to {0}")]
    NoResponse(String),

    #[error("Session closed")]
    Closed,
}

/// Channel to a running guest interpreter.
pub trait Session {
    /// Run `code` in the guest. `on_error` is the message the session reports
    /// to the user if execution fails.
    fn execute(
        &mut self,
        code: &str,
        store_result: bool,
        silent: bool,
        on_error: &str,
    ) -> Result<(), SessionError>;

    /// Run `code` and collect the messages of the given kinds. For stream
    /// messages `name_filter` restricts which streams are returned.
    fn get_response(
        &mut self,
        code: &str,
        kinds: &[MessageKind],
        name_filter: Option<&[&str]>,
    ) -> Result<Response, SessionError>;

    /// Show a non-fatal diagnostic to the user.
    fn warn(&mut self, message: &str);
}

impl<S: Session + ?Sized> Session for &mut S {
    fn execute(
        &mut self,
        code: &str,
        store_result: bool,
        silent: bool,
        on_error: &str,
    ) -> Result<(), SessionError> {
        (**self).execute(code, store_result, silent, on_error)
    }

    fn get_response(
        &mut self,
        code: &str,
        kinds: &[MessageKind],
        name_filter: Option<&[&str]>,
    ) -> Result<Response, SessionError> {
        (**self).get_response(code, kinds, name_filter)
    }

    fn warn(&mut self, message: &str) {
        (**self).warn(message)
    }
}

/// Text of the first `text/plain` result in a response.
pub fn plain_text(response: &Response) -> Option<&str> {
    response
        .iter()
        .filter(|(kind, _)| matches!(kind, MessageKind::ExecuteResult | MessageKind::DisplayData))
        .find_map(|(_, payload)| payload.get("data")?.get("text/plain")?.as_str())
}

/// Concatenated text of the stream messages in a response.
pub fn stream_text(response: &Response) -> String {
    response
        .iter()
        .filter(|(kind, _)| *kind == MessageKind::Stream)
        .filter_map(|(_, payload)| payload.get("text")?.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
