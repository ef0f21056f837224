//! Request state machine behind the script-side `XMLHttpRequest`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::host::HostRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    Sent = 2,
}

impl ReadyState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unsent => "UNSENT",
            Self::Opened => "OPENED",
            Self::Sent => "SENT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XhrError {
    #[error("unknown request {0}")]
    UnknownRequest(u32),
    #[error("{operation} is not allowed while the request is {state}")]
    InvalidState {
        operation: &'static str,
        state: ReadyState,
    },
}

/// Methods normalised to upper case; anything else reaches the host as written.
const STANDARD_METHODS: &[&str] = &["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];

fn normalize_method(method: &str) -> String {
    STANDARD_METHODS
        .iter()
        .find(|standard| standard.eq_ignore_ascii_case(method))
        .map(|standard| (*standard).to_string())
        .unwrap_or_else(|| method.to_string())
}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub state: ReadyState,
}

/// Requests between `open()` and their completion.
///
/// Ids are handed out when the script constructs an `XMLHttpRequest`, but an
/// entry only exists while the request is opened or in flight. Completing a
/// request drops its entry, so a polling page does not accumulate them.
#[derive(Debug, Default)]
pub struct RequestTable {
    next_id: u32,
    requests: HashMap<u32, PendingRequest>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn get(&self, id: u32) -> Option<&PendingRequest> {
        self.requests.get(&id)
    }

    /// `None` for ids never handed out; `Unsent` for idle ones.
    pub fn state(&self, id: u32) -> Option<ReadyState> {
        if !self.is_allocated(id) {
            return None;
        }
        Some(self.get(id).map_or(ReadyState::Unsent, |request| request.state))
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Record method and URI. A request in flight keeps its state.
    pub fn open(&mut self, id: u32, method: &str, uri: &str) -> Result<ReadyState, XhrError> {
        if !self.is_allocated(id) {
            return Err(XhrError::UnknownRequest(id));
        }
        if let Some(request) = self.requests.get(&id) {
            if request.state == ReadyState::Sent {
                warn!(request = id, "open() ignored while a response is pending");
                return Ok(request.state);
            }
        }
        self.requests.insert(
            id,
            PendingRequest {
                method: normalize_method(method),
                uri: uri.to_string(),
                headers: BTreeMap::new(),
                body: None,
                state: ReadyState::Opened,
            },
        );
        Ok(ReadyState::Opened)
    }

    pub fn set_header(&mut self, id: u32, name: &str, value: &str) -> Result<(), XhrError> {
        let request = self.opened(id, "setRequestHeader")?;
        request.headers.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn send(&mut self, id: u32, body: Option<String>) -> Result<HostRequest, XhrError> {
        let request = self.opened(id, "send")?;
        request.body = body;
        request.state = ReadyState::Sent;
        Ok(HostRequest {
            id,
            method: request.method.clone(),
            uri: request.uri.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        })
    }

    /// Finish a sent request and drop its entry. Returns `false` when the
    /// completion must not reach the script.
    pub fn complete(&mut self, id: u32) -> bool {
        match self.requests.get(&id).map(|request| request.state) {
            Some(ReadyState::Sent) => {
                self.requests.remove(&id);
                true
            }
            Some(state) => {
                warn!(
                    request = id,
                    %state,
                    "completion ignored, request is not awaiting a response"
                );
                false
            }
            None => {
                warn!(request = id, "completion for unknown or finished request ignored");
                false
            }
        }
    }

    fn is_allocated(&self, id: u32) -> bool {
        id != 0 && id <= self.next_id
    }

    fn opened(
        &mut self,
        id: u32,
        operation: &'static str,
    ) -> Result<&mut PendingRequest, XhrError> {
        if !self.is_allocated(id) {
            return Err(XhrError::UnknownRequest(id));
        }
        match self.requests.get_mut(&id) {
            Some(request) if request.state == ReadyState::Opened => Ok(request),
            Some(request) => Err(XhrError::InvalidState {
                operation,
                state: request.state,
            }),
            None => Err(XhrError::InvalidState {
                operation,
                state: ReadyState::Unsent,
            }),
        }
    }
}
