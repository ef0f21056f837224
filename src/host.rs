//! The contract between a session and the automation process driving it.

use std::collections::BTreeMap;
use std::rc::Weak;

use serde::Serialize;
use tracing::{debug, warn};

use crate::dom::MutationKind;
use crate::session::SessionInner;

/// Out-of-band implementations the bridges delegate to.
///
/// All calls happen on the session's thread. `request` is invoked while page
/// script is running; hosts that complete immediately from inside it get the
/// listeners run as soon as that script returns.
pub trait Host {
    fn request(&self, request: HostRequest, completion: Completion);

    fn resolve_style(&self, _query: &StyleQuery) -> String {
        String::new()
    }

    fn on_mutation(&self, _kind: MutationKind, _locator: &str) {}
}

/// A network request captured by the script-side `XMLHttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRequest {
    pub id: u32,
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleQuery {
    pub locator: Option<String>,
    pub pseudo_element: Option<String>,
    pub property: String,
    pub extra: Option<serde_json::Value>,
}

/// Completion handle for one [`HostRequest`].
///
/// Cloning is allowed; only the first non-empty completion reaches the
/// script; later ones are ignored with a warning.
#[derive(Clone)]
pub struct Completion {
    id: u32,
    session: Weak<SessionInner>,
}

impl Completion {
    pub(crate) fn new(id: u32, session: Weak<SessionInner>) -> Self {
        Self { id, session }
    }

    pub fn request_id(&self) -> u32 {
        self.id
    }

    /// Deliver the response body. An empty body leaves the request pending.
    pub fn complete(&self, body: impl Into<String>) {
        match self.session.upgrade() {
            Some(session) => session.deliver(self.id, body.into()),
            None => debug!(request = self.id, "session closed, completion ignored"),
        }
    }

    pub fn fail(&self, reason: &str) {
        warn!(request = self.id, reason, "host failed request");
        self.complete(String::new());
    }
}
