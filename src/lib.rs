//! Host bridge for a synthetic browser environment.
//!
//! A [`Session`] loads markup into a virtual DOM, runs page scripts in
//! QuickJS against a browser-like global namespace, and delegates network
//! requests, computed style and mutation notifications to a [`Host`].

pub mod config;
pub mod dom;
pub mod error;
pub mod host;
pub mod js;
pub mod locator;
pub mod relay;
pub mod session;
pub mod storage;
pub mod style;
pub mod timers;
pub mod xhr;

// Re-export commonly used types for hosts and tests
pub use config::{BridgeConfig, NavigatorConfig, ScreenConfig};
pub use dom::{Document, DomError, MutationKind, NodeHandle};
pub use error::{BridgeError, Result};
pub use host::{Completion, Host, HostRequest, StyleQuery};
pub use js::{ScriptDescriptor, ScriptExecutionSummary};
pub use locator::locate;
pub use session::Session;
