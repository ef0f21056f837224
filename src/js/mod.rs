pub(crate) mod bindings;
pub mod bootstrap;
pub mod environment;
pub mod polyfills;
pub mod processor;
pub mod runtime;
pub mod script;

pub use processor::{collect_scripts, ScriptExecutionSummary};
pub use runtime::QuickJsEngine;
pub use script::{ScriptDescriptor, ScriptExecution, ScriptKind, ScriptSource};
