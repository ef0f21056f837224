use std::fmt;

use kuchiki::NodeRef;
use serde::{Deserialize, Serialize};

/// Category of a DOM mutation, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    #[serde(rename = "attribute")]
    Attribute,
    #[serde(rename = "childList")]
    ChildList,
    /// Character data changes on text and comment nodes.
    #[serde(rename = "other")]
    Other,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::ChildList => "childList",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mutation touched besides its target.
#[derive(Debug, Clone)]
pub enum Related {
    Node(NodeRef),
    Attribute(String),
}

/// One mutation raised by the engine.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeRef,
    pub related: Option<Related>,
}

pub type MutationHandler = Box<dyn FnMut(&MutationRecord)>;
