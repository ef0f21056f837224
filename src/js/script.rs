use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// How a script should be scheduled relative to HTML parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScriptExecution {
    /// Classic blocking scripts that run immediately and block HTML parsing.
    #[default]
    Blocking,
    /// Scripts marked as `async`, which download in parallel and run asap.
    Async,
    /// Scripts marked as `defer`, which run after document parsing before DOMContentLoaded.
    Defer,
}

/// Minimal classification of the script language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScriptKind {
    /// Traditional classic scripts (JavaScript).
    #[default]
    Classic,
    /// `<script type="module">`, not evaluated.
    Module,
    /// Data blocks and templates such as `application/ld+json`.
    Unknown,
}

/// Where the script source comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptSource {
    Inline { code: String },
    External { src: String },
}

/// Descriptor capturing everything we need to evaluate a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDescriptor {
    pub index: usize,
    pub kind: ScriptKind,
    pub execution: ScriptExecution,
    pub source: ScriptSource,
}

impl ScriptDescriptor {
    pub fn inline(index: usize, code: String, kind: ScriptKind) -> Self {
        Self {
            index,
            kind,
            execution: ScriptExecution::Blocking,
            source: ScriptSource::Inline { code },
        }
    }

    pub fn filename(&self) -> String {
        match &self.source {
            ScriptSource::Inline { .. } => format!("inline-script-{}.js", self.index),
            ScriptSource::External { src } => src.clone(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        match &self.source {
            ScriptSource::External { src } => is_blocked_source(src),
            ScriptSource::Inline { .. } => false,
        }
    }
}

/// Hosts of ad and tracking scripts that are never fetched or run.
pub const BLOCKED_SOURCES: &[&str] = &[
    "adsense",
    "adsystem",
    "adservice",
    "googletagservices",
    "googletagmanager",
    "script.ioam.de",
    "googlesyndication",
    "adserver",
    "nativeads",
    "prebid",
    ".ads.",
    "google-analytics.com",
];

pub fn is_blocked_source(src: &str) -> bool {
    let lowered = src.to_ascii_lowercase();
    BLOCKED_SOURCES
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

/// Turn a leading HTML comment opener into a line comment so legacy
/// `<!-- ... //-->` wrapped scripts parse.
pub fn prepare_source(code: &str) -> Cow<'_, str> {
    let trimmed = code.trim_start();
    match trimmed.strip_prefix("<!--") {
        Some(rest) => Cow::Owned(format!("//{rest}")),
        None => Cow::Borrowed(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_ad_hosts() {
        assert!(is_blocked_source("https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js"));
        assert!(is_blocked_source("//www.googletagmanager.com/gtm.js?id=X"));
        assert!(is_blocked_source("https://cdn.ads.example.net/a.js"));
        assert!(!is_blocked_source("/static/app.js"));
        assert!(!is_blocked_source("https://cdn.example.com/loader.js"));
    }

    #[test]
    fn rewrites_leading_html_comment() {
        assert_eq!(
            prepare_source("  <!--\nvar a = 1;\n//-->"),
            "//\nvar a = 1;\n//-->"
        );
        assert!(matches!(prepare_source("var a = '<!--';"), Cow::Borrowed(_)));
    }

    #[test]
    fn filenames_follow_source() {
        let inline = ScriptDescriptor::inline(3, "x".into(), ScriptKind::Classic);
        assert_eq!(inline.filename(), "inline-script-3.js");
        let external = ScriptDescriptor {
            index: 0,
            kind: ScriptKind::Classic,
            execution: ScriptExecution::Defer,
            source: ScriptSource::External {
                src: "app.js".into(),
            },
        };
        assert_eq!(external.filename(), "app.js");
        assert!(!external.is_blocked());
    }
}
