use std::collections::HashMap;

use kuchiki::parse_html;
use kuchiki::traits::*;
use tracing::{debug, error, warn};

use super::script::{prepare_source, ScriptDescriptor, ScriptExecution, ScriptKind, ScriptSource};
use crate::dom::DomError;
use crate::error::Result;
use crate::session::Session;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptExecutionSummary {
    pub executed_scripts: usize,
    pub failed_scripts: usize,
    pub skipped_scripts: usize,
}

pub fn collect_scripts(html: &str) -> Result<Vec<ScriptDescriptor>> {
    let parsed = parse_html().one(html);
    let mut collected = Vec::new();
    let selector = parsed
        .select("script")
        .map_err(|()| DomError::InvalidSelector("script".to_string()))?;

    for (index, script) in selector.enumerate() {
        let attributes = script.attributes.borrow();
        let kind = classify_kind(attributes.get("type"));
        let execution = determine_execution(&attributes, kind);

        if let Some(src) = attributes
            .get("src")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
        {
            collected.push(ScriptDescriptor {
                index,
                kind,
                execution,
                source: ScriptSource::External {
                    src: src.to_string(),
                },
            });
            continue;
        }

        drop(attributes);
        let code = script.text_contents();
        if code.trim().is_empty() {
            continue;
        }
        collected.push(ScriptDescriptor::inline(index, code, kind));
    }

    Ok(collected)
}

/// `src` values the host should download before `run_scripts`.
pub fn external_sources(scripts: &[ScriptDescriptor]) -> Vec<String> {
    scripts
        .iter()
        .filter(|descriptor| descriptor.kind == ScriptKind::Classic && !descriptor.is_blocked())
        .filter_map(|descriptor| match &descriptor.source {
            ScriptSource::External { src } => Some(src.clone()),
            ScriptSource::Inline { .. } => None,
        })
        .collect()
}

fn classify_kind(script_type: Option<&str>) -> ScriptKind {
    match script_type {
        Some(value) => {
            let lowered = value.trim().to_ascii_lowercase();
            match lowered.as_str() {
                "" | "text/javascript" | "application/javascript" => ScriptKind::Classic,
                "module" | "text/javascript+module" => ScriptKind::Module,
                "text/ecmascript" | "application/ecmascript" | "application/x-javascript" => {
                    ScriptKind::Classic
                }
                _ => ScriptKind::Unknown,
            }
        }
        None => ScriptKind::Classic,
    }
}

fn determine_execution(attributes: &kuchiki::Attributes, kind: ScriptKind) -> ScriptExecution {
    if attributes.get("async").is_some() {
        return ScriptExecution::Async;
    }
    if attributes.get("defer").is_some() {
        return ScriptExecution::Defer;
    }
    match kind {
        ScriptKind::Module => ScriptExecution::Defer,
        _ => ScriptExecution::Blocking,
    }
}

/// Run classic scripts in document order.
///
/// External scripts take their source from `downloads`, keyed by the `src`
/// attribute as written. A failing script is logged and does not stop the
/// ones after it.
pub fn run_scripts(
    session: &Session,
    scripts: &[ScriptDescriptor],
    downloads: &HashMap<String, String>,
) -> ScriptExecutionSummary {
    let mut summary = ScriptExecutionSummary::default();

    for descriptor in scripts {
        let filename = descriptor.filename();
        if descriptor.kind != ScriptKind::Classic {
            debug!(target: "quickjs", %filename, kind = ?descriptor.kind, "skipping non-classic script");
            summary.skipped_scripts += 1;
            continue;
        }
        if descriptor.is_blocked() {
            debug!(target: "quickjs", %filename, "skipping blocked script source");
            summary.skipped_scripts += 1;
            continue;
        }

        let source = match &descriptor.source {
            ScriptSource::Inline { code } => code.as_str(),
            ScriptSource::External { src } => match downloads.get(src) {
                Some(code) => code.as_str(),
                None => {
                    warn!(target: "quickjs", %filename, "external script was not downloaded");
                    summary.skipped_scripts += 1;
                    continue;
                }
            },
        };

        match session.exec(&prepare_source(source), &filename) {
            Ok(()) => summary.executed_scripts += 1,
            Err(err) => {
                error!(target: "quickjs", %filename, error = %err, "script execution failed");
                summary.failed_scripts += 1;
            }
        }
    }

    debug!(
        target: "quickjs",
        executed = summary.executed_scripts,
        failed = summary.failed_scripts,
        skipped = summary.skipped_scripts,
        "script run finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <script>var a = 1;</script>
        <script src="app.js" defer></script>
        <script src="https://www.googletagmanager.com/gtm.js"></script>
        <script type="application/ld+json">{"@type": "Thing"}</script>
        <script type="module" src="mod.js"></script>
        <script>   </script>
        </head><body><script async src="late.js"></script></body></html>"#;

    #[test]
    fn collects_in_document_order() {
        let scripts = collect_scripts(PAGE).unwrap();
        let indices: Vec<usize> = scripts.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 6]);
        assert_eq!(scripts[1].execution, ScriptExecution::Defer);
        assert_eq!(scripts[3].kind, ScriptKind::Unknown);
        assert_eq!(scripts[4].kind, ScriptKind::Module);
        assert_eq!(scripts[5].execution, ScriptExecution::Async);
    }

    #[test]
    fn lists_fetchable_sources_only() {
        let scripts = collect_scripts(PAGE).unwrap();
        assert_eq!(
            external_sources(&scripts),
            vec!["app.js".to_string(), "late.js".to_string()]
        );
    }
}
