use tracing::debug;

use crate::dom::{Document, NodeHandle};
use crate::host::{Host, StyleQuery};
use crate::locator::locate;

/// Build the query for one `getPropertyValue` call.
///
/// The locator is computed fresh each time; `extra` arrives as JSON text from
/// the script side and is passed through as a string when it is not JSON.
pub fn build_query(
    document: &Document,
    element: Option<NodeHandle>,
    pseudo_element: Option<String>,
    property: String,
    extra: Option<String>,
) -> StyleQuery {
    let node = element.and_then(|handle| document.node(handle).ok());
    StyleQuery {
        locator: locate(node.as_ref()),
        pseudo_element,
        property,
        extra: extra.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        }),
    }
}

pub fn resolve(host: &dyn Host, query: &StyleQuery) -> String {
    debug!(
        target: "style",
        locator = query.locator.as_deref().unwrap_or(""),
        property = %query.property,
        "resolving computed style"
    );
    host.resolve_style(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_carries_locator_and_parsed_extra() {
        let mut document = Document::parse("<body><div id='d'></div></body>");
        let div = document.element_by_id("d");
        let query = build_query(
            &document,
            div,
            Some("::before".to_string()),
            "color".to_string(),
            Some("{\"a\":1}".to_string()),
        );
        assert_eq!(
            query.locator.as_deref(),
            Some("HTML > :nth-child(2) > :nth-child(1)")
        );
        assert_eq!(query.extra, Some(json!({"a": 1})));
        let detached = build_query(&document, None, None, "color".to_string(), None);
        assert_eq!(detached.locator, None);
        assert_eq!(detached.extra, None);
    }
}
