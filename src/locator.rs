//! Structural node addresses.
//!
//! A locator is the root element's tag name followed by one
//! `" > :nth-child(k)"` segment per level down to the node. It never uses ids
//! or classes, so the host can resolve it by replaying the same walk from the
//! root, and it must be recomputed after any structural change.

use kuchiki::NodeRef;

use crate::dom::{same_node, tag_name, Document};

const SEGMENT_PREFIX: &str = ":nth-child(";

pub fn locate(node: Option<&NodeRef>) -> Option<String> {
    let node = node?;
    node.as_element()?;

    let mut positions = Vec::new();
    let mut current = node.clone();
    loop {
        let parent = current
            .parent()
            .filter(|parent| parent.as_element().is_some());
        let Some(parent) = parent else {
            break;
        };
        let index = parent
            .children()
            .filter(|sibling| sibling.as_element().is_some())
            .position(|sibling| same_node(&sibling, &current))?;
        positions.push(index + 1);
        current = parent;
    }

    let mut locator = tag_name(current.as_element()?);
    for position in positions.iter().rev() {
        locator.push_str(" > ");
        locator.push_str(SEGMENT_PREFIX);
        locator.push_str(&position.to_string());
        locator.push(')');
    }
    Some(locator)
}

/// Replay a locator downward from the document element.
pub fn resolve(document: &Document, locator: &str) -> Option<NodeRef> {
    let mut segments = locator.split(" > ");
    let root_tag = segments.next()?.trim();
    let mut current = document.document_element()?;
    if !tag_name(current.as_element()?).eq_ignore_ascii_case(root_tag) {
        return None;
    }
    for segment in segments {
        let position: usize = segment
            .trim()
            .strip_prefix(SEGMENT_PREFIX)?
            .strip_suffix(')')?
            .parse()
            .ok()?;
        current = current
            .children()
            .filter(|child| child.as_element().is_some())
            .nth(position.checked_sub(1)?)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><head><title>t</title></head><body>\
        <div id='a'>text<span id='s1'></span><!-- c --><span id='s2'></span></div>\
        <p id='p'></p></body></html>";

    fn element(document: &mut Document, id: &str) -> NodeRef {
        let handle = document.element_by_id(id).unwrap();
        document.node(handle).unwrap()
    }

    #[test]
    fn absent_node_has_no_locator() {
        assert_eq!(locate(None), None);
    }

    #[test]
    fn root_is_its_tag_name() {
        let document = Document::parse(PAGE);
        let html = document.document_element().unwrap();
        assert_eq!(locate(Some(&html)).as_deref(), Some("HTML"));
    }

    #[test]
    fn counts_element_siblings_only() {
        let mut document = Document::parse(PAGE);
        let second = element(&mut document, "s2");
        assert_eq!(
            locate(Some(&second)).as_deref(),
            Some("HTML > :nth-child(2) > :nth-child(1) > :nth-child(2)")
        );
    }

    #[test]
    fn child_locator_extends_parent_locator() {
        let mut document = Document::parse(PAGE);
        let p = element(&mut document, "p");
        let body = p.parent().unwrap();
        let expected = format!("{} > :nth-child(2)", locate(Some(&body)).unwrap());
        assert_eq!(locate(Some(&p)), Some(expected));
    }

    #[test]
    fn text_nodes_are_not_addressable() {
        let mut document = Document::parse(PAGE);
        let div = element(&mut document, "a");
        let text = div.first_child().unwrap();
        assert_eq!(locate(Some(&text)), None);
    }

    #[test]
    fn detached_subtree_is_rooted_at_its_own_tag() {
        let mut document = Document::parse(PAGE);
        let outer = document.create_element("section");
        let inner = document.create_element("em");
        document.append_child(outer, inner).unwrap();
        let inner = document.node(inner).unwrap();
        assert_eq!(
            locate(Some(&inner)).as_deref(),
            Some("SECTION > :nth-child(1)")
        );
    }

    #[test]
    fn distinct_nodes_get_distinct_locators_that_resolve_back() {
        let mut document = Document::parse(PAGE);
        let mut seen = std::collections::HashSet::new();
        let nodes: Vec<NodeRef> = document
            .root()
            .descendants()
            .filter(|node| node.as_element().is_some())
            .collect();
        for node in nodes {
            let locator = locate(Some(&node)).unwrap();
            assert!(seen.insert(locator.clone()), "duplicate locator {locator}");
            let resolved = resolve(&document, &locator).unwrap();
            assert!(same_node(&resolved, &node));
        }
        let span = element(&mut document, "s1");
        assert!(seen.contains(&locate(Some(&span)).unwrap()));
    }

    #[test]
    fn resolve_rejects_malformed_locators() {
        let document = Document::parse(PAGE);
        assert!(resolve(&document, "BODY").is_none());
        assert!(resolve(&document, "HTML > :nth-child(0)").is_none());
        assert!(resolve(&document, "HTML > div").is_none());
        assert!(resolve(&document, "HTML > :nth-child(9)").is_none());
    }
}
