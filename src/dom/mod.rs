//! Virtual DOM engine.
//!
//! A handle registry over a `kuchiki` tree. Scripts never hold tree nodes
//! directly: every node they see is addressed by a [`NodeHandle`] that stays
//! valid for the life of the session. Mutation primitives raise a
//! [`MutationRecord`] through the installed handler whenever the touched node
//! is connected to the document.

use std::collections::HashMap;
use std::rc::Rc;

use html5ever::{LocalName, Namespace, QualName};
use kuchiki::traits::*;
use kuchiki::{Attribute, ElementData, ExpandedName, NodeData, NodeRef, Selectors};
use thiserror::Error;

pub mod mutation;

pub use mutation::{MutationHandler, MutationKind, MutationRecord, Related};

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("unknown node handle {0}")]
    UnknownHandle(u32),
    #[error("node {child} is not a child of node {parent}")]
    NotAChild { parent: u32, child: u32 },
    #[error("inserting node {child} into node {parent} would create a cycle")]
    Hierarchy { parent: u32, child: u32 },
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
    #[error("operation not supported on node {0}")]
    NotSupported(u32),
    #[error("a mutation handler is already installed")]
    HandlerAlreadyInstalled,
}

pub struct Document {
    root: NodeRef,
    nodes: Vec<NodeRef>,
    handles: HashMap<usize, NodeHandle>,
    handler: Option<MutationHandler>,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        let root = kuchiki::parse_html().one(markup);
        let mut document = Self {
            root: root.clone(),
            nodes: Vec::new(),
            handles: HashMap::new(),
            handler: None,
        };
        document.handle_of(&root);
        document
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn document_handle(&self) -> NodeHandle {
        NodeHandle(0)
    }

    pub fn document_element(&self) -> Option<NodeRef> {
        self.root.children().find(|child| child.as_element().is_some())
    }

    /// Install the single mutation observer. A second subscription is refused.
    pub fn set_mutation_handler(&mut self, handler: MutationHandler) -> Result<(), DomError> {
        if self.handler.is_some() {
            return Err(DomError::HandlerAlreadyInstalled);
        }
        self.handler = Some(handler);
        Ok(())
    }

    pub fn handle_of(&mut self, node: &NodeRef) -> NodeHandle {
        let key = node_key(node);
        if let Some(handle) = self.handles.get(&key) {
            return *handle;
        }
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.handles.insert(key, handle);
        handle
    }

    pub fn node(&self, handle: NodeHandle) -> Result<NodeRef, DomError> {
        self.nodes
            .get(handle.0 as usize)
            .cloned()
            .ok_or(DomError::UnknownHandle(handle.0))
    }

    pub fn is_connected(&self, node: &NodeRef) -> bool {
        node.inclusive_ancestors()
            .any(|ancestor| same_node(&ancestor, &self.root))
    }

    fn notify(&mut self, kind: MutationKind, target: &NodeRef, related: Option<Related>) {
        if !self.is_connected(target) {
            return;
        }
        if let Some(handler) = self.handler.as_mut() {
            handler(&MutationRecord {
                kind,
                target: target.clone(),
                related,
            });
        }
    }

    // Reads

    pub fn node_type(&self, handle: NodeHandle) -> Result<u16, DomError> {
        let node = self.node(handle)?;
        let ty = match node.data() {
            NodeData::Element(_) => 1,
            NodeData::Text(_) => 3,
            NodeData::ProcessingInstruction(_) => 7,
            NodeData::Comment(_) => 8,
            NodeData::Document(_) => 9,
            NodeData::Doctype(_) => 10,
            NodeData::DocumentFragment => 11,
        };
        Ok(ty)
    }

    pub fn node_name(&self, handle: NodeHandle) -> Result<String, DomError> {
        let node = self.node(handle)?;
        let name = match node.data() {
            NodeData::Element(element) => tag_name(element),
            NodeData::Text(_) => "#text".to_string(),
            NodeData::Comment(_) => "#comment".to_string(),
            NodeData::Document(_) => "#document".to_string(),
            NodeData::DocumentFragment => "#document-fragment".to_string(),
            NodeData::Doctype(doctype) => doctype.name.clone(),
            NodeData::ProcessingInstruction(pi) => pi.borrow().0.clone(),
        };
        Ok(name)
    }

    pub fn parent(&mut self, handle: NodeHandle) -> Result<Option<NodeHandle>, DomError> {
        let node = self.node(handle)?;
        Ok(node.parent().map(|parent| self.handle_of(&parent)))
    }

    pub fn child_nodes(&mut self, handle: NodeHandle) -> Result<Vec<NodeHandle>, DomError> {
        let node = self.node(handle)?;
        Ok(node
            .children()
            .map(|child| self.handle_of(&child))
            .collect())
    }

    pub fn element_children(&mut self, handle: NodeHandle) -> Result<Vec<NodeHandle>, DomError> {
        let node = self.node(handle)?;
        Ok(node
            .children()
            .filter(|child| child.as_element().is_some())
            .map(|child| self.handle_of(&child))
            .collect())
    }

    pub fn attribute(&self, handle: NodeHandle, name: &str) -> Result<Option<String>, DomError> {
        let node = self.node(handle)?;
        let value = node.as_element().and_then(|element| {
            element
                .attributes
                .borrow()
                .get(normalize_attribute(name).as_str())
                .map(str::to_string)
        });
        Ok(value)
    }

    pub fn attribute_names(&self, handle: NodeHandle) -> Result<Vec<String>, DomError> {
        let node = self.node(handle)?;
        let names = node
            .as_element()
            .map(|element| {
                element
                    .attributes
                    .borrow()
                    .map
                    .keys()
                    .map(|name| name.local.to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    pub fn text_content(&self, handle: NodeHandle) -> Result<Option<String>, DomError> {
        let node = self.node(handle)?;
        let text = match node.data() {
            NodeData::Document(_) | NodeData::Doctype(_) => None,
            NodeData::Text(data) | NodeData::Comment(data) => Some(data.borrow().clone()),
            NodeData::ProcessingInstruction(pi) => Some(pi.borrow().1.clone()),
            NodeData::Element(_) | NodeData::DocumentFragment => Some(node.text_contents()),
        };
        Ok(text)
    }

    pub fn node_value(&self, handle: NodeHandle) -> Result<Option<String>, DomError> {
        let node = self.node(handle)?;
        let value = match node.data() {
            NodeData::Text(data) | NodeData::Comment(data) => Some(data.borrow().clone()),
            _ => None,
        };
        Ok(value)
    }

    pub fn inner_html(&self, handle: NodeHandle) -> Result<String, DomError> {
        let node = self.node(handle)?;
        Ok(node.children().map(|child| child.to_string()).collect())
    }

    pub fn outer_html(&self, handle: NodeHandle) -> Result<String, DomError> {
        Ok(self.node(handle)?.to_string())
    }

    pub fn contains(&self, ancestor: NodeHandle, node: NodeHandle) -> Result<bool, DomError> {
        let ancestor = self.node(ancestor)?;
        let node = self.node(node)?;
        Ok(node
            .inclusive_ancestors()
            .any(|candidate| same_node(&candidate, &ancestor)))
    }

    pub fn element_by_id(&mut self, id: &str) -> Option<NodeHandle> {
        let found = self
            .root
            .descendants()
            .elements()
            .find(|element| element.attributes.borrow().get("id") == Some(id))
            .map(|element| element.as_node().clone())?;
        Some(self.handle_of(&found))
    }

    pub fn query_selector_all(
        &mut self,
        scope: NodeHandle,
        selectors: &str,
    ) -> Result<Vec<NodeHandle>, DomError> {
        let scope = self.node(scope)?;
        let found: Vec<NodeRef> = scope
            .select(selectors)
            .map_err(|()| DomError::InvalidSelector(selectors.to_string()))?
            .map(|element| element.as_node().clone())
            .collect();
        Ok(found.iter().map(|node| self.handle_of(node)).collect())
    }

    pub fn matches(&self, handle: NodeHandle, selectors: &str) -> Result<bool, DomError> {
        let node = self.node(handle)?;
        let compiled = Selectors::compile(selectors)
            .map_err(|()| DomError::InvalidSelector(selectors.to_string()))?;
        Ok(node
            .into_element_ref()
            .map(|element| compiled.matches(&element))
            .unwrap_or(false))
    }

    pub fn serialize(&self) -> String {
        self.root.to_string()
    }

    // Node creation

    pub fn create_element(&mut self, tag: &str) -> NodeHandle {
        let node = NodeRef::new_element(
            html_name(&tag.to_ascii_lowercase()),
            Vec::<(ExpandedName, Attribute)>::new(),
        );
        self.handle_of(&node)
    }

    pub fn create_text(&mut self, data: &str) -> NodeHandle {
        let node = NodeRef::new_text(data);
        self.handle_of(&node)
    }

    pub fn create_comment(&mut self, data: &str) -> NodeHandle {
        let node = NodeRef::new_comment(data);
        self.handle_of(&node)
    }

    pub fn create_fragment(&mut self) -> NodeHandle {
        let node = NodeRef::new(NodeData::DocumentFragment);
        self.handle_of(&node)
    }

    /// Element factory behind the script-visible `Image` constructor.
    pub fn create_image(&mut self, width: Option<u32>, height: Option<u32>) -> NodeHandle {
        let handle = self.create_element("img");
        if let Some(width) = width {
            self.write_attribute(handle, "width", &width.to_string());
        }
        if let Some(height) = height {
            self.write_attribute(handle, "height", &height.to_string());
        }
        handle
    }

    // Mutations

    pub fn set_attribute(
        &mut self,
        handle: NodeHandle,
        name: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let node = self.node(handle)?;
        if node.as_element().is_none() {
            return Err(DomError::NotSupported(handle.0));
        }
        self.write_attribute(handle, name, value);
        Ok(())
    }

    fn write_attribute(&mut self, handle: NodeHandle, name: &str, value: &str) {
        let Ok(node) = self.node(handle) else {
            return;
        };
        let Some(element) = node.as_element() else {
            return;
        };
        let name = normalize_attribute(name);
        element
            .attributes
            .borrow_mut()
            .insert(name.as_str(), value.to_string());
        self.notify(MutationKind::Attribute, &node, Some(Related::Attribute(name)));
    }

    pub fn remove_attribute(&mut self, handle: NodeHandle, name: &str) -> Result<(), DomError> {
        let node = self.node(handle)?;
        let Some(element) = node.as_element() else {
            return Err(DomError::NotSupported(handle.0));
        };
        let name = normalize_attribute(name);
        let removed = element.attributes.borrow_mut().remove(name.as_str());
        if removed.is_some() {
            self.notify(MutationKind::Attribute, &node, Some(Related::Attribute(name)));
        }
        Ok(())
    }

    pub fn set_text_content(&mut self, handle: NodeHandle, value: &str) -> Result<(), DomError> {
        let node = self.node(handle)?;
        match node.data() {
            NodeData::Text(data) | NodeData::Comment(data) => {
                *data.borrow_mut() = value.to_string();
                self.notify(MutationKind::Other, &node, None);
            }
            NodeData::Element(_) | NodeData::DocumentFragment => {
                detach_children(&node);
                if !value.is_empty() {
                    node.append(NodeRef::new_text(value));
                }
                self.notify(MutationKind::ChildList, &node, None);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn set_node_value(&mut self, handle: NodeHandle, value: &str) -> Result<(), DomError> {
        let node = self.node(handle)?;
        if let NodeData::Text(data) | NodeData::Comment(data) = node.data() {
            *data.borrow_mut() = value.to_string();
            self.notify(MutationKind::Other, &node, None);
        }
        Ok(())
    }

    pub fn set_inner_html(&mut self, handle: NodeHandle, html: &str) -> Result<(), DomError> {
        let node = self.node(handle)?;
        let context = match node.as_element() {
            Some(element) => element.name.clone(),
            None if matches!(node.data(), NodeData::DocumentFragment) => html_name("body"),
            None => return Err(DomError::NotSupported(handle.0)),
        };
        detach_children(&node);
        for child in parse_fragment(&context, html) {
            node.append(child);
        }
        self.notify(MutationKind::ChildList, &node, None);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), DomError> {
        let (parent_node, child_node) = self.insertable(parent, child)?;
        if is_fragment(&child_node) {
            let moved = take_children(&child_node);
            for node in &moved {
                parent_node.append(node.clone());
            }
            self.notify_fragment(&parent_node, moved);
            return Ok(());
        }
        let previous = child_node.parent();
        parent_node.append(child_node.clone());
        self.notify_moved(previous, &parent_node, &child_node);
        self.notify(
            MutationKind::ChildList,
            &parent_node,
            Some(Related::Node(child_node)),
        );
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        parent: NodeHandle,
        child: NodeHandle,
        reference: Option<NodeHandle>,
    ) -> Result<(), DomError> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        let (parent_node, child_node) = self.insertable(parent, child)?;
        let reference_node = self.child_of(parent, &parent_node, reference)?;
        if same_node(&reference_node, &child_node) {
            return Ok(());
        }
        if is_fragment(&child_node) {
            let moved = take_children(&child_node);
            for node in &moved {
                reference_node.insert_before(node.clone());
            }
            self.notify_fragment(&parent_node, moved);
            return Ok(());
        }
        let previous = child_node.parent();
        reference_node.insert_before(child_node.clone());
        self.notify_moved(previous, &parent_node, &child_node);
        self.notify(
            MutationKind::ChildList,
            &parent_node,
            Some(Related::Node(child_node)),
        );
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), DomError> {
        let parent_node = self.node(parent)?;
        let child_node = self.child_of(parent, &parent_node, child)?;
        child_node.detach();
        self.notify(
            MutationKind::ChildList,
            &parent_node,
            Some(Related::Node(child_node)),
        );
        Ok(())
    }

    pub fn replace_child(
        &mut self,
        parent: NodeHandle,
        new_child: NodeHandle,
        old_child: NodeHandle,
    ) -> Result<(), DomError> {
        let (parent_node, new_node) = self.insertable(parent, new_child)?;
        let old_node = self.child_of(parent, &parent_node, old_child)?;
        if same_node(&old_node, &new_node) {
            return Ok(());
        }
        if is_fragment(&new_node) {
            for node in take_children(&new_node) {
                old_node.insert_before(node);
            }
            old_node.detach();
            self.notify(
                MutationKind::ChildList,
                &parent_node,
                Some(Related::Node(old_node)),
            );
            return Ok(());
        }
        let previous = new_node.parent();
        old_node.insert_before(new_node.clone());
        old_node.detach();
        self.notify_moved(previous, &parent_node, &new_node);
        self.notify(
            MutationKind::ChildList,
            &parent_node,
            Some(Related::Node(old_node)),
        );
        Ok(())
    }

    pub fn clone_node(&mut self, handle: NodeHandle, deep: bool) -> Result<NodeHandle, DomError> {
        let node = self.node(handle)?;
        let copy = clone_subtree(&node, deep).ok_or(DomError::NotSupported(handle.0))?;
        Ok(self.handle_of(&copy))
    }

    fn insertable(
        &self,
        parent: NodeHandle,
        child: NodeHandle,
    ) -> Result<(NodeRef, NodeRef), DomError> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if !can_hold_children(&parent_node) {
            return Err(DomError::NotSupported(parent.0));
        }
        if matches!(child_node.data(), NodeData::Document(_)) {
            return Err(DomError::NotSupported(child.0));
        }
        if parent_node
            .inclusive_ancestors()
            .any(|ancestor| same_node(&ancestor, &child_node))
        {
            return Err(DomError::Hierarchy {
                parent: parent.0,
                child: child.0,
            });
        }
        Ok((parent_node, child_node))
    }

    fn child_of(
        &self,
        parent: NodeHandle,
        parent_node: &NodeRef,
        child: NodeHandle,
    ) -> Result<NodeRef, DomError> {
        let child_node = self.node(child)?;
        match child_node.parent() {
            Some(actual) if same_node(&actual, parent_node) => Ok(child_node),
            _ => Err(DomError::NotAChild {
                parent: parent.0,
                child: child.0,
            }),
        }
    }

    /// One `childList` record for all children a fragment handed over.
    fn notify_fragment(&mut self, parent: &NodeRef, moved: Vec<NodeRef>) {
        if let Some(first) = moved.into_iter().next() {
            self.notify(MutationKind::ChildList, parent, Some(Related::Node(first)));
        }
    }

    fn notify_moved(&mut self, previous: Option<NodeRef>, parent: &NodeRef, child: &NodeRef) {
        if let Some(previous) = previous {
            if !same_node(&previous, parent) {
                self.notify(
                    MutationKind::ChildList,
                    &previous,
                    Some(Related::Node(child.clone())),
                );
            }
        }
    }
}

pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Rc::ptr_eq(&a.0, &b.0)
}

/// `tagName` as scripts see it: upper-case for HTML elements.
pub fn tag_name(element: &ElementData) -> String {
    if &*element.name.ns == HTML_NAMESPACE {
        element.name.local.to_string().to_ascii_uppercase()
    } else {
        element.name.local.to_string()
    }
}

fn node_key(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}

fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

fn normalize_attribute(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn can_hold_children(node: &NodeRef) -> bool {
    matches!(
        node.data(),
        NodeData::Element(_) | NodeData::Document(_) | NodeData::DocumentFragment
    )
}

fn is_fragment(node: &NodeRef) -> bool {
    matches!(node.data(), NodeData::DocumentFragment)
}

/// Detach and return the children of `node` in order.
fn take_children(node: &NodeRef) -> Vec<NodeRef> {
    let children: Vec<NodeRef> = node.children().collect();
    for child in &children {
        child.detach();
    }
    children
}

fn detach_children(node: &NodeRef) {
    take_children(node);
}

fn parse_fragment(context: &QualName, html: &str) -> Vec<NodeRef> {
    let parsed = kuchiki::parse_fragment(context.clone(), Vec::new()).one(html);
    // html5ever roots fragment results in a synthetic <html> element.
    let container = match parsed.first_child() {
        Some(first)
            if first
                .as_element()
                .map(|element| &*element.name.local == "html")
                .unwrap_or(false) =>
        {
            first
        }
        _ => parsed,
    };
    container.children().collect()
}

fn clone_subtree(node: &NodeRef, deep: bool) -> Option<NodeRef> {
    let copy = match node.data() {
        NodeData::Element(element) => NodeRef::new_element(
            element.name.clone(),
            element.attributes.borrow().map.clone(),
        ),
        NodeData::Text(data) => NodeRef::new_text(data.borrow().clone()),
        NodeData::Comment(data) => NodeRef::new_comment(data.borrow().clone()),
        NodeData::DocumentFragment => NodeRef::new(NodeData::DocumentFragment),
        _ => return None,
    };
    if deep {
        for child in node.children() {
            if let Some(child_copy) = clone_subtree(&child, true) {
                copy.append(child_copy);
            }
        }
    }
    Some(copy)
}
