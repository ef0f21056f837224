use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;

use crate::dom::{Document, DomError, MutationKind, MutationRecord};
use crate::host::Host;
use crate::locator::locate;

/// Forwards engine mutations to the host as `(kind, locator)` pairs.
///
/// Locators are computed when the engine raises the record, while the tree
/// still has the shape the mutation produced. Forwarding happens on
/// [`MutationRelay::flush`], after the engine has released the document, so
/// the host may inspect the session from inside `on_mutation`.
pub struct MutationRelay {
    host: Rc<dyn Host>,
    queue: RefCell<VecDeque<(MutationKind, Option<String>)>>,
    recorded: Cell<u64>,
    dropped: Cell<u64>,
}

impl MutationRelay {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            host,
            queue: RefCell::new(VecDeque::new()),
            recorded: Cell::new(0),
            dropped: Cell::new(0),
        }
    }

    pub fn subscribe(self: &Rc<Self>, document: &mut Document) -> Result<(), DomError> {
        let relay = Rc::downgrade(self);
        document.set_mutation_handler(Box::new(move |record| {
            if let Some(relay) = relay.upgrade() {
                relay.record(record);
            }
        }))
    }

    pub fn record(&self, record: &MutationRecord) {
        self.recorded.set(self.recorded.get() + 1);
        let locator = locate(Some(&record.target));
        self.queue.borrow_mut().push_back((record.kind, locator));
    }

    pub fn flush(&self) {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some((kind, locator)) = next else {
                break;
            };
            match locator {
                Some(locator) => self.host.on_mutation(kind, &locator),
                None => {
                    self.dropped.set(self.dropped.get() + 1);
                    debug!(target: "relay", %kind, "dropping mutation without a locator");
                }
            }
        }
    }

    /// Mutations raised so far, forwarded or not.
    pub fn recorded(&self) -> u64 {
        self.recorded.get()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Completion, HostRequest};

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<(MutationKind, String)>>,
    }

    impl Host for Recorder {
        fn request(&self, _request: HostRequest, _completion: Completion) {}

        fn on_mutation(&self, kind: MutationKind, locator: &str) {
            self.events.borrow_mut().push((kind, locator.to_string()));
        }
    }

    #[test]
    fn forwards_in_engine_order_with_locators_taken_at_mutation_time() {
        let host = Rc::new(Recorder::default());
        let relay = Rc::new(MutationRelay::new(host.clone()));
        let mut document = Document::parse("<body><p id='first'></p></body>");
        relay.subscribe(&mut document).unwrap();

        let first = document.element_by_id("first").unwrap();
        document.set_attribute(first, "title", "x").unwrap();
        let body = document.parent(first).unwrap().unwrap();
        let heading = document.create_element("h1");
        document.insert_before(body, heading, Some(first)).unwrap();
        relay.flush();

        assert_eq!(
            *host.events.borrow(),
            vec![
                (
                    MutationKind::Attribute,
                    "HTML > :nth-child(2) > :nth-child(1)".to_string()
                ),
                (MutationKind::ChildList, "HTML > :nth-child(2)".to_string()),
            ]
        );
        assert_eq!(relay.dropped(), 0);
    }

    #[test]
    fn unresolvable_targets_are_counted_not_forwarded() {
        let host = Rc::new(Recorder::default());
        let relay = Rc::new(MutationRelay::new(host.clone()));
        let mut document = Document::parse("<body><p id='p'>hello</p></body>");
        relay.subscribe(&mut document).unwrap();

        let p = document.element_by_id("p").unwrap();
        let text = document.child_nodes(p).unwrap()[0];
        document.set_node_value(text, "bye").unwrap();
        relay.flush();

        assert!(host.events.borrow().is_empty());
        assert_eq!(relay.dropped(), 1);
    }

    #[test]
    fn subscribes_only_once() {
        let host = Rc::new(Recorder::default());
        let relay = Rc::new(MutationRelay::new(host));
        let mut document = Document::parse("");
        relay.subscribe(&mut document).unwrap();
        assert_eq!(
            relay.subscribe(&mut document),
            Err(DomError::HandlerAlreadyInstalled)
        );
    }
}
