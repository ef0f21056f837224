#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use dombridge::{BridgeConfig, Completion, Host, HostRequest, MutationKind, Session, StyleQuery};

pub const BASE_URL: &str = "https://example.com/app/index.html";

/// Host that records every callback and answers on demand.
#[derive(Default)]
pub struct RecordingHost {
    pub mutations: RefCell<Vec<(MutationKind, String)>>,
    pub requests: RefCell<Vec<HostRequest>>,
    pub completions: RefCell<Vec<Completion>>,
    pub styles: RefCell<Vec<StyleQuery>>,
    pub style_value: RefCell<String>,
    /// When set, requests are completed from inside `request`.
    pub respond_with: RefCell<Option<String>>,
}

impl RecordingHost {
    pub fn completion(&self, index: usize) -> Completion {
        self.completions.borrow()[index].clone()
    }

    pub fn take_mutations(&self) -> Vec<(MutationKind, String)> {
        std::mem::take(&mut *self.mutations.borrow_mut())
    }
}

impl Host for RecordingHost {
    fn request(&self, request: HostRequest, completion: Completion) {
        self.requests.borrow_mut().push(request);
        let immediate = self.respond_with.borrow().clone();
        match immediate {
            Some(body) => completion.complete(body),
            None => self.completions.borrow_mut().push(completion),
        }
    }

    fn resolve_style(&self, query: &StyleQuery) -> String {
        self.styles.borrow_mut().push(query.clone());
        self.style_value.borrow().clone()
    }

    fn on_mutation(&self, kind: MutationKind, locator: &str) {
        self.mutations.borrow_mut().push((kind, locator.to_string()));
    }
}

pub fn session(markup: &str) -> (Session, Rc<RecordingHost>) {
    session_with(markup, BridgeConfig::default())
}

pub fn session_with(markup: &str, config: BridgeConfig) -> (Session, Rc<RecordingHost>) {
    let host = Rc::new(RecordingHost::default());
    let session = Session::new(markup, BASE_URL, host.clone(), config).expect("create session");
    (session, host)
}
