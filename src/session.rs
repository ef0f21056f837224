//! One page-load lifecycle: markup in, relayed events and extracted HTML out.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::BridgeConfig;
use crate::dom::{Document, DomError, NodeHandle};
use crate::error::{BridgeError, Result};
use crate::host::Host;
use crate::js::bindings;
use crate::js::bootstrap::DOM_BOOTSTRAP;
use crate::js::environment;
use crate::js::processor::{self, collect_scripts, ScriptExecutionSummary};
use crate::js::runtime::QuickJsEngine;
use crate::js::script::ScriptDescriptor;
use crate::locator::locate;
use crate::relay::MutationRelay;
use crate::storage::LocalStorage;
use crate::timers::TimerQueue;
use crate::xhr::RequestTable;

/// Upper bound on timer rounds per pump, for zero-delay timers that keep
/// rescheduling themselves.
const MAX_TIMER_ROUNDS: usize = 1000;

/// Rust-side state shared by the script bindings.
pub(crate) struct BridgeState {
    pub(crate) document: RefCell<Document>,
    pub(crate) relay: Rc<MutationRelay>,
    pub(crate) storage: RefCell<LocalStorage>,
    pub(crate) requests: RefCell<RequestTable>,
    pub(crate) timers: RefCell<TimerQueue>,
    pub(crate) host: Rc<dyn Host>,
    pub(crate) base_url: Url,
}

impl BridgeState {
    /// Run a document mutation, then hand the relayed events to the host once
    /// the document is released.
    pub(crate) fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Document) -> std::result::Result<T, DomError>,
    ) -> std::result::Result<T, DomError> {
        let result = f(&mut self.document.borrow_mut());
        self.relay.flush();
        result
    }
}

pub(crate) struct SessionInner {
    engine: QuickJsEngine,
    state: Rc<BridgeState>,
    depth: Cell<u32>,
    pending: RefCell<VecDeque<(u32, String)>>,
}

impl SessionInner {
    /// Run script-entering work. Completions that arrive meanwhile are queued
    /// and delivered once the outermost entry returns.
    fn enter<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if self.depth.get() > 0 {
            return Err(BridgeError::Engine(
                "session re-entered while a script is running".to_string(),
            ));
        }
        self.depth.set(1);
        let result = f();
        self.depth.set(0);
        self.drain_pending();
        result
    }

    pub(crate) fn deliver(&self, id: u32, body: String) {
        if self.depth.get() > 0 {
            debug!(target: "xhr", request = id, "script running, completion queued");
            self.pending.borrow_mut().push_back((id, body));
            return;
        }
        if let Err(err) = self.run_completion(id, body) {
            error!(target: "xhr", request = id, error = %err, "completion listeners failed");
        }
    }

    fn drain_pending(&self) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some((id, body)) = next else {
                break;
            };
            if let Err(err) = self.run_completion(id, body) {
                error!(target: "xhr", request = id, error = %err, "completion listeners failed");
            }
        }
    }

    fn run_completion(&self, id: u32, body: String) -> Result<()> {
        if body.is_empty() {
            debug!(target: "xhr", request = id, "empty response, request left pending");
            return Ok(());
        }
        if !self.state.requests.borrow_mut().complete(id) {
            return Ok(());
        }
        self.enter(|| self.engine.call_hook::<_, bool>("completeRequest", (id, body)))?;
        Ok(())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let dropped = self.pending.borrow().len();
        if dropped > 0 {
            warn!(target: "xhr", dropped, "session closed with undelivered completions");
        }
    }
}

/// A loaded page with its script environment.
///
/// Owns the QuickJS runtime, the document, storage and request table. Nothing
/// is shared between sessions.
pub struct Session {
    inner: Rc<SessionInner>,
    scripts: Vec<ScriptDescriptor>,
    scripts_ran: Cell<bool>,
    changes_seen: Cell<u64>,
}

impl Session {
    pub fn new(
        markup: &str,
        base_url: &str,
        host: Rc<dyn Host>,
        config: BridgeConfig,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let scripts = collect_scripts(markup)?;

        let mut document = Document::parse(markup);
        let relay = Rc::new(MutationRelay::new(Rc::clone(&host)));
        relay.subscribe(&mut document)?;

        let state = Rc::new(BridgeState {
            document: RefCell::new(document),
            relay,
            storage: RefCell::new(LocalStorage::seeded(&config.local_storage)),
            requests: RefCell::new(RequestTable::new()),
            timers: RefCell::new(TimerQueue::new()),
            host,
            base_url: base_url.clone(),
        });

        let engine = QuickJsEngine::with_config(&config)?;
        let mut installed = Ok(());
        let inner = Rc::new_cyclic(|session| {
            installed = bindings::install(&engine, Rc::clone(&state), session.clone());
            SessionInner {
                engine,
                state,
                depth: Cell::new(0),
                pending: RefCell::new(VecDeque::new()),
            }
        });
        installed?;

        inner.engine.eval(DOM_BOOTSTRAP, "bridge-dom.js")?;
        environment::assemble(&inner.engine, &base_url, &config)?;

        info!(
            target: "quickjs",
            base_url = %base_url,
            scripts = scripts.len(),
            "session ready"
        );
        Ok(Self {
            inner,
            scripts,
            scripts_ran: Cell::new(false),
            changes_seen: Cell::new(0),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.state.base_url
    }

    pub fn scripts(&self) -> &[ScriptDescriptor] {
        &self.scripts
    }

    /// `src` values the host should fetch before [`Session::run_scripts`].
    pub fn external_sources(&self) -> Vec<String> {
        processor::external_sources(&self.scripts)
    }

    pub fn exec(&self, source: &str, filename: &str) -> Result<()> {
        self.inner.enter(|| self.inner.engine.eval(source, filename))
    }

    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        self.inner
            .enter(|| self.inner.engine.eval_with(source, filename))
    }

    /// Execute the page's scripts once, in document order. Returns `None`
    /// when they already ran.
    pub fn run_scripts(
        &self,
        downloads: &HashMap<String, String>,
    ) -> Option<ScriptExecutionSummary> {
        if self.scripts_ran.replace(true) {
            return None;
        }
        let summary = processor::run_scripts(self, &self.scripts, downloads);
        if let Err(err) = self.pump() {
            error!(target: "quickjs", error = %err, "failed to pump after scripts");
        }
        Some(summary)
    }

    /// Mark the document complete and fire `DOMContentLoaded` then `load`.
    pub fn close_document(&self) -> Result<()> {
        self.inner
            .enter(|| self.inner.engine.call_hook::<_, ()>("closeDocument", ()))
    }

    /// Click the first element matching `selector` when it has a click
    /// listener or `onclick` handler.
    pub fn trigger_click(&self, selector: &str) -> Result<bool> {
        let Some(handle) = self.first_match(selector)? else {
            return Ok(false);
        };
        self.inner
            .enter(|| self.inner.engine.call_hook::<_, bool>("click", (handle.0,)))
    }

    pub fn put_attr(&self, selector: &str, name: &str, value: &str) -> Result<bool> {
        let Some(handle) = self.first_match(selector)? else {
            return Ok(false);
        };
        self.inner
            .state
            .mutate(|document| document.set_attribute(handle, name, value))?;
        Ok(true)
    }

    /// Submit the form enclosing the first match of `selector`.
    pub fn submit(&self, selector: &str) -> Result<bool> {
        let Some(handle) = self.first_match(selector)? else {
            return Ok(false);
        };
        self.inner
            .enter(|| self.inner.engine.call_hook::<_, bool>("submit", (handle.0,)))
    }

    pub fn document_html(&self) -> String {
        self.inner.state.document.borrow().serialize()
    }

    /// The serialized document when it changed since the previous call,
    /// `None` otherwise.
    pub fn track_changes(&self) -> Option<String> {
        let recorded = self.inner.state.relay.recorded();
        if self.changes_seen.replace(recorded) == recorded {
            return None;
        }
        Some(self.document_html())
    }

    pub fn query_locator(&self, selector: &str) -> Result<Option<String>> {
        let Some(handle) = self.first_match(selector)? else {
            return Ok(None);
        };
        let node = self.inner.state.document.borrow().node(handle)?;
        Ok(locate(Some(&node)))
    }

    pub fn local_storage(&self) -> HashMap<String, String> {
        self.inner.state.storage.borrow().snapshot()
    }

    pub fn dropped_mutations(&self) -> u64 {
        self.inner.state.relay.dropped()
    }

    /// Requests opened or in flight.
    pub fn pending_requests(&self) -> usize {
        self.inner.state.requests.borrow().len()
    }

    /// Run due timers and pending jobs until neither has work left.
    pub fn pump(&self) -> Result<bool> {
        let mut did_work = false;
        for _ in 0..MAX_TIMER_ROUNDS {
            let jobs_ran = self.inner.enter(|| Ok(self.inner.engine.drain_jobs()))?;
            let (due, now) = {
                let mut timers = self.inner.state.timers.borrow_mut();
                (timers.take_due(), timers.now())
            };
            if due.is_empty() && !jobs_ran {
                return Ok(did_work);
            }
            did_work = true;

            let now_ms = now.as_secs_f64() * 1_000.0;
            for id in due {
                let fired = self
                    .inner
                    .enter(|| self.inner.engine.call_hook::<_, bool>("invokeTimer", (id, now_ms)));
                if let Err(err) = fired {
                    error!(target: "quickjs", timer = id, error = %err, "timer callback failed");
                }
            }
        }
        warn!(target: "quickjs", "timer rounds exhausted, deferring remaining work");
        Ok(did_work)
    }

    /// Advance the virtual clock by `by`, firing every timer that falls due
    /// along the way in order.
    pub fn advance(&self, by: Duration) -> Result<bool> {
        let target = self.inner.state.timers.borrow().now().saturating_add(by);
        let mut did_work = self.pump()?;
        loop {
            let (now, next) = {
                let timers = self.inner.state.timers.borrow();
                (timers.now(), timers.next_due())
            };
            match next {
                Some(due) if due <= target && due > now => {
                    self.inner.state.timers.borrow_mut().advance_to(due);
                    did_work |= self.pump()?;
                }
                _ => break,
            }
        }
        self.inner.state.timers.borrow_mut().advance_to(target);
        did_work |= self.pump()?;
        Ok(did_work)
    }

    fn first_match(&self, selector: &str) -> Result<Option<NodeHandle>> {
        let mut document = self.inner.state.document.borrow_mut();
        let root = document.document_handle();
        Ok(document.query_selector_all(root, selector)?.into_iter().next())
    }
}
