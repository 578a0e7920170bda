// Page Driver Port
// The DOM capability set the engine needs from one live page (tab)

use async_trait::async_trait;
use thiserror::Error;

/// Lower-cased message fragments browsers emit when the driven document is gone.
/// A closed DevTools socket ("CDP connection closed") is a transport failure,
/// not a destroyed frame, and intentionally does not match.
pub const FRAME_DESTROYED_PATTERNS: &[&str] = &[
    "execution context was destroyed",
    "frame was detached",
    "target closed",
    "cannot find context with specified id",
    "inspected target navigated or closed",
    "no tab with id",
    "the tab was closed",
    "frame with the given id was not found",
    "page has been closed",
];

/// Does this error text carry the frame-destroyed signature?
pub fn is_frame_destroyed_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    FRAME_DESTROYED_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Page driver errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

impl DriverError {
    pub fn message(&self) -> String {
        match self {
            DriverError::Protocol(msg)
            | DriverError::Evaluation(msg)
            | DriverError::Disconnected(msg) => msg.clone(),
            DriverError::Timeout(ms) => format!("timed out after {}ms", ms),
        }
    }

    pub fn is_frame_destroyed(&self) -> bool {
        is_frame_destroyed_message(&self.message())
    }
}

/// Opaque reference to a node (or shadow root) inside the driven page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Synthetic events the engine dispatches.
/// All of them bubble and are `composed`, so they cross shadow boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    EnterKeyDown,
    EnterKeyPress,
    EnterKeyUp,
}

impl DomEvent {
    /// Enter key sequence used for keyboard submission
    pub const ENTER_SEQUENCE: [DomEvent; 3] = [
        DomEvent::EnterKeyDown,
        DomEvent::EnterKeyPress,
        DomEvent::EnterKeyUp,
    ];

    pub fn event_type(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::EnterKeyDown => "keydown",
            DomEvent::EnterKeyPress => "keypress",
            DomEvent::EnterKeyUp => "keyup",
        }
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(
            self,
            DomEvent::EnterKeyDown | DomEvent::EnterKeyPress | DomEvent::EnterKeyUp
        )
    }
}

/// Page Driver trait
///
/// Implementations:
/// - CdpPage: Chrome DevTools Protocol over WebSocket (infra-cdp)
/// - FakeDom: in-memory tree for tests (`mocks`)
///
/// Queries never cross a shadow boundary implicitly; callers hop through
/// `shadow_root` explicitly.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Handle of the top-level document
    async fn document(&self) -> Result<ElementHandle, DriverError>;

    /// First descendant of `scope` matching `selector`
    async fn query_selector(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError>;

    /// All descendants of `scope` matching `selector`, in document order
    async fn query_selector_all(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    /// Attached shadow root of `host`, if any
    async fn shadow_root(&self, host: &ElementHandle)
        -> Result<Option<ElementHandle>, DriverError>;

    async fn read_value(&self, element: &ElementHandle) -> Result<String, DriverError>;

    /// `disabled` property, `disabled` attribute, or `aria-disabled="true"`
    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    async fn text_content(&self, element: &ElementHandle) -> Result<String, DriverError>;

    async fn focus(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Assign `value` through the element prototype's native setter so that
    /// framework-managed inputs observe the change
    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), DriverError>;

    async fn dispatch(&self, element: &ElementHandle, event: DomEvent) -> Result<(), DriverError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// `document.readyState`
    async fn ready_state(&self) -> Result<String, DriverError>;

    /// Serialized `documentElement.outerHTML`
    async fn snapshot_html(&self) -> Result<String, DriverError>;

    /// Drop every handle handed out so far; earlier handles become invalid
    async fn release_handles(&self) -> Result<(), DriverError> {
        Ok(())
    }

    /// The underlying page or connection is known to be gone
    fn is_closed(&self) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    const DOCUMENT_ID: &str = "document";

    /// What a submission (click or Enter keydown) does to the fake page
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SubmitEffect {
        /// The app accepts the prompt and clears its input
        ClearInput,
        /// The app navigates; the call fails with a destroyed-context error
        DestroyFrame,
        /// Input clears, but the next N `is_disabled` calls report busy
        BusyFor(u32),
        /// Nothing happens; the input keeps its text
        Nothing,
    }

    #[derive(Debug, Default)]
    struct Node {
        tag: String,
        selectors: Vec<String>,
        children: Vec<String>,
        shadow: Option<String>,
        shadow_after_polls: u32,
        shadow_polls: u32,
        value: String,
        text: String,
        disabled: bool,
        clicks: u32,
        events: Vec<DomEvent>,
    }

    impl Node {
        fn matches(&self, selector: &str) -> bool {
            self.tag == selector || self.selectors.iter().any(|s| s == selector)
        }
    }

    struct State {
        nodes: HashMap<String, Node>,
        next_id: u32,
        url: String,
        ready_state: String,
        effects: VecDeque<SubmitEffect>,
        injected: VecDeque<DriverError>,
        busy_checks: u32,
        navigations: Vec<String>,
        releases: u32,
        closed: bool,
    }

    impl State {
        fn node(&mut self, el: &ElementHandle) -> Result<&mut Node, DriverError> {
            self.nodes
                .get_mut(el.id())
                .ok_or_else(|| DriverError::Evaluation(format!("No node with id {}", el.id())))
        }

        /// Pre-order walk of light-DOM descendants (shadow roots are not entered)
        fn descendants(&self, scope: &str) -> Vec<String> {
            let mut out = Vec::new();
            let mut stack: Vec<String> = match self.nodes.get(scope) {
                Some(node) => node.children.iter().rev().cloned().collect(),
                None => return out,
            };
            while let Some(id) = stack.pop() {
                if let Some(node) = self.nodes.get(&id) {
                    stack.extend(node.children.iter().rev().cloned());
                }
                out.push(id);
            }
            out
        }

        fn submit(&mut self) -> Result<(), DriverError> {
            match self.effects.pop_front().unwrap_or(SubmitEffect::ClearInput) {
                SubmitEffect::ClearInput => {
                    self.clear_values();
                    Ok(())
                }
                SubmitEffect::BusyFor(checks) => {
                    self.clear_values();
                    self.busy_checks = checks;
                    Ok(())
                }
                SubmitEffect::DestroyFrame => {
                    self.clear_values();
                    Err(DriverError::Protocol(
                        "Execution context was destroyed, most likely because of a navigation."
                            .to_string(),
                    ))
                }
                SubmitEffect::Nothing => Ok(()),
            }
        }

        fn clear_values(&mut self) {
            for node in self.nodes.values_mut() {
                node.value.clear();
            }
        }

        fn serialize(&self, id: &str, out: &mut String) {
            if let Some(node) = self.nodes.get(id) {
                out.push_str(&format!("<{}>", node.tag));
                out.push_str(&node.text);
                for child in &node.children {
                    self.serialize(child, out);
                }
                out.push_str(&format!("</{}>", node.tag));
            }
        }
    }

    /// In-memory DOM with explicit shadow roots and scripted submit effects
    pub struct FakeDom {
        state: Mutex<State>,
    }

    impl FakeDom {
        pub fn new(url: impl Into<String>) -> Self {
            let mut nodes = HashMap::new();
            nodes.insert(
                DOCUMENT_ID.to_string(),
                Node {
                    tag: "html".to_string(),
                    ..Node::default()
                },
            );
            Self {
                state: Mutex::new(State {
                    nodes,
                    next_id: 0,
                    url: url.into(),
                    ready_state: "complete".to_string(),
                    effects: VecDeque::new(),
                    injected: VecDeque::new(),
                    busy_checks: 0,
                    navigations: Vec::new(),
                    releases: 0,
                    closed: false,
                }),
            }
        }

        pub fn root(&self) -> ElementHandle {
            ElementHandle::new(DOCUMENT_ID)
        }

        /// Append an element matching its tag and any of `selectors`
        pub fn add_element(
            &self,
            parent: &ElementHandle,
            tag: &str,
            selectors: &[&str],
        ) -> ElementHandle {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("node-{}", state.next_id);
            state.nodes.insert(
                id.clone(),
                Node {
                    tag: tag.to_string(),
                    selectors: selectors.iter().map(|s| s.to_string()).collect(),
                    ..Node::default()
                },
            );
            if let Some(parent) = state.nodes.get_mut(parent.id()) {
                parent.children.push(id.clone());
            }
            ElementHandle::new(id)
        }

        /// Attach a shadow root that only becomes visible on poll `after_polls + 1`
        pub fn attach_shadow(&self, host: &ElementHandle, after_polls: u32) -> ElementHandle {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("shadow-{}", state.next_id);
            state.nodes.insert(
                id.clone(),
                Node {
                    tag: "#shadow-root".to_string(),
                    ..Node::default()
                },
            );
            if let Some(node) = state.nodes.get_mut(host.id()) {
                node.shadow = Some(id.clone());
                node.shadow_after_polls = after_polls;
            }
            ElementHandle::new(id)
        }

        pub fn set_text(&self, el: &ElementHandle, text: &str) {
            if let Some(node) = self.state.lock().unwrap().nodes.get_mut(el.id()) {
                node.text = text.to_string();
            }
        }

        pub fn set_disabled(&self, el: &ElementHandle, disabled: bool) {
            if let Some(node) = self.state.lock().unwrap().nodes.get_mut(el.id()) {
                node.disabled = disabled;
            }
        }

        /// Put text into an input without recording events
        pub fn fill(&self, el: &ElementHandle, value: &str) {
            if let Some(node) = self.state.lock().unwrap().nodes.get_mut(el.id()) {
                node.value = value.to_string();
            }
        }

        pub fn value_of(&self, el: &ElementHandle) -> String {
            self.state
                .lock()
                .unwrap()
                .nodes
                .get(el.id())
                .map(|n| n.value.clone())
                .unwrap_or_default()
        }

        pub fn events_for(&self, el: &ElementHandle) -> Vec<DomEvent> {
            self.state
                .lock()
                .unwrap()
                .nodes
                .get(el.id())
                .map(|n| n.events.clone())
                .unwrap_or_default()
        }

        pub fn clicks_on(&self, el: &ElementHandle) -> u32 {
            self.state
                .lock()
                .unwrap()
                .nodes
                .get(el.id())
                .map(|n| n.clicks)
                .unwrap_or(0)
        }

        /// How many times `shadow_root(host)` has been asked
        pub fn shadow_polls(&self, host: &ElementHandle) -> u32 {
            self.state
                .lock()
                .unwrap()
                .nodes
                .get(host.id())
                .map(|n| n.shadow_polls)
                .unwrap_or(0)
        }

        /// Queue the effect of the next submission (default: ClearInput)
        pub fn push_submit_effect(&self, effect: SubmitEffect) {
            self.state.lock().unwrap().effects.push_back(effect);
        }

        /// Fail the next driver call with `err`
        pub fn inject_error(&self, err: DriverError) {
            self.state.lock().unwrap().injected.push_back(err);
        }

        pub fn set_url(&self, url: &str) {
            self.state.lock().unwrap().url = url.to_string();
        }

        pub fn set_ready_state(&self, ready_state: &str) {
            self.state.lock().unwrap().ready_state = ready_state.to_string();
        }

        pub fn navigations(&self) -> Vec<String> {
            self.state.lock().unwrap().navigations.clone()
        }

        /// How many times `release_handles` was called
        pub fn releases(&self) -> u32 {
            self.state.lock().unwrap().releases
        }

        pub fn close(&self) {
            self.state.lock().unwrap().closed = true;
        }

        fn op<T>(
            &self,
            f: impl FnOnce(&mut State) -> Result<T, DriverError>,
        ) -> Result<T, DriverError> {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(DriverError::Disconnected("page closed".to_string()));
            }
            if let Some(err) = state.injected.pop_front() {
                return Err(err);
            }
            f(&mut state)
        }
    }

    #[async_trait]
    impl PageDriver for FakeDom {
        async fn document(&self) -> Result<ElementHandle, DriverError> {
            self.op(|_| Ok(ElementHandle::new(DOCUMENT_ID)))
        }

        async fn query_selector(
            &self,
            scope: &ElementHandle,
            selector: &str,
        ) -> Result<Option<ElementHandle>, DriverError> {
            self.query_selector_all(scope, selector)
                .await
                .map(|all| all.into_iter().next())
        }

        async fn query_selector_all(
            &self,
            scope: &ElementHandle,
            selector: &str,
        ) -> Result<Vec<ElementHandle>, DriverError> {
            self.op(|state| {
                state.node(scope)?;
                Ok(state
                    .descendants(scope.id())
                    .into_iter()
                    .filter(|id| state.nodes.get(id).is_some_and(|n| n.matches(selector)))
                    .map(ElementHandle::new)
                    .collect())
            })
        }

        async fn shadow_root(
            &self,
            host: &ElementHandle,
        ) -> Result<Option<ElementHandle>, DriverError> {
            self.op(|state| {
                let node = state.node(host)?;
                node.shadow_polls += 1;
                match &node.shadow {
                    Some(id) if node.shadow_polls > node.shadow_after_polls => {
                        Ok(Some(ElementHandle::new(id.clone())))
                    }
                    _ => Ok(None),
                }
            })
        }

        async fn read_value(&self, element: &ElementHandle) -> Result<String, DriverError> {
            self.op(|state| Ok(state.node(element)?.value.clone()))
        }

        async fn is_disabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
            self.op(|state| {
                let disabled = state.node(element)?.disabled;
                if state.busy_checks > 0 {
                    state.busy_checks -= 1;
                    return Ok(true);
                }
                Ok(disabled)
            })
        }

        async fn text_content(&self, element: &ElementHandle) -> Result<String, DriverError> {
            self.op(|state| Ok(state.node(element)?.text.clone()))
        }

        async fn focus(&self, element: &ElementHandle) -> Result<(), DriverError> {
            self.op(|state| state.node(element).map(|_| ()))
        }

        async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), DriverError> {
            self.op(|state| {
                state.node(element)?.value = value.to_string();
                Ok(())
            })
        }

        async fn dispatch(&self, element: &ElementHandle, event: DomEvent) -> Result<(), DriverError> {
            self.op(|state| {
                state.node(element)?.events.push(event);
                if event == DomEvent::EnterKeyDown {
                    state.submit()?;
                }
                Ok(())
            })
        }

        async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
            self.op(|state| {
                state.node(element)?.clicks += 1;
                state.submit()
            })
        }

        async fn current_url(&self) -> Result<String, DriverError> {
            self.op(|state| Ok(state.url.clone()))
        }

        async fn navigate(&self, url: &str) -> Result<(), DriverError> {
            self.op(|state| {
                state.url = url.to_string();
                state.navigations.push(url.to_string());
                Ok(())
            })
        }

        async fn ready_state(&self) -> Result<String, DriverError> {
            self.op(|state| Ok(state.ready_state.clone()))
        }

        async fn snapshot_html(&self) -> Result<String, DriverError> {
            self.op(|state| {
                let mut out = String::new();
                state.serialize(DOCUMENT_ID, &mut out);
                Ok(out)
            })
        }

        async fn release_handles(&self) -> Result<(), DriverError> {
            self.state.lock().unwrap().releases += 1;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.state.lock().unwrap().closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    #[test]
    fn test_frame_destroyed_patterns() {
        assert!(is_frame_destroyed_message(
            "Execution context was destroyed, most likely because of a navigation."
        ));
        assert!(is_frame_destroyed_message("Protocol error: Target closed"));
        assert!(is_frame_destroyed_message("No tab with id: 1234."));
        assert!(!is_frame_destroyed_message("CDP connection closed"));
        assert!(!is_frame_destroyed_message("Cannot read properties of null"));
    }

    #[tokio::test]
    async fn test_fake_dom_queries_do_not_cross_shadow_roots() {
        let dom = FakeDom::new("https://example.test");
        let host = dom.add_element(&dom.root(), "x-host", &[]);
        let shadow = dom.attach_shadow(&host, 0);
        dom.add_element(&shadow, "textarea", &[]);

        let doc = dom.document().await.unwrap();
        assert!(dom.query_selector(&doc, "textarea").await.unwrap().is_none());

        let root = dom.shadow_root(&host).await.unwrap().unwrap();
        assert!(dom.query_selector(&root, "textarea").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fake_dom_submit_effects() {
        let dom = FakeDom::new("https://example.test");
        let input = dom.add_element(&dom.root(), "textarea", &[]);
        dom.fill(&input, "hello");
        dom.push_submit_effect(SubmitEffect::DestroyFrame);

        let err = dom
            .dispatch(&input, DomEvent::EnterKeyDown)
            .await
            .unwrap_err();
        assert!(err.is_frame_destroyed());
        assert_eq!(dom.value_of(&input), "");
    }
}
