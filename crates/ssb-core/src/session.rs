//! Per-frame interceptor session
//!
//! Every frame runs its own session; nothing is shared between frames. The
//! session owns the background channel, the set of anchors carrying our
//! listeners and the mutation subscription. Losing the channel is fatal: the
//! session detaches everything and links fall back to native navigation.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use log::{debug, info};

use crate::dispatch::{DispatchOutcome, Dispatcher, NavigationEvent, Transport};
use crate::error::SessionError;
use crate::frame::FrameIdentity;
use crate::message::{InboundMessage, PING_REPLY};
use crate::rules::RuleSet;
use crate::types::ListenerKinds;

// =============================================================================
// DOM Seams
// =============================================================================

/// Listener bookkeeping on the document's anchor elements.
pub trait ListenerHost {
    /// Handle to one anchor element.
    type Anchor: Copy + Eq + Hash + fmt::Debug;

    /// Every anchor currently in the document.
    fn anchors(&self) -> Vec<Self::Anchor>;

    fn attach(&mut self, anchor: Self::Anchor, kinds: ListenerKinds);

    fn detach(&mut self, anchor: Self::Anchor, kinds: ListenerKinds);
}

/// A node inserted into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedNode<A> {
    /// Text and comment nodes carry no anchors
    pub is_element: bool,
    /// Anchors at or below this node
    pub anchors: Vec<A>,
}

impl<A> AddedNode<A> {
    pub fn element(anchors: Vec<A>) -> Self {
        Self { is_element: true, anchors }
    }

    pub fn text() -> Self {
        Self { is_element: false, anchors: Vec::new() }
    }
}

/// One mutation record of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord<A> {
    pub added_nodes: Vec<AddedNode<A>>,
}

// =============================================================================
// Session State
// =============================================================================

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownReason {
    /// The background page asked us to stop
    ShutdownRequested,
    /// The channel to the background page went away
    Disconnected,
    /// The hosting environment stopped the session
    Host,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutdownRequested => f.write_str("shutdown requested"),
            Self::Disconnected => f.write_str("disconnected from background page"),
            Self::Host => f.write_str("stopped by host"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Stopped(TeardownReason),
}

// =============================================================================
// Frame Session
// =============================================================================

pub struct FrameSession<T, H: ListenerHost, R, F> {
    frame: F,
    rules: R,
    transport: T,
    host: H,
    attached: HashMap<H::Anchor, ListenerKinds>,
    observing: bool,
    state: SessionState,
}

impl<T, H, R, F> FrameSession<T, H, R, F>
where
    T: Transport,
    H: ListenerHost,
    R: RuleSet,
    F: FrameIdentity,
{
    /// Connect to the background page and attach listeners to every anchor.
    pub fn start<C, E>(frame: F, rules: R, host: H, connect: C) -> Result<Self, SessionError>
    where
        C: FnOnce() -> Result<T, E>,
        E: fmt::Display,
    {
        let transport = match connect() {
            Ok(transport) => transport,
            Err(err) => {
                if frame.is_top_level() {
                    info!("shutting down content script: failed to connect to background page");
                }
                return Err(SessionError::ConnectFailed(err.to_string()));
            }
        };

        if frame.is_top_level() {
            info!("starting up content script on {}", frame.top_domain());
        }

        let mut session = Self {
            frame,
            rules,
            transport,
            host,
            attached: HashMap::new(),
            observing: true,
            state: SessionState::Active,
        };

        let anchors = session.host.anchors();
        session.attach_links(anchors);

        Ok(session)
    }

    /// Attach listeners to anchors that do not carry them yet.
    /// Returns how many anchors were newly attached.
    pub fn attach_links<I>(&mut self, anchors: I) -> usize
    where
        I: IntoIterator<Item = H::Anchor>,
    {
        if !self.is_active() {
            return 0;
        }

        let mut count = 0;
        for anchor in anchors {
            if let Entry::Vacant(slot) = self.attached.entry(anchor) {
                slot.insert(ListenerKinds::ALL);
                self.host.attach(anchor, ListenerKinds::ALL);
                count += 1;
            }
        }
        count
    }

    /// Process one batch from the mutation subscription.
    pub fn on_mutations(&mut self, batch: &[MutationRecord<H::Anchor>]) -> usize {
        if !self.observing {
            return 0;
        }

        let mut count = 0;
        for record in batch {
            for node in record.added_nodes.iter().filter(|node| node.is_element) {
                count += self.attach_links(node.anchors.iter().copied());
            }
        }

        if count > 0 {
            debug!("attached listeners to {} inserted links", count);
        }
        count
    }

    /// Drain a stream of mutation batches until it ends or the session stops.
    pub fn pump<I>(&mut self, stream: I) -> usize
    where
        I: IntoIterator<Item = Vec<MutationRecord<H::Anchor>>>,
    {
        let mut count = 0;
        for batch in stream {
            if !self.observing {
                break;
            }
            count += self.on_mutations(&batch);
        }
        count
    }

    /// Handle a click or mousedown on an anchor. Events for a listener slot
    /// the anchor does not carry pass through untouched.
    pub fn handle_event<E>(&mut self, anchor: H::Anchor, event: &mut E) -> DispatchOutcome
    where
        E: NavigationEvent + ?Sized,
    {
        let slot = ListenerKinds::from(event.kind());
        let listening = self
            .attached
            .get(&anchor)
            .is_some_and(|kinds| kinds.contains(slot));
        if !self.is_active() || !listening {
            return DispatchOutcome::Passthrough;
        }

        let outcome = Dispatcher::new(&self.rules, &self.frame).dispatch(event, &mut self.transport);
        if let DispatchOutcome::ReportFailed(_, _) = outcome {
            self.teardown(TeardownReason::Disconnected);
        }
        outcome
    }

    /// Handle a one-shot request. Requests sent from a tab are ignored.
    pub fn handle_message(&mut self, raw: &str, from_tab: bool) -> Option<&'static str> {
        if from_tab || !self.is_active() {
            return None;
        }

        match InboundMessage::parse(raw)? {
            InboundMessage::Ping => Some(PING_REPLY),
            InboundMessage::Shutdown => {
                self.teardown(TeardownReason::ShutdownRequested);
                None
            }
        }
    }

    /// The background channel reported a disconnect.
    pub fn on_disconnect(&mut self) {
        self.teardown(TeardownReason::Disconnected);
    }

    /// Detach everything and stop. Calling this again does nothing.
    pub fn teardown(&mut self, reason: TeardownReason) {
        if !self.is_active() {
            return;
        }

        if self.frame.is_top_level() {
            info!("shutting down content script: {}", reason);
        }

        self.observing = false;
        self.transport.disconnect();

        for (anchor, kinds) in self.attached.drain() {
            self.host.detach(anchor, kinds);
        }

        self.state = SessionState::Stopped(reason);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn frame(&self) -> &F {
        &self.frame
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::TransportError;
    use crate::frame::FrameSnapshot;
    use crate::message::RedirectReport;
    use crate::rules::Options;
    use crate::types::EventKind;

    #[derive(Default)]
    struct Port {
        posted: Vec<RedirectReport>,
        disconnected: bool,
    }

    impl Transport for Port {
        fn post(&mut self, report: &RedirectReport) -> Result<(), TransportError> {
            self.posted.push(report.clone());
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnected = true;
        }
    }

    #[derive(Default)]
    struct Doc {
        anchors: Vec<u32>,
        listeners: HashMap<u32, usize>,
        detached: Vec<(u32, ListenerKinds)>,
    }

    impl ListenerHost for Doc {
        type Anchor = u32;

        fn anchors(&self) -> Vec<u32> {
            self.anchors.clone()
        }

        fn attach(&mut self, anchor: u32, _kinds: ListenerKinds) {
            *self.listeners.entry(anchor).or_default() += 1;
        }

        fn detach(&mut self, anchor: u32, kinds: ListenerKinds) {
            self.listeners.remove(&anchor);
            self.detached.push((anchor, kinds));
        }
    }

    struct Mouse {
        kind: EventKind,
        prevented: bool,
    }

    impl NavigationEvent for Mouse {
        fn href(&self) -> Option<&str> {
            Some("https://other.com/")
        }

        fn target(&self) -> Option<&str> {
            None
        }

        fn kind(&self) -> EventKind {
            self.kind
        }

        fn prevent_default(&mut self) {
            self.prevented = true;
        }
    }

    type Session = FrameSession<Port, Doc, Options, FrameSnapshot>;

    fn start(anchors: Vec<u32>) -> Session {
        let doc = Doc { anchors, ..Default::default() };
        Session::start(FrameSnapshot::top_level("example.com"), Options::default(), doc, || {
            Ok::<_, String>(Port::default())
        })
        .unwrap()
    }

    #[test]
    fn test_start_attaches_existing_anchors() {
        let session = start(vec![1, 2, 3]);
        assert_eq!(session.attached_count(), 3);
        assert_eq!(session.host().listeners.len(), 3);
    }

    #[test]
    fn test_connect_failure() {
        let result = Session::start(FrameSnapshot::top_level("example.com"), Options::default(), Doc::default(), || {
            Err::<Port, _>("no background page")
        });
        assert!(matches!(result, Err(SessionError::ConnectFailed(msg)) if msg == "no background page"));
    }

    #[test]
    fn test_mutations_attach_once_per_anchor() {
        let mut session = start(vec![1]);
        let batch = vec![
            MutationRecord {
                added_nodes: vec![AddedNode::element(vec![1, 2]), AddedNode::text()],
            },
            MutationRecord {
                added_nodes: vec![AddedNode::element(vec![2, 3, 4])],
            },
        ];
        assert_eq!(session.on_mutations(&batch), 3);
        assert_eq!(session.on_mutations(&batch), 0);
        assert!(session.host().listeners.values().all(|&n| n == 1));
    }

    #[test]
    fn test_pump_stops_after_teardown() {
        let mut session = start(vec![]);
        session.teardown(TeardownReason::Host);
        let stream = vec![vec![MutationRecord { added_nodes: vec![AddedNode::element(vec![7])] }]];
        assert_eq!(session.pump(stream), 0);
        assert_eq!(session.attached_count(), 0);
    }

    #[test]
    fn test_ping_and_shutdown() {
        let mut session = start(vec![1, 2]);
        assert_eq!(session.handle_message("ping", false), Some("ping"));
        assert_eq!(session.handle_message("ping", true), None);
        assert_eq!(session.handle_message("hello", false), None);
        assert!(session.is_active());

        assert_eq!(session.handle_message("shutdown", true), None);
        assert!(session.is_active());

        assert_eq!(session.handle_message("shutdown", false), None);
        assert_eq!(session.state(), &SessionState::Stopped(TeardownReason::ShutdownRequested));
        assert!(session.host().listeners.is_empty());
        assert!(session.transport().disconnected);
        assert!(!session.is_observing());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut session = start(vec![1]);
        session.on_disconnect();
        session.teardown(TeardownReason::Host);
        assert_eq!(session.state(), &SessionState::Stopped(TeardownReason::Disconnected));
        assert_eq!(session.attach_links(vec![5]), 0);
    }

    #[test]
    fn test_events_only_reach_attached_slots() {
        let mut session = start(vec![1]);
        for kind in [EventKind::Click, EventKind::Mousedown] {
            let mut event = Mouse { kind, prevented: false };
            assert!(matches!(session.handle_event(1, &mut event), DispatchOutcome::Reported(_)));

            let mut stray = Mouse { kind, prevented: false };
            assert_eq!(session.handle_event(9, &mut stray), DispatchOutcome::Passthrough);
        }
        assert_eq!(session.transport().posted.len(), 2);
    }

    #[test]
    fn test_teardown_detaches_installed_slots() {
        let mut session = start(vec![4]);
        session.teardown(TeardownReason::Host);
        assert_eq!(session.host().detached, vec![(4, ListenerKinds::ALL)]);

        let mut event = Mouse { kind: EventKind::Click, prevented: false };
        assert_eq!(session.handle_event(4, &mut event), DispatchOutcome::Passthrough);
        assert!(!event.prevented);
    }
}
