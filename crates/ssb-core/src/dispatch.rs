//! Click/Mousedown Dispatcher
//!
//! Turns a DOM mouse event into a decision, cancels default navigation when
//! redirecting, and reports the decision to the background page. The
//! cancellation is decided synchronously and never waits on the report.

use log::warn;

use crate::engine::DecisionEngine;
use crate::error::TransportError;
use crate::frame::FrameIdentity;
use crate::message::RedirectReport;
use crate::rules::RuleSet;
use crate::types::{EventKind, LinkDescriptor, RedirectDecision};

// =============================================================================
// Collaborator Seams
// =============================================================================

/// Outbound half of the persistent channel to the background page.
pub trait Transport {
    /// Post a report without waiting for acknowledgment.
    fn post(&mut self, report: &RedirectReport) -> Result<(), TransportError>;

    /// Close the channel. Called once on teardown.
    fn disconnect(&mut self);
}

/// A mouse event on an anchor element.
pub trait NavigationEvent {
    /// Fully resolved `href` of the anchor, if any.
    fn href(&self) -> Option<&str>;

    /// Raw `target` attribute, if any.
    fn target(&self) -> Option<&str>;

    fn kind(&self) -> EventKind;

    /// Suppress the browser's native link-follow.
    fn prevent_default(&mut self);
}

// =============================================================================
// Dispatch Results
// =============================================================================

/// What the dispatcher did for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub decision: RedirectDecision,
    /// Whether default navigation was cancelled
    pub suppressed: bool,
    pub report: RedirectReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not intercepted; the browser navigates natively and nothing is reported
    Passthrough,
    /// Decided and reported
    Reported(Dispatch),
    /// Decided, but the report could not be delivered
    ReportFailed(Dispatch, TransportError),
}

impl DispatchOutcome {
    pub fn dispatch(&self) -> Option<&Dispatch> {
        match self {
            Self::Passthrough => None,
            Self::Reported(dispatch) | Self::ReportFailed(dispatch, _) => Some(dispatch),
        }
    }

    /// Whether default navigation was cancelled.
    pub fn suppressed(&self) -> bool {
        self.dispatch().is_some_and(|d| d.suppressed)
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

pub struct Dispatcher<'a, R: ?Sized, F: ?Sized> {
    engine: DecisionEngine<'a, R>,
    frame: &'a F,
}

impl<'a, R, F> Dispatcher<'a, R, F>
where
    R: RuleSet + ?Sized,
    F: FrameIdentity + ?Sized,
{
    pub fn new(rules: &'a R, frame: &'a F) -> Self {
        Self {
            engine: DecisionEngine::new(rules),
            frame,
        }
    }

    /// Handle one click or mousedown.
    pub fn dispatch<E, T>(&self, event: &mut E, transport: &mut T) -> DispatchOutcome
    where
        E: NavigationEvent + ?Sized,
        T: Transport + ?Sized,
    {
        let kind = event.kind();
        let (decision, report) = {
            let href = match event.href() {
                Some(href) if !href.is_empty() => href,
                _ => return DispatchOutcome::Passthrough,
            };
            let link = LinkDescriptor::new(href, event.target().unwrap_or(""), kind);
            let decision = match self.engine.decide(&link, self.frame) {
                Some(decision) => decision,
                None => return DispatchOutcome::Passthrough,
            };
            (decision, RedirectReport::new(&link, &decision))
        };

        let suppressed = kind == EventKind::Click && decision.should_redirect();
        if suppressed {
            event.prevent_default();
        }

        let dispatch = Dispatch {
            decision,
            suppressed,
            report,
        };

        match transport.post(&dispatch.report) {
            Ok(()) => DispatchOutcome::Reported(dispatch),
            Err(err) => {
                warn!("dropping report for {}: {}", dispatch.report.url, err);
                DispatchOutcome::ReportFailed(dispatch, err)
            }
        }
    }
}
