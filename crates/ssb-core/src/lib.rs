//! SSB Link Interception Core
//!
//! This crate decides, for every link a user clicks inside a site-specific
//! browser, whether the navigation is handed to an external handler (the
//! user's default browser) or allowed to proceed inside the wrapper.
//!
//! # Architecture
//!
//! A decision is a pure function of the clicked link, the current frame's
//! position in the frame tree and a read-only rule set. The session layer
//! wraps that function with the per-frame lifecycle: listener bookkeeping,
//! the background channel and teardown when the channel goes away.
//!
//! # Modules
//!
//! - `frame`: frame identity and `target` attribute resolution
//! - `url`: absolute/domain classification of hrefs
//! - `engine`: the short-circuit redirect decision chain
//! - `dispatch`: mouse event driver, navigation suppression and reporting
//! - `session`: per-frame lifecycle, inbound messages, mutation batches
//! - `rules`: options and the rule predicate seam
//! - `message`: wire types shared with the background page
//! - `types`: shared type definitions

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod frame;
pub mod message;
pub mod rules;
pub mod session;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use dispatch::{Dispatch, DispatchOutcome, Dispatcher, NavigationEvent, Transport};
pub use engine::{decide, DecisionEngine};
pub use error::{SessionError, TransportError};
pub use frame::{resolve_target, FrameDescriptor, FrameIdentity, FrameSnapshot};
pub use message::{InboundMessage, RedirectReport};
pub use rules::{FnRules, Options, RuleSet};
pub use session::{AddedNode, FrameSession, ListenerHost, MutationRecord, SessionState, TeardownReason};
pub use types::{DecisionReason, EventKind, LinkDescriptor, ListenerKinds, NavigationTarget, RedirectDecision, Verdict};
pub use url::UrlClass;
