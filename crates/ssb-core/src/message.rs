//! Messages exchanged with the background collaborator
//!
//! Outbound reports are fire-and-forget. Inbound requests are one-shot
//! strings; anything unrecognized is ignored.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{LinkDescriptor, RedirectDecision};

/// Decision report posted for every click and mousedown on a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RedirectReport {
    pub redirect: bool,
    pub url: String,
    /// Present (and true) only for mousedown notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_mousedown: Option<bool>,
}

impl RedirectReport {
    pub fn new(link: &LinkDescriptor<'_>, decision: &RedirectDecision) -> Self {
        Self {
            redirect: decision.should_redirect(),
            url: link.href.to_string(),
            is_mousedown: link.is_mousedown().then_some(true),
        }
    }
}

/// One-shot request from the background page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum InboundMessage {
    Ping,
    Shutdown,
}

impl InboundMessage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ping" => Some(Self::Ping),
            "shutdown" => Some(Self::Shutdown),
            _ => None,
        }
    }
}

/// Reply to a `ping` request.
pub const PING_REPLY: &str = "ping";
