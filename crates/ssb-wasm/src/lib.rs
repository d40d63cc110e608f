//! WebAssembly bindings for the SSB link interceptor
//!
//! The content script owns the DOM: it hands anchors to the interceptor as
//! numeric ids, forwards mouse events and background messages, and calls
//! `preventDefault` synchronously when `handleEvent` says so.

use std::sync::Once;

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use ssb_core::url::UrlClass;
use ssb_core::{
    decide, resolve_target, AddedNode, DispatchOutcome, EventKind, FrameDescriptor, FrameSession,
    FrameSnapshot, LinkDescriptor, ListenerHost, ListenerKinds, MutationRecord, NavigationEvent,
    Options, RedirectReport, SessionError, TeardownReason, Transport, TransportError,
};
use ssb_rules::RedirectRules;

// =============================================================================
// JS Collaborators
// =============================================================================

/// Background channel backed by a `chrome.runtime.Port`-like object.
struct JsPort {
    port: JsValue,
    post: Function,
}

impl JsPort {
    fn connect(port: JsValue) -> Result<Self, String> {
        if port.is_null() || port.is_undefined() {
            return Err("no port".to_string());
        }
        let post = method(&port, "postMessage")?;
        Ok(Self { port, post })
    }
}

impl Transport for JsPort {
    fn post(&mut self, report: &RedirectReport) -> Result<(), TransportError> {
        self.post
            .call1(&self.port, &report_to_js(report))
            .map(|_| ())
            .map_err(|err| TransportError::Send(js_error_string(&err)))
    }

    fn disconnect(&mut self) {
        if let Ok(disconnect) = method(&self.port, "disconnect") {
            let _ = disconnect.call0(&self.port);
        }
    }
}

/// Listener bookkeeping delegated to the content script.
struct JsListeners {
    host: JsValue,
}

impl ListenerHost for JsListeners {
    type Anchor = u32;

    fn anchors(&self) -> Vec<u32> {
        let result = method(&self.host, "anchors").and_then(|anchors| {
            anchors
                .call0(&self.host)
                .map_err(|err| js_error_string(&err))
        });
        match result {
            Ok(value) => anchor_ids(&value),
            Err(err) => {
                log::warn!("failed to list anchors: {}", err);
                Vec::new()
            }
        }
    }

    fn attach(&mut self, anchor: u32, kinds: ListenerKinds) {
        self.call_with_anchor("attach", anchor, kinds);
    }

    fn detach(&mut self, anchor: u32, kinds: ListenerKinds) {
        self.call_with_anchor("detach", anchor, kinds);
    }
}

impl JsListeners {
    fn call_with_anchor(&self, name: &str, anchor: u32, kinds: ListenerKinds) {
        let result = method(&self.host, name).and_then(|f| {
            f.call2(&self.host, &JsValue::from(anchor), &JsValue::from(kinds.bits()))
                .map_err(|err| js_error_string(&err))
        });
        if let Err(err) = result {
            log::warn!("{} failed for anchor {}: {}", name, anchor, err);
        }
    }
}

/// One mouse event forwarded by the content script.
struct JsMouseEvent {
    href: Option<String>,
    target: Option<String>,
    kind: EventKind,
    prevented: bool,
}

impl NavigationEvent for JsMouseEvent {
    fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    fn kind(&self) -> EventKind {
        self.kind
    }

    fn prevent_default(&mut self) {
        self.prevented = true;
    }
}

// =============================================================================
// Link Interceptor
// =============================================================================

type Session = FrameSession<JsPort, JsListeners, RedirectRules, FrameSnapshot>;

/// One interceptor per frame.
#[wasm_bindgen]
pub struct LinkInterceptor {
    session: Session,
}

#[wasm_bindgen]
impl LinkInterceptor {
    /// Start a session. Fails when the frame descriptor or options do not
    /// parse, or when the port is missing.
    #[wasm_bindgen(constructor)]
    pub fn new(
        frame_json: &str,
        options_json: &str,
        rule_lists: JsValue,
        port: JsValue,
        host: JsValue,
    ) -> Result<LinkInterceptor, JsValue> {
        let frame = parse_frame(frame_json).map_err(session_error)?;
        let options = parse_options(options_json).map_err(session_error)?;
        let rules = build_rules(options, &rule_lists).map_err(session_error)?;

        let session = Session::start(frame, rules, JsListeners { host }, || JsPort::connect(port))
            .map_err(session_error)?;

        Ok(LinkInterceptor { session })
    }

    /// Attach listeners to anchors the script discovered itself.
    #[wasm_bindgen(js_name = attachAnchors)]
    pub fn attach_anchors(&mut self, anchors: Vec<u32>) -> u32 {
        self.session.attach_links(anchors) as u32
    }

    /// Process one mutation batch: an array of inserted elements, each given
    /// as the array of anchor ids found at or below it.
    #[wasm_bindgen(js_name = onMutations)]
    pub fn on_mutations(&mut self, inserted: JsValue) -> u32 {
        let added_nodes = Array::from(&inserted)
            .iter()
            .map(|node| AddedNode::element(anchor_ids(&node)))
            .collect();
        let batch = [MutationRecord { added_nodes }];
        self.session.on_mutations(&batch) as u32
    }

    /// Handle a click or mousedown. The returned object's `suppressed` field
    /// tells the script whether to call `preventDefault`.
    #[wasm_bindgen(js_name = handleEvent)]
    pub fn handle_event(
        &mut self,
        anchor: u32,
        href: Option<String>,
        target: Option<String>,
        event_type: &str,
    ) -> JsValue {
        let kind = match EventKind::from_str(event_type) {
            Some(kind) => kind,
            None => return outcome_to_js(&DispatchOutcome::Passthrough),
        };
        let mut event = JsMouseEvent {
            href,
            target,
            kind,
            prevented: false,
        };
        let outcome = self.session.handle_event(anchor, &mut event);
        outcome_to_js(&outcome)
    }

    /// Handle a one-shot background message; returns the reply, if any.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, message: &str, from_tab: bool) -> Option<String> {
        self.session
            .handle_message(message, from_tab)
            .map(str::to_string)
    }

    #[wasm_bindgen(js_name = onDisconnect)]
    pub fn on_disconnect(&mut self) {
        self.session.on_disconnect();
    }

    pub fn teardown(&mut self) {
        self.session.teardown(TeardownReason::Host);
    }

    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }
}

// =============================================================================
// Stateless Helpers
// =============================================================================

static LOGGER_INIT: Once = Once::new();

// Panics inside event handlers show up in the console instead of as
// `unreachable` traps.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// Route `log` records to the browser console. Later calls only change the level.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(debug: bool) {
    let level = if debug { log::Level::Debug } else { log::Level::Info };
    LOGGER_INIT.call_once(|| wasm_logger::init(wasm_logger::Config::new(level)));
    log::set_max_level(level.to_level_filter());
}

#[wasm_bindgen(js_name = classifyHref)]
pub fn classify_href(href: &str) -> JsValue {
    let class = UrlClass::of(href);
    let result = Object::new();
    let _ = Reflect::set(&result, &"absolute".into(), &JsValue::from(class.absolute));
    if let Some(domain) = class.domain {
        let _ = Reflect::set(&result, &"domain".into(), &JsValue::from_str(domain));
    }
    result.into()
}

#[wasm_bindgen(js_name = resolveTarget)]
pub fn resolve_target_js(raw_target: &str, frame_json: &str) -> Result<String, JsValue> {
    let frame = parse_frame(frame_json).map_err(session_error)?;
    Ok(resolve_target(raw_target, &frame).as_str().to_string())
}

/// Decide a single link without a session. Returns `undefined` for links
/// without an href.
#[wasm_bindgen(js_name = decideLink)]
pub fn decide_link(
    href: &str,
    target: &str,
    event_type: &str,
    frame_json: &str,
    options_json: &str,
    rule_lists: JsValue,
) -> Result<JsValue, JsValue> {
    let kind = EventKind::from_str(event_type)
        .ok_or_else(|| JsValue::from_str(&format!("unknown event type '{}'", event_type)))?;
    let frame = parse_frame(frame_json).map_err(session_error)?;
    let options = parse_options(options_json).map_err(session_error)?;
    let rules = build_rules(options, &rule_lists).map_err(session_error)?;

    let link = LinkDescriptor::new(href, target, kind);
    let decision = match decide(&link, &frame, &rules) {
        Some(decision) => decision,
        None => return Ok(JsValue::UNDEFINED),
    };

    let result = Object::new();
    let _ = Reflect::set(&result, &"redirect".into(), &JsValue::from(decision.should_redirect()));
    let _ = Reflect::set(&result, &"target".into(), &JsValue::from_str(decision.target_label()));
    let _ = Reflect::set(&result, &"reason".into(), &JsValue::from_str(decision.reason.as_str()));
    Ok(result.into())
}

#[wasm_bindgen(js_name = compileRuleLists)]
pub fn compile_rule_lists(list_texts: JsValue) -> Result<JsValue, JsValue> {
    let lists = string_array(&list_texts).map_err(|err| JsValue::from_str(&err))?;
    let (_, stats) = RedirectRules::from_lists(Options::default(), &lists);

    let result = Object::new();
    let _ = Reflect::set(&result, &"rulesBefore".into(), &JsValue::from(stats.before as u32));
    let _ = Reflect::set(&result, &"rulesAfter".into(), &JsValue::from(stats.after as u32));
    let _ = Reflect::set(&result, &"rulesDeduped".into(), &JsValue::from(stats.deduped as u32));
    let _ = Reflect::set(&result, &"badfilterRules".into(), &JsValue::from(stats.badfilter_rules as u32));
    let _ = Reflect::set(&result, &"badfilteredRules".into(), &JsValue::from(stats.badfiltered_rules as u32));
    Ok(result.into())
}

// =============================================================================
// Conversions
// =============================================================================

fn parse_frame(frame_json: &str) -> Result<FrameSnapshot, SessionError> {
    let desc: FrameDescriptor = serde_json::from_str(frame_json)
        .map_err(|e| SessionError::StartupFailed(format!("invalid frame descriptor: {}", e)))?;
    Ok(FrameSnapshot::from(desc))
}

fn parse_options(options_json: &str) -> Result<Options, SessionError> {
    if options_json.trim().is_empty() {
        return Ok(Options::default());
    }
    serde_json::from_str(options_json)
        .map_err(|e| SessionError::StartupFailed(format!("invalid options: {}", e)))
}

/// `null`/`undefined` means no rule list was loaded.
fn build_rules(options: Options, rule_lists: &JsValue) -> Result<RedirectRules, SessionError> {
    if rule_lists.is_null() || rule_lists.is_undefined() {
        return Ok(RedirectRules::without_lists(options));
    }
    let lists = string_array(rule_lists).map_err(SessionError::StartupFailed)?;
    Ok(RedirectRules::from_lists(options, &lists).0)
}

fn string_array(value: &JsValue) -> Result<Vec<String>, String> {
    Array::from(value)
        .iter()
        .map(|item| {
            item.as_string()
                .ok_or_else(|| "rule list must be a string".to_string())
        })
        .collect()
}

fn anchor_ids(value: &JsValue) -> Vec<u32> {
    Array::from(value)
        .iter()
        .filter_map(|id| id.as_f64())
        .filter(|id| *id >= 0.0 && *id <= u32::MAX as f64)
        .map(|id| id as u32)
        .collect()
}

fn method(target: &JsValue, name: &str) -> Result<Function, String> {
    Reflect::get(target, &JsValue::from_str(name))
        .map_err(|err| js_error_string(&err))?
        .dyn_into::<Function>()
        .map_err(|_| format!("'{}' is not a function", name))
}

fn js_error_string(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

fn session_error(err: SessionError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn report_to_js(report: &RedirectReport) -> JsValue {
    let message = Object::new();
    let _ = Reflect::set(&message, &"redirect".into(), &JsValue::from(report.redirect));
    let _ = Reflect::set(&message, &"url".into(), &JsValue::from_str(&report.url));
    if let Some(is_mousedown) = report.is_mousedown {
        let _ = Reflect::set(&message, &"isMousedown".into(), &JsValue::from(is_mousedown));
    }
    message.into()
}

fn outcome_to_js(outcome: &DispatchOutcome) -> JsValue {
    let result = Object::new();
    let _ = Reflect::set(&result, &"suppressed".into(), &JsValue::from(outcome.suppressed()));
    let _ = Reflect::set(
        &result,
        &"reported".into(),
        &JsValue::from(matches!(outcome, DispatchOutcome::Reported(_))),
    );
    if let Some(dispatch) = outcome.dispatch() {
        let _ = Reflect::set(&result, &"target".into(), &JsValue::from_str(dispatch.decision.target_label()));
        let _ = Reflect::set(&result, &"reason".into(), &JsValue::from_str(dispatch.decision.reason.as_str()));
    }
    result.into()
}


#[cfg(all(test, target_arch = "wasm32"))]
mod web_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn classify_relative_href() {
        let value = classify_href("/inbox");
        let absolute = Reflect::get(&value, &"absolute".into()).unwrap();
        assert_eq!(absolute.as_bool(), Some(false));
        assert!(Reflect::get(&value, &"domain".into()).unwrap().is_undefined());
    }

    #[wasm_bindgen_test]
    fn decide_subframe_link() {
        let lists = Array::of1(&JsValue::from_str("*"));
        let value = decide_link(
            "https://other.com/",
            "",
            "click",
            r#"{"isTopLevel":false,"domain":"example.com"}"#,
            "",
            lists.into(),
        )
        .unwrap();
        let redirect = Reflect::get(&value, &"redirect".into()).unwrap();
        assert_eq!(redirect.as_bool(), Some(false));
    }

    #[wasm_bindgen_test]
    fn init_logging_can_repeat() {
        init_logging(false);
        init_logging(true);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);
    }

    #[wasm_bindgen_test]
    fn missing_port_fails_to_start() {
        let result = LinkInterceptor::new(
            r#"{"isTopLevel":true,"domain":"example.com"}"#,
            "",
            JsValue::NULL,
            JsValue::NULL,
            Object::new().into(),
        );
        assert!(result.is_err());
    }
}
