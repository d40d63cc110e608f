use std::collections::BTreeMap;

use serde::Deserialize;

use ssb_core::{decide, EventKind, FrameDescriptor, FrameSnapshot, LinkDescriptor};

use crate::config;

/// One line of a trace file.
#[derive(Debug, Deserialize)]
struct TraceEvent {
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(rename = "type", default = "default_event_type")]
    event_type: String,
    #[serde(default)]
    frame: FrameDescriptor,
}

fn default_event_type() -> String {
    "click".to_string()
}

#[derive(Debug, Default)]
struct ReplaySummary {
    events: usize,
    skipped: usize,
    redirected: usize,
    by_outcome: BTreeMap<String, usize>,
}

pub fn run(
    trace_path: &str,
    rule_paths: &[String],
    config_path: Option<&str>,
    limit: usize,
    verbose: bool,
) -> Result<(), String> {
    let options = config::load_options(config_path)?;
    let rules = config::load_rules(options, rule_paths)?;
    let events = load_trace_jsonl(trace_path, limit)?;

    let mut summary = ReplaySummary::default();

    for (line_no, event) in events {
        let kind = match EventKind::from_str(&event.event_type) {
            Some(kind) => kind,
            None => {
                summary.skipped += 1;
                continue;
            }
        };
        summary.events += 1;

        let href = event.href.as_deref().unwrap_or("");
        let frame = FrameSnapshot::from(event.frame);
        let link = LinkDescriptor::new(href, event.target.as_deref().unwrap_or(""), kind);

        let outcome = match decide(&link, &frame, &rules) {
            Some(decision) => {
                if decision.should_redirect() {
                    summary.redirected += 1;
                }
                if verbose {
                    println!(
                        "{:>6}  {:<8} {:<16} {:<22} {}",
                        line_no,
                        if decision.should_redirect() { "redirect" } else { "allow" },
                        decision.target_label(),
                        decision.reason.as_str(),
                        href
                    );
                }
                decision.reason.as_str()
            }
            None => "no href",
        };
        *summary.by_outcome.entry(outcome.to_string()).or_default() += 1;
    }

    println!("Replayed {} events from '{}'", summary.events, trace_path);
    println!("  Redirected: {}", summary.redirected);
    if summary.skipped > 0 {
        println!("  Skipped:    {} (unknown event type)", summary.skipped);
    }
    for (reason, count) in &summary.by_outcome {
        println!("  {:<22} {}", reason, count);
    }

    Ok(())
}

fn load_trace_jsonl(path: &str, limit: usize) -> Result<Vec<(usize, TraceEvent)>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read trace '{}': {}", path, e))?;
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if out.len() >= limit {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceEvent>(trimmed) {
            Ok(event) => out.push((idx + 1, event)),
            Err(e) => log::warn!("{}:{}: skipping malformed event: {}", path, idx + 1, e),
        }
    }
    Ok(out)
}
