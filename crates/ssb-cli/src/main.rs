//! SSB link CLI
//!
//! CLI tool for checking redirect rule lists and inspecting link decisions.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use ssb_core::{decide, EventKind, FrameSnapshot, LinkDescriptor, Options, RedirectReport};

mod config;
mod replay;

#[derive(Parser)]
#[command(name = "ssb-cli")]
#[command(about = "Site-specific browser link redirect tools")]
struct Cli {
    /// Log decision details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum EventArg {
    Click,
    Mousedown,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Click => EventKind::Click,
            EventArg::Mousedown => EventKind::Mousedown,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decide a single link
    Decide {
        /// Link href as the browser resolved it
        #[arg(long)]
        href: String,

        /// Raw target attribute
        #[arg(long, default_value = "")]
        target: String,

        /// Mouse event type
        #[arg(long, value_enum, default_value = "click")]
        event: EventArg,

        /// Domain of the top-level document
        #[arg(long)]
        domain: String,

        /// The link lives in a nested frame
        #[arg(long)]
        nested: bool,

        /// The nested frame's parent is itself nested
        #[arg(long, requires = "nested")]
        parent_nested: bool,

        /// Name of a frame or iframe in the top document
        #[arg(long = "frame-name")]
        frame_names: Vec<String>,

        /// Rule list files
        #[arg(short, long)]
        rules: Vec<String>,

        /// Options JSON file
        #[arg(short, long)]
        config: Option<String>,

        /// Never redirect internal same-domain links
        #[arg(long)]
        ignore_same_domain: bool,
    },

    /// Parse and optimize rule lists
    Check {
        /// Rule list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Fail on the first line that does not parse
        #[arg(long)]
        strict: bool,
    },

    /// Evaluate a JSONL trace of link events
    Replay {
        /// Trace file, one event per line
        #[arg(short, long)]
        trace: String,

        /// Rule list files
        #[arg(short, long)]
        rules: Vec<String>,

        /// Options JSON file
        #[arg(short, long)]
        config: Option<String>,

        /// Stop after this many events
        #[arg(long, default_value_t = usize::MAX)]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Decide {
            href,
            target,
            event,
            domain,
            nested,
            parent_nested,
            frame_names,
            rules,
            config,
            ignore_same_domain,
        } => {
            let mut frame = if nested {
                FrameSnapshot::nested(domain, !parent_nested)
            } else {
                FrameSnapshot::top_level(domain)
            };
            for name in frame_names {
                frame.add_frame_name(name);
            }
            let link = LinkDescriptor::new(&href, &target, event.into());
            cmd_decide(&link, &frame, &rules, config.as_deref(), ignore_same_domain)
        }
        Commands::Check { input, strict } => cmd_check(&input, strict, cli.verbose),
        Commands::Replay {
            trace,
            rules,
            config,
            limit,
        } => replay::run(&trace, &rules, config.as_deref(), limit, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_decide(
    link: &LinkDescriptor<'_>,
    frame: &FrameSnapshot,
    rule_paths: &[String],
    config_path: Option<&str>,
    ignore_same_domain: bool,
) -> Result<(), String> {
    let output = decision_json(link, frame, rule_paths, config_path, ignore_same_domain)?;
    let text = serde_json::to_string_pretty(&output)
        .map_err(|e| format!("Failed to serialize decision: {}", e))?;
    println!("{}", text);
    Ok(())
}

/// Options from the config file, with `--ignore-same-domain` taking precedence.
fn resolve_options(config_path: Option<&str>, ignore_same_domain: bool) -> Result<Options, String> {
    let mut options = config::load_options(config_path)?;
    if ignore_same_domain {
        options.ignore_all_internal_same_domain = Some(true);
    }
    Ok(options)
}

fn decision_json(
    link: &LinkDescriptor<'_>,
    frame: &FrameSnapshot,
    rule_paths: &[String],
    config_path: Option<&str>,
    ignore_same_domain: bool,
) -> Result<serde_json::Value, String> {
    let options = resolve_options(config_path, ignore_same_domain)?;
    let rules = config::load_rules(options, rule_paths)?;

    let output = match decide(link, frame, &rules) {
        Some(decision) => serde_json::json!({
            "redirect": decision.should_redirect(),
            "target": decision.target_label(),
            "reason": decision.reason.as_str(),
            "suppressed": decision.should_redirect(),
            "report": RedirectReport::new(link, &decision),
        }),
        None => serde_json::json!({
            "redirect": false,
            "reason": "no href",
            "suppressed": false,
        }),
    };
    Ok(output)
}

fn cmd_check(inputs: &[String], strict: bool, verbose: bool) -> Result<(), String> {
    let lists = config::read_lists(inputs)?;

    if strict {
        for (path, text) in inputs.iter().zip(&lists) {
            ssb_rules::parse_rule_list_strict(text).map_err(|e| format!("{}: {}", path, e))?;
        }
    }

    if verbose {
        for (list_id, (path, text)) in inputs.iter().zip(&lists).enumerate() {
            println!(
                "  [{}] {} - {} lines, {} rules",
                list_id,
                path,
                text.lines().count(),
                ssb_rules::parse_rule_list(text).len()
            );
        }
    }

    let (_, stats) = ssb_rules::RedirectRules::from_lists(Default::default(), &lists);

    println!("Checked {} rule lists", inputs.len());
    println!(
        "  Rules:    {} -> {} (dedupe removed {})",
        stats.before, stats.after, stats.deduped
    );
    println!(
        "  Badfilter: {} rules cancelled {}",
        stats.badfilter_rules, stats.badfiltered_rules
    );

    Ok(())
}
