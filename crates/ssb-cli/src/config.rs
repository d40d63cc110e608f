use std::fs;

use ssb_core::Options;
use ssb_rules::RedirectRules;

/// Load options from a JSON file; no file means defaults.
pub fn load_options(path: Option<&str>) -> Result<Options, String> {
    let path = match path {
        Some(path) => path,
        None => return Ok(Options::default()),
    };

    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("Invalid options in '{}': {}", path, e))
}

pub fn read_lists(paths: &[String]) -> Result<Vec<String>, String> {
    paths
        .iter()
        .map(|path| {
            fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
        })
        .collect()
}

/// Compile rule lists. With no lists the rule predicate stays unavailable.
pub fn load_rules(options: Options, paths: &[String]) -> Result<RedirectRules, String> {
    if paths.is_empty() {
        return Ok(RedirectRules::without_lists(options));
    }

    let lists = read_lists(paths)?;
    let (rules, stats) = RedirectRules::from_lists(options, &lists);
    log::info!(
        "loaded {} rule lists: {} rules ({} duplicates removed)",
        paths.len(),
        stats.after,
        stats.deduped
    );
    Ok(rules)
}
