//! Human-facing output
//!
//! Headers and listings are prefixed with `#` so that output piped into other
//! tools reads as comments.

use console::style;

use convoy_core::{Config, keys};

/// `# <title> (context / environment / profile)` on stderr
pub fn command_header(title: &str, config: &Config) {
    eprintln!(
        "{} {} {}",
        style("#").dim(),
        style(title).bold().cyan(),
        style(header_detail(config)).dim()
    );
}

fn header_detail(config: &Config) -> String {
    let field = |key: &str| config.get_str(key).unwrap_or("?").to_string();
    format!(
        "(kube-context: {}, environment: {}, profile: {})",
        field(keys::KUBE_CONTEXT),
        field(keys::ENVIRONMENT),
        field(keys::PROFILE)
    )
}

/// One context name per line, the current one marked
pub fn context_list(names: &[&str], current: Option<&str>) -> String {
    names
        .iter()
        .map(|name| {
            if Some(*name) == current {
                format!("{} (current)", name)
            } else {
                name.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outcome line after a run
pub fn success(message: &str) {
    eprintln!("{} {}", style("#").dim(), style(message).green());
}
