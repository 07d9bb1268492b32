//! CLI commands

pub mod config;
pub mod deploy;
pub mod inspect;

/// Nearest candidate by edit distance
pub fn closest_command<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .min_by_key(|candidate| strsim::levenshtein(input, candidate))
}
