//! Root-name normalization
//!
//! Funds of the same family usually share a display name up to a
//! separator, followed by share-class, currency or wrapper codes:
//! `AMUNDI INDEX FTSE EPRA NAREIT GLOBAL - AU (C)` and
//! `AMUNDI INDEX FTSE EPRA NAREIT GLOBAL (DR) ETF Acc` belong together.
//! The root name is the grouping key that makes them equal.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Boilerplate tokens stripped from names, compared case-insensitively.
///
/// Version 1: share classes, distribution policy, replication, wrappers,
/// currencies and hedging markers.
pub const BOILERPLATE_TOKENS: &[&str] = &[
    // share classes
    "a", "au", "c", "d", "e", "f", "g", "i", "i2", "ic", "id", "m", "o", "p", "pc", "pd",
    "r", "rc", "rd", "s", "x", "z",
    // distribution policy
    "acc", "dist", "cap", "capi", "inc",
    // replication and wrappers
    "dr", "etf", "ucits", "sicav", "fcp",
    // currencies
    "eur", "usd", "gbp", "chf", "jpy", "sek", "nok", "dkk", "cad", "aud", "hkd", "sgd",
    // hedging
    "h", "hedged", "hgd",
];

fn separator_regex() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[-–(]").unwrap())
}

#[derive(Debug, Clone)]
pub struct RootNameNormalizer {
    tokens: HashSet<String>,
}

impl Default for RootNameNormalizer {
    fn default() -> Self {
        Self::with_extra_tokens(std::iter::empty::<&str>())
    }
}

impl RootNameNormalizer {
    /// Default token set extended with additional tokens
    pub fn with_extra_tokens<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = BOILERPLATE_TOKENS
            .iter()
            .map(|t| t.to_string())
            .chain(extra.into_iter().map(|t| t.as_ref().trim().to_lowercase()))
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn normalize(&self, name: &str) -> String {
        let prefix = match separator_regex().find(name) {
            Some(m) if !name[..m.start()].trim().is_empty() => &name[..m.start()],
            _ => name,
        };

        let kept: Vec<String> = prefix
            .split_whitespace()
            .filter(|token| !self.is_boilerplate(token))
            .map(|token| token.to_lowercase())
            .collect();

        if kept.is_empty() {
            // Everything was boilerplate; fall back to the collapsed prefix
            return prefix
                .split_whitespace()
                .map(|token| token.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
        }

        kept.join(" ")
    }

    fn is_boilerplate(&self, token: &str) -> bool {
        let bare = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        !bare.is_empty() && self.tokens.contains(&bare)
    }
}

/// Root name with the default token set
pub fn root_name(name: &str) -> String {
    RootNameNormalizer::default().normalize(name)
}
