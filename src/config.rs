use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use log::warn;

pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub infer_schema_length: usize,
    pub genes_per_page: usize,
    pub top_genes_limit: usize,
    pub autocomplete_limit: usize,
    pub gene_search_debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            infer_schema_length: 10_000,
            genes_per_page: 50,
            top_genes_limit: 50,
            autocomplete_limit: crate::autocomplete::DEFAULT_MAX_SUGGESTIONS,
            gene_search_debounce: Duration::from_millis(300),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        Self {
            data_dir: lookup("PROJECTOME_DATA_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            infer_schema_length: parse_or(&lookup, "INFER_SCHEMA_LENGTH", defaults.infer_schema_length),
            genes_per_page: parse_or(&lookup, "GENES_PER_PAGE", defaults.genes_per_page).max(1),
            top_genes_limit: parse_or(&lookup, "TOP_GENES_LIMIT", defaults.top_genes_limit),
            autocomplete_limit: parse_or(&lookup, "AUTOCOMPLETE_LIMIT", defaults.autocomplete_limit),
            gene_search_debounce: Duration::from_millis(parse_or(
                &lookup,
                "GENE_SEARCH_DEBOUNCE_MS",
                defaults.gene_search_debounce.as_millis() as u64,
            )),
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("ignoring unparseable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
    }

    #[test]
    fn overrides_and_bad_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("PROJECTOME_DATA_DIR", "/srv/ipn"),
            ("GENES_PER_PAGE", "25"),
            ("TOP_GENES_LIMIT", "lots"),
            ("GENE_SEARCH_DEBOUNCE_MS", "0"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/srv/ipn"));
        assert_eq!(config.genes_per_page, 25);
        assert_eq!(config.top_genes_limit, 50);
        assert_eq!(config.gene_search_debounce, Duration::ZERO);
    }

    #[test]
    fn zero_page_size_is_raised_to_one() {
        let config = Config::from_lookup(lookup_from(&[("GENES_PER_PAGE", "0")]));
        assert_eq!(config.genes_per_page, 1);
    }
}
