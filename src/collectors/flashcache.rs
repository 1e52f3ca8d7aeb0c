//! SSD cache statistics from the flashcache kernel module.
//!
//! The stats file is a whitespace separated list of `key=value` tokens.
//! Hosts without an SSD cache have no such file and report nothing.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{CollectError, Result};
use crate::exec::parse_f64;
use crate::metric::Metric;

pub const DEFAULT_FLASHCACHE_STATS: &str = "/proc/flashcache/CG0/flashcache_stats";

pub fn parse_flashcache_stats(content: &str) -> Result<Vec<Metric>> {
    let mut metrics = Vec::new();
    for token in content.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let value = parse_f64(key, value)?;
        metrics.push(Metric::gauge(
            format!("node_flashcache_{key}"),
            format!("Flashcache statistic {key}"),
            value,
        ));
    }
    Ok(metrics)
}

pub fn collect_flashcache(path: &Path) -> Result<Vec<Metric>> {
    match fs::read_to_string(path) {
        Ok(content) => parse_flashcache_stats(&content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(CollectError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flashcache_stats() {
        let content = "reads=1200 writes=300\nread_hits=900 read_hit_percent=75\n";
        let metrics = parse_flashcache_stats(content).unwrap();
        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics[0].name, "node_flashcache_reads");
        assert_eq!(metrics[3].name, "node_flashcache_read_hit_percent");
        assert_eq!(metrics[3].value, 75.0);
    }

    #[test]
    fn test_missing_stats_file_is_empty() {
        let metrics = collect_flashcache(Path::new("/nonexistent/flashcache_stats")).unwrap();
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_garbage_value_fails() {
        assert!(parse_flashcache_stats("reads=abc").is_err());
    }
}
