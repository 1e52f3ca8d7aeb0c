//! Subprocess and file helpers shared by the producers.

use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::trace;

use crate::error::{CollectError, Result};

/// Runs `program` with `args` and returns its trimmed stdout.
///
/// Fails when the process cannot be spawned or exits non-zero.
pub fn exec_command<P: AsRef<Path>>(program: P, args: &[&str]) -> Result<String> {
    let program = program.as_ref();
    let name = program.display().to_string();
    trace!("exec {} {:?}", name, args);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| CollectError::Command {
            program: name.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CollectError::Command {
            program: name,
            reason: format!("{} ({})", output.status, stderr.trim()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Reads a whole text file and trims surrounding whitespace.
pub fn read_trimmed<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| CollectError::io(path, e))
}

/// Parses a float, attributing failures to `what`.
pub fn parse_f64(what: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| CollectError::parse(what, text))
}

/// Parses the leading number of strings like `"45 C/113 F"` or `"1200 RPM"`.
pub fn parse_leading_number(what: &str, text: &str) -> Result<f64> {
    let token = text
        .split(|c: char| c.is_whitespace() || c == '/')
        .find(|s| !s.is_empty())
        .unwrap_or("");
    let numeric: String = token
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    parse_f64(what, &numeric).map_err(|_| CollectError::parse(what, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_command_trims_output() {
        let out = exec_command("echo", &["  hello  "]).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_exec_command_nonzero_exit() {
        let result = exec_command("false", &[]);
        assert!(matches!(result, Err(CollectError::Command { .. })));
    }

    #[test]
    fn test_exec_command_missing_program() {
        let result = exec_command("/nonexistent/definitely-not-here", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_trimmed_missing_file() {
        let result = read_trimmed("/nonexistent/file");
        assert!(matches!(result, Err(CollectError::Io { .. })));
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("temp", "45 C/113 F").unwrap(), 45.0);
        assert_eq!(parse_leading_number("fan", "1200 RPM").unwrap(), 1200.0);
        assert_eq!(parse_leading_number("temp", "38C/100F").unwrap(), 38.0);
        assert!(parse_leading_number("temp", "--").is_err());
    }
}
