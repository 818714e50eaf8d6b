//! Platform detection utilities

use log::debug;
use std::process::{Command, Stdio};

/// Find the first runnable executable among `candidates`
///
/// Each candidate is run with `check_args`; the first one that exits
/// successfully wins. Output is discarded.
pub fn find_executable(candidates: &[&str], check_args: &[&str]) -> Option<String> {
    for path in candidates {
        match Command::new(path)
            .args(check_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return Some(path.to_string()),
            Ok(status) => debug!("{} exited with {}", path, status),
            Err(e) => debug!("{} not runnable: {}", path, e),
        }
    }
    None
}

/// Detect if running on macOS
pub fn is_macos() -> bool {
    std::env::consts::OS == "macos"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable() {
        let found = find_executable(&["voxbatch-definitely-not-installed"], &["--version"]);
        assert!(found.is_none());
    }

    #[test]
    fn test_is_macos() {
        // Result depends on the platform, just make sure it agrees with cfg
        assert_eq!(is_macos(), cfg!(target_os = "macos"));
    }
}
