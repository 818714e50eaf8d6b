//! Concrete synthesis backends
//!
//! Each backend drives an external program and writes one audio file per
//! call. Availability is decided by whether that program can be run.

pub mod espeak;
pub mod gtts;
pub mod say;
pub mod xtts;

use super::Engine;
use crate::config::Config;
use crate::{Result, VoxError};
use log::{debug, error};
use std::process::{Command, Stdio};

/// Backends known to the registry, in static priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Xtts,
    Gtts,
    Espeak,
    Say,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Xtts,
        BackendKind::Gtts,
        BackendKind::Espeak,
        BackendKind::Say,
    ];

    /// Engine id, also used for config keys
    pub fn id(self) -> &'static str {
        match self {
            BackendKind::Xtts => "xtts",
            BackendKind::Gtts => "gtts",
            BackendKind::Espeak => "espeak",
            BackendKind::Say => "say",
        }
    }

    /// Check the backend's runtime dependency and build an engine for it
    pub fn detect(self, config: &Config) -> Result<Box<dyn Engine>> {
        let command = config.engine_command(self.id());
        Ok(match self {
            BackendKind::Xtts => Box::new(xtts::XttsEngine::new(command, config.xtts_model())?),
            BackendKind::Gtts => Box::new(gtts::GttsEngine::new(command)?),
            BackendKind::Espeak => Box::new(espeak::EspeakEngine::new(command)?),
            BackendKind::Say => Box::new(say::SayEngine::new(command)?),
        })
    }
}

/// Candidate executables: the config override alone, or the defaults
fn candidates<'a>(configured: &'a Option<String>, defaults: &[&'a str]) -> Vec<&'a str> {
    match configured {
        Some(path) => vec![path.as_str()],
        None => defaults.to_vec(),
    }
}

/// Run a backend command to completion and classify its failure
///
/// Failures whose diagnostics mention the speaker reference are reported as
/// `VoiceReferenceRejected`; everything else is an `EngineFailure`.
fn run_engine_command(engine: &str, cmd: &mut Command) -> Result<()> {
    debug!("[{}] running {:?}", engine, cmd);

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| VoxError::EngineFailure {
            engine: engine.to_string(),
            message: format!("failed to start: {}", e),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let diagnostics = last_lines(if stderr.trim().is_empty() { &stdout } else { &stderr }, 3);
    let message = format!("{} ({})", output.status, diagnostics);
    error!("[{}] synthesis failed: {}", engine, message);

    if mentions_speaker_reference(&stderr) || mentions_speaker_reference(&stdout) {
        Err(VoxError::VoiceReferenceRejected {
            engine: engine.to_string(),
            message,
        })
    } else {
        Err(VoxError::EngineFailure {
            engine: engine.to_string(),
            message,
        })
    }
}

fn mentions_speaker_reference(text: &str) -> bool {
    text.contains("speaker_wav")
}

/// Last `n` non-empty lines of a diagnostic stream, joined
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_candidates() {
        let configured = Some("/opt/espeak-ng".to_string());
        assert_eq!(candidates(&configured, &["espeak-ng"]), vec!["/opt/espeak-ng"]);
        assert_eq!(
            candidates(&None, &["espeak-ng", "espeak"]),
            vec!["espeak-ng", "espeak"]
        );
    }

    #[test]
    fn test_last_lines() {
        let text = "Traceback\n  File x\n\nValueError: boom\n";
        assert_eq!(last_lines(text, 2), "  File x | ValueError: boom");
        assert_eq!(last_lines("", 3), "");
    }

    #[test]
    fn test_missing_program_is_engine_failure() {
        let mut cmd = Command::new("voxbatch-definitely-not-installed");
        let err = run_engine_command("ghost", &mut cmd).unwrap_err();
        assert!(matches!(err, VoxError::EngineFailure { ref engine, .. } if engine == "ghost"));
    }

    #[test]
    fn test_speaker_reference_detection() {
        assert!(mentions_speaker_reference(
            "ValueError: Model is multi-speaker but no `speaker_wav` provided"
        ));
        assert!(!mentions_speaker_reference("CUDA out of memory"));
    }

    #[test]
    fn test_ids_unique() {
        let ids: HashSet<&str> = BackendKind::ALL.iter().map(|k| k.id()).collect();
        assert_eq!(ids.len(), BackendKind::ALL.len());
    }
}
