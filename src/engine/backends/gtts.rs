//! Google Text-to-Speech backend
//!
//! Uses `gtts-cli` (`pip install gTTS`), which sends the text to Google's
//! translate TTS service and writes MP3. Needs network access. The service
//! only knows normal and slow speech, so speed is mapped onto that switch.

use super::{candidates, run_engine_command};
use crate::engine::{Engine, EngineCall, EngineDescriptor, EngineTier};
use crate::platform::find_executable;
use crate::{Result, VoxError};
use log::debug;
use std::path::Path;
use std::process::Command;

/// Speeds at or below this use the slow voice
const SLOW_THRESHOLD: f32 = 0.75;

pub const GTTS_LANGUAGES: &[&str] = &[
    "en", "uk", "ru", "pl", "cs", "sk", "bg", "hr", "sr", "bs", "mk", "de", "fr", "es", "it",
    "pt", "nl", "da", "sv", "no", "fi", "et", "lv", "lt", "hu", "ro", "el", "tr", "ar", "he",
    "hi", "bn", "ur", "ta", "te", "ml", "kn", "gu", "mr", "ne", "si", "th", "vi", "id", "ms",
    "tl", "jw", "su", "km", "my", "ja", "ko", "zh-cn", "zh-tw", "ca", "gl", "eu", "is", "cy",
    "af", "sw", "sq", "hy", "la", "eo",
];

pub struct GttsEngine {
    descriptor: EngineDescriptor,

    /// Path to `gtts-cli`
    gtts_path: String,
}

impl GttsEngine {
    /// Create a new Google TTS engine
    ///
    /// Only checks that the CLI runs; network problems surface per call.
    pub fn new(command: Option<String>) -> Result<Self> {
        debug!("Creating gTTS backend");

        let gtts_path = find_executable(&candidates(&command, &["gtts-cli"]), &["--version"])
            .ok_or_else(|| VoxError::EngineFailure {
                engine: "gtts".to_string(),
                message: "gtts-cli not found. Install with: pip install gTTS".to_string(),
            })?;
        debug!("Found gtts-cli at: {}", gtts_path);

        Ok(Self {
            descriptor: EngineDescriptor::new("gtts", EngineTier::Cloud, "mp3")
                .with_languages(GTTS_LANGUAGES),
            gtts_path,
        })
    }

    fn build_command(&self, call: &EngineCall<'_>, output: &Path) -> Command {
        let mut cmd = Command::new(&self.gtts_path);
        cmd.arg("--lang").arg(call.language);
        cmd.arg("--output").arg(output);
        if call.speed <= SLOW_THRESHOLD {
            cmd.arg("--slow");
        }
        // Text last, after `--` so leading dashes are not parsed as flags
        cmd.arg("--").arg(call.text);
        cmd
    }
}

impl Engine for GttsEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn synthesize(&mut self, call: &EngineCall<'_>, output: &Path) -> Result<()> {
        let mut cmd = self.build_command(call, output);
        run_engine_command(&self.descriptor.id, &mut cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GttsEngine {
        GttsEngine {
            descriptor: EngineDescriptor::new("gtts", EngineTier::Cloud, "mp3")
                .with_languages(GTTS_LANGUAGES),
            gtts_path: "gtts-cli".to_string(),
        }
    }

    fn call(speed: f32) -> EngineCall<'static> {
        EngineCall {
            text: "- leading dash",
            language: "uk",
            speed,
            voice_reference: None,
        }
    }

    #[test]
    fn test_slow_switch() {
        let engine = engine();
        let slow = engine.build_command(&call(0.6), Path::new("a.mp3"));
        assert!(slow.get_args().any(|a| a == "--slow"));

        let normal = engine.build_command(&call(1.0), Path::new("a.mp3"));
        assert!(!normal.get_args().any(|a| a == "--slow"));
    }

    #[test]
    fn test_text_after_separator() {
        let cmd = engine().build_command(&call(1.0), Path::new("a.mp3"));
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args[args.len() - 1], "- leading dash");
    }

    #[test]
    fn test_plain_tts_only() {
        let engine = engine();
        assert!(!engine.descriptor().can_clone());
        assert_eq!(engine.descriptor().native_format, "mp3");
        assert!(engine.descriptor().supports_language("uk"));
    }
}
