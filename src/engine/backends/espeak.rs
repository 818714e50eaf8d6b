//! espeak-ng backend
//!
//! Fully offline formant synthesizer. Robotic, but it is installed almost
//! everywhere and covers most languages, which makes it the usual last
//! resort on Linux.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use super::{candidates, run_engine_command};
use crate::engine::{Engine, EngineCall, EngineDescriptor, EngineTier};
use crate::platform::find_executable;
use crate::{Result, VoxError};
use log::debug;
use std::path::Path;
use std::process::Command;

/// espeak-ng default speaking rate in words per minute
const DEFAULT_WPM: f32 = 175.0;

pub const ESPEAK_LANGUAGES: &[&str] = &[
    "en", "uk", "ru", "be", "pl", "cs", "sk", "bg", "hr", "sr", "bs", "sl", "mk", "de", "fr",
    "es", "it", "pt", "nl", "da", "sv", "nb", "fi", "et", "lv", "lt", "hu", "ro", "el", "tr",
    "ka", "hy", "ar", "he", "fa", "hi", "bn", "ur", "ta", "te", "ml", "kn", "ne", "vi", "id",
    "ms", "ja", "ko", "cmn", "yue", "ca", "eu", "gl", "is", "ga", "cy", "af", "sw", "sq", "eo",
    "la", "kk", "ky", "uz",
];

pub struct EspeakEngine {
    descriptor: EngineDescriptor,

    /// Path to espeak-ng
    espeak_path: String,
}

impl EspeakEngine {
    /// Create a new espeak-ng engine
    ///
    /// Verifies espeak-ng is available
    pub fn new(command: Option<String>) -> Result<Self> {
        debug!("Creating espeak-ng backend");

        let espeak_path = find_executable(
            &candidates(&command, &["espeak-ng", "/usr/bin/espeak-ng", "espeak"]),
            &["--version"],
        )
        .ok_or_else(|| VoxError::EngineFailure {
            engine: "espeak".to_string(),
            message: "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        })?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            descriptor: EngineDescriptor::new("espeak", EngineTier::Offline, "wav")
                .with_languages(ESPEAK_LANGUAGES),
            espeak_path,
        })
    }

    /// Convert a speed multiplier to espeak words per minute (80-450)
    fn speed_to_wpm(speed: f32) -> u16 {
        (DEFAULT_WPM * speed).round().clamp(80.0, 450.0) as u16
    }

    fn build_command(&self, call: &EngineCall<'_>, output: &Path) -> Command {
        let mut cmd = Command::new(&self.espeak_path);
        cmd.arg("-v").arg(call.language);
        cmd.arg("-s").arg(Self::speed_to_wpm(call.speed).to_string());
        cmd.arg("-w").arg(output);
        cmd.arg("--").arg(call.text);
        cmd
    }
}

impl Engine for EspeakEngine {
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

    #[test]
    fn test_speed_to_wpm() {
        assert_eq!(EspeakEngine::speed_to_wpm(1.0), 175);
        assert_eq!(EspeakEngine::speed_to_wpm(0.5), 88);
        assert_eq!(EspeakEngine::speed_to_wpm(2.0), 350);
        assert_eq!(EspeakEngine::speed_to_wpm(0.1), 80);
        assert_eq!(EspeakEngine::speed_to_wpm(5.0), 450);
    }

    #[test]
    fn test_command() {
        let engine = EspeakEngine {
            descriptor: EngineDescriptor::new("espeak", EngineTier::Offline, "wav"),
            espeak_path: "espeak-ng".to_string(),
        };
        let call = EngineCall {
            text: "Привіт",
            language: "uk",
            speed: 1.0,
            voice_reference: None,
        };
        let cmd = engine.build_command(&call, Path::new("/tmp/a.wav"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-v", "uk", "-s", "175", "-w", "/tmp/a.wav", "--", "Привіт"]
        );
    }
}
