//! XTTS voice cloning backend
//!
//! Drives the Coqui TTS command line tool (`pip install TTS`) with a
//! multilingual XTTS model. This is the only backend that can clone a
//! voice from a reference recording. XTTS has no built-in speaker, so a
//! plain synthesis call without a reference is rejected by the model; the
//! dispatcher then retries on a non-cloning engine.

use super::{candidates, run_engine_command};
use crate::engine::{Engine, EngineCall, EngineDescriptor, EngineTier};
use crate::platform::find_executable;
use crate::{Result, VoxError};
use log::debug;
use std::path::Path;
use std::process::Command;

/// Languages the XTTS v2 model was trained on
pub const XTTS_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "hu", "ko",
    "ja", "hi",
];

pub struct XttsEngine {
    descriptor: EngineDescriptor,

    /// Path to the `tts` executable
    tts_path: String,

    /// Model name passed with `--model_name`
    model: String,
}

impl XttsEngine {
    /// Create a new XTTS engine
    ///
    /// Verifies the Coqui CLI can be run
    pub fn new(command: Option<String>, model: String) -> Result<Self> {
        debug!("Creating XTTS backend with model {}", model);

        let tts_path = find_executable(&candidates(&command, &["tts"]), &["--help"])
            .ok_or_else(|| {
                VoxError::EngineFailure {
                    engine: "xtts".to_string(),
                    message: "Coqui TTS not found. Install with: pip install TTS".to_string(),
                }
            })?;
        debug!("Found Coqui TTS at: {}", tts_path);

        let descriptor = EngineDescriptor::new("xtts", EngineTier::Cloning, "wav")
            .with_cloning(&["wav"])
            .with_languages(XTTS_LANGUAGES);

        Ok(Self {
            descriptor,
            tts_path,
            model,
        })
    }

    fn build_command(&self, call: &EngineCall<'_>, output: &Path) -> Command {
        let mut cmd = Command::new(&self.tts_path);
        cmd.arg("--model_name").arg(&self.model);
        cmd.arg("--text").arg(call.text);
        cmd.arg("--language_idx").arg(call.language);
        cmd.arg("--out_path").arg(output);
        if let Some(reference) = call.voice_reference {
            cmd.arg("--speaker_wav").arg(reference);
        }
        cmd
    }
}

impl Engine for XttsEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn synthesize(&mut self, call: &EngineCall<'_>, output: &Path) -> Result<()> {
        if (call.speed - 1.0).abs() > f32::EPSILON {
            // The CLI has no speed flag, the model renders at its natural pace
            debug!("XTTS CLI ignores speed {:.2}", call.speed);
        }
        let mut cmd = self.build_command(call, output);
        run_engine_command(&self.descriptor.id, &mut cmd)
    }
}
