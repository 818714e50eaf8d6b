//! macOS `say` backend
//!
//! System speech synthesis. Languages come from the installed voices
//! (`say -v ?`); each call picks the first voice matching the language.

use super::{candidates, run_engine_command};
use crate::engine::{Engine, EngineCall, EngineDescriptor, EngineTier};
use crate::platform::{find_executable, is_macos};
use crate::{Result, VoxError};
use log::debug;
use std::path::Path;
use std::process::Command;

/// `say` default rate in words per minute
const DEFAULT_WPM: f32 = 175.0;

/// An installed system voice
#[derive(Debug, Clone, PartialEq)]
struct Voice {
    name: String,
    /// Base language code ("en" for "en_US")
    language: String,
}

pub struct SayEngine {
    descriptor: EngineDescriptor,
    say_path: String,
    voices: Vec<Voice>,
}

impl SayEngine {
    /// Create a new `say` engine
    ///
    /// Only available on macOS with at least one installed voice.
    pub fn new(command: Option<String>) -> Result<Self> {
        debug!("Creating say backend");

        let unavailable = |message: &str| VoxError::EngineFailure {
            engine: "say".to_string(),
            message: message.to_string(),
        };

        if !is_macos() && command.is_none() {
            return Err(unavailable("say is only available on macOS"));
        }

        let say_path = find_executable(&candidates(&command, &["say", "/usr/bin/say"]), &["-v", "?"])
            .ok_or_else(|| unavailable("say command not found"))?;

        let output = Command::new(&say_path)
            .arg("-v")
            .arg("?")
            .output()
            .map_err(|e| unavailable(&format!("failed to list voices: {}", e)))?;
        let voices = Self::parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        if voices.is_empty() {
            return Err(unavailable("no system voices installed"));
        }
        debug!("say has {} voices", voices.len());

        let mut languages: Vec<&str> = Vec::new();
        for voice in &voices {
            if !languages.contains(&voice.language.as_str()) {
                languages.push(&voice.language);
            }
        }

        Ok(Self {
            descriptor: EngineDescriptor::new("say", EngineTier::System, "aiff")
                .with_languages(&languages),
            say_path,
            voices,
        })
    }

    /// Parse voice list output from `say -v ?`
    ///
    /// Format: "Name    language  # description", names may contain spaces.
    fn parse_voice_list(output: &str) -> Vec<Voice> {
        output
            .lines()
            .filter_map(|line| {
                let head = line.split('#').next()?.trim_end();
                let (name, locale) = head.rsplit_once(char::is_whitespace)?;
                let name = name.trim();
                let language = locale.split(['_', '-']).next()?.to_lowercase();
                if name.is_empty() || language.is_empty() {
                    return None;
                }
                Some(Voice {
                    name: name.to_string(),
                    language,
                })
            })
            .collect()
    }

    fn voice_for(&self, language: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.language == language)
    }

    fn build_command(&self, call: &EngineCall<'_>, output: &Path) -> Command {
        let mut cmd = Command::new(&self.say_path);
        if let Some(voice) = self.voice_for(call.language) {
            cmd.arg("-v").arg(&voice.name);
        }
        let wpm = (DEFAULT_WPM * call.speed).round() as u32;
        cmd.arg("-r").arg(wpm.to_string());
        cmd.arg("-o").arg(output);
        cmd.arg("--").arg(call.text);
        cmd
    }
}

impl Engine for SayEngine {
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

    const VOICES: &str = r#"Alex                en_US    # Most people recognize me by my voice.
Daniel              en_GB    # Hello, my name is Daniel. I am a British-English voice.
Milena              ru_RU    # Здравствуйте, меня зовут Милена.
Grandma (German (Germany)) de_DE    # Hallo! Ich heiße Grandma.
"#;

    #[test]
    fn test_parse_voice_list() {
        let voices = SayEngine::parse_voice_list(VOICES);
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[0].name, "Alex");
        assert_eq!(voices[0].language, "en");
        assert_eq!(voices[2].language, "ru");
        assert_eq!(voices[3].name, "Grandma (German (Germany))");
        assert_eq!(voices[3].language, "de");
    }

    #[test]
    fn test_voice_selection() {
        let engine = SayEngine {
            descriptor: EngineDescriptor::new("say", EngineTier::System, "aiff"),
            say_path: "say".to_string(),
            voices: SayEngine::parse_voice_list(VOICES),
        };
        let call = EngineCall {
            text: "Привет",
            language: "ru",
            speed: 1.2,
            voice_reference: None,
        };
        let cmd = engine.build_command(&call, Path::new("out.aiff"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[..4], ["-v", "Milena", "-r", "210"]);
    }
}
