//! Scripted engines for dispatcher and batch tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use voxbatch::engine::{Engine, EngineCall, EngineDescriptor, EngineRegistry, EngineTier};
use voxbatch::{Result, VoxError};

/// What a mock engine does when called
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write this many bytes to the output file
    Write(usize),
    /// Fail every call
    Fail,
    /// Reject calls carrying a voice reference, write normally otherwise
    RejectReference(usize),
    /// Reject calls without a voice reference, write normally otherwise
    RequireReference(usize),
    /// Fail calls whose text contains the marker, write normally otherwise
    FailOn(String, usize),
}

/// One recorded engine invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub engine: String,
    pub text: String,
    pub language: String,
    pub speed: f32,
    pub voice_reference: Option<PathBuf>,
    pub output: PathBuf,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub struct MockEngine {
    descriptor: EngineDescriptor,
    behavior: Behavior,
    log: CallLog,
}

impl MockEngine {
    pub fn new(descriptor: EngineDescriptor, behavior: Behavior, log: &CallLog) -> Box<dyn Engine> {
        Box::new(Self {
            descriptor,
            behavior,
            log: Arc::clone(log),
        })
    }
}

impl Engine for MockEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn synthesize(&mut self, call: &EngineCall<'_>, output: &Path) -> Result<()> {
        self.log.lock().unwrap().push(Call {
            engine: self.descriptor.id.clone(),
            text: call.text.to_string(),
            language: call.language.to_string(),
            speed: call.speed,
            voice_reference: call.voice_reference.map(Path::to_path_buf),
            output: output.to_path_buf(),
        });

        let bytes = match &self.behavior {
            Behavior::Write(bytes) => *bytes,
            Behavior::Fail => {
                return Err(VoxError::EngineFailure {
                    engine: self.descriptor.id.clone(),
                    message: "model crashed".to_string(),
                })
            }
            Behavior::RejectReference(bytes) => {
                if call.voice_reference.is_some() {
                    return Err(VoxError::VoiceReferenceRejected {
                        engine: self.descriptor.id.clone(),
                        message: "speaker_wav could not be read".to_string(),
                    });
                }
                *bytes
            }
            Behavior::RequireReference(bytes) => {
                if call.voice_reference.is_none() {
                    return Err(VoxError::VoiceReferenceRejected {
                        engine: self.descriptor.id.clone(),
                        message: "model needs a speaker_wav".to_string(),
                    });
                }
                *bytes
            }
            Behavior::FailOn(marker, bytes) => {
                if call.text.contains(marker.as_str()) {
                    return Err(VoxError::EngineFailure {
                        engine: self.descriptor.id.clone(),
                        message: format!("cannot say '{}'", marker),
                    });
                }
                *bytes
            }
        };

        fs::write(output, vec![0u8; bytes])?;
        Ok(())
    }
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

/// Cloning engine with the XTTS language set (no Ukrainian)
pub fn cloner(id: &str) -> EngineDescriptor {
    EngineDescriptor::new(id, EngineTier::Cloning, "wav")
        .with_cloning(&["wav"])
        .with_languages(&[
            "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "hu",
            "ko", "ja", "hi",
        ])
}

/// Plain cloud engine that speaks Ukrainian
pub fn cloud(id: &str) -> EngineDescriptor {
    EngineDescriptor::new(id, EngineTier::Cloud, "wav").with_languages(&["en", "uk", "ru", "de"])
}

/// Plain offline engine
pub fn offline(id: &str) -> EngineDescriptor {
    EngineDescriptor::new(id, EngineTier::Offline, "wav").with_languages(&["en", "ru"])
}

/// Plain cloud engine writing MP3
pub fn mp3_cloud(id: &str) -> EngineDescriptor {
    EngineDescriptor::new(id, EngineTier::Cloud, "mp3").with_languages(&["en", "uk", "ru"])
}

pub fn registry(engines: Vec<Box<dyn Engine>>) -> EngineRegistry {
    EngineRegistry::from_engines(engines).unwrap()
}
