//! Synthesis engines
//!
//! Every backend is described by an [`EngineDescriptor`] (what it can do,
//! which languages it speaks, how it ranks) and driven through the
//! [`Engine`] trait. Routing decisions only ever look at descriptors.

pub mod backends;
pub mod registry;

pub use registry::EngineRegistry;

use crate::audio::extension_of;
use crate::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Something an engine can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TextToSpeech,
    VoiceCloning,
}

/// Static priority class of an engine
///
/// Declaration order is ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineTier {
    /// Neural model conditioned on a reference recording
    Cloning,
    /// Network synthesis service
    Cloud,
    /// Local synthesizer binary
    Offline,
    /// Speech synthesis shipped with the operating system
    System,
}

impl EngineTier {
    /// Default priority for engines of this tier (lower = preferred)
    pub fn priority(self) -> u32 {
        match self {
            EngineTier::Cloning => 0,
            EngineTier::Cloud => 10,
            EngineTier::Offline => 20,
            EngineTier::System => 30,
        }
    }
}

/// Immutable description of an available engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineDescriptor {
    /// Stable identifier ("xtts", "gtts", ...)
    pub id: String,
    pub capabilities: BTreeSet<Capability>,
    /// Supported language codes, in the engine's preferred order
    pub supported_languages: Vec<String>,
    pub tier: EngineTier,
    /// Lower is preferred within a capability tier
    pub priority: u32,
    /// Extension of the files the engine writes
    pub native_format: String,
    /// Voice reference formats the engine reads directly
    pub reference_formats: Vec<String>,
}

impl EngineDescriptor {
    /// Create a plain text-to-speech descriptor
    pub fn new(id: &str, tier: EngineTier, native_format: &str) -> Self {
        let mut capabilities = BTreeSet::new();
        capabilities.insert(Capability::TextToSpeech);
        Self {
            id: id.to_string(),
            capabilities,
            supported_languages: Vec::new(),
            tier,
            priority: tier.priority(),
            native_format: native_format.to_string(),
            reference_formats: Vec::new(),
        }
    }

    /// Mark the engine as able to clone voices from the given reference formats
    pub fn with_cloning(mut self, reference_formats: &[&str]) -> Self {
        self.capabilities.insert(Capability::VoiceCloning);
        self.reference_formats = reference_formats.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_languages<S: AsRef<str>>(mut self, languages: &[S]) -> Self {
        self.supported_languages = languages
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn can_clone(&self) -> bool {
        self.has(Capability::VoiceCloning)
    }

    pub fn supports_language(&self, code: &str) -> bool {
        self.supported_languages.iter().any(|l| l == code)
    }

    /// Whether a voice reference at `path` can be handed over unconverted
    pub fn accepts_reference(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        self.reference_formats.iter().any(|f| *f == ext)
    }
}

/// Fully resolved parameters for a single engine invocation
#[derive(Debug, Clone, Copy)]
pub struct EngineCall<'a> {
    pub text: &'a str,
    /// Language already negotiated for this engine
    pub language: &'a str,
    /// Speed multiplier, already clamped
    pub speed: f32,
    /// Reference recording when cloning, `None` for plain synthesis
    pub voice_reference: Option<&'a Path>,
}

/// Synthesis backend
///
/// Implementations write audio in their native format to `output` and
/// report failures as [`crate::VoxError`]. A rejected voice reference must be
/// reported as `VoxError::VoiceReferenceRejected` so the dispatcher can
/// retry without cloning.
pub trait Engine: Send {
    fn descriptor(&self) -> &EngineDescriptor;

    fn synthesize(&mut self, call: &EngineCall<'_>, output: &Path) -> Result<()>;
}
