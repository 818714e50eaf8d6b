//! Engine discovery and ranking

use super::backends::BackendKind;
use super::{Engine, EngineDescriptor};
use crate::config::Config;
use crate::{Result, VoxError};
use log::{debug, info};

/// Ranked set of available engines
///
/// Built once at startup. Index 0 is the primary engine. Voice cloning
/// engines always rank above plain text-to-speech engines; inside a
/// capability class the descriptor priority decides, then discovery order.
pub struct EngineRegistry {
    engines: Vec<Box<dyn Engine>>,
}

impl EngineRegistry {
    /// Try every known backend and rank the ones that can run
    ///
    /// Tries, in order:
    /// 1. XTTS via the Coqui `tts` CLI (voice cloning)
    /// 2. Google TTS via `gtts-cli` (cloud)
    /// 3. espeak-ng (offline)
    /// 4. macOS `say` (system)
    ///
    /// Backends listed in `[engines] disabled` are skipped without probing.
    pub fn discover(config: &Config) -> Result<Self> {
        let mut engines: Vec<Box<dyn Engine>> = Vec::new();
        let mut tried = Vec::new();

        for kind in BackendKind::ALL {
            if !config.engine_enabled(kind.id()) {
                info!("Skipping {} backend (disabled in config)", kind.id());
                continue;
            }

            info!("Trying {} backend...", kind.id());
            tried.push(kind.id());
            match kind.detect(config) {
                Ok(engine) => {
                    info!("✓ Successfully initialized {} backend", kind.id());
                    engines.push(engine);
                }
                Err(e) => {
                    info!("✗ {} backend unavailable: {}", kind.id(), e);
                }
            }
        }

        if engines.is_empty() {
            return Err(VoxError::NoEngineAvailable(format!(
                "tried: {}. Install one of: Coqui TTS (pip install TTS), \
                 gTTS (pip install gTTS), espeak-ng (sudo apt install espeak-ng)",
                if tried.is_empty() {
                    "nothing, every backend is disabled".to_string()
                } else {
                    tried.join(", ")
                }
            )));
        }

        Self::from_engines(engines)
    }

    /// Rank caller-provided engines
    pub fn from_engines(mut engines: Vec<Box<dyn Engine>>) -> Result<Self> {
        if engines.is_empty() {
            return Err(VoxError::NoEngineAvailable(
                "no engines were registered".to_string(),
            ));
        }

        // Stable sort keeps discovery order for equal ranks
        engines.sort_by_key(|e| {
            let desc = e.descriptor();
            (!desc.can_clone(), desc.priority)
        });

        for (rank, engine) in engines.iter().enumerate() {
            let desc = engine.descriptor();
            debug!(
                "Engine #{}: {} (tier {:?}, priority {}, cloning: {}, {} languages)",
                rank,
                desc.id,
                desc.tier,
                desc.priority,
                desc.can_clone(),
                desc.supported_languages.len()
            );
        }

        Ok(Self { engines })
    }

    /// Number of available engines
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Always false for a constructed registry
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Descriptors in rank order
    pub fn descriptors(&self) -> impl Iterator<Item = &EngineDescriptor> {
        self.engines.iter().map(|e| e.descriptor())
    }

    /// Descriptor of the engine at `rank`
    pub fn descriptor(&self, rank: usize) -> &EngineDescriptor {
        self.engines[rank].descriptor()
    }

    /// Primary (highest ranked) engine
    pub fn primary(&self) -> &EngineDescriptor {
        self.descriptor(0)
    }

    /// Rank of the engine to use for a cloning request
    ///
    /// Cloning engines are always ranked first, so this is the primary or
    /// nothing at all.
    pub fn cloning_primary(&self) -> Result<usize> {
        if self.primary().can_clone() {
            Ok(0)
        } else {
            Err(VoxError::CloningUnsupported(self.primary().id.clone()))
        }
    }

    /// Next-ranked engine not yet attempted
    ///
    /// With `plain_only`, cloning-capable engines are passed over.
    pub fn next_fallback(&self, attempted: &[usize], plain_only: bool) -> Option<usize> {
        (0..self.engines.len()).find(|rank| {
            !attempted.contains(rank) && !(plain_only && self.descriptor(*rank).can_clone())
        })
    }

    pub(crate) fn engine_mut(&mut self, rank: usize) -> &mut dyn Engine {
        self.engines[rank].as_mut()
    }
}
