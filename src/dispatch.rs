//! Synthesis dispatcher
//!
//! Runs one request through a small state machine:
//!
//! ```text
//! INIT → LANGUAGE_RESOLVED → ENGINE_SELECTED → ATTEMPTING_PRIMARY
//!      → (SUCCESS | ATTEMPTING_FALLBACK) → (SUCCESS | FAILED)
//! ```
//!
//! At most one fallback engine is tried per request. A failure caused by
//! the voice reference (missing, unconvertible, rejected by the model)
//! falls back to a non-cloning engine only; the result is then plain
//! synthesis and is reported as degraded, never as a clone.

use crate::audio::{extension_of, AudioConverter};
use crate::config::{Config, DEFAULT_MIN_OUTPUT_BYTES};
use crate::engine::{EngineCall, EngineRegistry};
use crate::error::FailureKind;
use crate::language::{detect_script_language, resolve, LanguageChoice};
use crate::{Result, VoxError};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Slowest allowed speed multiplier
pub const MIN_SPEED: f32 = 0.5;
/// Fastest allowed speed multiplier
pub const MAX_SPEED: f32 = 2.0;

/// Clamp a speed multiplier into [`MIN_SPEED`, `MAX_SPEED`]
///
/// NaN is treated as normal speed.
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        1.0
    } else {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

/// `stem` with `.format` appended (the stem may itself contain dots)
pub fn output_path(stem: &Path, format: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(format);
    PathBuf::from(name)
}

/// One text to synthesize
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    /// Reference recording; present means voice cloning is requested
    pub voice_reference: Option<PathBuf>,
    /// Requested language, detected from the text when `None`
    pub language: Option<String>,
    pub speed: f32,
    /// Output path without extension
    pub output_stem: PathBuf,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, output_stem: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            voice_reference: None,
            language: None,
            speed: 1.0,
            output_stem: output_stem.into(),
        }
    }

    pub fn with_voice_reference(mut self, path: Option<PathBuf>) -> Self {
        self.voice_reference = path;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn is_cloning(&self) -> bool {
        self.voice_reference.is_some()
    }
}

/// States visited while dispatching a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Init,
    LanguageResolved,
    EngineSelected,
    AttemptingPrimary,
    AttemptingFallback,
    Success,
    Failed,
}

/// Why a cloning request produced plain synthesis instead
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub reason: FailureKind,
    pub message: String,
}

/// Terminal state of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success {
        output_path: PathBuf,
        engine_used: String,
        bytes: u64,
        /// Set when cloning was requested but the audio is not a clone
        degraded: Option<Degradation>,
    },
    Failed {
        reason: FailureKind,
        message: String,
    },
}

/// Result of dispatching one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisOutcome {
    pub status: OutcomeStatus,
    /// Language negotiated for every engine that was tried
    pub languages: Vec<LanguageChoice>,
    pub trace: Vec<DispatchState>,
    /// Speed actually passed to engines
    pub speed: f32,
}

impl SynthesisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match &self.status {
            OutcomeStatus::Success { output_path, .. } => Some(output_path),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn engine_used(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Success { engine_used, .. } => Some(engine_used),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureKind> {
        match &self.status {
            OutcomeStatus::Failed { reason, .. } => Some(*reason),
            OutcomeStatus::Success { .. } => None,
        }
    }

    pub fn degradation(&self) -> Option<&Degradation> {
        match &self.status {
            OutcomeStatus::Success { degraded, .. } => degraded.as_ref(),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    /// Language choices that changed the requested language
    pub fn substitutions(&self) -> impl Iterator<Item = &LanguageChoice> {
        self.languages.iter().filter(|c| c.is_substitution())
    }
}

/// Bookkeeping for a request in flight
struct Run {
    trace: Vec<DispatchState>,
    languages: Vec<LanguageChoice>,
    speed: f32,
}

impl Run {
    fn enter(&mut self, state: DispatchState) {
        debug!("dispatch: {:?}", state);
        self.trace.push(state);
    }

    fn succeed(
        mut self,
        output_path: PathBuf,
        engine_used: String,
        bytes: u64,
        degraded: Option<Degradation>,
    ) -> SynthesisOutcome {
        self.enter(DispatchState::Success);
        SynthesisOutcome {
            status: OutcomeStatus::Success {
                output_path,
                engine_used,
                bytes,
                degraded,
            },
            languages: self.languages,
            trace: self.trace,
            speed: self.speed,
        }
    }

    fn fail(self, error: &VoxError) -> SynthesisOutcome {
        self.fail_with(error.kind(), error.to_string())
    }

    fn fail_with(mut self, reason: FailureKind, message: String) -> SynthesisOutcome {
        self.enter(DispatchState::Failed);
        SynthesisOutcome {
            status: OutcomeStatus::Failed { reason, message },
            languages: self.languages,
            trace: self.trace,
            speed: self.speed,
        }
    }
}

/// Routes requests to engines, with language negotiation and fallback
pub struct SynthesisDispatcher {
    registry: EngineRegistry,
    converter: Option<Box<dyn AudioConverter>>,
    output_format: String,
    min_output_bytes: u64,
    /// Converted voice references, keyed by the original path
    prepared_references: HashMap<PathBuf, PathBuf>,
    /// Scratch directory holding converted references, created on first use
    reference_dir: Option<TempDir>,
}

impl SynthesisDispatcher {
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            registry,
            converter: None,
            output_format: "wav".to_string(),
            min_output_bytes: DEFAULT_MIN_OUTPUT_BYTES,
            prepared_references: HashMap::new(),
            reference_dir: None,
        }
    }

    /// Dispatcher using the output settings from `config`
    pub fn from_config(registry: EngineRegistry, config: &Config) -> Self {
        Self::new(registry)
            .with_output_format(&config.output_format())
            .with_min_output_bytes(config.min_output_bytes())
    }

    pub fn with_converter(mut self, converter: Option<Box<dyn AudioConverter>>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_output_format(mut self, format: &str) -> Self {
        self.output_format = format.trim_start_matches('.').to_lowercase();
        self
    }

    pub fn with_min_output_bytes(mut self, bytes: u64) -> Self {
        self.min_output_bytes = bytes;
        self
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn output_format(&self) -> &str {
        &self.output_format
    }

    /// Synthesize one request
    ///
    /// Never returns an error: every failure ends up in the outcome.
    pub fn dispatch(&mut self, request: &SynthesisRequest) -> SynthesisOutcome {
        let mut run = Run {
            trace: Vec::new(),
            languages: Vec::new(),
            speed: clamp_speed(request.speed),
        };
        run.enter(DispatchState::Init);

        let text = request.text.trim();
        if text.is_empty() {
            return run.fail(&VoxError::InvalidInput("text is empty".to_string()));
        }

        if run.speed != request.speed {
            warn!(
                "Speed {} out of range, clamped to {}",
                request.speed, run.speed
            );
        }

        let desired = match &request.language {
            Some(lang) => lang.clone(),
            None => {
                let detected = detect_script_language(text);
                debug!("No language given, detected '{}' from script", detected);
                detected
            }
        };

        let primary = if request.is_cloning() {
            match self.registry.cloning_primary() {
                Ok(rank) => rank,
                Err(e) => {
                    warn!("{}", e);
                    return run.fail(&e);
                }
            }
        } else {
            0
        };

        // A reference that cannot be used skips the primary attempt
        let mut reference = None;
        let primary_error = match &request.voice_reference {
            Some(path) => match self.prepare_reference(path, primary) {
                Ok(prepared) => {
                    reference = Some(prepared);
                    None
                }
                Err(e) => {
                    warn!("Cannot clone voice: {}", e);
                    Some(e)
                }
            },
            None => None,
        };

        let primary_error = match primary_error {
            Some(e) => e,
            None => {
                let choice = resolve(&desired, self.registry.descriptor(primary));
                let language = choice.resolved.clone();
                run.languages.push(choice);
                run.enter(DispatchState::LanguageResolved);

                run.enter(DispatchState::EngineSelected);
                info!(
                    "Synthesizing with {} (language {}, speed {:.2}{})",
                    self.registry.descriptor(primary).id,
                    language,
                    run.speed,
                    if reference.is_some() { ", cloning" } else { "" }
                );

                run.enter(DispatchState::AttemptingPrimary);
                let call = EngineCall {
                    text,
                    language: &language,
                    speed: run.speed,
                    voice_reference: reference.as_deref(),
                };
                match self.attempt(primary, &call, &request.output_stem) {
                    Ok((path, bytes)) => {
                        let engine = self.registry.descriptor(primary).id.clone();
                        return run.succeed(path, engine, bytes, None);
                    }
                    Err(e) => {
                        warn!("Primary engine failed: {}", e);
                        e
                    }
                }
            }
        };

        self.fall_back(run, request, text, &desired, primary, reference.as_deref(), primary_error)
    }

    /// Single fallback attempt after the primary engine failed
    #[allow(clippy::too_many_arguments)]
    fn fall_back(
        &mut self,
        mut run: Run,
        request: &SynthesisRequest,
        text: &str,
        desired: &str,
        primary: usize,
        reference: Option<&Path>,
        primary_error: VoxError,
    ) -> SynthesisOutcome {
        run.enter(DispatchState::AttemptingFallback);

        let plain_only = primary_error.kind().is_voice_reference();
        let rank = match self.registry.next_fallback(&[primary], plain_only) {
            Some(rank) => rank,
            None => {
                warn!("No fallback engine available");
                return run.fail_with(
                    failure_kind(&primary_error, request),
                    primary_error.to_string(),
                );
            }
        };

        let descriptor = self.registry.descriptor(rank);
        let engine_id = descriptor.id.clone();
        let clones = !plain_only && descriptor.can_clone() && reference.is_some();
        let choice = resolve(desired, descriptor);
        let language = choice.resolved.clone();
        run.languages.push(choice);

        info!(
            "🔄 Falling back to {} (language {}{})",
            engine_id,
            language,
            if clones { ", cloning" } else { "" }
        );

        let call = EngineCall {
            text,
            language: &language,
            speed: run.speed,
            voice_reference: if clones { reference } else { None },
        };

        match self.attempt(rank, &call, &request.output_stem) {
            Ok((path, bytes)) => {
                let degraded = (request.is_cloning() && !clones).then(|| {
                    warn!(
                        "⚠️ {} is plain synthesis by {}, not a cloned voice ({})",
                        path.display(),
                        engine_id,
                        primary_error
                    );
                    Degradation {
                        reason: failure_kind(&primary_error, request),
                        message: primary_error.to_string(),
                    }
                });
                run.succeed(path, engine_id, bytes, degraded)
            }
            Err(e) => {
                warn!("Fallback engine {} also failed: {}", engine_id, e);
                run.fail_with(
                    failure_kind(&primary_error, request),
                    format!("{}; fallback {} failed: {}", primary_error, engine_id, e),
                )
            }
        }
    }

    /// Make sure the voice reference exists in a format the engine reads
    fn prepare_reference(&mut self, path: &Path, rank: usize) -> Result<PathBuf> {
        if !path.is_file() {
            return Err(VoxError::MissingVoiceReference(path.to_path_buf()));
        }

        let descriptor = self.registry.descriptor(rank);
        if descriptor.accepts_reference(path) {
            return Ok(path.to_path_buf());
        }
        if let Some(prepared) = self.prepared_references.get(path) {
            return Ok(prepared.clone());
        }

        let format = descriptor
            .reference_formats
            .first()
            .cloned()
            .unwrap_or_else(|| "wav".to_string());
        let converter = self.converter.as_ref().ok_or_else(|| {
            VoxError::Conversion(format!(
                "{} must be converted to {} but no converter is available",
                path.display(),
                format
            ))
        })?;

        let scratch = match &self.reference_dir {
            Some(dir) => dir.path().to_path_buf(),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("voxbatch-references")
                    .tempdir()
                    .map_err(|e| {
                        VoxError::Conversion(format!("cannot create scratch directory: {}", e))
                    })?;
                let scratch = dir.path().to_path_buf();
                self.reference_dir = Some(dir);
                scratch
            }
        };
        let prepared = scratch.join(format!(
            "reference_{}.{}",
            self.prepared_references.len(),
            format
        ));

        info!(
            "Converting voice reference {} to {}",
            path.display(),
            prepared.display()
        );
        converter.convert_to(path, &prepared)?;
        self.prepared_references
            .insert(path.to_path_buf(), prepared.clone());
        Ok(prepared)
    }

    /// Run one engine and validate what it wrote
    fn attempt(
        &mut self,
        rank: usize,
        call: &EngineCall<'_>,
        stem: &Path,
    ) -> Result<(PathBuf, u64)> {
        let native = self.registry.descriptor(rank).native_format.clone();
        let raw = output_path(stem, &native);

        // A file left over from an earlier run must not pass the size check
        if raw.exists() {
            fs::remove_file(&raw)?;
        }

        let synthesized = self.registry.engine_mut(rank).synthesize(call, &raw);
        let written = synthesized.and_then(|()| self.check_output(&raw));
        match written {
            Ok(bytes) => Ok((self.finish_format(raw), bytes)),
            Err(e) => {
                // A failed attempt leaves nothing in the output directory
                if raw.exists() {
                    if let Err(remove_err) = fs::remove_file(&raw) {
                        warn!("Could not remove {}: {}", raw.display(), remove_err);
                    }
                }
                Err(e)
            }
        }
    }

    /// The one existence + size check after an engine reported success
    fn check_output(&self, path: &Path) -> Result<u64> {
        let bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if bytes < self.min_output_bytes {
            return Err(VoxError::EmptyOutput {
                path: path.to_path_buf(),
                bytes,
            });
        }
        debug!("{} written ({} bytes)", path.display(), bytes);
        Ok(bytes)
    }

    /// Convert engine output to the requested format when needed
    ///
    /// Conversion problems keep the native file rather than losing audio.
    fn finish_format(&self, raw: PathBuf) -> PathBuf {
        if extension_of(&raw) == self.output_format {
            return raw;
        }

        let converter = match &self.converter {
            Some(converter) => converter,
            None => {
                warn!(
                    "No converter available, keeping {} instead of .{}",
                    raw.display(),
                    self.output_format
                );
                return raw;
            }
        };

        match converter.convert(&raw, &self.output_format) {
            Ok(converted) => {
                if let Err(e) = fs::remove_file(&raw) {
                    debug!("Could not remove {}: {}", raw.display(), e);
                }
                converted
            }
            Err(e) => {
                warn!("Keeping {}: {}", raw.display(), e);
                raw
            }
        }
    }
}

/// Failure class of `error` as seen by the caller of `request`
///
/// An engine that insists on a voice reference rejects plain requests;
/// that is an engine limitation, not a problem with a reference the
/// caller never gave.
fn failure_kind(error: &VoxError, request: &SynthesisRequest) -> FailureKind {
    match error {
        VoxError::VoiceReferenceRejected { .. } if !request.is_cloning() => {
            FailureKind::EngineFailure
        }
        _ => error.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_speed() {
        assert_eq!(clamp_speed(0.1), MIN_SPEED);
        assert_eq!(clamp_speed(-3.0), MIN_SPEED);
        assert_eq!(clamp_speed(2.5), MAX_SPEED);
        assert_eq!(clamp_speed(f32::INFINITY), MAX_SPEED);
        assert_eq!(clamp_speed(f32::NAN), 1.0);
        for speed in [0.5, 0.8, 1.0, 1.3, 2.0] {
            assert_eq!(clamp_speed(speed), speed);
        }
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("out/audio_0003"), "wav"),
            PathBuf::from("out/audio_0003.wav")
        );
        assert_eq!(
            output_path(Path::new("out/take.v2_0001"), "mp3"),
            PathBuf::from("out/take.v2_0001.mp3")
        );
    }

    #[test]
    fn test_request_builder() {
        let request = SynthesisRequest::new("Hello", "out/audio_0000")
            .with_language(Some("en".to_string()))
            .with_speed(1.3);
        assert!(!request.is_cloning());
        assert_eq!(request.speed, 1.3);

        let request = request.with_voice_reference(Some(PathBuf::from("ref.wav")));
        assert!(request.is_cloning());
    }

    #[test]
    fn test_failure_kind_of_rejected_reference() {
        let rejected = VoxError::VoiceReferenceRejected {
            engine: "xtts".to_string(),
            message: "speaker_wav missing".to_string(),
        };
        let plain = SynthesisRequest::new("Hello", "out/a");
        let cloning = plain
            .clone()
            .with_voice_reference(Some(PathBuf::from("ref.wav")));

        assert_eq!(failure_kind(&rejected, &plain), FailureKind::EngineFailure);
        assert_eq!(
            failure_kind(&rejected, &cloning),
            FailureKind::MissingVoiceReference
        );
        let missing = VoxError::MissingVoiceReference(PathBuf::from("ref.wav"));
        assert_eq!(
            failure_kind(&missing, &cloning),
            FailureKind::MissingVoiceReference
        );
    }
}
