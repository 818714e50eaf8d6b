//! Batch processing
//!
//! Feeds a sequence of items through the dispatcher, one at a time and in
//! input order. A failing item is recorded and the batch moves on; only
//! problems with the output directory stop a run before it starts.

use crate::config::Config;
use crate::dispatch::{OutcomeStatus, SynthesisDispatcher, SynthesisRequest};
use crate::error::FailureKind;
use crate::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Characters of source text kept in failure reports and progress lines
pub const EXCERPT_CHARS: usize = 30;

/// Per-record settings that replace the batch defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemOverrides {
    pub language: Option<String>,
    pub speed: Option<f32>,
}

/// One input record
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    /// Position in the input, used for the output file name
    pub index: usize,
    pub text: String,
    pub overrides: ItemOverrides,
}

impl BatchItem {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            overrides: ItemOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ItemOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Blank items are skipped, not failed
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Number a list of plain strings
pub fn items_from_texts<I, S>(texts: I) -> Vec<BatchItem>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| BatchItem::new(index, text))
        .collect()
}

/// Settings shared by every item of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct SharedParams {
    pub output_dir: PathBuf,
    pub file_prefix: String,
    /// Reference recording; set means every item is cloned
    pub voice_reference: Option<PathBuf>,
    /// Default language, detected per item when `None`
    pub language: Option<String>,
    pub speed: f32,
}

impl SharedParams {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: "audio".to_string(),
            voice_reference: None,
            language: None,
            speed: 1.0,
        }
    }

    /// Batch defaults from the configuration file
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir(),
            file_prefix: config.file_prefix(),
            voice_reference: None,
            language: config.language(),
            speed: config.speed(),
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

    pub fn with_file_prefix(mut self, prefix: &str) -> Self {
        self.file_prefix = prefix.to_string();
        self
    }

    /// Output path without extension for the item at `index`
    pub fn output_stem(&self, index: usize) -> PathBuf {
        self.output_dir.join(output_file_stem(&self.file_prefix, index))
    }

    fn request_for(&self, item: &BatchItem) -> SynthesisRequest {
        SynthesisRequest::new(item.text.trim(), self.output_stem(item.index))
            .with_voice_reference(self.voice_reference.clone())
            .with_language(
                item.overrides
                    .language
                    .clone()
                    .or_else(|| self.language.clone()),
            )
            .with_speed(item.overrides.speed.unwrap_or(self.speed))
    }
}

/// Zero-padded file stem, e.g. `audio_0007`
pub fn output_file_stem(prefix: &str, index: usize) -> String {
    format!("{}_{:04}", prefix, index)
}

/// First [`EXCERPT_CHARS`] characters of `text`
pub fn excerpt(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// An item that did not produce audio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub excerpt: String,
    pub kind: FailureKind,
    pub message: String,
}

/// An item rendered as plain synthesis although cloning was requested
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedItem {
    pub index: usize,
    pub output_path: PathBuf,
    pub reason: FailureKind,
}

/// A language change made for an item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageSubstitution {
    pub index: usize,
    pub engine: String,
    pub requested: String,
    pub used: String,
}

/// Aggregate result of a batch
///
/// Every input item is counted exactly once: as a success, a failure,
/// a skipped blank, or as not attempted after a stop request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub successes: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
    /// Indices of blank items
    pub skipped: Vec<usize>,
    pub degraded: Vec<DegradedItem>,
    pub substitutions: Vec<LanguageSubstitution>,
    pub not_attempted: usize,
}

impl BatchReport {
    /// Items that went through the dispatcher
    pub fn processed(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// False when the batch was stopped early
    pub fn is_complete(&self) -> bool {
        self.not_attempted == 0
    }

    /// Human readable summary for terminal output
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Done! Succeeded: {}, failed: {}, skipped: {}",
            self.successes.len(),
            self.failures.len(),
            self.skipped.len()
        );
        if self.not_attempted > 0 {
            out.push_str(&format!(", not attempted: {}", self.not_attempted));
        }
        for failure in &self.failures {
            out.push_str(&format!(
                "\n  ✗ Item {} [{}]: {} ({})",
                failure.index, failure.kind, failure.excerpt, failure.message
            ));
        }
        for item in &self.degraded {
            out.push_str(&format!(
                "\n  ⚠ Item {}: {} is plain synthesis, not a cloned voice ({})",
                item.index,
                item.output_path.display(),
                item.reason
            ));
        }
        for sub in &self.substitutions {
            out.push_str(&format!(
                "\n  ⚠ Item {}: language '{}' spoken as '{}' by {}",
                sub.index, sub.requested, sub.used, sub.engine
            ));
        }
        out
    }
}

/// Runs batches through a dispatcher
pub struct BatchRunner<'a> {
    dispatcher: &'a mut SynthesisDispatcher,
    stop: Option<&'a AtomicBool>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(dispatcher: &'a mut SynthesisDispatcher) -> Self {
        Self {
            dispatcher,
            stop: None,
        }
    }

    /// Stop between items once `flag` is set
    pub fn with_stop_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.stop = Some(flag);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop.map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Process `items` in order
    ///
    /// Fails only if the output directory cannot be created.
    pub fn run(&mut self, items: &[BatchItem], shared: &SharedParams) -> Result<BatchReport> {
        ensure_dir(&shared.output_dir)?;

        let total = items.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        info!(
            "Starting batch of {} items into {}",
            total,
            shared.output_dir.display()
        );

        for (position, item) in items.iter().enumerate() {
            if self.stop_requested() {
                report.not_attempted = total - position;
                warn!(
                    "Stop requested, {} items left unprocessed",
                    report.not_attempted
                );
                break;
            }

            if item.is_blank() {
                info!("Skipping blank item {}", item.index);
                report.skipped.push(item.index);
                continue;
            }

            info!(
                "Processing {}/{}: {}",
                position + 1,
                total,
                excerpt(&item.text)
            );

            let request = shared.request_for(item);
            let outcome = self.dispatcher.dispatch(&request);

            for choice in outcome.substitutions() {
                report.substitutions.push(LanguageSubstitution {
                    index: item.index,
                    engine: choice.engine.clone(),
                    requested: choice.requested.clone(),
                    used: choice.resolved.clone(),
                });
            }

            match &outcome.status {
                OutcomeStatus::Success {
                    output_path,
                    degraded,
                    ..
                } => {
                    if let Some(degradation) = degraded {
                        report.degraded.push(DegradedItem {
                            index: item.index,
                            output_path: output_path.clone(),
                            reason: degradation.reason,
                        });
                    }
                    info!("✅ Saved {}", output_path.display());
                    report.successes.push(output_path.clone());
                }
                OutcomeStatus::Failed { reason, message } => {
                    warn!("❌ Item {} failed [{}]: {}", item.index, reason, message);
                    report.failures.push(BatchFailure {
                        index: item.index,
                        excerpt: excerpt(&item.text),
                        kind: *reason,
                        message: message.clone(),
                    });
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            report.successes.len(),
            report.failures.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

/// Create the output directory if needed
fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        info!("Creating output directory {}", dir.display());
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_stem() {
        assert_eq!(output_file_stem("audio", 0), "audio_0000");
        assert_eq!(output_file_stem("audio", 42), "audio_0042");
        assert_eq!(output_file_stem("take", 12345), "take_12345");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("  short  "), "short");
        let long = "Штучний інтелект змінює наш світ кожного дня.";
        let cut = excerpt(long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_request_inherits_and_overrides() {
        let shared = SharedParams::new("out")
            .with_language(Some("en".to_string()))
            .with_speed(1.2);

        let plain = BatchItem::new(3, " Hello ");
        let request = shared.request_for(&plain);
        assert_eq!(request.text, "Hello");
        assert_eq!(request.language.as_deref(), Some("en"));
        assert_eq!(request.speed, 1.2);
        assert_eq!(request.output_stem, PathBuf::from("out").join("audio_0003"));

        let custom = BatchItem::new(4, "Привіт").with_overrides(ItemOverrides {
            language: Some("uk".to_string()),
            speed: Some(0.8),
        });
        let request = shared.request_for(&custom);
        assert_eq!(request.language.as_deref(), Some("uk"));
        assert_eq!(request.speed, 0.8);
    }

    #[test]
    fn test_items_from_texts() {
        let items = items_from_texts(["a", "", "c"]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].index, 2);
        assert!(items[1].is_blank());
    }

    #[test]
    fn test_summary_mentions_failures() {
        let report = BatchReport {
            total: 2,
            successes: vec![PathBuf::from("out/audio_0000.wav")],
            failures: vec![BatchFailure {
                index: 1,
                excerpt: "Hello".to_string(),
                kind: FailureKind::EmptyOutput,
                message: "0 bytes".to_string(),
            }],
            ..BatchReport::default()
        };
        let summary = report.summary();
        assert!(summary.contains("Succeeded: 1, failed: 1"));
        assert!(summary.contains("Item 1 [EmptyOutput]: Hello"));
    }
}
