//! Audio format conversion
//!
//! Used to turn voice references into a format the cloning engine reads
//! and to bring engine output into the requested output format. The actual
//! transcoding is done by ffmpeg.

use crate::platform::find_executable;
use crate::{Result, VoxError};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Converts audio files between formats
pub trait AudioConverter {
    /// Convert `input` into `output`; the output extension selects the format
    fn convert_to(&self, input: &Path, output: &Path) -> Result<()>;

    /// Convert `input` to `format`, returning the path of the new file
    ///
    /// The output is written next to the input with the extension replaced.
    fn convert(&self, input: &Path, format: &str) -> Result<PathBuf> {
        let output = converted_path(input, format)?;
        self.convert_to(input, &output)?;
        Ok(output)
    }
}

/// ffmpeg based converter
pub struct FfmpegConverter {
    ffmpeg_path: String,
}

impl FfmpegConverter {
    /// Verify ffmpeg is available
    pub fn new() -> Result<Self> {
        let ffmpeg_path = find_executable(&["ffmpeg"], &["-version"]).ok_or_else(|| {
            VoxError::Conversion(
                "ffmpeg not found. Install with: sudo apt install ffmpeg (or brew install ffmpeg)"
                    .to_string(),
            )
        })?;
        debug!("Found ffmpeg at: {}", ffmpeg_path);
        Ok(Self { ffmpeg_path })
    }
}

impl AudioConverter for FfmpegConverter {
    fn convert_to(&self, input: &Path, output: &Path) -> Result<()> {
        debug!("Converting {:?} -> {:?}", input, output);

        let status = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| VoxError::Conversion(format!("failed to run ffmpeg: {}", e)))?;

        if !status.success() {
            return Err(VoxError::Conversion(format!(
                "ffmpeg could not convert {} to {}: {}",
                input.display(),
                output.display(),
                status
            )));
        }

        Ok(())
    }
}

/// Where a conversion of `input` to `format` is written
pub fn converted_path(input: &Path, format: &str) -> Result<PathBuf> {
    if !input.exists() {
        return Err(VoxError::Conversion(format!(
            "input file not found: {}",
            input.display()
        )));
    }
    let output = input.with_extension(format);
    if output == input {
        return Err(VoxError::Conversion(format!(
            "{} is already {}",
            input.display(),
            format
        )));
    }
    Ok(output)
}

/// Locate a converter backend
pub fn find_converter() -> Result<Box<dyn AudioConverter>> {
    let converter = FfmpegConverter::new()?;
    info!("✓ Audio conversion available via ffmpeg");
    Ok(Box::new(converter))
}

/// Lowercased extension of `path`, empty if there is none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converted_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("speaker.ogg");
        std::fs::write(&input, b"OggS").unwrap();

        let output = converted_path(&input, "wav").unwrap();
        assert_eq!(output, dir.path().join("speaker.wav"));

        assert!(matches!(
            converted_path(&input, "ogg"),
            Err(VoxError::Conversion(_))
        ));
        assert!(matches!(
            converted_path(&dir.path().join("missing.ogg"), "wav"),
            Err(VoxError::Conversion(_))
        ));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a/b/Voice.OGG")), "ogg");
        assert_eq!(extension_of(Path::new("noext")), "");
    }
}
