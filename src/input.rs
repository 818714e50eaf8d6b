//! Input loading
//!
//! Turns text files, CSV tables and JSON documents into numbered
//! [`BatchItem`]s. Records are never dropped here: a record without text
//! becomes a blank item so the batch report can account for it.

use crate::batch::{BatchItem, ItemOverrides};
use crate::{Result, VoxError};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Language codes accepted as per-record overrides ("uk", "en-US", "zh_cn")
static LANGUAGE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,3}([-_][A-Za-z0-9]{2,8})*$").unwrap());

/// Column / field carrying a per-record language
const LANGUAGE_FIELD: &str = "language";
/// Column / field carrying a per-record speed
const SPEED_FIELD: &str = "speed";

/// Layout of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One record per line
    Lines,
    /// Table with a header row
    Csv,
    /// Array of records, or a single record
    Json,
}

impl InputFormat {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Self {
        match crate::audio::extension_of(path).as_str() {
            "csv" => InputFormat::Csv,
            "json" => InputFormat::Json,
            _ => InputFormat::Lines,
        }
    }
}

impl FromStr for InputFormat {
    type Err = VoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lines" | "text" | "txt" => Ok(InputFormat::Lines),
            "csv" => Ok(InputFormat::Csv),
            "json" => Ok(InputFormat::Json),
            other => Err(VoxError::Input(format!(
                "unknown input format '{}' (expected lines, csv or json)",
                other
            ))),
        }
    }
}

/// Load batch items from `path`
///
/// `format` defaults to a guess from the extension. `text_field` names the
/// CSV column or JSON field holding the text.
pub fn load(path: &Path, format: Option<InputFormat>, text_field: &str) -> Result<Vec<BatchItem>> {
    let format = format.unwrap_or_else(|| InputFormat::from_path(path));
    debug!("Loading {:?} as {:?}", path, format);

    let content = fs::read_to_string(path)
        .map_err(|e| VoxError::Input(format!("cannot read {}: {}", path.display(), e)))?;

    let items = match format {
        InputFormat::Lines => parse_lines(&content),
        InputFormat::Csv => parse_csv(&content, text_field)?,
        InputFormat::Json => parse_json(&content, text_field)?,
    };

    info!("Loaded {} records from {}", items.len(), path.display());
    Ok(items)
}

/// One item per line, blank lines included
pub fn parse_lines(content: &str) -> Vec<BatchItem> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| BatchItem::new(index, line.trim()))
        .collect()
}

/// Items from a CSV table with a header row
///
/// Optional `language` and `speed` columns become per-row overrides.
pub fn parse_csv(content: &str, text_column: &str) -> Result<Vec<BatchItem>> {
    let mut records = parse_csv_records(content)?.into_iter();

    let header = records
        .next()
        .ok_or_else(|| VoxError::Input("CSV input is empty".to_string()))?;
    let column = |name: &str| header.iter().position(|h| h.trim() == name);

    let text_idx = column(text_column).ok_or_else(|| {
        VoxError::Input(format!(
            "column '{}' not found in CSV header ({})",
            text_column,
            header.join(", ")
        ))
    })?;
    let language_idx = column(LANGUAGE_FIELD);
    let speed_idx = column(SPEED_FIELD);

    let items = records
        .enumerate()
        .map(|(index, row)| {
            let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(|s| s.trim());
            let text = cell(Some(text_idx)).unwrap_or("");
            let overrides = ItemOverrides {
                language: cell(language_idx).and_then(|l| parse_language(index, l)),
                speed: cell(speed_idx).and_then(|s| parse_speed(index, s)),
            };
            BatchItem::new(index, text).with_overrides(overrides)
        })
        .collect();

    Ok(items)
}

/// Split CSV text into records
///
/// Handles quoted fields with embedded separators, doubled quotes and
/// line breaks. Completely empty lines are ignored.
fn parse_csv_records(content: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(VoxError::Input(
            "unterminated quoted field in CSV input".to_string(),
        ));
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// Items from a JSON array of records (or one record)
///
/// Records may be objects with `text_field` (plus optional `language` and
/// `speed`) or bare strings. Anything else becomes a blank item.
pub fn parse_json(content: &str, text_field: &str) -> Result<Vec<BatchItem>> {
    let value: Value = serde_json::from_str(content)?;
    let records = match value {
        Value::Array(records) => records,
        single => vec![single],
    };

    let items = records
        .iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::String(text) => BatchItem::new(index, text.trim()),
            Value::Object(fields) => {
                let text = match fields.get(text_field) {
                    Some(Value::String(s)) => s.trim().to_string(),
                    Some(Value::Null) | None => {
                        debug!("Record {} has no '{}' field", index, text_field);
                        String::new()
                    }
                    Some(other) => other.to_string(),
                };
                let overrides = ItemOverrides {
                    language: fields
                        .get(LANGUAGE_FIELD)
                        .and_then(Value::as_str)
                        .and_then(|l| parse_language(index, l)),
                    speed: fields.get(SPEED_FIELD).and_then(|s| match s {
                        Value::Number(n) => n.as_f64().map(|f| f as f32),
                        Value::String(s) => parse_speed(index, s),
                        _ => None,
                    }),
                };
                BatchItem::new(index, text).with_overrides(overrides)
            }
            other => {
                warn!("Record {} is not text or an object: {}", index, other);
                BatchItem::new(index, "")
            }
        })
        .collect();

    Ok(items)
}

fn parse_language(index: usize, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if LANGUAGE_CODE.is_match(value) {
        Some(value.to_string())
    } else {
        warn!(
            "Record {}: ignoring invalid language '{}', using batch default",
            index, value
        );
        None
    }
}

fn parse_speed(index: usize, value: &str) -> Option<f32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<f32>() {
        Ok(speed) if speed.is_finite() => Some(speed),
        _ => {
            warn!(
                "Record {}: ignoring invalid speed '{}', using batch default",
                index, value
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(InputFormat::from_path(Path::new("a.CSV")), InputFormat::Csv);
        assert_eq!(InputFormat::from_path(Path::new("a.json")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("a.txt")), InputFormat::Lines);
        assert_eq!("json".parse::<InputFormat>().unwrap(), InputFormat::Json);
        assert!("xml".parse::<InputFormat>().is_err());
    }

    #[test]
    fn test_parse_lines_keeps_blanks() {
        let items = parse_lines("first\n   \nthird\n");
        assert_eq!(items.len(), 3);
        assert!(items[1].is_blank());
        assert_eq!(items[2].text, "third");
        assert_eq!(items[2].index, 2);
    }

    #[test]
    fn test_parse_csv_quoting() {
        let content = "id,text,speed\n1,\"Hello, world\",1.5\n2,\"She said \"\"hi\"\"\",\n3,\"multi\nline\",fast\n";
        let items = parse_csv(content, "text").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].text, "Hello, world");
        assert_eq!(items[0].overrides.speed, Some(1.5));
        assert_eq!(items[1].text, "She said \"hi\"");
        assert_eq!(items[1].overrides.speed, None);
        assert_eq!(items[2].text, "multi\nline");
        assert_eq!(items[2].overrides.speed, None);
    }

    #[test]
    fn test_parse_csv_crlf_and_language() {
        let content = "\u{feff}text,language\r\nПривіт,uk\r\nHello,not a code\r\n,en\r\n";
        let items = parse_csv(content, "text").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].text, "Привіт");
        assert_eq!(items[0].overrides.language.as_deref(), Some("uk"));
        assert_eq!(items[1].overrides.language, None);
        assert!(items[2].is_blank());
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let err = parse_csv("sentence\nhello\n", "text").unwrap_err();
        assert!(matches!(err, VoxError::Input(_)));
        assert!(err.to_string().contains("'text'"));
    }

    #[test]
    fn test_parse_csv_unterminated_quote() {
        assert!(parse_csv("text\n\"oops\n", "text").is_err());
    }

    #[test]
    fn test_parse_json_records() {
        let content = r#"[
            {"text": "Hello", "id": 0},
            {"text": "Привіт", "language": "uk", "speed": 0.8},
            {"id": 2},
            "bare string",
            {"text": 42, "speed": "1.25"}
        ]"#;
        let items = parse_json(content, "text").unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].text, "Hello");
        assert_eq!(items[1].overrides.language.as_deref(), Some("uk"));
        assert_eq!(items[1].overrides.speed, Some(0.8));
        assert!(items[2].is_blank());
        assert_eq!(items[3].text, "bare string");
        assert_eq!(items[4].text, "42");
        assert_eq!(items[4].overrides.speed, Some(1.25));
    }

    #[test]
    fn test_parse_json_single_object() {
        let items = parse_json(r#"{"sentence": "Only one"}"#, "sentence").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Only one");
    }

    #[test]
    fn test_parse_json_invalid() {
        assert!(matches!(parse_json("[1,", "text"), Err(VoxError::Json(_))));
    }
}
