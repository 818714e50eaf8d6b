//! Language negotiation
//!
//! Engines speak different language sets. Before every engine call the
//! requested language is mapped onto one the engine actually supports:
//!
//! 1. supported as-is → unchanged
//! 2. regional variant of a supported base ("en-us" → "en")
//! 3. closely related supported language from [`RELATED_LANGUAGES`]
//! 4. [`DEFAULT_LANGUAGE`], or the engine's first language if even that fails
//!
//! Anything past step 1 changes what the listener hears, so it is logged
//! and returned to the caller as a [`LanguageChoice`].

use crate::engine::EngineDescriptor;
use log::warn;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Language used when nothing better is known
pub const DEFAULT_LANGUAGE: &str = "en";

/// Related languages to try, nearest first
pub static RELATED_LANGUAGES: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        // East Slavic
        m.insert("uk", &["ru", "be", "pl"]);
        m.insert("be", &["ru", "uk", "pl"]);
        m.insert("rue", &["uk", "ru", "sk"]);
        // West Slavic
        m.insert("sk", &["cs", "pl"]);
        m.insert("cs", &["sk", "pl"]);
        m.insert("pl", &["cs", "sk"]);
        m.insert("csb", &["pl"]);
        m.insert("hsb", &["cs", "pl"]);
        // South Slavic
        m.insert("bs", &["hr", "sr"]);
        m.insert("hr", &["bs", "sr", "sl"]);
        m.insert("sr", &["hr", "bs"]);
        m.insert("sl", &["hr"]);
        m.insert("mk", &["bg", "sr"]);
        m.insert("bg", &["mk", "ru"]);
        // Others
        m.insert("ca", &["es", "fr"]);
        m.insert("gl", &["pt", "es"]);
        m.insert("nb", &["no", "da", "sv"]);
        m.insert("nn", &["no", "nb", "da"]);
        m.insert("no", &["nb", "da", "sv"]);
        m.insert("zh", &["zh-cn", "cmn"]);
        m.insert("zh-tw", &["zh-cn", "cmn"]);
        m.insert("cmn", &["zh-cn", "zh"]);
        m.insert("yue", &["zh-cn", "cmn"]);
        m
    });

/// Letters that only occur in Ukrainian Cyrillic
const UKRAINIAN_LETTERS: &str = "іїєґ";

/// Letters that occur in Russian but not in Ukrainian
const RUSSIAN_LETTERS: &str = "ыэъё";

/// How a language was chosen for an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Requested language is supported
    Exact,
    /// Regional variant reduced to its base language
    Base,
    /// Substituted with a related language
    Related,
    /// Nothing related was supported
    Default,
}

/// Result of negotiating a language with one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageChoice {
    pub requested: String,
    pub resolved: String,
    pub engine: String,
    pub resolution: Resolution,
}

impl LanguageChoice {
    pub fn code(&self) -> &str {
        &self.resolved
    }

    /// Whether the engine will speak something other than what was asked
    pub fn is_substitution(&self) -> bool {
        self.resolution != Resolution::Exact
    }
}

/// Lowercase and use `-` as the region separator ("en_US" → "en-us")
pub fn normalize(code: &str) -> String {
    code.trim().to_lowercase().replace('_', "-")
}

/// Map `desired` onto a language `engine` supports
pub fn resolve(desired: &str, engine: &EngineDescriptor) -> LanguageChoice {
    let requested = normalize(desired);
    let (resolved, resolution) = pick(&requested, engine);

    let choice = LanguageChoice {
        requested,
        resolved,
        engine: engine.id.clone(),
        resolution,
    };

    if choice.is_substitution() {
        warn!(
            "Language '{}' is not supported by {}, using '{}' ({:?})",
            choice.requested, choice.engine, choice.resolved, choice.resolution
        );
    }

    choice
}

fn pick(requested: &str, engine: &EngineDescriptor) -> (String, Resolution) {
    if engine.supports_language(requested) {
        return (requested.to_string(), Resolution::Exact);
    }

    let base = requested.split('-').next().unwrap_or(requested);
    if base != requested && engine.supports_language(base) {
        return (base.to_string(), Resolution::Base);
    }

    let related = RELATED_LANGUAGES
        .get(requested)
        .or_else(|| RELATED_LANGUAGES.get(base));
    if let Some(candidates) = related {
        if let Some(lang) = candidates.iter().find(|l| engine.supports_language(l)) {
            return (lang.to_string(), Resolution::Related);
        }
    }

    if engine.supports_language(DEFAULT_LANGUAGE) || engine.supported_languages.is_empty() {
        return (DEFAULT_LANGUAGE.to_string(), Resolution::Default);
    }

    (engine.supported_languages[0].clone(), Resolution::Default)
}

/// Guess a language from the script of `text`
///
/// Cyrillic-dominant text is Ukrainian unless it only shows letters
/// specific to Russian; Latin-dominant text is English. Anything else,
/// including text without letters, gets [`DEFAULT_LANGUAGE`].
pub fn detect_script_language(text: &str) -> String {
    let mut cyrillic = 0usize;
    let mut latin = 0usize;
    let mut ukrainian = false;
    let mut russian = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        if ('\u{0400}'..='\u{04FF}').contains(&ch) {
            cyrillic += 1;
            ukrainian |= UKRAINIAN_LETTERS.contains(ch);
            russian |= RUSSIAN_LETTERS.contains(ch);
        } else if ch.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&ch) {
            latin += 1;
        }
    }

    if cyrillic > latin {
        if russian && !ukrainian {
            "ru".to_string()
        } else {
            "uk".to_string()
        }
    } else if latin > cyrillic {
        "en".to_string()
    } else {
        DEFAULT_LANGUAGE.to_string()
    }
}
