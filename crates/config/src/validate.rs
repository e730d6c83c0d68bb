//! Configuration validation.
//!
//! Checks syntax, flags unknown (usually misspelled) keys, and reports
//! settings that parse but cannot work, such as a non-WebSocket service URL.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::schema::{LocatorKind, TryonConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "unknown-field", "type-error", "service", "cache", "extractor"
    pub category: &'static str,
    /// Dotted path, e.g. "service.url"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Known keys ───────────────────────────────────────────────────────────────

const TOP_LEVEL_KEYS: &[&str] = &["service", "cache", "extractor"];
const SERVICE_KEYS: &[&str] = &["url", "connect_timeout_secs"];
const CACHE_KEYS: &[&str] = &["backend", "ttl_hours", "path"];
const EXTRACTOR_KEYS: &[&str] = &["locators", "timeout_secs", "user_agent"];
const LOCATOR_KEYS: &[&str] = &["kind", "value"];

fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    match section {
        "service" => Some(SERVICE_KEYS),
        "cache" => Some(CACHE_KEYS),
        "extractor" => Some(EXTRACTOR_KEYS),
        _ => None,
    }
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn unknown_key(path: String, key: &str, known: &[&str]) -> Diagnostic {
    let message = match suggest(key, known, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".to_string(),
    };
    Diagnostic::new(Severity::Error, "unknown-field", path, message)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered config file
/// when `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "syntax",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|ext| ext == "toml");

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) if is_toml => validate_toml_str(&crate::env_subst::substitute_env(&content)),
        Ok(_) => match crate::loader::load_config(&actual_path) {
            Ok(config) => {
                let mut diagnostics = Vec::new();
                check_semantics(&config, &mut diagnostics);
                ValidationResult {
                    diagnostics,
                    config_path: None,
                }
            },
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "type-error",
                    "",
                    e.to_string(),
                )],
                config_path: None,
            },
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without touching the filesystem.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &mut diagnostics);

    match toml::from_str::<TryonConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(value: &toml::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_table() else {
        return;
    };
    for (section, body) in root {
        let Some(known) = section_keys(section) else {
            diagnostics.push(unknown_key(section.clone(), section, TOP_LEVEL_KEYS));
            continue;
        };
        let Some(table) = body.as_table() else {
            continue;
        };
        for (key, child) in table {
            let path = format!("{section}.{key}");
            if !known.contains(&key.as_str()) {
                diagnostics.push(unknown_key(path, key, known));
                continue;
            }
            if section == "extractor"
                && key == "locators"
                && let Some(items) = child.as_array()
            {
                for (i, item) in items.iter().enumerate() {
                    let Some(fields) = item.as_table() else {
                        continue;
                    };
                    for field in fields.keys() {
                        if !LOCATOR_KEYS.contains(&field.as_str()) {
                            diagnostics.push(unknown_key(
                                format!("{path}[{i}].{field}"),
                                field,
                                LOCATOR_KEYS,
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn check_semantics(config: &TryonConfig, diagnostics: &mut Vec<Diagnostic>) {
    match url::Url::parse(&config.service.url) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {},
        Ok(url) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "service",
            "service.url",
            format!("scheme must be ws or wss, got {}", url.scheme()),
        )),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "service",
            "service.url",
            format!("invalid URL: {e}"),
        )),
    }

    if config.service.connect_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "service",
            "service.connect_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.cache.ttl_hours == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "cache",
            "cache.ttl_hours",
            "a zero TTL expires the reference image as soon as the clock ticks",
        ));
    }

    if config.cache.ttl_hours.checked_mul(60 * 60 * 1_000).is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "cache",
            "cache.ttl_hours",
            "value is too large to represent and is treated as never expiring",
        ));
    }

    if config.extractor.locators.is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "extractor",
            "extractor.locators",
            "at least one locator is required",
        ));
    }

    let mut seen: HashSet<(LocatorKind, &str)> = HashSet::new();
    for (i, locator) in config.extractor.locators.iter().enumerate() {
        let value = locator.value.trim();
        let path = format!("extractor.locators[{i}]");
        if value.is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "extractor",
                path,
                "locator value is empty",
            ));
        } else if locator.kind == LocatorKind::Id && value.contains(char::is_whitespace) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "extractor",
                path,
                "element ids cannot contain whitespace; this locator never matches",
            ));
        } else if !seen.insert((locator.kind, value)) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "extractor",
                path,
                format!("duplicate {} locator \"{value}\"", locator.kind),
            ));
        }
    }
}
