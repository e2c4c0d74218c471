//! Configuration validation engine.
//!
//! Validates configuration files against the known schema, detects
//! unknown/misspelled fields, and reports semantic problems that would only
//! surface at runtime (zero batch sizes, bad cron expressions, ...).

use std::{collections::HashMap, path::Path};

use crate::{
    env_subst::substitute_env,
    loader::find_config_file,
    schema::{CourierConfig, EmailProviderKind},
};

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
    /// Category: "syntax", "unknown-field", "type-error", "value"
    pub category: &'static str,
    /// Dotted path, e.g. "queue.batch_size"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Parse a 5-field (min hour dom month dow) or 6/7-field cron expression.
///
/// The `cron` crate wants seconds first and an optional year, so 5-field
/// expressions are padded with a leading `0` and a trailing `*`.
pub fn parse_cron(expr: &str) -> Result<cron::Schedule, cron::error::Error> {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed} *").parse()
    } else {
        trimmed.parse()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let leaves = |keys: &[&'static str]| Struct(keys.iter().map(|k| (*k, Leaf)).collect());

    Struct(HashMap::from([
        ("server", leaves(&["bind", "port", "api_token", "app_secret"])),
        ("database", leaves(&["url", "max_connections"])),
        (
            "queue",
            leaves(&[
                "batch_size",
                "concurrency",
                "deadline_secs",
                "max_retries",
                "stale_claim_secs",
            ]),
        ),
        (
            "platforms",
            Struct(HashMap::from([
                ("request_timeout_secs", Leaf),
                ("whatsapp", leaves(&["api_base", "api_version"])),
                (
                    "instagram",
                    leaves(&["api_base", "fallback_api_base", "api_version"]),
                ),
            ])),
        ),
        (
            "email",
            Struct(HashMap::from([
                ("provider", Leaf),
                ("resend", leaves(&["api_base"])),
                (
                    "smtp",
                    leaves(&["host", "port", "username", "password", "use_tls"]),
                ),
            ])),
        ),
        (
            "triggers",
            leaves(&[
                "timezone",
                "birthday_jitter_minutes",
                "inactive_jitter_hours",
                "default_inactive_days",
                "promotion_settle_secs",
                "promotion_immediate_delay_secs",
                "promotion_spacing_secs",
                "insert_batch_size",
                "welcome_delay_secs",
            ]),
        ),
        ("inbound", leaves(&["debounce_secs", "dedup_ttl_secs"])),
        ("responder", leaves(&["base_url", "timeout_secs"])),
        ("schedule", leaves(&["enabled", "queue", "daily_checks"])),
        ("metrics", leaves(&["enabled", "prometheus_endpoint"])),
    ]))
}

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

/// Validate the config file at `path`, or the discovered one.
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);
    let Some(ref p) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found, defaults apply".into(),
            }],
            config_path: None,
        };
    };

    let mut result = match std::fs::read_to_string(p) {
        Ok(raw) => validate_toml_str(&substitute_env(&raw)),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "file-ref",
                path: String::new(),
                message: format!("failed to read {}: {e}", p.display()),
            }],
            config_path: None,
        },
    };
    result.config_path = config_path;
    result
}

/// Validate raw TOML text.
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: e.to_string(),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<CourierConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: e.to_string(),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (KnownKeys::Struct(fields), toml::Value::Table(table)) = (schema, value) else {
        return;
    };
    let known: Vec<&str> = fields.keys().copied().collect();

    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match fields.get(key.as_str()) {
            Some(child_schema) => check_unknown_fields(child, child_schema, &path, diagnostics),
            None => {
                let message = match suggest(key, &known, 3) {
                    Some(s) => format!("unknown field \"{key}\" (did you mean \"{s}\"?)"),
                    None => format!("unknown field \"{key}\""),
                };
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    category: "unknown-field",
                    path,
                    message,
                });
            },
        }
    }
}

/// Semantic checks on a parsed config. Also used at startup.
pub fn check_semantics(config: &CourierConfig, diagnostics: &mut Vec<Diagnostic>) {
    let mut error = |path: &str, message: String| {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "value",
            path: path.to_string(),
            message,
        });
    };

    if config.queue.batch_size == 0 {
        error("queue.batch_size", "batch_size must be greater than 0".into());
    }
    if config.queue.concurrency == 0 {
        error("queue.concurrency", "concurrency must be greater than 0".into());
    }
    if config.queue.max_retries == 0 {
        error(
            "queue.max_retries",
            "max_retries must be greater than 0".into(),
        );
    }
    if config.triggers.insert_batch_size == 0 {
        error(
            "triggers.insert_batch_size",
            "insert_batch_size must be greater than 0".into(),
        );
    }
    if config.triggers.timezone.parse::<chrono_tz::Tz>().is_err() {
        error(
            "triggers.timezone",
            format!("unknown timezone \"{}\"", config.triggers.timezone),
        );
    }
    for (path, expr) in [
        ("schedule.queue", &config.schedule.queue),
        ("schedule.daily_checks", &config.schedule.daily_checks),
    ] {
        if let Err(e) = parse_cron(expr) {
            error(path, format!("invalid cron expression \"{expr}\": {e}"));
        }
    }
    if config.email.provider == EmailProviderKind::Smtp
        && config
            .email
            .smtp
            .host
            .as_deref()
            .is_none_or(|h| h.trim().is_empty())
    {
        error(
            "email.smtp.host",
            "smtp provider selected but no host configured".into(),
        );
    }

    if config.queue.concurrency as u64 > u64::from(config.queue.batch_size) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "value",
            path: "queue.concurrency".into(),
            message: "concurrency exceeds batch_size; chunks will never be full".into(),
        });
    }
    if config.server.api_token.is_none() && config.server.bind != "127.0.0.1" {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "security",
            path: "server.api_token".into(),
            message: "trigger endpoints are unauthenticated on a non-loopback address".into(),
        });
    }
}
