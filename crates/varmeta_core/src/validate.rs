//! Structural validation results and shared field validators.
//!
//! # Responsibility
//! - Carry field-scoped errors and warnings produced before any write.
//! - Provide the shared name/language checks used by every entity validator.
//!
//! # Invariants
//! - A result is valid exactly when its error list is empty.
//! - Warnings are advisory and never block a write.
//! - Issue order follows the order checks were performed in.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One field-scoped validation finding.
///
/// `field` uses dotted/indexed paths (`categories[0].name`) so nested
/// findings stay addressable to the exact offending sub-item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

/// Outcome of validating one entity payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    /// True when no errors were recorded. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn into_errors(self) -> Vec<ValidationIssue> {
        self.errors
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() && self.warnings.is_empty() {
            return write!(f, "Valid");
        }

        let mut lines = Vec::new();
        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            for issue in &self.errors {
                lines.push(format!("  {}: {}", issue.field, issue.message));
            }
        }
        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            for issue in &self.warnings {
                lines.push(format!("  {}: {}", issue.field, issue.message));
            }
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Checks a bare-identifier entity name: lowercase ASCII letters, digits and
/// underscores, not starting with a digit, with at least one letter.
pub fn validate_identifier(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return false;
    }
    name.chars().any(|c| c.is_ascii_lowercase())
}

/// Returns whether the value looks like a two-letter ISO 639 language code.
pub fn is_language_code(language: &str) -> bool {
    language.len() == 2 && language.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parsed `language:text` / `language:purpose:text` label shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    pub language: String,
    pub purpose: Option<String>,
    pub text: String,
}

/// Parses the label shorthand used by front-end collaborators.
///
/// Returns `None` when the value has no `:` separator at all.
pub fn parse_label_spec(spec: &str) -> Option<LabelSpec> {
    let parts: Vec<&str> = spec.splitn(3, ':').collect();
    match parts.as_slice() {
        [language, text] => Some(LabelSpec {
            language: (*language).to_string(),
            purpose: None,
            text: (*text).to_string(),
        }),
        [language, purpose, text] => Some(LabelSpec {
            language: (*language).to_string(),
            purpose: Some((*purpose).to_string()),
            text: (*text).to_string(),
        }),
        _ => None,
    }
}
