//! Rule-table validation.
//!
//! Every rule reads "IF `applies_when` THEN `check` must hold". Rules are
//! folded over the whole record snapshot and their failures are unioned into
//! one [`ValidationErrors`] map keyed by field path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static US_TAX_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}-\d{7}$").unwrap());
static CA_BUSINESS_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{9}$").unwrap());
static US_ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());
static CA_POSTAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z]\d[a-z] ?\d[a-z]\d$").unwrap());
static FIELD_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").unwrap());

/// Field path -> first failing message for that path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` at `path` unless an earlier rule already failed there.
    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.entry(path.into()).or_insert_with(|| message.into());
    }

    #[cfg(test)]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    #[cfg(test)]
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (path, message) in other.0 {
            self.add(path, message);
        }
    }

    /// First error in path order, used for single-line toasts.
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub struct Rule<T> {
    pub step: u8,
    pub applies_when: fn(&T) -> bool,
    pub check: fn(&T) -> bool,
    pub field_path: &'static str,
    pub message: &'static str,
}

impl<T> Rule<T> {
    /// Rule that applies to every snapshot.
    pub fn always(
        step: u8,
        field_path: &'static str,
        check: fn(&T) -> bool,
        message: &'static str,
    ) -> Self {
        Self {
            step,
            applies_when: |_| true,
            check,
            field_path,
            message,
        }
    }

    pub fn when(
        step: u8,
        field_path: &'static str,
        applies_when: fn(&T) -> bool,
        check: fn(&T) -> bool,
        message: &'static str,
    ) -> Self {
        Self {
            step,
            applies_when,
            check,
            field_path,
            message,
        }
    }

    fn fails(&self, record: &T) -> bool {
        (self.applies_when)(record) && !(self.check)(record)
    }
}

pub struct RuleSet<T> {
    rules: Vec<Rule<T>>,
}

impl<T> RuleSet<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, record: &T) -> ValidationErrors {
        self.fold(record, |_| true)
    }

    pub fn validate_step(&self, record: &T, step: u8) -> ValidationErrors {
        self.fold(record, |rule| rule.step == step)
    }

    pub fn is_valid(&self, record: &T) -> bool {
        self.validate(record).is_empty()
    }

    pub fn steps(&self) -> Vec<u8> {
        let mut steps: Vec<u8> = self.rules.iter().map(|r| r.step).collect();
        steps.sort_unstable();
        steps.dedup();
        steps
    }

    fn fold(&self, record: &T, include: impl Fn(&Rule<T>) -> bool) -> ValidationErrors {
        self.rules
            .iter()
            .filter(|rule| include(rule))
            .filter(|rule| rule.fails(record))
            .fold(ValidationErrors::new(), |mut errors, rule| {
                errors.add(rule.field_path, rule.message);
                errors
            })
    }
}

pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// US employer identification number, `XX-XXXXXXX`.
pub fn is_us_tax_id(value: &str) -> bool {
    US_TAX_ID_RE.is_match(value.trim())
}

/// Canadian business number, exactly nine digits.
pub fn is_ca_business_number(value: &str) -> bool {
    CA_BUSINESS_NUMBER_RE.is_match(value.trim())
}

pub fn is_us_zip(value: &str) -> bool {
    US_ZIP_RE.is_match(value.trim())
}

pub fn is_ca_postal_code(value: &str) -> bool {
    CA_POSTAL_RE.is_match(value.trim())
}

/// International format: leading `+`, 11 to 17 digits, common separators allowed.
pub fn is_valid_phone(value: &str) -> bool {
    let trimmed = value.trim();
    let Some(rest) = trimmed.strip_prefix('+') else {
        return false;
    };
    if !rest
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.' | '(' | ')'))
    {
        return false;
    }
    let digits = rest.chars().filter(|c| c.is_ascii_digit()).count();
    (11..=17).contains(&digits)
}

pub fn is_valid_field_name(value: &str) -> bool {
    FIELD_NAME_RE.is_match(value)
}
