//! Pure validation for the registration form
//!
//! Every rule is checked independently (no short-circuit) so callers can
//! surface all field errors in one pass.

use crate::domain::types::VisitorInput;
use std::collections::BTreeMap;
use thiserror::Error;

/// Form fields, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Name,
    MobilePhone,
    Pincode,
    City,
    Email,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::MobilePhone => "mobile_phone",
            Field::Pincode => "pincode",
            Field::City => "city",
            Field::Email => "email",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldReason {
    #[error("required")]
    Required,
    #[error("blank")]
    Blank,
    #[error("format")]
    Format,
}

/// Result of validating one form: empty `field_errors` means valid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub field_errors: BTreeMap<Field, FieldReason>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }

    /// Human-readable message for a field error
    pub fn message(field: Field, reason: FieldReason) -> String {
        match (field, reason) {
            (Field::Name, FieldReason::Required) => "Name is required".to_string(),
            (Field::Name, FieldReason::Blank) => {
                "Name cannot be empty or just spaces".to_string()
            }
            (Field::MobilePhone, FieldReason::Required) => {
                "Mobile number is required".to_string()
            }
            (Field::MobilePhone, FieldReason::Format) => {
                "Enter a valid 10-digit number".to_string()
            }
            (Field::Pincode, FieldReason::Required) => "Pincode is required".to_string(),
            (Field::Pincode, FieldReason::Format) => {
                "Enter a valid 6-digit pincode".to_string()
            }
            (Field::City, FieldReason::Required) => "City is required".to_string(),
            (Field::City, FieldReason::Blank) => {
                "City cannot be empty or just spaces".to_string()
            }
            (Field::Email, FieldReason::Required) => "Email is required".to_string(),
            (Field::Email, FieldReason::Format) => "Enter a valid email".to_string(),
            (field, reason) => format!("{field}: {reason}"),
        }
    }
}

/// True when `s` is exactly `len` ASCII digits
fn is_fixed_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Minimal `local@domain.tld` shape: one `@`, a `.` somewhere after it,
/// no whitespace anywhere
fn is_email_shape(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some(at) = s.find('@') else {
        return false;
    };
    if at == 0 {
        return false;
    }
    let domain = &s[at + 1..];
    match domain.find('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

fn check_text(errors: &mut BTreeMap<Field, FieldReason>, field: Field, value: &str) {
    if value.is_empty() {
        errors.insert(field, FieldReason::Required);
    } else if value.trim().is_empty() {
        errors.insert(field, FieldReason::Blank);
    }
}

fn check_digits(
    errors: &mut BTreeMap<Field, FieldReason>,
    field: Field,
    value: &str,
    len: usize,
) {
    if value.is_empty() {
        errors.insert(field, FieldReason::Required);
    } else if !is_fixed_digits(value, len) {
        errors.insert(field, FieldReason::Format);
    }
}

/// Validate a registration form. Pure and deterministic; no side effects.
pub fn validate(input: &VisitorInput) -> ValidationReport {
    let mut errors = BTreeMap::new();

    check_text(&mut errors, Field::Name, &input.name);
    check_digits(&mut errors, Field::MobilePhone, &input.mobile_phone, 10);
    check_digits(&mut errors, Field::Pincode, &input.pincode, 6);
    check_text(&mut errors, Field::City, &input.city);

    if input.email.is_empty() {
        errors.insert(Field::Email, FieldReason::Required);
    } else if !is_email_shape(input.email.trim()) {
        errors.insert(Field::Email, FieldReason::Format);
    }

    ValidationReport { field_errors: errors }
}
