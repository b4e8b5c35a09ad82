use crate::errors::{KalenderError, KalenderResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SESSION_ID_PATTERN: Regex = Regex::new(r"^[a-zA-Z0-9_-]{1,128}$").unwrap();
    static ref ACCESS_CODE_PATTERN: Regex = Regex::new(r"^[a-zA-Z0-9æøåÆØÅ_-]{1,64}$").unwrap();
    static ref ID_PATTERN: Regex = Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").unwrap();
}

const MAX_NAME_LEN: usize = 64;
const MAX_NAME_LIST: usize = 12;

/// Validation of external inputs before they touch session state.
/// Violations are rejected synchronously and never persisted.
pub struct InputValidator;

impl InputValidator {
    pub fn validate_session_id(session_id: &str) -> KalenderResult<()> {
        if !SESSION_ID_PATTERN.is_match(session_id) {
            return Err(KalenderError::validation(
                "session_id",
                "Invalid session ID format",
            ));
        }
        Ok(())
    }

    pub fn validate_code(code: &str) -> KalenderResult<()> {
        if code.trim().is_empty() {
            return Err(KalenderError::validation("code", "Code cannot be empty"));
        }
        if !ACCESS_CODE_PATTERN.is_match(code.trim()) {
            return Err(KalenderError::validation("code", "Invalid code format"));
        }
        Ok(())
    }

    pub fn validate_day(day: u32) -> KalenderResult<()> {
        if !(1..=24).contains(&day) {
            return Err(KalenderError::validation(
                "day",
                format!("Day {day} outside calendar range 1-24"),
            ));
        }
        Ok(())
    }

    /// Symbol ids, challenge ids and crisis keys share one shape.
    pub fn validate_content_id(field: &str, id: &str) -> KalenderResult<()> {
        if !ID_PATTERN.is_match(id) {
            return Err(KalenderError::validation(field, "Invalid identifier format"));
        }
        Ok(())
    }

    pub fn validate_name_list(field: &str, names: &[String]) -> KalenderResult<()> {
        if names.len() > MAX_NAME_LIST {
            return Err(KalenderError::validation(field, "Too many names"));
        }
        for name in names {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(KalenderError::validation(field, "Name cannot be empty"));
            }
            if trimmed.len() > MAX_NAME_LEN {
                return Err(KalenderError::validation(field, "Name too long"));
            }
        }
        Ok(())
    }

    /// The symbol sequence proposed for a decryption attempt.
    pub fn validate_sequence(sequence: &[String]) -> KalenderResult<()> {
        if sequence.is_empty() {
            return Err(KalenderError::validation(
                "sequence",
                "Proposed sequence cannot be empty",
            ));
        }
        for symbol in sequence {
            Self::validate_content_id("sequence", symbol)?;
        }
        Ok(())
    }
}
