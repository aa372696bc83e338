//! Field-level input validation shared by the domain modules.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collected field errors for one input. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut v = Self::new();
        v.add(field, message);
        v
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Record an error when `condition` does not hold.
    pub fn check(&mut self, condition: bool, field: &str, message: impl Into<String>) {
        if !condition {
            self.add(field, message);
        }
    }

    pub fn require_text(&mut self, value: &str, field: &str) {
        self.check(!value.trim().is_empty(), field, "This field is required.");
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "Invalid input: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_all_failures() {
        let mut v = ValidationError::new();
        v.require_text("  ", "reason");
        v.check(false, "date", "Date cannot be in the past.");
        v.check(true, "time", "unused");
        assert_eq!(v.fields.len(), 2);
        assert_eq!(
            v.to_string(),
            "Invalid input: reason: This field is required.; date: Date cannot be in the past."
        );
        assert!(v.into_result().is_err());
        assert!(ValidationError::new().into_result().is_ok());
    }
}
