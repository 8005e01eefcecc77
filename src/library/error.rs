use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name to list of messages, serialized as a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn first_message(&self) -> Option<&str> {
        self.0
            .values()
            .flat_map(|messages| messages.iter())
            .next()
            .map(String::as_str)
    }

    /// `Ok(())` when no error was collected.
    pub fn into_result(self) -> Result<(), LibraryError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(LibraryError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{}", .0.first_message().unwrap_or("Validation failed"))]
    Validation(ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl LibraryError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        LibraryError::Validation(ValidationErrors::single(field, message))
    }
}

pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_group_by_field() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "The name field is required.");
        errors.add("name", "The name has already been taken.");
        errors.add("color", "The color format is invalid.");

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["name"].as_array().unwrap().len(), 2);
        assert_eq!(json["color"][0], "The color format is invalid.");
    }

    #[test]
    fn empty_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
        let err = ValidationErrors::single("title", "required")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, LibraryError::Validation(_)));
        assert_eq!(err.to_string(), "required");
    }
}
