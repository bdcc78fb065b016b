use thiserror::Error;

/// Core error types for DicomStore metadata handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid dictionary tag: {0}")]
    InvalidTag(String),

    #[error("Invalid value representation: {0}")]
    InvalidValueRepresentation(String),

    #[error("Invalid value multiplicity: {0}")]
    InvalidValueMultiplicity(String),

    #[error("Invalid hierarchy level: {0}")]
    InvalidLevel(String),

    #[error("Invalid DICOM date/time: {0}")]
    InvalidDateTime(String),
}

impl CoreError {
    /// Create a new InvalidTag error
    pub fn invalid_tag(tag: impl Into<String>) -> Self {
        Self::InvalidTag(tag.into())
    }

    /// Create a new InvalidValueRepresentation error
    pub fn invalid_vr(vr: impl Into<String>) -> Self {
        Self::InvalidValueRepresentation(vr.into())
    }

    /// Create a new InvalidValueMultiplicity error
    pub fn invalid_vm(vm: impl Into<String>) -> Self {
        Self::InvalidValueMultiplicity(vm.into())
    }

    /// Create a new InvalidLevel error
    pub fn invalid_level(level: impl Into<String>) -> Self {
        Self::InvalidLevel(level.into())
    }

    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(value: impl Into<String>) -> Self {
        Self::InvalidDateTime(value.into())
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTag(_)
            | Self::InvalidValueRepresentation(_)
            | Self::InvalidValueMultiplicity(_) => ErrorCategory::Dictionary,
            Self::InvalidLevel(_) => ErrorCategory::Hierarchy,
            Self::InvalidDateTime(_) => ErrorCategory::Validation,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Dictionary,
    Hierarchy,
    Validation,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dictionary => write!(f, "dictionary"),
            Self::Hierarchy => write!(f, "hierarchy"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_tag("zz");
        assert_eq!(err.to_string(), "Invalid dictionary tag: zz");
        assert_eq!(err.category(), ErrorCategory::Dictionary);
    }

    #[test]
    fn test_level_error() {
        let err = CoreError::invalid_level("Frame");
        assert_eq!(err.to_string(), "Invalid hierarchy level: Frame");
        assert_eq!(err.category(), ErrorCategory::Hierarchy);
        assert_eq!(err.category().to_string(), "hierarchy");
    }

    #[test]
    fn test_date_time_error() {
        let err = CoreError::invalid_date_time("2023-13-01");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}
