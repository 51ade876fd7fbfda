//! Error taxonomy for the ingestion pipeline.
//!
//! Every failure a record can hit carries a stable [`ErrorCode`]. Codes group
//! into an [`ErrorKind`] (parsing, normalization, computation, storage) so a
//! client can tell "fix your input" apart from "system error" without parsing
//! message text.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidSmiles,
    InvalidMolfile,
    InvalidSdf,
    UnsupportedFormat,
    EmptyInput,
    CanonicalizationFailed,
    KekulizationFailed,
    DescriptorCalculationFailed,
    FingerprintCalculationFailed,
    DuplicateMolecule,
    StorageFailed,
    UnknownError,
}

/// The stage of the pipeline an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parsing,
    Normalization,
    Computation,
    Storage,
    Internal,
}

impl ErrorCode {
    /// The wire form of the code, e.g. `INVALID_SMILES`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidSmiles => "INVALID_SMILES",
            ErrorCode::InvalidMolfile => "INVALID_MOLFILE",
            ErrorCode::InvalidSdf => "INVALID_SDF",
            ErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorCode::EmptyInput => "EMPTY_INPUT",
            ErrorCode::CanonicalizationFailed => "CANONICALIZATION_FAILED",
            ErrorCode::KekulizationFailed => "KEKULIZATION_FAILED",
            ErrorCode::DescriptorCalculationFailed => "DESCRIPTOR_CALCULATION_FAILED",
            ErrorCode::FingerprintCalculationFailed => "FINGERPRINT_CALCULATION_FAILED",
            ErrorCode::DuplicateMolecule => "DUPLICATE_MOLECULE",
            ErrorCode::StorageFailed => "STORAGE_FAILED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::InvalidSmiles
            | ErrorCode::InvalidMolfile
            | ErrorCode::InvalidSdf
            | ErrorCode::UnsupportedFormat
            | ErrorCode::EmptyInput => ErrorKind::Parsing,
            ErrorCode::CanonicalizationFailed | ErrorCode::KekulizationFailed => {
                ErrorKind::Normalization
            }
            ErrorCode::DescriptorCalculationFailed | ErrorCode::FingerprintCalculationFailed => {
                ErrorKind::Computation
            }
            ErrorCode::DuplicateMolecule | ErrorCode::StorageFailed => ErrorKind::Storage,
            ErrorCode::UnknownError => ErrorKind::Internal,
        }
    }

    /// Whether the submitter can fix this by changing their input.
    pub fn is_user_error(self) -> bool {
        matches!(self.kind(), ErrorKind::Parsing | ErrorKind::Normalization)
            || self == ErrorCode::DuplicateMolecule
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coded failure with a message and optional structured context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl Failure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail entry, replacing any previous value under `key`.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Errors produced by the molintake crates.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing error: {0}")]
    Parsing(Failure),

    #[error("normalization error: {0}")]
    Normalization(Failure),

    #[error("computation error: {0}")]
    Computation(Failure),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("incompatible fingerprints: {0}")]
    IncompatibleFingerprints(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IntakeError {
    pub fn parsing(code: ErrorCode, message: impl Into<String>) -> Self {
        IntakeError::Parsing(Failure::new(code, message))
    }

    pub fn normalization(code: ErrorCode, message: impl Into<String>) -> Self {
        IntakeError::Normalization(Failure::new(code, message))
    }

    pub fn computation(code: ErrorCode, message: impl Into<String>) -> Self {
        IntakeError::Computation(Failure::new(code, message))
    }

    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            IntakeError::Parsing(f) | IntakeError::Normalization(f) | IntakeError::Computation(f) => {
                f.code
            }
            IntakeError::Storage(_) => ErrorCode::StorageFailed,
            IntakeError::Io(_)
            | IntakeError::IncompatibleFingerprints(_)
            | IntakeError::InvalidInput(_)
            | IntakeError::Config(_) => ErrorCode::UnknownError,
        }
    }

    /// The coded failure, if this error carries one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            IntakeError::Parsing(f) | IntakeError::Normalization(f) | IntakeError::Computation(f) => {
                Some(f)
            }
            _ => None,
        }
    }

    /// Add a detail to a coded failure; other variants pass through unchanged.
    pub fn with_detail(self, key: impl Into<String>, value: impl ToString) -> Self {
        match self {
            IntakeError::Parsing(f) => IntakeError::Parsing(f.with_detail(key, value)),
            IntakeError::Normalization(f) => IntakeError::Normalization(f.with_detail(key, value)),
            IntakeError::Computation(f) => IntakeError::Computation(f.with_detail(key, value)),
            other => other,
        }
    }
}

/// Convenience alias used throughout the molintake crates.
pub type Result<T> = std::result::Result<T, IntakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_wire_names() {
        assert_eq!(ErrorCode::InvalidSmiles.as_str(), "INVALID_SMILES");
        assert_eq!(ErrorCode::KekulizationFailed.to_string(), "KEKULIZATION_FAILED");
    }

    #[test]
    fn codes_group_into_kinds() {
        assert_eq!(ErrorCode::EmptyInput.kind(), ErrorKind::Parsing);
        assert_eq!(ErrorCode::CanonicalizationFailed.kind(), ErrorKind::Normalization);
        assert_eq!(ErrorCode::FingerprintCalculationFailed.kind(), ErrorKind::Computation);
        assert_eq!(ErrorCode::StorageFailed.kind(), ErrorKind::Storage);
    }

    #[test]
    fn user_errors() {
        assert!(ErrorCode::InvalidSdf.is_user_error());
        assert!(ErrorCode::KekulizationFailed.is_user_error());
        assert!(!ErrorCode::DescriptorCalculationFailed.is_user_error());
        assert!(!ErrorCode::UnknownError.is_user_error());
    }

    #[test]
    fn details_survive_wrapping() {
        let err = IntakeError::normalization(ErrorCode::CanonicalizationFailed, "bad valence")
            .with_detail("atom", 3);
        assert_eq!(err.code(), ErrorCode::CanonicalizationFailed);
        let failure = err.failure().unwrap();
        assert_eq!(failure.details.get("atom").map(String::as_str), Some("3"));
        assert_eq!(
            err.to_string(),
            "normalization error: [CANONICALIZATION_FAILED] bad valence"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err: IntakeError = io.into();
        assert_eq!(err.code(), ErrorCode::UnknownError);
        assert!(err.to_string().contains("truncated"));
    }
}
