use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("landmark count mismatch in {source_name}: expected {expected}, found {found}")]
    StructuralMismatch {
        expected: usize,
        found: usize,
        source_name: String,
    },

    #[error("reference landmark index {index} out of range for {len} landmarks")]
    ReferenceIndex { index: usize, len: usize },

    #[error("no usable landmark sets in population")]
    EmptyPopulation,

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("missing asset {}: {reason}", .path.display())]
    MissingAsset { path: PathBuf, reason: String },

    #[error("malformed landmarks in {} line {line}: {reason}", .path.display())]
    MalformedLandmarks {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlignError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn missing(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MissingAsset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that leave the canonical template undefined and must abort the batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StructuralMismatch { .. } | Self::ReferenceIndex { .. } | Self::EmptyPopulation
        )
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let mismatch = AlignError::StructuralMismatch {
            expected: 6,
            found: 5,
            source_name: "a".into(),
        };
        assert!(mismatch.is_fatal());
        assert!(AlignError::EmptyPopulation.is_fatal());
        assert!(!AlignError::degenerate("eyes coincide").is_fatal());
        assert!(!AlignError::missing("x.jpg", "not found").is_fatal());
    }
}
