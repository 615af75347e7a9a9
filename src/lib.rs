pub mod config;
pub mod dataset;
pub mod pick;
pub mod storage;

// Re-export vision types for convenience
pub use faceprep_vision::{pipeline, Aligner, CanonicalTemplate, FaceItem, LandmarkSet, Population};
