pub mod aperture;
pub mod canonical;
pub mod composite;
pub mod error;
pub mod landmarks;
pub mod normalize;
pub mod picker;
pub mod pipeline;
pub mod procrustes;
pub mod warp;

// Re-export commonly used types
pub use aperture::{ApertureMask, ApertureParams};
pub use canonical::{CanonicalTemplate, CanvasGeometry, RescaledTemplate};
pub use composite::{Compositor, ResizeFilter};
pub use error::{AlignError, Result};
pub use landmarks::{LandmarkSet, Point2D};
pub use normalize::{normalize, NormalizedLandmarkSet, ReferencePair};
pub use picker::LandmarkSession;
pub use pipeline::{Aligner, ColorMode, FaceItem, Population};
pub use procrustes::SimilarityTransform;
