//! Ensemble inference
//!
//! Each classifier type contributes the equal-weight mean of its fold models;
//! the types are then summed with their [`EnsembleWeights`]. Weights are
//! applied as given, so scores only stay within [0, 1] when the caller
//! configures weights that sum to at most one.

mod combiner;
mod submission;
mod weights;

pub use combiner::{EnsembleCombiner, EnsemblePrediction};
pub use submission::{Submission, SUBMISSION_ID_COLUMN};
pub use weights::EnsembleWeights;
