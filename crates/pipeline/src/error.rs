//! Pipeline errors.
//!
//! Validation rejections and storage outages are not here: both are values.
//! What remains is what a single operation cannot recover from.

use thiserror::Error;
use wayfarer_core::error::{GenerationError, ProviderError, StoreError};

use crate::draft::DraftError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Nothing to learn: the script is empty")]
    EmptyScript,

    #[error("Region cycle needs two different, non-empty regions (got {0:?} and {1:?})")]
    InvalidRegions(String, String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Draft(#[from] DraftError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
