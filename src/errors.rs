//! Error taxonomy of the card pipeline.
//!
//! Per-piece accessory failures are downgraded to omissions by the pipeline;
//! everything surfacing out of [`crate::pipeline::build_starter_pack`] is a
//! job-level failure tagged with the stage it happened in, so a caller can
//! resume from that stage instead of redoing the whole job.

use crate::pipeline::PieceRole;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage identifier carried by job-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Relief,
    Placement,
    Export,
    Texture,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Relief => "relief-build",
            Stage::Placement => "placement",
            Stage::Export => "export",
            Stage::Texture => "texture",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CardError {
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("failed to load raster {path}")]
    Raster {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{role} relief has degenerate bounds after fitting")]
    DegenerateBounds { role: PieceRole },

    #[error("merged export mesh contains no geometry")]
    EmptyExport,

    #[error("could not parse font file {0}")]
    Font(PathBuf),

    #[error("i/o failure on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("png encoding failed")]
    PngEncode(#[from] png::EncodingError),

    #[error("project file serialization failed")]
    Project(#[from] serde_json::Error),
}

impl CardError {
    /// Wrap an I/O error with the path it concerned.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CardError::Io {
            path: path.into(),
            source,
        }
    }

    /// Tag this error with the pipeline stage it occurred in.
    pub fn at(self, stage: Stage) -> PipelineError {
        PipelineError {
            stage,
            source: self,
        }
    }
}

/// A job-level failure: which stage failed, and why.
#[derive(Debug, Error)]
#[error("{stage} stage failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: CardError,
}
