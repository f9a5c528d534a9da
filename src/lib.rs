//! packcard turns a figure photo and up to three accessory photos, each with
//! a matching depth map, into a 3D-printable "starter pack" card: a 130x170mm
//! plate carrying displaced-relief pieces, raised lettering, a binary STL in
//! millimeters, a pixel-registered UV print texture, and an editable project
//! file.
//!
//! The library layers are small and composable:
//!
//! - [`mesh`] holds the polygon-soup mesh with BSP-backed clipping;
//! - [`relief`] turns a depth raster into a displaced heightfield mesh;
//! - [`layout`] and [`placement`] put pieces into their card cells;
//! - [`text`] shapes and extrudes the lettering;
//! - [`export`] and [`texture`] write the STL and the print PNG;
//! - [`pipeline`] ties it all together behind [`pipeline::build_starter_pack`].

pub mod config;
pub mod errors;
pub mod export;
pub mod float_types;
pub mod geom;
pub mod layout;
pub mod mesh;
pub mod pipeline;
pub mod placement;
pub mod relief;
pub mod shapes;
pub mod text;
pub mod texture;

pub use config::{CardSpec, PipelineConfig};
pub use errors::{CardError, PipelineError, Stage};
pub use pipeline::{BuildReport, PieceRole, StarterPackJob, build_starter_pack};
