//! PPTX (Office Open XML) backend for template-driven slide generation.
//!
//! Opens a .pptx package, duplicates and removes slides, merges outline
//! content into text shapes, moves logos into place and appends decorative
//! images, then writes the package back out.

pub mod decorate;
pub mod duplicate;
pub mod generate;
pub mod media;
pub mod merge;
pub mod normalize;
pub mod package;
pub mod presentation;
pub mod shapes;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use decorate::{decorate_slides, DecorateOptions, DecorateReport, Placement};
pub use duplicate::{DuplicateReport, ImportReport};
pub use generate::{populate, GenerateOptions, PopulateReport};
pub use media::{load_asset_dir, load_decorations, ImageAsset, ImageData, ImageFormat};
pub use merge::{apply_content, MergeOptions, MergeReport};
pub use normalize::{normalize_shapes, NormalizeReport};
pub use package::{ContentTypes, Package, Relationship, Relationships};
pub use presentation::{Layout, Presentation, Slide};
