//! Bill-of-materials assembly for RecipeForge.
//!
//! - [`material`]: material metadata records and the [`MaterialSource`] lookup trait
//! - [`dates`]: change-date normalization
//! - [`assembler`]: builds a [`BomDocument`] from material ids
//! - [`document`]: the assembled BOM and its invariants

pub mod assembler;
pub mod dates;
pub mod document;
pub mod material;

pub use assembler::{AssembleOutcome, BomAssembler, BomTemplates};
pub use document::BomDocument;
pub use material::{BlankMaterials, MaterialCatalog, MaterialRecord, MaterialSource};
