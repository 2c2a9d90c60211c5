//! Core domain logic for RecipeForge.
//!
//! This crate turns an ordered list of step names into a wired recipe
//! document, attaches assembled BOMs, and ties both into the end-to-end
//! `build` workflow.

pub mod attach;
pub mod builder;
pub mod import;
pub mod label;
pub mod layout;
pub mod loader;
pub mod pipeline;
pub mod recipe;
pub mod registry;

pub use attach::{AttachOutcome, BomAttacher, find_and_replace};
pub use builder::{BuildOutcome, BuildProgress, InsertedComponent, RecipeBuilder, SilentProgress};
pub use import::{ImportDescriptor, describe_for_import};
pub use layout::{LayoutCursor, Position};
pub use pipeline::{BomRequest, BuildReport, BuildRequest, assemble_bom, run_build};
pub use recipe::RecipeDocument;
pub use registry::{Component, ComponentRegistry};
