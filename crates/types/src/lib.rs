//! # Flowgraph Types
//!
//! Wire-format schema for workflow JSON documents and the typed error
//! taxonomy shared by every other crate in this workspace.
//!
//! This crate knows nothing about scheduling, populate order, or cleanup —
//! it only describes what a workflow document looks like on disk and what
//! kinds of failure the engine can report.

pub mod document;
pub mod error;

pub use document::{NestedWorkflowRef, StepDocument, VarEntry, WorkflowDocument};
pub use error::WorkflowError;
