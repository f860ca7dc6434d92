//! # Flowgraph Util
//!
//! Small, dependency-light helpers shared by the engine: variable token
//! substitution, deterministic resource naming, and duration string
//! parsing.
//!
//! ## Modules
//!
//! - **substitute**: `${name}` token substitution over a JSON value tree
//! - **name_gen**: length-bounded, deterministic resource name generation
//! - **duration**: Go-style duration string parsing (`"10m"`, `"1h30m"`)

pub mod duration;
pub mod name_gen;
pub mod substitute;

pub use duration::{format_duration, parse_duration, parse_timeout, DurationParseError};
pub use name_gen::generate_resource_name;
pub use substitute::{find_unresolved_tokens, scan_tokens, substitute_string, substitute_tree};
