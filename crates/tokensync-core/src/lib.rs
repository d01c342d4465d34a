//! Design-token import and variable export engine.
//!
//! Import: flatten a `$type`/`$value` token document -> resolve deferred
//! aliases to a fixpoint -> write variables through a [`VariableWriter`].
//! Export: read collections and variables -> normalize values -> render
//! CSS custom properties or structured JSON per mode.

pub mod color;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod export;
pub mod import;
pub mod parse;
pub mod render;
pub mod resolve;
pub mod value;

pub use color::*;
pub use config::*;
pub use diagnostics::*;
pub use errors::*;
pub use export::*;
pub use import::*;
pub use parse::*;
pub use render::*;
pub use resolve::*;
pub use value::*;

pub use tokensync_store::{
    Collection, Color, Mode, ResolvedType, Variable, VariableStore, VariableValue, VariableWriter,
};
