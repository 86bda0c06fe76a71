//! Sass-like stylesheet preprocessing over a mutable CSS tree.
//!
//! A [`Processor`] parses a stylesheet and runs a fixed chain of plugins over
//! it: `@extend`, variables and control flow with imports, `color-mod()`,
//! logical properties, `@at-root`, property lookup and nesting.

pub mod ast;
pub mod atroot;
pub mod color;
pub mod config;
pub mod emitter;
pub mod error;
pub mod extend;
pub mod interpolate;
pub mod list;
pub mod loader;
pub mod logical;
pub mod lookup;
pub mod nesting;
pub mod parser;
pub mod pipeline;
pub mod scope;
pub mod value;
pub mod variables;

pub use config::Options;
pub use error::{Error, Warning};
pub use pipeline::{Dependency, Output, Processor};
