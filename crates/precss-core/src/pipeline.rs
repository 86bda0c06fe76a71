//! The fixed plugin chain.
//!
//! Plugins run one after another over a single mutable tree, in this order:
//! extend, advanced-variables, color-mod, logical, at-root, property-lookup,
//! nesting.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::Stylesheet;
use crate::atroot::AtRoot;
use crate::color::ColorMod;
use crate::config::Options;
use crate::emitter::emit_css;
use crate::error::{Diagnostics, Error, Warning};
use crate::extend::Extend;
use crate::logical::Logical;
use crate::lookup::PropertyLookup;
use crate::nesting::Nesting;
use crate::parser;
use crate::variables::AdvancedVariables;

/// An imported file and the file that imported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub file: PathBuf,
    pub parent: Option<PathBuf>,
}

/// State shared by the plugins of one run.
#[derive(Debug, Default)]
pub struct Context {
    /// The file being processed, if it came from disk.
    pub from: Option<PathBuf>,
    pub diagnostics: Diagnostics,
    pub dependencies: Vec<Dependency>,
}

/// One stage of the pipeline.
pub trait Plugin: Send + Sync {
    /// Name used in logs and warnings.
    fn name(&self) -> &'static str;

    fn run(&self, sheet: &mut Stylesheet, ctx: &mut Context) -> Result<(), Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub css: String,
    pub dependencies: Vec<Dependency>,
    pub warnings: Vec<Warning>,
}

pub struct Processor {
    plugins: Vec<Box<dyn Plugin>>,
}

impl Processor {
    pub fn new(options: Options) -> Self {
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(Extend::new()),
            Box::new(AdvancedVariables::new(&options)),
            Box::new(ColorMod::new(&options)),
            Box::new(Logical::new(&options.logical)),
            Box::new(AtRoot::new()),
            Box::new(PropertyLookup::new(&options.property_lookup)),
            Box::new(Nesting::new()),
        ];
        Self { plugins }
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    /// Run the chain over `source`. `from` is the file the source was read
    /// from; it anchors relative imports.
    pub fn process(&self, source: &str, from: Option<&Path>) -> Result<Output, Error> {
        let mut sheet = parser::parse(source, from)?;
        let mut ctx = Context {
            from: from.map(Path::to_path_buf),
            ..Context::default()
        };

        for plugin in &self.plugins {
            tracing::debug!(plugin = plugin.name(), "Running plugin");
            plugin.run(&mut sheet, &mut ctx)?;
        }

        Ok(Output {
            css: emit_css(&sheet),
            dependencies: ctx.dependencies,
            warnings: ctx.diagnostics.into_warnings(),
        })
    }

    pub fn process_file(&self, path: &Path) -> Result<Output, Error> {
        let source = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.process(&source, Some(path))
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(Options::default())
    }
}
