use std::path::PathBuf;

use clap::{Parser, Subcommand};
use precss_core::color::Stringifier;
use precss_core::config::{Direction, Unresolved};

#[derive(Parser, Debug)]
#[command(name = "precss")]
#[command(about = "Sass-like CSS preprocessor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a stylesheet to CSS
    Build {
        input: PathBuf,

        /// Write CSS to FILE instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON options file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra directory searched by @import (repeatable)
        #[arg(long = "import-path")]
        import_paths: Vec<PathBuf>,

        /// What to do with unresolved references: throw, warn or ignore
        #[arg(long)]
        unresolved: Option<Unresolved>,

        /// At-rules to leave untouched, e.g. "@if, @each"
        #[arg(long)]
        disable: Option<String>,

        /// Writing direction for logical properties: ltr or rtl
        #[arg(long)]
        dir: Option<Direction>,

        /// Keep logical declarations next to their expansions
        #[arg(long)]
        preserve_logical: bool,

        /// Output format of color-mod() results
        #[arg(long)]
        stringifier: Option<Stringifier>,

        /// Print the imported files as JSON on stderr
        #[arg(long)]
        deps: bool,
    },
}
