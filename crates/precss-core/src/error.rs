use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub const fn dummy() -> Self {
        Self { line: 0, column: 0 }
    }

    pub fn with_offset(&self, offset: usize) -> Self {
        Self {
            line: self.line,
            column: self.column + offset,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 && self.column == 0 {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Where a node came from: the file it was parsed from (if any) and its
/// position inside that file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub file: Option<PathBuf>,
    pub span: Span,
}

impl Location {
    pub fn new(file: Option<PathBuf>, span: Span) -> Self {
        Self { file, span }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file.display(), self.span),
            None => write!(f, "<input>:{}", self.span),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A variable, mixin or `@content` target could not be found.
    #[error("{location}: {message}")]
    UnresolvedReference {
        message: String,
        word: String,
        location: Location,
    },

    /// A color constructor or adjuster did not match its grammar.
    #[error("{location}: {message}")]
    UnresolvedColor {
        message: String,
        word: String,
        location: Location,
    },

    /// No import candidate exists in any search directory.
    #[error("{location}: Could not resolve the @import for \"{id}\"")]
    ImportNotFound { id: String, location: Location },

    /// More than one import candidate exists; never subject to the policy.
    #[error("{location}: It's not clear which file to import for \"{id}\" ({})", list_paths(.candidates))]
    AmbiguousImport {
        id: String,
        candidates: Vec<PathBuf>,
        location: Location,
    },

    #[error("{location}: Recursive import detected: {}", .path.display())]
    RecursiveImport { path: PathBuf, location: Location },

    #[error("{location}: {message}")]
    RecursionLimit { message: String, location: Location },

    #[error("{location}: {message}")]
    PropertyLookup { message: String, location: Location },

    #[error("{location}: {message}")]
    Parse { message: String, location: Location },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// The offending token, for errors that carry one.
    pub fn word(&self) -> Option<&str> {
        match self {
            Self::UnresolvedReference { word, .. } | Self::UnresolvedColor { word, .. } => {
                Some(word)
            }
            Self::ImportNotFound { .. } => Some("@import"),
            _ => None,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::UnresolvedReference { location, .. }
            | Self::UnresolvedColor { location, .. }
            | Self::ImportNotFound { location, .. }
            | Self::AmbiguousImport { location, .. }
            | Self::RecursiveImport { location, .. }
            | Self::RecursionLimit { location, .. }
            | Self::PropertyLookup { location, .. }
            | Self::Parse { location, .. } => Some(location),
            Self::Io { .. } | Self::Config { .. } => None,
        }
    }

    /// The message without the location prefix.
    pub fn message(&self) -> String {
        match self {
            Self::UnresolvedReference { message, .. }
            | Self::UnresolvedColor { message, .. }
            | Self::RecursionLimit { message, .. }
            | Self::PropertyLookup { message, .. }
            | Self::Parse { message, .. } => message.clone(),
            Self::ImportNotFound { id, .. } => format!("Could not resolve the @import for \"{id}\""),
            other => other.to_string(),
        }
    }
}

/// A non-fatal problem recorded while the `warn` policy is active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub plugin: &'static str,
    pub message: String,
    pub word: Option<String>,
    pub location: Location,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.location, self.plugin, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(plugin = warning.plugin, location = %warning.location, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Record `error` as a warning attributed to `plugin`.
    pub fn warn_error(&mut self, plugin: &'static str, error: &Error) {
        self.warn(Warning {
            plugin,
            message: error.message(),
            word: error.word().map(str::to_string),
            location: error.location().cloned().unwrap_or_default(),
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display_includes_file_when_known() {
        let location = Location::new(Some(PathBuf::from("a.scss")), Span { line: 3, column: 7 });
        assert_eq!(location.to_string(), "a.scss:3:7");
        assert_eq!(Location::default().to_string(), "<input>:<unknown>");
    }

    #[test]
    fn warn_error_keeps_word_and_location() {
        let mut diagnostics = Diagnostics::new();
        let error = Error::UnresolvedReference {
            message: "Could not resolve the variable \"$x\" within \"$x\"".to_string(),
            word: "x".to_string(),
            location: Location::new(None, Span { line: 1, column: 2 }),
        };
        diagnostics.warn_error("advanced-variables", &error);

        let warnings = diagnostics.into_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].word.as_deref(), Some("x"));
        assert_eq!(warnings[0].location.span, Span { line: 1, column: 2 });
        assert!(warnings[0].message.starts_with("Could not resolve"));
    }
}
