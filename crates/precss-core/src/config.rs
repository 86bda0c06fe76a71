use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::color::Stringifier;
use crate::error::{Diagnostics, Error};
use crate::loader::{ImportFilter, ImportResolver};
use crate::scope::{VariableCallback, VariableSource};
use crate::value::Value;

/// What to do when a reference cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unresolved {
    #[default]
    Throw,
    Warn,
    Ignore,
}

impl Unresolved {
    /// Apply the policy to `error`: fail, record a warning, or drop it.
    pub fn handle(
        self,
        diagnostics: &mut Diagnostics,
        plugin: &'static str,
        error: Error,
    ) -> Result<(), Error> {
        match self {
            Self::Throw => Err(error),
            Self::Warn => {
                diagnostics.warn_error(plugin, &error);
                Ok(())
            }
            Self::Ignore => Ok(()),
        }
    }
}

impl FromStr for Unresolved {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "throw" => Ok(Self::Throw),
            "warn" => Ok(Self::Warn),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown unresolved policy '{other}'")),
        }
    }
}

/// Control-flow features that can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Content,
    Each,
    Else,
    If,
    Include,
    Import,
    For,
    Mixin,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::Content,
        Feature::Each,
        Feature::Else,
        Feature::If,
        Feature::Include,
        Feature::Import,
        Feature::For,
        Feature::Mixin,
    ];

    pub fn at_rule(self) -> &'static str {
        match self {
            Self::Content => "@content",
            Self::Each => "@each",
            Self::Else => "@else",
            Self::If => "@if",
            Self::Include => "@include",
            Self::Import => "@import",
            Self::For => "@for",
            Self::Mixin => "@mixin",
        }
    }

    pub fn from_at_rule(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.at_rule() == name)
    }
}

/// Set of disabled features. Deserializes from a list of names or from a
/// single comma/space separated string; unknown names are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disabled(HashSet<Feature>);

impl Disabled {
    pub fn parse(list: &str) -> Self {
        Self::from_names(list.split(|c: char| c == ',' || c.is_whitespace()))
    }

    fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self(
            names
                .into_iter()
                .filter_map(|name| Feature::from_at_rule(name.trim()))
                .collect(),
        )
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn insert(&mut self, feature: Feature) {
        self.0.insert(feature);
    }
}

impl<'de> Deserialize<'de> for Disabled {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(list) => Self::parse(&list),
            Raw::Many(names) => Self::from_names(names.iter().map(String::as_str)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ltr" => Ok(Self::Ltr),
            "rtl" => Ok(Self::Rtl),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorModOptions {
    /// Overrides the top-level policy for color expressions.
    pub unresolved: Option<Unresolved>,
    pub stringifier: Stringifier,
    pub transform_vars: bool,
}

impl Default for ColorModOptions {
    fn default() -> Self {
        Self {
            unresolved: None,
            stringifier: Stringifier::default(),
            transform_vars: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogicalOptions {
    pub dir: Option<Direction>,
    pub preserve: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyLookupOptions {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub disable: Disabled,
    pub unresolved: Unresolved,
    #[serde(deserialize_with = "deserialize_variables")]
    pub variables: VariableSource,
    pub import_paths: Vec<PathBuf>,
    /// Base directory for imports when the source has no file path.
    /// Defaults to the working directory.
    pub import_root: Option<PathBuf>,
    pub import_filter: ImportFilter,
    #[serde(skip)]
    pub resolver: Option<Arc<dyn ImportResolver>>,
    pub color_mod: ColorModOptions,
    pub logical: LogicalOptions,
    pub property_lookup: PropertyLookupOptions,
}

impl Options {
    /// Load options from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        !self.disable.contains(feature)
    }

    pub fn with_variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables = VariableSource::Map(variables);
        self
    }

    pub fn with_variable_callback(mut self, callback: VariableCallback) -> Self {
        self.variables = VariableSource::Callback(callback);
        self
    }

    pub fn with_import_filter(mut self, filter: ImportFilter) -> Self {
        self.import_filter = filter;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ImportResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_stringifier(mut self, stringifier: Stringifier) -> Self {
        self.color_mod.stringifier = stringifier;
        self
    }

    /// The policy for color expressions.
    pub fn color_unresolved(&self) -> Unresolved {
        self.color_mod.unresolved.unwrap_or(self.unresolved)
    }
}

fn deserialize_variables<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<VariableSource, D::Error> {
    let raw = HashMap::<String, serde_json::Value>::deserialize(deserializer)?;
    let map = raw
        .into_iter()
        .map(|(name, value)| (name, json_to_value(value)))
        .collect();
    Ok(VariableSource::Map(map))
}

fn json_to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::String(text) => Value::Scalar(text),
        serde_json::Value::Number(number) => match number.as_f64() {
            Some(n) => Value::number(n),
            None => Value::Scalar(number.to_string()),
        },
        serde_json::Value::Bool(flag) => Value::Scalar(flag.to_string()),
        serde_json::Value::Null => Value::Scalar(String::new()),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, json_to_value(value)))
                .collect(),
        ),
    }
}
