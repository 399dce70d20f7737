//! json documents on disk
//!
//! [Document] pairs a parsed json file with its source path. The path is kept so relative
//! includes can be resolved against its directory and errors can point at the file.
use crate::substitute::CyclicReference;
use crate::value::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Document {
    path: Option<PathBuf>,
    value: Value,
}

impl Document {
    pub fn new(value: Value, path: impl Into<Option<PathBuf>>) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    /// Load the primary configuration file
    pub fn load_file(file_path: &Path) -> Result<Self, LoadError> {
        if !file_path.is_file() {
            return Err(LoadError::FileNotFound(file_path.to_owned()));
        }

        let contents = read(file_path)?;
        let value = serde_json::from_str(&contents).map_err(|source| {
            LoadError::MalformedDocument {
                path: file_path.to_owned(),
                source,
            }
        })?;

        tracing::info!(path = %file_path.display(), "loaded config file");
        Ok(Self::new(value, file_path.to_owned()))
    }

    /// Load a file referenced by an include
    pub fn load_child(file_path: &Path) -> Result<Self, LoadError> {
        if !file_path.is_file() {
            return Err(LoadError::ChildFileNotFound(file_path.to_owned()));
        }

        let contents = read(file_path)?;
        let value = serde_json::from_str(&contents).map_err(|source| {
            LoadError::MalformedChildConfig {
                path: file_path.to_owned(),
                source,
            }
        })?;

        tracing::debug!(path = %file_path.display(), "loaded child config file");
        Ok(Self::new(value, file_path.to_owned()))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory relative includes are resolved against
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Top level object, required for the primary file
    pub fn into_object(self) -> Result<Map, LoadError> {
        match self.value {
            Value::Object(map) => Ok(map),
            other => Err(LoadError::NotAnObject {
                path: self.path.unwrap_or_default(),
                kind: other.kind(),
            }),
        }
    }
}

fn read(file_path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(file_path).map_err(|source| LoadError::Io {
        path: file_path.to_owned(),
        source,
    })
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Config file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),
    #[error("Child config file '{}' not found", .0.display())]
    ChildFileNotFound(PathBuf),
    #[error("IO error reading '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse json file '{}'", .path.display())]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unable to parse child config '{}'", .path.display())]
    MalformedChildConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{}' must contain an object at top level, found {kind}", .path.display())]
    NotAnObject { path: PathBuf, kind: &'static str },
    #[error("Include cycle: {}", display_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },
    #[error("Unable to resolve variables in '{}'", .path.display())]
    CyclicReference {
        path: PathBuf,
        #[source]
        source: CyclicReference,
    },
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<Map> for Document {
    fn from(value: Map) -> Self {
        Document::new(Value::Object(value), None)
    }
}

/// Utility macro to create a [Document] from json
///
/// ```
/// # use jcfg::document;
/// let doc = document!({ "attribute": 42 });
/// assert!(doc.path().is_none());
/// ```
///
/// With a source path
/// ```
/// # use jcfg::document;
/// let doc = document!(path = "conf/main.json", { "attribute": 42 });
/// assert_eq!(doc.base_dir(), std::path::Path::new("conf"));
/// ```
#[macro_export]
macro_rules! document {
    { path = $source:expr, $($json:tt)+ } => {
        $crate::document::Document::new(
            $crate::value::Value::from(serde_json::json!($($json)+)),
            Some(std::path::PathBuf::from($source)),
        )
    };
    { $($json:tt)+ } => {
        $crate::document::Document::new($crate::value::Value::from(serde_json::json!($($json)+)), None)
    };
}
