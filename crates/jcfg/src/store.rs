//! loaded configuration and its handle
//!
//! [load] runs the whole pipeline for a file and returns an immutable [ResolvedConfig].
//! [ConfigStore] keeps the raw document around for edits and hands out snapshots. It can be
//! shared between threads: a reload or edit publishes a new snapshot while readers keep using
//! the one they hold.
use crate::document::{Document, LoadError};
use crate::namespace;
use crate::options::LoadOptions;
use crate::path_expr::PathExpression;
use crate::resolver::{count_fields, derive_full_paths, Resolver};
use crate::value::{Map, Value};
use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Load, resolve and post-process a configuration file
pub fn load(file_path: &Path, options: &LoadOptions) -> Result<ResolvedConfig, LoadError> {
    let raw = Document::load_file(file_path)?;
    resolve_raw(file_path, raw.into_object()?, options)
}

fn resolve_raw(
    file_path: &Path,
    raw: Map,
    options: &LoadOptions,
) -> Result<ResolvedConfig, LoadError> {
    let document = Document::new(Value::Object(raw), file_path.to_owned());
    let resolved = match Resolver::new(options.clone()).resolve_document(document)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let root = resolved
        .get("root")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tree = if options.root_join && !root.is_empty() {
        derive_full_paths(&resolved, &root)
    } else {
        resolved
    };

    tracing::info!(
        path = %file_path.display(),
        fields = count_fields(&tree),
        "config resolved"
    );

    Ok(ResolvedConfig {
        path: file_path.to_owned(),
        tree,
    })
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    path: PathBuf,
    tree: Map,
}

impl ResolvedConfig {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &Map {
        &self.tree
    }

    /// Value at a dotted key path such as `model.layers[0].name`
    pub fn get(&self, key: &str) -> Option<&Value> {
        let expr: PathExpression = key.parse().ok()?;
        expr.lookup(&self.tree).ok()
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    /// All leaves by dotted key
    pub fn variables(&self) -> Map {
        namespace::flatten(&self.tree)
    }

    pub fn field_count(&self) -> usize {
        count_fields(&self.tree)
    }

    /// Map the configuration onto a typed structure
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.tree.clone()).into())
    }
}

impl serde::Serialize for ResolvedConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(&self.tree, serializer)
    }
}

/// Handle to a configuration file that can be edited and reloaded
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    options: LoadOptions,

    /// Document as written on disk, edits go here. Held while reloading or editing so writers
    /// do not interleave.
    raw: Mutex<Map>,

    current: ArcSwap<ResolvedConfig>,
}

impl ConfigStore {
    pub fn open(file_path: impl Into<PathBuf>, options: LoadOptions) -> Result<Self, StoreError> {
        let path = file_path.into();
        let raw = Document::load_file(&path)?.into_object()?;
        let current = ArcSwap::from_pointee(resolve_raw(&path, raw.clone(), &options)?);

        Ok(Self {
            path,
            options,
            raw: Mutex::new(raw),
            current,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the unresolved document
    pub fn raw(&self) -> Map {
        self.lock_raw().clone()
    }

    /// The current configuration, stays valid across reloads
    pub fn snapshot(&self) -> Arc<ResolvedConfig> {
        self.current.load_full()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.current.load().get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Re-read the file and resolve it from scratch
    ///
    /// On error the previous snapshot stays current.
    pub fn reload(&self) -> Result<Arc<ResolvedConfig>, StoreError> {
        let mut raw = self.lock_raw();

        let reloaded = Document::load_file(&self.path)?.into_object()?;
        let resolved = Arc::new(resolve_raw(&self.path, reloaded.clone(), &self.options)?);

        *raw = reloaded;
        self.current.store(Arc::clone(&resolved));

        tracing::info!(path = %self.path.display(), "config reloaded");
        Ok(resolved)
    }

    /// Set a dotted key in the raw document, write it to disk and publish the new snapshot
    ///
    /// Missing intermediate objects are created, non-object intermediates are replaced. The
    /// edited document must resolve before anything is written, a failed edit leaves the file
    /// and the store untouched.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        let keys: Vec<&str> = key.split('.').collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let (last, parents) = keys
            .split_last()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;

        let mut raw = self.lock_raw();
        let mut edited = raw.clone();

        let mut data = &mut edited;
        for parent in parents {
            let entry = data
                .entry(parent.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if entry.as_object().is_none() {
                *entry = Value::Object(Map::new());
            }
            data = entry
                .as_object_mut()
                .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        }
        data.insert(last.to_string(), value.into());

        let resolved = resolve_raw(&self.path, edited.clone(), &self.options)?;
        self.persist(&edited)?;

        *raw = edited;
        self.current.store(Arc::new(resolved));

        tracing::info!(%key, path = %self.path.display(), "config value set");
        Ok(())
    }

    fn persist(&self, raw: &Map) -> Result<(), StoreError> {
        let mut contents = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut contents, formatter);
        serde::Serialize::serialize(raw, &mut serializer).map_err(StoreError::Serialize)?;

        std::fs::write(&self.path, contents).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })
    }

    fn lock_raw(&self) -> MutexGuard<'_, Map> {
        // the document is only replaced as a whole, a panicking holder cannot leave it torn
        self.raw.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Invalid key '{0}'")]
    InvalidKey(String),
    #[error("Unable to serialize config")]
    Serialize(#[source] serde_json::Error),
    #[error("Unable to write config to '{}'", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
