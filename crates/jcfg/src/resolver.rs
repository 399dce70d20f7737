//! resolution pass over a raw document
//!
//! For one document:
//! 1. flatten the raw tree into its [Namespace]
//! 2. walk the tree; include strings are replaced by the resolved child (see [crate::include]),
//!    every other string goes through the [Substitutor] with the namespace from step 1
//!
//! Included subtrees are spliced in as they come back from the child's own pass and are not
//! substituted again with the parent's namespace.
use crate::document::{Document, LoadError};
use crate::include::Inclusion;
use crate::namespace::Namespace;
use crate::options::LoadOptions;
use crate::substitute::Substitutor;
use crate::value::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Resolver {
    options: LoadOptions,

    /// Files currently being resolved, outermost first
    include_stack: Vec<PathBuf>,
}

impl Resolver {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            include_stack: vec![],
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Resolve a document against its own variables, using its directory for includes
    pub fn resolve_document(&mut self, document: Document) -> Result<Value, LoadError> {
        let base_dir = document.base_dir();
        let pushed = match document.path() {
            Some(path) if self.include_stack.is_empty() => {
                self.enter(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));
                true
            }
            _ => false,
        };

        let resolved = match document.value() {
            Value::Object(tree) => self.resolve(tree, &base_dir).map(Value::Object),
            other => self.walk(other, &base_dir, Some(&Namespace::default())),
        };

        if pushed {
            self.leave();
        }
        resolved
    }

    /// Full pass: flatten, expand includes, substitute
    pub fn resolve(&mut self, tree: &Map, base_dir: &Path) -> Result<Map, LoadError> {
        let namespace = Namespace::new(tree);
        tracing::trace!(variables = namespace.len(), "namespace built");
        self.walk_object(tree, base_dir, Some(&namespace))
    }

    /// Expand includes only, strings are kept as written
    pub fn resolve_includes(&mut self, value: &Value, base_dir: &Path) -> Result<Value, LoadError> {
        self.walk(value, base_dir, None)
    }

    fn walk(
        &mut self,
        value: &Value,
        base_dir: &Path,
        namespace: Option<&Namespace>,
    ) -> Result<Value, LoadError> {
        match value {
            Value::Object(map) => self.walk_object(map, base_dir, namespace).map(Value::Object),
            Value::Array(array) => array
                .iter()
                .map(|element| self.walk(element, base_dir, namespace))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::String(text) => {
                if let Some(inclusion) = Inclusion::parse(text) {
                    return self.include(inclusion, base_dir);
                }

                match namespace {
                    Some(namespace) => self.substitute(text, namespace).map(Value::String),
                    None => Ok(value.clone()),
                }
            }
            _ => Ok(value.clone()),
        }
    }

    fn walk_object(
        &mut self,
        map: &Map,
        base_dir: &Path,
        namespace: Option<&Namespace>,
    ) -> Result<Map, LoadError> {
        let mut resolved = Map::with_capacity(map.len());

        for (key, value) in map {
            if self.options.drop_comments && value.is_comment() {
                tracing::trace!(%key, "dropping comment");
                continue;
            }

            resolved.insert(key.clone(), self.walk(value, base_dir, namespace)?);
        }

        Ok(resolved)
    }

    fn substitute(&self, text: &str, namespace: &Namespace) -> Result<String, LoadError> {
        let mut substitutor = Substitutor::new(namespace, self.options.max_depth);

        // variables on a cycle are left as written, each round excludes one more chain
        while text.contains(['$', '%']) {
            let Some(cycle) = substitutor.find_cycle(text) else {
                break;
            };

            if self.options.deny_cycles {
                return Err(LoadError::CyclicReference {
                    path: self.include_stack.last().cloned().unwrap_or_default(),
                    source: cycle,
                });
            }

            tracing::warn!(%text, %cycle, "cyclic reference left unresolved");
            substitutor.exclude(cycle.chain);
        }

        let substituted = substitutor.substitute(text);
        if substituted != text {
            tracing::trace!(%text, %substituted, "substituted");
        }
        Ok(substituted)
    }

    pub(crate) fn is_loading(&self, path: &Path) -> bool {
        self.include_stack.iter().any(|loading| loading == path)
    }

    pub(crate) fn include_stack(&self) -> &[PathBuf] {
        &self.include_stack
    }

    pub(crate) fn enter(&mut self, path: PathBuf) {
        self.include_stack.push(path);
    }

    pub(crate) fn leave(&mut self) {
        self.include_stack.pop();
    }
}

/// Add a `full_<key>` sibling next to every string value whose key contains `_path`
///
/// Existing `full_<key>` entries are kept as they are and do not derive further keys.
pub fn derive_full_paths(tree: &Map, root: &str) -> Map {
    let mut derived = Map::with_capacity(tree.len());

    for (key, value) in tree {
        match value {
            Value::Object(child) => {
                derived.insert(key.clone(), Value::Object(derive_full_paths(child, root)));
            }
            Value::String(path) if key.contains("_path") && !key.starts_with("full_") => {
                derived.insert(key.clone(), value.clone());

                let full_key = format!("full_{key}");
                if !tree.contains_key(&full_key) {
                    let full_path = Path::new(root).join(path);
                    derived.insert(full_key, full_path.to_string_lossy().into_owned().into());
                }
            }
            _ => {
                derived.insert(key.clone(), value.clone());
            }
        }
    }

    derived
}

/// Number of configuration fields, nested objects count themselves and their children
pub fn count_fields(tree: &Map) -> usize {
    tree.values()
        .map(|value| match value {
            Value::Object(child) => 1 + count_fields(child),
            _ if value.is_comment() => 0,
            _ => 1,
        })
        .sum()
}
