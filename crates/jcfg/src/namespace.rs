//! variable namespace (flattened document)
//!
//! ```json
//! { "model": { "name": "m", "weights": [1, 2] }, "root": "/data" }
//! ```
//!
//! flattens into
//!
//! | **key**         | **value** |
//! |-----------------|-----------|
//! | `model.name`    | `"m"`     |
//! | `model.weights` | `[1, 2]`  |
//! | `root`          | `"/data"` |
//!
//! Lists are bound as a whole. Indexing into them happens when a [crate::path_expr::PathExpression]
//! is evaluated.
use crate::value::{Map, Value};

/// Variables visible to one resolution pass
#[derive(Debug, Default, Clone)]
pub struct Namespace {
    /// dotted key -> leaf value
    flat: Map,

    /// The document the namespace was flattened from, used for stepwise descent
    tree: Map,
}

impl Namespace {
    pub fn new(tree: &Map) -> Self {
        Self {
            flat: flatten(tree),
            tree: tree.clone(),
        }
    }

    /// Exact lookup of a flattened key
    pub fn get(&self, dotted_key: &str) -> Option<&Value> {
        self.flat.get(dotted_key)
    }

    /// The nested document backing this namespace
    pub fn tree(&self) -> &Map {
        &self.tree
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.flat.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }
}

impl From<&Map> for Namespace {
    fn from(value: &Map) -> Self {
        Namespace::new(value)
    }
}

/// Flatten nested objects into `parent.child` keys
pub fn flatten(tree: &Map) -> Map {
    let mut items = Map::new();
    flatten_into(tree, None, &mut items);
    items
}

fn flatten_into(tree: &Map, parent_key: Option<&str>, items: &mut Map) {
    for (key, value) in tree {
        let new_key = match parent_key {
            Some(parent) => format!("{parent}.{key}"),
            None => key.clone(),
        };

        match value {
            Value::Object(child) => flatten_into(child, Some(&new_key), items),
            _ => {
                items.insert(new_key, value.clone());
            }
        }
    }
}
