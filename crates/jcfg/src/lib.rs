//! # jcfg - json configuration with includes and variables
//!
//! ## Introduction for developers
//!
//! Read this to understand how `jcfg` works internally.
//!
//! ### Documents
//!
//! A configuration is a json file with an object at top level. String values may contain
//! sigils that are replaced while loading, or point at other files that get spliced in.
//!
//! ```json
//! {
//!   "#": "comments are strings starting with #, they are dropped",
//!   "root": "/data",
//!   "name": "resnet",
//!   "home": "{HOME}",
//!   "cache": "/srv/cache",
//!   "model": {
//!     "title": "$name$-v1",
//!     "dir": "%cache%models",
//!     "weights_path": "w.bin",
//!     "layers": ["conv", "pool"]
//!   },
//!   "first_layer": "$model.layers[0]$",
//!   "train": "@train.json",
//!   "templates": "@!templates.json"
//! }
//! ```
//!
//! ### Loading
//!
//! see [store::load]
//!
//! 1. [document::Document::load_file] reads and parses the file.
//! 2. [resolver::Resolver] flattens the raw tree into a [namespace::Namespace]
//!    (`model.title`, `model.layers`, ...).
//! 3. The tree is walked depth first. Include strings (`@file`, `@!file`) are replaced by the
//!    content of the child file, which went through steps 2 and 3 on its own with its directory
//!    as base for relative paths (see [include]). All other strings are run through the
//!    [substitute::Substitutor].
//! 4. With a non-empty top level `root`, every `*_path*` string gets a `full_*` sibling joined
//!    to `root` (see [resolver::derive_full_paths]).
//!
//! ### Substitution
//!
//! see [substitute]
//!
//! | **sigil**  | **example**          | **result**                                  |
//! |------------|----------------------|---------------------------------------------|
//! | `{NAME}`   | `{HOME}`             | `/home/alice`                               |
//! | `$expr$`   | `$name$-v1`          | `resnet-v1`                                 |
//! | `%expr%`   | `%cache%models`      | `/srv/cache/models`                         |
//! | `!expr!`   | `!model.layers!`     | `["conv","pool"]`                           |
//!
//! Expressions are dotted keys with optional indices, evaluated by [path_expr::PathExpression].
//!
//! References that cannot be resolved are left in the text as written so they show up in the
//! output. Nothing fails because of a missing variable.
//!
//! ### Output
//!
//! [store::ResolvedConfig] holds the resolved tree. It can be queried by dotted key, serialized
//! via [serde] or deserialized into a typed structure. [store::ConfigStore] additionally edits
//! and persists the raw document and hands out immutable snapshots across reloads.
//!
pub mod document;
pub mod include;
pub mod namespace;
pub mod options;
pub mod path_expr;
pub mod resolver;
pub mod store;
pub mod substitute;
pub mod value;

pub use options::LoadOptions;
pub use store::{load, ConfigStore, ResolvedConfig};
pub use value::Value;
