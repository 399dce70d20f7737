//! child file inclusion
//!
//! A string value `"@child.json"` is replaced with the content of `child.json`, after that
//! file went through its own resolution pass. `"@!child.json"` splices the content in without
//! substituting its variables. Includes nested inside the child are expanded either way.
//!
//! Relative paths are joined to the directory of the including file. A child only sees its own
//! variables, nothing of the parent's namespace.
use crate::document::{Document, LoadError};
use crate::resolver::Resolver;
use crate::value::Value;
use std::path::{Path, PathBuf};

/// A string value that designates another file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion<'a> {
    pub path: &'a str,
    pub substitute: bool,
}

impl<'a> Inclusion<'a> {
    pub fn parse(value: &'a str) -> Option<Self> {
        if let Some(path) = value.strip_prefix("@!") {
            return Some(Self {
                path,
                substitute: false,
            });
        }

        value.strip_prefix('@').map(|path| Self {
            path,
            substitute: true,
        })
    }

    /// Location of the child file relative to the including file's directory
    pub fn full_path(&self, base_dir: &Path) -> PathBuf {
        let path = Path::new(self.path);
        if path.is_absolute() || base_dir.as_os_str().is_empty() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

impl Resolver {
    /// Load and resolve the file an [Inclusion] points at
    pub fn include(&mut self, inclusion: Inclusion, base_dir: &Path) -> Result<Value, LoadError> {
        let full_path = inclusion.full_path(base_dir);
        let child = Document::load_child(&full_path)?;

        let canonical = full_path.canonicalize().unwrap_or(full_path);
        if self.is_loading(&canonical) {
            let mut chain = self.include_stack().to_vec();
            chain.push(canonical);
            return Err(LoadError::IncludeCycle { chain });
        }

        tracing::debug!(
            path = %canonical.display(),
            substitute = inclusion.substitute,
            "including child config"
        );

        self.enter(canonical);
        let resolved = if inclusion.substitute {
            self.resolve_document(child)
        } else {
            let child_dir = child.base_dir();
            self.resolve_includes(child.value(), &child_dir)
        };
        self.leave();

        resolved
    }
}
