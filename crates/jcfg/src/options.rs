use crate::substitute::DEFAULT_MAX_DEPTH;

/// Knobs for loading and resolving a configuration
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct LoadOptions {
    /// Rounds of the recursive substitution passes
    #[new(value = "DEFAULT_MAX_DEPTH")]
    pub max_depth: usize,

    /// Add `full_<key>` siblings for `*_path*` keys, joined to the top level `root`
    #[new(value = "true")]
    pub root_join: bool,

    /// Remove `"#..."` comment values from objects
    #[new(value = "true")]
    pub drop_comments: bool,

    /// Fail on cyclic variable references instead of stopping at `max_depth`
    #[new(default)]
    pub deny_cycles: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}
