//! variable substitution in string values
//!
//! | **sigil**  | **name**     | **replacement**                                              |
//! |------------|--------------|--------------------------------------------------------------|
//! | `{NAME}`   | env          | environment variable `NAME`                                  |
//! | `$expr$`   | recur_str    | value of `expr`, re-scanned for more `$..$` sigils            |
//! | `%expr%`   | recur_path   | value of `expr` as path fragment, `/` added on both sides     |
//! | `!expr!`   | raw          | value of `expr`, pasted as is and never re-scanned            |
//!
//! `expr` is a [crate::path_expr::PathExpression] made of word characters, dots and `[N]`.
//!
//! The passes always run in the order of the table. Env first so environment values can feed
//! into the other passes, raw last so its output is never touched again.
//!
//! A sigil that cannot be resolved (unknown variable, bad index, unset env var) is left in the
//! text as written. The recursive passes stop after `max_depth` rounds even if the text would
//! still change. Variables marked with [Substitutor::exclude] are not expanded by the recursive
//! passes at all.
use crate::namespace::Namespace;
use crate::path_expr;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

pub const DEFAULT_MAX_DEPTH: usize = 10;

const SEPARATOR: char = '/';

static ENV_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());
static RECUR_STR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([\w.\[\]]+)\$").unwrap());
static RECUR_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%([\w.\[\]]+)%").unwrap());
static RAW_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!([\w.\[\]]+)!").unwrap());

/// Variables that (indirectly) reference themselves
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cyclic reference: {}", .chain.join(" -> "))]
pub struct CyclicReference {
    /// `a -> b -> a`
    pub chain: Vec<String>,
}

#[derive(derive_new::new, Debug)]
pub struct Substitutor<'n> {
    namespace: &'n Namespace,
    max_depth: usize,

    /// Expressions the recursive passes leave as written
    #[new(default)]
    excluded: HashSet<String>,
}

impl<'n> Substitutor<'n> {
    /// Run all passes
    pub fn substitute(&self, text: &str) -> String {
        let text = self.replace_env(text);
        let text = self.replace_recur_str(&text);
        let text = self.replace_recur_path(&text);
        self.replace_raw(&text)
    }

    /// Find the first chain of `$..$`/`%..%` references that loops back onto itself
    ///
    /// Excluded expressions are not followed, so after excluding a found chain the next call
    /// reports a different cycle or none.
    pub fn find_cycle(&self, text: &str) -> Option<CyclicReference> {
        let text = self.replace_env(text);
        let mut stack = vec![];
        let mut done = self.excluded.clone();

        let cycle = recursive_references(&text)
            .find_map(|expr| self.visit_reference(expr, &mut stack, &mut done))
            .map(|chain| CyclicReference { chain });
        cycle
    }

    /// Keep `$expr$` and `%expr%` sigils of these expressions verbatim
    pub fn exclude(&mut self, exprs: impl IntoIterator<Item = String>) {
        self.excluded.extend(exprs);
    }

    fn visit_reference(
        &self,
        expr: &str,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        if let Some(start) = stack.iter().position(|visited| visited == expr) {
            let mut chain = stack[start..].to_vec();
            chain.push(expr.to_string());
            return Some(chain);
        }

        if done.contains(expr) {
            return None;
        }

        let value = path_expr::evaluate(expr, self.namespace).ok()?;
        let nested = value.as_str().unwrap_or_default();

        stack.push(expr.to_string());
        let cycle = recursive_references(nested)
            .find_map(|nested_expr| self.visit_reference(nested_expr, stack, done));
        stack.pop();

        done.insert(expr.to_string());
        cycle
    }

    fn lookup(&self, expr: &str) -> Option<String> {
        match path_expr::evaluate(expr, self.namespace) {
            Ok(value) => Some(value.to_string()),
            Err(err) => {
                tracing::trace!(%expr, %err, "unresolved variable");
                None
            }
        }
    }

    fn replace_env(&self, text: &str) -> String {
        ENV_PATTERN
            .replace_all(text, |caps: &Captures| {
                std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
            })
            .into_owned()
    }

    fn replace_recur_str(&self, text: &str) -> String {
        self.fixpoint(text, |s| {
            RECUR_STR_PATTERN
                .replace_all(s, |caps: &Captures| {
                    if self.excluded.contains(&caps[1]) {
                        return caps[0].to_string();
                    }
                    self.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned()
        })
    }

    fn replace_recur_path(&self, text: &str) -> String {
        let mut substituted = false;

        let text = self.fixpoint(text, |s| {
            RECUR_PATH_PATTERN
                .replace_all(s, |caps: &Captures| match self.path_fragment(&caps[1]) {
                    Some(fragment) => {
                        substituted = true;
                        fragment
                    }
                    None => caps[0].to_string(),
                })
                .into_owned()
        });

        if substituted {
            normalize_path(&text)
        } else {
            text
        }
    }

    fn path_fragment(&self, expr: &str) -> Option<String> {
        if self.excluded.contains(expr) {
            return None;
        }

        let value = path_expr::evaluate(expr, self.namespace).ok()?;
        let mut fragment = match value.as_str() {
            Some(s) => self.replace_recur_str(s),
            None => value.to_string(),
        };

        if !fragment.starts_with(['.', SEPARATOR]) {
            fragment.insert(0, SEPARATOR);
        }
        if !fragment.ends_with(SEPARATOR) {
            fragment.push(SEPARATOR);
        }

        Some(fragment)
    }

    fn replace_raw(&self, text: &str) -> String {
        RAW_PATTERN
            .replace_all(text, |caps: &Captures| {
                self.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Apply `pass` until the text stops changing, at most `max_depth` times
    fn fixpoint(&self, text: &str, mut pass: impl FnMut(&str) -> String) -> String {
        let mut current = text.to_string();

        for _ in 0..self.max_depth {
            let next = pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }

        tracing::debug!(text = %current, max_depth = self.max_depth, "substitution depth exhausted");
        current
    }
}

/// Shorthand for [Substitutor::substitute]
pub fn substitute(text: &str, namespace: &Namespace, max_depth: usize) -> String {
    Substitutor::new(namespace, max_depth).substitute(text)
}

/// Expressions of all sigils whose values get re-scanned
fn recursive_references(text: &str) -> impl Iterator<Item = &str> {
    RECUR_STR_PATTERN
        .captures_iter(text)
        .chain(RECUR_PATH_PATTERN.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Lexically clean up a path
///
/// Collapses repeated separators and `.` components, resolves `..` against preceding
/// components. A leading `./` is kept.
pub fn normalize_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("./") {
        let rest = normalize_components(rest.trim_start_matches(SEPARATOR));
        return if rest == "." {
            rest
        } else {
            format!(".{SEPARATOR}{rest}")
        };
    }

    normalize_components(path)
}

fn normalize_components(path: &str) -> String {
    let absolute = path.starts_with(SEPARATOR);
    let mut components: Vec<&str> = vec![];

    for component in path.split(SEPARATOR) {
        match component {
            "" | "." => {}
            ".." => {
                if components.last().is_some_and(|last| *last != "..") {
                    components.pop();
                } else if !absolute {
                    components.push("..");
                }
            }
            other => components.push(other),
        }
    }

    let separator = SEPARATOR.to_string();
    let joined = components.join(separator.as_str());
    match (absolute, joined.is_empty()) {
        (true, _) => format!("{SEPARATOR}{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn namespace(json: serde_json::Value) -> Namespace {
        let Value::Object(map) = Value::from(json) else {
            panic!("namespace must be built from an object");
        };
        Namespace::new(&map)
    }

    fn sub(text: &str, ns: &Namespace) -> String {
        substitute(text, ns, DEFAULT_MAX_DEPTH)
    }

    #[test]
    fn env() {
        std::env::set_var("JCFG_TEST_ENV_HOME", "/usr/alice");
        std::env::remove_var("JCFG_TEST_ENV_UNSET");
        let ns = Namespace::default();

        assert_eq!(sub("{JCFG_TEST_ENV_HOME}", &ns), "/usr/alice");
        assert_eq!(sub("{JCFG_TEST_ENV_UNSET}", &ns), "{JCFG_TEST_ENV_UNSET}");
    }

    #[test]
    fn env_feeds_variables() {
        std::env::set_var("JCFG_TEST_ENV_KEY", "name");
        let ns = namespace(json!({ "model": { "name": "resnet" } }));

        assert_eq!(sub("$model.{JCFG_TEST_ENV_KEY}$", &ns), "resnet");
    }

    #[test]
    fn recursive_string() {
        let ns = namespace(json!({ "a": "$b$-a", "b": "$c$-b", "c": "c" }));
        assert_eq!(sub("x $a$", &ns), "x c-b-a");
    }

    #[test]
    fn indexed_variable() {
        let ns = namespace(json!({ "a": { "b": ["p", "q", "r"] } }));
        assert_eq!(sub("$a.b[1]$", &ns), "q");
        assert_eq!(sub("$a.b[5]$", &ns), "$a.b[5]$");
    }

    #[test]
    fn unknown_variables_stay_verbatim() {
        let ns = namespace(json!({ "a": 1 }));
        assert_eq!(sub("$nope$ !nope! %nope%", &ns), "$nope$ !nope! %nope%");
    }

    #[test]
    fn raw_is_not_rescanned() {
        let ns = namespace(json!({ "a": "$b$", "b": "resolved" }));
        assert_eq!(sub("!a!", &ns), "$b$");
        assert_eq!(sub("$a$", &ns), "resolved");
    }

    #[test]
    fn non_string_values_are_rendered() {
        let ns = namespace(json!({ "n": 3, "f": 0.25, "on": true, "l": [1, 2] }));
        assert_eq!(sub("$n$ $f$ $on$ !l!", &ns), "3 0.25 true [1,2]");
    }

    #[test]
    fn path_fragments_get_separators() {
        let ns = namespace(json!({ "root": "data", "file": "w.bin" }));
        assert_eq!(sub("%root%%file%", &ns), "/data/w.bin");
        assert_eq!(sub("./%root%models", &ns), "./data/models");
    }

    #[test]
    fn path_no_doubled_separators() {
        let ns = namespace(json!({ "a": "x/", "b": "/y" }));
        assert_eq!(sub("%a%/%b%", &ns), "/x/y");
    }

    #[test]
    fn path_values_resolve_recursively() {
        let ns = namespace(json!({ "base": "/srv", "dir": "$base$/cache" }));
        assert_eq!(sub("%dir%file", &ns), "/srv/cache/file");
    }

    #[test]
    fn plain_text_is_not_normalized() {
        let ns = Namespace::default();
        assert_eq!(sub("http://host//a/../b", &ns), "http://host//a/../b");
        assert_eq!(sub("", &ns), "");
    }

    #[test]
    fn idempotent() {
        let ns = namespace(json!({
            "a": "$b$", "b": "text", "p": "dir", "r": "raw text", "l": [1]
        }));

        for text in ["$a$ %p%x !r! {JCFG_TEST_UNSET_IDEMPOTENT}", "!l! $missing$", "%p%"] {
            let once = sub(text, &ns);
            assert_eq!(sub(&once, &ns), once, "{text}");
        }
    }

    #[test]
    fn depth_bound_stops_growth() {
        let ns = namespace(json!({ "a": "x$a$" }));
        let out = substitute("$a$", &ns, 3);
        assert_eq!(out, "xxx$a$");
    }

    #[test]
    fn cycles() {
        let ns = namespace(json!({ "a": "$b$", "b": "%c%", "c": "$a$", "d": "$e$", "e": "ok" }));
        let substitutor = Substitutor::new(&ns, DEFAULT_MAX_DEPTH);

        assert_eq!(
            substitutor.find_cycle("pre $a$"),
            Some(CyclicReference {
                chain: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            })
        );
        assert_eq!(substitutor.find_cycle("$d$ $d$ !a!"), None);
    }

    #[test]
    fn excluded_references_stay_verbatim() {
        let ns = namespace(json!({ "a": "$a$$a$", "p": "%a%x", "b": "ok" }));
        let mut substitutor = Substitutor::new(&ns, DEFAULT_MAX_DEPTH);
        substitutor.exclude(["a".to_string()]);

        assert_eq!(substitutor.substitute("$a$ %a% $b$ $p$"), "$a$ %a% ok %a%x");
        assert_eq!(substitutor.find_cycle("$a$"), None);
    }

    #[test]
    fn unicode_word_names() {
        let ns = namespace(json!({ "cafe\u{301}": "espresso" }));
        assert_eq!(sub("$cafe\u{301}$", &ns), "espresso");
    }

    #[test]
    fn normalize() {
        for (input, expected) in [
            ("/a//b/./c/", "/a/b/c"),
            ("a/../../b", "../b"),
            ("/../a", "/a"),
            ("./", "."),
            (".//x/../y", "./y"),
            ("a/..", "."),
        ] {
            assert_eq!(normalize_path(input), expected, "{input}");
        }
    }
}
