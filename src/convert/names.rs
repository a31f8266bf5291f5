//! Unique, valid prim names per parent scope.

use std::collections::{HashMap, HashSet};

use crate::usd::{is_valid_identifier, PrimPath};

/// Prefix marking a name that had illegal characters escaped.
const ESCAPE_PREFIX: &str = "tn__";

/// Reserved names per scope. Reservations are never released, so the same
/// sequence of requests always yields the same names.
#[derive(Debug, Default)]
pub struct NameCache {
    scopes: HashMap<PrimPath, HashSet<String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a valid name under `scope` derived from `candidate`.
    ///
    /// An empty candidate uses `fallback`. Collisions get the smallest
    /// free `_N` suffix.
    pub fn get_name(&mut self, scope: &PrimPath, candidate: &str, fallback: &str) -> String {
        let base = sanitize(if candidate.is_empty() { fallback } else { candidate });
        let reserved = self.scopes.entry(scope.clone()).or_default();
        if reserved.insert(base.clone()) {
            return base;
        }
        let mut n = 1usize;
        loop {
            let name = format!("{base}_{n}");
            if reserved.insert(name.clone()) {
                return name;
            }
            n += 1;
        }
    }

    /// Reserve names for several candidates in order.
    pub fn get_names(&mut self, scope: &PrimPath, candidates: &[String], fallback: &str) -> Vec<String> {
        candidates.iter().map(|c| self.get_name(scope, c, fallback)).collect()
    }

    pub fn is_reserved(&self, scope: &PrimPath, name: &str) -> bool {
        self.scopes.get(scope).is_some_and(|s| s.contains(name))
    }
}

/// Make `name` a legal identifier. Illegal characters become `_XX_`
/// (hex code point) behind a `tn__` prefix.
pub fn sanitize(name: &str) -> String {
    if is_valid_identifier(name) {
        return name.to_string();
    }
    let mut out = String::from(ESCAPE_PREFIX);
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push_str(&format!("_{:X}_", c as u32));
        }
    }
    out
}
