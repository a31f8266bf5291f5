//! Absolute node paths.

use std::fmt;

/// Absolute path to a prim, e.g. `/robot/Geometry/base`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimPath(String);

impl PrimPath {
    /// The pseudo-root `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse an absolute path. Trailing slashes are dropped.
    pub fn new(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            Self::root()
        } else if trimmed.starts_with('/') {
            Self(trimmed.to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a child segment.
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            Self(format!("/{name}"))
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(i) => Some(Self(self.0[..i].to_string())),
            None => None,
        }
    }

    /// Last segment, empty for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            ""
        } else {
            self.0.rsplit('/').next().unwrap_or("")
        }
    }

    /// Path segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// True if `prefix` is this path or one of its ancestors.
    pub fn has_prefix(&self, prefix: &PrimPath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/')
    }

    /// Move this path from under `from` to under `to`.
    pub fn replace_prefix(&self, from: &PrimPath, to: &PrimPath) -> Option<Self> {
        if !self.has_prefix(from) {
            return None;
        }
        let rest = if from.is_root() { &self.0[..] } else { &self.0[from.0.len()..] };
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            Some(to.clone())
        } else if to.is_root() {
            Some(Self(format!("/{rest}")))
        } else {
            Some(Self(format!("{}/{rest}", to.0)))
        }
    }
}

impl fmt::Display for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl From<&str> for PrimPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Path to a property on a prim, used by attribute connections.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    pub prim: PrimPath,
    pub property: String,
}

impl PropertyPath {
    pub fn new(prim: PrimPath, property: impl Into<String>) -> Self {
        Self { prim, property: property.into() }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.prim, self.property)
    }
}

/// True if `name` is a legal prim name: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_and_parent() {
        let p = PrimPath::root().child("robot").child("Geometry");
        assert_eq!(p.as_str(), "/robot/Geometry");
        assert_eq!(p.name(), "Geometry");
        assert_eq!(p.parent().unwrap().as_str(), "/robot");
        assert!(p.parent().unwrap().parent().unwrap().is_root());
        assert_eq!(PrimPath::root().parent(), None);
    }

    #[test]
    fn test_prefix_replacement() {
        let p = PrimPath::new("/Materials/red/Shader");
        let moved = p
            .replace_prefix(&PrimPath::new("/Materials/red"), &PrimPath::new("/robot/Materials/red"))
            .unwrap();
        assert_eq!(moved.as_str(), "/robot/Materials/red/Shader");
        assert!(!PrimPath::new("/Materials/redder").has_prefix(&PrimPath::new("/Materials/red")));
        assert!(p.replace_prefix(&PrimPath::new("/Other"), &PrimPath::root()).is_none());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_valid_identifier("body_1"));
        assert!(is_valid_identifier("_x"));
        assert!(!is_valid_identifier("1body"));
        assert!(!is_valid_identifier("Body 1"));
        assert!(!is_valid_identifier(""));
    }
}
