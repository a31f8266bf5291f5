//! Conversion options

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::util::{Error, Result};

/// Options for one conversion. Missing keys in a JSON file keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Write the layered payload structure; `false` writes one flattened file.
    pub layer_structure: bool,
    /// Author the physics scene prim.
    pub scene: bool,
    /// Layer `doc` string, omitted when empty.
    pub comment: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            layer_structure: true,
            scene: true,
            comment: String::new(),
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save options as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let opts: ConvertOptions = serde_json::from_str(r#"{"scene": false}"#).unwrap();
        assert!(opts.layer_structure);
        assert!(!opts.scene);
        assert!(opts.comment.is_empty());
    }

    #[test]
    fn test_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.json");
        let opts = ConvertOptions { comment: "built nightly".into(), ..Default::default() };
        opts.save(&path).unwrap();
        assert_eq!(ConvertOptions::load(&path).unwrap(), opts);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ConvertOptions::load(&path), Err(Error::Json(_))));
        assert!(matches!(ConvertOptions::load(dir.path().join("x.json")), Err(Error::InputNotFound(_))));
    }
}
