//! Comment syntax configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comment markers for one language family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSyntax {
    /// Line comment prefixes (e.g. `//`, `#`).
    #[serde(default)]
    pub line: Vec<String>,

    /// Block comment delimiters (e.g. `/*`, `*/`).
    #[serde(default)]
    pub block: Vec<(String, String)>,
}

impl CommentSyntax {
    fn new(line: &[&str], block: &[(&str, &str)]) -> Self {
        Self {
            line: line.iter().map(|s| s.to_string()).collect(),
            block: block
                .iter()
                .map(|(open, close)| (open.to_string(), close.to_string()))
                .collect(),
        }
    }
}

/// Scanner configuration: comment syntax keyed by lowercase file extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub syntaxes: HashMap<String, CommentSyntax>,
}

impl ScannerConfig {
    /// Look up the syntax for an extension (without the leading dot).
    pub fn syntax_for(&self, extension: Option<&str>) -> Option<&CommentSyntax> {
        let ext = extension?.to_ascii_lowercase();
        self.syntaxes.get(&ext)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let c_like = CommentSyntax::new(&["//"], &[("/*", "*/")]);
        let hash = CommentSyntax::new(&["#"], &[]);
        let sql = CommentSyntax::new(&["--"], &[("/*", "*/")]);
        let markup = CommentSyntax::new(&[], &[("<!--", "-->")]);

        let mut syntaxes = HashMap::new();
        for ext in [
            "rs", "c", "h", "cc", "cpp", "hpp", "java", "js", "jsx", "ts", "tsx", "go", "swift",
            "kt", "cs", "scala", "dart",
        ] {
            syntaxes.insert(ext.to_string(), c_like.clone());
        }
        for ext in ["py", "sh", "bash", "rb", "toml", "yaml", "yml", "pl", "r"] {
            syntaxes.insert(ext.to_string(), hash.clone());
        }
        syntaxes.insert("sql".to_string(), sql.clone());
        syntaxes.insert("lua".to_string(), CommentSyntax::new(&["--"], &[("--[[", "]]")]));
        for ext in ["html", "xml", "svg", "vue"] {
            syntaxes.insert(ext.to_string(), markup.clone());
        }
        syntaxes.insert(
            "css".to_string(),
            CommentSyntax::new(&[], &[("/*", "*/")]),
        );

        Self { syntaxes }
    }
}
