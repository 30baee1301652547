//! Language detection and tree-sitter grammar loading

use std::path::Path;

/// Source languages Sigrun can instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    JavaScriptReact,
    TypeScript,
    TypeScriptReact,
    Unknown,
}

impl Language {
    /// Detect language from file path
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Language::JavaScript,
            "jsx" => Language::JavaScriptReact,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::TypeScriptReact,
            _ => Language::Unknown,
        }
    }

    /// Get the language name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::JavaScriptReact => "javascriptreact",
            Language::TypeScript => "typescript",
            Language::TypeScriptReact => "typescriptreact",
            Language::Unknown => "unknown",
        }
    }

    /// Check if this language can be instrumented
    pub fn is_supported(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    /// Get the tree-sitter grammar for this language
    ///
    /// The JavaScript grammar covers JSX; `.tsx` needs the dedicated TSX
    /// grammar because the plain TypeScript grammar cannot parse JSX.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::JavaScript | Language::JavaScriptReact => {
                Some(tree_sitter_javascript::LANGUAGE.into())
            }
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::TypeScriptReact => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::Unknown => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path(Path::new("foo.js")), Language::JavaScript);
        assert_eq!(Language::from_path(Path::new("foo.mjs")), Language::JavaScript);
        assert_eq!(Language::from_path(Path::new("foo.cjs")), Language::JavaScript);
        assert_eq!(Language::from_path(Path::new("App.jsx")), Language::JavaScriptReact);
        assert_eq!(Language::from_path(Path::new("bar.ts")), Language::TypeScript);
        assert_eq!(Language::from_path(Path::new("App.tsx")), Language::TypeScriptReact);
        assert_eq!(Language::from_path(Path::new("data.json")), Language::Unknown);
    }

    #[test]
    fn test_all_supported_languages_have_grammars() {
        for language in [
            Language::JavaScript,
            Language::JavaScriptReact,
            Language::TypeScript,
            Language::TypeScriptReact,
        ] {
            assert!(language.tree_sitter_language().is_some(), "{}", language);
        }
        assert!(Language::Unknown.tree_sitter_language().is_none());
    }
}
