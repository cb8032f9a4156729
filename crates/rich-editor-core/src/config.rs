//! Editor configuration.
//!
//! `EditorConfig` is plain serde data so hosts can ship it as JSON. Indent
//! boundary patterns are compiled once into `IndentBoundaries` when an
//! editor is built from the config.

use regex::Regex;
use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::ConfigError;

/// Tunables for one editor instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Deepest list nesting reachable with Tab.
    pub max_list_depth: usize,
    /// History entries kept on each of the undo and redo stacks.
    pub undo_limit: usize,
    /// Mutually exclusive highlight color styles.
    pub color_family: Vec<SmolStr>,
    /// Color applied by the highlight key binding.
    pub highlight_color: SmolStr,
    /// Mutually exclusive indent marker styles: `[indent, outdent]`.
    pub indent_family: [SmolStr; 2],
    /// Backing text of an insert-point marker.
    pub insert_point_literal: SmolStr,
    /// `className` carried by insert-point entities.
    pub insert_point_class: SmolStr,
    /// Paste everything as plain text.
    pub strip_pasted_styles: bool,
    /// Patterns splitting indented runs into their own paragraphs.
    pub indent_boundaries: Option<IndentBoundaryPatterns>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_list_depth: 2,
            undo_limit: 100,
            color_family: [
                "default", "red", "orange", "yellow", "green", "blue", "indigo", "violet",
            ]
            .iter()
            .map(|c| smol_str::format_smolstr!("{c}-dropdown_option"))
            .collect(),
            highlight_color: SmolStr::new_static("yellow-dropdown_option"),
            indent_family: [
                SmolStr::new_static("text-indent"),
                SmolStr::new_static("text-outdent"),
            ],
            insert_point_literal: SmolStr::new_static("<||>"),
            insert_point_class: SmolStr::new_static("orange_insert-point"),
            strip_pasted_styles: false,
            indent_boundaries: None,
        }
    }
}

impl EditorConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn indent_style(&self) -> &str {
        &self.indent_family[0]
    }

    pub fn outdent_style(&self) -> &str {
        &self.indent_family[1]
    }

    pub fn is_color(&self, style: &str) -> bool {
        self.color_family.iter().any(|c| c == style)
    }

    /// Compile the configured boundary patterns, if any.
    pub fn compile_boundaries(&self) -> Result<Option<IndentBoundaries>, ConfigError> {
        self.indent_boundaries
            .as_ref()
            .map(IndentBoundaries::compile)
            .transpose()
    }
}

/// Uncompiled indent boundary patterns, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndentBoundaryPatterns {
    /// Matches an indented run in the middle of a paragraph.
    pub common: String,
    /// Matches an indented run opening a paragraph.
    pub start: String,
    /// Matches an indented run closing a paragraph.
    pub end: String,
}

/// Compiled indent boundary regexes.
#[derive(Debug, Clone)]
pub struct IndentBoundaries {
    pub common: Regex,
    pub start: Regex,
    pub end: Regex,
}

impl IndentBoundaries {
    pub fn compile(patterns: &IndentBoundaryPatterns) -> Result<Self, ConfigError> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.to_string(),
                source,
            })
        };
        Ok(Self {
            common: build(&patterns.common)?,
            start: build(&patterns.start)?,
            end: build(&patterns.end)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.max_list_depth, 2);
        assert_eq!(config.color_family.len(), 8);
        assert!(config.is_color("violet-dropdown_option"));
        assert!(!config.is_color("text-indent"));
        assert_eq!(config.insert_point_literal.chars().count(), 4);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EditorConfig::from_json(r#"{"maxListDepth": 4, "stripPastedStyles": true}"#)
            .unwrap();
        assert_eq!(config.max_list_depth, 4);
        assert!(config.strip_pasted_styles);
        assert_eq!(config.undo_limit, 100);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EditorConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_compile_boundaries() {
        let config = EditorConfig::from_json(
            r#"{"indentBoundaries": {"common": "a+", "start": "^b", "end": "c$"}}"#,
        )
        .unwrap();
        let compiled = config.compile_boundaries().unwrap().unwrap();
        assert!(compiled.common.is_match("xaay"));

        let bad = EditorConfig {
            indent_boundaries: Some(IndentBoundaryPatterns {
                common: "(".into(),
                start: "x".into(),
                end: "y".into(),
            }),
            ..EditorConfig::default()
        };
        assert!(matches!(
            bad.compile_boundaries(),
            Err(ConfigError::Pattern { .. })
        ));
    }
}
