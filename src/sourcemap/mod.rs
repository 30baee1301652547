//! Source map reading, emission, and position lookup
//!
//! Handles the v3 interchange format two ways: reading maps that ship with
//! compiled files (sidecar `<file>.map` files or inline base64
//! `sourceMappingURL` comments) so reported positions can point back at the
//! code the author wrote, and emitting line-granularity maps for files the
//! instrumentation engine rewrites.

use crate::core::error::Result;
use base64::Engine as _;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Base64 alphabet shared by VLQ segments and inline map payloads
const VLQ_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Continuation flag in a VLQ digit
const VLQ_CONTINUATION: u32 = 0x20;

/// Value bits of a VLQ digit
const VLQ_MASK: u32 = 0x1f;

static INLINE_MAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"//# sourceMappingURL=data:application/json;base64,([A-Za-z0-9+/=]+)").unwrap()
});

/// One decoded mapping segment that carries source information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    generated_column: u32,
    source: u32,
    original_line: u32,
    original_column: u32,
}

/// A position in the original source that a mapping points back to
///
/// `line` is 1-based and `column` 0-based, matching the recorded function
/// positions they replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: usize,
    pub column: usize,
}

/// A v3 source map
///
/// Unknown fields are ignored on read; the decoded mapping lines are cached
/// after the first lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
    #[serde(skip)]
    decoded: OnceCell<Vec<Vec<Segment>>>,
}

impl SourceMap {
    /// Parse a raw JSON source map
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the map for a file
    ///
    /// A `<file>.map` sidecar wins; otherwise the file itself is scanned for
    /// an inline base64 `sourceMappingURL` comment. Missing, unreadable, and
    /// malformed maps all yield `None`; a malformed sidecar does not fall
    /// through to the inline comment.
    pub fn for_file(path: &Path) -> Option<Self> {
        let sidecar = sidecar_path(path);
        if sidecar.exists() {
            let content = std::fs::read_to_string(&sidecar).ok()?;
            return Self::parse(&content).ok();
        }

        let content = std::fs::read_to_string(path).ok()?;
        let captured = INLINE_MAP.captures(&content)?;
        let payload = base64::engine::general_purpose::STANDARD
            .decode(captured[1].as_bytes())
            .ok()?;
        let json = String::from_utf8(payload).ok()?;
        Self::parse(&json).ok()
    }

    /// Build a line-shift map for a rewritten file
    ///
    /// `generated_lines` counts the lines of the rewritten text and
    /// `inserted_line` is the 0-based line an injected statement occupies,
    /// if one was injected. The inserted line maps to nothing; every other
    /// line maps straight back to its original line at column 0.
    pub fn from_line_shift(
        source: &str,
        generated_lines: usize,
        inserted_line: Option<usize>,
    ) -> Self {
        let mut mappings = String::new();
        let mut previous_line: i64 = 0;

        for generated in 0..generated_lines {
            if generated > 0 {
                mappings.push(';');
            }
            let original = match inserted_line {
                Some(inserted) if generated == inserted => continue,
                Some(inserted) if generated > inserted => generated - 1,
                _ => generated,
            };

            encode_vlq(0, &mut mappings);
            encode_vlq(0, &mut mappings);
            encode_vlq(original as i64 - previous_line, &mut mappings);
            encode_vlq(0, &mut mappings);
            previous_line = original as i64;
        }

        Self {
            version: 3,
            file: None,
            source_root: None,
            sources: vec![source.to_string()],
            names: Vec::new(),
            mappings,
            decoded: OnceCell::new(),
        }
    }

    /// Map a generated position back to the original source
    ///
    /// `line` is 1-based and `column` 0-based. The segment is chosen by
    /// greatest lower bound on the generated column; lines without mappings
    /// return `None`.
    pub fn lookup(&self, line: usize, column: usize) -> Option<OriginalPosition> {
        let lines = self.decoded();
        let segments = lines.get(line.checked_sub(1)?)?;
        let segment = segments
            .iter()
            .rev()
            .find(|s| s.generated_column as usize <= column)?;

        Some(OriginalPosition {
            source: self.resolve_source(segment.source as usize)?,
            line: segment.original_line as usize + 1,
            column: segment.original_column as usize,
        })
    }

    fn decoded(&self) -> &[Vec<Segment>] {
        self.decoded.get_or_init(|| decode_mappings(&self.mappings))
    }

    /// Source path at an index, joined under `sourceRoot` when one is set
    fn resolve_source(&self, index: usize) -> Option<String> {
        let source = self.sources.get(index)?;
        match self.source_root.as_deref() {
            Some(root) if !root.is_empty() => {
                Some(format!("{}/{}", root.trim_end_matches('/'), source))
            }
            _ => Some(source.clone()),
        }
    }
}

/// Remaps recorded positions through per-file source maps
///
/// Maps are loaded lazily and cached per file, negative results included, so
/// a report over many functions touches each map file once.
pub struct SourceMapper {
    root: PathBuf,
    maps: HashMap<PathBuf, Option<SourceMap>>,
    remapped: usize,
}

impl SourceMapper {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            maps: HashMap::new(),
            remapped: 0,
        }
    }

    /// Re-localize one recorded position
    ///
    /// Returns `None` when the file has no usable map or the map does not
    /// cover the position; callers keep the unmapped position in that case.
    pub fn remap(&mut self, file: &str, line: usize, column: usize) -> Option<OriginalPosition> {
        let path = self.resolve(file);
        let map = self
            .maps
            .entry(path.clone())
            .or_insert_with(|| SourceMap::for_file(&path));

        let position = map.as_ref()?.lookup(line, column)?;
        self.remapped += 1;
        Some(position)
    }

    /// Whether any position has actually remapped so far
    pub fn any_remapped(&self) -> bool {
        self.remapped > 0
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".map");
    PathBuf::from(os)
}

/// Decode a `mappings` string into per-line segments
///
/// Only segments that carry source information (four or five fields) are
/// kept, and malformed segments are dropped rather than failing the map.
fn decode_mappings(mappings: &str) -> Vec<Vec<Segment>> {
    let mut lines = Vec::new();
    let mut source: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;

    for raw_line in mappings.split(';') {
        let mut segments = Vec::new();
        let mut generated_column: i64 = 0;

        for raw_segment in raw_line.split(',') {
            if raw_segment.is_empty() {
                continue;
            }
            let Some(values) = decode_segment(raw_segment) else {
                continue;
            };

            generated_column += values[0];
            if values.len() < 4 {
                continue;
            }
            source += values[1];
            original_line += values[2];
            original_column += values[3];

            if generated_column < 0 || source < 0 || original_line < 0 || original_column < 0 {
                continue;
            }
            segments.push(Segment {
                generated_column: generated_column as u32,
                source: source as u32,
                original_line: original_line as u32,
                original_column: original_column as u32,
            });
        }

        segments.sort_by_key(|s| s.generated_column);
        lines.push(segments);
    }

    lines
}

/// Decode one comma-separated segment into its VLQ values
fn decode_segment(segment: &str) -> Option<Vec<i64>> {
    let mut values = Vec::with_capacity(5);
    let mut current: u64 = 0;
    let mut shift = 0u32;

    for byte in segment.bytes() {
        let digit = vlq_digit(byte)?;
        current |= u64::from(digit & VLQ_MASK) << shift;
        if digit & VLQ_CONTINUATION != 0 {
            shift += 5;
            if shift > 62 {
                return None;
            }
        } else {
            let magnitude = (current >> 1) as i64;
            values.push(if current & 1 == 1 { -magnitude } else { magnitude });
            current = 0;
            shift = 0;
        }
    }

    // A trailing continuation bit means the segment was truncated
    if shift != 0 || values.is_empty() {
        return None;
    }
    Some(values)
}

fn vlq_digit(byte: u8) -> Option<u32> {
    match byte {
        b'A'..=b'Z' => Some(u32::from(byte - b'A')),
        b'a'..=b'z' => Some(u32::from(byte - b'a') + 26),
        b'0'..=b'9' => Some(u32::from(byte - b'0') + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };

    loop {
        let mut digit = (vlq & u64::from(VLQ_MASK)) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION as usize;
        }
        out.push(VLQ_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn roundtrip(value: i64) -> i64 {
        let mut encoded = String::new();
        encode_vlq(value, &mut encoded);
        decode_segment(&encoded).unwrap()[0]
    }

    #[test]
    fn test_vlq_roundtrip() {
        for value in [0, 1, -1, 5, 9, 10, 15, 16, -16, 31, 32, 1000, -1000, 123456] {
            assert_eq!(roundtrip(value), value, "value {}", value);
        }
    }

    #[test]
    fn test_decode_rejects_truncated_segment() {
        // 'g' has the continuation bit set and nothing follows
        assert_eq!(decode_segment("g"), None);
        assert_eq!(decode_segment(""), None);
        assert_eq!(decode_segment("A!"), None);
    }

    #[test]
    fn test_line_shift_map_lookup() {
        // Two original lines, import inserted at the top
        let map = SourceMap::from_line_shift("src/app.js", 3, Some(0));

        assert_eq!(map.sources, vec!["src/app.js".to_string()]);
        // The inserted line maps to nothing
        assert_eq!(map.lookup(1, 0), None);
        assert_eq!(map.lookup(2, 0).map(|p| p.line), Some(1));
        assert_eq!(map.lookup(3, 4).map(|p| p.line), Some(2));
        assert_eq!(map.lookup(4, 0), None);
    }

    #[test]
    fn test_identity_map_without_insertion() {
        let map = SourceMap::from_line_shift("src/app.js", 2, None);

        assert_eq!(map.lookup(1, 0).map(|p| p.line), Some(1));
        assert_eq!(map.lookup(2, 7).map(|p| p.line), Some(2));
    }

    #[test]
    fn test_insertion_mid_file() {
        // Directive prologue on line 1, import inserted on line 2
        let map = SourceMap::from_line_shift("src/app.js", 4, Some(1));

        assert_eq!(map.lookup(1, 0).map(|p| p.line), Some(1));
        assert_eq!(map.lookup(2, 0), None);
        assert_eq!(map.lookup(3, 0).map(|p| p.line), Some(2));
        assert_eq!(map.lookup(4, 0).map(|p| p.line), Some(3));
    }

    #[test]
    fn test_greatest_lower_bound_lookup() {
        // Line 1 has segments at generated columns 0 and 10; the second maps
        // to original column 5
        let map = SourceMap {
            version: 3,
            file: None,
            source_root: None,
            sources: vec!["src/app.ts".to_string()],
            names: Vec::new(),
            mappings: "AAAA,UAAK".to_string(),
            decoded: OnceCell::new(),
        };

        assert_eq!(map.lookup(1, 4).map(|p| p.column), Some(0));
        assert_eq!(map.lookup(1, 10).map(|p| p.column), Some(5));
        assert_eq!(map.lookup(1, 40).map(|p| p.column), Some(5));
    }

    #[test]
    fn test_source_root_prefixes_sources() {
        let map = SourceMap::parse(
            r#"{"version":3,"sourceRoot":"webpack://app/","sources":["src/a.ts"],"mappings":"AAAA"}"#,
        )
        .unwrap();

        assert_eq!(
            map.lookup(1, 0).map(|p| p.source),
            Some("webpack://app/src/a.ts".to_string())
        );
    }

    #[test]
    fn test_for_file_reads_sidecar() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.js");
        std::fs::write(&file, "var x = 1;\n").unwrap();
        std::fs::write(
            temp.path().join("app.js.map"),
            r#"{"version":3,"sources":["app.ts"],"mappings":"AAAA"}"#,
        )
        .unwrap();

        let map = SourceMap::for_file(&file).expect("sidecar map");
        assert_eq!(map.sources, vec!["app.ts".to_string()]);
    }

    #[test]
    fn test_for_file_reads_inline_comment() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.js");
        let raw = r#"{"version":3,"sources":["app.ts"],"mappings":"AAAA"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        std::fs::write(
            &file,
            format!("var x = 1;\n//# sourceMappingURL=data:application/json;base64,{encoded}\n"),
        )
        .unwrap();

        let map = SourceMap::for_file(&file).expect("inline map");
        assert_eq!(map.sources, vec!["app.ts".to_string()]);
    }

    #[test]
    fn test_for_file_malformed_sidecar_wins_over_inline() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.js");
        let raw = r#"{"version":3,"sources":["app.ts"],"mappings":"AAAA"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        std::fs::write(
            &file,
            format!("var x = 1;\n//# sourceMappingURL=data:application/json;base64,{encoded}\n"),
        )
        .unwrap();
        std::fs::write(temp.path().join("app.js.map"), "{not json").unwrap();

        assert!(SourceMap::for_file(&file).is_none());
    }

    #[test]
    fn test_for_file_missing() {
        let temp = TempDir::new().unwrap();
        assert!(SourceMap::for_file(&temp.path().join("nope.js")).is_none());
    }

    #[test]
    fn test_mapper_remaps_and_counts() {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join("app.js"), "var x = 1;\n").unwrap();
        // Line 1 of dist/app.js came from line 10 of src/app.ts
        std::fs::write(
            dist.join("app.js.map"),
            r#"{"version":3,"sources":["src/app.ts"],"mappings":"AASA"}"#,
        )
        .unwrap();

        let mut mapper = SourceMapper::new(temp.path());
        assert!(!mapper.any_remapped());

        let position = mapper.remap("dist/app.js", 1, 0).expect("remap");
        assert_eq!(position.source, "src/app.ts");
        assert_eq!(position.line, 10);
        assert!(mapper.any_remapped());
    }

    #[test]
    fn test_mapper_falls_back_without_map() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.js"), "var x = 1;\n").unwrap();

        let mut mapper = SourceMapper::new(temp.path());
        assert_eq!(mapper.remap("app.js", 1, 0), None);
        // A second miss hits the cached negative result
        assert_eq!(mapper.remap("app.js", 3, 0), None);
        assert!(!mapper.any_remapped());
    }

    #[test]
    fn test_serialized_shape() {
        let map = SourceMap::from_line_shift("src/app.js", 2, Some(0));
        let json = serde_json::to_string(&map).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], 3);
        assert_eq!(value["sources"][0], "src/app.js");
        assert!(value["mappings"].is_string());
        assert!(value.get("sourceRoot").is_none());
    }
}
