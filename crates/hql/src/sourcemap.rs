//! Source-map v3 generation.
//!
//! The emitter records raw mappings as it writes; `build` groups them by
//! generated line and encodes the relative-field base64 VLQ `mappings`
//! string. Raw mappings are kept on the built map so in-process consumers
//! (runtime stack-trace rewriting) can look positions up without decoding.

use serde::Serialize;

const BASE64_CHARS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// One mapping from a generated position to an original position.
/// All fields are zero-based, per the source-map spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawMapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source_index: u32,
    pub original_line: u32,
    pub original_column: u32,
}

/// A standard source-map v3 document.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMap {
    pub version: u32,
    pub file: String,
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
    /// Raw mappings, ordered by generated position; not part of the
    /// serialized document.
    #[serde(skip)]
    raw: Vec<RawMapping>,
}

impl SourceMap {
    /// Finds the original position for a generated position: the last
    /// mapping at or before `(line, column)` on that generated line.
    #[must_use]
    pub fn lookup(&self, generated_line: u32, generated_column: u32) -> Option<(&str, u32, u32)> {
        let mut best: Option<&RawMapping> = None;
        for mapping in &self.raw {
            if mapping.generated_line != generated_line {
                continue;
            }
            if mapping.generated_column <= generated_column
                && best.is_none_or(|b| mapping.generated_column >= b.generated_column)
            {
                best = Some(mapping);
            }
        }
        // Columns past the last mapping on the line still map to it.
        let best = best.or_else(|| self.raw.iter().filter(|m| m.generated_line == generated_line).next_back())?;
        let source = self.sources.get(best.source_index as usize)?;
        Some((source, best.original_line, best.original_column))
    }

    /// The raw mappings, ordered by generated position.
    #[must_use]
    pub fn mappings(&self) -> &[RawMapping] {
        &self.raw
    }

    /// The serialized JSON document.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("source map serialization cannot fail")
    }
}

/// Accumulates mappings during emission.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    mappings: Vec<RawMapping>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source file, reusing its index when already present.
    pub fn add_source(&mut self, path: &str) -> u32 {
        if let Some(index) = self.sources.iter().position(|s| s == path) {
            return u32::try_from(index).expect("source count fits u32");
        }
        self.sources.push(path.to_owned());
        u32::try_from(self.sources.len() - 1).expect("source count fits u32")
    }

    /// Adds one mapping; positions are zero-based. Successive mappings at
    /// the same generated position collapse to the innermost (last) one,
    /// so each generated position resolves to a single original.
    pub fn add_mapping(&mut self, mapping: RawMapping) {
        if let Some(last) = self.mappings.last_mut() {
            if last.generated_line == mapping.generated_line && last.generated_column == mapping.generated_column {
                *last = mapping;
                return;
            }
        }
        self.mappings.push(mapping);
    }

    /// Finishes the document for the named generated file.
    #[must_use]
    pub fn build(mut self, file: &str) -> SourceMap {
        self.mappings
            .sort_by_key(|m| (m.generated_line, m.generated_column));
        self.mappings.dedup();
        let mappings = encode_mappings(&self.mappings);
        SourceMap {
            version: 3,
            file: file.to_owned(),
            sources: self.sources,
            names: Vec::new(),
            mappings,
            raw: self.mappings,
        }
    }
}

/// Encodes sorted mappings into the `;`/`,` separated VLQ string. Fields
/// are deltas: generated column resets per line, the rest carry across
/// the whole document.
fn encode_mappings(mappings: &[RawMapping]) -> String {
    let mut out = String::new();
    let mut current_line = 0u32;
    let mut prev_generated_column = 0i64;
    let mut prev_source = 0i64;
    let mut prev_original_line = 0i64;
    let mut prev_original_column = 0i64;
    let mut first_on_line = true;

    for mapping in mappings {
        while current_line < mapping.generated_line {
            out.push(';');
            current_line += 1;
            prev_generated_column = 0;
            first_on_line = true;
        }
        if !first_on_line {
            out.push(',');
        }
        first_on_line = false;

        encode_vlq(&mut out, i64::from(mapping.generated_column) - prev_generated_column);
        encode_vlq(&mut out, i64::from(mapping.source_index) - prev_source);
        encode_vlq(&mut out, i64::from(mapping.original_line) - prev_original_line);
        encode_vlq(&mut out, i64::from(mapping.original_column) - prev_original_column);

        prev_generated_column = i64::from(mapping.generated_column);
        prev_source = i64::from(mapping.source_index);
        prev_original_line = i64::from(mapping.original_line);
        prev_original_column = i64::from(mapping.original_column);
    }
    out
}

fn encode_vlq(out: &mut String, value: i64) {
    // Sign goes in the low bit.
    let mut vlq = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0b1_1111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(gl: u32, gc: u32, ol: u32, oc: u32) -> RawMapping {
        RawMapping {
            generated_line: gl,
            generated_column: gc,
            source_index: 0,
            original_line: ol,
            original_column: oc,
        }
    }

    #[test]
    fn vlq_encodes_known_values() {
        let mut out = String::new();
        encode_vlq(&mut out, 0);
        assert_eq!(out, "A");
        out.clear();
        encode_vlq(&mut out, 1);
        assert_eq!(out, "C");
        out.clear();
        encode_vlq(&mut out, -1);
        assert_eq!(out, "D");
        out.clear();
        encode_vlq(&mut out, 16);
        assert_eq!(out, "gB");
    }

    #[test]
    fn first_mapping_at_origin_encodes_as_aaaa() {
        let encoded = encode_mappings(&[mapping(0, 0, 0, 0)]);
        assert_eq!(encoded, "AAAA");
    }

    #[test]
    fn line_breaks_emit_semicolons_and_reset_columns() {
        let encoded = encode_mappings(&[mapping(0, 0, 0, 0), mapping(2, 0, 1, 0)]);
        assert_eq!(encoded, "AAAA;;AACA");
    }

    #[test]
    fn lookup_returns_nearest_mapping_on_line() {
        let mut builder = SourceMapBuilder::new();
        builder.add_source("a.hql");
        builder.add_mapping(mapping(0, 0, 4, 2));
        builder.add_mapping(mapping(0, 10, 5, 0));
        let map = builder.build("a.js");
        assert_eq!(map.lookup(0, 3), Some(("a.hql", 4, 2)));
        assert_eq!(map.lookup(0, 10), Some(("a.hql", 5, 0)));
        assert_eq!(map.lookup(0, 99), Some(("a.hql", 5, 0)));
        assert_eq!(map.lookup(7, 0), None);
    }
}
