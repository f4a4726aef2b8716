//! Tags carried by graph nodes, and the explicit-coordinate memo convention.

use regex::Regex;
use serde::Serialize;

use crate::constants::{MEMO_ATTR, PUBKEY_ATTR};
use crate::graph::GraphNode;

/// A public key someone attached text to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub public_key: String,
    pub memo: String,
}

impl Tag {
    pub fn new(public_key: impl Into<String>, memo: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            memo: memo.into(),
        }
    }

    /// A node is a tag only if it has a non-empty `pubkey` and a `memo`.
    pub fn from_node(node: &GraphNode) -> Option<Self> {
        let public_key = node.attr(PUBKEY_ATTR).filter(|k| !k.is_empty())?;
        let memo = node.attr(MEMO_ATTR)?;
        Some(Self::new(public_key, memo))
    }
}

/// Tags in node order. Nodes missing either attribute are skipped.
pub fn extract_tags(nodes: &[GraphNode]) -> Vec<Tag> {
    let tags: Vec<Tag> = nodes.iter().filter_map(Tag::from_node).collect();
    let skipped = nodes.len() - tags.len();
    if skipped > 0 {
        tracing::debug!(skipped, "graph nodes without pubkey/memo ignored");
    }
    tags
}

/// Coordinate spelled out in a memo: `{namespace}/T+{second}s/{column}x{row}/{text}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitCoordinate {
    pub second: u64,
    pub column: u32,
    pub row: u32,
    pub text: String,
}

/// Parser for the explicit memo convention, bound to one namespace.
///
/// The namespace is matched literally at the start of the memo; a memo under
/// any other namespace, or with non-numeric components, does not parse.
#[derive(Debug, Clone)]
pub struct ExplicitMemoParser {
    pattern: Regex,
}

impl ExplicitMemoParser {
    pub fn new(namespace: &str) -> Self {
        let pattern = format!(
            r"(?s)\A{}/T\+([0-9]+)s/([0-9]+)x([0-9]+)/(.*)\z",
            regex::escape(namespace)
        );
        // Escaped literal plus a fixed suffix is always a valid pattern.
        let pattern = Regex::new(&pattern).expect("escaped namespace yields a valid pattern");
        Self { pattern }
    }

    pub fn parse(&self, memo: &str) -> Option<ExplicitCoordinate> {
        let caps = self.pattern.captures(memo)?;
        Some(ExplicitCoordinate {
            second: caps[1].parse().ok()?,
            column: caps[2].parse().ok()?,
            row: caps[3].parse().ok()?,
            text: caps[4].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::decode_nodes;

    #[test]
    fn test_extract_requires_both_attributes() {
        let nodes = decode_nodes(
            r#""a" [pubkey="k1" memo="m1"]; "b" [pubkey="k2"]; "c" [memo="m3"]; "d" [pubkey="" memo="x"];"#,
        );
        let tags = extract_tags(&nodes);
        assert_eq!(tags, vec![Tag::new("k1", "m1")]);
    }

    #[test]
    fn test_empty_memo_is_still_a_tag() {
        let nodes = decode_nodes(r#""a" [pubkey="k1" memo=""];"#);
        assert_eq!(extract_tags(&nodes), vec![Tag::new("k1", "")]);
    }

    #[test]
    fn test_explicit_parse() {
        let parser = ExplicitMemoParser::new("ns");
        let coord = parser.parse("ns/T+42s/3x7/Hello").unwrap();
        assert_eq!(coord.second, 42);
        assert_eq!(coord.column, 3);
        assert_eq!(coord.row, 7);
        assert_eq!(coord.text, "Hello");
    }

    #[test]
    fn test_explicit_text_may_contain_slashes() {
        let parser = ExplicitMemoParser::new("ns");
        let coord = parser.parse("ns/T+1s/2x3/a/b\nc").unwrap();
        assert_eq!(coord.text, "a/b\nc");
    }

    #[test]
    fn test_explicit_other_namespace_rejected() {
        let parser = ExplicitMemoParser::new("ns");
        assert!(parser.parse("other/T+42s/3x7/Hello").is_none());
        assert!(parser.parse("nsx/T+42s/3x7/Hello").is_none());
        assert!(parser.parse("prefix-ns/T+42s/3x7/Hello").is_none());
    }

    #[test]
    fn test_explicit_non_numeric_rejected() {
        let parser = ExplicitMemoParser::new("ns");
        assert!(parser.parse("ns/T+abcs/3x7/x").is_none());
        assert!(parser.parse("ns/T+4s/ax7/x").is_none());
        assert!(parser.parse("ns/T+4s/3x/x").is_none());
        assert!(parser.parse("ns/T+4s/3x7").is_none());
    }

    #[test]
    fn test_explicit_overflow_rejected() {
        let parser = ExplicitMemoParser::new("ns");
        assert!(parser.parse("ns/T+99999999999999999999999s/3x7/x").is_none());
    }

    #[test]
    fn test_explicit_namespace_is_escaped() {
        let parser = ExplicitMemoParser::new("a.b+c");
        assert!(parser.parse("a.b+c/T+1s/1x1/ok").is_some());
        assert!(parser.parse("aXbbc/T+1s/1x1/ok").is_none());
    }
}
