//! Decoder for the textual graph payload returned by the remote store.
//!
//! The payload is a small subset of a DOT-like language:
//!
//! ```text
//! "node-id" [pubkey="..." memo="..."];
//! "a" -> "b";
//! "a" -> "b" [label="..."];
//! ```
//!
//! Anything that does not match one of those statement shapes is skipped.
//! Values never contain escaped quotes.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// Edge statements come first in the alternation so the target of an edge
/// with an attribute body is never read as a node statement.
static STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""(?P<from>[^"]*)"\s*->\s*"(?P<to>[^"]*)"(?:\s*\[(?P<edge_body>(?:[^\]"]|"[^"]*")*)\])?\s*;|"(?P<id>[^"]*)"\s*\[(?P<body>(?:[^\]"]|"[^"]*")*)\]\s*;"#,
    )
    .unwrap()
});

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*"([^"]*)""#).unwrap());

/// Attribute map that keeps first-insertion order; a repeated key overwrites
/// the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub attributes: Attributes,
}

impl GraphNode {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

fn parse_attributes(body: &str) -> Attributes {
    let mut attributes = Attributes::new();
    for caps in ATTRIBUTE.captures_iter(body) {
        attributes.insert(&caps[1], &caps[2]);
    }
    attributes
}

/// Decode nodes and edges, both in source order.
pub fn decode_graph(text: &str) -> Graph {
    let mut graph = Graph::default();

    for caps in STATEMENT.captures_iter(text) {
        if let Some(id) = caps.name("id") {
            let body = caps.name("body").map_or("", |m| m.as_str());
            graph.nodes.push(GraphNode {
                id: id.as_str().to_string(),
                attributes: parse_attributes(body),
            });
        } else if let (Some(from), Some(to)) = (caps.name("from"), caps.name("to")) {
            let body = caps.name("edge_body").map_or("", |m| m.as_str());
            graph.edges.push(GraphEdge {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
                attributes: parse_attributes(body),
            });
        }
    }

    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        bytes = text.len(),
        "decoded graph payload"
    );
    graph
}

/// Decode only the node statements.
pub fn decode_nodes(text: &str) -> Vec<GraphNode> {
    decode_graph(text).nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_node() {
        let nodes = decode_nodes(r#""n1" [pubkey="abc=" memo="hello"];"#);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "n1");
        assert_eq!(nodes[0].attr("pubkey"), Some("abc="));
        assert_eq!(nodes[0].attr("memo"), Some("hello"));
    }

    #[test]
    fn test_source_order_preserved() {
        let text = r#"
            digraph {
              "b" [memo="second"];
              "a" [memo="first"];
              "c" [memo="third"];
            }
        "#;
        let ids: Vec<String> = decode_nodes(text).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_key_later_wins_in_place() {
        let nodes = decode_nodes(r#""x" [a="1" b="2" a="3"];"#);
        let pairs: Vec<(&str, &str)> = nodes[0].attributes.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let nodes = decode_nodes(r#""x" [color="red" weight="2"];"#);
        assert_eq!(nodes[0].attr("color"), Some("red"));
        assert_eq!(nodes[0].attr("weight"), Some("2"));
    }

    #[test]
    fn test_malformed_statements_skipped() {
        let text = r#"
            "broken" [memo="no terminator"]
            garbage here;
            "ok" [memo="fine"];
            "unclosed [memo="x"];
        "#;
        let nodes = decode_nodes(text);
        assert!(nodes.iter().any(|n| n.id == "ok"));
        assert!(nodes.iter().all(|n| n.id != "broken"));
    }

    #[test]
    fn test_bracket_inside_value() {
        let nodes = decode_nodes(r#""x" [memo="see [1] here"];"#);
        assert_eq!(nodes[0].attr("memo"), Some("see [1] here"));
    }

    #[test]
    fn test_semicolon_inside_value() {
        let nodes = decode_nodes(r#""x" [memo="a; b"]; "y" [memo="c"];"#);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].attr("memo"), Some("a; b"));
    }

    #[test]
    fn test_edges_not_read_as_nodes() {
        let graph = decode_graph(
            r#""a" [memo="A"]; "a" -> "b"; "b" -> "c" [label="next"]; "c" [memo="C"];"#,
        );
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].from, "a");
        assert_eq!(graph.edges[0].to, "b");
        assert_eq!(graph.edges[1].attributes.get("label"), Some("next"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode_graph(""), Graph::default());
    }

    #[test]
    fn test_empty_body() {
        let nodes = decode_nodes(r#""lonely" [];"#);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].attributes.is_empty());
    }

    #[test]
    fn test_attributes_serialize_as_ordered_map() {
        let nodes = decode_nodes(r#""x" [z="1" a="2"];"#);
        let json = serde_json::to_string(&nodes[0].attributes).unwrap();
        assert_eq!(json, r#"{"z":"1","a":"2"}"#);
    }
}
