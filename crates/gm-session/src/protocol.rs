//! JSON frames exchanged with the graph store.
//!
//! Outgoing: `{"type":"get_graph","body":{"public_key":"<base64>"}}`
//! Incoming: `{"type":"graph","body":{"graph":"<graph text>"}}`; every other
//! `type` is ignored.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ClientMessage {
    GetGraph { public_key: String },
}

impl ClientMessage {
    pub fn get_graph(public_key: impl Into<String>) -> Self {
        ClientMessage::GetGraph {
            public_key: public_key.into(),
        }
    }

    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    body: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphBody {
    graph: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Graph(String),
    /// Any message type this client does not consume.
    Other(String),
}

impl ServerMessage {
    pub fn parse(frame: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        if envelope.kind != "graph" {
            return Ok(ServerMessage::Other(envelope.kind));
        }
        let body: GraphBody = serde_json::from_value(envelope.body)?;
        Ok(ServerMessage::Graph(body.graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    #[test]
    fn test_get_graph_frame() {
        let frame = ClientMessage::get_graph("abc=").to_frame().unwrap();
        assert_eq!(frame, r#"{"type":"get_graph","body":{"public_key":"abc="}}"#);
    }

    #[test]
    fn test_parse_graph() {
        let msg = ServerMessage::parse(r#"{"type":"graph","body":{"graph":"\"a\" [memo=\"x\"];"}}"#)
            .unwrap();
        assert_eq!(msg, ServerMessage::Graph(r#""a" [memo="x"];"#.to_string()));
    }

    #[test]
    fn test_other_types_ignored() {
        let msg = ServerMessage::parse(r#"{"type":"tip_header","body":{"height":12}}"#).unwrap();
        assert_eq!(msg, ServerMessage::Other("tip_header".to_string()));
        let msg = ServerMessage::parse(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Other("pong".to_string()));
    }

    #[test]
    fn test_graph_without_body_is_protocol_error() {
        assert!(matches!(
            ServerMessage::parse(r#"{"type":"graph"}"#),
            Err(SessionError::Protocol(_))
        ));
        assert!(matches!(
            ServerMessage::parse("not json"),
            Err(SessionError::Protocol(_))
        ));
    }
}
