//! Serializable mirror of a [`Message`] tree.
//!
//! Messages live in an arena with integer links, which is the wrong shape for
//! a file. A `MessageSnapshot` is the flat form used when a message has to
//! leave the process, e.g. as part of retained state: every node in
//! depth-first pre-order, tagged with its depth. Top-level siblings of the
//! root appear at depth 0.
//!
//! ```json
//! [
//!   { "name": "root" },
//!   { "name": "update", "depth": 1 },
//!   { "name": "", "value": { "type": "double", "value": 21.5 }, "depth": 2 }
//! ]
//! ```
//!
//! The encoding nests the same no matter how deep the tree is, and capture
//! and restore walk the arena without recursion.

use crate::dataflow::id::NodeId;
use crate::dataflow::message::{Message, NodeRef};
use crate::dataflow::value::Value;
use crate::error::{DataflowError, Result, ResultExt};
use serde::{Deserialize, Serialize};

/// Persistable payload kinds. Driver handles are process-local and have no
/// variant here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SnapshotValue {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl SnapshotValue {
    fn is_empty(&self) -> bool {
        matches!(self, SnapshotValue::Empty)
    }
}

impl TryFrom<&Value> for SnapshotValue {
    type Error = DataflowError;

    fn try_from(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Empty => SnapshotValue::Empty,
            Value::Bool(v) => SnapshotValue::Bool(*v),
            Value::Int(v) => SnapshotValue::Int(*v),
            Value::Double(v) => SnapshotValue::Double(*v),
            Value::String(v) => SnapshotValue::String(v.clone()),
            Value::Handle(handle) => {
                return Err(DataflowError::Serialization(format!(
                    "{} driver handle cannot be persisted",
                    handle.kind()
                )))
            }
        })
    }
}

impl From<&SnapshotValue> for Value {
    fn from(value: &SnapshotValue) -> Self {
        match value {
            SnapshotValue::Empty => Value::Empty,
            SnapshotValue::Bool(v) => Value::Bool(*v),
            SnapshotValue::Int(v) => Value::Int(*v),
            SnapshotValue::Double(v) => Value::Double(*v),
            SnapshotValue::String(v) => Value::String(v.clone()),
        }
    }
}

fn is_top_level(depth: &usize) -> bool {
    *depth == 0
}

/// One node of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "SnapshotValue::is_empty")]
    pub value: SnapshotValue,
    /// Levels below the first node
    #[serde(default, skip_serializing_if = "is_top_level")]
    pub depth: usize,
}

impl SnapshotNode {
    fn capture(depth: usize, node: NodeRef<'_>) -> Result<Self> {
        Ok(Self {
            name: node.name().to_string(),
            value: SnapshotValue::try_from(node.value())
                .with_context(|| format!("node '{}'", node.name()))?,
            depth,
        })
    }
}

/// A message tree as a flat, pre-ordered node list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSnapshot {
    pub nodes: Vec<SnapshotNode>,
}

impl MessageSnapshot {
    /// A snapshot of an empty message whose root carries `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            nodes: vec![SnapshotNode {
                name: name.into(),
                ..Default::default()
            }],
        }
    }

    /// Capture a whole message, including top-level siblings.
    pub fn capture(message: &Message) -> Result<Self> {
        let nodes = message
            .iter()
            .map(|(depth, node)| SnapshotNode::capture(depth, node))
            .collect::<Result<_>>()?;
        Ok(Self { nodes })
    }

    /// Capture one node and its descendants, without its siblings.
    pub fn capture_node(node: NodeRef<'_>) -> Result<Self> {
        let nodes = node
            .iter()
            .enumerate()
            .take_while(|(index, (depth, _))| *index == 0 || *depth > 0)
            .map(|(_, (depth, node))| SnapshotNode::capture(depth, node))
            .collect::<Result<_>>()?;
        Ok(Self { nodes })
    }

    /// Name of the first node, if any.
    pub fn root_name(&self) -> Option<&str> {
        self.nodes.first().map(|node| node.name.as_str())
    }

    /// Rebuild the message this snapshot describes.
    ///
    /// Fails with `Serialization` when a node's depth skips a level, since
    /// such a node has no parent to attach to.
    pub fn restore(&self) -> Result<Message> {
        let mut nodes = self.nodes.iter().enumerate();
        let Some((_, first)) = nodes.next() else {
            return Ok(Message::new());
        };
        if first.depth != 0 {
            return Err(DataflowError::Serialization(format!(
                "first node '{}' is at depth {}, expected 0",
                first.name, first.depth
            )));
        }

        let mut message = Message::with_value(first.name.clone(), Value::from(&first.value));
        // path[d] is the most recent node at depth d
        let mut path: Vec<NodeId> = vec![message.root().id()];

        for (index, node) in nodes {
            let value = Value::from(&node.value);
            if node.depth == 0 {
                let id = message.push_sibling(node.name.clone(), value).id();
                path.clear();
                path.push(id);
                continue;
            }

            if node.depth > path.len() {
                return Err(DataflowError::Serialization(format!(
                    "node {} '{}' at depth {} has no parent at depth {}",
                    index,
                    node.name,
                    node.depth,
                    node.depth - 1
                )));
            }
            path.truncate(node.depth);
            let parent = path[node.depth - 1];
            let mut parent = message.node_mut(parent).ok_or_else(|| {
                DataflowError::Serialization(format!("node {} '{}' lost its parent", index, node.name))
            })?;
            let id = parent.add_with(node.name.clone(), value).id();
            path.push(id);
        }
        Ok(message)
    }
}
