//! Hierarchical message tree.
//!
//! A [`Message`] is a named tree of [`Value`]s, the unit of data exchanged
//! between ports. Nodes are stored in a flat `Vec` indexed by [`NodeId`], with
//! parent/child/sibling links forming an intrusive tree. The arena owns every
//! node; parent links are only used to walk back up during iteration.
//!
//! ```text
//! root                    (slot 0)
//! +-- temperature: 21.5
//! +-- update
//! |   +-- : 21.5          (anonymous, index 0)
//! |   +-- : 101325
//! +-- query: "{...}"
//! ```
//!
//! ## Lookups
//!
//! Read lookups never fabricate data: [`NodeRef::child`] fails with
//! `NotFound` and [`NodeRef::child_at`] with `IndexOutOfRange`. Write lookups
//! auto-create: [`NodeMut::child_mut`] appends a missing named child and
//! [`NodeMut::child_at_mut`] appends anonymous children up to the index.
//! Names are not unique; name lookup returns the first match in insertion
//! order.
//!
//! ## Copying
//!
//! Cloning a message is a full deep copy into a fresh, compacted arena.
//! [`NodeRef::copy_subtree`] copies one node and its descendants.
//! [`NodeRef::copy_with_siblings`] additionally carries the siblings that
//! follow a non-root node; they become top-level siblings of the new root and
//! are visited by depth-first iteration at level 0.
//!
//! Slots released by [`NodeMut::clear`] go on a free list and are reused by
//! later inserts, so a message that is cleared and refilled in a loop does not
//! grow.

use crate::dataflow::id::NodeId;
use crate::dataflow::value::{Value, ValueType};
use crate::error::{DataflowError, Result};
use std::fmt;

/// A single arena slot.
#[derive(Debug, Clone)]
struct Slot {
    name: String,
    value: Value,
    /// Parent node (NodeId::INVALID for top-level nodes).
    parent: NodeId,
    /// First child (intrusive linked list).
    first_child: NodeId,
    /// Last child, kept for O(1) append.
    last_child: NodeId,
    /// Next sibling (intrusive linked list).
    next_sibling: NodeId,
    live: bool,
}

impl Slot {
    fn new(name: String, value: Value, parent: NodeId) -> Self {
        Self {
            name,
            value,
            parent,
            first_child: NodeId::INVALID,
            last_child: NodeId::INVALID,
            next_sibling: NodeId::INVALID,
            live: true,
        }
    }
}

/// Flat-storage message tree.
///
/// - `NodeId` is a direct index into `nodes`.
/// - The root always occupies `NodeId::ROOT`.
/// - Tree traversal uses intrusive linked lists (first_child / next_sibling).
pub struct Message {
    nodes: Vec<Slot>,
    free: Vec<NodeId>,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// Create an anonymous, empty message.
    pub fn new() -> Self {
        Self::with_value("", Value::Empty)
    }

    /// Create an empty message whose root carries `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_value(name, Value::Empty)
    }

    /// Create a message whose root carries `name` and `value`.
    pub fn with_value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            nodes: vec![Slot::new(name.into(), value.into(), NodeId::INVALID)],
            free: Vec::new(),
        }
    }

    fn empty_arena() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
        }
    }

    // ── Node access ──

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            msg: self,
            id: NodeId::ROOT,
        }
    }

    pub fn root_mut(&mut self) -> NodeMut<'_> {
        NodeMut {
            msg: self,
            id: NodeId::ROOT,
        }
    }

    /// Look up a live node by id.
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.is_live(id).then_some(NodeRef { msg: self, id })
    }

    /// Look up a live node by id for writing.
    pub fn node_mut(&mut self, id: NodeId) -> Option<NodeMut<'_>> {
        if self.is_live(id) {
            Some(NodeMut { msg: self, id })
        } else {
            None
        }
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// A message always has its root, so it is never empty in the arena sense.
    /// This reports whether the root has neither a value nor children.
    pub fn is_empty(&self) -> bool {
        let root = self.slot(NodeId::ROOT);
        !root.value.has_value() && !root.first_child.is_valid()
    }

    // ── Root-level shortcuts ──

    pub fn name(&self) -> &str {
        self.root().name()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.root_mut().set_name(name);
    }

    pub fn value(&self) -> &Value {
        self.root().value()
    }

    pub fn set(&mut self, value: impl Into<Value>) {
        self.root_mut().set(value);
    }

    pub fn get<T: ValueType>(&self) -> Result<T> {
        self.root().get()
    }

    pub fn child(&self, name: &str) -> Result<NodeRef<'_>> {
        self.root().child(name)
    }

    pub fn child_at(&self, index: usize) -> Result<NodeRef<'_>> {
        self.root().child_at(index)
    }

    pub fn child_mut(&mut self, name: &str) -> NodeMut<'_> {
        self.root_mut().child_mut(name)
    }

    pub fn child_at_mut(&mut self, index: usize) -> NodeMut<'_> {
        self.root_mut().child_at_mut(index)
    }

    pub fn add(&mut self, name: impl Into<String>) -> NodeMut<'_> {
        self.root_mut().into_add(name.into(), Value::Empty)
    }

    pub fn add_with(&mut self, name: impl Into<String>, value: impl Into<Value>) -> NodeMut<'_> {
        self.root_mut().into_add(name.into(), value.into())
    }

    pub fn add_value(&mut self, value: impl Into<Value>) -> NodeMut<'_> {
        self.root_mut().into_add(String::new(), value.into())
    }

    /// Append a top-level sibling after the last node of the root's sibling chain.
    pub fn push_sibling(&mut self, name: impl Into<String>, value: impl Into<Value>) -> NodeMut<'_> {
        let mut last = NodeId::ROOT;
        while self.slot(last).next_sibling.is_valid() {
            last = self.slot(last).next_sibling;
        }
        let id = self.alloc(name.into(), value.into(), NodeId::INVALID);
        self.slot_mut(last).next_sibling = id;
        NodeMut { msg: self, id }
    }

    /// Top-level siblings that follow the root, in order.
    pub fn siblings(&self) -> impl Iterator<Item = NodeRef<'_>> {
        let mut current = self.slot(NodeId::ROOT).next_sibling;
        std::iter::from_fn(move || {
            let node = self.node(current)?;
            current = self.slot(current).next_sibling;
            Some(node)
        })
    }

    /// Drop the root value and every child. The root keeps its name.
    pub fn clear(&mut self) {
        self.root_mut().clear();
    }

    pub fn child_count(&self) -> usize {
        self.root().child_count()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.root().has_child(name)
    }

    /// Depth-first, pre-order walk starting at the root.
    pub fn iter(&self) -> DepthFirst<'_> {
        self.root().iter()
    }

    // ── Arena internals ──

    #[inline]
    fn slot(&self, id: NodeId) -> &Slot {
        &self.nodes[id.index()]
    }

    #[inline]
    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        &mut self.nodes[id.index()]
    }

    fn is_live(&self, id: NodeId) -> bool {
        id.is_valid() && self.nodes.get(id.index()).is_some_and(|s| s.live)
    }

    fn alloc(&mut self, name: String, value: Value, parent: NodeId) -> NodeId {
        let slot = Slot::new(name, value, parent);
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = slot;
            id
        } else {
            let id = NodeId(self.nodes.len() as u32);
            self.nodes.push(slot);
            id
        }
    }

    fn append_child(&mut self, parent: NodeId, name: String, value: Value) -> NodeId {
        let id = self.alloc(name, value, parent);
        let last = self.slot(parent).last_child;
        if last.is_valid() {
            self.slot_mut(last).next_sibling = id;
        } else {
            self.slot_mut(parent).first_child = id;
        }
        self.slot_mut(parent).last_child = id;
        id
    }

    fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children_of(parent).find(|&id| self.slot(id).name == name)
    }

    fn nth_child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children_of(parent).nth(index)
    }

    fn count_children(&self, parent: NodeId) -> usize {
        self.children_of(parent).count()
    }

    fn children_of(&self, parent: NodeId) -> ChildIds<'_> {
        ChildIds {
            msg: self,
            current: self.slot(parent).first_child,
        }
    }

    fn ensure_child_at(&mut self, parent: NodeId, index: usize) -> NodeId {
        let mut count = 0;
        let mut current = self.slot(parent).first_child;
        while current.is_valid() {
            if count == index {
                return current;
            }
            count += 1;
            current = self.slot(current).next_sibling;
        }
        loop {
            let id = self.append_child(parent, String::new(), Value::Empty);
            if count == index {
                return id;
            }
            count += 1;
        }
    }

    /// Release every descendant of `parent` onto the free list.
    fn release_children(&mut self, parent: NodeId) {
        let mut stack: Vec<NodeId> = self.children_of(parent).collect();
        while let Some(id) = stack.pop() {
            stack.extend(self.children_of(id));
            let slot = self.slot_mut(id);
            slot.live = false;
            slot.name.clear();
            slot.value.reset();
            slot.parent = NodeId::INVALID;
            slot.first_child = NodeId::INVALID;
            slot.last_child = NodeId::INVALID;
            slot.next_sibling = NodeId::INVALID;
            self.free.push(id);
        }
        let slot = self.slot_mut(parent);
        slot.first_child = NodeId::INVALID;
        slot.last_child = NodeId::INVALID;
    }

    /// Deep-copy `start` (and optionally the siblings after it) into a fresh arena.
    ///
    /// Iterative, so deep trees never recurse.
    fn copy_nodes(&self, start: NodeId, with_siblings: bool) -> Message {
        let mut out = Message::empty_arena();

        let mut tops = vec![start];
        if with_siblings {
            let mut sibling = self.slot(start).next_sibling;
            while sibling.is_valid() {
                tops.push(sibling);
                sibling = self.slot(sibling).next_sibling;
            }
        }

        let mut stack: Vec<(NodeId, NodeId)> =
            tops.into_iter().rev().map(|id| (id, NodeId::INVALID)).collect();
        let mut last_top = NodeId::INVALID;

        while let Some((src, dst_parent)) = stack.pop() {
            let slot = self.slot(src);
            let copy = if dst_parent.is_valid() {
                out.append_child(dst_parent, slot.name.clone(), slot.value.clone())
            } else {
                let id = out.alloc(slot.name.clone(), slot.value.clone(), NodeId::INVALID);
                if last_top.is_valid() {
                    out.slot_mut(last_top).next_sibling = id;
                }
                last_top = id;
                id
            };

            // Push children reversed so they pop (and append) in order
            let mark = stack.len();
            stack.extend(self.children_of(src).map(|child| (child, copy)));
            stack[mark..].reverse();
        }

        out
    }
}

impl Clone for Message {
    /// Full deep copy. Free slots are not carried over.
    fn clone(&self) -> Self {
        self.copy_nodes(NodeId::ROOT, true)
    }
}

impl PartialEq for Message {
    /// Structural equality: same shape, names and values in the same order.
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.iter();
        let mut b = other.iter();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some((la, na)), Some((lb, nb))) => {
                    if la != lb || na.name() != nb.name() || na.value() != nb.value() {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("name", &self.name())
            .field("nodes", &self.len())
            .finish()
    }
}

impl fmt::Display for Message {
    /// One line per node, indented by depth: `name: value`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, node) in self.iter() {
            writeln!(f, "{}{}: {}", "  ".repeat(level), node.name(), node.value())?;
        }
        Ok(())
    }
}

/// Iterator over child ids of one node.
struct ChildIds<'a> {
    msg: &'a Message,
    current: NodeId,
}

impl Iterator for ChildIds<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if !self.current.is_valid() {
            return None;
        }
        let id = self.current;
        self.current = self.msg.slot(id).next_sibling;
        Some(id)
    }
}

/// Read-only view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    msg: &'a Message,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        &self.msg.slot(self.id).name
    }

    pub fn value(&self) -> &'a Value {
        &self.msg.slot(self.id).value
    }

    pub fn get<T: ValueType>(&self) -> Result<T> {
        self.value().get()
    }

    pub fn has_value(&self) -> bool {
        self.value().has_value()
    }

    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.msg.node(self.msg.slot(self.id).parent)
    }

    pub fn next_sibling(&self) -> Option<NodeRef<'a>> {
        self.msg.node(self.msg.slot(self.id).next_sibling)
    }

    /// First direct child called `name`.
    pub fn child(&self, name: &str) -> Result<NodeRef<'a>> {
        self.msg
            .find_child(self.id, name)
            .map(|id| NodeRef { msg: self.msg, id })
            .ok_or_else(|| DataflowError::NotFound(name.to_string()))
    }

    /// Direct child at `index`, in insertion order.
    pub fn child_at(&self, index: usize) -> Result<NodeRef<'a>> {
        self.msg
            .nth_child(self.id, index)
            .map(|id| NodeRef { msg: self.msg, id })
            .ok_or_else(|| DataflowError::IndexOutOfRange {
                index,
                len: self.child_count(),
            })
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.msg.find_child(self.id, name).is_some()
    }

    pub fn child_count(&self) -> usize {
        self.msg.count_children(self.id)
    }

    /// Iterate over direct children.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let msg = self.msg;
        msg.children_of(self.id).map(move |id| NodeRef { msg, id })
    }

    /// Depth-first walk of this node's subtree, starting at level 0.
    pub fn iter(&self) -> DepthFirst<'a> {
        DepthFirst::new(self.msg, self.id)
    }

    /// Copy this node and its descendants into a new message.
    pub fn copy_subtree(&self) -> Message {
        self.msg.copy_nodes(self.id, false)
    }

    /// Copy this node, its descendants, and every sibling that follows it.
    ///
    /// The siblings become top-level siblings of the new root. For the root of
    /// a message this is the same as a full clone.
    pub fn copy_with_siblings(&self) -> Message {
        self.msg.copy_nodes(self.id, true)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("value", self.value())
            .finish()
    }
}

/// Mutable view of one node.
pub struct NodeMut<'a> {
    msg: &'a mut Message,
    id: NodeId,
}

impl<'a> NodeMut<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn as_node(&self) -> NodeRef<'_> {
        NodeRef {
            msg: self.msg,
            id: self.id,
        }
    }

    pub fn into_ref(self) -> NodeRef<'a> {
        NodeRef {
            msg: self.msg,
            id: self.id,
        }
    }

    pub fn name(&self) -> &str {
        &self.msg.slot(self.id).name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.msg.slot_mut(self.id).name = name.into();
    }

    pub fn value(&self) -> &Value {
        &self.msg.slot(self.id).value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.msg.slot_mut(self.id).value
    }

    /// Replace this node's value.
    pub fn set(&mut self, value: impl Into<Value>) {
        self.value_mut().set(value);
    }

    pub fn get<T: ValueType>(&self) -> Result<T> {
        self.value().get()
    }

    /// First child called `name`, created empty if missing.
    pub fn child_mut(self, name: &str) -> NodeMut<'a> {
        let id = match self.msg.find_child(self.id, name) {
            Some(id) => id,
            None => self
                .msg
                .append_child(self.id, name.to_string(), Value::Empty),
        };
        NodeMut { msg: self.msg, id }
    }

    /// Child at `index`; anonymous children are appended until it exists.
    pub fn child_at_mut(self, index: usize) -> NodeMut<'a> {
        let id = self.msg.ensure_child_at(self.id, index);
        NodeMut { msg: self.msg, id }
    }

    /// Append an empty child called `name`.
    pub fn add(&mut self, name: impl Into<String>) -> NodeMut<'_> {
        self.add_node(name.into(), Value::Empty)
    }

    /// Append a child called `name` holding `value`.
    pub fn add_with(&mut self, name: impl Into<String>, value: impl Into<Value>) -> NodeMut<'_> {
        self.add_node(name.into(), value.into())
    }

    /// Append an anonymous child holding `value`.
    pub fn add_value(&mut self, value: impl Into<Value>) -> NodeMut<'_> {
        self.add_node(String::new(), value.into())
    }

    fn add_node(&mut self, name: String, value: Value) -> NodeMut<'_> {
        let id = self.msg.append_child(self.id, name, value);
        NodeMut { msg: self.msg, id }
    }

    fn into_add(self, name: String, value: Value) -> NodeMut<'a> {
        let id = self.msg.append_child(self.id, name, value);
        NodeMut { msg: self.msg, id }
    }

    /// Drop this node's value and its whole subtree. The name is kept.
    pub fn clear(&mut self) {
        self.msg.slot_mut(self.id).value.reset();
        self.msg.release_children(self.id);
    }

    pub fn child_count(&self) -> usize {
        self.msg.count_children(self.id)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.msg.find_child(self.id, name).is_some()
    }
}

/// Depth-first, pre-order traversal with level tracking.
///
/// Yields `(level, node)` pairs, where level is the depth relative to the
/// starting node. The walk covers the starting node's subtree; when it starts
/// at a top-level node it continues into that node's top-level siblings.
/// Once exhausted it keeps returning `None`. The borrow of the message rules
/// out mutation while a walk is in progress.
pub struct DepthFirst<'a> {
    msg: &'a Message,
    start: NodeId,
    next: NodeId,
    level: usize,
}

impl<'a> DepthFirst<'a> {
    fn new(msg: &'a Message, start: NodeId) -> Self {
        Self {
            msg,
            start,
            next: start,
            level: 0,
        }
    }

    /// Compute the node after `current` (at `level`) in pre-order.
    fn advance(&mut self, current: NodeId) {
        let msg = self.msg;
        let slot = msg.slot(current);
        if slot.first_child.is_valid() {
            self.next = slot.first_child;
            self.level += 1;
            return;
        }

        // Bounded walks never leave the starting node's subtree
        let bounded = msg.slot(self.start).parent.is_valid();

        let mut node = current;
        let mut level = self.level;
        loop {
            if bounded && node == self.start {
                break;
            }
            let slot = msg.slot(node);
            if slot.next_sibling.is_valid() {
                self.next = slot.next_sibling;
                self.level = level;
                return;
            }
            if !slot.parent.is_valid() {
                break;
            }
            node = slot.parent;
            level = level.saturating_sub(1);
        }

        self.next = NodeId::INVALID;
    }
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, NodeRef<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.next.is_valid() {
            return None;
        }
        let current = self.next;
        let level = self.level;
        self.advance(current);
        Some((
            level,
            NodeRef {
                msg: self.msg,
                id: current,
            },
        ))
    }
}

impl std::iter::FusedIterator for DepthFirst<'_> {}
