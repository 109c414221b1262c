//! Test data builders for creating messages

use dataflow_rt::{Message, Value};

/// Builder for nested test messages
pub struct MessageBuilder {
    name: String,
    value: Value,
    children: Vec<MessageBuilder>,
}

impl MessageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Value::Empty,
            children: Vec::new(),
        }
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Add a leaf child
    pub fn leaf(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.children.push(MessageBuilder::new(name).value(value));
        self
    }

    /// Add a nested child
    pub fn child(mut self, child: MessageBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub fn build(self) -> Message {
        let mut message = Message::with_value(self.name, self.value);
        let mut pending = vec![(message.root().id(), self.children)];
        while let Some((parent, children)) = pending.pop() {
            for child in children {
                let Some(mut node) = message.node_mut(parent) else {
                    continue;
                };
                let id = node.add_with(child.name, child.value).id();
                pending.push((id, child.children));
            }
        }
        message
    }
}

/// R -> [A -> [A1], B]
pub fn sample_tree() -> Message {
    MessageBuilder::new("R")
        .child(MessageBuilder::new("A").child(MessageBuilder::new("A1")))
        .child(MessageBuilder::new("B"))
        .build()
}

/// A sensor reading as collaborators send it
pub fn reading(temperature: f64, pressure: f64, humidity: f64) -> Message {
    MessageBuilder::new("root")
        .leaf("temperature", temperature)
        .leaf("pressure", pressure)
        .leaf("humidity", humidity)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let msg = MessageBuilder::new("root")
            .value(1)
            .leaf("a", 2.5)
            .child(MessageBuilder::new("b").leaf("c", "x"))
            .build();

        assert_eq!(msg.get::<i64>().unwrap(), 1);
        assert_eq!(msg.child("a").unwrap().get::<f64>().unwrap(), 2.5);
        assert_eq!(
            msg.child("b").unwrap().child("c").unwrap().get::<String>().unwrap(),
            "x"
        );
    }
}
