use crate::message::{Message, Role};

/// Transcript of a single agent run.
///
/// Holds exactly one system message, always at index 0. The history is owned
/// by the run that created it and is never shared between runs.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Seed a history with the system prompt followed by the user's task.
    pub fn seeded(system_prompt: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(task)],
        }
    }

    /// Append a non-system message. A second system message is dropped.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            tracing::warn!("ignoring attempt to append a second system message");
            return;
        }
        self.messages.push(message);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.messages.iter()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Observation;

    #[test]
    fn seeds_system_then_user() {
        let history = ConversationHistory::seeded("be precise", "add 1 and 2");
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].role, Role::System);
        assert_eq!(history.messages()[0].content, "be precise");
        assert_eq!(history.messages()[1], Message::user("add 1 and 2"));
    }

    #[test]
    fn never_holds_two_system_messages() {
        let mut history = ConversationHistory::seeded("sys", "task");
        history.push(Message::system("another"));
        history.push(Message::assistant("thinking"));
        history.push(Message::observation(&Observation::success(3)));

        let systems = history.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(systems, 1);
        assert_eq!(history.len(), 4);
        assert_eq!(history.last().unwrap().content, "Observation: 3");
    }
}
