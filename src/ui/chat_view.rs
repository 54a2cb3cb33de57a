use std::io::{self, Write};

use crate::messaging::Message;

const WIDTH: usize = 64;

pub fn render_message(message: &Message, out: &mut impl Write) -> io::Result<()> {
    if message.is_own() {
        let line = format!("{} :{}", message.text(), message.sender());
        writeln!(out, "{line:>WIDTH$}")
    } else {
        writeln!(out, "{}: {}", message.sender(), message.text())
    }
}

/// Own messages are right-aligned, everyone else's start at the margin.
pub fn render(title: &str, messages: &[Message], out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "── {title} ──")?;
    for message in messages {
        render_message(message, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MessageId;

    #[test]
    fn own_messages_are_right_aligned() {
        let messages = [
            Message::new(MessageId::new("1"), "Alice", "Hi!", false),
            Message::new(MessageId::new("2"), "Me", "Hey", true),
        ];
        let mut out = Vec::new();
        render("Alice", &messages, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "── Alice ──");
        assert_eq!(lines[1], "Alice: Hi!");
        assert_eq!(lines[2].len(), WIDTH);
        assert!(lines[2].ends_with("Hey :Me"));
    }
}
