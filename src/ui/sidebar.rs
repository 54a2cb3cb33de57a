use std::io::{self, Write};

use crate::messaging::MessagingView;

/// Lists conversations in store order, marking the active one.
pub fn render(view: &MessagingView, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Conversations")?;
    for key in view.conversation_keys() {
        let marker = if key == view.active_key() { '*' } else { ' ' };
        let count = view.get_messages(key.as_str()).map(<[_]>::len).unwrap_or(0);
        writeln!(out, " {marker} {key} ({count})")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::repository::seed_conversations;
    use crate::messaging::Identity;

    #[test]
    fn marks_active_conversation() {
        let identity = Identity {
            user_id: "me".into(),
            display_name: "Me".into(),
        };
        let mut view = MessagingView::from_summaries(seed_conversations(), identity).unwrap();
        view.select_conversation("John").unwrap();

        let mut out = Vec::new();
        render(&view, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Conversations\n   Alice (3)\n * John (2)\n   Mary (1)\n");
    }
}
