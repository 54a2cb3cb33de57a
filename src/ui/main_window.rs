use std::io::{BufRead, Write};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{MessagingError, RepositoryError, SessionError};
use crate::messaging::{ConversationRepository, Identity, Message, MessagingView, Subscription};
use crate::ui::{chat_view, sidebar};
use crate::utils::{RUNTIME, run_async_to_main};

/// How long leaving a session waits for sends that are still in flight.
const SEND_GRACE: Duration = Duration::from_secs(5);

const HELP: &str = "/list  show conversations\n/open <name>  switch conversation\n/help  this text\n/quit  leave\nanything else is sent to the open conversation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Open(String),
    Help,
    Quit,
    Say(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed.split_once(' ').unwrap_or((trimmed, "")) {
        ("/list", _) => Command::List,
        ("/open", name) => Command::Open(name.trim().to_string()),
        ("/help", _) => Command::Help,
        ("/quit" | "/exit", _) => Command::Quit,
        _ => Command::Say(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

type SendResult = mpsc::Receiver<Result<Message, RepositoryError>>;

/// One interactive session: the view, its repository, the live feed for the
/// active conversation and any sends still in flight.
pub struct Session {
    view: MessagingView,
    repository: Arc<dyn ConversationRepository>,
    feed: Option<Subscription>,
    in_flight: Vec<SendResult>,
}

impl Session {
    pub fn mount(
        repository: Arc<dyn ConversationRepository>,
        identity: Identity,
    ) -> Result<Self, SessionError> {
        let view = RUNTIME.block_on(MessagingView::mount(repository.as_ref(), identity))?;
        let mut session = Self {
            view,
            repository,
            feed: None,
            in_flight: Vec::new(),
        };
        session.follow_active();
        Ok(session)
    }

    pub fn view(&self) -> &MessagingView {
        &self.view
    }

    fn follow_active(&mut self) {
        if let Some(mut old) = self.feed.take() {
            old.cancel();
        }
        let peer_id = match self.view.peer_id(self.view.active_key().as_str()) {
            Ok(id) => id.to_string(),
            Err(err) => {
                warn!("cannot follow active conversation: {err}");
                return;
            }
        };
        match RUNTIME.block_on(self.repository.subscribe(&peer_id)) {
            Ok(feed) => self.feed = Some(feed),
            Err(err) => warn!("live updates unavailable for {peer_id}: {err}"),
        }
    }

    /// Moves inbound messages into the view and prints them.
    fn drain_feed(&mut self, out: &mut impl Write) -> Result<(), SessionError> {
        let Some(feed) = self.feed.as_mut() else {
            return Ok(());
        };
        let conversation_id = feed.conversation_id().to_string();
        while let Some(message) = feed.try_recv() {
            let shown = message.clone();
            match self.view.receive(&conversation_id, message) {
                Ok(true) => chat_view::render_message(&shown, out)?,
                Ok(false) => {}
                Err(err) => warn!("dropping inbound message: {err}"),
            }
        }
        Ok(())
    }

    pub fn pending_sends(&self) -> usize {
        self.in_flight.len()
    }

    fn report_send(
        result: Result<Message, RepositoryError>,
        out: &mut impl Write,
    ) -> Result<(), SessionError> {
        match result {
            Ok(stored) => debug!("backend stored message {}", stored.id()),
            Err(err) => {
                warn!("send failed: {err}");
                writeln!(out, "! message not delivered: {err}")?;
            }
        }
        Ok(())
    }

    /// Reports sends that have finished. The local copy stays in place either way.
    fn reap_sends(&mut self, out: &mut impl Write) -> Result<(), SessionError> {
        let mut finished = Vec::new();
        self.in_flight.retain(|rx| match rx.try_recv() {
            Ok(result) => {
                finished.push(result);
                false
            }
            Err(mpsc::TryRecvError::Empty) => true,
            Err(mpsc::TryRecvError::Disconnected) => false,
        });
        for result in finished {
            Self::report_send(result, out)?;
        }
        Ok(())
    }

    /// Waits up to `grace` in total for the remaining sends and reports each one.
    fn finish_sends(&mut self, grace: Duration, out: &mut impl Write) -> Result<(), SessionError> {
        let deadline = Instant::now() + grace;
        for rx in std::mem::take(&mut self.in_flight) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(result) => Self::report_send(result, out)?,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    warn!("send still pending when the session ended");
                    writeln!(out, "! message not delivered: still sending when the session ended")?;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {}
            }
        }
        Ok(())
    }

    /// Applies one input line. Returns `false` once the user asks to leave.
    pub fn handle(&mut self, line: &str, out: &mut impl Write) -> Result<bool, SessionError> {
        match parse_command(line) {
            Command::Quit => return Ok(false),
            Command::Help => writeln!(out, "{HELP}")?,
            Command::List => sidebar::render(&self.view, out)?,
            Command::Open(name) => match self.view.select_conversation(&name) {
                Ok(()) => {
                    self.follow_active();
                    let key = self.view.active_key().clone();
                    chat_view::render(key.as_str(), self.view.active_messages()?, out)?;
                }
                Err(MessagingError::NotFound(key)) => {
                    writeln!(out, "no conversation named '{key}', try /list")?;
                }
                Err(err) => return Err(err.into()),
            },
            Command::Say(text) => {
                self.view.set_draft(text);
                if let Some(outbound) = self.view.submit()? {
                    if let Some(sent) = self.view.active_messages()?.last() {
                        chat_view::render_message(sent, out)?;
                    }
                    let repository = Arc::clone(&self.repository);
                    self.in_flight.push(run_async_to_main(async move {
                        repository
                            .send_message(&outbound.conversation_id, &outbound.sender_id, &outbound.text)
                            .await
                    }));
                }
            }
        }
        Ok(true)
    }

    pub fn run(&mut self, input: &mut impl BufRead, out: &mut impl Write) -> Result<(), SessionError> {
        let key = self.view.active_key().clone();
        chat_view::render(key.as_str(), self.view.active_messages()?, out)?;
        writeln!(out, "type /help for commands")?;
        loop {
            self.drain_feed(out)?;
            self.reap_sends(out)?;
            write!(out, "[{}]> ", self.view.active_key())?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            if !self.handle(&line, out)? {
                break;
            }
        }
        if let Some(mut feed) = self.feed.take() {
            feed.cancel();
        }
        self.finish_sends(SEND_GRACE, out)
    }
}
