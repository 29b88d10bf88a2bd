//! # CleverJabberBot
//!
//! A Core that lets Jabber users talk to a `ChatBrain`. Direct chats are
//! answered, group-chat messages are answered when they mention the bot's
//! nick, and `#`-prefixed messages are bot commands (see `commands`).
//!
//! Every conversation partner gets its own `CleverBotMind` Unit, keyed by
//! bare JID (the room JID for group chats), so conversations do not bleed
//! into each other.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::cleverbot::{ChatBrain, CleverBotMind};
use super::commands::{self, Command};
use super::xmpp::XmppSession;
use crate::config::JabberConfig;
use crate::error::{Error, Result};
use crate::units::{Core, SharedUnit, UnitRegistry};

/// How long `activate` waits for the first successful login.
const ACTIVATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Status sent when leaving a room.
const LEAVE_STATUS: &str = "bye";

/// XMPP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    Normal,
    GroupChat,
    Headline,
    Error,
}

/// A message received by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Full sender JID; for group chats `room@server/nick`.
    pub from: String,
    pub kind: MessageKind,
    pub body: String,
}

impl IncomingMessage {
    pub fn new(from: impl Into<String>, kind: MessageKind, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            kind,
            body: body.into(),
        }
    }

    pub fn bare_from(&self) -> &str {
        self.from.split('/').next().unwrap_or(&self.from)
    }

    /// Resource part of the sender, which is the sender's nick in a room.
    pub fn muc_nick(&self) -> Option<&str> {
        self.from.split_once('/').map(|(_, nick)| nick)
    }
}

/// Something the bot wants done on the XMPP connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAction {
    Reply {
        to: String,
        kind: MessageKind,
        body: String,
    },
    JoinRoom {
        room: String,
        nick: String,
    },
    LeaveRoom {
        room: String,
        nick: String,
        status: String,
    },
}

/// Conversation state of the bot: nick, rooms, command history and minds.
pub struct BotLogic {
    nick: String,
    conference_server: String,
    history: VecDeque<String>,
    history_len: usize,
    rooms: BTreeSet<String>,
    minds: Arc<UnitRegistry>,
    brain: Arc<dyn ChatBrain>,
}

impl BotLogic {
    pub fn new(config: &JabberConfig, minds: Arc<UnitRegistry>, brain: Arc<dyn ChatBrain>) -> Self {
        let nick = config
            .id
            .split_once('@')
            .map(|(local, _)| local)
            .unwrap_or(&config.id)
            .to_string();
        Self {
            nick,
            conference_server: commands::conference_server_for(&config.id),
            history: VecDeque::with_capacity(config.history_len.min(64)),
            history_len: config.history_len,
            rooms: BTreeSet::new(),
            minds,
            brain,
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn conference_server(&self) -> &str {
        &self.conference_server
    }

    /// Commands seen so far, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.iter().map(String::as_str)
    }

    /// Joins for every room the bot is in, for use after a reconnect.
    pub fn rejoin_actions(&self) -> Vec<BotAction> {
        self.rooms
            .iter()
            .map(|room| BotAction::JoinRoom {
                room: room.clone(),
                nick: self.nick.clone(),
            })
            .collect()
    }

    /// React to one incoming message.
    pub async fn handle(&mut self, msg: &IncomingMessage) -> Vec<BotAction> {
        match msg.kind {
            MessageKind::Chat | MessageKind::Normal => self.handle_direct(msg).await,
            MessageKind::GroupChat => self.handle_room(msg).await,
            MessageKind::Headline | MessageKind::Error => Vec::new(),
        }
    }

    async fn handle_direct(&mut self, msg: &IncomingMessage) -> Vec<BotAction> {
        let reply = |body: String| BotAction::Reply {
            to: msg.from.clone(),
            kind: msg.kind,
            body,
        };

        if msg.body.trim().is_empty() {
            return vec![reply(msg.body.clone())];
        }

        if let Some(line) = msg.body.strip_prefix('#') {
            let (answer, mut actions) = self.run_command(line);
            actions.push(reply(answer));
            return actions;
        }

        tracing::info!(from = %msg.from, "Asking brain");
        let answer = self.ask(msg.bare_from(), &msg.body).await;
        vec![reply(answer)]
    }

    async fn handle_room(&mut self, msg: &IncomingMessage) -> Vec<BotAction> {
        let Some(sender) = msg.muc_nick() else {
            return Vec::new();
        };
        if sender == self.nick {
            return Vec::new();
        }
        let room = msg.bare_from().to_string();
        let reply = |body: String| BotAction::Reply {
            to: room.clone(),
            kind: MessageKind::GroupChat,
            body,
        };

        if let Some(line) = msg.body.strip_prefix('#') {
            tracing::info!(room = %room, sender = %sender, "Room command");
            let (answer, mut actions) = self.run_command(line);
            actions.push(reply(answer));
            return actions;
        }

        if msg.body.contains(self.nick.as_str()) {
            let question = msg.body.replace(self.nick.as_str(), "");
            let question = question.trim();
            if question.is_empty() {
                tracing::debug!(room = %room, sender = %sender, "Bare mention, nothing to ask");
                return Vec::new();
            }
            tracing::info!(room = %room, sender = %sender, "Asking brain");
            let answer = self.ask(&room, question).await;
            return vec![reply(format!("to {sender}: {answer}"))];
        }

        Vec::new()
    }

    /// Record and execute a command line. Returns the text reply and any
    /// connection actions to perform before it.
    pub fn run_command(&mut self, line: &str) -> (String, Vec<BotAction>) {
        tracing::info!(command = %line, "Command");
        if self.history_len > 0 {
            if self.history.len() == self.history_len {
                self.history.pop_front();
            }
            self.history.push_back(line.to_string());
        }
        self.dispatch(line)
    }

    fn dispatch(&mut self, line: &str) -> (String, Vec<BotAction>) {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::error!(command = %line, "{}", e);
                return (e.to_string(), Vec::new());
            }
        };

        match command {
            Command::Join(name) => {
                let room = commands::resolve_room(&name, &self.conference_server);
                self.rooms.insert(room.clone());
                let action = BotAction::JoinRoom {
                    room,
                    nick: self.nick.clone(),
                };
                (commands::DONE.to_string(), vec![action])
            }
            Command::Leave(name) => {
                let room = commands::resolve_room(&name, &self.conference_server);
                self.rooms.remove(&room);
                let action = BotAction::LeaveRoom {
                    room,
                    nick: self.nick.clone(),
                    status: LEAVE_STATUS.to_string(),
                };
                (commands::DONE.to_string(), vec![action])
            }
            Command::SetNick(nick) => {
                self.nick = nick;
                (commands::DONE.to_string(), Vec::new())
            }
            Command::Nick => (self.nick.clone(), Vec::new()),
            Command::History => (self.history.iter().cloned().collect::<Vec<_>>().join("\n"), Vec::new()),
            Command::Help => (commands::HELP.to_string(), Vec::new()),
        }
    }

    /// Ask the brain within the conversation keyed by `partner`.
    async fn ask(&self, partner: &str, question: &str) -> String {
        let brain = self.brain.clone();
        let mind = self
            .minds
            .get_or_insert_with(partner, || -> SharedUnit { Arc::new(CleverBotMind::new(brain)) });
        match mind.post(Some(question)).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(partner = %partner, error = %e, "Brain failed to answer");
                format!("ERROR: {e}")
            }
        }
    }
}

/// Jabber client Core answering through a `ChatBrain`.
pub struct CleverJabberBot {
    name: String,
    description: String,
    config: JabberConfig,
    units: Arc<UnitRegistry>,
    brain: Arc<dyn ChatBrain>,
    logic: Arc<Mutex<BotLogic>>,
    session: Mutex<Option<XmppSession>>,
    connected: Arc<AtomicBool>,
}

impl CleverJabberBot {
    pub fn new(config: JabberConfig, brain: Arc<dyn ChatBrain>) -> Result<Self> {
        config.validate()?;
        let units = Arc::new(UnitRegistry::new(config.name.clone()));
        let logic = BotLogic::new(&config, units.clone(), brain.clone());
        Ok(Self {
            name: config.name.clone(),
            description: config.description.clone(),
            config,
            units,
            brain,
            logic: Arc::new(Mutex::new(logic)),
            session: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn jid(&self) -> &str {
        &self.config.id
    }

    pub async fn nick(&self) -> String {
        self.logic.lock().await.nick().to_string()
    }

    /// Run `msg` through the bot logic without a connection.
    pub async fn handle(&self, msg: &IncomingMessage) -> Vec<BotAction> {
        self.logic.lock().await.handle(msg).await
    }
}

#[async_trait]
impl Core for CleverJabberBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn units(&self) -> &UnitRegistry {
        &self.units
    }

    #[tracing::instrument(skip(self), fields(core = %self.name, jid = %self.config.id))]
    async fn activate(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            tracing::debug!("Already active");
            return Ok(());
        }

        tracing::info!("Activating");
        let (started, ready) = XmppSession::spawn(
            &self.config.id,
            &self.config.password,
            self.logic.clone(),
            self.connected.clone(),
        )?;

        match tokio::time::timeout(ACTIVATION_TIMEOUT, ready).await {
            Ok(Ok(Ok(()))) => {
                *session = Some(started);
                tracing::info!("Activated");
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(error = %e, "Activation failed - unable to connect");
                started.stop().await;
                Err(e)
            }
            Ok(Err(_)) => {
                started.stop().await;
                Err(Error::transport("session ended before login"))
            }
            Err(_) => {
                started.stop().await;
                Err(Error::transport("server is taking too long to respond"))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(core = %self.name))]
    async fn deactivate(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        tracing::info!("Deactivating");
        session.stop().await;
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("Deactivated");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn create_unit(&self) -> Result<SharedUnit> {
        Ok(Arc::new(CleverBotMind::new(self.brain.clone())))
    }
}
