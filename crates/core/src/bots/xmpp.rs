//! # XMPP Session
//!
//! Runs a `tokio-xmpp` client in a background task and connects it to the
//! bot logic: stanzas in, `BotAction`s out.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_xmpp::parsers::message::{Body, Message, MessageType};
use tokio_xmpp::parsers::muc::Muc;
use tokio_xmpp::parsers::presence::{Presence, Type as PresenceType};
use tokio_xmpp::parsers::{BareJid, Element, Jid};
use tokio_xmpp::{AsyncClient, Event};

use super::jabber::{BotAction, BotLogic, IncomingMessage, MessageKind};
use crate::error::{Error, Result};

const NS_DELAY: &str = "urn:xmpp:delay";

/// Handle on a running client task.
pub struct XmppSession {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl XmppSession {
    /// Start the client for `jid`. The returned receiver resolves once the
    /// first login succeeds or fails.
    pub fn spawn(
        jid: &str,
        password: &str,
        logic: Arc<Mutex<BotLogic>>,
        connected: Arc<AtomicBool>,
    ) -> Result<(Self, oneshot::Receiver<Result<()>>)> {
        let jid = BareJid::from_str(jid)
            .map_err(|e| Error::transport(format!("invalid jid '{}': {}", jid, e)))?;
        let password = password.to_string();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = tokio::spawn(run(jid, password, logic, connected, shutdown_rx, ready_tx));

        Ok((
            Self {
                shutdown: shutdown_tx,
                task,
            },
            ready_rx,
        ))
    }

    /// Ask the client to close its stream and wait for the task to end.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "XMPP task ended abnormally");
        }
    }
}

async fn run(
    jid: BareJid,
    password: String,
    logic: Arc<Mutex<BotLogic>>,
    connected: Arc<AtomicBool>,
    mut shutdown: oneshot::Receiver<()>,
    ready: oneshot::Sender<Result<()>>,
) {
    let mut client = AsyncClient::new(jid, password);
    client.set_reconnect(true);
    let mut ready = Some(ready);

    loop {
        let event = tokio::select! {
            _ = &mut shutdown => break,
            event = client.next() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if event.is_online() {
            connected.store(true, Ordering::SeqCst);
            tracing::info!("XMPP session online");

            let mut stanzas = vec![Element::from(Presence::new(PresenceType::None))];
            for action in logic.lock().await.rejoin_actions() {
                match action_stanza(&action) {
                    Ok(stanza) => stanzas.push(stanza),
                    Err(e) => tracing::warn!(error = %e, "Skipping rejoin"),
                }
            }
            for stanza in stanzas {
                if let Err(e) = client.send_stanza(stanza).await {
                    tracing::error!(error = %e, "Failed to send stanza");
                }
            }
            if let Some(tx) = ready.take() {
                let _ = tx.send(Ok(()));
            }
        } else if let Event::Disconnected(e) = &event {
            connected.store(false, Ordering::SeqCst);
            tracing::warn!(error = %e, "XMPP session disconnected");
            if let Some(tx) = ready.take() {
                let _ = tx.send(Err(Error::transport(e.to_string())));
                break;
            }
        } else if let Some(stanza) = event.into_stanza() {
            let Some(incoming) = incoming_message(stanza) else {
                continue;
            };
            let Some(actions) = handle_or_shutdown(&logic, &incoming, &mut shutdown).await else {
                break;
            };
            for action in actions {
                let stanza = match action_stanza(&action) {
                    Ok(stanza) => stanza,
                    Err(e) => {
                        tracing::error!(error = %e, "Cannot build stanza");
                        continue;
                    }
                };
                if let Err(e) = client.send_stanza(stanza).await {
                    tracing::error!(error = %e, "Failed to send stanza");
                }
            }
        }
    }

    if let Err(e) = client.send_end().await {
        tracing::debug!(error = %e, "Closing stream failed");
    }
    connected.store(false, Ordering::SeqCst);
    tracing::info!("XMPP session closed");
}

/// Run `incoming` through the bot logic. `None` when `shutdown` fires first,
/// which drops the in-flight brain request.
async fn handle_or_shutdown(
    logic: &Mutex<BotLogic>,
    incoming: &IncomingMessage,
    shutdown: &mut oneshot::Receiver<()>,
) -> Option<Vec<BotAction>> {
    tokio::select! {
        _ = shutdown => None,
        actions = async { logic.lock().await.handle(incoming).await } => Some(actions),
    }
}

/// Convert a received stanza into a message for the bot, if it is one.
///
/// Messages without a body (chat states, receipts) and delayed room history
/// are dropped.
pub fn incoming_message(stanza: Element) -> Option<IncomingMessage> {
    let message = Message::try_from(stanza).ok()?;
    if message.payloads.iter().any(|p| p.is("delay", NS_DELAY)) {
        return None;
    }
    let from = message.from.as_ref()?.to_string();
    let body = message.bodies.values().next()?.0.clone();
    Some(IncomingMessage {
        from,
        kind: message_kind(&message.type_),
        body,
    })
}

fn message_kind(type_: &MessageType) -> MessageKind {
    match type_ {
        MessageType::Chat => MessageKind::Chat,
        MessageType::Normal => MessageKind::Normal,
        MessageType::Groupchat => MessageKind::GroupChat,
        MessageType::Headline => MessageKind::Headline,
        MessageType::Error => MessageKind::Error,
    }
}

fn message_type(kind: MessageKind) -> MessageType {
    match kind {
        MessageKind::Chat => MessageType::Chat,
        MessageKind::Normal => MessageType::Normal,
        MessageKind::GroupChat => MessageType::Groupchat,
        MessageKind::Headline => MessageType::Headline,
        MessageKind::Error => MessageType::Error,
    }
}

fn parse_jid(jid: &str) -> Result<Jid> {
    Jid::from_str(jid).map_err(|e| Error::transport(format!("invalid jid '{}': {}", jid, e)))
}

/// Build the stanza that carries out `action`.
pub fn action_stanza(action: &BotAction) -> Result<Element> {
    match action {
        BotAction::Reply { to, kind, body } => {
            let mut message = Message::new(Some(parse_jid(to)?));
            message.type_ = message_type(*kind);
            message.bodies.insert(String::new(), Body(body.clone()));
            Ok(message.into())
        }
        BotAction::JoinRoom { room, nick } => {
            let presence = Presence::new(PresenceType::None)
                .with_to(parse_jid(&format!("{room}/{nick}"))?)
                .with_payloads(vec![Muc::new().into()]);
            Ok(presence.into())
        }
        BotAction::LeaveRoom { room, nick, status } => {
            let mut presence = Presence::new(PresenceType::Unavailable)
                .with_to(parse_jid(&format!("{room}/{nick}"))?);
            presence.statuses.insert(String::new(), status.clone());
            Ok(presence.into())
        }
    }
}
