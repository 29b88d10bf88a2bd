//! # Bots
//!
//! Cores that put a conversational AI behind a chat network.
//!
//! - `cleverbot` - Cleverbot API client and the per-conversation `CleverBotMind` Unit
//! - `commands` - `#`-prefixed chat commands
//! - `jabber` - `CleverJabberBot`, the Jabber/XMPP Core
//! - `xmpp` - background XMPP session driving the bot

pub mod cleverbot;
pub mod commands;
pub mod jabber;
pub mod xmpp;

pub use cleverbot::{ChatBrain, CleverBotMind, Cleverbot, ConversationMind};
pub use commands::{Command, CommandError};
pub use jabber::{BotAction, BotLogic, CleverJabberBot, IncomingMessage, MessageKind};
