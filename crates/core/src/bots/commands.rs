//! # Bot Commands
//!
//! `#`-prefixed chat commands understood by the Jabber bot. Commands are
//! recognised by prefix, in the order `join`, `leave`, `setnick`, `nick`,
//! `history`, `help`.

pub const DONE: &str = "done";
pub const ERR_ARGUMENTS: &str = "ERROR: invalid number of arguments";
pub const ERR_INVALID: &str = "ERROR: not valid command";

pub const HELP: &str = "This bot supports commands:

\thelp
\t  shows this help.

\thistory
\t  prints list of used commands (oldest command as first line, most recent as last line).

\tjoin <roomName>
\t  bot enters the given room.
\t  roomName .. there are two possible formats 'name@domain' | 'name', when you use only name bot appends @conference.<jidDomain>.

\tleave <roomName>
\t  bot leaves the given room.
\t  roomName .. there are two possible formats 'name@domain' | 'name', when you use only name bot appends @conference.<jidDomain>.

\tnick
\t  returns currently set nick of bot in jabber.

\tsetnick <nickValue>
\t  sets nick of bot in jabber.
";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Leave(String),
    SetNick(String),
    Nick,
    History,
    Help,
}

/// Why a command line was rejected; `Display` is the reply sent to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    InvalidArguments,
    Unknown,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::InvalidArguments => f.write_str(ERR_ARGUMENTS),
            CommandError::Unknown => f.write_str(ERR_INVALID),
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    /// Parse a command line (without the leading `#`).
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        if line.starts_with("join") {
            single_argument(line).map(Command::Join)
        } else if line.starts_with("leave") {
            single_argument(line).map(Command::Leave)
        } else if line.starts_with("setnick") {
            single_argument(line).map(Command::SetNick)
        } else if line.starts_with("nick") {
            Ok(Command::Nick)
        } else if line.starts_with("history") {
            Ok(Command::History)
        } else if line.starts_with("help") {
            Ok(Command::Help)
        } else {
            Err(CommandError::Unknown)
        }
    }
}

/// The second of exactly two whitespace-separated words.
fn single_argument(line: &str) -> Result<String, CommandError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [_, argument] => Ok((*argument).to_string()),
        _ => Err(CommandError::InvalidArguments),
    }
}

/// Full room JID: names containing `@` are taken as is, bare names are
/// placed on `conference_server`.
pub fn resolve_room(name: &str, conference_server: &str) -> String {
    if name.contains('@') {
        name.to_string()
    } else {
        format!("{name}@{conference_server}")
    }
}

/// `conference.<domain>` for the account `jid`.
pub fn conference_server_for(jid: &str) -> String {
    let domain = jid
        .split_once('@')
        .map(|(_, rest)| rest)
        .unwrap_or(jid);
    let domain = domain.split('/').next().unwrap_or(domain);
    format!("conference.{domain}")
}
