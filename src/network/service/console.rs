//! Line-oriented operator console.
//!
//! Maps one command per line onto the moderation and unicast API of
//! `RelayHub`. The binary wires it to stdin/stdout.

use std::sync::Arc;
use bytes::Bytes;
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::network::hub::RelayHub;
use crate::network::types::PeerAddress;

const HELP: &str = "commands: peers | bans | handlers | kick <addr> | ban <addr> | unban <addr> | send <addr> <text> | help | quit";

/// Console error type
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConsoleError {
    /// Blank line
    #[error("Empty command")]
    Empty,

    /// First word is not a known command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command needs more arguments
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    /// Argument is not a host:port address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// One operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Peers,
    Bans,
    Handlers,
    Kick(PeerAddress),
    Ban(PeerAddress),
    Unban(PeerAddress),
    Send(PeerAddress, String),
    Help,
    Quit,
}

impl AdminCommand {
    /// Parse a console line
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command.to_ascii_lowercase().as_str() {
            "" => Err(ConsoleError::Empty),
            "peers" => Ok(AdminCommand::Peers),
            "bans" => Ok(AdminCommand::Bans),
            "handlers" => Ok(AdminCommand::Handlers),
            "kick" => Ok(AdminCommand::Kick(parse_addr(rest)?)),
            "ban" => Ok(AdminCommand::Ban(parse_addr(rest)?)),
            "unban" => Ok(AdminCommand::Unban(parse_addr(rest)?)),
            "send" => {
                let (addr, text) = rest.split_once(char::is_whitespace)
                    .ok_or(ConsoleError::MissingArgument("text"))?;
                Ok(AdminCommand::Send(parse_addr(addr)?, text.trim_start().to_string()))
            }
            "help" | "?" => Ok(AdminCommand::Help),
            "quit" | "exit" => Ok(AdminCommand::Quit),
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }

    /// Run the command against the hub and describe the outcome
    pub fn execute(&self, hub: &RelayHub) -> String {
        match self {
            AdminCommand::Peers => {
                let entries = hub.snapshot()
                    .iter()
                    .map(|(addr, handle)| format!("{} (up {}s)", addr, handle.connected_at().elapsed().as_secs()))
                    .collect();
                list("connected", entries)
            }
            AdminCommand::Bans => {
                let entries = hub.banned_peers().iter().map(|addr| addr.to_string()).collect();
                list("banned", entries)
            }
            AdminCommand::Handlers => {
                let names = hub.handler_names();
                if names.is_empty() {
                    "no handlers".to_string()
                } else {
                    format!("handlers: {}", names.join(", "))
                }
            }
            AdminCommand::Kick(addr) => {
                if hub.kick(addr) {
                    format!("kicked {}", addr)
                } else {
                    format!("{} is not connected", addr)
                }
            }
            AdminCommand::Ban(addr) => {
                if hub.ban(addr) {
                    format!("banned {} (disconnected)", addr)
                } else {
                    format!("banned {}", addr)
                }
            }
            AdminCommand::Unban(addr) => {
                if hub.unban(addr) {
                    format!("unbanned {}", addr)
                } else {
                    format!("{} was not banned", addr)
                }
            }
            AdminCommand::Send(addr, text) => {
                if hub.send_response(addr, Bytes::from(text.clone().into_bytes())) {
                    format!("sent {} bytes to {}", text.len(), addr)
                } else {
                    format!("could not send to {}", addr)
                }
            }
            AdminCommand::Help => HELP.to_string(),
            AdminCommand::Quit => "bye".to_string(),
        }
    }
}

fn parse_addr(text: &str) -> Result<PeerAddress, ConsoleError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ConsoleError::MissingArgument("address"));
    }
    text.parse().map_err(|_| ConsoleError::InvalidAddress(text.to_string()))
}

fn list(label: &str, entries: Vec<String>) -> String {
    if entries.is_empty() {
        return format!("no {} peers", label);
    }

    format!("{} ({}): {}", label, entries.len(), entries.join(", "))
}

/// Read commands until `quit` or end of input, writing one reply per line
pub async fn run_console<R, W>(input: R, mut output: W, hub: Arc<RelayHub>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let reply = match AdminCommand::parse(&line) {
            Ok(command) => {
                debug!("Console command: {:?}", command);
                let reply = command.execute(&hub);
                if command == AdminCommand::Quit {
                    output.write_all(format!("{}\n", reply).as_bytes()).await?;
                    output.flush().await?;
                    return Ok(());
                }
                reply
            }
            Err(ConsoleError::Empty) => continue,
            Err(e) => {
                warn!("Console: {}", e);
                format!("error: {}", e)
            }
        };

        output.write_all(format!("{}\n", reply).as_bytes()).await?;
        output.flush().await?;
    }

    Ok(())
}
