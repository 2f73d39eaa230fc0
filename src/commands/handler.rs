//! Command Handler Module
//!
//! Validates tokenized request lines against the [`CommandRegistry`] and
//! executes them against the storage engine.
//!
//! ## Dispatch
//!
//! ```text
//! tokens ──> name lookup ──> arity check ──> auth check ──> cmd_*() ──> Reply
//!                │                │               │
//!                ▼                ▼               ▼
//!         unknown command   wrong arity        NOAUTH
//! ```
//!
//! Every failure is a [`CommandError`]; its `Display` text becomes the
//! `-ERR` reply and the connection stays open.
//!
//! ## Supported Commands
//!
//! - `PING` - Test connection
//! - `SET key value [NX|XX] [GET] [EX seconds|PX milliseconds]` - Set a key
//! - `GET key` - Get a key's value
//! - `DEL key [key ...]` - Delete keys
//! - `EXISTS key [key ...]` - Count existing keys
//! - `DBSIZE` - Number of keys
//! - `FLUSHDB` - Clear the store (requires AUTH)
//! - `AUTH password` - Authenticate this connection
//! - `QUIT` - Close the connection

use crate::commands::registry::{CommandKind, CommandRegistry, CommandSpec};
use crate::connection::auth::{AuthError, AuthTracker};
use crate::connection::registry::ConnectionId;
use crate::protocol::Reply;
use crate::storage::{SetCondition, SetOutcome, StorageEngine};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Per-request errors. All of them are answered with an error reply and
/// leave the connection open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("no command")]
    NoCommand,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("NOAUTH authentication required")]
    AuthRequired,

    #[error("invalid password")]
    InvalidPassword,

    #[error("AUTH called without any password configured")]
    AuthNotConfigured,

    #[error("syntax error")]
    Syntax,

    #[error("invalid expire time in '{0}' command")]
    InvalidExpireTime(&'static str),
}

impl From<AuthError> for CommandError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidPassword => CommandError::InvalidPassword,
            AuthError::NotConfigured => CommandError::AuthNotConfigured,
        }
    }
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::error(err.to_string())
    }
}

/// The reply to one request, plus whether the connection ends after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub reply: Reply,
    /// Close the connection once the reply has been written (QUIT)
    pub close: bool,
}

impl Response {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            close: false,
        }
    }

    pub fn closing(reply: Reply) -> Self {
        Self { reply, close: true }
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        Response::new(reply)
    }
}

/// Options accepted by `SET` after the key and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SetOptions {
    condition: SetCondition,
    get: bool,
    ttl: Option<Duration>,
}

impl SetOptions {
    fn parse(args: &[Bytes]) -> Result<Self, CommandError> {
        let mut options = SetOptions::default();
        let mut args = args.iter();

        while let Some(arg) = args.next() {
            match arg.to_ascii_uppercase().as_slice() {
                b"NX" if options.condition == SetCondition::Always => {
                    options.condition = SetCondition::IfAbsent
                }
                b"XX" if options.condition == SetCondition::Always => {
                    options.condition = SetCondition::IfPresent
                }
                b"GET" if !options.get => options.get = true,
                unit @ (b"EX" | b"PX") if options.ttl.is_none() => {
                    let amount = args
                        .next()
                        .ok_or(CommandError::Syntax)
                        .and_then(parse_positive)?;
                    options.ttl = Some(if unit == b"EX" {
                        Duration::from_secs(amount)
                    } else {
                        Duration::from_millis(amount)
                    });
                }
                _ => return Err(CommandError::Syntax),
            }
        }

        Ok(options)
    }
}

fn parse_positive(raw: &Bytes) -> Result<u64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .ok_or(CommandError::InvalidExpireTime("SET"))
}

/// Validates and executes commands.
///
/// Cheap to clone; each connection holds its own copy.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    registry: Arc<CommandRegistry>,
    auth: Arc<AuthTracker>,
}

impl CommandHandler {
    pub fn new(
        storage: Arc<StorageEngine>,
        registry: Arc<CommandRegistry>,
        auth: Arc<AuthTracker>,
    ) -> Self {
        Self {
            storage,
            registry,
            auth,
        }
    }

    /// Executes one tokenized request on behalf of connection `conn`.
    pub fn execute(&self, conn: ConnectionId, tokens: &[Bytes]) -> Response {
        self.dispatch(conn, tokens)
            .unwrap_or_else(|err| Response::new(err.into()))
    }

    fn dispatch(&self, conn: ConnectionId, tokens: &[Bytes]) -> Result<Response, CommandError> {
        let (name, args) = tokens.split_first().ok_or(CommandError::NoCommand)?;
        let spec = self.resolve(name, args.len())?;

        if spec.requires_auth && !self.auth.is_authenticated(conn) {
            return Err(CommandError::AuthRequired);
        }

        let reply = match spec.kind {
            CommandKind::Ping => Reply::pong(),
            CommandKind::Set => self.cmd_set(args)?,
            CommandKind::Get => self.cmd_get(args),
            CommandKind::Del => self.cmd_del(args),
            CommandKind::Exists => self.cmd_exists(args),
            CommandKind::DbSize => Reply::integer(self.storage.len() as i64),
            CommandKind::FlushDb => {
                self.storage.flush();
                Reply::ok()
            }
            CommandKind::Auth => {
                self.auth.authenticate(conn, &args[0])?;
                Reply::ok()
            }
            CommandKind::Quit => return Ok(Response::closing(Reply::ok())),
        };

        Ok(Response::new(reply))
    }

    /// Finds the descriptor for `name` and checks the argument count.
    fn resolve(&self, name: &[u8], arg_count: usize) -> Result<&CommandSpec, CommandError> {
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();
        let spec = self
            .registry
            .lookup(&name)
            .ok_or(CommandError::UnknownCommand(name))?;

        if !spec.accepts(arg_count) {
            return Err(CommandError::WrongArity(spec.name));
        }
        Ok(spec)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// SET key value [NX|XX] [GET] [EX seconds|PX milliseconds]
    fn cmd_set(&self, args: &[Bytes]) -> Result<Reply, CommandError> {
        let options = SetOptions::parse(&args[2..])?;
        let expires_at = match options.ttl {
            Some(ttl) => Some(
                Instant::now()
                    .checked_add(ttl)
                    .ok_or(CommandError::InvalidExpireTime("SET"))?,
            ),
            None => None,
        };

        let outcome = self.storage.set_with(
            args[0].clone(),
            args[1].clone(),
            options.condition,
            expires_at,
        );

        Ok(match outcome {
            SetOutcome::Skipped => Reply::integer(0),
            SetOutcome::Written { previous } if options.get => Reply::from_optional(previous),
            SetOutcome::Written { .. } => Reply::ok(),
        })
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> Reply {
        Reply::from_optional(self.storage.get(&args[0]))
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[Bytes]) -> Reply {
        Reply::integer(self.storage.delete_many(args) as i64)
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[Bytes]) -> Reply {
        Reply::integer(self.storage.exists_many(args) as i64)
    }
}
