//! Command Registry
//!
//! The static table of every command BlitzDB understands: its name, how many
//! arguments it accepts, and whether the connection must have passed `AUTH`
//! first. The table is built once at startup and shared read-only by all
//! connections.

use std::collections::HashMap;
use std::fmt;

/// The closed set of commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Set,
    Get,
    Del,
    Exists,
    DbSize,
    FlushDb,
    Auth,
    Quit,
}

/// Metadata for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    /// Upper-case command name
    pub name: &'static str,
    /// Minimum number of arguments (not counting the command name)
    pub min_args: usize,
    /// Maximum number of arguments, `None` for unbounded
    pub max_args: Option<usize>,
    pub requires_auth: bool,
}

impl CommandSpec {
    const fn new(
        kind: CommandKind,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        requires_auth: bool,
    ) -> Self {
        Self {
            kind,
            name,
            min_args,
            max_args,
            requires_auth,
        }
    }

    /// Whether `count` arguments are acceptable.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Every supported command.
///
/// `SET key value [NX|XX] [GET] [EX seconds|PX milliseconds]` takes at most
/// six arguments.
const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new(CommandKind::Ping, "PING", 0, Some(0), false),
    CommandSpec::new(CommandKind::Set, "SET", 2, Some(6), false),
    CommandSpec::new(CommandKind::Get, "GET", 1, Some(1), false),
    CommandSpec::new(CommandKind::Del, "DEL", 1, None, false),
    CommandSpec::new(CommandKind::Exists, "EXISTS", 1, None, false),
    CommandSpec::new(CommandKind::DbSize, "DBSIZE", 0, Some(0), false),
    CommandSpec::new(CommandKind::FlushDb, "FLUSHDB", 0, Some(0), true),
    CommandSpec::new(CommandKind::Auth, "AUTH", 1, Some(1), false),
    CommandSpec::new(CommandKind::Quit, "QUIT", 0, Some(0), false),
];

/// Immutable lookup table from upper-case name to [`CommandSpec`].
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandSpec>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::from_specs(COMMANDS.iter().copied())
    }

    /// Builds a registry from an explicit set of descriptors.
    pub fn from_specs(specs: impl IntoIterator<Item = CommandSpec>) -> Self {
        Self {
            commands: specs.into_iter().map(|spec| (spec.name, spec)).collect(),
        }
    }

    /// Looks up an already upper-cased command name.
    pub fn lookup(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Command names in alphabetical order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
