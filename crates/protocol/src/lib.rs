//! Shared command queue wire types.
//!
//! This crate defines the payload exchanged between the script host and the
//! client process through the shared command queue. The wire format is a
//! single JSON document:
//!
//! ```json
//! {
//!   "lastProcessedId": 41,
//!   "pending": [
//!     {"kind": "Say", "params": {"0": "hello"}},
//!     {"kind": "Move", "params": {"0": "120", "1": "-4.5"}}
//!   ]
//! }
//! ```
//!
//! The script host only appends to `pending` and never advances
//! `lastProcessedId`. The client only advances `lastProcessedId` and drains
//! consumed entries from the front of `pending`.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sequence number assigned to a submitted command.
pub type CommandId = u64;

// =============================================================================
// Command kinds
// =============================================================================

/// The closed set of operations the client process understands.
///
/// Variant names are the wire names and the Lua global names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandKind {
    AttackSelected,
    ClickButton,
    ClickSelected,
    CloseContainer,
    Drag,
    Dropc,
    Dropg,
    FindButton,
    FindItem,
    FindLabel,
    FindMobile,
    FindPanel,
    FindPermanent,
    FollowSelected,
    Key,
    LogoutAndLogin,
    Macro,
    Move,
    Pathfind,
    RefreshStatus,
    Say,
    SayCustom,
    ScanJournal,
    SetTargetFrameRate,
    SetUsernamePassword,
    Stop,
    TargetDynamic,
    TargetLoc,
    TargetPermanent,
    ToggleWarPeace,
    UseSelected,
}

impl CommandKind {
    /// Every kind, in declaration order.
    pub const ALL: [CommandKind; 31] = [
        CommandKind::AttackSelected,
        CommandKind::ClickButton,
        CommandKind::ClickSelected,
        CommandKind::CloseContainer,
        CommandKind::Drag,
        CommandKind::Dropc,
        CommandKind::Dropg,
        CommandKind::FindButton,
        CommandKind::FindItem,
        CommandKind::FindLabel,
        CommandKind::FindMobile,
        CommandKind::FindPanel,
        CommandKind::FindPermanent,
        CommandKind::FollowSelected,
        CommandKind::Key,
        CommandKind::LogoutAndLogin,
        CommandKind::Macro,
        CommandKind::Move,
        CommandKind::Pathfind,
        CommandKind::RefreshStatus,
        CommandKind::Say,
        CommandKind::SayCustom,
        CommandKind::ScanJournal,
        CommandKind::SetTargetFrameRate,
        CommandKind::SetUsernamePassword,
        CommandKind::Stop,
        CommandKind::TargetDynamic,
        CommandKind::TargetLoc,
        CommandKind::TargetPermanent,
        CommandKind::ToggleWarPeace,
        CommandKind::UseSelected,
    ];

    /// The wire / Lua name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::AttackSelected => "AttackSelected",
            CommandKind::ClickButton => "ClickButton",
            CommandKind::ClickSelected => "ClickSelected",
            CommandKind::CloseContainer => "CloseContainer",
            CommandKind::Drag => "Drag",
            CommandKind::Dropc => "Dropc",
            CommandKind::Dropg => "Dropg",
            CommandKind::FindButton => "FindButton",
            CommandKind::FindItem => "FindItem",
            CommandKind::FindLabel => "FindLabel",
            CommandKind::FindMobile => "FindMobile",
            CommandKind::FindPanel => "FindPanel",
            CommandKind::FindPermanent => "FindPermanent",
            CommandKind::FollowSelected => "FollowSelected",
            CommandKind::Key => "Key",
            CommandKind::LogoutAndLogin => "LogoutAndLogin",
            CommandKind::Macro => "Macro",
            CommandKind::Move => "Move",
            CommandKind::Pathfind => "Pathfind",
            CommandKind::RefreshStatus => "RefreshStatus",
            CommandKind::Say => "Say",
            CommandKind::SayCustom => "SayCustom",
            CommandKind::ScanJournal => "ScanJournal",
            CommandKind::SetTargetFrameRate => "SetTargetFrameRate",
            CommandKind::SetUsernamePassword => "SetUsernamePassword",
            CommandKind::Stop => "Stop",
            CommandKind::TargetDynamic => "TargetDynamic",
            CommandKind::TargetLoc => "TargetLoc",
            CommandKind::TargetPermanent => "TargetPermanent",
            CommandKind::ToggleWarPeace => "ToggleWarPeace",
            CommandKind::UseSelected => "UseSelected",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a name is not part of [`CommandKind::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command kind: {0}")]
pub struct ParseCommandKindError(pub String);

impl FromStr for CommandKind {
    type Err = ParseCommandKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ParseCommandKindError(s.to_string()))
    }
}

// =============================================================================
// Command parameters
// =============================================================================

/// Positional arguments of a command, already rendered as printable strings.
///
/// On the wire this is a JSON object keyed by the decimal argument index
/// (`{"0": "...", "1": "..."}`). In memory it is kept as an ordered list so
/// that index 10 sorts after index 9.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandParams(Vec<String>);

impl CommandParams {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.0.push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(index, value)` pairs in positional order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().enumerate().map(|(i, v)| (i, v.as_str()))
    }
}

impl<S: Into<String>> FromIterator<S> for CommandParams {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for CommandParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, value) in self.iter() {
            map.serialize_entry(&index.to_string(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CommandParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ParamsVisitor)
    }
}

struct ParamsVisitor;

impl<'de> Visitor<'de> for ParamsVisitor {
    type Value = CommandParams;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from positional index to string")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(usize, String)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            let index = key
                .parse::<usize>()
                .map_err(|_| de::Error::custom(format!("parameter key is not an index: {key:?}")))?;
            entries.push((index, value));
        }
        entries.sort_by_key(|(index, _)| *index);
        for (expected, (index, _)) in entries.iter().enumerate() {
            if *index != expected {
                return Err(de::Error::custom(format!("missing positional parameter {expected}")));
            }
        }
        Ok(CommandParams(entries.into_iter().map(|(_, v)| v).collect()))
    }
}

// =============================================================================
// Command
// =============================================================================

/// A single requested client action. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    kind: CommandKind,
    #[serde(default)]
    params: CommandParams,
}

impl Command {
    pub fn new(kind: CommandKind, params: CommandParams) -> Self {
        Self { kind, params }
    }

    /// A command with no arguments.
    pub fn bare(kind: CommandKind) -> Self {
        Self::new(kind, CommandParams::new())
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn params(&self) -> &CommandParams {
        &self.params
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        for (index, value) in self.params.iter() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value:?}")?;
        }
        f.write_str(")")
    }
}

/// Render a number the way command parameters carry it: integral values
/// without a fractional part, everything else in shortest round-trip form.
pub fn printable_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

// =============================================================================
// Queue snapshot
// =============================================================================

/// The whole shared queue: the consumer's progress counter plus the commands
/// it has not processed yet, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub last_processed_id: CommandId,
    #[serde(default)]
    pub pending: Vec<Command>,
}

impl QueueSnapshot {
    pub fn new(last_processed_id: CommandId, pending: Vec<Command>) -> Self {
        Self { last_processed_id, pending }
    }

    /// Whether the consumer has processed the command with `id`.
    pub fn has_processed(&self, id: CommandId) -> bool {
        self.last_processed_id >= id
    }

    /// The id the pending command at `position` will carry once processed.
    /// `None` when that id does not fit in a [`CommandId`].
    pub fn pending_id(&self, position: usize) -> Option<CommandId> {
        let offset = CommandId::try_from(position).ok()?.checked_add(1)?;
        self.last_processed_id.checked_add(offset)
    }
}
