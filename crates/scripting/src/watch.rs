//! Flattening of visible bindings into the printable variable snapshot.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use clientlink_protocol::printable_number;

/// Name the host gives to variadic arguments.
pub const VARARGS_NAME: &str = "...";

/// Which set of bindings an update reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchScope {
    Watches,
    ValueStack,
    CallStack,
    Locals,
    Threads,
}

/// A script value as seen by the debugger: printable scalars, one level of
/// containers, and opaque categories that are never shown.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchValue {
    Nil,
    Void,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Tuple(Vec<WatchValue>),
    Table(Vec<(WatchValue, WatchValue)>),
    Function,
    UserData,
    Thread,
    /// Tail-call or yield request; never user data.
    Sentinel,
}

impl WatchValue {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            WatchValue::Nil
                | WatchValue::Void
                | WatchValue::Boolean(_)
                | WatchValue::Integer(_)
                | WatchValue::Number(_)
                | WatchValue::String(_)
        )
    }

    /// Debugger rendering. Strings are quoted so `"5"` and `5` stay distinct.
    pub fn to_debug_string(&self) -> String {
        match self {
            WatchValue::Nil => "nil".to_string(),
            WatchValue::Void => "void".to_string(),
            WatchValue::Boolean(b) => b.to_string(),
            WatchValue::Integer(i) => i.to_string(),
            WatchValue::Number(n) => printable_number(*n),
            WatchValue::String(s) => format!("\"{s}\""),
            WatchValue::Tuple(values) => {
                let parts: Vec<String> = values.iter().map(WatchValue::to_debug_string).collect();
                format!("({})", parts.join(", "))
            }
            WatchValue::Table(_) => "table".to_string(),
            WatchValue::Function => "function".to_string(),
            WatchValue::UserData => "userdata".to_string(),
            WatchValue::Thread => "thread".to_string(),
            WatchValue::Sentinel => "(sentinel)".to_string(),
        }
    }
}

/// A named binding reported by the host. `value` is `None` when the host
/// could not read it.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchItem {
    pub name: String,
    pub value: Option<WatchValue>,
}

impl WatchItem {
    pub fn new(name: impl Into<String>, value: WatchValue) -> Self {
        Self { name: name.into(), value: Some(value) }
    }
}

/// Flatten `items` into `name -> printable value` entries.
///
/// - tuples expand to `name[i]`
/// - tables expand their scalar values to `name[key]`
/// - scalars keep their own name, except the varargs name
/// - everything else is dropped
pub fn collect_variables(items: &[WatchItem]) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for item in items {
        let Some(value) = &item.value else { continue };
        if item.name.is_empty() {
            continue;
        }
        match value {
            WatchValue::Tuple(values) => {
                for (i, component) in values.iter().enumerate() {
                    vars.insert(format!("{}[{}]", item.name, i), component.to_debug_string());
                }
            }
            WatchValue::Table(pairs) => {
                for (key, entry) in pairs.iter().filter(|(_, entry)| entry.is_scalar()) {
                    vars.insert(
                        format!("{}[{}]", item.name, key.to_debug_string()),
                        entry.to_debug_string(),
                    );
                }
            }
            scalar if scalar.is_scalar() => {
                if item.name != VARARGS_NAME {
                    vars.insert(item.name.clone(), scalar.to_debug_string());
                }
            }
            _ => {}
        }
    }
    vars
}

/// The last reported locals, behind their own lock.
#[derive(Debug, Default)]
pub struct VariableSnapshot {
    vars: Mutex<BTreeMap<String, String>>,
}

impl VariableSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot. Only [`WatchScope::Locals`] updates apply.
    pub fn update(&self, scope: WatchScope, items: &[WatchItem]) {
        if scope != WatchScope::Locals {
            return;
        }
        let vars = collect_variables(items);
        *self.vars.lock().unwrap_or_else(PoisonError::into_inner) = vars;
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
