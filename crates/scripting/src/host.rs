//! The per-run Lua VM and its bindings.
//!
//! Each run gets a fresh VM on the worker thread. Globals installed:
//!
//! - one function per command kind (`Move(x, y)`, `Say("hi")`, ...) that
//!   submits through the dispatcher and blocks until acknowledged
//! - `sleep(ms)` and `print(...)`
//! - an `__index` metamethod on `_G` that resolves unknown names against
//!   the process state view
//!
//! A line hook reports locals to the step driver and holds the script while
//! the driver answers [`DebuggerAction::None`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mlua::{
    Function as LuaFunction, HookTriggers, Lua, LuaOptions, MultiValue, StdLib, Table, Value,
    VmState,
};

use clientlink_protocol::{printable_number, Command, CommandKind, CommandParams};
use clientlink_queue::{CancelToken, CommandDispatcher, DispatchError};
use clientlink_state::ProcessStateView;

use crate::driver::{DebuggerAction, ScriptFault, SourceLocation, StepDriver};
use crate::watch::{WatchItem, WatchScope, WatchValue};

/// Delay between step-driver polls while a script is held.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Most locals read per frame.
const MAX_LOCALS: i64 = 200;

/// Most entries read from a table-valued local.
const MAX_TABLE_ENTRIES: usize = 64;

/// Collaborators every run of a session shares.
#[derive(Clone)]
pub struct HostBindings {
    pub dispatcher: CommandDispatcher,
    pub state: ProcessStateView,
    /// Extra `require` roots, searched after the script's base path.
    pub module_paths: Vec<PathBuf>,
}

impl HostBindings {
    pub fn new(dispatcher: CommandDispatcher, state: ProcessStateView) -> Self {
        Self { dispatcher, state, module_paths: Vec::new() }
    }

    pub fn with_module_paths(mut self, module_paths: Vec<PathBuf>) -> Self {
        self.module_paths = module_paths;
        self
    }
}

impl std::fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBindings")
            .field("dispatcher", &self.dispatcher)
            .field("state", &self.state)
            .field("module_paths", &self.module_paths)
            .finish()
    }
}

/// Raised inside the VM to unwind a stopped script.
#[derive(Debug, thiserror::Error)]
#[error("script stopped")]
struct ScriptCancelled;

fn cancelled() -> mlua::Error {
    mlua::Error::external(ScriptCancelled)
}

/// Raised at every line once a command has failed fatally.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ScriptAborted(String);

/// The first fatal dispatch failure of a run. The line hook raises it again
/// at each step, so a `pcall` around the command cannot keep the script
/// going.
#[derive(Clone, Default)]
struct FatalSlot(Arc<Mutex<Option<String>>>);

impl FatalSlot {
    fn set(&self, message: String) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

pub(crate) struct ScriptRun<'a> {
    pub name: &'a str,
    pub source: &'a str,
    pub base_path: &'a Path,
}

#[derive(Debug)]
pub(crate) enum RunOutcome {
    Completed,
    Cancelled,
    /// `reported` is true when the driver already surfaced the fault.
    Faulted { fault: ScriptFault, reported: bool },
}

/// Run a script to completion on the current thread.
pub(crate) fn run_script(
    bindings: &HostBindings,
    run: &ScriptRun<'_>,
    driver: Arc<dyn StepDriver>,
    cancel: &CancelToken,
    output: impl Fn(String) + 'static,
) -> RunOutcome {
    let fatal = FatalSlot::default();
    let lua = match prepare_vm(bindings, run, driver.clone(), cancel, &fatal, output) {
        Ok(lua) => lua,
        Err(e) => {
            return RunOutcome::Faulted {
                fault: ScriptFault::runtime(format!("failed to set up Lua: {}", format_lua_error(&e))),
                reported: false,
            }
        }
    };

    driver.set_source_code(run.name, run.source);
    let result = lua.load(run.source).set_name(format!("@{}", run.name)).exec();
    lua.remove_hook();
    driver.signal_execution_ended();

    if cancel.is_cancelled() && result.is_err() {
        return RunOutcome::Cancelled;
    }
    // Checked before the result: a script that caught the failure may still
    // have completed normally.
    if let Some(message) = fatal.get() {
        let fault = driver.signal_runtime_fault(ScriptFault::runtime(message));
        return RunOutcome::Faulted { fault, reported: true };
    }

    match result {
        Ok(()) => RunOutcome::Completed,
        Err(e) if find_cause::<ScriptCancelled>(&e).is_some() => RunOutcome::Cancelled,
        Err(e @ mlua::Error::SyntaxError { .. }) => RunOutcome::Faulted {
            fault: ScriptFault::syntax(format_lua_error(&e)),
            reported: false,
        },
        Err(e) => {
            let fault = driver.signal_runtime_fault(ScriptFault::runtime(format_lua_error(&e)));
            RunOutcome::Faulted { fault, reported: true }
        }
    }
}

fn prepare_vm(
    bindings: &HostBindings,
    run: &ScriptRun<'_>,
    driver: Arc<dyn StepDriver>,
    cancel: &CancelToken,
    fatal: &FatalSlot,
    output: impl Fn(String) + 'static,
) -> mlua::Result<Lua> {
    // SAFETY: the debug library is only kept long enough to capture
    // `debug.getlocal` and is unreachable from scripts before any of their
    // code runs.
    let lua = unsafe { Lua::unsafe_new_with(StdLib::ALL_SAFE | StdLib::DEBUG, LuaOptions::default()) };
    let getlocal = capture_getlocal(&lua);
    forget_debug_library(&lua)?;

    validate_command_names()?;
    register_commands(&lua, &bindings.dispatcher, cancel, fatal)?;
    register_sleep(&lua, cancel)?;
    register_print(&lua, output)?;
    install_state_lookup(&lua, &bindings.state)?;
    set_module_paths(&lua, run.base_path, &bindings.module_paths)?;
    install_step_hook(&lua, run.name, driver, cancel.clone(), fatal.clone(), getlocal);
    Ok(lua)
}

fn capture_getlocal(lua: &Lua) -> Option<LuaFunction> {
    let debug_table: Table = lua.globals().get("debug").ok()?;
    debug_table.get("getlocal").ok()
}

fn forget_debug_library(lua: &Lua) -> mlua::Result<()> {
    lua.globals().set("debug", Value::Nil)?;
    let package: Table = lua.globals().get("package")?;
    let loaded: Table = package.get("loaded")?;
    loaded.set("debug", Value::Nil)
}

/// Every kind must map back to itself by name, or scripts would call the
/// wrong command.
fn validate_command_names() -> mlua::Result<()> {
    for kind in CommandKind::ALL {
        match kind.name().parse::<CommandKind>() {
            Ok(parsed) if parsed == kind => {}
            _ => {
                return Err(mlua::Error::RuntimeError(format!(
                    "command kind {} does not round-trip by name",
                    kind.name()
                )))
            }
        }
    }
    Ok(())
}

fn register_commands(
    lua: &Lua,
    dispatcher: &CommandDispatcher,
    cancel: &CancelToken,
    fatal: &FatalSlot,
) -> mlua::Result<()> {
    let globals = lua.globals();
    for kind in CommandKind::ALL {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        let fatal = fatal.clone();
        let callback = lua.create_function(move |_, args: MultiValue| {
            let params: CommandParams = args.iter().map(lua_value_to_string).collect();
            submit_command(&dispatcher, Command::new(kind, params), &cancel, &fatal)
        })?;
        globals.set(kind.name(), callback)?;
    }
    Ok(())
}

fn submit_command(
    dispatcher: &CommandDispatcher,
    command: Command,
    cancel: &CancelToken,
    fatal: &FatalSlot,
) -> mlua::Result<()> {
    match dispatcher.submit(command, cancel) {
        Ok(_) => Ok(()),
        Err(e) if e.is_absorbable() => {
            log::warn!("{e}; continuing");
            Ok(())
        }
        Err(DispatchError::Cancelled) => Err(cancelled()),
        Err(e) => {
            fatal.set(e.to_string());
            Err(mlua::Error::external(e))
        }
    }
}

fn register_sleep(lua: &Lua, cancel: &CancelToken) -> mlua::Result<()> {
    let cancel = cancel.clone();
    let sleep_fn = lua.create_function(move |_, ms: Option<f64>| {
        let ms = ms.unwrap_or(0.0);
        let duration = if ms.is_finite() && ms > 0.0 {
            Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        if cancel.sleep(duration) {
            Ok(())
        } else {
            Err(cancelled())
        }
    })?;
    lua.globals().set("sleep", sleep_fn)
}

fn register_print(lua: &Lua, output: impl Fn(String) + 'static) -> mlua::Result<()> {
    let print_fn = lua.create_function(move |_, args: MultiValue| {
        let parts: Vec<String> = args.iter().map(lua_value_to_string).collect();
        output(parts.join("\t"));
        Ok(())
    })?;
    lua.globals().set("print", print_fn)
}

/// Route reads of undefined globals to the process state.
fn install_state_lookup(lua: &Lua, state: &ProcessStateView) -> mlua::Result<()> {
    let state = state.clone();
    let index_fn = lua.create_function(move |_, (_globals, key): (Table, Value)| {
        Ok(match key {
            Value::String(key) => state.lookup(&key.to_string_lossy()),
            _ => None,
        })
    })?;
    let metatable = lua.create_table()?;
    metatable.set("__index", index_fn)?;
    let setmetatable: LuaFunction = lua.globals().get("setmetatable")?;
    setmetatable.call::<()>((lua.globals(), metatable))
}

fn set_module_paths(lua: &Lua, base_path: &Path, extra: &[PathBuf]) -> mlua::Result<()> {
    let roots = std::iter::once(base_path).chain(extra.iter().map(PathBuf::as_path));
    let mut patterns = Vec::new();
    for root in roots {
        let root = if root.as_os_str().is_empty() { Path::new(".") } else { root };
        let root = root.to_string_lossy();
        patterns.push(format!("{root}/?.lua"));
        patterns.push(format!("{root}/?/init.lua"));
    }
    let package: Table = lua.globals().get("package")?;
    package.set("path", patterns.join(";"))
}

fn install_step_hook(
    lua: &Lua,
    chunk: &str,
    driver: Arc<dyn StepDriver>,
    cancel: CancelToken,
    fatal: FatalSlot,
    getlocal: Option<LuaFunction>,
) {
    let chunk = chunk.to_string();
    let steps = AtomicU64::new(0);
    lua.set_hook(HookTriggers::new().every_line(), move |_lua, debug| {
        let ip = steps.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(message) = fatal.get() {
            return Err(mlua::Error::external(ScriptAborted(message)));
        }

        if let Some(getlocal) = &getlocal {
            match collect_locals(getlocal) {
                Ok(items) => driver.update(WatchScope::Locals, &items),
                Err(e) => log::trace!("could not read locals: {e}"),
            }
        }

        let location = SourceLocation {
            chunk: chunk.clone(),
            line: u32::try_from(debug.curr_line()).ok(),
        };
        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            match driver.get_action(ip, &location) {
                DebuggerAction::Run => return Ok(VmState::Continue),
                DebuggerAction::None => std::thread::sleep(PAUSE_POLL_INTERVAL),
            }
        }
    });
}

/// Locals of the frame the hook fired in. Level 1 is that frame because
/// level 0 is `getlocal` itself.
fn collect_locals(getlocal: &LuaFunction) -> mlua::Result<Vec<WatchItem>> {
    let mut items = Vec::new();
    for index in 1..=MAX_LOCALS {
        let (name, value): (Option<String>, Value) = getlocal.call((1, index))?;
        let Some(name) = name else { break };
        // (temporary), (for state), (C temporary)
        if name.starts_with('(') {
            continue;
        }
        items.push(WatchItem { name, value: Some(watch_value(&value, true)?) });
    }
    Ok(items)
}

fn watch_value(value: &Value, expand: bool) -> mlua::Result<WatchValue> {
    Ok(match value {
        Value::Nil => WatchValue::Nil,
        Value::Boolean(b) => WatchValue::Boolean(*b),
        Value::Integer(i) => WatchValue::Integer(*i),
        Value::Number(n) => WatchValue::Number(*n),
        Value::String(s) => WatchValue::String(s.to_string_lossy().to_string()),
        Value::Table(table) if expand => {
            let mut pairs = Vec::new();
            for pair in table.clone().pairs::<Value, Value>().take(MAX_TABLE_ENTRIES) {
                let (key, entry) = pair?;
                pairs.push((watch_value(&key, false)?, watch_value(&entry, false)?));
            }
            WatchValue::Table(pairs)
        }
        Value::Table(_) => WatchValue::Table(Vec::new()),
        Value::Function(_) => WatchValue::Function,
        Value::Thread(_) => WatchValue::Thread,
        Value::UserData(_) | Value::LightUserData(_) => WatchValue::UserData,
        _ => WatchValue::Sentinel,
    })
}

/// Printable form of a Lua value, as used for `print` and command params.
pub fn lua_value_to_string(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => printable_number(*n),
        Value::String(s) => s.to_string_lossy().to_string(),
        Value::Table(_) => "table".to_string(),
        Value::Function(_) => "function".to_string(),
        Value::Thread(_) => "thread".to_string(),
        Value::UserData(_) => "userdata".to_string(),
        Value::LightUserData(_) => "lightuserdata".to_string(),
        Value::Error(e) => format!("error: {}", e),
        _ => "<unknown>".to_string(),
    }
}

/// Format a Lua error for display. Syntax errors keep their position.
fn format_lua_error(error: &mlua::Error) -> String {
    match error {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } => format_lua_error(cause),
        mlua::Error::WithContext { cause, .. } => format_lua_error(cause),
        mlua::Error::ExternalError(e) => e.to_string(),
        _ => error.to_string(),
    }
}

/// Find an error of type `T` raised from Rust, looking through callback
/// and context wrappers.
fn find_cause<T: std::error::Error + 'static>(error: &mlua::Error) -> Option<&T> {
    match error {
        mlua::Error::CallbackError { cause, .. } => find_cause(cause),
        mlua::Error::WithContext { cause, .. } => find_cause(cause),
        mlua::Error::ExternalError(e) => e.downcast_ref::<T>(),
        _ => None,
    }
}
