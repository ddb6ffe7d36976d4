//! `clink run`: one headless script session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use clientlink_config::Settings;
use clientlink_queue::{AttachedClient, ClientTarget, CommandDispatcher, DispatchConfig, SharedFileStore};
use clientlink_scripting::{
    DebuggerStatus, HostBindings, SessionControl, SessionEventPayload, SessionRegistry,
};
use clientlink_state::{ClientStatus, ProcessStateView};

use crate::exit_codes::EXIT_SCRIPT_FAULT;
use crate::CliError;

pub struct RunArgs {
    pub script: PathBuf,
    pub name: Option<String>,
    pub queue: PathBuf,
    pub status: Option<PathBuf>,
    pub untargeted: bool,
    pub pid: Option<u32>,
}

pub fn cmd_run(settings: &Settings, args: RunArgs) -> Result<(), CliError> {
    let source = fs::read_to_string(&args.script)
        .map_err(|e| CliError::args(format!("cannot read {}: {}", args.script.display(), e)))?;
    let name = args.name.unwrap_or_else(|| session_name(&args.script));
    let base_path = args.script.parent().map(Path::to_path_buf).unwrap_or_default();

    let status = Arc::new(ClientStatus::new());
    let status_path = args.status.or_else(|| settings.status_path.clone());
    if let Some(path) = &status_path {
        status.load_file(path).map_err(CliError::status)?;
    }
    let state = ProcessStateView::from_status(&status);

    let target = client_target(args.untargeted, args.pid, status, status_path);
    let store = Arc::new(SharedFileStore::new(&args.queue));
    let dispatcher = CommandDispatcher::new(store, target, DispatchConfig::from(settings));
    let bindings =
        HostBindings::new(dispatcher, state).with_module_paths(settings.module_paths.clone());

    let (tx, rx) = mpsc::channel();
    let registry = SessionRegistry::new(bindings, tx).with_stop_grace(settings.stop_grace());
    let session = registry.create(name);
    log::debug!("session '{}' using queue {}", session.name(), args.queue.display());

    session
        .play(&source, &base_path)
        .map_err(|e| CliError::general(e.to_string()))?;

    let mut faulted = false;
    while let Ok(event) = rx.recv() {
        match event.payload {
            SessionEventPayload::Output(line) => println!("{}", line),
            SessionEventPayload::Fault(fault) => {
                eprintln!("{}: {}", session.name(), fault);
                faulted = true;
            }
            SessionEventPayload::StatusChanged(DebuggerStatus::Stopped) => break,
            SessionEventPayload::StatusChanged(status) => {
                log::debug!("session '{}' is {}", session.name(), status);
            }
        }
    }
    registry.remove(session.id());
    session.wait();

    if faulted {
        Err(CliError::silent(EXIT_SCRIPT_FAULT))
    } else {
        Ok(())
    }
}

/// The client the dispatcher targets. With a status file, every completed
/// command re-reads it so scripts observe the client's new state.
fn client_target(
    untargeted: bool,
    pid: Option<u32>,
    status: Arc<ClientStatus>,
    status_path: Option<PathBuf>,
) -> Arc<dyn ClientTarget> {
    if untargeted {
        return Arc::new(AttachedClient::detached());
    }
    let client = AttachedClient::attached(pid.unwrap_or_else(std::process::id));
    match status_path {
        Some(path) => Arc::new(client.with_refresh(move || {
            if let Err(e) = status.load_file(&path) {
                log::warn!("status refresh failed: {}", e);
            }
        })),
        None => Arc::new(client),
    }
}

fn session_name(script: &Path) -> String {
    script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "script".to_string())
}
