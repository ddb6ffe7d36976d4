use std::sync::atomic::{AtomicU32, Ordering};

/// The client a dispatcher submits to.
pub trait ClientTarget: Send + Sync {
    /// Whether a client process is attached. Submissions to a detached
    /// target are silently dropped.
    fn is_attached(&self) -> bool;

    /// Ask for a fresh status snapshot after a command round trip.
    fn refresh_status(&self);
}

const DETACHED: u32 = 0;

type RefreshHook = Box<dyn Fn() + Send + Sync>;

/// Target identified by the client's process id.
pub struct AttachedClient {
    pid: AtomicU32,
    on_refresh: Option<RefreshHook>,
}

impl AttachedClient {
    /// A target with no client attached yet.
    pub fn detached() -> Self {
        Self { pid: AtomicU32::new(DETACHED), on_refresh: None }
    }

    /// A target already bound to `pid`.
    pub fn attached(pid: u32) -> Self {
        let client = Self::detached();
        client.attach(pid);
        client
    }

    /// Run `hook` on every status refresh request.
    pub fn with_refresh(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Box::new(hook));
        self
    }

    /// Bind to `pid`. Pid 0 is treated as detach.
    pub fn attach(&self, pid: u32) {
        self.pid.store(pid, Ordering::Release);
    }

    pub fn detach(&self) {
        self.pid.store(DETACHED, Ordering::Release);
    }

    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::Acquire) {
            DETACHED => None,
            pid => Some(pid),
        }
    }
}

impl std::fmt::Debug for AttachedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedClient")
            .field("pid", &self.pid())
            .field("on_refresh", &self.on_refresh.is_some())
            .finish()
    }
}

impl ClientTarget for AttachedClient {
    fn is_attached(&self) -> bool {
        self.pid().is_some()
    }

    fn refresh_status(&self) {
        if let Some(hook) = &self.on_refresh {
            hook();
        }
    }
}
