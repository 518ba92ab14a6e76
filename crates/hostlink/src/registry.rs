//! Process-wide service registry.
//!
//! Services are registered once for the life of the process and never
//! removed. The registry is guarded by a reader/writer lock: consumer drain
//! passes hold the read side, registration takes the write side, so a
//! registration racing an active consumer simply serializes against the
//! current drain pass.

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::RwLock;

use hostlink_core::{HostcallError, SLOTS_PER_LANE};

/// A service handler, invoked once per active lane with that lane's payload
/// slots. Zero is the only success value; anything else is fatal.
pub type ServiceFn = Box<dyn Fn(&mut [u64; SLOTS_PER_LANE]) -> i32 + Send + Sync>;

/// Hook invoked once before the process terminates on a fatal dispatch
/// error. Runs on the consumer thread.
pub type ErrorHookFn = Box<dyn Fn(i32) + Send + Sync>;

/// The reserved ID whose handler serves as the fallback for packets naming
/// an unregistered service.
pub const DEFAULT_SERVICE: u32 = 0;

#[derive(Default)]
pub(crate) struct Registry {
    handlers: HashMap<u32, ServiceFn>,
    error_hook: Option<ErrorHookFn>,
}

impl Registry {
    /// The handler for `service`, falling back to the default entry.
    pub(crate) fn lookup(&self, service: u32) -> Option<&ServiceFn> {
        self.handlers
            .get(&service)
            .or_else(|| self.handlers.get(&DEFAULT_SERVICE))
    }

    /// Run the error hook, if one is installed.
    pub(crate) fn run_error_hook(&self, error: i32) {
        if let Some(hook) = &self.error_hook {
            hook(error);
        }
    }

    fn bind(&mut self, service: u32, handler: ServiceFn) -> Result<(), HostcallError> {
        use std::collections::hash_map::Entry;
        match self.handlers.entry(service) {
            Entry::Occupied(_) => Err(HostcallError::InvalidRequest),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    fn bind_error_hook(&mut self, hook: ErrorHookFn) -> Result<(), HostcallError> {
        if self.error_hook.is_some() {
            return Err(HostcallError::InvalidRequest);
        }
        self.error_hook = Some(hook);
        Ok(())
    }
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::default()));

pub(crate) fn global() -> &'static RwLock<Registry> {
    &REGISTRY
}

/// Register a handler for `service`.
///
/// The handler runs on the consumer thread, once per active lane, reading
/// its arguments from the lane's slots and overwriting them with its
/// response. ID 0 registers the default handler used for unknown services.
///
/// Fails with `InvalidRequest` if `service` is already registered; entries
/// live for the rest of the process.
pub fn register_service<F>(service: u32, handler: F) -> Result<(), HostcallError>
where
    F: Fn(&mut [u64; SLOTS_PER_LANE]) -> i32 + Send + Sync + 'static,
{
    global().write().bind(service, Box::new(handler))
}

/// Install the hook run before the process terminates on a fatal dispatch
/// error (unknown service, or a handler returning non-zero).
///
/// Only one hook may ever be installed; a second call fails with
/// `InvalidRequest`.
pub fn on_error<F>(hook: F) -> Result<(), HostcallError>
where
    F: Fn(i32) + Send + Sync + 'static,
{
    global().write().bind_error_hook(Box::new(hook))
}
