//! Doorbell: the device-to-host wakeup signal.
//!
//! The consumer blocks on a doorbell whose value producers bump after
//! publishing packets. The primitive itself lives outside this library; the
//! [`Doorbell`] trait abstracts it so the consumer engine works against
//! either the platform notification runtime (resolved at first use via
//! `dlsym`, so there is no link-time dependency) or an in-process fallback
//! used by tests and embedders without the runtime.

use std::ffi::{c_void, CStr};
use std::ptr;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Initial doorbell value.
pub const SIGNAL_INIT: u64 = u64::MAX;

/// Sentinel stored by `terminate` to shut the consumer down.
pub const SIGNAL_DONE: u64 = u64::MAX - 1;

/// A doorbell the consumer can block on.
///
/// Implementations are destroyed on drop; the consumer guarantees no waiter
/// is blocked at that point by joining its worker first.
pub trait Doorbell: Send + Sync {
    /// Opaque handle stamped into a buffer header so producers can find the
    /// signal from the device side.
    fn handle(&self) -> u64;

    /// Block until the value differs from `old` or the timeout elapses,
    /// returning the observed value with acquire semantics. The result may
    /// equal `old` after a timeout; callers re-wait.
    fn wait_ne(&self, old: u64, timeout_ticks: u64) -> u64;

    /// Release-store a value. Used for the shutdown sentinel.
    fn store(&self, value: u64);

    /// Release-increment the value, waking the consumer. This is the
    /// producer-side signalling operation.
    fn add(&self, delta: u64);
}

// ---------------------------------------------------------------------------
// Runtime-resolved doorbell
// ---------------------------------------------------------------------------

type SignalCreateFn = unsafe extern "C" fn(i64, u32, *const c_void, *mut u64) -> i32;
type SignalDestroyFn = unsafe extern "C" fn(u64) -> i32;
type SignalWaitAcquireFn = unsafe extern "C" fn(u64, u32, i64, u64, u32) -> i64;
type SignalStoreReleaseFn = unsafe extern "C" fn(u64, i64);
type SignalAddReleaseFn = unsafe extern "C" fn(u64, i64);

const CONDITION_NOT_EQUAL: u32 = 1;
const WAIT_STATE_BLOCKED: u32 = 0;

#[derive(Clone, Copy)]
struct SignalVtable {
    create: SignalCreateFn,
    destroy: SignalDestroyFn,
    wait_acquire: SignalWaitAcquireFn,
    store_release: SignalStoreReleaseFn,
    add_release: SignalAddReleaseFn,
}

unsafe fn resolve(name: &CStr) -> Option<*mut c_void> {
    let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) };
    if sym.is_null() {
        None
    } else {
        Some(sym)
    }
}

fn load_vtable() -> Option<SignalVtable> {
    // SAFETY: the symbols, when present, belong to the notification runtime
    // and match the declared signatures.
    unsafe {
        Some(SignalVtable {
            create: std::mem::transmute::<*mut c_void, SignalCreateFn>(resolve(
                c"signal_create",
            )?),
            destroy: std::mem::transmute::<*mut c_void, SignalDestroyFn>(resolve(
                c"signal_destroy",
            )?),
            wait_acquire: std::mem::transmute::<*mut c_void, SignalWaitAcquireFn>(resolve(
                c"signal_wait_acquire",
            )?),
            store_release: std::mem::transmute::<*mut c_void, SignalStoreReleaseFn>(resolve(
                c"signal_store_release",
            )?),
            add_release: std::mem::transmute::<*mut c_void, SignalAddReleaseFn>(resolve(
                c"signal_add_release",
            )?),
        })
    }
}

static SIGNAL_RUNTIME: LazyLock<Option<SignalVtable>> = LazyLock::new(load_vtable);

/// Doorbell backed by the platform notification runtime.
///
/// Symbols are resolved from already-loaded libraries on first use;
/// [`RuntimeDoorbell::create`] reports `None` when the runtime is absent so
/// callers can surface an internal error instead of failing to link.
pub struct RuntimeDoorbell {
    vtable: SignalVtable,
    handle: u64,
}

impl RuntimeDoorbell {
    /// Create a signal with value [`SIGNAL_INIT`], or `None` when the
    /// runtime is unavailable or signal creation fails.
    pub fn create() -> Option<Self> {
        let vtable = (*SIGNAL_RUNTIME)?;
        let mut handle = 0u64;
        // SAFETY: vtable functions come from the resolved runtime.
        let status =
            unsafe { (vtable.create)(SIGNAL_INIT as i64, 0, ptr::null(), &mut handle) };
        if status != 0 || handle == 0 {
            tracing::warn!(status, "signal_create failed");
            return None;
        }
        Some(Self { vtable, handle })
    }
}

impl Doorbell for RuntimeDoorbell {
    fn handle(&self) -> u64 {
        self.handle
    }

    fn wait_ne(&self, old: u64, timeout_ticks: u64) -> u64 {
        loop {
            // SAFETY: handle is live until drop.
            let observed = unsafe {
                (self.vtable.wait_acquire)(
                    self.handle,
                    CONDITION_NOT_EQUAL,
                    old as i64,
                    timeout_ticks,
                    WAIT_STATE_BLOCKED,
                )
            } as u64;
            if observed != old {
                return observed;
            }
        }
    }

    fn store(&self, value: u64) {
        // SAFETY: handle is live until drop.
        unsafe { (self.vtable.store_release)(self.handle, value as i64) };
    }

    fn add(&self, delta: u64) {
        // SAFETY: handle is live until drop.
        unsafe { (self.vtable.add_release)(self.handle, delta as i64) };
    }
}

impl Drop for RuntimeDoorbell {
    fn drop(&mut self) {
        // SAFETY: the consumer joins its worker before dropping the
        // doorbell, so no waiter is blocked on the handle here.
        unsafe { (self.vtable.destroy)(self.handle) };
    }
}

// ---------------------------------------------------------------------------
// In-process doorbell
// ---------------------------------------------------------------------------

/// In-process doorbell: a mutex-guarded value with a condvar wakeup.
///
/// Used by tests and by embedders running producers on host threads. One
/// wait tick is interpreted as a microsecond.
pub struct LocalDoorbell {
    value: Mutex<u64>,
    wakeup: Condvar,
}

impl LocalDoorbell {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(SIGNAL_INIT),
            wakeup: Condvar::new(),
        }
    }
}

impl Default for LocalDoorbell {
    fn default() -> Self {
        Self::new()
    }
}

impl Doorbell for LocalDoorbell {
    fn handle(&self) -> u64 {
        &self.value as *const Mutex<u64> as u64
    }

    fn wait_ne(&self, old: u64, timeout_ticks: u64) -> u64 {
        // Cap the wait so arbitrary tick counts cannot overflow the
        // deadline arithmetic.
        let timeout = Duration::from_micros(timeout_ticks.min(60_000_000));
        let deadline = Instant::now() + timeout;
        let mut value = self.value.lock();
        while *value == old {
            if self.wakeup.wait_until(&mut value, deadline).timed_out() {
                break;
            }
        }
        *value
    }

    fn store(&self, value: u64) {
        *self.value.lock() = value;
        self.wakeup.notify_all();
    }

    fn add(&self, delta: u64) {
        let mut value = self.value.lock();
        *value = value.wrapping_add(delta);
        self.wakeup.notify_all();
    }
}
