//! The consumer engine: one worker thread draining registered buffers.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};

use hostlink_core::layout::{packet_header, packet_payload_mut, BufferHeader};
use hostlink_core::stack::{release_packet, take_ready};
use hostlink_core::{packet, ErrorCode, HostcallError};

use crate::doorbell::{Doorbell, RuntimeDoorbell, SIGNAL_DONE, SIGNAL_INIT};
use crate::registry::{self, Registry};

// Finite wait so the worker re-checks for the shutdown sentinel even if a
// wakeup is lost.
const WAIT_TIMEOUT_TICKS: u64 = 1 << 20;

// Fatal dispatch errors terminate without unwinding; host destructors that
// could deadlock against device producers never run on this path.
const FATAL_EXIT_CODE: i32 = 1;

/// A registered buffer, keyed by its base address.
///
/// The consumer never owns buffer memory; the caller keeps it alive from
/// `register_buffer` until the drain pass after `deregister_buffer`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct BufferPtr(*mut BufferHeader);

// SAFETY: BufferPtr is a key plus a capability to reach caller-owned shared
// memory; all dereferences happen under the protocol's atomic handoffs.
unsafe impl Send for BufferPtr {}
unsafe impl Sync for BufferPtr {}

impl BufferPtr {
    unsafe fn as_ref<'a>(self) -> &'a BufferHeader {
        unsafe { &*self.0 }
    }
}

struct BufferRecord {
    discarded: bool,
}

type BufferMap = HashMap<BufferPtr, BufferRecord>;

/// A consumer: a doorbell, a worker thread, and the buffers it drains.
///
/// One consumer suffices for any number of buffers; multiple consumers are
/// allowed but a buffer must only ever be registered with one of them.
pub struct Consumer {
    doorbell: Arc<dyn Doorbell>,
    worker: Mutex<Option<JoinHandle<()>>>,
    buffers: Arc<RwLock<BufferMap>>,
}

impl Consumer {
    /// Create an inactive consumer backed by the platform notification
    /// runtime. Returns `None` when the runtime is unavailable.
    pub fn create() -> Option<Self> {
        let doorbell = RuntimeDoorbell::create()?;
        Some(Self::with_doorbell(Arc::new(doorbell)))
    }

    /// Create an inactive consumer around an explicit doorbell.
    pub fn with_doorbell(doorbell: Arc<dyn Doorbell>) -> Self {
        Self {
            doorbell,
            worker: Mutex::new(None),
            buffers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The doorbell this consumer blocks on. Host-resident producers signal
    /// through it with [`Doorbell::add`].
    pub fn doorbell(&self) -> &Arc<dyn Doorbell> {
        &self.doorbell
    }

    /// Register an initialized buffer, stamping the doorbell handle into its
    /// header so producers know where to signal. Idempotent: re-registering
    /// resets the record to active.
    pub fn register_buffer(&self, buffer: *mut u8) -> Result<(), HostcallError> {
        if buffer.is_null() {
            return Err(HostcallError::NullPointer);
        }
        let ptr = BufferPtr(buffer as *mut BufferHeader);
        let mut buffers = self.buffers.write();
        buffers.insert(ptr, BufferRecord { discarded: false });
        // SAFETY: registration promises an initialized, caller-owned buffer.
        unsafe {
            (*ptr.0).doorbell = self.doorbell.handle();
        }
        tracing::debug!(buffer = ?ptr.0, "registered buffer");
        Ok(())
    }

    /// Mark a buffer for removal. The record is erased on the worker's next
    /// drain pass, so the memory must stay readable until then; after that
    /// the caller may free it.
    pub fn deregister_buffer(&self, buffer: *mut u8) -> Result<(), HostcallError> {
        let ptr = BufferPtr(buffer as *mut BufferHeader);
        let mut buffers = self.buffers.write();
        match buffers.get_mut(&ptr) {
            Some(record) if !record.discarded => {
                record.discarded = true;
                tracing::debug!(buffer = ?ptr.0, "discarded buffer");
                Ok(())
            }
            _ => Err(HostcallError::InvalidRequest),
        }
    }

    /// Spawn the worker thread.
    pub fn launch(&self) -> Result<(), HostcallError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(HostcallError::ConsumerActive);
        }
        let doorbell = Arc::clone(&self.doorbell);
        let buffers = Arc::clone(&self.buffers);
        let handle = std::thread::Builder::new()
            .name("hostlink-consumer".into())
            .spawn(move || drain_loop(doorbell, buffers))
            .map_err(|err| {
                tracing::warn!(%err, "failed to spawn consumer thread");
                HostcallError::LaunchFailed
            })?;
        *worker = Some(handle);
        Ok(())
    }

    /// Stop the worker thread and join it. Succeeds trivially when the
    /// consumer is not running.
    pub fn terminate(&self) -> Result<(), HostcallError> {
        let handle = match self.worker.lock().take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        self.doorbell.store(SIGNAL_DONE);
        let _ = handle.join();
        Ok(())
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

fn drain_loop(doorbell: Arc<dyn Doorbell>, buffers: Arc<RwLock<BufferMap>>) {
    tracing::debug!("consumer running");
    let mut signal_value = SIGNAL_INIT;

    loop {
        signal_value = doorbell.wait_ne(signal_value, WAIT_TIMEOUT_TICKS);
        if signal_value == SIGNAL_DONE {
            tracing::debug!("consumer shutting down");
            return;
        }

        let services = registry::global().read();
        // Upgradable read: concurrent with other readers, exclusive against
        // registration. Upgraded only when discarded records need sweeping.
        let state = buffers.upgradable_read();
        let mut swept = false;
        for (ptr, record) in state.iter() {
            if record.discarded {
                swept = true;
                continue;
            }
            // SAFETY: a non-discarded record means the caller still keeps
            // the buffer alive.
            let buffer = unsafe { ptr.as_ref() };
            let chain = take_ready(buffer);
            if chain != packet::EMPTY {
                process_chain(buffer, chain, &services);
            }
        }
        if swept {
            let mut state = RwLockUpgradableReadGuard::upgrade(state);
            state.retain(|ptr, record| {
                if record.discarded {
                    tracing::debug!(buffer = ?ptr.0, "reaped buffer");
                }
                !record.discarded
            });
        }
    }
}

/// Walk a drained chain, dispatching every active lane of every packet.
///
/// Packets arrive latest-published-first. That starves nobody: a wave holds
/// at most one packet in flight, so no producer is waiting behind another
/// entry of the same chain.
fn process_chain(buffer: &BufferHeader, head: u64, services: &Registry) {
    let mut iter = head;
    while iter != packet::EMPTY {
        // SAFETY: the drained chain is private to this thread and every
        // pointer in it addresses a packet of this buffer.
        let header = unsafe { packet_header(buffer, iter) };
        // The packet is recycled the moment READY clears; read the link now.
        let next = header.next.load(Ordering::Relaxed);

        let service = header.service;
        tracing::trace!(ptr = iter, service, "processing packet");

        let Some(handler) = services.lookup(service) else {
            tracing::error!(service, "no handler registered for hostcall service");
            services.run_error_hook(ErrorCode::ServiceUnknown as u32 as i32);
            std::process::exit(FATAL_EXIT_CODE);
        };

        let activemask = header.activemask;
        // SAFETY: as above; the producer does not touch the payload while
        // READY is set.
        let payload = unsafe { packet_payload_mut(buffer, iter) };
        for lane in 0..64 {
            if (activemask >> lane) & 1 == 0 {
                continue;
            }
            let status = handler(&mut payload.slots[lane]);
            if status != 0 {
                tracing::error!(service, lane, status, "service handler failed");
                services.run_error_hook(status);
                std::process::exit(FATAL_EXIT_CODE);
            }
        }

        release_packet(header);
        iter = next;
    }
}
