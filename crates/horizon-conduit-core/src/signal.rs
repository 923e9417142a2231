//! Observer registry for event delivery.
//!
//! Transport objects announce what happened (a packet arrived, a connection
//! dropped) through [`Signal`] fields. A signal holds zero or more connected
//! slots; every emission invokes every slot with a shared reference to the
//! payload.
//!
//! Slots are invoked directly in the emitting thread. Transport objects emit
//! from their I/O worker tasks, so slots must be `Send + Sync` and should not
//! block for long — a slow slot stalls the loop that emitted it.
//!
//! # Example
//!
//! ```
//! use horizon_conduit_core::Signal;
//!
//! let packet_received = Signal::<Vec<u8>>::new();
//!
//! let id = packet_received.connect(|data| {
//!     println!("got {} bytes", data.len());
//! });
//!
//! packet_received.emit(vec![1, 2, 3]);
//! packet_received.disconnect(id);
//! ```

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

new_key_type! {
    /// Identifier for a single signal/slot connection.
    ///
    /// Returned by [`Signal::connect`]; pass it to [`Signal::disconnect`] to
    /// remove that slot. The id stays valid until the slot is disconnected or
    /// the signal is dropped.
    pub struct SlotId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal with zero or more connected slots.
///
/// Emitting the signal invokes all connected slots with a reference to the
/// payload. Use `()` for signals that carry no data.
///
/// `Signal` is `Send + Sync`; it can be shared freely between the caller's
/// threads and the transport worker tasks that emit it.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<SlotId, Slot<Args>>>,
    /// Whether emission is temporarily suppressed.
    blocked: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connected slots.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot to this signal.
    ///
    /// Returns a [`SlotId`] that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> SlotId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Connect a slot and return a guard that disconnects it when dropped.
    pub fn connect_guarded<F>(&self, slot: F) -> SlotGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        SlotGuard {
            signal: self,
            id: self.connect(slot),
        }
    }

    /// Disconnect a slot by id.
    ///
    /// Returns `true` if the slot was found and removed.
    pub fn disconnect(&self, id: SlotId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Disconnect all slots.
    pub fn disconnect_all(&self) {
        self.slots.lock().clear();
    }

    /// Number of currently connected slots.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Suppress or re-enable emission.
    ///
    /// While blocked, [`emit`](Self::emit) does nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emission is currently suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Invoke every connected slot with `args`.
    ///
    /// Slots run in the emitting thread, outside the registry lock, in an
    /// unspecified order. Slots connected or disconnected during an emission
    /// take effect from the next emission.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            return;
        }

        // Snapshot the slots so emission happens outside the lock; a slot is
        // free to connect or disconnect on this same signal.
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(
            target: "horizon_conduit_core::signal",
            slot_count = slots.len(),
            "emitting signal"
        );

        for slot in slots {
            slot(&args);
        }
    }
}

impl<Args: 'static> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.lock().len())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// RAII connection to a [`Signal`]; disconnects its slot on drop.
pub struct SlotGuard<'a, Args: 'static> {
    signal: &'a Signal<Args>,
    id: SlotId,
}

impl<Args: 'static> SlotGuard<'_, Args> {
    /// The id of the guarded connection.
    pub fn id(&self) -> SlotId {
        self.id
    }
}

impl<Args: 'static> Drop for SlotGuard<'_, Args> {
    fn drop(&mut self) {
        self.signal.disconnect(self.id);
    }
}
