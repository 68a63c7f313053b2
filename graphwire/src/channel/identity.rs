use {
    crate::error::{handle_type_mismatch, Result},
    core::any::{type_name, Any},
    std::collections::HashMap,
    tracing::debug,
};

/// The handle written for a null pointer.
pub(crate) const NULL_HANDLE: u64 = 0;

/// State of an outbound pointer in the identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outbound {
    /// First sighting: the referent must be serialized.
    Fresh(u64),
    /// The referent is being serialized further up the stack.
    InProgress(u64),
    /// Already on the wire: only the handle is written.
    Complete(u64),
}

impl Outbound {
    pub(crate) fn handle(self) -> u64 {
        match self {
            Outbound::Fresh(handle) | Outbound::InProgress(handle) | Outbound::Complete(handle) => {
                handle
            }
        }
    }
}

#[derive(Debug)]
struct OutboundEntry {
    handle: u64,
    complete: bool,
    // Holds a clone of the pointer so its address stays unique for the
    // lifetime of the map.
    _keepalive: Box<dyn Any>,
}

/// Per-channel table of shared pointers.
///
/// Serializing out maps a pointee address to a 64-bit handle assigned from a
/// counter starting at 1 (`0` is the null handle). Serializing in maps a
/// handle to the reconstructed pointer. Entries live as long as the channel,
/// so sharing is preserved across every package sent through it.
#[derive(Debug)]
pub struct IdentityMap {
    next: u64,
    outbound: HashMap<usize, OutboundEntry>,
    inbound: HashMap<u64, Box<dyn Any>>,
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self {
            next: NULL_HANDLE + 1,
            outbound: HashMap::new(),
            inbound: HashMap::new(),
        }
    }
}

impl IdentityMap {
    /// Number of pointers registered in either direction.
    pub fn len(&self) -> usize {
        self.outbound.len() + self.inbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `address`, registering it with a new handle if unseen.
    pub(crate) fn outbound<P: 'static>(&mut self, address: usize, pointer: &P) -> Outbound
    where
        P: Clone,
    {
        if let Some(entry) = self.outbound.get(&address) {
            return if entry.complete {
                Outbound::Complete(entry.handle)
            } else {
                Outbound::InProgress(entry.handle)
            };
        }
        let handle = self.next;
        self.next += 1;
        self.outbound.insert(
            address,
            OutboundEntry {
                handle,
                complete: false,
                _keepalive: Box::new(pointer.clone()),
            },
        );
        debug!(handle, pointer = type_name::<P>(), "registered outbound pointer");
        Outbound::Fresh(handle)
    }

    /// Mark the referent at `address` as fully written.
    pub(crate) fn complete(&mut self, address: usize) {
        if let Some(entry) = self.outbound.get_mut(&address) {
            entry.complete = true;
        }
    }

    /// Forget an outbound registration whose referent failed to serialize.
    pub(crate) fn forget(&mut self, address: usize) {
        self.outbound.remove(&address);
    }

    /// The pointer reconstructed under `handle`, if any.
    pub(crate) fn inbound<P: Clone + 'static>(&self, handle: u64) -> Result<Option<P>> {
        match self.inbound.get(&handle) {
            Some(pointer) => pointer
                .downcast_ref::<P>()
                .cloned()
                .map(Some)
                .ok_or_else(|| handle_type_mismatch(handle, type_name::<P>())),
            None => Ok(None),
        }
    }

    pub(crate) fn register_inbound<P: 'static>(&mut self, handle: u64, pointer: P) {
        debug!(handle, pointer = type_name::<P>(), "registered inbound pointer");
        self.inbound.insert(handle, Box::new(pointer));
    }
}
