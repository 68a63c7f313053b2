//! The shared-pointer rule.
//!
//! A pointer is framed as a class holding a 64-bit `handle` and, the first
//! time its referent is seen on the channel, the referent itself under
//! `target`. Handles are assigned per channel from 1 upwards; `0` is null.
//!
//! Writing a pointer whose referent is already on the channel writes only the
//! handle. Reading a handle that is already known makes the target share the
//! reconstructed referent, so two pointers to one value before serializing
//! are two pointers to one value afterwards. The identity map outlives the
//! package, so sharing also holds across packages sent through one channel.
//!
//! Writing a pointer that is reached again while its own referent is being
//! written raises [`Error::CycleDetected`](crate::Error::CycleDetected).
//! Reference cycles must be broken (e.g. with `Weak`) before serializing.
use {
    super::{serialize_class, Category},
    crate::{
        channel::{Channel, Direction, Outbound, NULL_HANDLE},
        error::{cycle_detected, non_null_target, Result},
        Serialize,
    },
    core::any::type_name,
    std::{rc::Rc, sync::Arc},
    tracing::debug,
};

pub const HANDLE_LABEL: &str = "handle";
pub const TARGET_LABEL: &str = "target";

/// A reference-counted pointer the pointer rule can share.
pub trait SharedPointer: Clone + 'static {
    type Target: Serialize + Default + Clone;

    fn share(target: Self::Target) -> Self;

    /// Identity of the referent.
    fn address(&self) -> usize;

    fn target(&self) -> &Self::Target;
}

impl<T: Serialize + Default + Clone + 'static> SharedPointer for Rc<T> {
    type Target = T;

    #[inline]
    fn share(target: T) -> Self {
        Rc::new(target)
    }

    #[inline]
    fn address(&self) -> usize {
        Rc::as_ptr(self) as *const () as usize
    }

    #[inline]
    fn target(&self) -> &T {
        self
    }
}

impl<T: Serialize + Default + Clone + 'static> SharedPointer for Arc<T> {
    type Target = T;

    #[inline]
    fn share(target: T) -> Self {
        Arc::new(target)
    }

    #[inline]
    fn address(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }

    #[inline]
    fn target(&self) -> &T {
        self
    }
}

/// Serialize the pointer in `slot` under `label`.
///
/// `None` is the null pointer. When `nullable` is false a null handle on the
/// wire is a protocol violation, since the slot cannot represent it. A
/// nullable slot must also be `None` before reading a null handle.
///
/// Writing clones the referent to serialize it, because the rules need `&mut`
/// access and the referent is shared.
pub fn serialize_pointer<C, P>(
    channel: &mut C,
    slot: &mut Option<P>,
    label: &str,
    nullable: bool,
) -> Result<()>
where
    C: Channel + ?Sized,
    P: SharedPointer,
{
    serialize_class(channel, type_name::<P>(), label, |channel| {
        match channel.direction() {
            Direction::Out => write_pointer(channel, slot.as_ref()),
            Direction::In => read_pointer(channel, slot, label, nullable),
        }
    })
}

fn write_pointer<C, P>(channel: &mut C, pointer: Option<&P>) -> Result<()>
where
    C: Channel + ?Sized,
    P: SharedPointer,
{
    let Some(pointer) = pointer else {
        let mut null = NULL_HANDLE;
        return null.serialize(channel, HANDLE_LABEL);
    };
    let address = pointer.address();
    let entry = channel
        .state_mut()
        .identities_mut()
        .outbound(address, pointer);
    let mut handle = entry.handle();
    match entry {
        Outbound::InProgress(_) => return Err(cycle_detected(handle, channel.state().offset())),
        Outbound::Complete(_) => {
            debug!(handle, "shared pointer already written");
            return handle.serialize(channel, HANDLE_LABEL);
        }
        Outbound::Fresh(_) => handle.serialize(channel, HANDLE_LABEL)?,
    }
    let mut target = pointer.target().clone();
    match target.serialize(channel, TARGET_LABEL) {
        Ok(()) => {
            channel.state_mut().identities_mut().complete(address);
            Ok(())
        }
        Err(e) => {
            channel.state_mut().identities_mut().forget(address);
            Err(e)
        }
    }
}

fn read_pointer<C, P>(channel: &mut C, slot: &mut Option<P>, label: &str, nullable: bool) -> Result<()>
where
    C: Channel + ?Sized,
    P: SharedPointer,
{
    let mut handle = NULL_HANDLE;
    handle.serialize(channel, HANDLE_LABEL)?;
    if handle == NULL_HANDLE {
        if !nullable || slot.is_some() {
            return Err(non_null_target(label, channel.state().offset()));
        }
        return Ok(());
    }
    if let Some(shared) = channel.state().identities().inbound::<P>(handle)? {
        debug!(handle, "shared pointer restored");
        *slot = Some(shared);
        return Ok(());
    }
    let mut target = P::Target::default();
    target.serialize(channel, TARGET_LABEL)?;
    let pointer = P::share(target);
    channel
        .state_mut()
        .identities_mut()
        .register_inbound(handle, pointer.clone());
    *slot = Some(pointer);
    Ok(())
}

macro_rules! impl_shared_pointer {
    ($($pointer:ident),+) => {
        $(
            impl<T: Serialize + Default + Clone + 'static> Serialize for $pointer<T> {
                const CATEGORY: Category = Category::Pointer;

                fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
                    let mut slot = Some(self.clone());
                    serialize_pointer(channel, &mut slot, label, false)?;
                    if let Some(pointer) = slot {
                        *self = pointer;
                    }
                    Ok(())
                }
            }
        )+
    };
}

impl_shared_pointer!(Rc, Arc);

/// Nullable shared pointer.
impl<P: SharedPointer> Serialize for Option<P> {
    const CATEGORY: Category = Category::Pointer;

    fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
        serialize_pointer(channel, self, label, true)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            channel::{BinaryChannel, TextChannel},
            codec::{from_bytes, to_bytes, to_json},
            composite,
            error::Error,
            schema::{recv_object, send_object},
            stream::{BufferedStream, MemoryTransport},
        },
        std::cell::RefCell,
    };

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Leaf {
        value: i32,
    }

    composite! { Leaf { value } }

    #[derive(Debug, Default, Clone)]
    struct Fork {
        left: Option<Rc<Leaf>>,
        right: Option<Rc<Leaf>>,
    }

    composite! { Fork { left, right } }

    #[derive(Debug, Default, Clone)]
    struct Looped {
        next: Option<Rc<LoopCell>>,
    }

    #[derive(Debug, Default, Clone)]
    struct LoopCell {
        inner: Rc<RefCell<Looped>>,
    }

    impl Serialize for LoopCell {
        fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
            let mut inner = self.inner.borrow().clone();
            serialize_class(channel, "LoopCell", label, |channel| inner.next.serialize(channel, "next"))
        }
    }

    #[test]
    fn shared_targets_stay_shared() {
        let leaf = Rc::new(Leaf { value: 5 });
        let mut fork = Fork {
            left: Some(leaf.clone()),
            right: Some(leaf),
        };
        let bytes = to_bytes(&mut fork).unwrap();
        let back: Fork = from_bytes(&bytes).unwrap();
        let (left, right) = (back.left.unwrap(), back.right.unwrap());
        assert!(Rc::ptr_eq(&left, &right));
        assert_eq!(left.value, 5);
    }

    #[test]
    fn null_pointers_stay_null() {
        let mut fork = Fork {
            left: None,
            right: Some(Rc::new(Leaf { value: 1 })),
        };
        let bytes = to_bytes(&mut fork).unwrap();
        let back: Fork = from_bytes(&bytes).unwrap();
        assert!(back.left.is_none());
        assert_eq!(back.right.unwrap().value, 1);
    }

    #[test]
    fn prepopulated_target_rejects_null() {
        let mut fork = Fork::default();
        let bytes = to_bytes(&mut fork).unwrap();
        let mut stream = BufferedStream::new(MemoryTransport::from(bytes));
        let mut channel = BinaryChannel::new(&mut stream, Direction::In);
        let mut target = Fork {
            left: Some(Rc::new(Leaf::default())),
            right: None,
        };
        let err = recv_object(&mut channel, &mut target).unwrap_err();
        assert!(matches!(err, Error::NonNullTarget { ref label, .. } if label == "left"));
    }

    #[test]
    fn second_sighting_writes_only_the_handle() {
        let leaf = Rc::new(Leaf { value: 9 });
        let mut fork = Fork {
            left: Some(leaf.clone()),
            right: Some(leaf),
        };
        let json = to_json(&mut fork).unwrap();
        assert!(
            json.contains(
                "\"left\": {\"handle\": 1, \"target\": {\"value\": 9}}, \"right\": {\"handle\": 1}"
            ),
            "{json}"
        );
    }

    #[test]
    fn sharing_spans_packages() {
        let leaf = Arc::new(String::from("shared"));
        let mut first = leaf.clone();
        let mut second = leaf;
        let mut stream = BufferedStream::new(MemoryTransport::new());
        {
            let mut out = TextChannel::new(&mut stream, Direction::Out);
            send_object(&mut out, &mut first).unwrap();
            send_object(&mut out, &mut second).unwrap();
        }
        let text = String::from_utf8(stream.get_ref().unread().to_vec()).unwrap();
        assert_eq!(text.matches("shared").count(), 1, "{text}");
        let mut input = TextChannel::new(&mut stream, Direction::In);
        let mut a: Arc<String> = Arc::default();
        let mut b: Arc<String> = Arc::default();
        recv_object(&mut input, &mut a).unwrap();
        recv_object(&mut input, &mut b).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, "shared");
    }

    #[test]
    fn reentering_a_pointer_is_a_cycle() {
        let cell = Rc::new(LoopCell::default());
        cell.inner.borrow_mut().next = Some(cell.clone());
        let mut root = Looped {
            next: Some(cell.clone()),
        };
        let mut stream = BufferedStream::new(MemoryTransport::new());
        let mut out = BinaryChannel::new(&mut stream, Direction::Out);
        out.open(Some("Looped")).unwrap();
        let err = root.next.serialize(&mut out, "object").unwrap_err();
        assert!(matches!(err, Error::CycleDetected { handle: 1, .. }));
        assert!(!out.state().is_open());
        // Break the cycle so the test does not leak.
        cell.inner.borrow_mut().next = None;
    }

    #[test]
    fn mismatched_handle_types_are_rejected() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        {
            let shared = Rc::new(Leaf { value: 3 });
            let mut pair = (Some(shared.clone()), Some(shared));
            send_object(&mut BinaryChannel::new(&mut stream, Direction::Out), &mut pair).unwrap();
        }
        let mut input = BinaryChannel::new(&mut stream, Direction::In);
        input.open(None).unwrap();
        let mut wrong: (Option<Rc<Leaf>>, Option<Rc<String>>) = (None, None);
        let err = wrong.serialize(&mut input, "object").unwrap_err();
        assert!(matches!(err, Error::HandleTypeMismatch { handle: 1, .. }));
    }
}
