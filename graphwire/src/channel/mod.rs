//! Format channels.
//!
//! A [`Channel`] knows one wire format and one [`Direction`]. It frames
//! packages ([`Channel::open`] / [`Channel::close`]) and objects
//! ([`Channel::start_of_class`] / [`Channel::end_of_class`]), and moves arrays of
//! primitives under a label. The [`schema`](crate::schema) rules drive a channel; a
//! channel never recurses into values on its own.
//!
//! Every channel embeds a [`ChannelState`] holding the open flag, the open
//! depth, the logical offset and the identity map for shared pointers.
use {
    crate::{
        config::{Config, DEFAULT_PREALLOCATION_LIMIT},
        error::{already_closed, already_open, not_open, recursion_limit, Result},
    },
    core::fmt,
    tracing::debug,
};

mod binary;
pub use binary::BinaryChannel;
mod identity;
pub use identity::IdentityMap;
pub(crate) use identity::{Outbound, NULL_HANDLE};
mod json;
pub use json::JsonChannel;
mod meta;
pub use meta::{meta_type, short_type_name, MetaType};
mod primitive;
pub use primitive::{Primitive, PrimitiveKind};
mod readable;
pub use readable::ReadableChannel;
mod text;
pub use text::TextChannel;

/// Whether a channel writes values to the wire or reads them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Serializing to the wire.
    Out,
    /// Serializing from the wire.
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => f.write_str("OUT"),
            Direction::In => f.write_str("IN"),
        }
    }
}

macro_rules! primitive_ops {
    ($($ty:ident)+) => {
        $crate::__private::paste! {
            $(
                #[doc = concat!("Transfer `items.len()` values of `", stringify!($ty), "` under `label`.")]
                ///
                /// Writes the values when serializing out, overwrites them when
                /// serializing in. Returns the number of elements transferred.
                fn [<serialize_ $ty>](&mut self, items: &mut [$ty], label: &str) -> Result<usize>;
            )+
        }
    };
}

/// A wire format bound to one direction.
///
/// Implementors provide the framing hooks and one operation per primitive
/// kind; the open/close state machine is provided. Most backends implement the
/// primitive operations with a single generic method over [`Primitive`] and
/// [`forward_primitives!`](crate::forward_primitives).
///
/// # Framing
///
/// A package starts with [`open`](Channel::open), which writes (OUT) or reads
/// (IN) the type name of the top-level object, and ends with
/// [`close`](Channel::close). The serialization rules close the package
/// automatically once the outermost composite finishes, so a caller only
/// opens. Opening an open channel raises [`Error::AlreadyOpen`](crate::Error::AlreadyOpen);
/// closing a closed one raises [`Error::AlreadyClosed`](crate::Error::AlreadyClosed).
pub trait Channel {
    fn state(&self) -> &ChannelState;

    fn state_mut(&mut self) -> &mut ChannelState;

    #[inline]
    fn direction(&self) -> Direction {
        self.state().direction()
    }

    /// Write the package header (OUT) or read it back (IN).
    ///
    /// OUT requires `type_name`; IN ignores it and returns the name found on
    /// the wire.
    fn open_package(&mut self, type_name: Option<&str>) -> Result<String>;

    /// Write (OUT) or consume (IN) the package trailer.
    fn close_package(&mut self) -> Result<()> {
        Ok(())
    }

    /// Begin a composite object.
    fn start_of_class(&mut self, _type_name: &str, _label: &str) -> Result<()> {
        Ok(())
    }

    /// End a composite object.
    fn end_of_class(&mut self, _type_name: &str, _label: &str) -> Result<()> {
        Ok(())
    }

    /// Classify a composite type for markup selection.
    fn meta_type(&self, type_name: &str) -> MetaType {
        meta_type(type_name)
    }

    primitive_ops!(bool u8 i8 u16 i16 u32 i32 u64 i64 f32 f64 char);

    /// Transfer a counted byte run under `label`.
    ///
    /// The run may contain any byte, including NUL. Text backends render it as
    /// a single escaped string. Returns the number of bytes transferred.
    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, label: &str) -> Result<usize>;

    /// Start a package. Returns the type name written or read.
    fn open(&mut self, type_name: Option<&str>) -> Result<String> {
        self.state_mut().mark_open()?;
        match self.open_package(type_name) {
            Ok(name) => {
                debug!(direction = %self.direction(), package = %name, "opened package");
                Ok(name)
            }
            Err(e) => {
                self.state_mut().abort();
                Err(e)
            }
        }
    }

    /// Finish the current package.
    fn close(&mut self) -> Result<()> {
        self.state_mut().mark_closed()?;
        self.close_package()?;
        debug!(
            direction = %self.direction(),
            offset = self.state().offset(),
            "closed package"
        );
        Ok(())
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    #[inline]
    fn state(&self) -> &ChannelState {
        (**self).state()
    }

    #[inline]
    fn state_mut(&mut self) -> &mut ChannelState {
        (**self).state_mut()
    }

    fn open_package(&mut self, type_name: Option<&str>) -> Result<String> {
        (**self).open_package(type_name)
    }

    fn close_package(&mut self) -> Result<()> {
        (**self).close_package()
    }

    fn start_of_class(&mut self, type_name: &str, label: &str) -> Result<()> {
        (**self).start_of_class(type_name, label)
    }

    fn end_of_class(&mut self, type_name: &str, label: &str) -> Result<()> {
        (**self).end_of_class(type_name, label)
    }

    fn meta_type(&self, type_name: &str) -> MetaType {
        (**self).meta_type(type_name)
    }

    crate::forward_primitives!(@to_inner);

    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, label: &str) -> Result<usize> {
        (**self).serialize_bytes(bytes, label)
    }

    fn open(&mut self, type_name: Option<&str>) -> Result<String> {
        (**self).open(type_name)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Implement every per-primitive [`Channel`] operation by forwarding to a
/// generic method of the backend with the signature
/// `fn name<P: Primitive>(&mut self, items: &mut [P], label: &str) -> Result<usize>`.
///
/// ```ignore
/// impl<T: Transport> Channel for MyChannel<T> {
///     forward_primitives!(serialize_primitive);
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! forward_primitives {
    (@to_inner) => {
        $crate::forward_primitives!(@each to_inner; bool u8 i8 u16 i16 u32 i32 u64 i64 f32 f64 char);
    };
    ($generic:ident) => {
        $crate::forward_primitives!(@each $generic; bool u8 i8 u16 i16 u32 i32 u64 i64 f32 f64 char);
    };
    (@each to_inner; $($ty:ident)+) => {
        $crate::__private::paste! {
            $(
                #[inline]
                fn [<serialize_ $ty>](&mut self, items: &mut [$ty], label: &str) -> $crate::Result<usize> {
                    (**self).[<serialize_ $ty>](items, label)
                }
            )+
        }
    };
    (@each $generic:ident; $($ty:ident)+) => {
        $crate::__private::paste! {
            $(
                #[inline]
                fn [<serialize_ $ty>](&mut self, items: &mut [$ty], label: &str) -> $crate::Result<usize> {
                    self.$generic(items, label)
                }
            )+
        }
    };
}

/// Per-channel session state.
#[derive(Debug)]
pub struct ChannelState {
    direction: Direction,
    open: bool,
    /// A package was opened and has since been closed or aborted.
    closed: bool,
    depth: usize,
    max_depth: usize,
    preallocation_limit: usize,
    offset: u64,
    identities: IdentityMap,
}

impl ChannelState {
    pub fn new(direction: Direction, max_depth: usize) -> Self {
        Self {
            direction,
            open: false,
            closed: false,
            depth: 0,
            max_depth,
            preallocation_limit: DEFAULT_PREALLOCATION_LIMIT,
            offset: 0,
            identities: IdentityMap::default(),
        }
    }

    pub fn with_config(direction: Direction, config: &Config) -> Self {
        Self {
            preallocation_limit: config.preallocation_limit,
            ..Self::new(direction, config.max_depth)
        }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of composites currently being serialized.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Largest number of bytes a reader allocates up front for one counted
    /// run.
    #[inline]
    pub fn preallocation_limit(&self) -> usize {
        self.preallocation_limit
    }

    /// Bytes moved through the channel so far. Used in diagnostics.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn advance(&mut self, amt: usize) {
        self.offset += amt as u64;
    }

    pub fn identities(&self) -> &IdentityMap {
        &self.identities
    }

    pub fn identities_mut(&mut self) -> &mut IdentityMap {
        &mut self.identities
    }

    pub(crate) fn mark_open(&mut self) -> Result<()> {
        if self.open {
            return Err(already_open(self.offset));
        }
        self.open = true;
        self.closed = false;
        self.depth = 0;
        Ok(())
    }

    pub(crate) fn mark_closed(&mut self) -> Result<()> {
        if !self.open {
            return Err(already_closed(self.offset));
        }
        self.open = false;
        self.closed = true;
        self.depth = 0;
        Ok(())
    }

    /// Fails with `AlreadyClosed` after a package ended, `NotOpen` if none
    /// was ever opened.
    pub(crate) fn ensure_open(&self, label: &str) -> Result<()> {
        match (self.open, self.closed) {
            (true, _) => Ok(()),
            (false, true) => Err(already_closed(self.offset)),
            (false, false) => Err(not_open(label, self.offset)),
        }
    }

    /// Begin one composite. Requires an open package.
    pub(crate) fn enter(&mut self, label: &str) -> Result<()> {
        self.ensure_open(label)?;
        if self.depth >= self.max_depth {
            return Err(recursion_limit(self.max_depth, self.offset));
        }
        self.depth += 1;
        Ok(())
    }

    /// End one composite. Returns `true` when the outermost one finished.
    pub(crate) fn leave(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }

    /// Drop the current package after an error so the channel can be
    /// reopened.
    pub(crate) fn abort(&mut self) {
        self.closed |= self.open;
        self.open = false;
        self.depth = 0;
    }
}
