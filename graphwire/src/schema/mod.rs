//! Serialization rules.
//!
//! One code path serves both directions: [`Serialize::serialize`] takes the
//! value by `&mut` and either writes it (the channel is [`Direction::Out`]) or
//! overwrites it with what the channel reads back ([`Direction::In`]). A type
//! must therefore issue exactly the same channel calls, in the same order,
//! whichever way the data flows.
//!
//! The rules, by [`Category`]:
//!
//! - primitives call the matching channel operation once;
//! - shared pointers write a handle and, on first sight, their referent (see
//!   [`pointer`]);
//! - pairs frame `first` and `second`;
//! - containers frame an element `count` followed by each `member`;
//! - strings are one counted byte run;
//! - composites frame their fields in declaration order.
//!
//! Framed rules go through [`serialize_class`], which tracks the nesting depth
//! and closes the package once the outermost value is done.
//!
//! # Example
//!
//! ```
//! use {
//!     graphwire::{composite, from_bytes, to_bytes},
//!     std::rc::Rc,
//! };
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Parent {
//!     name: String,
//! }
//!
//! composite! { Parent { name } }
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Child {
//!     id: u32,
//!     mother: Rc<Parent>,
//!     father: Rc<Parent>,
//! }
//!
//! composite! { Child { id, mother, father } }
//!
//! let parent = Rc::new(Parent { name: "p".into() });
//! let mut child = Child { id: 1, mother: parent.clone(), father: parent };
//! let bytes = to_bytes(&mut child).unwrap();
//! let back: Child = from_bytes(&bytes).unwrap();
//! assert_eq!(back, child);
//! assert!(Rc::ptr_eq(&back.mother, &back.father));
//! ```
use {
    crate::{
        channel::{Channel, Direction, Primitive},
        error::{count_mismatch, unexpected_token, Result},
    },
    tracing::debug,
};

pub mod containers;
mod impls;
pub mod pointer;
mod version;
pub use version::{serialize_class_name, serialize_class_version};

/// Label of the top-level value in a package.
pub const OBJECT_LABEL: &str = "object";
/// Label of a container's element count.
pub const COUNT_LABEL: &str = "count";
/// Label of each container element.
pub const MEMBER_LABEL: &str = "member";
pub const FIRST_LABEL: &str = "first";
pub const SECOND_LABEL: &str = "second";

/// Which serialization rule a type follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Primitive,
    Pointer,
    Pair,
    Container,
    /// Counted byte run.
    Text,
    /// Serializes as the value it wraps.
    Transparent,
    Composite,
}

impl Category {
    /// Whether values of this category are wrapped in class framing.
    pub const fn is_framed(self) -> bool {
        matches!(
            self,
            Category::Pointer | Category::Pair | Category::Container | Category::Composite
        )
    }
}

/// Types that can be serialized through a [`Channel`] in either direction.
///
/// Implement it with [`composite!`](crate::composite) or
/// `#[derive(Serialize)]` for records, or by hand:
///
/// ```
/// use graphwire::{channel::Channel, schema::serialize_class, Result, Serialize};
///
/// #[derive(Default)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Serialize for Point {
///     fn type_name() -> &'static str {
///         "Point"
///     }
///
///     fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
///         serialize_class(channel, Self::type_name(), label, |channel| {
///             self.x.serialize(channel, "x")?;
///             self.y.serialize(channel, "y")
///         })
///     }
/// }
/// ```
pub trait Serialize {
    const CATEGORY: Category = Category::Composite;

    /// Name announced when the type opens a package or starts a class.
    fn type_name() -> &'static str {
        core::any::type_name::<Self>()
    }

    /// Write `self` to `channel` or read it back, depending on the channel's
    /// direction.
    fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()>;
}

/// Serialize `value` under `label`.
#[inline]
pub fn serialize<C, T>(channel: &mut C, value: &mut T, label: &str) -> Result<()>
where
    C: Channel + ?Sized,
    T: Serialize + ?Sized,
{
    value.serialize(channel, label)
}

/// Wrap `body` in class framing and depth tracking.
///
/// Requires an open package. Raises [`Error::RecursionLimit`](crate::Error::RecursionLimit)
/// when nesting exceeds the configured depth. When the outermost class
/// finishes the channel is closed, so the next top-level value needs a fresh
/// [`Channel::open`]. On error the package is abandoned.
pub fn serialize_class<C, F>(channel: &mut C, type_name: &str, label: &str, body: F) -> Result<()>
where
    C: Channel + ?Sized,
    F: FnOnce(&mut C) -> Result<()>,
{
    channel.state_mut().enter(label)?;
    let result = channel
        .start_of_class(type_name, label)
        .and_then(|()| body(channel))
        .and_then(|()| channel.end_of_class(type_name, label));
    if let Err(e) = result {
        channel.state_mut().abort();
        return Err(e);
    }
    if channel.state_mut().leave() {
        channel.close()?;
    }
    Ok(())
}

/// Transfer a run of primitives with one channel call.
pub fn serialize_primitives<C, P>(channel: &mut C, items: &mut [P], label: &str) -> Result<()>
where
    C: Channel + ?Sized,
    P: Primitive,
{
    channel.state().ensure_open(label)?;
    let transferred = P::dispatch(channel, items, label)?;
    if transferred != items.len() {
        return Err(count_mismatch(label, items.len(), transferred));
    }
    Ok(())
}

/// Transfer a counted byte run.
pub fn serialize_bytes<C>(channel: &mut C, bytes: &mut Vec<u8>, label: &str) -> Result<()>
where
    C: Channel + ?Sized,
{
    channel.state().ensure_open(label)?;
    let expected = bytes.len();
    let transferred = channel.serialize_bytes(bytes, label)?;
    let expected = match channel.direction() {
        Direction::Out => expected,
        Direction::In => bytes.len(),
    };
    if transferred != expected {
        return Err(count_mismatch(label, expected, transferred));
    }
    Ok(())
}

/// Serialize `value` as the body of the open package, then make sure the
/// package is closed.
pub fn serialize_object<C, T>(channel: &mut C, value: &mut T) -> Result<()>
where
    C: Channel + ?Sized,
    T: Serialize,
{
    if let Err(e) = value.serialize(channel, OBJECT_LABEL) {
        channel.state_mut().abort();
        return Err(e);
    }
    if channel.state().is_open() {
        channel.close()?;
    }
    Ok(())
}

/// Open a package named after `T` and write `value` into it.
pub fn send_object<C, T>(channel: &mut C, value: &mut T) -> Result<()>
where
    C: Channel + ?Sized,
    T: Serialize,
{
    channel.open(Some(T::type_name()))?;
    serialize_object(channel, value)
}

/// Read the next package into `value`, checking that it announces `T`.
pub fn recv_object<C, T>(channel: &mut C, value: &mut T) -> Result<()>
where
    C: Channel + ?Sized,
    T: Serialize,
{
    let name = channel.open(None)?;
    if name != T::type_name() {
        channel.state_mut().abort();
        return Err(unexpected_token(
            T::type_name(),
            name.as_bytes(),
            channel.state().offset(),
        ));
    }
    serialize_object(channel, value)
}

/// Open the next package and return the type it announces.
///
/// The caller picks the matching type and finishes with
/// [`serialize_object`].
pub fn next_package<C>(channel: &mut C) -> Result<String>
where
    C: Channel + ?Sized,
{
    let name = channel.open(None)?;
    debug!(package = %name, "next package");
    Ok(name)
}

/// Implement [`Serialize`] for a struct with named fields.
///
/// Fields are serialized in the listed order, each under its own name. The
/// struct's identifier is its type name on the wire.
///
/// ```
/// # use graphwire::{composite, from_text, to_text};
/// #[derive(Debug, Default, PartialEq)]
/// struct Reading {
///     sensor: String,
///     values: Vec<f32>,
/// }
///
/// composite! {
///     Reading {
///         sensor,
///         values,
///     }
/// }
///
/// let mut reading = Reading { sensor: "t1".into(), values: vec![0.5, 1.0] };
/// let text = to_text(&mut reading).unwrap();
/// assert!(text.starts_with("package: Reading\t"));
/// assert_eq!(from_text::<Reading>(&text).unwrap(), reading);
/// ```
#[macro_export]
macro_rules! composite {
    ($type:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::Serialize for $type {
            #[inline]
            fn type_name() -> &'static str {
                stringify!($type)
            }

            fn serialize<C: $crate::channel::Channel + ?Sized>(
                &mut self,
                channel: &mut C,
                label: &str,
            ) -> $crate::Result<()> {
                $crate::schema::serialize_class(
                    channel,
                    <Self as $crate::Serialize>::type_name(),
                    label,
                    |channel| {
                        $($crate::Serialize::serialize(&mut self.$field, channel, stringify!($field))?;)+
                        Ok(())
                    },
                )
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            channel::{BinaryChannel, TextChannel},
            config::Config,
            error::Error,
            proptest_config::proptest_cfg,
            stream::{BufferedStream, MemoryTransport},
        },
        proptest::prelude::*,
    };

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Inner {
        flag: bool,
        letter: char,
    }

    composite! { Inner { flag, letter } }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Outer {
        id: u64,
        label: String,
        inner: Inner,
        scores: Vec<i16>,
        ratio: f64,
    }

    composite! {
        Outer {
            id,
            label,
            inner,
            scores,
            ratio,
        }
    }

    fn outer() -> impl Strategy<Value = Outer> {
        (
            any::<u64>(),
            ".{0,12}",
            any::<bool>(),
            any::<char>(),
            proptest::collection::vec(any::<i16>(), 0..8),
            any::<f64>().prop_filter("nan", |f| !f.is_nan()),
        )
            .prop_map(|(id, label, flag, letter, scores, ratio)| Outer {
                id,
                label,
                inner: Inner { flag, letter },
                scores,
                ratio,
            })
    }

    #[test]
    fn serializing_requires_open() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        let mut channel = BinaryChannel::new(&mut stream, Direction::Out);
        let err = Inner::default().serialize(&mut channel, "object").unwrap_err();
        assert!(matches!(err, Error::NotOpen { .. }));
        let err = 5u8.serialize(&mut channel, "byte").unwrap_err();
        assert!(matches!(err, Error::NotOpen { .. }));
    }

    #[test]
    fn outermost_class_closes_the_package() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        let mut channel = BinaryChannel::new(&mut stream, Direction::Out);
        channel.open(Some("Inner")).unwrap();
        Inner::default().serialize(&mut channel, "object").unwrap();
        assert!(!channel.state().is_open());
        assert!(matches!(
            Inner::default().serialize(&mut channel, "object"),
            Err(Error::AlreadyClosed { .. })
        ));
        channel.open(Some("Inner")).unwrap();
        Inner::default().serialize(&mut channel, "object").unwrap();
    }

    #[test]
    fn recv_checks_the_announced_type() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        send_object(
            &mut TextChannel::new(&mut stream, Direction::Out),
            &mut Inner::default(),
        )
        .unwrap();
        let mut channel = TextChannel::new(&mut stream, Direction::In);
        let err = recv_object(&mut channel, &mut Outer::default()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { .. }));
        assert!(!channel.state().is_open());
    }

    #[test]
    fn next_package_announces_the_type() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        {
            let mut out = BinaryChannel::new(&mut stream, Direction::Out);
            send_object(&mut out, &mut Inner { flag: true, letter: 'q' }).unwrap();
            send_object(&mut out, &mut 9u32).unwrap();
        }
        let mut input = BinaryChannel::new(&mut stream, Direction::In);
        assert_eq!(next_package(&mut input).unwrap(), "Inner");
        let mut inner = Inner::default();
        serialize_object(&mut input, &mut inner).unwrap();
        assert_eq!(inner, Inner { flag: true, letter: 'q' });
        assert_eq!(next_package(&mut input).unwrap(), "u32");
        let mut value = 0u32;
        serialize_object(&mut input, &mut value).unwrap();
        assert_eq!(value, 9);
    }

    #[test]
    fn depth_limit_applies_to_nesting() {
        let config = Config::default().with_max_depth(2);
        let mut stream = BufferedStream::new(MemoryTransport::new());
        let mut channel = BinaryChannel::with_config(&mut stream, Direction::Out, &config);
        channel.open(Some("nested")).unwrap();
        let mut nested = vec![vec![vec![1u8]]];
        let err = nested.serialize(&mut channel, "object").unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { limit: 2, .. }));
        assert!(!channel.state().is_open());
    }

    #[test]
    fn categories() {
        assert_eq!(<u8 as Serialize>::CATEGORY, Category::Primitive);
        assert_eq!(<String as Serialize>::CATEGORY, Category::Text);
        assert_eq!(<Vec<u8> as Serialize>::CATEGORY, Category::Container);
        assert_eq!(<(u8, u8) as Serialize>::CATEGORY, Category::Pair);
        assert_eq!(<Outer as Serialize>::CATEGORY, Category::Composite);
        assert!(Category::Composite.is_framed());
        assert!(!Category::Text.is_framed());
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn composites_read_back_from_binary(mut value in outer()) {
            let mut stream = BufferedStream::new(MemoryTransport::new());
            send_object(&mut BinaryChannel::new(&mut stream, Direction::Out), &mut value).unwrap();
            let mut back = Outer::default();
            recv_object(&mut BinaryChannel::new(&mut stream, Direction::In), &mut back).unwrap();
            prop_assert_eq!(back, value);
        }

        #[test]
        fn composites_read_back_from_text(mut value in outer()) {
            let mut stream = BufferedStream::new(MemoryTransport::new());
            send_object(&mut TextChannel::new(&mut stream, Direction::Out), &mut value).unwrap();
            let mut back = Outer::default();
            recv_object(&mut TextChannel::new(&mut stream, Direction::In), &mut back).unwrap();
            prop_assert_eq!(back, value);
        }
    }
}
