//! graphwire serializes object graphs over buffered, non-blocking streams.
//!
//! The crate is layered:
//!
//! - [`stream`] wraps a byte [`Transport`](stream::Transport) (a file
//!   descriptor, a socket, an in-memory buffer) in a [`BufferedStream`](stream::BufferedStream)
//!   with non-blocking reads, delimiter scanning and timeout helpers built on a
//!   readiness multiplexer.
//! - [`channel`] turns a stream into a [`Channel`](channel::Channel): a typed
//!   sink/source of labelled primitives and class frames. Backends decide the
//!   wire format: [`BinaryChannel`](channel::BinaryChannel) and
//!   [`TextChannel`](channel::TextChannel) read and write,
//!   [`ReadableChannel`](channel::ReadableChannel) and
//!   [`JsonChannel`](channel::JsonChannel) only write.
//! - [`schema`] maps Rust values onto channel calls. A single
//!   [`Serialize::serialize`] serves both directions, and shared pointers
//!   (`Rc`, `Arc`) keep their sharing through a per-channel identity map.
//!
//! # Quickstart
//!
//! ```
//! use {graphwire::Serialize, std::rc::Rc};
//!
//! #[derive(Serialize, Debug, Default, Clone, PartialEq)]
//! struct Node {
//!     id: u32,
//!     name: String,
//!     tags: Vec<String>,
//!     parent: Option<Rc<Node>>,
//! }
//!
//! let root = Rc::new(Node { id: 1, name: "root".into(), ..Default::default() });
//! let mut pair = (
//!     Node { id: 2, parent: Some(root.clone()), ..Default::default() },
//!     Node { id: 3, parent: Some(root), ..Default::default() },
//! );
//! let bytes = graphwire::to_bytes(&mut pair).unwrap();
//! let (a, b): (Node, Node) = graphwire::from_bytes(&bytes).unwrap();
//! assert!(Rc::ptr_eq(a.parent.as_ref().unwrap(), b.parent.as_ref().unwrap()));
//! ```
//!
//! # Streaming
//!
//! Packages can be sent one after another over a long-lived stream. Sharing is
//! preserved across all packages that go through one channel.
//!
//! ```
//! use graphwire::{
//!     channel::{Direction, TextChannel},
//!     stream::{BufferedStream, MemoryTransport},
//!     next_package, send_object, serialize_object,
//! };
//!
//! let mut stream = BufferedStream::new(MemoryTransport::new());
//! {
//!     let mut out = TextChannel::new(&mut stream, Direction::Out);
//!     send_object(&mut out, &mut 7u32).unwrap();
//!     send_object(&mut out, &mut String::from("seven")).unwrap();
//! }
//! let mut input = TextChannel::new(&mut stream, Direction::In);
//! assert_eq!(next_package(&mut input).unwrap(), "u32");
//! let mut number = 0u32;
//! serialize_object(&mut input, &mut number).unwrap();
//! assert_eq!(next_package(&mut input).unwrap(), "alloc::string::String");
//! let mut text = String::new();
//! serialize_object(&mut input, &mut text).unwrap();
//! assert_eq!((number, text.as_str()), (7, "seven"));
//! ```
pub mod channel;
mod codec;
pub use codec::*;
pub mod config;
pub use config::Config;
pub mod error;
pub use error::{Error, ErrorKind, Result};
pub mod schema;
pub use schema::{
    next_package, recv_object, send_object, serialize, serialize_class, serialize_object, Category,
    Serialize,
};
pub mod stream;

#[cfg(test)]
mod proptest_config;

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    pub use paste::paste;
}

#[cfg(feature = "derive")]
pub use graphwire_derive::*;
