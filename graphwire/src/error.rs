//! Error types and helpers.
use {
    crate::channel::{Direction, PrimitiveKind},
    core::{str::Utf8Error, time::Duration},
    std::io,
    thiserror::Error,
};

/// Coarse classification of an [`Error`].
///
/// Callers that want to recover (retry with a fresh deadline, reconnect a
/// transport, give up on a malformed package) match on this rather than on
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No data or capacity yet. The stream layer reports this as a 0-length
    /// result; it only surfaces as an error when a raw transport error of
    /// that kind is converted.
    WouldBlock,
    /// The byte stream or the call sequence does not follow the protocol.
    ProtocolViolation,
    /// The transport or the readiness wait failed.
    TransportFault,
    /// A blocking-style helper ran out of time.
    Timeout,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{operation} would block")]
    WouldBlock { operation: &'static str },
    #[error("Channel already opened (offset {offset})")]
    AlreadyOpen { offset: u64 },
    #[error("Channel already closed (offset {offset})")]
    AlreadyClosed { offset: u64 },
    #[error("Channel is not open while serializing {label:?}; call open() first (offset {offset})")]
    NotOpen { label: String, offset: u64 },
    #[error("Pointer target {label:?} is not null but the serialized handle is (offset {offset})")]
    NonNullTarget { label: String, offset: u64 },
    #[error("Expected {expected:?}, found {found:?} (offset {offset})")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: u64,
    },
    #[error("No delimiter within entire buffer size of {capacity} bytes")]
    DelimiterNotFound { capacity: usize },
    #[error("Delimiters must not be empty")]
    EmptyDelimiter,
    #[error("Type name required when serializing out")]
    MissingTypeName,
    #[error("{format} only serializes {supported}")]
    UnsupportedDirection {
        format: &'static str,
        supported: Direction,
    },
    #[error("Stream ended during {operation} (offset {offset})")]
    UnexpectedEof { operation: &'static str, offset: u64 },
    #[error("Pointer with handle {handle} is reached again while its target is being serialized (offset {offset})")]
    CycleDetected { handle: u64, offset: u64 },
    #[error("Nesting exceeded the limit of {limit} composites (offset {offset})")]
    RecursionLimit { limit: usize, offset: u64 },
    #[error("Handle {handle} is registered with a type other than {expected}")]
    HandleTypeMismatch { handle: u64, expected: &'static str },
    #[error("Expected {expected} elements for {label:?}, transferred {found}")]
    CountMismatch {
        label: String,
        expected: usize,
        found: usize,
    },
    #[error("Invalid bool encoding: {0}")]
    InvalidBoolEncoding(u8),
    #[error("Invalid char encoding: {0:#x}")]
    InvalidCharEncoding(u32),
    #[error("Invalid tag encoding: {0}")]
    InvalidTagEncoding(i64),
    #[error(transparent)]
    InvalidUtf8Encoding(#[from] Utf8Error),
    #[error("Could not cast integer type to pointer sized type")]
    PointerSizedDecodeError,
    #[error("Could not parse {text:?} as {kind}")]
    InvalidLiteral { text: String, kind: PrimitiveKind },
    #[error(
        "Encoded sequence length exceeded preallocation limit of {limit} bytes (needed {needed} \
         bytes)"
    )]
    PreallocationSizeLimit { needed: usize, limit: usize },
    #[error("Buffer capacity {capacity} cannot hold {unread} unread bytes")]
    BufferTooSmall { capacity: usize, unread: usize },
    #[error("Invalid option {name:?}: {reason}")]
    InvalidOption { name: String, reason: String },
    #[error("Class tag {0:?} has no version suffix")]
    MissingVersion(String),
    #[error("Transport fault during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("Readiness wait failed: {0}")]
    Multiplex(#[source] nix::errno::Errno),
    #[error("Invalid handle {fd}")]
    InvalidHandle { fd: i32 },
    #[error("Stream {resource:?} faulted earlier")]
    Faulted { resource: String },
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WouldBlock { .. } => ErrorKind::WouldBlock,
            Error::Transport { .. }
            | Error::Multiplex(_)
            | Error::InvalidHandle { .. }
            | Error::Faulted { .. } => ErrorKind::TransportFault,
            Error::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::ProtocolViolation,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cold]
pub const fn already_open(offset: u64) -> Error {
    Error::AlreadyOpen { offset }
}

#[cold]
pub const fn already_closed(offset: u64) -> Error {
    Error::AlreadyClosed { offset }
}

#[cold]
pub fn not_open(label: &str, offset: u64) -> Error {
    Error::NotOpen {
        label: label.to_owned(),
        offset,
    }
}

#[cold]
pub fn non_null_target(label: &str, offset: u64) -> Error {
    Error::NonNullTarget {
        label: label.to_owned(),
        offset,
    }
}

#[cold]
pub fn unexpected_token(expected: &str, found: &[u8], offset: u64) -> Error {
    Error::UnexpectedToken {
        expected: expected.to_owned(),
        found: String::from_utf8_lossy(found).into_owned(),
        offset,
    }
}

#[cold]
pub const fn delimiter_not_found(capacity: usize) -> Error {
    Error::DelimiterNotFound { capacity }
}

#[cold]
pub const fn empty_delimiter() -> Error {
    Error::EmptyDelimiter
}

#[cold]
pub const fn missing_type_name() -> Error {
    Error::MissingTypeName
}

#[cold]
pub const fn unsupported_direction(format: &'static str, supported: Direction) -> Error {
    Error::UnsupportedDirection { format, supported }
}

#[cold]
pub const fn unexpected_eof(operation: &'static str, offset: u64) -> Error {
    Error::UnexpectedEof { operation, offset }
}

#[cold]
pub const fn cycle_detected(handle: u64, offset: u64) -> Error {
    Error::CycleDetected { handle, offset }
}

#[cold]
pub const fn recursion_limit(limit: usize, offset: u64) -> Error {
    Error::RecursionLimit { limit, offset }
}

#[cold]
pub const fn handle_type_mismatch(handle: u64, expected: &'static str) -> Error {
    Error::HandleTypeMismatch { handle, expected }
}

#[cold]
pub fn count_mismatch(label: &str, expected: usize, found: usize) -> Error {
    Error::CountMismatch {
        label: label.to_owned(),
        expected,
        found,
    }
}

#[cold]
pub const fn invalid_bool_encoding(byte: u8) -> Error {
    Error::InvalidBoolEncoding(byte)
}

#[cold]
pub const fn invalid_char_encoding(value: u32) -> Error {
    Error::InvalidCharEncoding(value)
}

#[cold]
pub const fn invalid_tag_encoding(tag: i64) -> Error {
    Error::InvalidTagEncoding(tag)
}

#[cold]
pub const fn invalid_utf8_encoding(error: Utf8Error) -> Error {
    Error::InvalidUtf8Encoding(error)
}

#[cold]
pub const fn pointer_sized_decode_error() -> Error {
    Error::PointerSizedDecodeError
}

#[cold]
pub fn invalid_literal(text: &str, kind: PrimitiveKind) -> Error {
    Error::InvalidLiteral {
        text: text.to_owned(),
        kind,
    }
}

#[cold]
pub const fn preallocation_size_limit(needed: usize, limit: usize) -> Error {
    Error::PreallocationSizeLimit { needed, limit }
}

#[cold]
pub const fn buffer_too_small(capacity: usize, unread: usize) -> Error {
    Error::BufferTooSmall { capacity, unread }
}

#[cold]
pub fn invalid_option(name: &str, reason: impl Into<String>) -> Error {
    Error::InvalidOption {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

#[cold]
pub fn missing_version(tag: &str) -> Error {
    Error::MissingVersion(tag.to_owned())
}

/// Wrap a transport error. Would-block errors keep their own kind.
#[cold]
pub fn transport_fault(operation: &'static str, source: io::Error) -> Error {
    if source.kind() == io::ErrorKind::WouldBlock {
        return Error::WouldBlock { operation };
    }
    Error::Transport { operation, source }
}

#[cold]
pub const fn multiplex_fault(errno: nix::errno::Errno) -> Error {
    Error::Multiplex(errno)
}

#[cold]
pub const fn invalid_handle(fd: i32) -> Error {
    Error::InvalidHandle { fd }
}

#[cold]
pub fn faulted(resource: &str) -> Error {
    Error::Faulted {
        resource: resource.to_owned(),
    }
}

#[cold]
pub const fn timeout(operation: &'static str, timeout: Duration) -> Error {
    Error::Timeout { operation, timeout }
}
