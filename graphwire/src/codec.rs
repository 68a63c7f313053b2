//! One-shot helpers over an in-memory stream.
use crate::{
    channel::{BinaryChannel, Direction, JsonChannel, ReadableChannel, TextChannel},
    error::{invalid_utf8_encoding, Result},
    schema::{recv_object, send_object},
    stream::{BufferedStream, MemoryTransport},
    Serialize,
};

/// Serialize `value` as one binary package.
///
/// The value is taken by `&mut` because the same rules read and write.
///
/// # Examples
///
/// ```
/// let mut value = vec![1u16, 2, 3];
/// let bytes = graphwire::to_bytes(&mut value).unwrap();
/// assert_eq!(graphwire::from_bytes::<Vec<u16>>(&bytes).unwrap(), value);
/// ```
pub fn to_bytes<T: Serialize>(value: &mut T) -> Result<Vec<u8>> {
    let mut stream = BufferedStream::new(MemoryTransport::new());
    send_object(&mut BinaryChannel::new(&mut stream, Direction::Out), value)?;
    Ok(stream.into_inner().into_bytes())
}

/// Read one binary package announcing `T`.
pub fn from_bytes<T: Serialize + Default>(bytes: &[u8]) -> Result<T> {
    let mut stream = BufferedStream::new(MemoryTransport::from(bytes));
    let mut value = T::default();
    recv_object(&mut BinaryChannel::new(&mut stream, Direction::In), &mut value)?;
    Ok(value)
}

/// Serialize `value` as one tab-separated text package.
pub fn to_text<T: Serialize>(value: &mut T) -> Result<String> {
    let mut stream = BufferedStream::new(MemoryTransport::new());
    send_object(&mut TextChannel::new(&mut stream, Direction::Out), value)?;
    into_string(stream)
}

/// Read one text package announcing `T`.
pub fn from_text<T: Serialize + Default>(text: &str) -> Result<T> {
    let mut stream = BufferedStream::new(MemoryTransport::from(text));
    let mut value = T::default();
    recv_object(&mut TextChannel::new(&mut stream, Direction::In), &mut value)?;
    Ok(value)
}

/// Render `value` as indented, human-readable text.
pub fn to_readable<T: Serialize>(value: &mut T) -> Result<String> {
    let mut stream = BufferedStream::new(MemoryTransport::new());
    send_object(&mut ReadableChannel::new(&mut stream, Direction::Out)?, value)?;
    into_string(stream)
}

/// Render `value` as a single-line JSON object.
pub fn to_json<T: Serialize>(value: &mut T) -> Result<String> {
    let mut stream = BufferedStream::new(MemoryTransport::new());
    send_object(&mut JsonChannel::new(&mut stream, Direction::Out)?, value)?;
    into_string(stream)
}

fn into_string(stream: BufferedStream<MemoryTransport>) -> Result<String> {
    String::from_utf8(stream.into_inner().into_bytes()).map_err(|e| invalid_utf8_encoding(e.utf8_error()))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::Error, std::collections::BTreeMap};

    #[test]
    fn text_reads_back() {
        let mut map = BTreeMap::from([(1u8, String::from("one")), (2, String::from("two words"))]);
        let text = to_text(&mut map).unwrap();
        assert_eq!(from_text::<BTreeMap<u8, String>>(&text).unwrap(), map);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let bytes = to_bytes(&mut 5u32).unwrap();
        assert!(matches!(
            from_bytes::<u64>(&bytes),
            Err(Error::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn truncated_input_fails() {
        let bytes = to_bytes(&mut String::from("truncated")).unwrap();
        assert!(from_bytes::<String>(&bytes[..bytes.len() - 2]).is_err());
    }

    #[test]
    fn readable_rendering() {
        let mut pair = (1u8, 'x');
        let text = to_readable(&mut pair).unwrap();
        assert!(text.starts_with("package "), "{text}");
        assert!(text.contains("first: 1"), "{text}");
    }
}
