use {
    super::{short_type_name, Channel, ChannelState, Direction, MetaType, Primitive, PrimitiveKind},
    crate::{
        config::Config,
        error::{missing_type_name, unsupported_direction, Result},
        stream::{BufferedStream, Transport},
    },
    core::fmt::Write as _,
};

const INDENT: &str = "    ";

/// Indented dump for people, not parsers.
///
/// ```text
/// package Node
/// object (Node) {
///     id: 7
///     name: "abc"
///     tags (Vec<String>) [
///         count: 2
///         member: "x"
///         member: "y"
///     ]
/// }
/// ```
///
/// Serializing out only.
#[derive(Debug)]
pub struct ReadableChannel<'a, T> {
    stream: &'a mut BufferedStream<T>,
    state: ChannelState,
    level: usize,
    closers: Vec<&'static str>,
}

impl<'a, T: Transport> ReadableChannel<'a, T> {
    pub fn new(stream: &'a mut BufferedStream<T>, direction: Direction) -> Result<Self> {
        Self::with_config(stream, direction, &Config::default())
    }

    pub fn with_config(
        stream: &'a mut BufferedStream<T>,
        direction: Direction,
        config: &Config,
    ) -> Result<Self> {
        if direction != Direction::Out {
            return Err(unsupported_direction("ReadableChannel", Direction::Out));
        }
        Ok(Self {
            stream,
            state: ChannelState::with_config(direction, config),
            level: 0,
            closers: Vec::new(),
        })
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut out = INDENT.repeat(self.level);
        out.push_str(line);
        out.push('\n');
        self.stream.write_str(&out)?;
        self.state.advance(out.len());
        Ok(())
    }

    fn serialize_primitive<P: Primitive>(&mut self, items: &mut [P], label: &str) -> Result<usize> {
        let mut line = format!("{label}: ");
        if P::KIND == PrimitiveKind::Char && items.len() > 1 {
            let text: String = items.iter().map(|c| c.to_string()).collect();
            let _ = write!(line, "{text:?}");
        } else {
            if items.len() != 1 {
                line.push('[');
            }
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    line.push_str(", ");
                }
                if P::KIND == PrimitiveKind::Char {
                    let _ = write!(line, "'{}'", item.to_string().escape_debug());
                } else {
                    let _ = write!(line, "{item}");
                }
            }
            if items.len() != 1 {
                line.push(']');
            }
        }
        self.write_line(&line)?;
        Ok(items.len())
    }
}

impl<T: Transport> Channel for ReadableChannel<'_, T> {
    #[inline]
    fn state(&self) -> &ChannelState {
        &self.state
    }

    #[inline]
    fn state_mut(&mut self) -> &mut ChannelState {
        &mut self.state
    }

    fn open_package(&mut self, type_name: Option<&str>) -> Result<String> {
        let name = type_name.ok_or_else(missing_type_name)?;
        self.level = 0;
        self.closers.clear();
        self.write_line(&format!("package {name}"))?;
        Ok(name.to_owned())
    }

    fn close_package(&mut self) -> Result<()> {
        self.stream.flush()
    }

    fn start_of_class(&mut self, type_name: &str, label: &str) -> Result<()> {
        let (open, close) = match self.meta_type(type_name) {
            meta if meta.is_listlike() => ("[", "]"),
            MetaType::Pair => ("(", ")"),
            _ => ("{", "}"),
        };
        self.write_line(&format!("{label} ({}) {open}", short_type_name(type_name)))?;
        self.closers.push(close);
        self.level += 1;
        Ok(())
    }

    fn end_of_class(&mut self, _type_name: &str, _label: &str) -> Result<()> {
        self.level = self.level.saturating_sub(1);
        let close = self.closers.pop().unwrap_or("}");
        self.write_line(close)
    }

    crate::forward_primitives!(serialize_primitive);

    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, label: &str) -> Result<usize> {
        let line = match core::str::from_utf8(bytes) {
            Ok(text) => format!("{label}: {text:?}"),
            Err(_) => format!("{label}: b\"{}\"", bytes.escape_ascii()),
        };
        self.write_line(&line)?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Error, stream::MemoryTransport},
    };

    #[test]
    fn input_is_unsupported() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        assert!(matches!(
            ReadableChannel::new(&mut stream, Direction::In),
            Err(Error::UnsupportedDirection { supported: Direction::Out, .. })
        ));
    }

    #[test]
    fn nested_classes_indent() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        let mut channel = ReadableChannel::new(&mut stream, Direction::Out).unwrap();
        channel.open(Some("Node")).unwrap();
        channel.start_of_class("app::Node", "object").unwrap();
        channel.serialize_u32(&mut [7], "id").unwrap();
        channel.serialize_bytes(&mut b"abc".to_vec(), "name").unwrap();
        channel.start_of_class("alloc::vec::Vec<u8>", "raw").unwrap();
        channel.serialize_u8(&mut [1, 2], "member").unwrap();
        channel.end_of_class("alloc::vec::Vec<u8>", "raw").unwrap();
        channel.serialize_char(&mut ['h', 'i'], "word").unwrap();
        channel.serialize_bytes(&mut vec![0xff, b'a'], "blob").unwrap();
        channel.end_of_class("app::Node", "object").unwrap();
        channel.close().unwrap();
        let text = String::from_utf8(stream.into_inner().into_bytes()).unwrap();
        assert_eq!(
            text,
            "package Node\n\
             object (Node) {\n\
             \x20   id: 7\n\
             \x20   name: \"abc\"\n\
             \x20   raw (Vec<u8>) [\n\
             \x20       member: [1, 2]\n\
             \x20   ]\n\
             \x20   word: \"hi\"\n\
             \x20   blob: b\"\\xffa\"\n\
             }\n"
        );
    }
}
