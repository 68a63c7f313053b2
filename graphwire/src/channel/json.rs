use {
    super::{Channel, ChannelState, Direction, MetaType, Primitive, PrimitiveKind},
    crate::{
        config::Config,
        error::{missing_type_name, unsupported_direction, Result},
        stream::{BufferedStream, Transport},
    },
    core::fmt::Write as _,
};

/// Label the container rules use for element counts.
const COUNT_LABEL: &str = "count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Array,
    Transparent,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    empty: bool,
    label: String,
}

/// JSON rendering of a package.
///
/// The package becomes an object with a `"package"` member naming the type,
/// followed by the top-level value under its label. Composite types render as
/// objects keyed by member label; sequential and associative types render as
/// arrays and their element counts are dropped. Non-finite floats become
/// `null`. Serializing out only.
#[derive(Debug)]
pub struct JsonChannel<'a, T> {
    stream: &'a mut BufferedStream<T>,
    state: ChannelState,
    frames: Vec<Frame>,
}

impl<'a, T: Transport> JsonChannel<'a, T> {
    pub fn new(stream: &'a mut BufferedStream<T>, direction: Direction) -> Result<Self> {
        Self::with_config(stream, direction, &Config::default())
    }

    pub fn with_config(
        stream: &'a mut BufferedStream<T>,
        direction: Direction,
        config: &Config,
    ) -> Result<Self> {
        if direction != Direction::Out {
            return Err(unsupported_direction("JsonChannel", Direction::Out));
        }
        Ok(Self {
            stream,
            state: ChannelState::with_config(direction, config),
            frames: Vec::new(),
        })
    }

    fn emit(&mut self, text: &str) -> Result<()> {
        self.stream.write_str(text)?;
        self.state.advance(text.len());
        Ok(())
    }

    /// The innermost frame that is not transparent, and the label a value
    /// written now is keyed under.
    fn effective_frame(&self, label: &str) -> Option<(usize, String)> {
        let mut label = label;
        for (index, frame) in self.frames.iter().enumerate().rev() {
            if frame.kind != FrameKind::Transparent {
                return Some((index, label.to_owned()));
            }
            label = &frame.label;
        }
        None
    }

    fn in_array(&self) -> bool {
        self.effective_frame("")
            .is_some_and(|(index, _)| self.frames[index].kind == FrameKind::Array)
    }

    /// Write the separator and, inside objects, the key for the next value.
    fn begin_value(&mut self, label: &str) -> Result<()> {
        let Some((index, label)) = self.effective_frame(label) else {
            return Ok(());
        };
        let frame = &mut self.frames[index];
        let mut prefix = String::new();
        if !frame.empty {
            prefix.push_str(", ");
        }
        frame.empty = false;
        if frame.kind == FrameKind::Object {
            prefix.push_str(&json_string(&label));
            prefix.push_str(": ");
        }
        self.emit(&prefix)
    }

    fn serialize_primitive<P: Primitive>(&mut self, items: &mut [P], label: &str) -> Result<usize> {
        if label == COUNT_LABEL && self.in_array() {
            return Ok(items.len());
        }
        let value = if P::KIND == PrimitiveKind::Char && items.len() != 1 {
            let text: String = items.iter().map(|c| c.to_string()).collect();
            json_string(&text)
        } else if items.len() == 1 {
            json_scalar(&items[0])
        } else {
            let values: Vec<String> = items.iter().map(json_scalar).collect();
            format!("[{}]", values.join(", "))
        };
        self.begin_value(label)?;
        self.emit(&value)?;
        Ok(items.len())
    }
}

impl<T: Transport> Channel for JsonChannel<'_, T> {
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
        self.frames.clear();
        self.emit(&format!("{{\"package\": {}", json_string(name)))?;
        self.frames.push(Frame {
            kind: FrameKind::Object,
            empty: false,
            label: String::new(),
        });
        Ok(name.to_owned())
    }

    fn close_package(&mut self) -> Result<()> {
        self.frames.clear();
        self.emit("}\n")?;
        self.stream.flush()
    }

    fn start_of_class(&mut self, type_name: &str, label: &str) -> Result<()> {
        let kind = match self.meta_type(type_name) {
            MetaType::Transparent => FrameKind::Transparent,
            meta if meta.is_listlike() => FrameKind::Array,
            _ => FrameKind::Object,
        };
        match kind {
            FrameKind::Transparent => {}
            FrameKind::Array => {
                self.begin_value(label)?;
                self.emit("[")?;
            }
            FrameKind::Object => {
                self.begin_value(label)?;
                self.emit("{")?;
            }
        }
        self.frames.push(Frame {
            kind,
            empty: true,
            label: label.to_owned(),
        });
        Ok(())
    }

    fn end_of_class(&mut self, _type_name: &str, _label: &str) -> Result<()> {
        match self.frames.pop().map(|frame| frame.kind) {
            Some(FrameKind::Array) => self.emit("]"),
            Some(FrameKind::Object) => self.emit("}"),
            Some(FrameKind::Transparent) | None => Ok(()),
        }
    }

    crate::forward_primitives!(serialize_primitive);

    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, label: &str) -> Result<usize> {
        let value = match core::str::from_utf8(bytes) {
            Ok(text) => json_string(text),
            Err(_) => {
                let values: Vec<String> = bytes.iter().map(u8::to_string).collect();
                format!("[{}]", values.join(", "))
            }
        };
        self.begin_value(label)?;
        self.emit(&value)?;
        Ok(bytes.len())
    }
}

fn json_scalar<P: Primitive>(value: &P) -> String {
    let text = value.to_string();
    match P::KIND {
        PrimitiveKind::Char => json_string(&text),
        kind if kind.is_float() && !is_finite_literal(&text) => String::from("null"),
        _ => text,
    }
}

fn is_finite_literal(text: &str) -> bool {
    !matches!(text, "NaN" | "inf" | "-inf")
}

fn json_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Error, stream::MemoryTransport},
    };

    fn render(f: impl FnOnce(&mut JsonChannel<'_, MemoryTransport>)) -> String {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        let mut channel = JsonChannel::new(&mut stream, Direction::Out).unwrap();
        f(&mut channel);
        String::from_utf8(stream.into_inner().into_bytes()).unwrap()
    }

    #[test]
    fn objects_and_arrays_follow_meta_type() {
        let text = render(|channel| {
            channel.open(Some("Node")).unwrap();
            channel.start_of_class("app::Node", "object").unwrap();
            channel.serialize_u32(&mut [7], "id").unwrap();
            channel.start_of_class("alloc::vec::Vec<u8>", "tags").unwrap();
            channel.serialize_u64(&mut [2], "count").unwrap();
            channel.serialize_u8(&mut [1], "member").unwrap();
            channel.serialize_u8(&mut [2], "member").unwrap();
            channel.end_of_class("alloc::vec::Vec<u8>", "tags").unwrap();
            channel.serialize_f64(&mut [f64::NAN], "ratio").unwrap();
            channel.serialize_bytes(&mut b"a\"b".to_vec(), "name").unwrap();
            channel.end_of_class("app::Node", "object").unwrap();
            channel.close().unwrap();
        });
        assert_eq!(
            text,
            "{\"package\": \"Node\", \"object\": {\"id\": 7, \"tags\": [1, 2], \"ratio\": null, \
             \"name\": \"a\\\"b\"}}\n"
        );
    }

    #[test]
    fn transparent_members_take_the_outer_label() {
        let text = render(|channel| {
            channel.open(Some("Wrapper")).unwrap();
            channel.start_of_class("alloc::borrow::Cow<str>", "title").unwrap();
            channel.serialize_bytes(&mut b"hi".to_vec(), "value").unwrap();
            channel.end_of_class("alloc::borrow::Cow<str>", "title").unwrap();
            channel.close().unwrap();
        });
        assert_eq!(text, "{\"package\": \"Wrapper\", \"title\": \"hi\"}\n");
    }

    #[test]
    fn chars_and_raw_bytes() {
        let text = render(|channel| {
            channel.open(Some("C")).unwrap();
            channel.serialize_char(&mut ['o', 'k'], "word").unwrap();
            channel.serialize_char(&mut ['\n'], "nl").unwrap();
            channel.serialize_bytes(&mut vec![0xff, 1], "raw").unwrap();
            channel.close().unwrap();
        });
        assert_eq!(
            text,
            "{\"package\": \"C\", \"word\": \"ok\", \"nl\": \"\\n\", \"raw\": [255, 1]}\n"
        );
    }

    #[test]
    fn input_is_unsupported() {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        assert!(matches!(
            JsonChannel::new(&mut stream, Direction::In),
            Err(Error::UnsupportedDirection { .. })
        ));
    }
}
