use {
    super::{Channel, ChannelState, Direction, Primitive},
    crate::{
        config::Config,
        error::{
            count_mismatch, invalid_literal, missing_type_name, unexpected_token, Error, Result,
        },
        stream::{BufferedStream, DelimiterMode, Transport},
    },
    core::{fmt::Write as _, time::Duration},
};

const LABEL_END: &str = ": ";
const RECORD_END: &str = "\t";
const PACKAGE_END: &str = "\n";
const PACKAGE_LABEL: &str = "package";

/// Tab-separated `label: value` records, one package per line.
///
/// ```text
/// package: Node\tid: 7\tname: abc\tweights: 0.5 1.25\t\n
/// ```
///
/// Array elements are separated by a space. Spaces, `%` and every byte that
/// is not printable ASCII are written as `%XX`, so a value never contains a
/// separator. Reading verifies every label.
///
/// A record longer than the stream buffer doubles the buffer until the record
/// fits. The buffer never grows past the channel's preallocation limit, so a
/// record longer than that fails with [`Error::DelimiterNotFound`].
#[derive(Debug)]
pub struct TextChannel<'a, T> {
    stream: &'a mut BufferedStream<T>,
    state: ChannelState,
    read_timeout: Duration,
}

impl<'a, T: Transport> TextChannel<'a, T> {
    pub fn new(stream: &'a mut BufferedStream<T>, direction: Direction) -> Self {
        Self::with_config(stream, direction, &Config::default())
    }

    pub fn with_config(
        stream: &'a mut BufferedStream<T>,
        direction: Direction,
        config: &Config,
    ) -> Self {
        let read_timeout = stream.read_timeout();
        Self {
            stream,
            state: ChannelState::with_config(direction, config),
            read_timeout,
        }
    }

    pub fn stream(&self) -> &BufferedStream<T> {
        &*self.stream
    }

    fn write_record(&mut self, label: &str, values: &str) -> Result<()> {
        let mut record = escape(label.as_bytes());
        record.push_str(LABEL_END);
        record.push_str(values);
        record.push_str(RECORD_END);
        self.stream.write_str(&record)?;
        self.state.advance(record.len());
        Ok(())
    }

    /// Read one record, check its label and return the raw value text.
    fn read_record(&mut self, label: &str) -> Result<Vec<u8>> {
        let found = self.read_token(LABEL_END)?;
        let expected = escape(label.as_bytes());
        if found != expected.as_bytes() {
            return Err(unexpected_token(&expected, &found, self.state.offset()));
        }
        self.read_token(RECORD_END)
    }

    fn read_token(&mut self, delimiter: &str) -> Result<Vec<u8>> {
        let limit = self.state.preallocation_limit();
        let token = loop {
            match self.stream.read_to_delimiter_timeout(
                &[delimiter],
                DelimiterMode::Exclude,
                self.read_timeout,
            ) {
                Ok(token) => break token,
                Err(Error::DelimiterNotFound { capacity }) if capacity < limit => {
                    self.stream
                        .resize_buffer(capacity.saturating_mul(2).min(limit))?;
                }
                Err(e) => return Err(e),
            }
        };
        self.state.advance(token.len() + delimiter.len());
        Ok(token)
    }

    fn serialize_primitive<P: Primitive>(&mut self, items: &mut [P], label: &str) -> Result<usize> {
        match self.state.direction() {
            Direction::Out => {
                let mut values = String::new();
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        values.push(' ');
                    }
                    let mut text = String::new();
                    // Writing to a String cannot fail.
                    let _ = write!(text, "{item}");
                    values.push_str(&escape(text.as_bytes()));
                }
                self.write_record(label, &values)?;
            }
            Direction::In => {
                let offset = self.state.offset();
                let raw = self.read_record(label)?;
                let values = split_values(&raw);
                if values.len() != items.len() {
                    return Err(count_mismatch(label, items.len(), values.len()));
                }
                for (item, value) in items.iter_mut().zip(values) {
                    let bytes = unescape(value, offset)?;
                    let text = core::str::from_utf8(&bytes)
                        .map_err(|_| invalid_literal(&String::from_utf8_lossy(&bytes), P::KIND))?;
                    *item = text.parse().map_err(|_| invalid_literal(text, P::KIND))?;
                }
            }
        }
        Ok(items.len())
    }
}

impl<T: Transport> Channel for TextChannel<'_, T> {
    #[inline]
    fn state(&self) -> &ChannelState {
        &self.state
    }

    #[inline]
    fn state_mut(&mut self) -> &mut ChannelState {
        &mut self.state
    }

    fn open_package(&mut self, type_name: Option<&str>) -> Result<String> {
        match self.state.direction() {
            Direction::Out => {
                let name = type_name.ok_or_else(missing_type_name)?;
                self.write_record(PACKAGE_LABEL, &escape(name.as_bytes()))?;
                Ok(name.to_owned())
            }
            Direction::In => {
                let offset = self.state.offset();
                let raw = self.read_record(PACKAGE_LABEL)?;
                let name = unescape(&raw, offset)?;
                String::from_utf8(name)
                    .map_err(|e| unexpected_token("package name", e.as_bytes(), offset))
            }
        }
    }

    fn close_package(&mut self) -> Result<()> {
        match self.state.direction() {
            Direction::Out => {
                self.stream.write_str(PACKAGE_END)?;
                self.state.advance(PACKAGE_END.len());
            }
            Direction::In => {
                let trailing = self.read_token(PACKAGE_END)?;
                if !trailing.is_empty() {
                    return Err(unexpected_token(
                        "end of package",
                        &trailing,
                        self.state.offset(),
                    ));
                }
            }
        }
        self.stream.flush()
    }

    crate::forward_primitives!(serialize_primitive);

    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, label: &str) -> Result<usize> {
        match self.state.direction() {
            Direction::Out => self.write_record(label, &escape(bytes))?,
            Direction::In => {
                let offset = self.state.offset();
                let raw = self.read_record(label)?;
                *bytes = unescape(&raw, offset)?;
            }
        }
        Ok(bytes.len())
    }
}

fn split_values(raw: &[u8]) -> Vec<&[u8]> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|b| *b == b' ').collect()
}

/// `%XX`-escape everything but printable ASCII other than `%`.
pub(crate) fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if byte.is_ascii_graphic() && byte != b'%' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

pub(crate) fn unescape(text: &[u8], offset: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some((&byte, tail)) = rest.split_first() {
        if byte != b'%' {
            out.push(byte);
            rest = tail;
            continue;
        }
        let decoded = tail
            .get(..2)
            .and_then(|hex| core::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(|| unexpected_token("%XX escape", rest, offset))?;
        out.push(decoded);
        rest = &tail[2..];
    }
    Ok(out)
}
