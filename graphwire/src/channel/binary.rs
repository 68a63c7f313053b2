use {
    super::{Channel, ChannelState, Direction, Primitive},
    crate::{
        config::Config,
        error::{invalid_utf8_encoding, missing_type_name, preallocation_size_limit, Result},
        stream::{BufferedStream, Transport},
    },
    core::time::Duration,
};

/// Compact little-endian encoding.
///
/// Primitives are written at their fixed width with no labels or separators.
/// Byte runs (strings and the package type name) are prefixed with their
/// length as a `u64`. The format carries no framing beyond the package name,
/// so readers must issue exactly the calls the writer issued.
#[derive(Debug)]
pub struct BinaryChannel<'a, T> {
    stream: &'a mut BufferedStream<T>,
    state: ChannelState,
    read_timeout: Duration,
}

impl<'a, T: Transport> BinaryChannel<'a, T> {
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

    pub fn stream_mut(&mut self) -> &mut BufferedStream<T> {
        &mut *self.stream
    }

    fn serialize_primitive<P: Primitive>(&mut self, items: &mut [P], _label: &str) -> Result<usize> {
        let width = size_of::<P::Bytes>();
        match self.state.direction() {
            Direction::Out => {
                let mut bytes = Vec::with_capacity(items.len() * width);
                for item in items.iter() {
                    bytes.extend_from_slice(item.to_le().as_ref());
                }
                self.stream.write_all(&bytes)?;
                self.state.advance(bytes.len());
            }
            Direction::In => {
                let mut bytes = vec![0u8; items.len() * width];
                self.stream.read_exact(&mut bytes, self.read_timeout)?;
                for (item, chunk) in items.iter_mut().zip(bytes.chunks_exact(width)) {
                    let mut raw = P::Bytes::default();
                    raw.as_mut().copy_from_slice(chunk);
                    *item = P::from_le(raw)?;
                }
                self.state.advance(bytes.len());
            }
        }
        Ok(items.len())
    }

    fn write_run(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(&(bytes.len() as u64).to_le_bytes())?;
        self.stream.write_all(bytes)?;
        self.state.advance(size_of::<u64>() + bytes.len());
        Ok(())
    }

    fn read_run(&mut self) -> Result<Vec<u8>> {
        let mut len = [0u8; size_of::<u64>()];
        self.stream.read_exact(&mut len, self.read_timeout)?;
        let len = u64::from_le_bytes(len);
        let limit = self.state.preallocation_limit();
        let len = match usize::try_from(len) {
            Ok(len) if len <= limit => len,
            _ => return Err(preallocation_size_limit(len.try_into().unwrap_or(usize::MAX), limit)),
        };
        let mut bytes = vec![0u8; len];
        self.stream.read_exact(&mut bytes, self.read_timeout)?;
        self.state.advance(size_of::<u64>() + len);
        Ok(bytes)
    }
}

impl<T: Transport> Channel for BinaryChannel<'_, T> {
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
                self.write_run(name.as_bytes())?;
                Ok(name.to_owned())
            }
            Direction::In => {
                let bytes = self.read_run()?;
                String::from_utf8(bytes).map_err(|e| invalid_utf8_encoding(e.utf8_error()))
            }
        }
    }

    crate::forward_primitives!(serialize_primitive);

    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, _label: &str) -> Result<usize> {
        match self.state.direction() {
            Direction::Out => self.write_run(bytes)?,
            Direction::In => *bytes = self.read_run()?,
        }
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            error::Error,
            proptest_config::proptest_cfg,
            stream::{MemoryTransport, NullTransport},
        },
        proptest::prelude::*,
    };

    fn written(f: impl FnOnce(&mut BinaryChannel<'_, MemoryTransport>)) -> Vec<u8> {
        let mut stream = BufferedStream::new(MemoryTransport::new());
        let mut channel = BinaryChannel::new(&mut stream, Direction::Out);
        f(&mut channel);
        stream.into_inner().into_bytes()
    }

    #[test]
    fn primitives_are_little_endian() {
        let bytes = written(|channel| {
            channel.open(Some("T")).unwrap();
            channel.serialize_u16(&mut [0x0102, 0x0304], "pair").unwrap();
            channel.serialize_bool(&mut [true], "flag").unwrap();
            channel.close().unwrap();
        });
        assert_eq!(bytes, [1, 0, 0, 0, 0, 0, 0, 0, b'T', 2, 1, 4, 3, 1]);
    }

    #[test]
    fn open_out_requires_a_name() {
        let mut stream = BufferedStream::new(NullTransport);
        let mut channel = BinaryChannel::new(&mut stream, Direction::Out);
        assert!(matches!(channel.open(None), Err(Error::MissingTypeName)));
        assert!(!channel.state().is_open());
    }

    #[test]
    fn double_open_and_close_are_violations() {
        let mut stream = BufferedStream::new(NullTransport);
        let mut channel = BinaryChannel::new(&mut stream, Direction::Out);
        channel.open(Some("A")).unwrap();
        assert!(matches!(channel.open(Some("A")), Err(Error::AlreadyOpen { .. })));
        channel.close().unwrap();
        assert!(matches!(channel.close(), Err(Error::AlreadyClosed { .. })));
    }

    #[test]
    fn oversized_runs_are_rejected() {
        let mut bytes = (u64::MAX).to_le_bytes().to_vec();
        bytes.extend_from_slice(b"junk");
        let mut stream = BufferedStream::new(MemoryTransport::from(bytes));
        let mut channel = BinaryChannel::new(&mut stream, Direction::In);
        assert!(matches!(
            channel.open(None),
            Err(Error::PreallocationSizeLimit { .. })
        ));
    }

    #[test]
    fn truncated_input_is_eof() {
        let mut stream = BufferedStream::new(MemoryTransport::from(&[1u8, 0, 0][..]));
        let mut channel = BinaryChannel::new(&mut stream, Direction::In);
        let mut value = [0u32];
        assert!(matches!(
            channel.serialize_u32(&mut value, "value"),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn offset_tracks_bytes() {
        let mut stream = BufferedStream::new(NullTransport);
        let mut channel = BinaryChannel::new(&mut stream, Direction::Out);
        channel.open(Some("ab")).unwrap();
        channel.serialize_f64(&mut [1.5], "x").unwrap();
        assert_eq!(channel.state().offset(), 8 + 2 + 8);
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn bytes_and_chars_read_back(
            run in proptest::collection::vec(any::<u8>(), 0..64),
            chars in proptest::collection::vec(any::<char>(), 0..8),
        ) {
            let mut stream = BufferedStream::new(MemoryTransport::new());
            {
                let mut out = BinaryChannel::new(&mut stream, Direction::Out);
                out.open(Some("Run")).unwrap();
                out.serialize_bytes(&mut run.clone(), "run").unwrap();
                out.serialize_char(&mut chars.clone(), "chars").unwrap();
                out.close().unwrap();
            }
            let mut back = Vec::new();
            let mut back_chars = vec!['\0'; chars.len()];
            let mut input = BinaryChannel::new(&mut stream, Direction::In);
            prop_assert_eq!(input.open(None).unwrap(), "Run");
            input.serialize_bytes(&mut back, "run").unwrap();
            input.serialize_char(&mut back_chars, "chars").unwrap();
            input.close().unwrap();
            prop_assert_eq!(back, run);
            prop_assert_eq!(back_chars, chars);
        }
    }
}
