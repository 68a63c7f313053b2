use {
    super::Channel,
    crate::error::{invalid_bool_encoding, invalid_char_encoding, Result},
    core::{fmt, str::FromStr},
    paste::paste,
};

/// The fixed set of scalar kinds a channel transfers natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Char,
}

impl PrimitiveKind {
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Char => "char",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar a [`Channel`] can move in arrays.
///
/// Binary backends use the little-endian byte form; text backends use the
/// `Display` / `FromStr` pair, which round-trips for every implementor
/// (floats included).
pub trait Primitive: Copy + Default + fmt::Display + FromStr + 'static {
    const KIND: PrimitiveKind;

    /// Fixed-width little-endian representation.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    fn to_le(self) -> Self::Bytes;

    /// Decode the little-endian form, validating it where not every bit
    /// pattern is a value.
    fn from_le(bytes: Self::Bytes) -> Result<Self>;

    /// Call the per-kind operation of `channel` for this type.
    fn dispatch<C: Channel + ?Sized>(
        channel: &mut C,
        items: &mut [Self],
        label: &str,
    ) -> Result<usize>;
}

macro_rules! impl_primitive {
    ($($ty:ident => $kind:ident),+ $(,)?) => {
        $(
            impl Primitive for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;
                type Bytes = [u8; size_of::<$ty>()];

                #[inline]
                fn to_le(self) -> Self::Bytes {
                    self.to_le_bytes()
                }

                #[inline]
                fn from_le(bytes: Self::Bytes) -> Result<Self> {
                    Ok(<$ty>::from_le_bytes(bytes))
                }

                #[inline]
                fn dispatch<C: Channel + ?Sized>(
                    channel: &mut C,
                    items: &mut [Self],
                    label: &str,
                ) -> Result<usize> {
                    paste! { channel.[<serialize_ $ty>](items, label) }
                }
            }
        )+
    };
}

impl_primitive!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl Primitive for bool {
    const KIND: PrimitiveKind = PrimitiveKind::Bool;
    type Bytes = [u8; 1];

    #[inline]
    fn to_le(self) -> Self::Bytes {
        [self as u8]
    }

    #[inline]
    fn from_le(bytes: Self::Bytes) -> Result<Self> {
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(invalid_bool_encoding(byte)),
        }
    }

    #[inline]
    fn dispatch<C: Channel + ?Sized>(
        channel: &mut C,
        items: &mut [Self],
        label: &str,
    ) -> Result<usize> {
        channel.serialize_bool(items, label)
    }
}

impl Primitive for char {
    const KIND: PrimitiveKind = PrimitiveKind::Char;
    type Bytes = [u8; 4];

    #[inline]
    fn to_le(self) -> Self::Bytes {
        (self as u32).to_le_bytes()
    }

    #[inline]
    fn from_le(bytes: Self::Bytes) -> Result<Self> {
        let value = u32::from_le_bytes(bytes);
        char::from_u32(value).ok_or_else(|| invalid_char_encoding(value))
    }

    #[inline]
    fn dispatch<C: Channel + ?Sized>(
        channel: &mut C,
        items: &mut [Self],
        label: &str,
    ) -> Result<usize> {
        channel.serialize_char(items, label)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Error, proptest_config::proptest_cfg},
        proptest::prelude::*,
    };

    #[test]
    fn bool_rejects_other_bytes() {
        assert!(bool::from_le([1]).unwrap());
        assert!(matches!(
            bool::from_le([2]),
            Err(Error::InvalidBoolEncoding(2))
        ));
    }

    #[test]
    fn char_rejects_surrogates() {
        assert!(matches!(
            char::from_le(0xD800u32.to_le_bytes()),
            Err(Error::InvalidCharEncoding(0xD800))
        ));
    }

    #[test]
    fn kind_names() {
        assert_eq!(<u16 as Primitive>::KIND.to_string(), "u16");
        assert!(<f64 as Primitive>::KIND.is_float());
        assert!(!<char as Primitive>::KIND.is_float());
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn floats_survive_text_form(value in any::<f64>()) {
            let text = value.to_string();
            let parsed: f64 = text.parse().unwrap();
            if value.is_nan() {
                prop_assert!(parsed.is_nan());
            } else {
                prop_assert_eq!(parsed.to_bits(), value.to_bits());
            }
        }
    }
}
