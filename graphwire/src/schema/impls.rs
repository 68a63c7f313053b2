//! Rules for primitives, strings, pairs and wrappers.
use {
    super::{serialize_bytes, serialize_class, serialize_primitives, Category, FIRST_LABEL, SECOND_LABEL},
    crate::{
        channel::{Channel, Primitive},
        error::{invalid_utf8_encoding, pointer_sized_decode_error, Result},
        Serialize,
    },
    core::{any::type_name, mem, slice},
};

macro_rules! impl_primitive {
    ($($type:ty),+ $(,)?) => {
        $(
            impl Serialize for $type {
                const CATEGORY: Category = Category::Primitive;

                #[inline]
                fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
                    serialize_primitives(channel, slice::from_mut(self), label)
                }
            }
        )+
    };
}

impl_primitive!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64, char);

// Pointer-sized integers travel at 64 bits regardless of the host.
macro_rules! impl_pointer_sized {
    ($type:ty as $wire:ty) => {
        impl Serialize for $type {
            const CATEGORY: Category = Category::Primitive;

            #[inline]
            fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
                let mut wire = [*self as $wire];
                serialize_primitives(channel, &mut wire, label)?;
                *self = <$type>::try_from(wire[0]).map_err(|_| pointer_sized_decode_error())?;
                Ok(())
            }
        }
    };
}

impl_pointer_sized!(usize as u64);
impl_pointer_sized!(isize as i64);

/// Fixed-size arrays of primitives go out in a single channel call.
impl<P: Primitive, const N: usize> Serialize for [P; N] {
    const CATEGORY: Category = Category::Primitive;

    #[inline]
    fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
        serialize_primitives(channel, self.as_mut_slice(), label)
    }
}

impl Serialize for String {
    const CATEGORY: Category = Category::Text;

    fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
        let mut bytes = mem::take(self).into_bytes();
        let result = serialize_bytes(channel, &mut bytes, label);
        match String::from_utf8(bytes) {
            Ok(text) => *self = text,
            Err(e) => {
                result?;
                return Err(invalid_utf8_encoding(e.utf8_error()));
            }
        }
        result
    }
}

impl<T: Serialize> Serialize for Box<T> {
    const CATEGORY: Category = Category::Transparent;

    fn type_name() -> &'static str {
        T::type_name()
    }

    #[inline]
    fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
        (**self).serialize(channel, label)
    }
}

impl<A: Serialize, B: Serialize> Serialize for (A, B) {
    const CATEGORY: Category = Category::Pair;

    fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> Result<()> {
        serialize_class(channel, type_name::<Self>(), label, |channel| {
            self.0.serialize(channel, FIRST_LABEL)?;
            self.1.serialize(channel, SECOND_LABEL)
        })
    }
}
