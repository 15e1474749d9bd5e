//! Heap-allocated fixed-size arrays with a `bincode::Decode` implementation that decodes straight
//! into heap memory.
//!
//! The road scanline buffers and the sprite priority buckets are several KB each, and the derived
//! `Decode` for `Box<[T; LEN]>` would build the array on the stack first.

use bincode::de::read::Reader;
use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::enc::write::Writer;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use bytemuck::Pod;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxedArray<T, const LEN: usize>(Box<[T; LEN]>);

pub type BoxedByteArray<const LEN: usize> = BoxedArray<u8, LEN>;
pub type BoxedWordArray<const LEN: usize> = BoxedArray<u16, LEN>;
pub type BoxedSignedWordArray<const LEN: usize> = BoxedArray<i16, LEN>;

impl<T: Pod, const LEN: usize> BoxedArray<T, LEN> {
    #[must_use]
    pub fn new() -> Self {
        // Length always matches LEN
        let array = vec![T::zeroed(); LEN].into_boxed_slice();
        Self(array.try_into().unwrap_or_else(|_| unreachable!()))
    }
}

impl<T: Pod, const LEN: usize> Default for BoxedArray<T, LEN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const LEN: usize> From<Box<[T; LEN]>> for BoxedArray<T, LEN> {
    fn from(value: Box<[T; LEN]>) -> Self {
        Self(value)
    }
}

impl<T, const LEN: usize> Deref for BoxedArray<T, LEN> {
    type Target = Box<[T; LEN]>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T, const LEN: usize> DerefMut for BoxedArray<T, LEN> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Pod, const LEN: usize> Encode for BoxedArray<T, LEN> {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        encoder.writer().write(bytemuck::cast_slice(self.0.as_slice()))
    }
}

fn decode_into<T: Pod, const LEN: usize, R: Reader>(
    reader: &mut R,
) -> Result<BoxedArray<T, LEN>, DecodeError> {
    let mut array = BoxedArray::<T, LEN>::new();
    reader.read(bytemuck::cast_slice_mut(array.0.as_mut_slice()))?;
    Ok(array)
}

impl<T: Pod, const LEN: usize, Context> Decode<Context> for BoxedArray<T, LEN> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        decode_into(decoder.reader())
    }
}

impl<'de, T: Pod, const LEN: usize, Context> BorrowDecode<'de, Context> for BoxedArray<T, LEN> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        decode_into(decoder.reader())
    }
}
