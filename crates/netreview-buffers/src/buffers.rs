//! Fixed-size and variable-size record buffers.
//!
//! Every buffer starts with a little-endian `u32` record count. Fixed-size
//! buffers follow it with `count * C::SIZE` bytes of records; variable-size
//! buffers keep a second buffer of `u32` byte offsets so random access stays
//! O(1) regardless of record length.
//!
//! Sizes are computed up front: builders never grow. Writing past the declared
//! capacity is a programming defect and panics.

use std::marker::PhantomData;
use std::ops::Deref;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Byte widths of the primitive values stored in buffers.
pub struct DataSize;

impl DataSize {
    pub const TYPE: usize = 1;
    pub const NUMBER: usize = 4;
    pub const DECIMAL: usize = 8;
}

/// Size of the record-count header at the start of every data buffer.
pub const COUNT_HEADER_SIZE: usize = DataSize::NUMBER;

// ============================================================================
// Buffer Backends
// ============================================================================

/// Selects the memory backend for one encoding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferType {
    /// Process-local buffer; cloning it deep-copies the bytes.
    #[default]
    Array,
    /// Reference-counted buffer; cloning it shares the same memory.
    Shared,
}

/// An immutable encoded buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryData {
    Array(Vec<u8>),
    Shared(Bytes),
}

impl BinaryData {
    pub fn from_vec(data: Vec<u8>, buffer_type: BufferType) -> Self {
        match buffer_type {
            BufferType::Array => BinaryData::Array(data),
            BufferType::Shared => BinaryData::Shared(Bytes::from(data)),
        }
    }

    pub fn buffer_type(&self) -> BufferType {
        match self {
            BinaryData::Array(_) => BufferType::Array,
            BinaryData::Shared(_) => BufferType::Shared,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BinaryData::Array(data) => data,
            BinaryData::Shared(data) => data,
        }
    }
}

impl Default for BinaryData {
    fn default() -> Self {
        BinaryData::Array(Vec::new())
    }
}

impl Deref for BinaryData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for BinaryData {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Data buffer plus the per-record offset table of a variable-size buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferWithIndex {
    pub data: BinaryData,
    pub index: BinaryData,
}

// ============================================================================
// Primitive Encoding Helpers
// ============================================================================

pub fn encode_number(value: u32, offset: usize, buf: &mut [u8]) {
    LittleEndian::write_u32(&mut buf[offset..offset + DataSize::NUMBER], value);
}

pub fn decode_number(offset: usize, buf: &[u8]) -> u32 {
    LittleEndian::read_u32(&buf[offset..offset + DataSize::NUMBER])
}

pub fn encode_decimal(value: f64, offset: usize, buf: &mut [u8]) {
    LittleEndian::write_f64(&mut buf[offset..offset + DataSize::DECIMAL], value);
}

pub fn decode_decimal(offset: usize, buf: &[u8]) -> f64 {
    LittleEndian::read_f64(&buf[offset..offset + DataSize::DECIMAL])
}

pub fn encode_type(value: u8, offset: usize, buf: &mut [u8]) {
    buf[offset] = value;
}

pub fn decode_type(offset: usize, buf: &[u8]) -> u8 {
    buf[offset]
}

pub fn encode_count(count: u32, buf: &mut [u8]) {
    encode_number(count, 0, buf);
}

/// Reads the record count header. A buffer shorter than the header holds
/// zero records.
pub fn decode_count(buf: &[u8]) -> usize {
    if buf.len() < COUNT_HEADER_SIZE {
        return 0;
    }
    decode_number(0, buf) as usize
}

fn to_u32(value: usize, what: &str) -> u32 {
    assert!(
        value <= u32::MAX as usize,
        "{what} {value} does not fit the u32 buffer format"
    );
    value as u32
}

// ============================================================================
// Record Codecs
// ============================================================================

/// Encodes and decodes one fixed-width record.
pub trait RecordCodec {
    type Value;

    /// Encoded width of one record in bytes.
    const SIZE: usize;

    /// Writes `value` into `out`, which is exactly `SIZE` bytes long.
    fn encode(value: &Self::Value, out: &mut [u8]);

    /// Reads a value from `bytes`, which is exactly `SIZE` bytes long.
    fn decode(bytes: &[u8]) -> Self::Value;
}

/// Encodes and decodes one variable-width record.
///
/// Decoding borrows from the buffer so readers can walk records without
/// allocating.
pub trait VariableRecordCodec {
    type Input: ?Sized;
    type Output<'a>;

    fn encoded_size(value: &Self::Input) -> usize;

    /// Writes `value` into `out`, which is exactly `encoded_size(value)` bytes.
    fn encode(value: &Self::Input, out: &mut [u8]);

    /// Reads a record starting at `bytes[0]`; `bytes` runs to the end of the
    /// data buffer.
    fn decode(bytes: &[u8]) -> Self::Output<'_>;
}

// ============================================================================
// Fixed-Size Buffers
// ============================================================================

pub struct FixedSizeBufferBuilder<C: RecordCodec> {
    data: Vec<u8>,
    count: usize,
    current_index: usize,
    buffer_type: BufferType,
    _codec: PhantomData<C>,
}

impl<C: RecordCodec> FixedSizeBufferBuilder<C> {
    /// Allocates room for exactly `count` records.
    pub fn new(count: usize, buffer_type: BufferType) -> Self {
        let mut data = vec![0u8; COUNT_HEADER_SIZE + count * C::SIZE];
        encode_count(to_u32(count, "record count"), &mut data);
        Self {
            data,
            count,
            current_index: 0,
            buffer_type,
            _codec: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.count
    }

    /// Appends the next record.
    pub fn add(&mut self, value: &C::Value) {
        self.add_at_index(self.current_index, value);
        self.current_index += 1;
    }

    /// Overwrites the record at `index` without moving the append cursor.
    pub fn add_at_index(&mut self, index: usize, value: &C::Value) {
        assert!(
            index < self.count,
            "record {index} exceeds buffer capacity of {} records",
            self.count
        );
        let offset = COUNT_HEADER_SIZE + index * C::SIZE;
        C::encode(value, &mut self.data[offset..offset + C::SIZE]);
    }

    pub fn finalize(self) -> BinaryData {
        BinaryData::from_vec(self.data, self.buffer_type)
    }
}

/// Random access over a fixed-size buffer.
pub struct FixedSizeBufferView<'a, C: RecordCodec> {
    data: &'a [u8],
    count: usize,
    _codec: PhantomData<C>,
}

impl<C: RecordCodec> Clone for FixedSizeBufferView<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: RecordCodec> Copy for FixedSizeBufferView<'_, C> {}

impl<'a, C: RecordCodec + 'a> FixedSizeBufferView<'a, C> {
    pub fn new(data: &'a [u8]) -> Self {
        let count = decode_count(data);
        debug_assert!(
            count == 0 || data.len() >= COUNT_HEADER_SIZE + count * C::SIZE,
            "buffer holds fewer bytes than its {count} declared records"
        );
        Self {
            data,
            count,
            _codec: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Decodes record `index`.
    ///
    /// Panics when `index` is out of range.
    pub fn get(&self, index: usize) -> C::Value {
        assert!(
            index < self.count,
            "index {index} is out of bounds (buffer holds {} records)",
            self.count
        );
        self.decode_at(index)
    }

    pub fn try_get(&self, index: usize) -> Option<C::Value> {
        (index < self.count).then(|| self.decode_at(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = C::Value> + 'a {
        let view = *self;
        (0..view.count).map(move |i| view.decode_at(i))
    }

    /// Lazily yields `(index, value)` pairs.
    pub fn enumerate(&self) -> impl Iterator<Item = (usize, C::Value)> + 'a {
        let view = *self;
        (0..view.count).map(move |i| (i, view.decode_at(i)))
    }

    fn decode_at(&self, index: usize) -> C::Value {
        let offset = COUNT_HEADER_SIZE + index * C::SIZE;
        C::decode(&self.data[offset..offset + C::SIZE])
    }
}

// ============================================================================
// Variable-Size Buffers
// ============================================================================

pub struct VariableSizeBufferBuilder<C: VariableRecordCodec> {
    data: Vec<u8>,
    index: Vec<u8>,
    count: usize,
    current_index: usize,
    current_offset: usize,
    buffer_type: BufferType,
    _codec: PhantomData<C>,
}

impl<C: VariableRecordCodec> VariableSizeBufferBuilder<C> {
    /// `total_data_size` is the summed `encoded_size` of all `count` records,
    /// computed by the caller before construction.
    pub fn new(count: usize, total_data_size: usize, buffer_type: BufferType) -> Self {
        let mut data = vec![0u8; COUNT_HEADER_SIZE + total_data_size];
        encode_count(to_u32(count, "record count"), &mut data);
        Self {
            data,
            index: vec![0u8; count * DataSize::NUMBER],
            count,
            current_index: 0,
            current_offset: COUNT_HEADER_SIZE,
            buffer_type,
            _codec: PhantomData,
        }
    }

    pub fn add(&mut self, value: &C::Input) {
        assert!(
            self.current_index < self.count,
            "record {} exceeds buffer capacity of {} records",
            self.current_index,
            self.count
        );
        let size = C::encoded_size(value);
        let end = self.current_offset + size;
        assert!(
            end <= self.data.len(),
            "record {} overflows the precomputed data size",
            self.current_index
        );
        C::encode(value, &mut self.data[self.current_offset..end]);
        encode_number(
            to_u32(self.current_offset, "record offset"),
            self.current_index * DataSize::NUMBER,
            &mut self.index,
        );
        self.current_offset = end;
        self.current_index += 1;
    }

    pub fn finalize(self) -> BufferWithIndex {
        BufferWithIndex {
            data: BinaryData::from_vec(self.data, self.buffer_type),
            index: BinaryData::from_vec(self.index, self.buffer_type),
        }
    }
}

/// Random access over a variable-size buffer through its offset table.
pub struct VariableSizeBufferView<'a, C: VariableRecordCodec> {
    data: &'a [u8],
    offsets: &'a [u8],
    count: usize,
    _codec: PhantomData<C>,
}

impl<C: VariableRecordCodec> Clone for VariableSizeBufferView<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: VariableRecordCodec> Copy for VariableSizeBufferView<'_, C> {}

impl<'a, C: VariableRecordCodec + 'a> VariableSizeBufferView<'a, C> {
    pub fn new(buffer: &'a BufferWithIndex) -> Self {
        Self::from_parts(buffer.data.as_bytes(), buffer.index.as_bytes())
    }

    pub fn from_parts(data: &'a [u8], offsets: &'a [u8]) -> Self {
        let count = decode_count(data);
        debug_assert!(
            offsets.len() >= count * DataSize::NUMBER,
            "offset table is shorter than its {count} declared records"
        );
        Self {
            data,
            offsets,
            count,
            _codec: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Decodes record `index`.
    ///
    /// Panics when `index` is out of range.
    pub fn get(&self, index: usize) -> C::Output<'a> {
        assert!(
            index < self.count,
            "index {index} is out of bounds (buffer holds {} records)",
            self.count
        );
        self.decode_at(index)
    }

    pub fn try_get(&self, index: usize) -> Option<C::Output<'a>> {
        (index < self.count).then(|| self.decode_at(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = C::Output<'a>> + 'a {
        let view = *self;
        (0..view.count).map(move |i| view.decode_at(i))
    }

    pub fn enumerate(&self) -> impl Iterator<Item = (usize, C::Output<'a>)> + 'a {
        let view = *self;
        (0..view.count).map(move |i| (i, view.decode_at(i)))
    }

    fn decode_at(&self, index: usize) -> C::Output<'a> {
        let offset = decode_number(index * DataSize::NUMBER, self.offsets) as usize;
        let data: &'a [u8] = self.data;
        C::decode(&data[offset..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct U32Codec;

    impl RecordCodec for U32Codec {
        type Value = u32;
        const SIZE: usize = DataSize::NUMBER;

        fn encode(value: &u32, out: &mut [u8]) {
            encode_number(*value, 0, out);
        }

        fn decode(bytes: &[u8]) -> u32 {
            decode_number(0, bytes)
        }
    }

    #[test]
    fn count_header_is_little_endian() {
        let mut builder = FixedSizeBufferBuilder::<U32Codec>::new(2, BufferType::Array);
        builder.add(&7);
        builder.add(&9);
        let data = builder.finalize();

        assert_eq!(&data[..4], &[2, 0, 0, 0]);
        assert_eq!(&data[4..8], &[7, 0, 0, 0]);
        assert_eq!(data.len(), 12);
    }

    #[test]
    fn add_at_index_does_not_move_cursor() {
        let mut builder = FixedSizeBufferBuilder::<U32Codec>::new(3, BufferType::Array);
        builder.add_at_index(2, &30);
        builder.add(&10);
        builder.add(&20);
        let data = builder.finalize();

        let view = FixedSizeBufferView::<U32Codec>::new(&data);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![10, 20, 30]);
    }

    #[test]
    #[should_panic(expected = "exceeds buffer capacity")]
    fn writing_past_capacity_panics() {
        let mut builder = FixedSizeBufferBuilder::<U32Codec>::new(1, BufferType::Array);
        builder.add(&1);
        builder.add(&2);
    }

    #[test]
    fn short_buffer_has_no_records() {
        assert_eq!(decode_count(&[]), 0);
        let view = FixedSizeBufferView::<U32Codec>::new(&[]);
        assert!(view.is_empty());
        assert_eq!(view.try_get(0), None);
    }

    #[test]
    fn shared_clone_shares_memory() {
        let data = BinaryData::from_vec(vec![1, 2, 3], BufferType::Shared);
        let copy = data.clone();
        assert_eq!(data.as_bytes().as_ptr(), copy.as_bytes().as_ptr());

        let local = BinaryData::from_vec(vec![1, 2, 3], BufferType::Array);
        let local_copy = local.clone();
        assert_ne!(local.as_bytes().as_ptr(), local_copy.as_bytes().as_ptr());
        assert_eq!(local, local_copy);
    }
}
