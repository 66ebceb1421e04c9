//! Flat binary buffers for network review.
//!
//! A network is flattened into contiguous little-endian record buffers so the
//! review algorithms can run over plain byte slices:
//!
//! 1. **Fixed-size buffers**: `[count u32][record; count]`, O(1) random access
//! 2. **Variable-size buffers**: the same data layout plus a `u32` offset table
//! 3. **Spatial index**: a packed static Hilbert R-tree, itself just another buffer
//! 4. **Dense ids**: `IdMapper` assigns zero-based indices during one encoding pass
//!
//! Every buffer comes in two backends (`BufferType`): a process-local `Vec<u8>`
//! and a reference-counted `bytes::Bytes` that crosses thread boundaries
//! without copying.

pub mod buffers;
pub mod codecs;
pub mod error;
pub mod geo_index;
pub mod id_mapper;

// Re-export key types
pub use buffers::{
    decode_count, encode_count, BinaryData, BufferType, BufferWithIndex, DataSize,
    FixedSizeBufferBuilder, FixedSizeBufferView, RecordCodec, VariableRecordCodec,
    VariableSizeBufferBuilder, VariableSizeBufferView,
};
pub use codecs::{
    BoundsCodec, EncodedSize, IdCodec, IdList, IdsListCodec, LinkConnectionsCodec, Position,
    PositionCodec, Bounds, Segment, SegmentCodec, TypeCodec,
};
pub use error::BufferError;
pub use geo_index::{GeoIndex, GeoIndexBuilder, DEFAULT_NODE_SIZE};
pub use id_mapper::IdMapper;
