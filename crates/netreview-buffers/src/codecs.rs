//! Record codecs for the network buffers.
//!
//! | record            | width                       |
//! |-------------------|-----------------------------|
//! | id / count        | 4 bytes (`u32`)             |
//! | type tag          | 1 byte                      |
//! | position          | 16 bytes (lon, lat as f64)  |
//! | bounds            | 32 bytes (min x/y, max x/y) |
//! | link connections  | 8 bytes (start, end ids)    |
//! | segment           | 32 bytes (start, end)       |
//! | ids list          | 4 + 4 * count bytes         |

use serde::{Deserialize, Serialize};

use crate::buffers::{
    decode_decimal, decode_number, decode_type, encode_decimal, encode_number, encode_type,
    DataSize, RecordCodec, VariableRecordCodec,
};

/// Encoded widths of compound records.
pub struct EncodedSize;

impl EncodedSize {
    pub const ID: usize = DataSize::NUMBER;
    pub const COUNT: usize = DataSize::NUMBER;
    pub const TYPE: usize = DataSize::TYPE;
    pub const COORDINATE: usize = DataSize::DECIMAL;
    pub const POSITION: usize = DataSize::DECIMAL * 2;
    pub const BOUNDS: usize = DataSize::DECIMAL * 4;
}

// ============================================================================
// Geographic Values
// ============================================================================

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub lon: f64,
    pub lat: f64,
}

impl Position {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<[f64; 2]> for Position {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<(f64, f64)> for Position {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Identity for `expand`: contains nothing.
    pub const EMPTY: Bounds = Bounds {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_point(position: Position) -> Self {
        Self::new(position.lon, position.lat, position.lon, position.lat)
    }

    /// Bounding box of a polyline. Returns `EMPTY` for no positions.
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Self {
        positions
            .into_iter()
            .fold(Self::EMPTY, |acc, p| acc.expand(&Self::from_point(*p)))
    }

    pub fn expand(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Closed-interval overlap test; touching boxes intersect.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// One straight sub-span of a pipe polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Position,
    pub end: Position,
}

impl Segment {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.start.lon.min(self.end.lon),
            self.start.lat.min(self.end.lat),
            self.start.lon.max(self.end.lon),
            self.start.lat.max(self.end.lat),
        )
    }
}

// ============================================================================
// Fixed-Size Codecs
// ============================================================================

pub struct IdCodec;

impl RecordCodec for IdCodec {
    type Value = u32;
    const SIZE: usize = EncodedSize::ID;

    fn encode(value: &u32, out: &mut [u8]) {
        encode_number(*value, 0, out);
    }

    fn decode(bytes: &[u8]) -> u32 {
        decode_number(0, bytes)
    }
}

/// Raw one-byte type discriminant. Interpreting the code is left to the
/// domain layer.
pub struct TypeCodec;

impl RecordCodec for TypeCodec {
    type Value = u8;
    const SIZE: usize = EncodedSize::TYPE;

    fn encode(value: &u8, out: &mut [u8]) {
        encode_type(*value, 0, out);
    }

    fn decode(bytes: &[u8]) -> u8 {
        decode_type(0, bytes)
    }
}

pub struct PositionCodec;

impl PositionCodec {
    fn write(position: &Position, offset: usize, out: &mut [u8]) {
        encode_decimal(position.lon, offset, out);
        encode_decimal(position.lat, offset + EncodedSize::COORDINATE, out);
    }

    fn read(offset: usize, bytes: &[u8]) -> Position {
        Position {
            lon: decode_decimal(offset, bytes),
            lat: decode_decimal(offset + EncodedSize::COORDINATE, bytes),
        }
    }
}

impl RecordCodec for PositionCodec {
    type Value = Position;
    const SIZE: usize = EncodedSize::POSITION;

    fn encode(value: &Position, out: &mut [u8]) {
        Self::write(value, 0, out);
    }

    fn decode(bytes: &[u8]) -> Position {
        Self::read(0, bytes)
    }
}

pub struct BoundsCodec;

impl RecordCodec for BoundsCodec {
    type Value = Bounds;
    const SIZE: usize = EncodedSize::BOUNDS;

    fn encode(value: &Bounds, out: &mut [u8]) {
        PositionCodec::write(&Position::new(value.min_x, value.min_y), 0, out);
        PositionCodec::write(
            &Position::new(value.max_x, value.max_y),
            EncodedSize::POSITION,
            out,
        );
    }

    fn decode(bytes: &[u8]) -> Bounds {
        let min = PositionCodec::read(0, bytes);
        let max = PositionCodec::read(EncodedSize::POSITION, bytes);
        Bounds::new(min.lon, min.lat, max.lon, max.lat)
    }
}

/// Start and end node indices of a link.
pub struct LinkConnectionsCodec;

impl RecordCodec for LinkConnectionsCodec {
    type Value = [u32; 2];
    const SIZE: usize = EncodedSize::ID * 2;

    fn encode(value: &[u32; 2], out: &mut [u8]) {
        encode_number(value[0], 0, out);
        encode_number(value[1], EncodedSize::ID, out);
    }

    fn decode(bytes: &[u8]) -> [u32; 2] {
        [decode_number(0, bytes), decode_number(EncodedSize::ID, bytes)]
    }
}

pub struct SegmentCodec;

impl RecordCodec for SegmentCodec {
    type Value = Segment;
    const SIZE: usize = EncodedSize::POSITION * 2;

    fn encode(value: &Segment, out: &mut [u8]) {
        PositionCodec::write(&value.start, 0, out);
        PositionCodec::write(&value.end, EncodedSize::POSITION, out);
    }

    fn decode(bytes: &[u8]) -> Segment {
        Segment {
            start: PositionCodec::read(0, bytes),
            end: PositionCodec::read(EncodedSize::POSITION, bytes),
        }
    }
}

// ============================================================================
// Variable-Size Codecs
// ============================================================================

/// Count-prefixed list of `u32` ids.
pub struct IdsListCodec;

impl IdsListCodec {
    pub fn size_of(len: usize) -> usize {
        EncodedSize::COUNT + len * EncodedSize::ID
    }
}

impl VariableRecordCodec for IdsListCodec {
    type Input = [u32];
    type Output<'a> = IdList<'a>;

    fn encoded_size(value: &[u32]) -> usize {
        Self::size_of(value.len())
    }

    fn encode(value: &[u32], out: &mut [u8]) {
        encode_number(value.len() as u32, 0, out);
        for (i, id) in value.iter().enumerate() {
            encode_number(*id, EncodedSize::COUNT + i * EncodedSize::ID, out);
        }
    }

    fn decode(bytes: &[u8]) -> IdList<'_> {
        let count = decode_number(0, bytes) as usize;
        let end = IdsListCodec::size_of(count);
        IdList {
            bytes: &bytes[EncodedSize::COUNT..end],
        }
    }
}

/// Borrowed view over an encoded ids list.
#[derive(Debug, Clone, Copy)]
pub struct IdList<'a> {
    bytes: &'a [u8],
}

impl<'a> IdList<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len() / EncodedSize::ID
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<u32> {
        (i < self.len()).then(|| decode_number(i * EncodedSize::ID, self.bytes))
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + 'a {
        self.bytes
            .chunks_exact(EncodedSize::ID)
            .map(|chunk| decode_number(0, chunk))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.iter().any(|candidate| candidate == id)
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

impl PartialEq<[u32]> for IdList<'_> {
    fn eq(&self, other: &[u32]) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a == *b)
    }
}
