//! Packed static Hilbert R-tree over axis-aligned boxes.
//!
//! The tree is built once from a fixed number of boxes and serialized into a
//! flat buffer, so it travels across thread boundaries like every other
//! encoded buffer. Queries run directly over the serialized bytes.
//!
//! Layout (little-endian):
//!
//! ```text
//! [magic u8 = 0xfb][version u8][node_size u16][num_items u32]
//! [min_x f64, min_y f64, max_x f64, max_y f64] * num_nodes
//! [index u32] * num_nodes
//! ```
//!
//! Leaf entries (the first `num_items` nodes) store the caller's item index;
//! internal entries store the node position of their first child.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use byteorder::{ByteOrder, LittleEndian};

use crate::buffers::{BinaryData, BufferType};
use crate::codecs::{Bounds, Position, Segment};
use crate::error::BufferError;

pub const DEFAULT_NODE_SIZE: u16 = 16;

const MAGIC: u8 = 0xfb;
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 8;
const BOX_SIZE: usize = 32;
const INDEX_SIZE: usize = 4;
const HILBERT_MAX: f64 = ((1u32 << 16) - 1) as f64;

/// Cumulative node counts per tree level, leaves first. Empty for zero items.
fn level_bounds(num_items: usize, node_size: usize) -> Vec<usize> {
    let mut bounds = Vec::new();
    if num_items == 0 {
        return bounds;
    }
    let mut n = num_items;
    let mut num_nodes = n;
    bounds.push(num_nodes);
    loop {
        n = n.div_ceil(node_size);
        num_nodes += n;
        bounds.push(num_nodes);
        if n == 1 {
            break;
        }
    }
    bounds
}

fn upper_bound(value: usize, bounds: &[usize]) -> usize {
    let i = bounds.partition_point(|&b| b <= value);
    bounds.get(i).copied().unwrap_or(value)
}

fn axis_dist(k: f64, min: f64, max: f64) -> f64 {
    if k < min {
        min - k
    } else if k <= max {
        0.0
    } else {
        k - max
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct GeoIndexBuilder {
    num_items: usize,
    node_size: usize,
    items: Vec<Bounds>,
    extent: Bounds,
}

impl GeoIndexBuilder {
    /// Prepares an index for exactly `num_items` boxes.
    pub fn new(num_items: usize) -> Self {
        Self::with_node_size(num_items, DEFAULT_NODE_SIZE)
    }

    pub fn with_node_size(num_items: usize, node_size: u16) -> Self {
        assert!(
            (2..=u16::MAX).contains(&node_size),
            "node size {node_size} must be at least 2"
        );
        assert!(
            num_items <= u32::MAX as usize,
            "{num_items} items do not fit a u32 index"
        );
        Self {
            num_items,
            node_size: node_size as usize,
            items: Vec::with_capacity(num_items),
            extent: Bounds::EMPTY,
        }
    }

    /// Adds one box and returns its item index.
    pub fn add(&mut self, bounds: Bounds) -> u32 {
        assert!(
            self.items.len() < self.num_items,
            "added more than the {} declared items",
            self.num_items
        );
        let index = self.items.len() as u32;
        self.extent = self.extent.expand(&bounds);
        self.items.push(bounds);
        index
    }

    pub fn add_point(&mut self, position: Position) -> u32 {
        self.add(Bounds::from_point(position))
    }

    pub fn add_segment(&mut self, segment: &Segment) -> u32 {
        self.add(segment.bounds())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sorts the leaves along the Hilbert curve, packs the upper levels and
    /// serializes the tree.
    pub fn finalize(self, buffer_type: BufferType) -> BinaryData {
        assert_eq!(
            self.items.len(),
            self.num_items,
            "added {} items, expected {}",
            self.items.len(),
            self.num_items
        );

        let levels = level_bounds(self.num_items, self.node_size);
        let num_nodes = levels.last().copied().unwrap_or(0);

        let mut boxes: Vec<Bounds> = Vec::with_capacity(num_nodes);
        let mut indices: Vec<u32> = Vec::with_capacity(num_nodes);

        if self.num_items <= self.node_size {
            boxes.extend_from_slice(&self.items);
            indices.extend(0..self.num_items as u32);
        } else {
            let mut order: Vec<(u32, u32)> = self
                .items
                .iter()
                .enumerate()
                .map(|(i, b)| (hilbert_value(b, &self.extent), i as u32))
                .collect();
            order.sort_unstable();
            for (_, i) in order {
                boxes.push(self.items[i as usize]);
                indices.push(i);
            }
        }

        if self.num_items > 0 {
            if self.num_items <= self.node_size {
                boxes.push(self.extent);
                indices.push(0);
            } else {
                let mut pos = 0;
                for &end in &levels[..levels.len() - 1] {
                    while pos < end {
                        let first_child = pos;
                        let mut node = boxes[pos];
                        pos += 1;
                        let mut j = 1;
                        while j < self.node_size && pos < end {
                            node = node.expand(&boxes[pos]);
                            pos += 1;
                            j += 1;
                        }
                        boxes.push(node);
                        indices.push(first_child as u32);
                    }
                }
            }
        }
        debug_assert_eq!(boxes.len(), num_nodes);

        let mut data = vec![0u8; HEADER_SIZE + num_nodes * (BOX_SIZE + INDEX_SIZE)];
        data[0] = MAGIC;
        data[1] = VERSION;
        LittleEndian::write_u16(&mut data[2..4], self.node_size as u16);
        LittleEndian::write_u32(&mut data[4..8], self.num_items as u32);

        let mut offset = HEADER_SIZE;
        for b in &boxes {
            LittleEndian::write_f64_into(
                &[b.min_x, b.min_y, b.max_x, b.max_y],
                &mut data[offset..offset + BOX_SIZE],
            );
            offset += BOX_SIZE;
        }
        LittleEndian::write_u32_into(&indices, &mut data[offset..]);

        BinaryData::from_vec(data, buffer_type)
    }
}

fn hilbert_value(item: &Bounds, extent: &Bounds) -> u32 {
    let width = match extent.max_x - extent.min_x {
        w if w == 0.0 => 1.0,
        w => w,
    };
    let height = match extent.max_y - extent.min_y {
        h if h == 0.0 => 1.0,
        h => h,
    };
    let cx = (item.min_x + item.max_x) / 2.0;
    let cy = (item.min_y + item.max_y) / 2.0;
    let x = (HILBERT_MAX * (cx - extent.min_x) / width).floor() as u32;
    let y = (HILBERT_MAX * (cy - extent.min_y) / height).floor() as u32;
    hilbert(x, y)
}

/// Position of `(x, y)` along a Hilbert curve over a 2^16 x 2^16 grid.
fn hilbert(x: u32, y: u32) -> u32 {
    let mut a = x ^ y;
    let mut b = 0xFFFF ^ a;
    let mut c = 0xFFFF ^ (x | y);
    let mut d = x & (y ^ 0xFFFF);

    let mut aa = a | (b >> 1);
    let mut bb = (a >> 1) ^ a;
    let mut cc = ((c >> 1) ^ (b & (d >> 1))) ^ c;
    let mut dd = ((a & (c >> 1)) ^ (d >> 1)) ^ d;

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    aa = (a & (a >> 2)) ^ (b & (b >> 2));
    bb = (a & (b >> 2)) ^ (b & ((a ^ b) >> 2));
    cc ^= (a & (c >> 2)) ^ (b & (d >> 2));
    dd ^= (b & (c >> 2)) ^ ((a ^ b) & (d >> 2));

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    aa = (a & (a >> 4)) ^ (b & (b >> 4));
    bb = (a & (b >> 4)) ^ (b & ((a ^ b) >> 4));
    cc ^= (a & (c >> 4)) ^ (b & (d >> 4));
    dd ^= (b & (c >> 4)) ^ ((a ^ b) & (d >> 4));

    a = aa;
    b = bb;
    c = cc;
    d = dd;
    cc ^= (a & (c >> 8)) ^ (b & (d >> 8));
    dd ^= (b & (c >> 8)) ^ ((a ^ b) & (d >> 8));

    a = cc ^ (cc >> 1);
    b = dd ^ (dd >> 1);

    let mut i0 = x ^ y;
    let mut i1 = b | (0xFFFF ^ (i0 | a));

    i0 = (i0 | (i0 << 8)) & 0x00FF_00FF;
    i0 = (i0 | (i0 << 4)) & 0x0F0F_0F0F;
    i0 = (i0 | (i0 << 2)) & 0x3333_3333;
    i0 = (i0 | (i0 << 1)) & 0x5555_5555;

    i1 = (i1 | (i1 << 8)) & 0x00FF_00FF;
    i1 = (i1 | (i1 << 4)) & 0x0F0F_0F0F;
    i1 = (i1 | (i1 << 2)) & 0x3333_3333;
    i1 = (i1 | (i1 << 1)) & 0x5555_5555;

    (i1 << 1) | i0
}

// ============================================================================
// Queries
// ============================================================================

/// Read-only view over a serialized index.
#[derive(Debug, Clone)]
pub struct GeoIndex<'a> {
    data: &'a [u8],
    node_size: usize,
    num_items: usize,
    level_bounds: Vec<usize>,
}

impl<'a> GeoIndex<'a> {
    /// Parses the header and validates the payload length. A zero-length
    /// buffer (an index that was never requested) reads as an empty index.
    pub fn from_bytes(data: &'a [u8]) -> Result<Self, BufferError> {
        if data.is_empty() {
            return Ok(Self {
                data,
                node_size: DEFAULT_NODE_SIZE as usize,
                num_items: 0,
                level_bounds: Vec::new(),
            });
        }
        if data.len() < HEADER_SIZE {
            return Err(BufferError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        if data[0] != MAGIC {
            return Err(BufferError::InvalidMagic { found: data[0] });
        }
        if data[1] != VERSION {
            return Err(BufferError::UnsupportedVersion {
                found: data[1],
                supported: VERSION,
            });
        }
        let node_size = LittleEndian::read_u16(&data[2..4]);
        if node_size < 2 {
            return Err(BufferError::InvalidNodeSize(node_size));
        }
        let num_items = LittleEndian::read_u32(&data[4..8]) as usize;
        let level_bounds = level_bounds(num_items, node_size as usize);
        let num_nodes = level_bounds.last().copied().unwrap_or(0);
        let expected = HEADER_SIZE + num_nodes * (BOX_SIZE + INDEX_SIZE);
        if data.len() < expected {
            return Err(BufferError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            node_size: node_size as usize,
            num_items,
            level_bounds,
        })
    }

    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Extent of every indexed box, `None` when empty.
    pub fn extent(&self) -> Option<Bounds> {
        self.root().map(|root| self.node_box(root))
    }

    /// Items whose box intersects `query` (closed intervals).
    pub fn search(&self, query: &Bounds) -> Vec<u32> {
        self.search_with(query, |_| true)
    }

    /// Like `search`, keeping only items accepted by `filter`.
    pub fn search_with<F>(&self, query: &Bounds, mut filter: F) -> Vec<u32>
    where
        F: FnMut(u32) -> bool,
    {
        let mut results = Vec::new();
        let Some(root) = self.root() else {
            return results;
        };

        let mut stack = Vec::new();
        let mut node_index = root;
        loop {
            let end = (node_index + self.node_size).min(upper_bound(node_index, &self.level_bounds));
            for pos in node_index..end {
                if !query.intersects(&self.node_box(pos)) {
                    continue;
                }
                let index = self.node_entry(pos);
                if node_index >= self.num_items {
                    stack.push(index as usize);
                } else if filter(index) {
                    results.push(index);
                }
            }
            match stack.pop() {
                Some(next) => node_index = next,
                None => break,
            }
        }
        results
    }

    /// Up to `max_results` items nearest to `point`, closest first, whose box
    /// lies within `max_distance` (in coordinate units, inclusive).
    pub fn neighbors(&self, point: Position, max_results: usize, max_distance: f64) -> Vec<u32> {
        self.neighbors_with(point, max_results, max_distance, |_| true)
    }

    pub fn neighbors_with<F>(
        &self,
        point: Position,
        max_results: usize,
        max_distance: f64,
        mut filter: F,
    ) -> Vec<u32>
    where
        F: FnMut(u32) -> bool,
    {
        let mut results = Vec::new();
        let Some(root) = self.root() else {
            return results;
        };
        if max_results == 0 {
            return results;
        }

        let max_dist_squared = max_distance * max_distance;
        let mut queue = BinaryHeap::new();
        let mut node_index = root;
        'search: loop {
            let end = (node_index + self.node_size).min(upper_bound(node_index, &self.level_bounds));
            for pos in node_index..end {
                let b = self.node_box(pos);
                let dx = axis_dist(point.lon, b.min_x, b.max_x);
                let dy = axis_dist(point.lat, b.min_y, b.max_y);
                let dist = dx * dx + dy * dy;
                if dist > max_dist_squared {
                    continue;
                }
                let index = self.node_entry(pos);
                if node_index >= self.num_items {
                    queue.push(QueueEntry::node(dist, index));
                } else if filter(index) {
                    queue.push(QueueEntry::item(dist, index));
                }
            }

            while let Some(top) = queue.peek() {
                if !top.is_item {
                    break;
                }
                if top.dist > max_dist_squared {
                    break 'search;
                }
                results.push(top.index);
                queue.pop();
                if results.len() == max_results {
                    break 'search;
                }
            }

            match queue.pop() {
                Some(entry) => node_index = entry.index as usize,
                None => break,
            }
        }
        results
    }

    fn root(&self) -> Option<usize> {
        self.level_bounds.last().map(|&n| n - 1)
    }

    fn node_box(&self, pos: usize) -> Bounds {
        let offset = HEADER_SIZE + pos * BOX_SIZE;
        let mut values = [0f64; 4];
        LittleEndian::read_f64_into(&self.data[offset..offset + BOX_SIZE], &mut values);
        Bounds::new(values[0], values[1], values[2], values[3])
    }

    fn node_entry(&self, pos: usize) -> u32 {
        let num_nodes = self.level_bounds.last().copied().unwrap_or(0);
        let offset = HEADER_SIZE + num_nodes * BOX_SIZE + pos * INDEX_SIZE;
        LittleEndian::read_u32(&self.data[offset..offset + INDEX_SIZE])
    }
}

/// Min-heap entry for the best-first neighbor walk.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    dist: f64,
    index: u32,
    is_item: bool,
}

impl QueueEntry {
    fn node(dist: f64, index: u32) -> Self {
        Self {
            dist,
            index,
            is_item: false,
        }
    }

    fn item(dist: f64, index: u32) -> Self {
        Self {
            dist,
            index,
            is_item: true,
        }
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed so the std max-heap pops the closest entry; items win ties
    // against nodes, then lower indices first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then(self.is_item.cmp(&other.is_item))
            .then(other.index.cmp(&self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bounds_pack_sixteen_per_node() {
        assert!(level_bounds(0, 16).is_empty());
        assert_eq!(level_bounds(1, 16), vec![1, 2]);
        assert_eq!(level_bounds(16, 16), vec![16, 17]);
        assert_eq!(level_bounds(17, 16), vec![17, 19, 20]);
        assert_eq!(level_bounds(300, 16), vec![300, 319, 321, 322]);
    }

    #[test]
    fn upper_bound_finds_next_level() {
        let bounds = [17, 19, 20];
        assert_eq!(upper_bound(0, &bounds), 17);
        assert_eq!(upper_bound(17, &bounds), 19);
        assert_eq!(upper_bound(19, &bounds), 20);
    }

    #[test]
    fn hilbert_corners() {
        assert_eq!(hilbert(0, 0), 0);
        assert_ne!(hilbert(0xFFFF, 0), hilbert(0, 0xFFFF));
    }

    #[test]
    fn queue_pops_closest_first() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry::node(4.0, 1));
        heap.push(QueueEntry::item(1.0, 2));
        heap.push(QueueEntry::item(9.0, 3));
        let order: Vec<u32> = std::iter::from_fn(|| heap.pop().map(|e| e.index)).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn bad_header_is_rejected() {
        assert!(matches!(
            GeoIndex::from_bytes(&[0xfb, 1, 16]),
            Err(BufferError::Truncated { .. })
        ));
        assert!(matches!(
            GeoIndex::from_bytes(&[0, 1, 16, 0, 0, 0, 0, 0]),
            Err(BufferError::InvalidMagic { found: 0 })
        ));
        assert!(matches!(
            GeoIndex::from_bytes(&[0xfb, 9, 16, 0, 0, 0, 0, 0]),
            Err(BufferError::UnsupportedVersion { found: 9, .. })
        ));
    }
}
