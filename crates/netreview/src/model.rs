//! Read-only view of a water distribution network.
//!
//! The review engine never mutates the network. It only needs to iterate
//! assets, look one up by id, and list the links incident to a node.
//! `HydraulicModel` is an in-memory implementation for embedding callers and
//! tests.

use std::fmt;

use ahash::AHashMap;
use netreview_buffers::Position;
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers and Type Discriminants
// ============================================================================

/// Caller-side asset identifier, stable for one review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(u32);

impl AssetId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for AssetId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Junction,
    Tank,
    Reservoir,
}

impl NodeType {
    pub const fn code(self) -> u8 {
        match self {
            NodeType::Junction => 0,
            NodeType::Tank => 1,
            NodeType::Reservoir => 2,
        }
    }

    /// Unknown codes read as `Junction`.
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => NodeType::Tank,
            2 => NodeType::Reservoir,
            _ => NodeType::Junction,
        }
    }

    /// Tanks and reservoirs can feed a network.
    pub const fn is_supply_source(self) -> bool {
        matches!(self, NodeType::Tank | NodeType::Reservoir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Pipe,
    Valve,
    Pump,
}

impl LinkType {
    pub const fn code(self) -> u8 {
        match self {
            LinkType::Pipe => 0,
            LinkType::Valve => 1,
            LinkType::Pump => 2,
        }
    }

    /// Unknown codes read as `Pipe`.
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => LinkType::Valve,
            2 => LinkType::Pump,
            _ => LinkType::Pipe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Junction,
    Tank,
    Reservoir,
    Pipe,
    Valve,
    Pump,
}

impl From<NodeType> for AssetType {
    fn from(t: NodeType) -> Self {
        match t {
            NodeType::Junction => AssetType::Junction,
            NodeType::Tank => AssetType::Tank,
            NodeType::Reservoir => AssetType::Reservoir,
        }
    }
}

impl From<LinkType> for AssetType {
    fn from(t: LinkType) -> Self {
        match t {
            LinkType::Pipe => AssetType::Pipe,
            LinkType::Valve => AssetType::Valve,
            LinkType::Pump => AssetType::Pump,
        }
    }
}

// ============================================================================
// Assets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_type: NodeType,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub link_type: LinkType,
    /// Start and end node ids.
    pub connections: [AssetId; 2],
    /// Polyline from start to end, endpoints included.
    pub coordinates: Vec<Position>,
    pub diameter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetKind {
    Node(Node),
    Link(Link),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub label: String,
    pub kind: AssetKind,
}

impl Asset {
    pub fn asset_type(&self) -> AssetType {
        match &self.kind {
            AssetKind::Node(node) => node.node_type.into(),
            AssetKind::Link(link) => link.link_type.into(),
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, AssetKind::Link(_))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match &self.kind {
            AssetKind::Node(node) => Some(node),
            AssetKind::Link(_) => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match &self.kind {
            AssetKind::Link(link) => Some(link),
            AssetKind::Node(_) => None,
        }
    }

    /// The link data when this asset is a pipe.
    pub fn as_pipe(&self) -> Option<&Link> {
        self.as_link().filter(|link| link.link_type == LinkType::Pipe)
    }

    /// Label folded for case-insensitive ordering.
    pub fn sort_label(&self) -> String {
        self.label.to_uppercase()
    }
}

// ============================================================================
// Network Model Interface
// ============================================================================

/// Read access the review engine needs from a network.
pub trait NetworkModel {
    /// Every asset, in a stable iteration order.
    fn assets(&self) -> impl Iterator<Item = &Asset> + '_;

    fn asset(&self, id: AssetId) -> Option<&Asset>;

    /// Links incident to `node`, empty for unknown ids.
    fn connected_links(&self, node: AssetId) -> &[AssetId];
}

/// In-memory network with insertion-ordered assets.
#[derive(Debug, Clone, Default)]
pub struct HydraulicModel {
    assets: Vec<Asset>,
    positions: AHashMap<AssetId, usize>,
    topology: AHashMap<AssetId, Vec<AssetId>>,
}

impl HydraulicModel {
    /// Builds a model from assets; later duplicates of an id replace earlier
    /// ones in place.
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut model = Self::default();
        for asset in assets {
            match model.positions.get(&asset.id) {
                Some(&i) => model.assets[i] = asset,
                None => {
                    model.positions.insert(asset.id, model.assets.len());
                    model.assets.push(asset);
                }
            }
        }
        model.rebuild_topology();
        model
    }

    fn rebuild_topology(&mut self) {
        self.topology.clear();
        for asset in &self.assets {
            let Some(link) = asset.as_link() else {
                continue;
            };
            let [start, end] = link.connections;
            self.topology.entry(start).or_default().push(asset.id);
            if end != start {
                self.topology.entry(end).or_default().push(asset.id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.assets.iter().filter(|a| !a.is_link()).count()
    }

    pub fn link_count(&self) -> usize {
        self.assets.iter().filter(|a| a.is_link()).count()
    }

    pub fn into_assets(self) -> Vec<Asset> {
        self.assets
    }
}

impl NetworkModel for HydraulicModel {
    fn assets(&self) -> impl Iterator<Item = &Asset> + '_ {
        self.assets.iter()
    }

    fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.positions.get(&id).map(|&i| &self.assets[i])
    }

    fn connected_links(&self, node: AssetId) -> &[AssetId] {
        self.topology.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Incremental construction of a `HydraulicModel`.
///
/// Ids are assigned sequentially from 1. Links take their polyline from the
/// positions of their endpoint nodes plus any interior vertices.
#[derive(Debug, Default)]
pub struct HydraulicModelBuilder {
    assets: Vec<Asset>,
    next_id: u32,
}

impl HydraulicModelBuilder {
    pub fn new() -> Self {
        Self {
            assets: Vec::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> AssetId {
        let id = AssetId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    /// Adds a fully specified asset, keeping its id.
    pub fn add_asset(&mut self, asset: Asset) -> AssetId {
        let id = asset.id;
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.assets.push(asset);
        id
    }

    pub fn node(&mut self, node_type: NodeType, label: &str, position: impl Into<Position>) -> AssetId {
        let id = self.next_id();
        self.assets.push(Asset {
            id,
            label: label.to_string(),
            kind: AssetKind::Node(Node {
                node_type,
                position: position.into(),
            }),
        });
        id
    }

    pub fn junction(&mut self, label: &str, position: impl Into<Position>) -> AssetId {
        self.node(NodeType::Junction, label, position)
    }

    pub fn tank(&mut self, label: &str, position: impl Into<Position>) -> AssetId {
        self.node(NodeType::Tank, label, position)
    }

    pub fn reservoir(&mut self, label: &str, position: impl Into<Position>) -> AssetId {
        self.node(NodeType::Reservoir, label, position)
    }

    pub fn link(
        &mut self,
        link_type: LinkType,
        label: &str,
        start: AssetId,
        end: AssetId,
        vertices: &[Position],
    ) -> AssetId {
        let mut coordinates = Vec::with_capacity(vertices.len() + 2);
        coordinates.extend(self.position_of(start));
        coordinates.extend_from_slice(vertices);
        coordinates.extend(self.position_of(end));

        let id = self.next_id();
        self.assets.push(Asset {
            id,
            label: label.to_string(),
            kind: AssetKind::Link(Link {
                link_type,
                connections: [start, end],
                coordinates,
                diameter: 300.0,
            }),
        });
        id
    }

    /// Straight pipe between two nodes.
    pub fn pipe(&mut self, label: &str, start: AssetId, end: AssetId) -> AssetId {
        self.link(LinkType::Pipe, label, start, end, &[])
    }

    /// Pipe routed through interior vertices.
    pub fn pipe_through(
        &mut self,
        label: &str,
        start: AssetId,
        end: AssetId,
        vertices: &[Position],
    ) -> AssetId {
        self.link(LinkType::Pipe, label, start, end, vertices)
    }

    pub fn valve(&mut self, label: &str, start: AssetId, end: AssetId) -> AssetId {
        self.link(LinkType::Valve, label, start, end, &[])
    }

    pub fn pump(&mut self, label: &str, start: AssetId, end: AssetId) -> AssetId {
        self.link(LinkType::Pump, label, start, end, &[])
    }

    /// Sets the diameter of a previously added link.
    pub fn with_diameter(&mut self, link: AssetId, diameter: f64) -> &mut Self {
        if let Some(AssetKind::Link(data)) = self
            .assets
            .iter_mut()
            .find(|a| a.id == link)
            .map(|a| &mut a.kind)
        {
            data.diameter = diameter;
        }
        self
    }

    pub fn build(self) -> HydraulicModel {
        HydraulicModel::from_assets(self.assets)
    }

    fn position_of(&self, id: AssetId) -> Option<Position> {
        self.assets
            .iter()
            .rev()
            .find(|a| a.id == id)
            .and_then(Asset::as_node)
            .map(|node| node.position)
    }
}
