//! Relationship graph: directed, labeled edges with precomputed inverses
//! (spec §4.4).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The `IfcRel*` entities the graph understands, each carrying a fixed
/// forward direction (relating -> related) that the inverse direction walks
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelKind {
    Aggregates,
    ContainsElements,
    DefinesByProperties,
    DefinesByType,
    VoidsElement,
    FillsElement,
    AssociatesMaterial,
    AssociatesClassification,
    ConnectsPathElements,
    SpaceBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

type RelKindKey = u8;

fn key(kind: RelKind) -> RelKindKey {
    kind as u8 as RelKindKey
}

#[derive(Debug, Default)]
pub struct RelationshipGraph {
    forward: FxHashMap<(u32, RelKindKey), Vec<u32>>,
    inverse: FxHashMap<(u32, RelKindKey), Vec<u32>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `relating -> related` edge plus its precomputed inverse.
    pub fn add_edge(&mut self, kind: RelKind, relating: u32, related: u32) {
        self.forward
            .entry((relating, key(kind)))
            .or_default()
            .push(related);
        self.inverse
            .entry((related, key(kind)))
            .or_default()
            .push(relating);
    }

    /// `neighbors(entity, kind, direction) -> expressId[]` per spec §4.4.
    pub fn neighbors(&self, express_id: u32, kind: RelKind, direction: Direction) -> &[u32] {
        let table = match direction {
            Direction::Forward => &self.forward,
            Direction::Inverse => &self.inverse,
        };
        table.get(&(express_id, key(kind))).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entities this entity relates to via `kind` (forward direction).
    pub fn related(&self, express_id: u32, kind: RelKind) -> &[u32] {
        self.neighbors(express_id, kind, Direction::Forward)
    }

    /// Entities that relate to this entity via `kind` (inverse direction).
    pub fn relating(&self, express_id: u32, kind: RelKind) -> &[u32] {
        self.neighbors(express_id, kind, Direction::Inverse)
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_inverse_agree() {
        let mut g = RelationshipGraph::new();
        g.add_edge(RelKind::ContainsElements, 10, 20);
        g.add_edge(RelKind::ContainsElements, 10, 21);

        assert_eq!(g.related(10, RelKind::ContainsElements), &[20, 21]);
        assert_eq!(g.relating(20, RelKind::ContainsElements), &[10]);
        assert_eq!(g.relating(21, RelKind::ContainsElements), &[10]);
        assert!(g.related(20, RelKind::ContainsElements).is_empty());
        assert_eq!(
            g.neighbors(10, RelKind::ContainsElements, Direction::Forward),
            &[20, 21]
        );
    }

    #[test]
    fn unknown_id_yields_empty_slice() {
        let g = RelationshipGraph::new();
        assert!(g.related(1, RelKind::Aggregates).is_empty());
        assert_eq!(g.edge_count(), 0);
    }
}
