//! Property / Quantity tables: columnar storage of Psets, Qsets, and
//! individual values, linked to entities via `DefinesByProperties` edges
//! (spec §3, §4.3 Phase E).

use serde::{Deserialize, Serialize};

/// A property value, tagged with the IFC value-type wrapper it was read
/// from (or will be written with): `IFCLABEL`, `IFCREAL`, ... (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Real(f64),
    Integer(i64),
    Boolean(bool),
    Logical(Option<bool>),
    Label(String),
    Identifier(String),
    Text(String),
    Enum(String),
    Reference(u32),
    List(Vec<PropertyValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    pub express_id: u32,
    pub name: String,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantityKind {
    Length,
    Area,
    Volume,
    Count,
    Weight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub name: String,
    pub kind: QuantityKind,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySet {
    pub express_id: u32,
    pub name: String,
    pub quantities: Vec<Quantity>,
}

/// Immutable after parse: psets/qsets are appended once during Phase E and
/// never mutated in place. New ones created by the edit layer or writer
/// live in their own `MutationView`/creator-session state, not here.
#[derive(Debug, Default)]
pub struct PropertyTable {
    sets: Vec<PropertySet>,
    by_target: rustc_hash::FxHashMap<u32, Vec<u32>>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, set: PropertySet, targets: &[u32]) -> u32 {
        let idx = self.sets.len() as u32;
        for &t in targets {
            self.by_target.entry(t).or_default().push(idx);
        }
        self.sets.push(set);
        idx
    }

    pub fn get(&self, idx: u32) -> Option<&PropertySet> {
        self.sets.get(idx as usize)
    }

    pub fn sets_for(&self, target_express_id: u32) -> impl Iterator<Item = &PropertySet> + '_ {
        self.by_target
            .get(&target_express_id)
            .into_iter()
            .flatten()
            .filter_map(move |&idx| self.get(idx))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct QuantityTable {
    sets: Vec<QuantitySet>,
    by_target: rustc_hash::FxHashMap<u32, Vec<u32>>,
}

impl QuantityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, set: QuantitySet, targets: &[u32]) -> u32 {
        let idx = self.sets.len() as u32;
        for &t in targets {
            self.by_target.entry(t).or_default().push(idx);
        }
        self.sets.push(set);
        idx
    }

    pub fn get(&self, idx: u32) -> Option<&QuantitySet> {
        self.sets.get(idx as usize)
    }

    pub fn sets_for(&self, target_express_id: u32) -> impl Iterator<Item = &QuantitySet> + '_ {
        self.by_target
            .get(&target_express_id)
            .into_iter()
            .flatten()
            .filter_map(move |&idx| self.get(idx))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pset_is_reachable_from_multiple_targets() {
        let mut table = PropertyTable::new();
        let pset = PropertySet {
            express_id: 42,
            name: "Pset_WallCommon".into(),
            properties: vec![Property {
                name: "FireRating".into(),
                value: PropertyValue::Label("F60".into()),
                unit: None,
            }],
        };
        table.push(pset, &[10, 11]);

        assert_eq!(table.sets_for(10).count(), 1);
        assert_eq!(table.sets_for(11).count(), 1);
        assert_eq!(table.sets_for(10).next().unwrap().name, "Pset_WallCommon");
        assert!(table.sets_for(999).next().is_none());
    }

    #[test]
    fn qset_stores_typed_quantities() {
        let mut table = QuantityTable::new();
        let qset = QuantitySet {
            express_id: 43,
            name: "Qto_WallBaseQuantities".into(),
            quantities: vec![Quantity {
                name: "NetVolume".into(),
                kind: QuantityKind::Volume,
                value: 1.5,
            }],
        };
        table.push(qset, &[10]);
        let found = table.sets_for(10).next().unwrap();
        assert_eq!(found.quantities[0].kind, QuantityKind::Volume);
    }
}
