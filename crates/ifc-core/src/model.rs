//! The `Model` aggregate: one parsed IFC file's worth of state (spec §3).

use crate::geometry::GeometryStore;
use crate::graph::RelationshipGraph;
use crate::properties::{PropertyTable, QuantityTable};
use crate::spatial::SpatialHierarchy;
use crate::store::EntityStore;
use crate::types::SchemaVersion;
use rustc_hash::FxHashMap;

/// Eagerly decoded `ObjectPlacement`/`Representation`/`Tag` slots for a
/// product-like entity, captured during Phase B so the Edit Layer's
/// navigation step (spec §4.5) doesn't need to re-tokenize the product's
/// own attribute list just to find its representation ref.
#[derive(Debug, Clone, Default)]
pub struct ProductSlots {
    pub object_placement: Option<u32>,
    pub representation: Option<u32>,
    pub tag: Option<String>,
}

/// Owns one EntityStore, one SpatialHierarchy, one PropertyTable, one
/// QuantityTable, one RelationshipGraph, plus the source bytes the
/// EntityStore's byte-offset slices borrow from (spec §3, §9 "Byte-offset
/// references": the source buffer must outlive the Model).
pub struct Model {
    pub id: String,
    pub name: String,
    pub schema_version: SchemaVersion,
    /// Offset applied to every expressId when this model is merged into a
    /// federated session (spec §4.7 federation/merge).
    pub id_offset: u32,
    pub max_express_id: u32,
    pub visible: bool,

    pub source: Vec<u8>,
    pub entities: EntityStore,
    pub spatial: SpatialHierarchy,
    pub properties: PropertyTable,
    pub quantities: QuantityTable,
    pub relationships: RelationshipGraph,
    pub geometry: GeometryStore,
    pub product_slots: FxHashMap<u32, ProductSlots>,
}

impl Model {
    pub fn new(id: impl Into<String>, name: impl Into<String>, schema_version: SchemaVersion, source: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schema_version,
            id_offset: 0,
            max_express_id: 0,
            visible: true,
            source,
            entities: EntityStore::new(),
            spatial: SpatialHierarchy::new(),
            properties: PropertyTable::new(),
            quantities: QuantityTable::new(),
            relationships: RelationshipGraph::new(),
            geometry: GeometryStore::new(),
            product_slots: FxHashMap::default(),
        }
    }

    pub fn object_placement(&self, express_id: u32) -> Option<u32> {
        self.product_slots.get(&express_id).and_then(|s| s.object_placement)
    }

    pub fn representation(&self, express_id: u32) -> Option<u32> {
        self.product_slots.get(&express_id).and_then(|s| s.representation)
    }

    /// Slice of source bytes backing an entity's attribute list, for lazy
    /// decoding by the Edit Layer and Writer (spec §9 "Byte-offset
    /// references").
    pub fn raw_attributes(&self, express_id: u32) -> Option<&[u8]> {
        let (offset, len) = self.entities.byte_range(express_id)?;
        self.source.get(offset..offset + len)
    }

    pub fn finalize(&mut self) {
        self.entities.freeze();
        self.spatial.finalize_storey_heights();
        self.max_express_id = self.entities.max_express_id();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewEntity;
    use crate::types::TypeTag;

    #[test]
    fn raw_attributes_slices_source_bytes() {
        let source = b"#1=IFCWALL('abc',$,$,$);".to_vec();
        let attrs_offset = source.iter().position(|&b| b == b'(').unwrap();
        let attrs_len = source.len() - attrs_offset;
        let mut model = Model::new("m1", "test", SchemaVersion::Ifc4, source.clone());
        model.entities.push(NewEntity {
            express_id: 1,
            type_tag: TypeTag::Wall,
            byte_offset: attrs_offset,
            byte_len: attrs_len,
            ..Default::default()
        });
        model.finalize();
        assert_eq!(model.raw_attributes(1).unwrap(), &source[attrs_offset..]);
        assert_eq!(model.max_express_id, 1);
    }

    #[test]
    fn unknown_express_id_has_no_raw_attributes() {
        let model = Model::new("m1", "test", SchemaVersion::Ifc4, Vec::new());
        assert!(model.raw_attributes(999).is_none());
    }
}
