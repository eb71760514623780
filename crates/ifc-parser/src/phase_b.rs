//! Phase B — entity discovery (spec §4.3).

use crate::scan::EntityStatements;
use crate::value::{parse_args, Value};
use ifc_core::{Diagnostic, EntityStore, NewEntity, ProductSlots, TypeTag};
use rustc_hash::FxHashMap;

/// IFC4-order attribute prefix shared by `IfcRoot`/`IfcObject`/`IfcProduct`/
/// `IfcElement`: GlobalId, OwnerHistory, Name, Description, ObjectType,
/// ObjectPlacement, Representation, Tag. Spatial roots (Project/Site/
/// Building/Storey) share the first five slots but diverge after, so only
/// those five are read uniformly; ObjectPlacement/Representation/Tag are
/// read only for non-spatial product-like entities.
pub struct Discovery {
    pub max_express_id: u32,
    pub product_slots: FxHashMap<u32, ProductSlots>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn discover_entities(data: &[u8], store: &mut EntityStore) -> Discovery {
    let mut max_express_id = 0u32;
    let mut product_slots = FxHashMap::default();
    let mut diagnostics = Vec::new();

    for stmt in EntityStatements::new(data) {
        max_express_id = max_express_id.max(stmt.express_id);
        let type_tag = TypeTag::from_name(stmt.type_name);
        let args_bytes = &data[stmt.args_offset..stmt.args_offset + stmt.args_len];

        let mut new_entity = NewEntity {
            express_id: stmt.express_id,
            type_tag,
            byte_offset: stmt.args_offset,
            byte_len: stmt.args_len,
            ..Default::default()
        };

        if type_tag.is_product_like() || type_tag.is_spatial() {
            match parse_args(args_bytes) {
                Ok(args) => {
                    new_entity.global_id = args.first().and_then(Value::as_str).map(str::to_string);
                    new_entity.name = args.get(2).and_then(Value::as_str).map(str::to_string);
                    new_entity.description = args.get(3).and_then(Value::as_str).map(str::to_string);
                    new_entity.object_type = args.get(4).and_then(Value::as_str).map(str::to_string);

                    if type_tag.is_product_like() && !type_tag.is_spatial() {
                        product_slots.insert(
                            stmt.express_id,
                            ProductSlots {
                                object_placement: args.get(5).and_then(Value::as_ref_id),
                                representation: args.get(6).and_then(Value::as_ref_id),
                                tag: args.get(7).and_then(Value::as_str).map(str::to_string),
                            },
                        );
                    }
                }
                Err(e) => {
                    diagnostics.push(Diagnostic::MalformedEntity {
                        express_id: stmt.express_id,
                        byte_offset: stmt.args_offset,
                        reason: e.to_string(),
                    });
                }
            }
        }

        store.push(new_entity);
    }

    Discovery {
        max_express_id,
        product_slots,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_product_and_eager_slots() {
        let data = b"#1=IFCWALL('0$WU4A9R19$vKWO$AdOnAA',$,'Wall-01','A basic wall',$,#5,#9,'W-01');\n";
        let mut store = EntityStore::new();
        let result = discover_entities(data, &mut store);
        store.freeze();

        assert_eq!(result.max_express_id, 1);
        assert_eq!(store.get_name(1), "Wall-01");
        assert_eq!(store.get_description(1), "A basic wall");
        assert_eq!(store.get_global_id(1), "0$WU4A9R19$vKWO$AdOnAA");

        let slots = result.product_slots.get(&1).unwrap();
        assert_eq!(slots.object_placement, Some(5));
        assert_eq!(slots.representation, Some(9));
        assert_eq!(slots.tag.as_deref(), Some("W-01"));
    }

    #[test]
    fn unknown_type_keeps_byte_range_without_diagnostic() {
        let data = b"#1=IFCCUSTOMTHING(1,2,3);\n";
        let mut store = EntityStore::new();
        let result = discover_entities(data, &mut store);
        store.freeze();
        assert_eq!(store.type_tag(1), TypeTag::Unknown);
        assert!(result.diagnostics.is_empty());
        assert!(store.byte_range(1).is_some());
    }

    #[test]
    fn malformed_eager_entity_is_recorded_as_diagnostic_not_abort() {
        // Missing closing ')' on entity 1's argument list: the statement
        // boundary scanner (quote-aware, paren-agnostic) still finds the
        // terminating ';' correctly; only the deeper attribute parse fails.
        let data = b"#1=IFCWALL('ok',$,$,$;\n#2=IFCSLAB('ok',$,$,$);\n";
        let mut store = EntityStore::new();
        let result = discover_entities(data, &mut store);
        store.freeze();
        assert_eq!(store.len(), 2, "malformed entity does not abort the scan");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(store.get_global_id(2), "ok");
        assert_eq!(store.get_name(2), "", "Name is unset ($) and must not alias the GlobalId");
    }
}
