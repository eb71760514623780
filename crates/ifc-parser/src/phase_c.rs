//! Phase C — relationship wiring (spec §4.3).

use crate::value::{parse_args, Value};
use ifc_core::{flags, Diagnostic, EntityStore, RelKind, RelationshipGraph, TypeTag};

fn refs(v: Option<&Value>) -> Vec<u32> {
    match v {
        Some(Value::List(items)) => items.iter().filter_map(Value::as_ref_id).collect(),
        Some(other) => other.as_ref_id().into_iter().collect(),
        None => Vec::new(),
    }
}

fn one_ref(v: Option<&Value>) -> Option<u32> {
    v.and_then(Value::as_ref_id)
}

fn check_edge(store: &EntityStore, source: u32, target: u32, diagnostics: &mut Vec<Diagnostic>) {
    if !store.contains(target) {
        diagnostics.push(Diagnostic::DanglingReference {
            source_express_id: source,
            target_express_id: target,
        });
    }
}

/// Wire one `IfcRel*` entity's edges into the graph and update the
/// EntityStore's denormalized fields (`containedInStorey`, `definedByType`,
/// flags) per the table in spec §4.3 Phase C.
pub fn wire_relationship(
    data: &[u8],
    express_id: u32,
    type_tag: TypeTag,
    store: &mut EntityStore,
    graph: &mut RelationshipGraph,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some((offset, len)) = store.byte_range(express_id) else { return };
    let Ok(args) = parse_args(&data[offset..offset + len]) else { return };

    match type_tag {
        TypeTag::RelAggregates => {
            let Some(relating) = one_ref(args.get(4)) else { return };
            for related in refs(args.get(5)) {
                check_edge(store, express_id, related, diagnostics);
                graph.add_edge(RelKind::Aggregates, relating, related);
            }
        }
        TypeTag::RelContainedInSpatialStructure => {
            let Some(relating) = one_ref(args.get(5)) else { return };
            for related in refs(args.get(4)) {
                check_edge(store, express_id, related, diagnostics);
                graph.add_edge(RelKind::ContainsElements, relating, related);
                if store.type_tag(relating) == TypeTag::BuildingStorey {
                    store.set_contained_in_storey(related, relating);
                }
            }
        }
        TypeTag::RelDefinesByProperties => {
            let Some(relating) = one_ref(args.get(5)) else { return };
            let kind_flag = match store.type_tag(relating) {
                TypeTag::ElementQuantity => flags::HAS_QUANTITIES,
                _ => flags::HAS_PROPERTIES,
            };
            for related in refs(args.get(4)) {
                check_edge(store, express_id, related, diagnostics);
                graph.add_edge(RelKind::DefinesByProperties, relating, related);
                store.set_flag(related, kind_flag);
            }
        }
        TypeTag::RelDefinesByType => {
            let Some(relating) = one_ref(args.get(5)) else { return };
            for related in refs(args.get(4)) {
                check_edge(store, express_id, related, diagnostics);
                graph.add_edge(RelKind::DefinesByType, relating, related);
                store.set_defined_by_type(related, relating);
            }
        }
        TypeTag::RelVoidsElement => {
            let (Some(host), Some(opening)) = (one_ref(args.get(4)), one_ref(args.get(5))) else { return };
            check_edge(store, express_id, opening, diagnostics);
            graph.add_edge(RelKind::VoidsElement, host, opening);
            store.set_flag(host, flags::HAS_OPENINGS);
        }
        TypeTag::RelFillsElement => {
            let (Some(opening), Some(filling)) = (one_ref(args.get(4)), one_ref(args.get(5))) else { return };
            check_edge(store, express_id, filling, diagnostics);
            graph.add_edge(RelKind::FillsElement, opening, filling);
            store.set_flag(filling, flags::IS_FILLING);
        }
        TypeTag::RelAssociatesMaterial => {
            let Some(relating) = one_ref(args.get(5)) else { return };
            for related in refs(args.get(4)) {
                check_edge(store, express_id, related, diagnostics);
                graph.add_edge(RelKind::AssociatesMaterial, relating, related);
            }
        }
        TypeTag::RelAssociatesClassification => {
            let Some(relating) = one_ref(args.get(5)) else { return };
            for related in refs(args.get(4)) {
                check_edge(store, express_id, related, diagnostics);
                graph.add_edge(RelKind::AssociatesClassification, relating, related);
            }
        }
        TypeTag::RelConnectsPathElements => {
            let (Some(a), Some(b)) = (one_ref(args.get(5)), one_ref(args.get(6))) else { return };
            check_edge(store, express_id, b, diagnostics);
            graph.add_edge(RelKind::ConnectsPathElements, a, b);
        }
        TypeTag::RelSpaceBoundary => {
            let (Some(space), Some(element)) = (one_ref(args.get(4)), one_ref(args.get(5))) else { return };
            check_edge(store, express_id, element, diagnostics);
            graph.add_edge(RelKind::SpaceBoundary, space, element);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_core::NewEntity;

    fn push(store: &mut EntityStore, id: u32, tag: TypeTag, data: &[u8], args_offset: usize) {
        store.push(NewEntity {
            express_id: id,
            type_tag: tag,
            byte_offset: args_offset,
            byte_len: data.len() - args_offset,
            ..Default::default()
        });
    }

    #[test]
    fn contained_in_spatial_structure_sets_storey_and_edge() {
        let mut store = EntityStore::new();
        store.push(NewEntity { express_id: 10, type_tag: TypeTag::BuildingStorey, ..Default::default() });
        store.push(NewEntity { express_id: 20, type_tag: TypeTag::Wall, ..Default::default() });

        let data = b"(#0,$,$,$,(#20),#10)";
        push(&mut store, 1, TypeTag::RelContainedInSpatialStructure, data, 0);

        let mut graph = RelationshipGraph::new();
        let mut diags = Vec::new();
        wire_relationship(data, 1, TypeTag::RelContainedInSpatialStructure, &mut store, &mut graph, &mut diags);

        assert_eq!(graph.related(10, RelKind::ContainsElements), &[20]);
        assert_eq!(store.contained_in_storey(20), Some(10));
        assert!(diags.is_empty());
    }

    #[test]
    fn dangling_reference_is_recorded() {
        let mut store = EntityStore::new();
        store.push(NewEntity { express_id: 10, type_tag: TypeTag::BuildingStorey, ..Default::default() });

        let data = b"(#0,$,$,$,(#999),#10)";
        push(&mut store, 1, TypeTag::RelContainedInSpatialStructure, data, 0);

        let mut graph = RelationshipGraph::new();
        let mut diags = Vec::new();
        wire_relationship(data, 1, TypeTag::RelContainedInSpatialStructure, &mut store, &mut graph, &mut diags);

        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::DanglingReference { target_express_id: 999, .. }));
    }

    #[test]
    fn defines_by_properties_sets_quantity_flag_for_element_quantity() {
        let mut store = EntityStore::new();
        store.push(NewEntity { express_id: 30, type_tag: TypeTag::ElementQuantity, ..Default::default() });
        store.push(NewEntity { express_id: 20, type_tag: TypeTag::Wall, ..Default::default() });

        let data = b"(#0,$,$,$,(#20),#30)";
        push(&mut store, 1, TypeTag::RelDefinesByProperties, data, 0);

        let mut graph = RelationshipGraph::new();
        let mut diags = Vec::new();
        wire_relationship(data, 1, TypeTag::RelDefinesByProperties, &mut store, &mut graph, &mut diags);

        assert!(store.has_quantities(20));
        assert!(!store.has_properties(20));
    }
}
