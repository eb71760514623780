//! Phase D — spatial hierarchy build (spec §4.3).

use crate::value::parse_args;
use ifc_core::{EntityStore, RelKind, RelationshipGraph, SpatialHierarchy, TypeTag};

/// `Elevation` sits at a fixed slot in `IfcBuildingStorey`'s IFC4 attribute
/// order: GlobalId, OwnerHistory, Name, Description, ObjectType,
/// ObjectPlacement, Representation, LongName, CompositionType, Elevation.
const STOREY_ELEVATION_SLOT: usize = 9;

fn storey_elevation(data: &[u8], store: &EntityStore, express_id: u32) -> f64 {
    store
        .byte_range(express_id)
        .and_then(|(offset, len)| parse_args(&data[offset..offset + len]).ok())
        .and_then(|args| args.get(STOREY_ELEVATION_SLOT).and_then(|v| v.as_real()))
        .unwrap_or(0.0)
}

/// Recursively walk `Aggregates` edges from the unique `IfcProject` to build
/// the Project -> Site -> Building -> Storey tree.
pub fn build_spatial_hierarchy(data: &[u8], store: &EntityStore, graph: &RelationshipGraph) -> SpatialHierarchy {
    let mut hierarchy = SpatialHierarchy::new();

    let projects = store.get_by_type(TypeTag::Project);
    let Some(&project) = projects.first() else {
        return hierarchy;
    };
    hierarchy.set_project(project);

    for &site in graph.related(project, RelKind::Aggregates) {
        if store.type_tag(site) != TypeTag::Site {
            continue;
        }
        hierarchy.add_site(site);

        for &building in graph.related(site, RelKind::Aggregates) {
            if store.type_tag(building) != TypeTag::Building {
                continue;
            }
            hierarchy.add_building(site, building);

            for &storey in graph.related(building, RelKind::Aggregates) {
                if store.type_tag(storey) != TypeTag::BuildingStorey {
                    continue;
                }
                let elevation = storey_elevation(data, store, storey);
                hierarchy.add_storey(building, storey, elevation);
            }
        }
    }

    hierarchy.finalize_storey_heights();
    hierarchy
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_core::NewEntity;

    #[test]
    fn builds_project_to_storey_tree() {
        let mut store = EntityStore::new();
        let data = b"(#0,$,$,$,$,$,$,$,$,2.5)";
        for (id, tag) in [(1, TypeTag::Project), (2, TypeTag::Site), (3, TypeTag::Building), (4, TypeTag::BuildingStorey)] {
            store.push(NewEntity {
                express_id: id,
                type_tag: tag,
                byte_offset: 0,
                byte_len: data.len(),
                ..Default::default()
            });
        }

        let mut graph = RelationshipGraph::new();
        graph.add_edge(RelKind::Aggregates, 1, 2);
        graph.add_edge(RelKind::Aggregates, 2, 3);
        graph.add_edge(RelKind::Aggregates, 3, 4);

        let hierarchy = build_spatial_hierarchy(data, &store, &graph);
        assert_eq!(hierarchy.project, Some(1));
        assert_eq!(hierarchy.sites(), &[2]);
        assert_eq!(hierarchy.buildings_of(2), &[3]);
        assert_eq!(hierarchy.storeys_of(3)[0].elevation, 2.5);
    }

    #[test]
    fn no_project_yields_empty_hierarchy() {
        let store = EntityStore::new();
        let graph = RelationshipGraph::new();
        let hierarchy = build_spatial_hierarchy(b"", &store, &graph);
        assert_eq!(hierarchy.project, None);
        assert!(hierarchy.sites().is_empty());
    }
}
