//! Phase E — property and quantity materialization (spec §4.3).

use crate::value::{parse_args, Value};
use ifc_core::{
    EntityStore, Property, PropertySet, PropertyTable, PropertyValue, Quantity, QuantityKind, QuantitySet,
    QuantityTable, RelKind, RelationshipGraph, TypeTag,
};

fn attrs(data: &[u8], store: &EntityStore, express_id: u32) -> Option<Vec<Value>> {
    let (offset, len) = store.byte_range(express_id)?;
    parse_args(&data[offset..offset + len]).ok()
}

/// Resolve a `Value` wrapped in an IFC value-type tag (`IFCLABEL`, `IFCREAL`,
/// ...) into the tagged `PropertyValue` kinds of spec §3.
fn resolve_property_value(value: &Value) -> PropertyValue {
    match value {
        Value::Typed(tag, inner) => {
            let upper = tag.to_uppercase();
            match upper.as_str() {
                "IFCBOOLEAN" => PropertyValue::Boolean(inner.as_bool().unwrap_or(false)),
                "IFCLOGICAL" => PropertyValue::Logical(inner.as_bool()),
                "IFCLABEL" => PropertyValue::Label(inner.as_str().unwrap_or_default().to_string()),
                "IFCIDENTIFIER" => PropertyValue::Identifier(inner.as_str().unwrap_or_default().to_string()),
                "IFCTEXT" => PropertyValue::Text(inner.as_str().unwrap_or_default().to_string()),
                "IFCINTEGER" => match **inner {
                    Value::Int(i) => PropertyValue::Integer(i),
                    _ => PropertyValue::Integer(inner.as_real().unwrap_or_default() as i64),
                },
                _ if upper.starts_with("IFCREAL") || upper.ends_with("MEASURE") => {
                    PropertyValue::Real(inner.as_real().unwrap_or_default())
                }
                _ => resolve_property_value(inner),
            }
        }
        Value::Str(s) => PropertyValue::String(s.clone()),
        Value::Enum(e) => PropertyValue::Enum(e.clone()),
        Value::Int(i) => PropertyValue::Integer(*i),
        Value::Real(r) => PropertyValue::Real(*r),
        Value::Ref(r) => PropertyValue::Reference(*r),
        Value::List(items) => PropertyValue::List(items.iter().map(resolve_property_value).collect()),
        Value::Null | Value::Derived => PropertyValue::String(String::new()),
    }
}

fn build_property(data: &[u8], store: &EntityStore, express_id: u32) -> Option<Property> {
    let args = attrs(data, store, express_id)?;
    let name = args.first()?.as_str()?.to_string();
    let value = args.get(2).map(resolve_property_value).unwrap_or(PropertyValue::String(String::new()));
    let unit = args.get(3).and_then(Value::as_ref_id).map(|r| r.to_string());
    Some(Property { name, value, unit })
}

fn quantity_kind(type_tag: TypeTag) -> Option<QuantityKind> {
    match type_tag {
        TypeTag::QuantityLength => Some(QuantityKind::Length),
        TypeTag::QuantityArea => Some(QuantityKind::Area),
        TypeTag::QuantityVolume => Some(QuantityKind::Volume),
        TypeTag::QuantityCount => Some(QuantityKind::Count),
        TypeTag::QuantityWeight => Some(QuantityKind::Weight),
        _ => None,
    }
}

fn build_quantity(data: &[u8], store: &EntityStore, express_id: u32) -> Option<Quantity> {
    let kind = quantity_kind(store.type_tag(express_id))?;
    let args = attrs(data, store, express_id)?;
    let name = args.first()?.as_str()?.to_string();
    let value = args.get(3).and_then(Value::as_real).unwrap_or(0.0);
    Some(Quantity { name, kind, value })
}

/// Materialize every `IfcPropertySet`/`IfcElementQuantity` reachable via
/// `DefinesByProperties` edges into the Property/Quantity tables.
pub fn materialize_properties(
    data: &[u8],
    store: &EntityStore,
    graph: &RelationshipGraph,
) -> (PropertyTable, QuantityTable) {
    let mut properties = PropertyTable::new();
    let mut quantities = QuantityTable::new();

    for &express_id in &store.get_by_type(TypeTag::PropertySet).to_vec() {
        let Some(args) = attrs(data, store, express_id) else { continue };
        let Some(name) = args.first().and_then(Value::as_str) else { continue };
        let members = args.get(4).and_then(Value::as_list).map(|l| l.iter().filter_map(Value::as_ref_id).collect::<Vec<_>>()).unwrap_or_default();
        let props = members.iter().filter_map(|&m| build_property(data, store, m)).collect();

        let set = PropertySet {
            express_id,
            name: name.to_string(),
            properties: props,
        };
        let targets = graph.related(express_id, RelKind::DefinesByProperties).to_vec();
        properties.push(set, &targets);
    }

    for &express_id in &store.get_by_type(TypeTag::ElementQuantity).to_vec() {
        let Some(args) = attrs(data, store, express_id) else { continue };
        let Some(name) = args.first().and_then(Value::as_str) else { continue };
        let members = args.get(5).and_then(Value::as_list).map(|l| l.iter().filter_map(Value::as_ref_id).collect::<Vec<_>>()).unwrap_or_default();
        let qtys = members.iter().filter_map(|&m| build_quantity(data, store, m)).collect();

        let set = QuantitySet {
            express_id,
            name: name.to_string(),
            quantities: qtys,
        };
        let targets = graph.related(express_id, RelKind::DefinesByProperties).to_vec();
        quantities.push(set, &targets);
    }

    (properties, quantities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_core::NewEntity;

    #[test]
    fn materializes_pset_with_typed_members() {
        let pset_data: &[u8] = b"('Pset_WallCommon',$,$,$,(#2,#3))";
        let prop2: &[u8] = b"('IsExternal',$,IFCBOOLEAN(.T.),$)";
        let prop3: &[u8] = b"('FireRating',$,IFCLABEL('REI60'),$)";
        let full = [pset_data, prop2, prop3].concat();
        let off2 = pset_data.len();
        let off3 = off2 + prop2.len();

        let mut store = EntityStore::new();
        store.push(NewEntity { express_id: 1, type_tag: TypeTag::PropertySet, byte_offset: 0, byte_len: pset_data.len(), ..Default::default() });
        store.push(NewEntity { express_id: 2, type_tag: TypeTag::PropertySingleValue, byte_offset: off2, byte_len: prop2.len(), ..Default::default() });
        store.push(NewEntity { express_id: 3, type_tag: TypeTag::PropertySingleValue, byte_offset: off3, byte_len: prop3.len(), ..Default::default() });

        let mut graph = RelationshipGraph::new();
        graph.add_edge(RelKind::DefinesByProperties, 1, 20);

        let (properties, _) = materialize_properties(&full, &store, &graph);
        assert_eq!(properties.len(), 1);
        let set = properties.sets_for(20).next().unwrap();
        assert_eq!(set.name, "Pset_WallCommon");
        assert_eq!(set.properties.len(), 2);
        assert_eq!(set.properties[0].value, PropertyValue::Boolean(true));
        assert_eq!(set.properties[1].value, PropertyValue::Label("REI60".into()));
    }
}
