//! Parametric Edit Layer: navigate a product's representation graph to a
//! recognized parametric item and expose its parameters as a constrained,
//! mutable roster.
//!
//! Grounded in `cadhy-ifc::geometry::GeometryExtractor`'s representation
//! walk (`extract_representation` -> `extract_shape_representation` ->
//! `extract_representation_item`), generalized from "build a renderable
//! mesh" to "find and mutate a named parameter roster," and in
//! `cadhy-mesh::params::MeshParamsBuilder`'s validate-then-clamp builder
//! for the constraint logic below.

use ifc_core::{parse_args, CoreError, CoreResult, Model, TypeTag, Value};
use serde::{Deserialize, Serialize};

/// A single editable knob on a parametric representation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryParameter {
    pub path: String,
    pub value: ParamValue,
    pub constraint: Constraint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f64),
    Vec3([f64; 3]),
    Points(Vec<[f64; 2]>),
}

/// Constraints a mutation is checked and clamped against (spec §4.5
/// "pre-validation"; out-of-range edits are rejected, not clamped).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// Value must stay above `min` after clamping.
    MinValue(f64),
    /// No numeric bound; e.g. a direction vector.
    None,
}

impl Constraint {
    pub fn is_satisfied(self, value: f64) -> bool {
        match self {
            Constraint::MinValue(min) => value > min,
            Constraint::None => true,
        }
    }
}

/// Minimum edge length enforced wherever spec.md leaves the bound
/// unspecified ("> 0.001"). Shared with the Mesh Editor's collapse guard.
pub const MIN_EDGE_LENGTH: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct ParameterRoster {
    pub entity_id: u32,
    pub item_type: TypeTag,
    pub parameters: Vec<GeometryParameter>,
}

/// Outcome of navigating from a product to its editable surface (spec
/// §4.5 "Navigation").
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum EditTarget {
    Parametric(ParameterRoster),
    /// No recognized parametric item; direct vertex/face manipulation only.
    MeshEditMode,
    NoEditMode,
}

const BODY_REPRESENTATION_TYPES: [&str; 5] = ["BODY", "SWEPTSOLID", "BREP", "CLIPPING", "TESSELLATION"];

fn is_recognized_parametric(tag: TypeTag) -> bool {
    matches!(
        tag,
        TypeTag::ExtrudedAreaSolid
            | TypeTag::RectangleProfileDef
            | TypeTag::CircleProfileDef
            | TypeTag::EllipseProfileDef
            | TypeTag::IShapeProfileDef
            | TypeTag::ArbitraryClosedProfileDef
            | TypeTag::BooleanClippingResult
    )
}

fn attrs_of(model: &Model, express_id: u32) -> Option<Vec<Value>> {
    parse_args(model.raw_attributes(express_id)?).ok()
}

/// Navigate from a product `expressId` to its editable parametric item, or
/// fall back to mesh-edit/no-edit mode (spec §4.5 steps 1-4).
pub fn navigate(model: &Model, express_id: u32) -> EditTarget {
    let start_tag = model.entities.type_tag(express_id);
    if is_recognized_parametric(start_tag) || start_tag == TypeTag::BooleanResult {
        return classify_item(model, express_id, start_tag).unwrap_or(EditTarget::NoEditMode);
    }

    let Some(shape_ref) = model.representation(express_id) else {
        return EditTarget::MeshEditMode;
    };
    let Some(shape_attrs) = attrs_of(model, shape_ref) else {
        return EditTarget::MeshEditMode;
    };
    if model.entities.type_tag(shape_ref) != TypeTag::ProductDefinitionShape {
        return EditTarget::MeshEditMode;
    }

    // IfcProductDefinitionShape: Name, Description, Representations.
    let reps = shape_attrs.get(2).and_then(Value::as_list).map(<[Value]>::to_vec).unwrap_or_default();

    for rep in &reps {
        let Some(rep_id) = rep.as_ref_id() else { continue };
        if let Some(target) = find_parametric_in_shape_representation(model, rep_id) {
            return target;
        }
    }

    EditTarget::MeshEditMode
}

fn find_parametric_in_shape_representation(model: &Model, rep_id: u32) -> Option<EditTarget> {
    if model.entities.type_tag(rep_id) != TypeTag::ShapeRepresentation {
        return None;
    }
    let attrs = attrs_of(model, rep_id)?;

    // IfcShapeRepresentation: ContextOfItems, RepresentationIdentifier,
    // RepresentationType, Items.
    let identifier = attrs.get(1).and_then(Value::as_str).map(str::to_uppercase);
    let rep_type = attrs.get(2).and_then(Value::as_str).map(str::to_uppercase);
    let is_body = identifier.as_deref().is_some_and(|s| BODY_REPRESENTATION_TYPES.contains(&s))
        || rep_type.as_deref().is_some_and(|s| BODY_REPRESENTATION_TYPES.contains(&s));
    if !is_body {
        return None;
    }

    let items = attrs.get(3).and_then(Value::as_list)?;
    for item in items {
        let item_id = item.as_ref_id()?;
        let item_tag = model.entities.type_tag(item_id);
        if let Some(target) = classify_item(model, item_id, item_tag) {
            return Some(target);
        }
    }
    None
}

fn classify_item(model: &Model, express_id: u32, tag: TypeTag) -> Option<EditTarget> {
    match tag {
        TypeTag::ExtrudedAreaSolid => roster_extruded_area_solid(model, express_id).map(EditTarget::Parametric),
        TypeTag::RectangleProfileDef => roster_rectangle_profile(model, express_id).map(EditTarget::Parametric),
        TypeTag::CircleProfileDef => roster_circle_profile(model, express_id).map(EditTarget::Parametric),
        TypeTag::EllipseProfileDef => roster_ellipse_profile(model, express_id).map(EditTarget::Parametric),
        TypeTag::IShapeProfileDef => roster_ishape_profile(model, express_id).map(EditTarget::Parametric),
        TypeTag::ArbitraryClosedProfileDef => roster_arbitrary_profile(model, express_id).map(EditTarget::Parametric),
        TypeTag::BooleanClippingResult => roster_boolean_clipping(model, express_id).map(EditTarget::Parametric),
        TypeTag::BooleanResult => {
            // Not itself a recognized parametric type: descend into the
            // first operand (spec §4.5 step 3, "recurse into FirstOperand").
            let attrs = attrs_of(model, express_id)?;
            let first_operand = attrs.get(1).and_then(Value::as_ref_id)?;
            classify_item(model, first_operand, model.entities.type_tag(first_operand))
        }
        _ => None,
    }
}

fn direction_of(model: &Model, dir_id: u32) -> [f64; 3] {
    let mut out = [0.0, 0.0, 1.0];
    if let Some(attrs) = attrs_of(model, dir_id) {
        if let Some(ratios) = attrs.first().and_then(Value::as_list) {
            for (i, r) in ratios.iter().take(3).enumerate() {
                if let Some(v) = r.as_real() {
                    out[i] = v;
                }
            }
        }
    }
    out
}

fn point_of(model: &Model, point_id: u32) -> [f64; 3] {
    let mut out = [0.0, 0.0, 0.0];
    if let Some(attrs) = attrs_of(model, point_id) {
        if let Some(coords) = attrs.first().and_then(Value::as_list) {
            for (i, c) in coords.iter().take(3).enumerate() {
                if let Some(v) = c.as_real() {
                    out[i] = v;
                }
            }
        }
    }
    out
}

/// `IfcExtrudedAreaSolid`: SweptArea, Position, ExtrudedDirection, Depth.
fn roster_extruded_area_solid(model: &Model, express_id: u32) -> Option<ParameterRoster> {
    let attrs = attrs_of(model, express_id)?;
    let depth = attrs.get(3).and_then(Value::as_real)?;
    let dir_id = attrs.get(2).and_then(Value::as_ref_id);
    let direction = dir_id.map(|id| direction_of(model, id)).unwrap_or([0.0, 0.0, 1.0]);

    let mut parameters = vec![
        GeometryParameter {
            path: "Depth".into(),
            value: ParamValue::Number(depth),
            constraint: Constraint::MinValue(MIN_EDGE_LENGTH),
        },
        GeometryParameter {
            path: "ExtrudedDirection".into(),
            value: ParamValue::Vec3(direction),
            constraint: Constraint::None,
        },
    ];

    if let Some(profile_id) = attrs.first().and_then(Value::as_ref_id) {
        if let Some(EditTarget::Parametric(inner)) = classify_item(model, profile_id, model.entities.type_tag(profile_id)) {
            parameters.extend(inner.parameters.into_iter().map(|mut p| {
                p.path = format!("SweptArea.{}", p.path);
                p
            }));
        }
    }

    Some(ParameterRoster { entity_id: express_id, item_type: TypeTag::ExtrudedAreaSolid, parameters })
}

/// `IfcRectangleProfileDef`: ProfileType, ProfileName, Position, XDim, YDim.
fn roster_rectangle_profile(model: &Model, express_id: u32) -> Option<ParameterRoster> {
    let attrs = attrs_of(model, express_id)?;
    let x_dim = attrs.get(3).and_then(Value::as_real)?;
    let y_dim = attrs.get(4).and_then(Value::as_real)?;
    Some(ParameterRoster {
        entity_id: express_id,
        item_type: TypeTag::RectangleProfileDef,
        parameters: vec![
            GeometryParameter { path: "XDim".into(), value: ParamValue::Number(x_dim), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
            GeometryParameter { path: "YDim".into(), value: ParamValue::Number(y_dim), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
        ],
    })
}

/// `IfcCircleProfileDef`: ProfileType, ProfileName, Position, Radius.
fn roster_circle_profile(model: &Model, express_id: u32) -> Option<ParameterRoster> {
    let attrs = attrs_of(model, express_id)?;
    let radius = attrs.get(3).and_then(Value::as_real)?;
    Some(ParameterRoster {
        entity_id: express_id,
        item_type: TypeTag::CircleProfileDef,
        parameters: vec![GeometryParameter {
            path: "Radius".into(),
            value: ParamValue::Number(radius),
            constraint: Constraint::MinValue(MIN_EDGE_LENGTH),
        }],
    })
}

/// `IfcEllipseProfileDef`: ProfileType, ProfileName, Position, SemiAxis1, SemiAxis2.
fn roster_ellipse_profile(model: &Model, express_id: u32) -> Option<ParameterRoster> {
    let attrs = attrs_of(model, express_id)?;
    let a = attrs.get(3).and_then(Value::as_real)?;
    let b = attrs.get(4).and_then(Value::as_real)?;
    Some(ParameterRoster {
        entity_id: express_id,
        item_type: TypeTag::EllipseProfileDef,
        parameters: vec![
            GeometryParameter { path: "SemiAxis1".into(), value: ParamValue::Number(a), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
            GeometryParameter { path: "SemiAxis2".into(), value: ParamValue::Number(b), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
        ],
    })
}

/// `IfcIShapeProfileDef`: ProfileType, ProfileName, Position, OverallWidth,
/// OverallDepth, WebThickness, FlangeThickness, ...
fn roster_ishape_profile(model: &Model, express_id: u32) -> Option<ParameterRoster> {
    let attrs = attrs_of(model, express_id)?;
    let width = attrs.get(3).and_then(Value::as_real)?;
    let depth = attrs.get(4).and_then(Value::as_real)?;
    let web = attrs.get(5).and_then(Value::as_real)?;
    let flange = attrs.get(6).and_then(Value::as_real)?;
    Some(ParameterRoster {
        entity_id: express_id,
        item_type: TypeTag::IShapeProfileDef,
        parameters: vec![
            GeometryParameter { path: "OverallWidth".into(), value: ParamValue::Number(width), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
            GeometryParameter { path: "OverallDepth".into(), value: ParamValue::Number(depth), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
            GeometryParameter { path: "WebThickness".into(), value: ParamValue::Number(web), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
            GeometryParameter { path: "FlangeThickness".into(), value: ParamValue::Number(flange), constraint: Constraint::MinValue(MIN_EDGE_LENGTH) },
        ],
    })
}

/// `IfcArbitraryClosedProfileDef`: ProfileType, ProfileName, OuterCurve.
/// OuterCurve is an `IfcPolyline` of `IfcCartesianPoint`s (2D).
fn roster_arbitrary_profile(model: &Model, express_id: u32) -> Option<ParameterRoster> {
    let attrs = attrs_of(model, express_id)?;
    let curve_id = attrs.get(2).and_then(Value::as_ref_id)?;
    let curve_attrs = attrs_of(model, curve_id)?;
    let point_refs = curve_attrs.first().and_then(Value::as_list)?;

    let points: Vec<[f64; 2]> = point_refs
        .iter()
        .filter_map(Value::as_ref_id)
        .map(|pid| {
            let p = point_of(model, pid);
            [p[0], p[1]]
        })
        .collect();

    Some(ParameterRoster {
        entity_id: express_id,
        item_type: TypeTag::ArbitraryClosedProfileDef,
        parameters: vec![GeometryParameter {
            path: "OuterCurve".into(),
            value: ParamValue::Points(points),
            constraint: Constraint::None,
        }],
    })
}

/// `IfcBooleanClippingResult` with a half-space second operand: expose the
/// clipping plane's Location and Axis (spec §4.5 table, last row).
fn roster_boolean_clipping(model: &Model, express_id: u32) -> Option<ParameterRoster> {
    let attrs = attrs_of(model, express_id)?;
    // IfcBooleanClippingResult(Operator, FirstOperand, SecondOperand).
    let second_operand = attrs.get(2).and_then(Value::as_ref_id)?;
    let half_space_attrs = attrs_of(model, second_operand)?;
    // IfcHalfSpaceSolid: BaseSurface, AgreementFlag.
    let surface_id = half_space_attrs.first().and_then(Value::as_ref_id)?;
    let surface_attrs = attrs_of(model, surface_id)?;
    // IfcPlane: Position.
    let position_id = surface_attrs.first().and_then(Value::as_ref_id)?;
    let position_attrs = attrs_of(model, position_id)?;
    // IfcAxis2Placement3D: Location, Axis, RefDirection.
    let location_id = position_attrs.first().and_then(Value::as_ref_id)?;
    let axis_id = position_attrs.get(1).and_then(Value::as_ref_id);

    let location = point_of(model, location_id);
    let axis = axis_id.map(|id| direction_of(model, id)).unwrap_or([0.0, 0.0, 1.0]);

    Some(ParameterRoster {
        entity_id: express_id,
        item_type: TypeTag::BooleanClippingResult,
        parameters: vec![
            GeometryParameter { path: "SecondOperand.BaseSurface.Position.Location".into(), value: ParamValue::Vec3(location), constraint: Constraint::None },
            GeometryParameter { path: "SecondOperand.BaseSurface.Position.Axis".into(), value: ParamValue::Vec3(axis), constraint: Constraint::None },
        ],
    })
}

/// One applied parameter change, reversible via `old_value` (spec §4.5
/// "Editing": `GeometryMutation { modelId, entityId, parameterPath,
/// oldValue, newValue }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryMutation {
    pub model_id: String,
    pub entity_id: u32,
    pub parameter_path: String,
    pub old_value: ParamValue,
    pub new_value: ParamValue,
}

/// Accumulates mutations for a session; never rebuilds meshes itself (spec
/// §4.5: "a co-located geometry engine consumes the updated parameters").
#[derive(Debug, Default)]
pub struct MutationView {
    mutations: Vec<GeometryMutation>,
}

impl MutationView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `requested` against `param`'s constraint and record a
    /// reversible mutation. An edit that falls outside the declared
    /// constraint is rejected outright (spec §7 kind 4): `MutationView` is
    /// left unchanged and the caller gets back the violated parameter and
    /// reason.
    pub fn apply(&mut self, model_id: impl Into<String>, entity_id: u32, param: &GeometryParameter, requested: ParamValue) -> CoreResult<()> {
        let new_value = match (&param.value, requested) {
            (ParamValue::Number(_), ParamValue::Number(n)) => {
                if !param.constraint.is_satisfied(n) {
                    tracing::warn!(parameter = %param.path, value = n, "rejected out-of-range parameter edit");
                    return Err(CoreError::ConstraintViolation {
                        parameter: param.path.clone(),
                        reason: format!("{n} does not satisfy {:?}", param.constraint),
                    });
                }
                ParamValue::Number(n)
            }
            (ParamValue::Vec3(_), ParamValue::Vec3(v)) => ParamValue::Vec3(v),
            (ParamValue::Points(_), ParamValue::Points(pts)) => {
                if pts.len() < 3 {
                    return Err(CoreError::ConstraintViolation {
                        parameter: param.path.clone(),
                        reason: "a closed profile needs at least 3 points".into(),
                    });
                }
                ParamValue::Points(pts)
            }
            _ => {
                return Err(CoreError::ConstraintViolation {
                    parameter: param.path.clone(),
                    reason: "type mismatch on mutation".into(),
                })
            }
        };

        tracing::debug!(parameter = %param.path, entity_id, "applied parameter edit");
        self.mutations.push(GeometryMutation {
            model_id: model_id.into(),
            entity_id,
            parameter_path: param.path.clone(),
            old_value: param.value.clone(),
            new_value,
        });
        Ok(())
    }

    pub fn mutations(&self) -> &[GeometryMutation] {
        &self.mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_core::NewEntity;

    fn push(model: &mut Model, id: u32, tag: TypeTag, bytes: &[u8], full: &mut Vec<u8>) {
        let offset = full.len();
        full.extend_from_slice(bytes);
        model.entities.push(NewEntity { express_id: id, type_tag: tag, byte_offset: offset, byte_len: bytes.len(), ..Default::default() });
    }

    fn wall_with_extruded_box(depth: f64) -> Model {
        let mut source = Vec::new();
        let mut model = Model::new("m1", "t", ifc_core::SchemaVersion::Ifc4, Vec::new());

        push(&mut model, 1, TypeTag::Wall, b"('g',$,'W',$,$,#2,#3,'T')", &mut source);
        push(&mut model, 2, TypeTag::LocalPlacement, b"($,$)", &mut source);
        push(&mut model, 3, TypeTag::ProductDefinitionShape, b"($,$,(#4))", &mut source);
        push(&mut model, 4, TypeTag::ShapeRepresentation, b"(#0,'Body','SweptSolid',(#5))", &mut source);
        push(&mut model, 5, TypeTag::ExtrudedAreaSolid, format!("(#6,#0,#7,{depth})").as_bytes(), &mut source);
        push(&mut model, 6, TypeTag::RectangleProfileDef, b"(.AREA.,$,#0,2.,0.3)", &mut source);
        push(&mut model, 7, TypeTag::Direction, b"((0.,0.,1.))", &mut source);

        model.source = source;
        model.product_slots.insert(1, ifc_core::ProductSlots { object_placement: Some(2), representation: Some(3), tag: Some("T".into()) });
        model
    }

    #[test]
    fn navigates_wall_to_extruded_area_solid_with_nested_profile() {
        let model = wall_with_extruded_box(2.5);
        match navigate(&model, 1) {
            EditTarget::Parametric(roster) => {
                assert_eq!(roster.entity_id, 5);
                assert_eq!(roster.item_type, TypeTag::ExtrudedAreaSolid);
                let depth = roster.parameters.iter().find(|p| p.path == "Depth").unwrap();
                assert_eq!(depth.value, ParamValue::Number(2.5));
                let xdim = roster.parameters.iter().find(|p| p.path == "SweptArea.XDim").unwrap();
                assert_eq!(xdim.value, ParamValue::Number(2.0));
            }
            other => panic!("expected Parametric target, got {other:?}"),
        }
    }

    #[test]
    fn product_without_representation_is_mesh_edit_mode() {
        let mut model = Model::new("m1", "t", ifc_core::SchemaVersion::Ifc4, Vec::new());
        model.entities.push(NewEntity { express_id: 1, type_tag: TypeTag::Wall, ..Default::default() });
        assert!(matches!(navigate(&model, 1), EditTarget::MeshEditMode));
    }

    #[test]
    fn mutation_below_min_edge_length_is_rejected_and_view_is_unchanged() {
        let model = wall_with_extruded_box(2.5);
        let EditTarget::Parametric(roster) = navigate(&model, 1) else { panic!("expected parametric") };
        let depth_param = roster.parameters.iter().find(|p| p.path == "Depth").unwrap();

        let mut view = MutationView::new();
        let result = view.apply("m1", roster.entity_id, depth_param, ParamValue::Number(0.0005));

        assert!(matches!(result, Err(ifc_core::CoreError::ConstraintViolation { .. })));
        assert!(view.mutations().is_empty(), "a rejected edit must not be recorded");
    }

    #[test]
    fn mutation_within_constraint_is_accepted() {
        let model = wall_with_extruded_box(2.5);
        let EditTarget::Parametric(roster) = navigate(&model, 1) else { panic!("expected parametric") };
        let depth_param = roster.parameters.iter().find(|p| p.path == "Depth").unwrap();

        let mut view = MutationView::new();
        view.apply("m1", roster.entity_id, depth_param, ParamValue::Number(3.0)).unwrap();

        let mutation = &view.mutations()[0];
        assert_eq!(mutation.new_value, ParamValue::Number(3.0));
        assert_eq!(mutation.old_value, ParamValue::Number(2.5));
    }

    #[test]
    fn mutation_rejects_type_mismatch() {
        let model = wall_with_extruded_box(2.5);
        let EditTarget::Parametric(roster) = navigate(&model, 1) else { panic!("expected parametric") };
        let depth_param = roster.parameters.iter().find(|p| p.path == "Depth").unwrap();

        let mut view = MutationView::new();
        let result = view.apply("m1", roster.entity_id, depth_param, ParamValue::Vec3([1.0, 0.0, 0.0]));
        assert!(result.is_err());
    }
}
