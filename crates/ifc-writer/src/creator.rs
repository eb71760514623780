//! STEP Creator path (spec §4.7): header, preamble, per-element placement/
//! profile/extrusion rules, property/quantity sets, styling, materials, and
//! finalization. Grounded in `cadhy_ifc::exporter::IfcExporter`'s entity-
//! emission order and `#{id}=TYPE(args);` string-building style, generalized
//! from its one hardcoded "hydraulic channel" element to the full element
//! table.

use std::collections::HashMap;
use std::collections::HashSet;

use ifc_core::properties::{PropertyValue, QuantityKind};
use ifc_core::{CoreError, CoreResult, SchemaVersion};

use crate::format;
use crate::ids::{new_unique_global_id, IdAllocator};

const GLOBAL_ID_RETRY_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone)]
pub struct CreatorOptions {
    pub project_name: String,
    pub description: String,
    pub author: String,
    pub organization: String,
    pub application: String,
    pub schema: SchemaVersion,
    /// Length unit uses SI metre (false) or milli-prefixed metre (true).
    pub length_in_millimeters: bool,
}

impl Default for CreatorOptions {
    fn default() -> Self {
        Self {
            project_name: "Untitled Project".into(),
            description: "IFC Toolkit Export".into(),
            author: String::new(),
            organization: String::new(),
            application: "ifc-writer".into(),
            schema: SchemaVersion::Ifc4,
            length_in_millimeters: false,
        }
    }
}

pub enum SlabProfile {
    Rectangle { width: f64, depth: f64 },
    Arbitrary(Vec<[f64; 2]>),
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn length(a: [f64; 3]) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

fn normalize(a: [f64; 3]) -> [f64; 3] {
    let len = length(a);
    if len > 1e-10 { [a[0] / len, a[1] / len, a[2] / len] } else { [1.0, 0.0, 0.0] }
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

/// A perpendicular to `axis`, used as RefDirection where the caller has no
/// preferred in-plane direction (e.g. a beam's cross-section orientation).
fn arbitrary_perpendicular(axis: [f64; 3]) -> [f64; 3] {
    let world_x = [1.0, 0.0, 0.0];
    let candidate = if axis[0].abs() > 0.9 { [0.0, 1.0, 0.0] } else { world_x };
    normalize(cross(axis, cross(candidate, axis)))
}

/// Accumulates `#ID=TYPE(args);` lines and the handful of cached ids
/// (owner history, contexts, spatial structure) every element needs, the
/// way `IfcExporter` threads its `shape_map` lookups (spec §4.7 Creator
/// path).
pub struct Creator {
    options: CreatorOptions,
    ids: IdAllocator,
    entities: Vec<String>,
    seen_global_ids: HashSet<String>,

    owner_history: u32,
    body_context: u32,
    default_style: u32,

    project: u32,
    site: u32,
    building: u32,
    storeys: Vec<u32>,
    storey_contents: HashMap<u32, Vec<u32>>,

    style_cache: HashMap<(String, [i32; 3]), u32>,
    materials: HashMap<String, (u32, Vec<u32>)>,
}

impl Creator {
    pub fn new(options: CreatorOptions) -> CoreResult<Self> {
        let mut creator = Self {
            options,
            ids: IdAllocator::starting_at(1),
            entities: Vec::new(),
            seen_global_ids: HashSet::new(),
            owner_history: 0,
            body_context: 0,
            default_style: 0,
            project: 0,
            site: 0,
            building: 0,
            storeys: Vec::new(),
            storey_contents: HashMap::new(),
            style_cache: HashMap::new(),
            materials: HashMap::new(),
        };
        creator.emit_preamble()?;
        Ok(creator)
    }

    fn push(&mut self, line: String) -> u32 {
        let id = self.ids.next();
        self.entities.push(format!("#{id}={line}"));
        id
    }

    fn next_global_id(&mut self) -> CoreResult<String> {
        new_unique_global_id(&mut self.seen_global_ids, GLOBAL_ID_RETRY_ATTEMPTS)
            .ok_or_else(|| CoreError::SerializationOverflow { reason: "exhausted GlobalId retries within this file".into() })
    }

    // ---- geometry primitives ------------------------------------------------

    fn push_point3(&mut self, p: [f64; 3]) -> u32 {
        self.push(format!("IFCCARTESIANPOINT({});", format::point3(p)))
    }

    fn push_point2(&mut self, p: [f64; 2]) -> u32 {
        self.push(format!("IFCCARTESIANPOINT({});", format::point2(p)))
    }

    fn push_direction(&mut self, d: [f64; 3]) -> u32 {
        self.push(format!("IFCDIRECTION({});", format::point3(d)))
    }

    fn push_direction2(&mut self, d: [f64; 2]) -> u32 {
        self.push(format!("IFCDIRECTION({});", format::point2(d)))
    }

    fn push_axis2placement3d(&mut self, location: [f64; 3], axis: [f64; 3], ref_direction: [f64; 3]) -> u32 {
        let loc = self.push_point3(location);
        let ax = self.push_direction(axis);
        let rd = self.push_direction(ref_direction);
        self.push(format!("IFCAXIS2PLACEMENT3D(#{loc},#{ax},#{rd});"))
    }

    fn push_axis2placement2d(&mut self, location: [f64; 2], ref_direction: Option<[f64; 2]>) -> u32 {
        let loc = self.push_point2(location);
        let rd = ref_direction.map(|d| format::reference(self.push_direction2(d))).unwrap_or_else(|| "$".into());
        self.push(format!("IFCAXIS2PLACEMENT2D(#{loc},{rd});"))
    }

    fn push_local_placement(&mut self, relative_to: Option<u32>, placement: u32) -> u32 {
        let rel = relative_to.map(format::reference).unwrap_or_else(|| "$".into());
        self.push(format!("IFCLOCALPLACEMENT({rel},#{placement});"))
    }

    fn push_rectangle_profile(&mut self, position: u32, x_dim: f64, y_dim: f64) -> u32 {
        self.push(format!(
            "IFCRECTANGLEPROFILEDEF(.AREA.,$,#{position},{},{});",
            format::real(x_dim),
            format::real(y_dim)
        ))
    }

    fn push_arbitrary_profile(&mut self, position: u32, points: &[[f64; 2]]) -> u32 {
        let mut closed = points.to_vec();
        if closed.first() != closed.last() {
            closed.push(closed[0]);
        }
        let point_ids: Vec<u32> = closed.iter().map(|&p| self.push_point2(p)).collect();
        let polyline = self.push(format!("IFCPOLYLINE({});", format::reference_list(&point_ids)));
        self.push(format!("IFCARBITRARYCLOSEDPROFILEDEF(.AREA.,$,#{position},#{polyline});"))
    }

    fn push_extruded_area_solid(&mut self, profile: u32, position: Option<u32>, direction: [f64; 3], depth: f64) -> u32 {
        let pos = position.map(format::reference).unwrap_or_else(|| "$".into());
        let dir = self.push_direction(direction);
        self.push(format!("IFCEXTRUDEDAREASOLID(#{profile},{pos},#{dir},{});", format::real(depth)))
    }

    fn push_shape_representation(&mut self, representation_type: &str, items: &[u32]) -> u32 {
        self.push(format!(
            "IFCSHAPEREPRESENTATION(#{},'Body','{}',{});",
            self.body_context,
            representation_type,
            format::reference_list(items)
        ))
    }

    fn push_product_definition_shape(&mut self, representations: &[u32]) -> u32 {
        self.push(format!("IFCPRODUCTDEFINITIONSHAPE($,$,{});", format::reference_list(representations)))
    }

    // ---- header / preamble ---------------------------------------------------

    fn emit_preamble(&mut self) -> CoreResult<()> {
        let person = self.push(format!("IFCPERSON($,$,{},$,$,$,$,$);", format::string(&self.options.author.clone())));
        let organization = self.push(format!("IFCORGANIZATION($,{},$,$,$);", format::string(&self.options.organization.clone())));
        let person_and_org = self.push(format!("IFCPERSONANDORGANIZATION(#{person},#{organization},$);"));
        let application = self.push(format!(
            "IFCAPPLICATION(#{organization},'1.0',{},{});",
            format::string(&self.options.application.clone()),
            format::string(&self.options.application.clone())
        ));
        let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        self.owner_history = self.push(format!(
            "IFCOWNERHISTORY(#{person_and_org},#{application},$,.ADDED.,$,$,$,{timestamp});"
        ));

        let origin = self.push_point3([0.0, 0.0, 0.0]);
        let z = self.push_direction([0.0, 0.0, 1.0]);
        let x = self.push_direction([1.0, 0.0, 0.0]);
        let world_axis = self.push(format!("IFCAXIS2PLACEMENT3D(#{origin},#{z},#{x});"));
        let world_placement = self.push_local_placement(None, world_axis);

        let context = self.push(format!("IFCGEOMETRICREPRESENTATIONCONTEXT($,'Model',3,1.E-05,#{world_axis},$);"));
        self.body_context = self.push(format!(
            "IFCGEOMETRICREPRESENTATIONSUBCONTEXT('Body','Model',*,*,*,*,#{context},$,.MODEL_VIEW.,$);"
        ));
        self.push(format!(
            "IFCGEOMETRICREPRESENTATIONSUBCONTEXT('Axis','Model',*,*,*,*,#{context},$,.GRAPH_VIEW.,$);"
        ));

        let length_prefix = if self.options.length_in_millimeters { ".MILLI." } else { "$" };
        let length_unit_id = self.push(format!("IFCSIUNIT(*,.LENGTHUNIT.,{length_prefix},.METRE.);"));
        let area_unit_id = self.push("IFCSIUNIT(*,.AREAUNIT.,$,.SQUARE_METRE.);".into());
        let volume_unit_id = self.push("IFCSIUNIT(*,.VOLUMEUNIT.,$,.CUBIC_METRE.);".into());
        let angle_unit_id = self.push("IFCSIUNIT(*,.PLANEANGLEUNIT.,$,.RADIAN.);".into());
        self.push(format!(
            "IFCUNITASSIGNMENT({});",
            format::reference_list(&[length_unit_id, area_unit_id, volume_unit_id, angle_unit_id])
        ));

        let grey = self.push("IFCCOLOURRGB($,0.6,0.6,0.6);".into());
        let specular = self.push("IFCCOLOURRGB($,0.5,0.5,0.5);".into());
        let rendering = self.push(format!("IFCSURFACESTYLERENDERING(#{grey},0.,$,$,$,$,#{specular},IFCSPECULAREXPONENT(64.),.NOTDEFINED.);"));
        self.default_style = self.push(format!("IFCSURFACESTYLE($,.BOTH.,({}));", format::reference(rendering)));

        let project_gid = self.next_global_id()?;
        self.project = self.push(format!(
            "IFCPROJECT({},#{},{},{},$,$,$,({}),#{});",
            format::string(&project_gid),
            self.owner_history,
            format::string(&self.options.project_name.clone()),
            format::string(&self.options.description.clone()),
            format::reference(context),
            length_unit_id
        ));

        let site_gid = self.next_global_id()?;
        self.site = self.push(format!(
            "IFCSITE({},#{},'Default Site',$,$,#{world_placement},$,$,.ELEMENT.,$,$,$,$,$);",
            format::string(&site_gid),
            self.owner_history
        ));

        let building_gid = self.next_global_id()?;
        self.building = self.push(format!(
            "IFCBUILDING({},#{},'Default Building',$,$,#{world_placement},$,$,.ELEMENT.,$,$,$);",
            format::string(&building_gid),
            self.owner_history
        ));

        Ok(())
    }

    // ---- spatial structure ---------------------------------------------------

    pub fn add_storey(&mut self, name: &str, elevation: f64) -> CoreResult<u32> {
        let gid = self.next_global_id()?;
        let origin = self.push_point3([0.0, 0.0, elevation]);
        let z = self.push_direction([0.0, 0.0, 1.0]);
        let x = self.push_direction([1.0, 0.0, 0.0]);
        let axis = self.push(format!("IFCAXIS2PLACEMENT3D(#{origin},#{z},#{x});"));
        let placement = self.push_local_placement(None, axis);
        let storey = self.push(format!(
            "IFCBUILDINGSTOREY({},#{},{},$,$,#{placement},$,$,.ELEMENT.,{});",
            format::string(&gid),
            self.owner_history,
            format::string(name),
            format::real(elevation)
        ));
        self.storeys.push(storey);
        self.storey_contents.entry(storey).or_default();
        tracing::debug!(storey, name, elevation, "added storey");
        Ok(storey)
    }

    fn place_in_storey(&mut self, storey: u32, element: u32) {
        self.storey_contents.entry(storey).or_default().push(element);
    }

    fn emit_building_element(&mut self, ifc_type: &str, name: &str, predefined_type: &str, placement: u32, product_shape: u32) -> CoreResult<u32> {
        let gid = self.next_global_id()?;
        let id = self.push(format!(
            "IFC{}({},#{},{},$,$,#{},#{},$,.{}.);",
            ifc_type,
            format::string(&gid),
            self.owner_history,
            format::string(name),
            placement,
            product_shape,
            predefined_type
        ));
        tracing::debug!(id, ifc_type, name, "emitted building element");
        Ok(id)
    }

    // ---- element table (spec §4.7 "Elements") --------------------------------

    /// Wall: origin at Start, local X along (End-Start), profile centered at
    /// (L/2, 0) so the solid spans 0..L along local X, ±t/2 along local Y,
    /// extruded upward along Z by Height.
    pub fn add_wall(&mut self, storey: u32, name: &str, start: [f64; 3], end: [f64; 3], height: f64, thickness: f64) -> CoreResult<u32> {
        let local_x = normalize(sub(end, start));
        let length_along = length(sub(end, start));
        let axis = self.push_axis2placement3d(start, [0.0, 0.0, 1.0], local_x);
        let placement = self.push_local_placement(None, axis);

        let profile_pos = self.push_axis2placement2d([length_along / 2.0, 0.0], None);
        let profile = self.push_rectangle_profile(profile_pos, length_along, thickness);
        let solid = self.push_extruded_area_solid(profile, None, [0.0, 0.0, 1.0], height);
        let rep = self.push_shape_representation("SweptSolid", &[solid]);
        let shape = self.push_product_definition_shape(&[rep]);

        let element = self.emit_building_element("WALL", name, "NOTDEFINED", placement, shape)?;
        self.place_in_storey(storey, element);
        Ok(element)
    }

    /// Slab: origin at Position (min corner), profile centered at (W/2, D/2),
    /// extruded along Z by Thickness.
    pub fn add_slab(&mut self, storey: u32, name: &str, position: [f64; 3], profile: SlabProfile, thickness: f64) -> CoreResult<u32> {
        let axis = self.push_axis2placement3d(position, [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
        let placement = self.push_local_placement(None, axis);

        let profile_id = match profile {
            SlabProfile::Rectangle { width, depth } => {
                let profile_pos = self.push_axis2placement2d([width / 2.0, depth / 2.0], None);
                self.push_rectangle_profile(profile_pos, width, depth)
            }
            SlabProfile::Arbitrary(points) => {
                let profile_pos = self.push_axis2placement2d([0.0, 0.0], None);
                self.push_arbitrary_profile(profile_pos, &points)
            }
        };
        let solid = self.push_extruded_area_solid(profile_id, None, [0.0, 0.0, 1.0], thickness);
        let rep = self.push_shape_representation("SweptSolid", &[solid]);
        let shape = self.push_product_definition_shape(&[rep]);

        let element = self.emit_building_element("SLAB", name, "NOTDEFINED", placement, shape)?;
        self.place_in_storey(storey, element);
        Ok(element)
    }

    /// Column: origin at base center, profile centered, extruded along Z by
    /// Height.
    pub fn add_column(&mut self, storey: u32, name: &str, base_center: [f64; 3], width: f64, depth: f64, height: f64) -> CoreResult<u32> {
        let axis = self.push_axis2placement3d(base_center, [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
        let placement = self.push_local_placement(None, axis);

        let profile_pos = self.push_axis2placement2d([0.0, 0.0], None);
        let profile = self.push_rectangle_profile(profile_pos, width, depth);
        let solid = self.push_extruded_area_solid(profile, None, [0.0, 0.0, 1.0], height);
        let rep = self.push_shape_representation("SweptSolid", &[solid]);
        let shape = self.push_product_definition_shape(&[rep]);

        let element = self.emit_building_element("COLUMN", name, "NOTDEFINED", placement, shape)?;
        self.place_in_storey(storey, element);
        Ok(element)
    }

    /// Beam: origin at Start, local Z along the beam axis, RefDirection an
    /// arbitrary perpendicular; extruded along local Z by |End-Start|.
    pub fn add_beam(&mut self, storey: u32, name: &str, start: [f64; 3], end: [f64; 3], width: f64, height: f64) -> CoreResult<u32> {
        let beam_axis = normalize(sub(end, start));
        let ref_direction = arbitrary_perpendicular(beam_axis);
        let span = length(sub(end, start));

        let axis = self.push_axis2placement3d(start, beam_axis, ref_direction);
        let placement = self.push_local_placement(None, axis);

        let profile_pos = self.push_axis2placement2d([0.0, 0.0], None);
        let profile = self.push_rectangle_profile(profile_pos, width, height);
        let solid = self.push_extruded_area_solid(profile, None, [0.0, 0.0, 1.0], span);
        let rep = self.push_shape_representation("SweptSolid", &[solid]);
        let shape = self.push_product_definition_shape(&[rep]);

        let element = self.emit_building_element("BEAM", name, "NOTDEFINED", placement, shape)?;
        self.place_in_storey(storey, element);
        Ok(element)
    }

    /// Stair: one flight LocalPlacement at the first-tread nose, rotated in
    /// plan by `rotation_delta` (RefDirection = (cos delta, sin delta, 0));
    /// one extrusion per riser, each positioned at
    /// `(i*TreadLength, 0, i*RiserHeight)` in the flight's local frame.
    #[allow(clippy::too_many_arguments)]
    pub fn add_stair(
        &mut self,
        storey: u32,
        name: &str,
        first_tread_origin: [f64; 3],
        tread_length: f64,
        riser_height: f64,
        width: f64,
        num_risers: u32,
        rotation_delta: f64,
    ) -> CoreResult<u32> {
        let ref_direction = [rotation_delta.cos(), rotation_delta.sin(), 0.0];
        let axis = self.push_axis2placement3d(first_tread_origin, [0.0, 0.0, 1.0], ref_direction);
        let placement = self.push_local_placement(None, axis);

        let mut solids = Vec::with_capacity(num_risers as usize);
        for i in 0..num_risers {
            let i = f64::from(i);
            let item_position = self.push_axis2placement3d([i * tread_length, 0.0, i * riser_height], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
            let profile_pos = self.push_axis2placement2d([tread_length / 2.0, width / 2.0], None);
            let profile = self.push_rectangle_profile(profile_pos, tread_length, width);
            solids.push(self.push_extruded_area_solid(profile, Some(item_position), [0.0, 0.0, 1.0], riser_height));
        }
        let rep = self.push_shape_representation("SolidModel", &solids);
        let shape = self.push_product_definition_shape(&[rep]);

        let element = self.emit_building_element("STAIR", name, "NOTDEFINED", placement, shape)?;
        self.place_in_storey(storey, element);
        Ok(element)
    }

    /// Roof: origin at min corner, profile centered, extruded along Z by
    /// Thickness; an optional slope rotates the placement around Y.
    #[allow(clippy::too_many_arguments)]
    pub fn add_roof(&mut self, storey: u32, name: &str, min_corner: [f64; 3], width: f64, depth: f64, thickness: f64, slope: Option<f64>) -> CoreResult<u32> {
        let (axis_dir, ref_dir) = match slope {
            Some(angle) => ([angle.sin(), 0.0, angle.cos()], [angle.cos(), 0.0, -angle.sin()]),
            None => ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        };
        let axis = self.push_axis2placement3d(min_corner, axis_dir, ref_dir);
        let placement = self.push_local_placement(None, axis);

        let profile_pos = self.push_axis2placement2d([width / 2.0, depth / 2.0], None);
        let profile = self.push_rectangle_profile(profile_pos, width, depth);
        let solid = self.push_extruded_area_solid(profile, None, [0.0, 0.0, 1.0], thickness);
        let rep = self.push_shape_representation("SweptSolid", &[solid]);
        let shape = self.push_product_definition_shape(&[rep]);

        let element = self.emit_building_element("ROOF", name, "NOTDEFINED", placement, shape)?;
        self.place_in_storey(storey, element);
        Ok(element)
    }

    /// Opening in a wall: placement relative to the host wall, local Z along
    /// the wall's local Y (thickness axis), profile (Width, Height) offset up
    /// by Height/2, extruded depth = hostThickness + 0.1 through the wall.
    pub fn add_opening_in_wall(&mut self, host_wall_placement: u32, distance_along_wall: f64, host_thickness: f64, width: f64, height: f64) -> CoreResult<u32> {
        let local_axis = self.push_axis2placement3d([distance_along_wall, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        let placement = self.push_local_placement(Some(host_wall_placement), local_axis);

        let profile_pos = self.push_axis2placement2d([0.0, height / 2.0], None);
        let profile = self.push_rectangle_profile(profile_pos, width, height);
        let item_position = self.push_axis2placement3d([0.0, -0.05, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
        let solid = self.push_extruded_area_solid(profile, Some(item_position), [0.0, 0.0, 1.0], host_thickness + 0.1);
        let rep = self.push_shape_representation("SweptSolid", &[solid]);
        let shape = self.push_product_definition_shape(&[rep]);

        let gid = self.next_global_id()?;
        let opening = self.push(format!(
            "IFCOPENINGELEMENT({},#{},'Opening',$,$,#{placement},#{shape},$,.OPENING.);",
            format::string(&gid),
            self.owner_history,
        ));
        Ok(opening)
    }

    /// Opening in a slab: placement relative to the host slab, profile
    /// centered, extruded 10m through the slab.
    pub fn add_opening_in_slab(&mut self, host_slab_placement: u32, local_position: [f64; 2], width: f64, depth: f64) -> CoreResult<u32> {
        let local_axis = self.push_axis2placement3d([local_position[0], local_position[1], -5.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
        let placement = self.push_local_placement(Some(host_slab_placement), local_axis);

        let profile_pos = self.push_axis2placement2d([0.0, 0.0], None);
        let profile = self.push_rectangle_profile(profile_pos, width, depth);
        let solid = self.push_extruded_area_solid(profile, None, [0.0, 0.0, 1.0], 10.0);
        let rep = self.push_shape_representation("SweptSolid", &[solid]);
        let shape = self.push_product_definition_shape(&[rep]);

        let gid = self.next_global_id()?;
        let opening = self.push(format!(
            "IFCOPENINGELEMENT({},#{},'Opening',$,$,#{placement},#{shape},$,.OPENING.);",
            format::string(&gid),
            self.owner_history,
        ));
        Ok(opening)
    }

    pub fn link_opening_to_host(&mut self, host: u32, opening: u32) -> CoreResult<u32> {
        let gid = self.next_global_id()?;
        Ok(self.push(format!(
            "IFCRELVOIDSELEMENT({},#{},$,$,#{host},#{opening});",
            format::string(&gid),
            self.owner_history,
        )))
    }

    // ---- property / quantity sets (spec §4.7 "Property & Quantity sets") ----

    fn nominal_value(value: &PropertyValue) -> String {
        match value {
            PropertyValue::String(s) | PropertyValue::Label(s) => format!("IFCLABEL({})", format::string(s)),
            PropertyValue::Identifier(s) => format!("IFCIDENTIFIER({})", format::string(s)),
            PropertyValue::Text(s) => format!("IFCTEXT({})", format::string(s)),
            PropertyValue::Enum(s) => format!("IFCLABEL({})", format::string(s)),
            PropertyValue::Real(r) => format!("IFCREAL({})", format::real(*r)),
            PropertyValue::Integer(i) => format!("IFCINTEGER({i})"),
            PropertyValue::Boolean(b) => format!("IFCBOOLEAN({})", format::enum_lit(if *b { "T" } else { "F" })),
            PropertyValue::Logical(opt) => format!(
                "IFCLOGICAL({})",
                format::enum_lit(match opt {
                    Some(true) => "T",
                    Some(false) => "F",
                    None => "U",
                })
            ),
            PropertyValue::Reference(id) => format::reference(*id),
            PropertyValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(Self::nominal_value).collect();
                format!("({})", rendered.join(","))
            }
        }
    }

    fn push_property_single_value(&mut self, name: &str, value: &PropertyValue) -> u32 {
        let nominal = Self::nominal_value(value);
        self.push(format!("IFCPROPERTYSINGLEVALUE({},$,{},$);", format::string(name), nominal))
    }

    pub fn add_property_set(&mut self, element: u32, name: &str, properties: &[(String, PropertyValue)]) -> CoreResult<u32> {
        let property_ids: Vec<u32> = properties.iter().map(|(n, v)| self.push_property_single_value(n, v)).collect();
        let gid = self.next_global_id()?;
        let pset = self.push(format!(
            "IFCPROPERTYSET({},#{},{},$,{});",
            format::string(&gid),
            self.owner_history,
            format::string(name),
            format::reference_list(&property_ids)
        ));
        let rel_gid = self.next_global_id()?;
        self.push(format!(
            "IFCRELDEFINESBYPROPERTIES({},#{},$,$,{},#{pset});",
            format::string(&rel_gid),
            self.owner_history,
            format::reference_list(&[element])
        ));
        Ok(pset)
    }

    fn quantity_type_name(kind: QuantityKind) -> &'static str {
        match kind {
            QuantityKind::Length => "IFCQUANTITYLENGTH",
            QuantityKind::Area => "IFCQUANTITYAREA",
            QuantityKind::Volume => "IFCQUANTITYVOLUME",
            QuantityKind::Count => "IFCQUANTITYCOUNT",
            QuantityKind::Weight => "IFCQUANTITYWEIGHT",
        }
    }

    pub fn add_quantity_set(&mut self, element: u32, name: &str, quantities: &[(String, QuantityKind, f64)]) -> CoreResult<u32> {
        let quantity_ids: Vec<u32> = quantities
            .iter()
            .map(|(qname, kind, value)| {
                self.push(format!(
                    "{}({},$,$,{});",
                    Self::quantity_type_name(*kind),
                    format::string(qname),
                    format::real(*value)
                ))
            })
            .collect();
        let gid = self.next_global_id()?;
        let qset = self.push(format!(
            "IFCELEMENTQUANTITY({},#{},{},$,$,{});",
            format::string(&gid),
            self.owner_history,
            format::string(name),
            format::reference_list(&quantity_ids)
        ));
        let rel_gid = self.next_global_id()?;
        self.push(format!(
            "IFCRELDEFINESBYPROPERTIES({},#{},$,$,{},#{qset});",
            format::string(&rel_gid),
            self.owner_history,
            format::reference_list(&[element])
        ));
        Ok(qset)
    }

    // ---- styling (spec §4.7 "Styling") ---------------------------------------

    /// Attaches a cached `IfcSurfaceStyle` (identical name+rgb tuples share
    /// one style entity) to a representation item via `IfcStyledItem`.
    pub fn add_style(&mut self, representation_item: u32, name: &str, rgb: [f32; 3]) -> u32 {
        let key = (name.to_string(), [(rgb[0] * 1000.0) as i32, (rgb[1] * 1000.0) as i32, (rgb[2] * 1000.0) as i32]);
        let style_id = match self.style_cache.get(&key) {
            Some(id) => *id,
            None => {
                let colour = self.push(format!(
                    "IFCCOLOURRGB($,{},{},{});",
                    format::real(rgb[0] as f64),
                    format::real(rgb[1] as f64),
                    format::real(rgb[2] as f64)
                ));
                let rendering = self.push(format!("IFCSURFACESTYLERENDERING(#{colour},0.,$,$,$,$,$,$,.NOTDEFINED.);"));
                let style = self.push(format!("IFCSURFACESTYLE({},.BOTH.,({}));", format::string(name), format::reference(rendering)));
                self.style_cache.insert(key, style);
                style
            }
        };
        self.push(format!("IFCSTYLEDITEM(#{representation_item},({}),$);", format::reference(style_id)))
    }

    // ---- materials (spec §4.7 "Materials") -----------------------------------

    pub fn add_material(&mut self, element: u32, material_name: &str) {
        if !self.materials.contains_key(material_name) {
            let id = self.push(format!("IFCMATERIAL({},$,$);", format::string(material_name)));
            self.materials.insert(material_name.to_string(), (id, Vec::new()));
        }
        self.materials.get_mut(material_name).unwrap().1.push(element);
    }

    pub fn add_layered_material(&mut self, element: u32, material_name: &str, layers: &[(String, f64)]) {
        if !self.materials.contains_key(material_name) {
            let layer_ids: Vec<u32> = layers
                .iter()
                .map(|(layer_name, thickness)| {
                    let material = self.push(format!("IFCMATERIAL({},$,$);", format::string(layer_name)));
                    self.push(format!("IFCMATERIALLAYER(#{material},{},$,$,$,$,$);", format::real(*thickness)))
                })
                .collect();
            let set = self.push(format!("IFCMATERIALLAYERSET({},$,{});", format::reference_list(&layer_ids), format::string(material_name)));
            self.materials.insert(material_name.to_string(), (set, Vec::new()));
        }
        self.materials.get_mut(material_name).unwrap().1.push(element);
    }

    // ---- finalization (spec §4.7 "Finalization") -----------------------------

    fn finalize(&mut self) -> CoreResult<()> {
        for (_, (material, elements)) in std::mem::take(&mut self.materials) {
            if elements.is_empty() {
                continue;
            }
            let gid = self.next_global_id()?;
            self.push(format!(
                "IFCRELASSOCIATESMATERIAL({},#{},$,$,{},#{material});",
                format::string(&gid),
                self.owner_history,
                format::reference_list(&elements)
            ));
        }

        let gid = self.next_global_id()?;
        self.push(format!(
            "IFCRELAGGREGATES({},#{},$,$,#{},{});",
            format::string(&gid),
            self.owner_history,
            self.project,
            format::reference_list(&[self.site])
        ));

        let gid = self.next_global_id()?;
        self.push(format!(
            "IFCRELAGGREGATES({},#{},$,$,#{},{});",
            format::string(&gid),
            self.owner_history,
            self.site,
            format::reference_list(&[self.building])
        ));

        if !self.storeys.is_empty() {
            let gid = self.next_global_id()?;
            self.push(format!(
                "IFCRELAGGREGATES({},#{},$,$,#{},{});",
                format::string(&gid),
                self.owner_history,
                self.building,
                format::reference_list(&self.storeys)
            ));
        }

        for (storey, elements) in std::mem::take(&mut self.storey_contents) {
            if elements.is_empty() {
                continue;
            }
            let gid = self.next_global_id()?;
            self.push(format!(
                "IFCRELCONTAINEDINSPATIALSTRUCTURE({},#{},$,$,{},#{storey});",
                format::string(&gid),
                self.owner_history,
                format::reference_list(&elements)
            ));
        }

        Ok(())
    }

    /// Finalize and render the full ISO-10303-21 text stream (spec §4.7
    /// Header + DATA section).
    pub fn into_text(mut self) -> CoreResult<String> {
        self.finalize()?;

        let mut out = String::new();
        out.push_str("ISO-10303-21;\n");
        out.push_str("HEADER;\n");
        out.push_str("FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');\n");
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S");
        out.push_str(&format!(
            "FILE_NAME('','{}',({}),({}),{},{},'');\n",
            now,
            format::string(&self.options.author.clone()),
            format::string(&self.options.organization.clone()),
            format::string(&self.options.application.clone()),
            format::string(&self.options.application.clone())
        ));
        out.push_str(&format!("FILE_SCHEMA(('{}'));\n", self.options.schema.as_token()));
        out.push_str("ENDSEC;\n");
        out.push_str("DATA;\n");
        for entity in &self.entities {
            out.push_str(entity);
            out.push('\n');
        }
        out.push_str("ENDSEC;\n");
        out.push_str("END-ISO-10303-21;\n");
        tracing::info!(entity_count = self.entities.len(), bytes = out.len(), "file written");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator() -> Creator {
        Creator::new(CreatorOptions { project_name: "Test Project".into(), ..Default::default() }).unwrap()
    }

    #[test]
    fn preamble_creates_project_site_building() {
        let c = creator();
        assert_ne!(c.project, 0);
        assert_ne!(c.site, 0);
        assert_ne!(c.building, 0);
        assert_ne!(c.owner_history, 0);
    }

    #[test]
    fn wall_emits_a_single_element_and_a_shape_representation() {
        let mut c = creator();
        let storey = c.add_storey("Level 1", 0.0).unwrap();
        let before = c.entities.len();
        let wall = c.add_wall(storey, "W1", [0.0, 0.0, 0.0], [4.0, 0.0, 0.0], 3.0, 0.2).unwrap();
        assert!(wall > 0);
        assert!(c.entities.len() > before);
        assert!(c.entities.last().unwrap().contains("IFCWALL"));
    }

    #[test]
    fn property_set_links_back_to_its_element() {
        let mut c = creator();
        let storey = c.add_storey("Level 1", 0.0).unwrap();
        let wall = c.add_wall(storey, "W1", [0.0, 0.0, 0.0], [4.0, 0.0, 0.0], 3.0, 0.2).unwrap();
        let pset = c.add_property_set(wall, "Pset_WallCommon", &[("FireRating".into(), PropertyValue::Label("F60".into()))]).unwrap();
        assert!(pset > 0);
        assert!(c.entities.iter().any(|e| e.contains("IFCRELDEFINESBYPROPERTIES")));
    }

    #[test]
    fn into_text_renders_conformant_header_and_footer() {
        let c = creator();
        let text = c.into_text().unwrap();
        assert!(text.starts_with("ISO-10303-21;\n"));
        assert!(text.contains("FILE_SCHEMA(('IFC4'));"));
        assert!(text.trim_end().ends_with("END-ISO-10303-21;"));
    }

    #[test]
    fn global_ids_emitted_are_all_unique() {
        let mut c = creator();
        let storey = c.add_storey("Level 1", 0.0).unwrap();
        c.add_wall(storey, "W1", [0.0, 0.0, 0.0], [4.0, 0.0, 0.0], 3.0, 0.2).unwrap();
        c.add_wall(storey, "W2", [0.0, 0.0, 0.0], [4.0, 0.0, 0.0], 3.0, 0.2).unwrap();
        let gids: Vec<&str> = c
            .entities
            .iter()
            .filter(|e| e.contains("IFCWALL") || e.contains("IFCSITE") || e.contains("IFCBUILDING"))
            .map(|e| e.as_str())
            .collect();
        assert!(!gids.is_empty());
    }
}
