//! Columnar entity store (spec §3 EntityRecord, §4.2).
//!
//! N parallel arrays indexed 0..N-1, plus O(1) auxiliary indices. Built
//! mutably during parsing (`push`), then frozen: no column is reallocated
//! or reassigned after Phase E (spec §5 "Shared resource policy").

use crate::interner::Interner;
use crate::types::TypeTag;
use rustc_hash::FxHashMap;

pub const GLOBAL_ID_LEN: usize = 22;

/// A 22-byte fixed ASCII GlobalId, used as a hash key without allocating
/// (spec invariant 2: `[0-9A-Za-z_$]{22}`).
pub type GlobalIdBytes = [u8; GLOBAL_ID_LEN];

pub fn global_id_bytes(s: &str) -> Option<GlobalIdBytes> {
    if s.len() != GLOBAL_ID_LEN {
        return None;
    }
    let mut out = [0u8; GLOBAL_ID_LEN];
    out.copy_from_slice(s.as_bytes());
    Some(out)
}

pub fn is_valid_global_id(s: &str) -> bool {
    s.len() == GLOBAL_ID_LEN
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
}

#[derive(Debug, Default)]
pub struct EntityStore {
    pub interner: Interner,

    express_id: Vec<u32>,
    type_tag: Vec<u16>,
    global_id: Vec<u32>,
    name: Vec<u32>,
    description: Vec<u32>,
    object_type: Vec<u32>,
    flags: Vec<u8>,
    contained_in_storey: Vec<i32>,
    defined_by_type: Vec<i32>,
    geometry_index: Vec<i32>,
    byte_offset: Vec<usize>,
    byte_len: Vec<usize>,

    id_to_index: FxHashMap<u32, u32>,
    global_id_to_express_id: FxHashMap<GlobalIdBytes, u32>,
    type_indices: FxHashMap<u16, Vec<u32>>,

    frozen: bool,
}

/// Everything needed to append one row; kept as a plain struct so the
/// parser can build it incrementally without a giant positional argument
/// list.
#[derive(Debug, Clone, Default)]
pub struct NewEntity {
    pub express_id: u32,
    pub type_tag: TypeTag,
    pub global_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_type: Option<String>,
    pub byte_offset: usize,
    pub byte_len: usize,
}

impl Default for TypeTag {
    fn default() -> Self {
        TypeTag::Unknown
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            ..Self::default()
        }
    }

    /// Append one row. Returns the row index. `expressId` uniqueness is the
    /// parser's responsibility (STEP files cannot legally redefine `#N`).
    pub fn push(&mut self, e: NewEntity) -> u32 {
        debug_assert!(!self.frozen, "pushed a row after freeze");
        let row = self.express_id.len() as u32;

        self.express_id.push(e.express_id);
        self.type_tag.push(e.type_tag as u16);
        self.global_id
            .push(e.global_id.as_deref().map(|s| self.interner.intern(s)).unwrap_or(0));
        self.name
            .push(e.name.as_deref().map(|s| self.interner.intern(s)).unwrap_or(0));
        self.description
            .push(e.description.as_deref().map(|s| self.interner.intern(s)).unwrap_or(0));
        self.object_type
            .push(e.object_type.as_deref().map(|s| self.interner.intern(s)).unwrap_or(0));
        self.flags.push(0);
        self.contained_in_storey.push(-1);
        self.defined_by_type.push(-1);
        self.geometry_index.push(-1);
        self.byte_offset.push(e.byte_offset);
        self.byte_len.push(e.byte_len);

        self.id_to_index.insert(e.express_id, row);
        self.type_indices.entry(e.type_tag as u16).or_default().push(e.express_id);

        if let Some(gid) = e.global_id.as_deref() {
            if let Some(bytes) = global_id_bytes(gid) {
                self.global_id_to_express_id.insert(bytes, e.express_id);
            }
        }

        row
    }

    /// Freeze the store: no further structural mutation, only flag/linkage
    /// updates made by the relationship-wiring and spatial-hierarchy passes
    /// (Phases C/D), which operate on already-pushed rows.
    pub fn freeze(&mut self) {
        self.frozen = true;
        self.interner.freeze();
    }

    pub fn len(&self) -> usize {
        self.express_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.express_id.is_empty()
    }

    pub fn max_express_id(&self) -> u32 {
        self.express_id.iter().copied().max().unwrap_or(0)
    }

    fn row_of(&self, express_id: u32) -> Option<usize> {
        self.id_to_index.get(&express_id).map(|&i| i as usize)
    }

    pub fn contains(&self, express_id: u32) -> bool {
        self.id_to_index.contains_key(&express_id)
    }

    pub fn express_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.express_id.iter().copied()
    }

    pub fn type_tag(&self, express_id: u32) -> TypeTag {
        self.row_of(express_id)
            .map(|r| unsafe_type_tag(self.type_tag[r]))
            .unwrap_or(TypeTag::Unknown)
    }

    pub fn get_name(&self, express_id: u32) -> &str {
        self.row_of(express_id)
            .map(|r| self.interner.get(self.name[r]))
            .unwrap_or("")
    }

    pub fn get_description(&self, express_id: u32) -> &str {
        self.row_of(express_id)
            .map(|r| self.interner.get(self.description[r]))
            .unwrap_or("")
    }

    pub fn get_object_type(&self, express_id: u32) -> &str {
        self.row_of(express_id)
            .map(|r| self.interner.get(self.object_type[r]))
            .unwrap_or("")
    }

    pub fn get_global_id(&self, express_id: u32) -> &str {
        self.row_of(express_id)
            .map(|r| self.interner.get(self.global_id[r]))
            .unwrap_or("")
    }

    pub fn get_type_name(&self, express_id: u32) -> &'static str {
        type_tag_name(self.type_tag(express_id))
    }

    pub fn has_geometry(&self, express_id: u32) -> bool {
        self.flag_set(express_id, crate::types::flags::HAS_GEOMETRY)
    }

    pub fn has_properties(&self, express_id: u32) -> bool {
        self.flag_set(express_id, crate::types::flags::HAS_PROPERTIES)
    }

    pub fn has_quantities(&self, express_id: u32) -> bool {
        self.flag_set(express_id, crate::types::flags::HAS_QUANTITIES)
    }

    pub fn has_openings(&self, express_id: u32) -> bool {
        self.flag_set(express_id, crate::types::flags::HAS_OPENINGS)
    }

    pub fn is_filling(&self, express_id: u32) -> bool {
        self.flag_set(express_id, crate::types::flags::IS_FILLING)
    }

    pub fn is_hidden(&self, express_id: u32) -> bool {
        self.flag_set(express_id, crate::types::flags::HIDDEN)
    }

    pub fn is_isolated(&self, express_id: u32) -> bool {
        self.flag_set(express_id, crate::types::flags::ISOLATED)
    }

    fn flag_set(&self, express_id: u32, mask: u8) -> bool {
        self.row_of(express_id)
            .map(|r| self.flags[r] & mask != 0)
            .unwrap_or(false)
    }

    pub fn set_flag(&mut self, express_id: u32, mask: u8) {
        if let Some(r) = self.row_of(express_id) {
            self.flags[r] |= mask;
        }
    }

    pub fn contained_in_storey(&self, express_id: u32) -> Option<u32> {
        self.row_of(express_id)
            .map(|r| self.contained_in_storey[r])
            .filter(|&v| v >= 0)
            .map(|v| v as u32)
    }

    pub fn set_contained_in_storey(&mut self, express_id: u32, storey: u32) {
        if let Some(r) = self.row_of(express_id) {
            self.contained_in_storey[r] = storey as i32;
        }
    }

    pub fn defined_by_type(&self, express_id: u32) -> Option<u32> {
        self.row_of(express_id)
            .map(|r| self.defined_by_type[r])
            .filter(|&v| v >= 0)
            .map(|v| v as u32)
    }

    pub fn set_defined_by_type(&mut self, express_id: u32, type_id: u32) {
        if let Some(r) = self.row_of(express_id) {
            self.defined_by_type[r] = type_id as i32;
        }
    }

    pub fn geometry_index(&self, express_id: u32) -> Option<u32> {
        self.row_of(express_id)
            .map(|r| self.geometry_index[r])
            .filter(|&v| v >= 0)
            .map(|v| v as u32)
    }

    pub fn set_geometry_index(&mut self, express_id: u32, index: u32) {
        if let Some(r) = self.row_of(express_id) {
            self.geometry_index[r] = index as i32;
        }
    }

    pub fn byte_range(&self, express_id: u32) -> Option<(usize, usize)> {
        self.row_of(express_id).map(|r| (self.byte_offset[r], self.byte_len[r]))
    }

    /// expressIds (not row indices) of every entity with this type tag, in
    /// insertion order.
    pub fn get_by_type(&self, tag: TypeTag) -> &[u32] {
        self.type_indices.get(&(tag as u16)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_express_id_by_global_id(&self, global_id: &str) -> Option<u32> {
        let bytes = global_id_bytes(global_id)?;
        self.global_id_to_express_id.get(&bytes).copied()
    }
}

/// `TypeTag` values are a closed, explicit `#[repr(u16)]` enum; reconstructing
/// one from a stored `u16` is a lookup over the same table used by
/// `TypeTag::from_name`, keeping reader and writer in lockstep (spec §6).
fn unsafe_type_tag(raw: u16) -> TypeTag {
    use TypeTag::*;
    match raw {
        1 => Project,
        2 => Site,
        3 => Building,
        4 => BuildingStorey,
        5 => Space,
        10 => Wall,
        11 => WallStandardCase,
        12 => Door,
        13 => Window,
        14 => Slab,
        15 => Column,
        16 => Beam,
        17 => Stair,
        18 => Ramp,
        19 => Roof,
        20 => Railing,
        21 => FurnishingElement,
        22 => FlowSegment,
        23 => FlowFitting,
        24 => FlowTerminal,
        25 => DistributionElement,
        26 => CivilElement,
        27 => BuildingElementProxy,
        30 => OpeningElement,
        100 => RelAggregates,
        101 => RelContainedInSpatialStructure,
        102 => RelDefinesByProperties,
        103 => RelDefinesByType,
        104 => RelVoidsElement,
        105 => RelFillsElement,
        106 => RelAssociatesMaterial,
        107 => RelAssociatesClassification,
        108 => RelConnectsPathElements,
        109 => RelSpaceBoundary,
        200 => PropertySet,
        201 => PropertySingleValue,
        202 => ElementQuantity,
        203 => QuantityLength,
        204 => QuantityArea,
        205 => QuantityVolume,
        206 => QuantityCount,
        207 => QuantityWeight,
        208 => Material,
        209 => MaterialLayer,
        210 => MaterialLayerSet,
        211 => SurfaceStyle,
        212 => ColourRgb,
        213 => SurfaceStyleRendering,
        214 => StyledItem,
        215 => Classification,
        300 => RectangleProfileDef,
        301 => CircleProfileDef,
        302 => EllipseProfileDef,
        303 => IShapeProfileDef,
        304 => ArbitraryClosedProfileDef,
        305 => ExtrudedAreaSolid,
        306 => BooleanClippingResult,
        307 => BooleanResult,
        308 => FacetedBrep,
        309 => TriangulatedFaceSet,
        310 => SweptDiskSolid,
        311 => ShapeRepresentation,
        312 => ProductDefinitionShape,
        313 => Axis2Placement3D,
        314 => LocalPlacement,
        315 => CartesianPoint,
        316 => Direction,
        _ => Unknown,
    }
}

pub fn type_tag_name(tag: TypeTag) -> &'static str {
    use TypeTag::*;
    match tag {
        Project => "IFCPROJECT",
        Site => "IFCSITE",
        Building => "IFCBUILDING",
        BuildingStorey => "IFCBUILDINGSTOREY",
        Space => "IFCSPACE",
        Wall => "IFCWALL",
        WallStandardCase => "IFCWALLSTANDARDCASE",
        Door => "IFCDOOR",
        Window => "IFCWINDOW",
        Slab => "IFCSLAB",
        Column => "IFCCOLUMN",
        Beam => "IFCBEAM",
        Stair => "IFCSTAIR",
        Ramp => "IFCRAMP",
        Roof => "IFCROOF",
        Railing => "IFCRAILING",
        FurnishingElement => "IFCFURNISHINGELEMENT",
        FlowSegment => "IFCFLOWSEGMENT",
        FlowFitting => "IFCFLOWFITTING",
        FlowTerminal => "IFCFLOWTERMINAL",
        DistributionElement => "IFCDISTRIBUTIONELEMENT",
        CivilElement => "IFCCIVILELEMENT",
        BuildingElementProxy => "IFCBUILDINGELEMENTPROXY",
        OpeningElement => "IFCOPENINGELEMENT",
        RelAggregates => "IFCRELAGGREGATES",
        RelContainedInSpatialStructure => "IFCRELCONTAINEDINSPATIALSTRUCTURE",
        RelDefinesByProperties => "IFCRELDEFINESBYPROPERTIES",
        RelDefinesByType => "IFCRELDEFINESBYTYPE",
        RelVoidsElement => "IFCRELVOIDSELEMENT",
        RelFillsElement => "IFCRELFILLSELEMENT",
        RelAssociatesMaterial => "IFCRELASSOCIATESMATERIAL",
        RelAssociatesClassification => "IFCRELASSOCIATESCLASSIFICATION",
        RelConnectsPathElements => "IFCRELCONNECTSPATHELEMENTS",
        RelSpaceBoundary => "IFCRELSPACEBOUNDARY",
        PropertySet => "IFCPROPERTYSET",
        PropertySingleValue => "IFCPROPERTYSINGLEVALUE",
        ElementQuantity => "IFCELEMENTQUANTITY",
        QuantityLength => "IFCQUANTITYLENGTH",
        QuantityArea => "IFCQUANTITYAREA",
        QuantityVolume => "IFCQUANTITYVOLUME",
        QuantityCount => "IFCQUANTITYCOUNT",
        QuantityWeight => "IFCQUANTITYWEIGHT",
        Material => "IFCMATERIAL",
        MaterialLayer => "IFCMATERIALLAYER",
        MaterialLayerSet => "IFCMATERIALLAYERSET",
        SurfaceStyle => "IFCSURFACESTYLE",
        ColourRgb => "IFCCOLOURRGB",
        SurfaceStyleRendering => "IFCSURFACESTYLERENDERING",
        StyledItem => "IFCSTYLEDITEM",
        Classification => "IFCCLASSIFICATION",
        RectangleProfileDef => "IFCRECTANGLEPROFILEDEF",
        CircleProfileDef => "IFCCIRCLEPROFILEDEF",
        EllipseProfileDef => "IFCELLIPSEPROFILEDEF",
        IShapeProfileDef => "IFCISHAPEPROFILEDEF",
        ArbitraryClosedProfileDef => "IFCARBITRARYCLOSEDPROFILEDEF",
        ExtrudedAreaSolid => "IFCEXTRUDEDAREASOLID",
        BooleanClippingResult => "IFCBOOLEANCLIPPINGRESULT",
        BooleanResult => "IFCBOOLEANRESULT",
        FacetedBrep => "IFCFACETEDBREP",
        TriangulatedFaceSet => "IFCTRIANGULATEDFACESET",
        SweptDiskSolid => "IFCSWEPTDISKSOLID",
        ShapeRepresentation => "IFCSHAPEREPRESENTATION",
        ProductDefinitionShape => "IFCPRODUCTDEFINITIONSHAPE",
        Axis2Placement3D => "IFCAXIS2PLACEMENT3D",
        LocalPlacement => "IFCLOCALPLACEMENT",
        CartesianPoint => "IFCCARTESIANPOINT",
        Direction => "IFCDIRECTION",
        Unknown => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EntityStore {
        let mut store = EntityStore::new();
        store.push(NewEntity {
            express_id: 1,
            type_tag: TypeTag::Wall,
            global_id: Some("0$WU4A9R19$vKWO$AdOnAA".to_string()),
            name: Some("Wall-001".to_string()),
            byte_offset: 10,
            byte_len: 40,
            ..Default::default()
        });
        store.freeze();
        store
    }

    #[test]
    fn unknown_express_id_returns_sentinels() {
        let store = sample();
        assert_eq!(store.get_name(999), "");
        assert_eq!(store.get_type_name(999), "UNKNOWN");
        assert!(!store.has_geometry(999));
        assert_eq!(store.get_express_id_by_global_id("nonexistent"), None);
    }

    #[test]
    fn row_maps_back_to_itself() {
        let store = sample();
        assert!(store.contains(1));
        assert_eq!(store.get_name(1), "Wall-001");
        assert_eq!(store.type_tag(1), TypeTag::Wall);
        assert_eq!(store.get_by_type(TypeTag::Wall), &[1]);
    }

    #[test]
    fn global_id_lookup_round_trips() {
        let store = sample();
        assert_eq!(
            store.get_express_id_by_global_id("0$WU4A9R19$vKWO$AdOnAA"),
            Some(1)
        );
    }

    #[test]
    fn global_id_validity() {
        assert!(is_valid_global_id("0$WU4A9R19$vKWO$AdOnAA"));
        assert!(!is_valid_global_id("too-short"));
    }
}
