//! Stable type-tag enumeration shared by the parser and the writer.
//!
//! Values are fixed on-disk constants (spec §6): on-disk caches keyed by
//! `TypeTag as u16` must stay compatible across versions, so numbers are
//! never renumbered, only added to.

use serde::{Deserialize, Serialize};

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    // Spatial structure
    Project = 1,
    Site = 2,
    Building = 3,
    BuildingStorey = 4,
    Space = 5,

    // Building elements
    Wall = 10,
    WallStandardCase = 11,
    Door = 12,
    Window = 13,
    Slab = 14,
    Column = 15,
    Beam = 16,
    Stair = 17,
    Ramp = 18,
    Roof = 19,
    Railing = 20,
    FurnishingElement = 21,
    FlowSegment = 22,
    FlowFitting = 23,
    FlowTerminal = 24,
    DistributionElement = 25,
    CivilElement = 26,
    BuildingElementProxy = 27,

    // Openings
    OpeningElement = 30,

    // Relationships
    RelAggregates = 100,
    RelContainedInSpatialStructure = 101,
    RelDefinesByProperties = 102,
    RelDefinesByType = 103,
    RelVoidsElement = 104,
    RelFillsElement = 105,
    RelAssociatesMaterial = 106,
    RelAssociatesClassification = 107,
    RelConnectsPathElements = 108,
    RelSpaceBoundary = 109,

    // Property / quantity entities
    PropertySet = 200,
    PropertySingleValue = 201,
    ElementQuantity = 202,
    QuantityLength = 203,
    QuantityArea = 204,
    QuantityVolume = 205,
    QuantityCount = 206,
    QuantityWeight = 207,
    Material = 208,
    MaterialLayer = 209,
    MaterialLayerSet = 210,
    SurfaceStyle = 211,
    ColourRgb = 212,
    SurfaceStyleRendering = 213,
    StyledItem = 214,
    Classification = 215,

    // Type/representation-graph definitions
    RectangleProfileDef = 300,
    CircleProfileDef = 301,
    EllipseProfileDef = 302,
    IShapeProfileDef = 303,
    ArbitraryClosedProfileDef = 304,
    ExtrudedAreaSolid = 305,
    BooleanClippingResult = 306,
    BooleanResult = 307,
    FacetedBrep = 308,
    TriangulatedFaceSet = 309,
    SweptDiskSolid = 310,
    ShapeRepresentation = 311,
    ProductDefinitionShape = 312,
    Axis2Placement3D = 313,
    LocalPlacement = 314,
    CartesianPoint = 315,
    Direction = 316,

    Unknown = 9999,
}

impl TypeTag {
    /// Map an uppercase IFC type name (as it appears in STEP data) to its tag.
    pub fn from_name(name: &str) -> Self {
        match name {
            "IFCPROJECT" => Self::Project,
            "IFCSITE" => Self::Site,
            "IFCBUILDING" => Self::Building,
            "IFCBUILDINGSTOREY" => Self::BuildingStorey,
            "IFCSPACE" => Self::Space,

            "IFCWALL" => Self::Wall,
            "IFCWALLSTANDARDCASE" => Self::WallStandardCase,
            "IFCDOOR" => Self::Door,
            "IFCWINDOW" => Self::Window,
            "IFCSLAB" => Self::Slab,
            "IFCCOLUMN" => Self::Column,
            "IFCBEAM" => Self::Beam,
            "IFCSTAIR" | "IFCSTAIRFLIGHT" => Self::Stair,
            "IFCRAMP" | "IFCRAMPFLIGHT" => Self::Ramp,
            "IFCROOF" => Self::Roof,
            "IFCRAILING" => Self::Railing,
            "IFCFURNISHINGELEMENT" => Self::FurnishingElement,
            "IFCFLOWSEGMENT" | "IFCPIPESEGMENT" | "IFCDUCTSEGMENT" => Self::FlowSegment,
            "IFCFLOWFITTING" | "IFCPIPEFITTING" | "IFCDUCTFITTING" => Self::FlowFitting,
            "IFCFLOWTERMINAL" => Self::FlowTerminal,
            "IFCDISTRIBUTIONELEMENT" => Self::DistributionElement,
            "IFCCIVILELEMENT" => Self::CivilElement,
            "IFCBUILDINGELEMENTPROXY" | "IFCPROXY" => Self::BuildingElementProxy,

            "IFCOPENINGELEMENT" => Self::OpeningElement,

            "IFCRELAGGREGATES" => Self::RelAggregates,
            "IFCRELCONTAINEDINSPATIALSTRUCTURE" => Self::RelContainedInSpatialStructure,
            "IFCRELDEFINESBYPROPERTIES" => Self::RelDefinesByProperties,
            "IFCRELDEFINESBYTYPE" => Self::RelDefinesByType,
            "IFCRELVOIDSELEMENT" => Self::RelVoidsElement,
            "IFCRELFILLSELEMENT" => Self::RelFillsElement,
            "IFCRELASSOCIATESMATERIAL" => Self::RelAssociatesMaterial,
            "IFCRELASSOCIATESCLASSIFICATION" => Self::RelAssociatesClassification,
            "IFCRELCONNECTSPATHELEMENTS" => Self::RelConnectsPathElements,
            "IFCRELSPACEBOUNDARY" | "IFCRELSPACEBOUNDARY2NDLEVEL" => Self::RelSpaceBoundary,

            "IFCPROPERTYSET" => Self::PropertySet,
            "IFCPROPERTYSINGLEVALUE" => Self::PropertySingleValue,
            "IFCELEMENTQUANTITY" => Self::ElementQuantity,
            "IFCQUANTITYLENGTH" => Self::QuantityLength,
            "IFCQUANTITYAREA" => Self::QuantityArea,
            "IFCQUANTITYVOLUME" => Self::QuantityVolume,
            "IFCQUANTITYCOUNT" => Self::QuantityCount,
            "IFCQUANTITYWEIGHT" => Self::QuantityWeight,
            "IFCMATERIAL" => Self::Material,
            "IFCMATERIALLAYER" => Self::MaterialLayer,
            "IFCMATERIALLAYERSET" => Self::MaterialLayerSet,
            "IFCSURFACESTYLE" => Self::SurfaceStyle,
            "IFCCOLOURRGB" => Self::ColourRgb,
            "IFCSURFACESTYLERENDERING" => Self::SurfaceStyleRendering,
            "IFCSTYLEDITEM" => Self::StyledItem,
            "IFCCLASSIFICATION" => Self::Classification,

            "IFCRECTANGLEPROFILEDEF" => Self::RectangleProfileDef,
            "IFCCIRCLEPROFILEDEF" => Self::CircleProfileDef,
            "IFCELLIPSEPROFILEDEF" => Self::EllipseProfileDef,
            "IFCISHAPEPROFILEDEF" => Self::IShapeProfileDef,
            "IFCARBITRARYCLOSEDPROFILEDEF" => Self::ArbitraryClosedProfileDef,
            "IFCEXTRUDEDAREASOLID" => Self::ExtrudedAreaSolid,
            "IFCBOOLEANCLIPPINGRESULT" => Self::BooleanClippingResult,
            "IFCBOOLEANRESULT" => Self::BooleanResult,
            "IFCFACETEDBREP" => Self::FacetedBrep,
            "IFCTRIANGULATEDFACESET" => Self::TriangulatedFaceSet,
            "IFCSWEPTDISKSOLID" => Self::SweptDiskSolid,
            "IFCSHAPEREPRESENTATION" => Self::ShapeRepresentation,
            "IFCPRODUCTDEFINITIONSHAPE" => Self::ProductDefinitionShape,
            "IFCAXIS2PLACEMENT3D" => Self::Axis2Placement3D,
            "IFCLOCALPLACEMENT" => Self::LocalPlacement,
            "IFCCARTESIANPOINT" => Self::CartesianPoint,
            "IFCDIRECTION" => Self::Direction,

            _ => Self::Unknown,
        }
    }

    /// True for the product-like entities the parser eagerly decodes
    /// instead of leaving as a raw byte range (spec §4.3 Phase B, step 2).
    pub fn is_product_like(self) -> bool {
        matches!(
            self,
            Self::Wall
                | Self::WallStandardCase
                | Self::Door
                | Self::Window
                | Self::Slab
                | Self::Column
                | Self::Beam
                | Self::Stair
                | Self::Ramp
                | Self::Roof
                | Self::Railing
                | Self::FurnishingElement
                | Self::FlowSegment
                | Self::FlowFitting
                | Self::FlowTerminal
                | Self::DistributionElement
                | Self::CivilElement
                | Self::BuildingElementProxy
                | Self::Space
                | Self::OpeningElement
        )
    }

    pub fn is_spatial(self) -> bool {
        matches!(
            self,
            Self::Project | Self::Site | Self::Building | Self::BuildingStorey | Self::Space
        )
    }

    pub fn is_relationship(self) -> bool {
        matches!(self as u16, 100..=109)
    }
}

/// Bitset flags stored per entity row (spec §3 EntityRecord.flags).
pub mod flags {
    pub const HAS_GEOMETRY: u8 = 1 << 0;
    pub const HAS_PROPERTIES: u8 = 1 << 1;
    pub const HAS_QUANTITIES: u8 = 1 << 2;
    pub const IS_TYPE: u8 = 1 << 3;
    pub const HAS_OPENINGS: u8 = 1 << 4;
    pub const IS_FILLING: u8 = 1 << 5;
    pub const HIDDEN: u8 = 1 << 6;
    pub const ISOLATED: u8 = 1 << 7;
}

/// Schema version recorded in the STEP header (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemaVersion {
    Ifc2x3,
    #[default]
    Ifc4,
    Ifc4x3,
}

impl SchemaVersion {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_uppercase().as_str() {
            "IFC2X3" => Some(Self::Ifc2x3),
            "IFC4" => Some(Self::Ifc4),
            "IFC4X3" => Some(Self::Ifc4x3),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Ifc2x3 => "IFC2X3",
            Self::Ifc4 => "IFC4",
            Self::Ifc4x3 => "IFC4X3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_round_trips_known_types() {
        assert_eq!(TypeTag::from_name("IFCWALL"), TypeTag::Wall);
        assert_eq!(TypeTag::from_name("ifcwall"), TypeTag::Unknown); // case-sensitive by design: callers upper-case first
        assert_eq!(TypeTag::from_name("IFCFROBNICATOR"), TypeTag::Unknown);
    }

    #[test]
    fn schema_token_round_trip() {
        for s in [SchemaVersion::Ifc2x3, SchemaVersion::Ifc4, SchemaVersion::Ifc4x3] {
            assert_eq!(SchemaVersion::from_token(s.as_token()), Some(s));
        }
        assert_eq!(SchemaVersion::from_token("IFC5"), None);
    }
}
