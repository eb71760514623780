//! Spatial hierarchy: Project -> Site -> Building -> Storey -> (Space,
//! Element), built from `IfcRelAggregates` during Phase D.

use rustc_hash::FxHashMap;

pub const DEFAULT_STOREY_HEIGHT: f64 = 3.0;

#[derive(Debug, Clone, Default)]
pub struct Storey {
    pub express_id: u32,
    pub elevation: f64,
    /// Gap to the next storey up by elevation. The topmost storey in its
    /// building has no "next" storey, so it defaults to the average of the
    /// other observed heights, or `DEFAULT_STOREY_HEIGHT` if there are none
    /// (spec §4.3 Phase D, step 3).
    pub height: f64,
}

#[derive(Debug, Default)]
pub struct SpatialHierarchy {
    pub project: Option<u32>,
    sites: Vec<u32>,
    buildings: FxHashMap<u32, Vec<u32>>,
    storeys: FxHashMap<u32, Vec<Storey>>,
    parent_of: FxHashMap<u32, u32>,
}

impl SpatialHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_project(&mut self, express_id: u32) {
        self.project = Some(express_id);
    }

    pub fn add_site(&mut self, site: u32) {
        self.sites.push(site);
        if let Some(p) = self.project {
            self.parent_of.insert(site, p);
        }
    }

    pub fn add_building(&mut self, site: u32, building: u32) {
        self.buildings.entry(site).or_default().push(building);
        self.parent_of.insert(building, site);
    }

    pub fn add_storey(&mut self, building: u32, storey: u32, elevation: f64) {
        self.storeys.entry(building).or_default().push(Storey {
            express_id: storey,
            elevation,
            height: 0.0,
        });
        self.parent_of.insert(storey, building);
    }

    pub fn sites(&self) -> &[u32] {
        &self.sites
    }

    pub fn buildings_of(&self, site: u32) -> &[u32] {
        self.buildings.get(&site).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn storeys_of(&self, building: u32) -> &[Storey] {
        self.storeys.get(&building).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent_of(&self, express_id: u32) -> Option<u32> {
        self.parent_of.get(&express_id).copied()
    }

    /// Sort each building's storeys by elevation and derive `height` as the
    /// gap to the next storey up, falling back for the topmost storey to the
    /// average of the other observed heights, or `DEFAULT_STOREY_HEIGHT` if
    /// there is only one storey in the building (spec §4.3 Phase D, step 3;
    /// spec.md edge case: "a single-storey model's `storeyHeights` is empty"
    /// refers to the *derived-from-gaps* set, not this per-storey `height`
    /// field, which always resolves to a value).
    pub fn finalize_storey_heights(&mut self) {
        for storeys in self.storeys.values_mut() {
            storeys.sort_by(|a, b| a.elevation.partial_cmp(&b.elevation).unwrap());

            let mut gaps = Vec::with_capacity(storeys.len().saturating_sub(1));
            for i in 0..storeys.len().saturating_sub(1) {
                gaps.push(storeys[i + 1].elevation - storeys[i].elevation);
            }

            let fallback = if gaps.is_empty() {
                DEFAULT_STOREY_HEIGHT
            } else {
                gaps.iter().sum::<f64>() / gaps.len() as f64
            };

            let n = storeys.len();
            for (i, storey) in storeys.iter_mut().enumerate() {
                storey.height = if i + 1 < n { gaps[i] } else { fallback };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storey_heights_derive_from_elevation_gaps() {
        let mut h = SpatialHierarchy::new();
        h.set_project(1);
        h.add_site(2);
        h.add_building(2, 3);
        h.add_storey(3, 10, 0.0);
        h.add_storey(3, 11, 3.0);
        h.add_storey(3, 12, 6.5);
        h.finalize_storey_heights();

        let storeys = h.storeys_of(3);
        assert_eq!(storeys[0].express_id, 10);
        assert_eq!(storeys[0].height, 3.0);
        assert_eq!(storeys[1].height, 3.5);
        assert_eq!(storeys[2].height, 3.25, "topmost defaults to average of observed gaps");
    }

    #[test]
    fn single_storey_defaults_to_three_metres() {
        let mut h = SpatialHierarchy::new();
        h.set_project(1);
        h.add_site(2);
        h.add_building(2, 3);
        h.add_storey(3, 10, 0.0);
        h.finalize_storey_heights();
        assert_eq!(h.storeys_of(3)[0].height, DEFAULT_STOREY_HEIGHT);
    }

    #[test]
    fn parent_chain_walks_up() {
        let mut h = SpatialHierarchy::new();
        h.set_project(1);
        h.add_site(2);
        h.add_building(2, 3);
        assert_eq!(h.parent_of(2), Some(1));
        assert_eq!(h.parent_of(3), Some(2));
        assert_eq!(h.parent_of(999), None);
    }
}
