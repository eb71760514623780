//! Indexed triangle mesh storage (spec §3 MeshData). Mutation lives in
//! `ifc-edit`; this crate only owns the data shape and the per-model store
//! mesh editing replaces entries in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Tight-packed xyz triples for positions/normals, 32-bit triangle indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub express_id: u32,
    pub positions: Vec<f64>,
    pub normals: Vec<f64>,
    pub indices: Vec<u32>,
    pub base_color: Rgba,
    pub model_index: u32,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex(&self, i: usize) -> [f64; 3] {
        [self.positions[i * 3], self.positions[i * 3 + 1], self.positions[i * 3 + 2]]
    }

    pub fn normal(&self, i: usize) -> [f64; 3] {
        [self.normals[i * 3], self.normals[i * 3 + 1], self.normals[i * 3 + 2]]
    }
}

/// Append-only store of meshes, indexed by the `geometryIndex` an
/// EntityStore row carries (spec §3 EntityRecord.geometryIndex).
#[derive(Debug, Default)]
pub struct GeometryStore {
    meshes: Vec<MeshData>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mesh: MeshData) -> u32 {
        let idx = self.meshes.len() as u32;
        self.meshes.push(mesh);
        idx
    }

    pub fn get(&self, index: u32) -> Option<&MeshData> {
        self.meshes.get(index as usize)
    }

    /// Replace a mesh in place — used by the Mesh Editor, which always
    /// produces a full replacement rather than an incremental patch.
    pub fn replace(&mut self, index: u32, mesh: MeshData) -> Option<MeshData> {
        self.meshes.get_mut(index as usize).map(|slot| std::mem::replace(slot, mesh))
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData {
            express_id: 1,
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
            base_color: Rgba { r: 1.0, g: 1.0, b: 1.0, a: 1.0 },
            model_index: 0,
        }
    }

    #[test]
    fn counts_derive_from_flat_buffers() {
        let mesh = triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex(1), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn store_replace_swaps_in_place() {
        let mut store = GeometryStore::new();
        let idx = store.push(triangle());
        let mut bigger = triangle();
        bigger.indices.extend_from_slice(&[0, 2, 1]);
        store.replace(idx, bigger);
        assert_eq!(store.get(idx).unwrap().triangle_count(), 2);
    }
}
