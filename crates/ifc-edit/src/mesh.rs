//! Mesh Editor: direct vertex/edge/face move/scale/extrude on indexed
//! triangle meshes, for products without a parametric representation (spec
//! §4.6). Grounded in `cadhy-mesh::types::SurfaceMesh`'s vertex/triangle
//! layout and its `compute_flat_normals` accumulate-then-renormalize
//! technique, generalized here from a whole-mesh recompute to the
//! spec-mandated affected-subset recompute.

use ifc_core::geometry::MeshData;
use ifc_core::CoreError;
use std::collections::HashSet;

use crate::params::MIN_EDGE_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Vertex(Vec<u32>),
    Edge(u32, u32),
    Face(u32),
}

impl Selection {
    fn vertex_indices(&self, mesh: &MeshData) -> Option<Vec<u32>> {
        match self {
            Selection::Vertex(vs) => {
                if vs.iter().any(|&v| v as usize >= mesh.vertex_count()) {
                    return None;
                }
                Some(vs.clone())
            }
            Selection::Edge(i0, i1) => {
                if *i0 as usize >= mesh.vertex_count() || *i1 as usize >= mesh.vertex_count() {
                    return None;
                }
                Some(vec![*i0, *i1])
            }
            Selection::Face(tri) => {
                if *tri as usize >= mesh.triangle_count() {
                    return None;
                }
                let base = *tri as usize * 3;
                Some(mesh.indices[base..base + 3].to_vec())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditResult {
    pub success: bool,
    pub reason: Option<String>,
}

impl EditResult {
    fn ok() -> Self {
        Self { success: true, reason: None }
    }

    /// Renders the failure through [`CoreError::MeshEditInvalid`] so the
    /// reason text stays consistent with every other rejected-edit path in
    /// the workspace, even though `EditResult` itself isn't a `Result`.
    fn fail(reason: impl Into<String>) -> Self {
        let err = CoreError::MeshEditInvalid { reason: reason.into() };
        tracing::warn!(%err, "mesh edit rejected");
        Self { success: false, reason: Some(err.to_string()) }
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale3(a: [f64; 3], f: f64) -> [f64; 3] {
    [a[0] * f, a[1] * f, a[2] * f]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn length(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn normalize(a: [f64; 3]) -> [f64; 3] {
    let len = length(a);
    if len > 1e-10 { scale3(a, 1.0 / len) } else { [0.0, 0.0, 1.0] }
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

fn set_vertex(mesh: &mut MeshData, i: usize, v: [f64; 3]) {
    mesh.positions[i * 3] = v[0];
    mesh.positions[i * 3 + 1] = v[1];
    mesh.positions[i * 3 + 2] = v[2];
}

fn set_normal(mesh: &mut MeshData, i: usize, n: [f64; 3]) {
    mesh.normals[i * 3] = n[0];
    mesh.normals[i * 3 + 1] = n[1];
    mesh.normals[i * 3 + 2] = n[2];
}

/// Average surface normal over a selection's vertices, used to project a
/// `constrainToNormal` move delta (spec §4.6 move()).
fn selection_normal(mesh: &MeshData, vertices: &[u32]) -> [f64; 3] {
    let mut acc = [0.0, 0.0, 0.0];
    for &v in vertices {
        acc = add(acc, mesh.normal(v as usize));
    }
    normalize(acc)
}

/// **move(selection, delta, constrainToNormal?, axisLock?)** — spec §4.6.
pub fn move_selection(mesh: &mut MeshData, selection: &Selection, mut delta: [f64; 3], constrain_to_normal: bool, axis_lock: Option<Axis>, grid_snap: f64) -> EditResult {
    let Some(vertices) = selection.vertex_indices(mesh) else {
        return EditResult::fail("selection index out of range");
    };

    if constrain_to_normal {
        let n = selection_normal(mesh, &vertices);
        delta = scale3(n, dot(delta, n));
    }

    if let Some(axis) = axis_lock {
        delta = match axis {
            Axis::X => [delta[0], 0.0, 0.0],
            Axis::Y => [0.0, delta[1], 0.0],
            Axis::Z => [0.0, 0.0, delta[2]],
        };
    }

    if grid_snap > 0.0 {
        delta = [
            (delta[0] / grid_snap).round() * grid_snap,
            (delta[1] / grid_snap).round() * grid_snap,
            (delta[2] / grid_snap).round() * grid_snap,
        ];
    }

    if let Selection::Edge(i0, i1) = selection {
        let new_v0 = add(mesh.vertex(*i0 as usize), delta);
        let new_v1 = add(mesh.vertex(*i1 as usize), delta);
        if length(sub(new_v1, new_v0)) < MIN_EDGE_LENGTH {
            return EditResult::fail("edge would collapse below minimum length");
        }
    }

    for &v in &vertices {
        let moved = add(mesh.vertex(v as usize), delta);
        set_vertex(mesh, v as usize, moved);
    }

    recompute_affected_normals(mesh, &vertices);
    EditResult::ok()
}

/// **scale(selection, factor)** — spec §4.6: scale affected vertices around
/// their centroid.
pub fn scale_selection(mesh: &mut MeshData, selection: &Selection, factor: f64) -> EditResult {
    let Some(vertices) = selection.vertex_indices(mesh) else {
        return EditResult::fail("selection index out of range");
    };

    let mut centroid = [0.0, 0.0, 0.0];
    for &v in &vertices {
        centroid = add(centroid, mesh.vertex(v as usize));
    }
    centroid = scale3(centroid, 1.0 / vertices.len() as f64);

    if let Selection::Edge(i0, i1) = selection {
        let v0 = add(centroid, scale3(sub(mesh.vertex(*i0 as usize), centroid), factor));
        let v1 = add(centroid, scale3(sub(mesh.vertex(*i1 as usize), centroid), factor));
        if length(sub(v1, v0)) < MIN_EDGE_LENGTH {
            return EditResult::fail("edge would collapse below minimum length");
        }
    }

    for &v in &vertices {
        let p = mesh.vertex(v as usize);
        let scaled = add(centroid, scale3(sub(p, centroid), factor));
        set_vertex(mesh, v as usize, scaled);
    }

    recompute_affected_normals(mesh, &vertices);
    EditResult::ok()
}

/// **extrude(face, delta)** — grows the mesh by exactly 9 vertices and 7
/// triangles: the original face is flipped in place as the bottom cap, 3
/// new vertices form the top cap, and each of the 3 side quads gets its own
/// flat-shaded copies of its top corners (bottom corners are reused as-is).
pub fn extrude_face(mesh: &mut MeshData, face: u32, delta: [f64; 3]) -> EditResult {
    if face as usize >= mesh.triangle_count() {
        return EditResult::fail("face index out of range");
    }

    let base = face as usize * 3;
    let [i0, i1, i2] = [mesh.indices[base], mesh.indices[base + 1], mesh.indices[base + 2]];
    let [v0, v1, v2] = [mesh.vertex(i0 as usize), mesh.vertex(i1 as usize), mesh.vertex(i2 as usize)];

    let bottom_normal = normalize(cross(sub(v1, v0), sub(v2, v0)));
    let top_normal = scale3(bottom_normal, -1.0);
    if length(delta) < MIN_EDGE_LENGTH {
        return EditResult::fail("extrude delta too small");
    }

    // Flip the original face's winding so it points inward (becomes the
    // solid's bottom cap).
    mesh.indices[base] = i0;
    mesh.indices[base + 1] = i2;
    mesh.indices[base + 2] = i1;

    fn push_vertex(mesh: &mut MeshData, pos: [f64; 3], normal: [f64; 3]) -> u32 {
        let idx = mesh.vertex_count() as u32;
        mesh.positions.extend_from_slice(&pos);
        mesh.normals.extend_from_slice(&normal);
        idx
    }

    // Three new top-face vertices, facing outward along top_normal.
    let top0 = add(v0, delta);
    let top1 = add(v1, delta);
    let top2 = add(v2, delta);
    let t0 = push_vertex(mesh, top0, top_normal);
    let t1 = push_vertex(mesh, top1, top_normal);
    let t2 = push_vertex(mesh, top2, top_normal);
    mesh.indices.extend_from_slice(&[t0, t1, t2]);

    // Each side quad reuses the original (bottom) corner indices directly
    // and gets two fresh per-face-flat copies of its top corners, so the
    // whole extrusion adds exactly 3 (top cap) + 2*3 (side top copies) = 9
    // vertices and 1 (top cap) + 2*3 (side triangles) = 7 triangles.
    let sides = [(i0, i1, top0, top1), (i1, i2, top1, top2), (i2, i0, top2, top0)];

    for (bottom_a, bottom_b, top_a, top_b) in sides {
        let a = mesh.vertex(bottom_a as usize);
        let b = mesh.vertex(bottom_b as usize);
        let side_normal = normalize(cross(sub(b, a), delta));
        let sta = push_vertex(mesh, top_a, side_normal);
        let stb = push_vertex(mesh, top_b, side_normal);
        mesh.indices.extend_from_slice(&[bottom_a, bottom_b, stb, bottom_a, stb, sta]);
    }

    EditResult::ok()
}

/// Recompute normals only for triangles whose vertex set intersects
/// `affected` (spec §4.6 "Normal recomputation"): accumulate face normals
/// into each affected vertex, then renormalize. Unaffected vertices keep
/// their prior accumulated normals.
fn recompute_affected_normals(mesh: &mut MeshData, affected: &[u32]) {
    let affected_set: HashSet<u32> = affected.iter().copied().collect();
    let mut accum = vec![[0.0f64; 3]; affected.len()];
    let index_of: std::collections::HashMap<u32, usize> = affected.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    for tri in 0..mesh.triangle_count() {
        let base = tri * 3;
        let [i0, i1, i2] = [mesh.indices[base], mesh.indices[base + 1], mesh.indices[base + 2]];
        if !affected_set.contains(&i0) && !affected_set.contains(&i1) && !affected_set.contains(&i2) {
            continue;
        }
        let [v0, v1, v2] = [mesh.vertex(i0 as usize), mesh.vertex(i1 as usize), mesh.vertex(i2 as usize)];
        let n = normalize(cross(sub(v1, v0), sub(v2, v0)));
        for i in [i0, i1, i2] {
            if let Some(&slot) = index_of.get(&i) {
                accum[slot] = add(accum[slot], n);
            }
        }
    }

    for (slot, &v) in affected.iter().enumerate() {
        set_normal(mesh, v as usize, normalize(accum[slot]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_core::geometry::Rgba;

    fn quad() -> MeshData {
        MeshData {
            express_id: 1,
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2, 0, 2, 3],
            base_color: Rgba { r: 1.0, g: 1.0, b: 1.0, a: 1.0 },
            model_index: 0,
        }
    }

    #[test]
    fn move_translates_selected_vertices() {
        let mut mesh = quad();
        let result = move_selection(&mut mesh, &Selection::Vertex(vec![0]), [1.0, 0.0, 0.0], false, None, 0.0);
        assert!(result.success);
        assert_eq!(mesh.vertex(0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn move_constrains_to_normal() {
        let mut mesh = quad();
        // Normal is +Z; an in-plane delta should project to zero.
        let result = move_selection(&mut mesh, &Selection::Vertex(vec![0]), [1.0, 1.0, 0.0], true, None, 0.0);
        assert!(result.success);
        assert_eq!(mesh.vertex(0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn move_axis_lock_zeroes_other_components() {
        let mut mesh = quad();
        let result = move_selection(&mut mesh, &Selection::Vertex(vec![0]), [1.0, 2.0, 3.0], false, Some(Axis::Y), 0.0);
        assert!(result.success);
        assert_eq!(mesh.vertex(0), [0.0, 2.0, 0.0]);
    }

    #[test]
    fn move_grid_snap_rounds_delta() {
        let mut mesh = quad();
        let result = move_selection(&mut mesh, &Selection::Vertex(vec![0]), [0.23, 0.0, 0.0], false, None, 0.25);
        assert!(result.success);
        assert_eq!(mesh.vertex(0), [0.25, 0.0, 0.0]);
    }

    #[test]
    fn move_out_of_range_vertex_fails_without_mutating() {
        let mut mesh = quad();
        let before = mesh.positions.clone();
        let result = move_selection(&mut mesh, &Selection::Vertex(vec![99]), [1.0, 0.0, 0.0], false, None, 0.0);
        assert!(!result.success);
        assert_eq!(mesh.positions, before);
    }

    #[test]
    fn move_edge_collapse_is_rejected() {
        // Edge (0,1) runs from (0,0,0) to (1,0,0); both endpoints move
        // together under a Move, so the edge length is unchanged and this
        // must succeed.
        let mut mesh = quad();
        let moved = move_selection(&mut mesh, &Selection::Edge(0, 1), [0.0, 1.0, 0.0], false, None, 0.0);
        assert!(moved.success);

        // Scaling the same edge toward its own centroid by a tiny factor
        // collapses it below the minimum length and must be rejected.
        let mut mesh2 = quad();
        let before = mesh2.positions.clone();
        let collapsed = scale_selection(&mut mesh2, &Selection::Edge(0, 1), 0.0001);
        assert!(!collapsed.success);
        assert_eq!(mesh2.positions, before);
    }

    #[test]
    fn scale_grows_around_centroid() {
        let mut mesh = quad();
        let result = scale_selection(&mut mesh, &Selection::Vertex(vec![0, 1, 2, 3]), 2.0);
        assert!(result.success);
        // centroid of unit quad is (0.5, 0.5, 0); vertex 0 at origin moves to (-0.5,-0.5,0)
        let v = mesh.vertex(0);
        assert!((v[0] - -0.5).abs() < 1e-9);
        assert!((v[1] - -0.5).abs() < 1e-9);
    }

    #[test]
    fn extrude_grows_counts_by_spec_amounts() {
        let mut mesh = quad();
        let before_verts = mesh.vertex_count();
        let before_tris = mesh.triangle_count();
        let result = extrude_face(&mut mesh, 0, [0.0, 0.0, 1.0]);
        assert!(result.success);
        assert_eq!(mesh.vertex_count(), before_verts + 9);
        assert_eq!(mesh.triangle_count(), before_tris + 7);
    }

    #[test]
    fn extrude_out_of_range_face_fails() {
        let mut mesh = quad();
        let result = extrude_face(&mut mesh, 99, [0.0, 0.0, 1.0]);
        assert!(!result.success);
    }
}
