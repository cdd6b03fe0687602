//! # Primitive Shape Generation
//!
//! Flat subdivided surfaces for the sand layers and the floor, plus normal
//! reconstruction for imported meshes that ship without normals.

use super::GeometryData;

/// Builds a flat grid in the XY plane, centered at the origin
///
/// # Arguments
/// * `width` - Extent along X
/// * `height` - Extent along Y
/// * `resolution` - Quads per side; values below 1 are treated as 1
///
/// The grid has `(resolution + 1)²` vertices and `2 · resolution²` triangles.
/// Its face normal is +Z; rotating it by 3π/2 (or −π/2) about X makes it face
/// up in world space. Row 0 is the top edge (`+height / 2`) and maps to
/// texture row 0, so images appear upright when viewed from +Z.
pub fn build_surface(width: f32, height: f32, resolution: u32) -> GeometryData {
    let segments = resolution.max(1);
    let row_len = segments + 1;

    let vertex_total = (row_len * row_len) as usize;
    let mut data = GeometryData {
        vertices: Vec::with_capacity(vertex_total),
        tex_coords: Vec::with_capacity(vertex_total),
        normals: Vec::with_capacity(vertex_total),
        indices: Vec::with_capacity((segments * segments * 6) as usize),
    };

    for row in 0..=segments {
        let v = row as f32 / segments as f32;
        let pos_y = (0.5 - v) * height;

        for col in 0..=segments {
            let u = col as f32 / segments as f32;
            let pos_x = (u - 0.5) * width;

            data.vertices.push([pos_x, pos_y, 0.0]);
            data.normals.push([0.0, 0.0, 1.0]);
            data.tex_coords.push([u, v]);
        }
    }

    // Counter-clockwise when viewed from +Z
    for row in 0..segments {
        for col in 0..segments {
            let a = row * row_len + col;
            let b = a + row_len;

            data.indices.extend_from_slice(&[a, b, a + 1]);
            data.indices.extend_from_slice(&[b, b + 1, a + 1]);
        }
    }

    data
}

/// Averages face normals into per-vertex normals
///
/// Used for imported meshes that carry no normal stream. Vertices not
/// referenced by any triangle keep a +Y normal.
pub fn calculate_vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![[0.0f32; 3]; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }

        let (v0, v1, v2) = (positions[i0], positions[i1], positions[i2]);
        let edge1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
        let edge2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

        let face_normal = [
            edge1[1] * edge2[2] - edge1[2] * edge2[1],
            edge1[2] * edge2[0] - edge1[0] * edge2[2],
            edge1[0] * edge2[1] - edge1[1] * edge2[0],
        ];

        for &vertex_idx in &[i0, i1, i2] {
            for axis in 0..3 {
                normals[vertex_idx][axis] += face_normal[axis];
            }
        }
    }

    for normal in normals.iter_mut() {
        let length = (normal[0].powi(2) + normal[1].powi(2) + normal[2].powi(2)).sqrt();
        *normal = if length > 0.0 {
            [normal[0] / length, normal[1] / length, normal[2] / length]
        } else {
            [0.0, 1.0, 0.0]
        };
    }

    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_counts_scale_with_resolution() {
        for resolution in [1u32, 2, 3, 7, 16, 64] {
            let surface = build_surface(1.0, 1.0, resolution);
            let side = (resolution + 1) as usize;
            assert_eq!(surface.vertex_count(), side * side);
            assert_eq!(surface.triangle_count(), 2 * (resolution * resolution) as usize);
            assert_eq!(surface.normals.len(), surface.vertex_count());
            assert_eq!(surface.tex_coords.len(), surface.vertex_count());
        }
    }

    #[test]
    fn test_zero_resolution_is_a_single_quad() {
        let surface = build_surface(1.0, 1.0, 0);
        assert_eq!(surface.vertex_count(), 4);
        assert_eq!(surface.triangle_count(), 2);
    }

    #[test]
    fn test_surface_spans_requested_extent() {
        let surface = build_surface(2.0, 4.0, 10);
        let (min_x, max_x) = surface
            .vertices
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v[0]), hi.max(v[0])));
        let (min_y, max_y) = surface
            .vertices
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v[1]), hi.max(v[1])));
        assert_eq!((min_x, max_x), (-1.0, 1.0));
        assert_eq!((min_y, max_y), (-2.0, 2.0));
        assert!(surface.vertices.iter().all(|v| v[2] == 0.0));
    }

    #[test]
    fn test_indices_stay_in_bounds() {
        let surface = build_surface(1.0, 1.0, 9);
        let count = surface.vertex_count() as u32;
        assert!(surface.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn test_winding_faces_positive_z() {
        let surface = build_surface(1.0, 1.0, 4);
        let normals = calculate_vertex_normals(&surface.vertices, &surface.indices);
        for normal in normals {
            assert!((normal[2] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_unreferenced_vertices_point_up() {
        let normals = calculate_vertex_normals(&[[0.0; 3], [1.0, 0.0, 0.0]], &[]);
        assert_eq!(normals, vec![[0.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
    }
}
