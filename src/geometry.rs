use glam::Vec3;

use crate::error::{Result, ViewerError};


/// Validated CPU-side copy of a layer's mesh.
#[derive(Debug, Clone)]
pub struct LayerGeometry {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<f32>>,
    pub color: [f32; 4],
}
impl LayerGeometry {
    /// Checks that the arrays describe a triangle list. `name` is used for error reporting.
    pub fn new(
        name: &str,
        vertices: Vec<f32>,
        indices: Vec<u32>,
        normals: Option<Vec<f32>>,
        color: &[f32],
    ) -> Result<Self> {
        if vertices.len() % 3 != 0 {
            return Err(ViewerError::invalid_layer(
                name,
                format!("{} coordinates is not a multiple of 3", vertices.len()),
            ));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(ViewerError::invalid_layer(name, "non-finite coordinate"));
        }
        if indices.len() % 3 != 0 {
            return Err(ViewerError::invalid_layer(
                name,
                format!("{} indices is not a multiple of 3", indices.len()),
            ));
        }
        let num_vertices = vertices.len() / 3;
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= num_vertices) {
            return Err(ViewerError::invalid_layer(
                name,
                format!("index {} out of range for {} vertices", bad, num_vertices),
            ));
        }
        if let Some(normals) = &normals {
            if normals.len() != vertices.len() {
                return Err(ViewerError::invalid_layer(
                    name,
                    format!(
                        "{} normal components for {} coordinates",
                        normals.len(),
                        vertices.len()
                    ),
                ));
            }
        }

        Ok(Self {
            vertices,
            indices,
            normals,
            color: parse_color(name, color)?,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.chunks_exact(3).map(Vec3::from_slice)
    }

    /// Axis-aligned bounds, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.points();
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }
}


/// RGB or RGBA in 0..1; alpha defaults to opaque.
fn parse_color(name: &str, color: &[f32]) -> Result<[f32; 4]> {
    let rgba = match *color {
        [r, g, b] => [r, g, b, 1.0],
        [r, g, b, a] => [r, g, b, a],
        _ => {
            return Err(ViewerError::invalid_layer(
                name,
                format!("color needs 3 or 4 components, got {}", color.len()),
            ))
        }
    };
    if rgba.iter().any(|c| !c.is_finite()) {
        return Err(ViewerError::invalid_layer(name, "non-finite color component"));
    }
    Ok(rgba.map(|c| c.clamp(0.0, 1.0)))
}


/// Area-weighted vertex normals for an indexed triangle list.
pub fn compute_normals(vertices: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut accum = vec![Vec3::ZERO; vertices.len() / 3];
    let point = |i: u32| Vec3::from_slice(&vertices[i as usize * 3..i as usize * 3 + 3]);

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (point(tri[0]), point(tri[1]), point(tri[2]));
        // cross product length is twice the triangle area
        let n = (b - a).cross(c - a);
        for &i in tri {
            accum[i as usize] += n;
        }
    }

    accum
        .into_iter()
        .flat_map(|n| n.normalize_or_zero().to_array())
        .collect()
}
