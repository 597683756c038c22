//! Scene layers and their GPU resources.
//!
//! [`Layers`] owns every loaded layer, keeps them in draw order and tracks
//! the centroid and bounding radius the camera frames. CPU-side changes
//! (add, replace, remove, load) never touch GL directly: uploads happen in
//! [`Layers::sync_gpu`] on the render thread, and the buffers of replaced or
//! removed layers are released there too.

use glam::{DVec3, Vec3};
use three_d::context::{self, HasContext};
use three_d::Context;

use crate::error::{Result, ViewerError};
use crate::geometry::{compute_normals, LayerGeometry};
use crate::log; // macro import
use crate::programs::{Programs, ShaderProgram};
use crate::scene::{LayerKind, SceneFile};
use crate::transforms::FrameTransforms;

/// Smallest radius the camera frames, so a single point is still visible.
pub const MIN_RADIUS: f32 = 1.0;


/// Buffers and vertex array of one uploaded layer.
struct GpuMesh {
    vao: context::VertexArray,
    buffers: Vec<context::Buffer>,
    index_count: i32,
}
impl GpuMesh {
    fn upload(gl: &Context, geometry: &LayerGeometry, program: &ShaderProgram) -> Result<Self> {
        let vao = unsafe { gl.create_vertex_array() }.map_err(|message| ViewerError::Gl {
            operation: "create_vertex_array",
            message,
        })?;
        let mut mesh = GpuMesh {
            vao,
            buffers: Vec::with_capacity(3),
            index_count: geometry.indices.len() as i32,
        };

        let filled = mesh.fill(gl, geometry, program);
        unsafe {
            gl.bind_vertex_array(None);
            gl.bind_buffer(context::ARRAY_BUFFER, None);
            gl.bind_buffer(context::ELEMENT_ARRAY_BUFFER, None);
        }
        match filled {
            Ok(()) => Ok(mesh),
            Err(e) => {
                mesh.release(gl);
                Err(e)
            }
        }
    }

    fn fill(&mut self, gl: &Context, geometry: &LayerGeometry, program: &ShaderProgram) -> Result<()> {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));

            let vertex_buffer = self.create_buffer(gl)?;
            gl.bind_buffer(context::ARRAY_BUFFER, Some(vertex_buffer));
            gl.buffer_data_u8_slice(
                context::ARRAY_BUFFER,
                bytemuck::cast_slice(&geometry.vertices),
                context::STATIC_DRAW,
            );
            gl.enable_vertex_attrib_array(program.a_position);
            gl.vertex_attrib_pointer_f32(program.a_position, 3, context::FLOAT, false, 0, 0);

            if let (Some(a_normal), Some(normals)) = (program.a_normal, &geometry.normals) {
                let normal_buffer = self.create_buffer(gl)?;
                gl.bind_buffer(context::ARRAY_BUFFER, Some(normal_buffer));
                gl.buffer_data_u8_slice(
                    context::ARRAY_BUFFER,
                    bytemuck::cast_slice(normals),
                    context::STATIC_DRAW,
                );
                gl.enable_vertex_attrib_array(a_normal);
                gl.vertex_attrib_pointer_f32(a_normal, 3, context::FLOAT, false, 0, 0);
            }

            // element buffer binding is recorded in the bound vao
            let index_buffer = self.create_buffer(gl)?;
            gl.bind_buffer(context::ELEMENT_ARRAY_BUFFER, Some(index_buffer));
            gl.buffer_data_u8_slice(
                context::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&geometry.indices),
                context::STATIC_DRAW,
            );
        }
        Ok(())
    }

    fn create_buffer(&mut self, gl: &Context) -> Result<context::Buffer> {
        let buffer = unsafe { gl.create_buffer() }.map_err(|message| ViewerError::Gl {
            operation: "create_buffer",
            message,
        })?;
        self.buffers.push(buffer);
        Ok(buffer)
    }

    fn draw(&self, gl: &Context) {
        if self.index_count == 0 {
            return;
        }
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_elements(context::TRIANGLES, self.index_count, context::UNSIGNED_INT, 0);
        }
    }

    fn release(&self, gl: &Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            for buffer in &self.buffers {
                gl.delete_buffer(*buffer);
            }
        }
    }
}


/// A named mesh drawn in one colour. Building layers carry normals and are lit.
pub struct Layer {
    name: String,
    kind: LayerKind,
    geometry: LayerGeometry,
    visible: bool,
    gpu: Option<GpuMesh>,
}
impl Layer {
    /// Lit layer. Normals are derived from the triangles when not supplied.
    pub fn building(
        name: &str,
        vertices: Vec<f32>,
        indices: Vec<u32>,
        normals: Option<Vec<f32>>,
        color: &[f32],
    ) -> Result<Self> {
        let mut geometry = LayerGeometry::new(name, vertices, indices, normals, color)?;
        if geometry.normals.is_none() {
            geometry.normals = Some(compute_normals(&geometry.vertices, &geometry.indices));
        }
        Ok(Self::with_geometry(name, LayerKind::Buildings, geometry))
    }

    /// Flat layer. Names other than `water` and `parks` draw with the surface.
    pub fn flat(name: &str, vertices: Vec<f32>, indices: Vec<u32>, color: &[f32]) -> Result<Self> {
        let kind = LayerKind::from_key(name)
            .filter(|k| !k.has_normals())
            .unwrap_or(LayerKind::Surface);
        let geometry = LayerGeometry::new(name, vertices, indices, None, color)?;
        Ok(Self::with_geometry(name, kind, geometry))
    }

    fn with_geometry(name: &str, kind: LayerKind, geometry: LayerGeometry) -> Self {
        Self {
            name: name.to_string(),
            kind,
            geometry,
            visible: true,
            gpu: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn geometry(&self) -> &LayerGeometry {
        &self.geometry
    }

    pub fn color(&self) -> [f32; 4] {
        self.geometry.color
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn vertex_count(&self) -> usize {
        self.geometry.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.geometry.triangle_count()
    }

    fn draw_key(&self) -> (u8, &str) {
        (self.kind.draw_rank(), self.name.as_str())
    }
}


/// Collection of layers.
pub struct Layers {
    layers: Vec<Layer>,
    retired: Vec<GpuMesh>,
    centroid: Vec3,
    radius: f32,
}
impl Default for Layers {
    fn default() -> Self {
        Self::new()
    }
}
impl Layers {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            retired: Vec::new(),
            centroid: Vec3::ZERO,
            radius: MIN_RADIUS,
        }
    }

    pub fn add_building_layer(
        &mut self,
        name: &str,
        vertices: Vec<f32>,
        indices: Vec<u32>,
        normals: Option<Vec<f32>>,
        color: &[f32],
    ) -> Result<()> {
        let layer = Layer::building(name, vertices, indices, normals, color)?;
        self.insert(layer);
        self.refresh_bounds();
        Ok(())
    }

    pub fn add_layer(
        &mut self,
        name: &str,
        vertices: Vec<f32>,
        indices: Vec<u32>,
        color: &[f32],
    ) -> Result<()> {
        let layer = Layer::flat(name, vertices, indices, color)?;
        self.insert(layer);
        self.refresh_bounds();
        Ok(())
    }

    /// Returns false when no layer has that name.
    pub fn remove_layer(&mut self, name: &str) -> bool {
        let Some(pos) = self.position(name) else {
            return false;
        };
        let layer = self.layers.remove(pos);
        self.retire(layer);
        self.refresh_bounds();
        true
    }

    /// Replaces every layer with those of `scene`.
    ///
    /// All layers are validated before anything is replaced, so a bad
    /// document leaves the current scene on screen.
    pub fn load_scene(&mut self, scene: SceneFile) -> Result<()> {
        if scene.is_empty() {
            return Err(ViewerError::EmptyScene);
        }

        let mut staged = Vec::with_capacity(scene.layers().len());
        for (kind, data) in scene.into_layers() {
            let color = data.color.unwrap_or_else(|| kind.default_color().to_vec());
            let layer = if kind.has_normals() {
                Layer::building(kind.key(), data.coordinates, data.indices, data.normals, &color)?
            } else {
                if data.normals.is_some() {
                    log!("Layers::load_scene(): ignoring normals of flat layer '{}'", kind);
                }
                Layer::flat(kind.key(), data.coordinates, data.indices, &color)?
            };
            log!(
                "Layers::load_scene(): {} vertices={} triangles={}",
                kind,
                layer.vertex_count(),
                layer.triangle_count()
            );
            staged.push(layer);
        }

        self.clear();
        for layer in staged {
            self.insert(layer);
        }
        self.refresh_bounds();
        Ok(())
    }

    pub fn clear(&mut self) {
        for layer in std::mem::take(&mut self.layers) {
            self.retire(layer);
        }
        self.refresh_bounds();
    }

    /// Returns false when no layer has that name.
    pub fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.position(name) {
            Some(pos) => {
                self.layers[pos].visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.position(name).map(|pos| &self.layers[pos])
    }

    /// Layers in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn pending_uploads(&self) -> usize {
        self.layers.iter().filter(|l| l.gpu.is_none()).count()
    }

    /// Uploads new layers and frees the buffers of removed ones.
    ///
    /// A layer whose upload fails is dropped; the first such error is returned
    /// after the remaining layers have been processed.
    pub fn sync_gpu(&mut self, gl: &Context, programs: &Programs) -> Result<()> {
        for mesh in self.retired.drain(..) {
            mesh.release(gl);
        }

        let mut first_err = None;
        let mut failed = Vec::new();
        for layer in self.layers.iter_mut().filter(|l| l.gpu.is_none()) {
            let program = programs.for_kind(layer.kind);
            match GpuMesh::upload(gl, &layer.geometry, program) {
                Ok(mesh) => layer.gpu = Some(mesh),
                Err(e) => {
                    log!(
                        "Layers::sync_gpu(): ERROR: layer '{}' ({} program): {}",
                        layer.name,
                        program.name(),
                        e
                    );
                    failed.push(layer.name.clone());
                    first_err.get_or_insert(e);
                }
            }
        }
        if !failed.is_empty() {
            self.layers.retain(|l| !failed.contains(&l.name));
            self.refresh_bounds();
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Draws every visible uploaded layer with this frame's matrices.
    pub fn draw(&self, gl: &Context, programs: &Programs, transforms: &FrameTransforms) {
        let mut current: Option<&ShaderProgram> = None;
        for layer in self.layers.iter().filter(|l| l.visible) {
            let Some(mesh) = &layer.gpu else {
                continue;
            };
            let program = programs.for_kind(layer.kind);
            if !current.is_some_and(|p| std::ptr::eq(p, program)) {
                program.use_program(gl);
                program.set_transforms(gl, transforms);
                current = Some(program);
            }
            program.set_color(gl, layer.color());
            mesh.draw(gl);
        }
        unsafe {
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
    }

    /// Frees every GPU resource. The layers stay and are re-uploaded on the next sync.
    pub fn release(&mut self, gl: &Context) {
        for mesh in self.retired.drain(..) {
            mesh.release(gl);
        }
        for layer in &mut self.layers {
            if let Some(mesh) = layer.gpu.take() {
                mesh.release(gl);
            }
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    fn insert(&mut self, layer: Layer) {
        if let Some(pos) = self.position(&layer.name) {
            let old = self.layers.remove(pos);
            self.retire(old);
        }
        self.layers.push(layer);
        self.layers.sort_by(|a, b| a.draw_key().cmp(&b.draw_key()));
    }

    fn retire(&mut self, mut layer: Layer) {
        if let Some(mesh) = layer.gpu.take() {
            self.retired.push(mesh);
        }
    }

    fn refresh_bounds(&mut self) {
        // summed in f64: projected-metre coordinates swamp an f32 accumulator
        let (sum, count) = self
            .layers
            .iter()
            .flat_map(|l| l.geometry.points())
            .fold((DVec3::ZERO, 0usize), |(sum, n), p| (sum + p.as_dvec3(), n + 1));
        if count == 0 {
            self.centroid = Vec3::ZERO;
            self.radius = MIN_RADIUS;
            return;
        }

        let centroid = (sum / count as f64).as_vec3();
        let radius = self
            .layers
            .iter()
            .flat_map(|l| l.geometry.points())
            .map(|p| p.distance(centroid))
            .fold(0.0f32, f32::max);
        self.centroid = centroid;
        self.radius = radius.max(MIN_RADIUS);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const GREY: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

    fn quad(x: f32, y: f32, size: f32) -> (Vec<f32>, Vec<u32>) {
        (
            vec![
                x, y, 0.0,
                x + size, y, 0.0,
                x + size, y + size, 0.0,
                x, y + size, 0.0,
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn empty_collection_has_origin_centroid() {
        let layers = Layers::new();
        assert_eq!(layers.centroid(), Vec3::ZERO);
        assert_eq!(layers.radius(), MIN_RADIUS);
        assert!(layers.is_empty());
    }

    #[test]
    fn centroid_weights_every_vertex_equally() {
        let mut layers = Layers::new();
        let (v, i) = quad(0.0, 0.0, 2.0);
        layers.add_layer("surface", v, i, &GREY).unwrap();
        layers
            .add_layer("water", vec![10.0, 1.0, 0.0], vec![], &GREY)
            .unwrap();
        // (0+2+2+0+10)/5, (0+0+2+2+1)/5
        assert!(layers.centroid().abs_diff_eq(Vec3::new(2.8, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn removing_a_layer_recomputes_centroid() {
        let mut layers = Layers::new();
        let (v, i) = quad(0.0, 0.0, 2.0);
        layers.add_layer("surface", v, i, &GREY).unwrap();
        let (v, i) = quad(100.0, 100.0, 2.0);
        layers.add_building_layer("buildings", v, i, None, &GREY).unwrap();

        assert!(layers.remove_layer("buildings"));
        assert!(layers.centroid().abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));
        assert!(!layers.remove_layer("buildings"));
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn same_name_replaces_layer() {
        let mut layers = Layers::new();
        let (v, i) = quad(0.0, 0.0, 1.0);
        layers.add_layer("parks", v, i, &GREY).unwrap();
        let (v, i) = quad(50.0, 0.0, 1.0);
        layers.add_layer("parks", v, i, &[0.0, 1.0, 0.0]).unwrap();

        assert_eq!(layers.len(), 1);
        let parks = layers.get("parks").unwrap();
        assert_eq!(parks.color(), [0.0, 1.0, 0.0, 1.0]);
        assert!(layers.centroid().x > 49.0);
    }

    #[test]
    fn layers_are_kept_in_draw_order() {
        let mut layers = Layers::new();
        for name in ["parks", "water", "surface"] {
            let (v, i) = quad(0.0, 0.0, 1.0);
            layers.add_layer(name, v, i, &GREY).unwrap();
        }
        let (v, i) = quad(0.0, 0.0, 1.0);
        layers.add_building_layer("buildings", v, i, None, &GREY).unwrap();

        let order: Vec<&str> = layers.iter().map(|l| l.name()).collect();
        assert_eq!(order, vec!["surface", "water", "parks", "buildings"]);
    }

    #[test]
    fn unknown_flat_names_draw_with_surface() {
        let layer = Layer::flat("roads", vec![], vec![], &GREY).unwrap();
        assert_eq!(layer.kind(), LayerKind::Surface);
        let layer = Layer::flat("buildings", vec![], vec![], &GREY).unwrap();
        assert_eq!(layer.kind(), LayerKind::Surface);
    }

    #[test]
    fn buildings_without_normals_get_computed_ones() {
        let (v, i) = quad(0.0, 0.0, 1.0);
        let layer = Layer::building("buildings", v, i, None, &GREY).unwrap();
        let normals = layer.geometry().normals.as_ref().unwrap();
        assert_eq!(normals.len(), 12);
        assert!(Vec3::from_slice(&normals[..3]).abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn invalid_layer_is_rejected_without_side_effects() {
        let mut layers = Layers::new();
        let (v, i) = quad(0.0, 0.0, 1.0);
        layers.add_layer("surface", v, i, &GREY).unwrap();
        let before = layers.centroid();

        let err = layers.add_layer("water", vec![0.0, 0.0], vec![], &GREY).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidLayer { .. }));
        assert_eq!(layers.len(), 1);
        assert_eq!(layers.centroid(), before);
    }

    #[test]
    fn radius_reaches_farthest_vertex() {
        let mut layers = Layers::new();
        layers
            .add_layer("surface", vec![-10.0, 0.0, 0.0, 10.0, 0.0, 0.0], vec![], &GREY)
            .unwrap();
        assert!((layers.radius() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn visibility_toggles_by_name() {
        let mut layers = Layers::new();
        let (v, i) = quad(0.0, 0.0, 1.0);
        layers.add_layer("water", v, i, &GREY).unwrap();
        assert!(layers.set_visible("water", false));
        assert!(!layers.get("water").unwrap().is_visible());
        assert!(!layers.set_visible("lava", false));
    }

    #[test]
    fn load_scene_replaces_existing_layers() {
        let mut layers = Layers::new();
        let (v, i) = quad(0.0, 0.0, 1.0);
        layers.add_layer("roads", v, i, &GREY).unwrap();

        let scene = SceneFile::from_json(
            r#"{
                "surface": { "coordinates": [0,0,0, 4,0,0, 4,4,0], "indices": [0,1,2] },
                "buildings": {
                    "coordinates": [0,0,0, 1,0,0, 1,0,3],
                    "indices": [0,1,2],
                    "color": [1, 0, 0]
                }
            }"#,
        )
        .unwrap();
        layers.load_scene(scene).unwrap();

        let names: Vec<&str> = layers.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["surface", "buildings"]);
        assert_eq!(
            layers.get("surface").unwrap().color(),
            LayerKind::Surface.default_color()
        );
        assert_eq!(layers.get("buildings").unwrap().color(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(layers.pending_uploads(), 2);
    }

    #[test]
    fn centroid_holds_at_projected_metre_offsets() {
        let n = 400_000;
        let vertices: Vec<f32> = (0..n)
            .flat_map(|i| [440_000.0 + (i % 101) as f32, 4_600_000.0 + (i % 37) as f32, 0.0])
            .collect();
        let exact_x = vertices.iter().step_by(3).map(|&x| x as f64).sum::<f64>() / n as f64;
        let exact_y = vertices.iter().skip(1).step_by(3).map(|&y| y as f64).sum::<f64>() / n as f64;

        let mut layers = Layers::new();
        layers.add_layer("surface", vertices, vec![], &GREY).unwrap();

        let c = layers.centroid();
        assert!((c.x as f64 - exact_x).abs() < 0.5, "x {} vs {}", c.x, exact_x);
        assert!((c.y as f64 - exact_y).abs() < 0.5, "y {} vs {}", c.y, exact_y);
        // farthest corner is about (50, 18) from the centre
        assert!(layers.radius() < 60.0, "radius {}", layers.radius());
    }

    #[test]
    fn normals_on_flat_layers_are_dropped() {
        let mut layers = Layers::new();
        let scene = SceneFile::from_json(
            r#"{ "parks": {
                "coordinates": [0,0,0, 1,0,0, 0,1,0],
                "indices": [0,1,2],
                "normals": [0,0,1, 0,0,1, 0,0,1]
            } }"#,
        )
        .unwrap();
        layers.load_scene(scene).unwrap();
        let parks = layers.get("parks").unwrap();
        assert_eq!(parks.kind(), LayerKind::Parks);
        assert!(parks.geometry().normals.is_none());
    }

    #[test]
    fn scene_with_only_unknown_keys_is_empty() {
        let mut layers = Layers::new();
        let scene = SceneFile::from_json(r#"{ "roads": { "coordinates": [0,0,0] } }"#).unwrap();
        assert!(matches!(layers.load_scene(scene), Err(ViewerError::EmptyScene)));
        assert!(layers.is_empty());
    }

    #[test]
    fn bad_scene_keeps_current_layers() {
        let mut layers = Layers::new();
        let (v, i) = quad(0.0, 0.0, 1.0);
        layers.add_layer("surface", v, i, &GREY).unwrap();

        let scene = SceneFile::from_json(
            r#"{ "water": { "coordinates": [0,0,0], "indices": [0,0,7] } }"#,
        )
        .unwrap();
        assert!(layers.load_scene(scene).is_err());
        assert!(matches!(
            layers.load_scene(SceneFile::default()),
            Err(ViewerError::EmptyScene)
        ));
        assert_eq!(layers.len(), 1);
        assert!(layers.get("surface").is_some());
    }
}
