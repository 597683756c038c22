use num_format::{Locale, ToFormattedString};
use three_d::context::{self, HasContext};
use three_d::{
    egui, ClearState, Context, Event, FrameOutput, MouseButton, Viewport, Window,
    WindowSettings, GUI,
};

use crate::config::{ViewerConfig, CANVAS_ID, CLEAR_COLOR};
use crate::error::Result;
use crate::layers::Layers;
use crate::loader::SceneLoader;
use crate::log; // macro import
use crate::programs::Programs;
use crate::scene::SceneFile;
use crate::transforms::{aspect, FrameTransforms, Projection, ViewState, MAX_TILT_DEG, MAX_ZOOM, MIN_ZOOM};

const ROTATE_DEG_PER_PIXEL: f32 = 0.4;
const ZOOM_PER_WHEEL_PIXEL: f32 = 0.002;


/// Everything the render loop owns. GPU resources are freed on drop.
struct Viewer {
    gl: Context,
    programs: Programs,
    layers: Layers,
    loader: SceneLoader,
    config: ViewerConfig,
    view: ViewState,
    scene_name: Option<String>,
    last_error: Option<String>,
}
impl Viewer {
    fn new(gl: Context, config: ViewerConfig) -> Result<Self> {
        let programs = Programs::new(&gl)?;
        let loader = SceneLoader::new();
        if let Some(url) = &config.scene {
            loader.fetch(url);
        }

        Ok(Self {
            view: config.view_state(),
            gl,
            programs,
            layers: Layers::new(),
            loader,
            config,
            scene_name: None,
            last_error: None,
        })
    }

    /// Moves finished loads into the layer set.
    fn poll_loads(&mut self) {
        while let Some(event) = self.loader.try_recv() {
            let loaded = event.into_result().and_then(|(name, text)| {
                let scene = SceneFile::from_json(&text)?;
                self.layers.load_scene(scene)?;
                Ok(name)
            });

            match loaded {
                Ok(name) => {
                    log!(
                        "Viewer::poll_loads(): loaded {} ({} layers, centroid={:?}, radius={})",
                        name,
                        self.layers.len(),
                        self.layers.centroid(),
                        self.layers.radius()
                    );
                    self.scene_name = Some(name);
                    self.last_error = None;
                }
                Err(e) => {
                    log!("Viewer::poll_loads(): ERROR: {}", e);
                    self.last_error = Some(e.to_string());
                }
            }
        }
    }

    /// Left drag rotates, wheel zooms. Events the GUI consumed are skipped.
    fn handle_input(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::MouseMotion {
                    button: Some(MouseButton::Left),
                    delta,
                    handled: false,
                    ..
                } => self.view.rotate_by(delta.0 * ROTATE_DEG_PER_PIXEL),
                Event::MouseWheel {
                    delta,
                    handled: false,
                    ..
                } => self.view.zoom_by((delta.1 * ZOOM_PER_WHEEL_PIXEL).exp()),
                _ => {}
            }
        }
    }

    fn ui(&mut self, gui_context: &egui::Context) {
        egui::SidePanel::left("controls").show(gui_context, |ui| self.controls(ui));
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        use egui::{Color32, ComboBox, Slider};

        ui.heading("Cityview");
        if ui.button("Open scene…").clicked() {
            self.loader.pick_file();
        }
        if let Some(name) = &self.scene_name {
            ui.label(name.as_str());
        }
        ui.separator();

        let mut rotate = self.view.rotate_deg();
        if ui
            .add(Slider::new(&mut rotate, 0.0..=359.0).step_by(1.0).text("Rotate"))
            .changed()
        {
            self.view.set_rotate(rotate);
        }

        let mut zoom = self.view.zoom();
        if ui
            .add(Slider::new(&mut zoom, MIN_ZOOM..=MAX_ZOOM).logarithmic(true).text("Zoom"))
            .changed()
        {
            self.view.set_zoom(zoom);
        }

        let mut tilt = self.view.tilt_deg();
        if ui
            .add(Slider::new(&mut tilt, 0.0..=MAX_TILT_DEG).text("Tilt"))
            .changed()
        {
            self.view.set_tilt(tilt);
        }

        let mut projection = self.view.projection();
        ComboBox::from_label("Projection")
            .selected_text(projection.to_string())
            .show_ui(ui, |ui| {
                for p in Projection::ALL {
                    ui.selectable_value(&mut projection, p, p.to_string());
                }
            });
        self.view.set_projection(projection);

        if ui.button("Reset view").clicked() {
            self.view = self.config.view_state();
        }
        ui.separator();

        let mut toggled = Vec::new();
        let mut removed = None;
        for layer in self.layers.iter() {
            ui.horizontal(|ui| {
                let mut visible = layer.is_visible();
                if ui.checkbox(&mut visible, layer.name()).changed() {
                    toggled.push((layer.name().to_string(), visible));
                }
                ui.label(format!(
                    "{} tris",
                    layer.triangle_count().to_formatted_string(&Locale::en)
                ));
                if ui.small_button("✕").clicked() {
                    removed = Some(layer.name().to_string());
                }
            });
        }
        for (name, visible) in toggled {
            self.layers.set_visible(&name, visible);
        }
        if let Some(name) = removed {
            log!("Viewer::controls(): removing layer {}", name);
            self.layers.remove_layer(&name);
        }

        let vertices: usize = self.layers.iter().map(|l| l.vertex_count()).sum();
        ui.label(format!("{} vertices", vertices.to_formatted_string(&Locale::en)));

        if let Some(msg) = &self.last_error {
            ui.separator();
            ui.colored_label(Color32::RED, msg.as_str());
        }
    }

    fn draw(&mut self, viewport: Viewport) {
        if let Err(e) = self.layers.sync_gpu(&self.gl, &self.programs) {
            self.last_error = Some(e.to_string());
        }

        apply_gl_state(&self.gl, self.config.cull);
        unsafe {
            self.gl.viewport(viewport.x, viewport.y, viewport.width as i32, viewport.height as i32);
        }

        let transforms = FrameTransforms::compute(
            &self.view,
            self.layers.centroid(),
            self.layers.radius(),
            aspect(viewport.width, viewport.height),
        );
        self.layers.draw(&self.gl, &self.programs, &transforms);
    }
}
impl Drop for Viewer {
    fn drop(&mut self) {
        self.layers.release(&self.gl);
        self.programs.release(&self.gl);
    }
}


/// Blending, culling and depth testing for the layer passes. Re-applied every
/// frame since the GUI painter changes them.
fn apply_gl_state(gl: &Context, cull: bool) {
    unsafe {
        gl.enable(context::BLEND);
        gl.blend_func(context::SRC_ALPHA, context::ONE_MINUS_SRC_ALPHA);

        if cull {
            gl.enable(context::CULL_FACE);
            gl.cull_face(context::BACK);
        } else {
            gl.disable(context::CULL_FACE);
        }

        // LEQUAL so coplanar overlays drawn later win over the surface
        gl.enable(context::DEPTH_TEST);
        gl.depth_func(context::LEQUAL);
        gl.depth_mask(true);
    }
}


pub async fn main() {
    let config = ViewerConfig::from_environment();
    log!("renderer::main(): {:?}", config);

    let window = match Window::new(WindowSettings {
        title: "Cityview".to_string(),
        #[cfg(target_arch = "wasm32")]
        canvas: crate::utils::canvas_by_id(CANVAS_ID),
        ..Default::default()
    }) {
        Ok(window) => window,
        Err(e) => {
            log!("renderer::main(): ERROR: no window on #{}: {:?}", CANVAS_ID, e);
            return;
        }
    };
    let gl = window.gl();

    let mut viewer = match Viewer::new(gl.clone(), config) {
        Ok(viewer) => viewer,
        Err(e) => {
            log!("renderer::main(): ERROR: {}", e);
            return;
        }
    };
    let mut gui = GUI::new(&gl);

    window.render_loop(move |mut frame_input| {
        viewer.poll_loads();

        gui.update(
            &mut frame_input.events,
            frame_input.accumulated_time,
            frame_input.viewport,
            frame_input.device_pixel_ratio,
            |gui_context| viewer.ui(gui_context),
        );
        viewer.handle_input(&frame_input.events);

        let [r, g, b, a] = CLEAR_COLOR;
        frame_input
            .screen()
            .clear(ClearState::color_and_depth(r, g, b, a, 1.0));

        viewer.draw(frame_input.viewport);

        let _ = gui.render();

        FrameOutput::default()
    });
}
