//! Launch parameters for the viewer.
//!
//! On wasm these come from the page URL query, e.g.
//! `?scene=data/chicago.json&rotate=30&zoom=1.5&projection=orthographic`.

use crate::log; // macro import
use crate::transforms::{Projection, ViewState, DEFAULT_TILT_DEG};

/// Id of the canvas the viewer renders into.
pub const CANVAS_ID: &str = "glcanvas";
/// Clear colour behind the scene.
pub const CLEAR_COLOR: [f32; 4] = [190.0 / 255.0, 210.0 / 255.0, 215.0 / 255.0, 1.0];


#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Scene fetched at startup.
    pub scene: Option<String>,
    pub rotate_deg: f32,
    pub zoom: f32,
    pub tilt_deg: f32,
    pub projection: Projection,
    /// Back-face culling. Off helps with meshes of mixed winding.
    pub cull: bool,
}
impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scene: None,
            rotate_deg: 0.0,
            zoom: 1.0,
            tilt_deg: DEFAULT_TILT_DEG,
            projection: Projection::Perspective,
            cull: true,
        }
    }
}
impl ViewerConfig {
    /// Parses a URL query string. The leading `?` is optional; bad values keep their defaults.
    pub fn from_query(query: &str) -> Self {
        let mut config = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = match urlencoding::decode(&raw.replace('+', " ")) {
                Ok(value) => value.into_owned(),
                Err(e) => {
                    log!("ViewerConfig::from_query(): WARNING: {}: {}", key, e);
                    continue;
                }
            };

            let applied = match key {
                "scene" => {
                    config.scene = Some(value.clone()).filter(|s| !s.is_empty());
                    true
                }
                "rotate" => set_parsed(&mut config.rotate_deg, &value),
                "zoom" => set_parsed(&mut config.zoom, &value),
                "tilt" => set_parsed(&mut config.tilt_deg, &value),
                "projection" => set_parsed(&mut config.projection, &value),
                "cull" => set_parsed(&mut config.cull, &value),
                _ => {
                    log!("ViewerConfig::from_query(): WARNING: unknown parameter '{}'", key);
                    continue;
                }
            };
            if !applied {
                log!("ViewerConfig::from_query(): WARNING: bad value for '{}': '{}'", key, value);
            }
        }

        config
    }

    /// Reads the page URL on wasm, defaults elsewhere.
    pub fn from_environment() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            Self::from_query(&crate::utils::location_query())
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::default()
        }
    }

    /// Initial camera controls, clamped the way the UI clamps them.
    pub fn view_state(&self) -> ViewState {
        let mut state = ViewState::default();
        state.set_rotate(self.rotate_deg);
        state.set_zoom(self.zoom);
        state.set_tilt(self.tilt_deg);
        state.set_projection(self.projection);
        state
    }
}


fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_gives_defaults() {
        assert_eq!(ViewerConfig::from_query(""), ViewerConfig::default());
        assert_eq!(ViewerConfig::from_query("?"), ViewerConfig::default());
    }

    #[test]
    fn parses_every_parameter() {
        let config = ViewerConfig::from_query(
            "?scene=data%2Fcity%20map.json&rotate=30&zoom=1.5&tilt=10&projection=orthographic&cull=false",
        );
        assert_eq!(config.scene.as_deref(), Some("data/city map.json"));
        assert_eq!(config.rotate_deg, 30.0);
        assert_eq!(config.zoom, 1.5);
        assert_eq!(config.tilt_deg, 10.0);
        assert_eq!(config.projection, Projection::Orthographic);
        assert!(!config.cull);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = ViewerConfig::from_query("zoom=lots&projection=fisheye&colour=red&scene=");
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn unknown_keys_do_not_block_valid_ones() {
        let config = ViewerConfig::from_query("?theme=dark&zoom=2&debug&projection=ortho");
        assert_eq!(config.zoom, 2.0);
        assert_eq!(config.projection, Projection::Orthographic);
        assert_eq!(config.rotate_deg, 0.0);
        assert!(config.scene.is_none());
    }

    #[test]
    fn view_state_is_clamped() {
        let config = ViewerConfig::from_query("rotate=-90&zoom=1000");
        let state = config.view_state();
        assert_eq!(state.rotate_deg(), 270.0);
        assert_eq!(state.zoom(), crate::transforms::MAX_ZOOM);
    }
}
