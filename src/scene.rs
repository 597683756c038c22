use serde::Deserialize;
use std::fmt;

use crate::error::{Result, ViewerError};
use crate::log; // macro import


/// The layer categories a scene document may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Surface,
    Water,
    Parks,
    Buildings,
}
impl LayerKind {
    pub const ALL: [LayerKind; 4] = [
        LayerKind::Surface,
        LayerKind::Water,
        LayerKind::Parks,
        LayerKind::Buildings,
    ];

    pub fn from_key(key: &str) -> Option<LayerKind> {
        match key {
            "buildings" => Some(LayerKind::Buildings),
            "water" => Some(LayerKind::Water),
            "parks" => Some(LayerKind::Parks),
            "surface" => Some(LayerKind::Surface),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            LayerKind::Buildings => "buildings",
            LayerKind::Water => "water",
            LayerKind::Parks => "parks",
            LayerKind::Surface => "surface",
        }
    }

    /// Only buildings are lit; the ground layers are drawn flat.
    pub fn has_normals(&self) -> bool {
        matches!(self, LayerKind::Buildings)
    }

    /// Ground first so the coplanar overlays land on top of it.
    pub fn draw_rank(&self) -> u8 {
        *self as u8
    }

    /// Colour used when the document does not give one.
    pub fn default_color(&self) -> [f32; 4] {
        match self {
            LayerKind::Buildings => [0.85, 0.85, 0.85, 1.0],
            LayerKind::Water => [0.62, 0.78, 0.90, 1.0],
            LayerKind::Parks => [0.71, 0.85, 0.63, 1.0],
            LayerKind::Surface => [0.95, 0.95, 0.93, 1.0],
        }
    }
}
impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}


/// One layer as it appears in the scene document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerData {
    #[serde(alias = "vertices")]
    pub coordinates: Vec<f32>,
    #[serde(default)]
    pub indices: Vec<u32>,
    #[serde(default)]
    pub normals: Option<Vec<f32>>,
    #[serde(default)]
    pub color: Option<Vec<f32>>,
}


/// A parsed scene document.
#[derive(Debug, Clone, Default)]
pub struct SceneFile {
    layers: Vec<(LayerKind, LayerData)>,
}
impl SceneFile {
    /// Parses a scene document. Keys other than the four known layer kinds are skipped.
    pub fn from_json(text: &str) -> Result<SceneFile> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        let serde_json::Value::Object(map) = root else {
            return Err(ViewerError::invalid_layer("<root>", "expected a JSON object"));
        };

        let mut layers = Vec::with_capacity(map.len());
        for (key, value) in map {
            let Some(kind) = LayerKind::from_key(&key) else {
                log!("SceneFile::from_json(): WARNING: skipping unknown layer '{}'", key);
                continue;
            };
            let data: LayerData = serde_json::from_value(value)
                .map_err(|e| ViewerError::invalid_layer(&key, e.to_string()))?;
            layers.push((kind, data));
        }
        layers.sort_by_key(|(kind, _)| *kind);

        Ok(SceneFile { layers })
    }

    pub fn layers(&self) -> &[(LayerKind, LayerData)] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<(LayerKind, LayerData)> {
        self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
