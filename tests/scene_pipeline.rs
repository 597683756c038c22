use cityview::layers::Layers;
use cityview::scene::{LayerKind, SceneFile};
use cityview::transforms::{FrameTransforms, Projection, ViewState};
use glam::Vec3;

/// A small block: a ground plane, a pond, a park and two box buildings.
const CITY: &str = r#"{
    "surface": {
        "coordinates": [0,0,0, 100,0,0, 100,80,0, 0,80,0],
        "indices": [0,1,2, 0,2,3],
        "color": [0.9, 0.9, 0.9, 1.0]
    },
    "water": {
        "coordinates": [10,10,0, 30,10,0, 30,25,0, 10,25,0],
        "indices": [0,1,2, 0,2,3],
        "color": [0.4, 0.6, 0.9, 0.8]
    },
    "parks": {
        "coordinates": [60,50,0, 90,50,0, 90,75,0],
        "indices": [0,1,2],
        "color": [0.3, 0.7, 0.3]
    },
    "buildings": {
        "coordinates": [
            40,40,0, 50,40,0, 50,40,30, 40,40,30,
            70,20,0, 80,20,0, 80,20,45, 70,20,45
        ],
        "indices": [0,1,2, 0,2,3, 4,5,6, 4,6,7],
        "color": [0.8, 0.75, 0.7, 1.0]
    },
    "metadata": { "source": "test" }
}"#;

fn load() -> Layers {
    let mut layers = Layers::new();
    layers.load_scene(SceneFile::from_json(CITY).unwrap()).unwrap();
    layers
}

#[test]
fn loads_all_four_layer_kinds() {
    let layers = load();
    let kinds: Vec<LayerKind> = layers.iter().map(|l| l.kind()).collect();
    assert_eq!(kinds, LayerKind::ALL.to_vec());

    let buildings = layers.get("buildings").unwrap();
    assert_eq!(buildings.triangle_count(), 4);
    assert!(buildings.geometry().normals.is_some());
    assert!(layers.get("water").unwrap().geometry().normals.is_none());
    assert_eq!(layers.get("parks").unwrap().color(), [0.3, 0.7, 0.3, 1.0]);
}

#[test]
fn whole_city_is_on_screen_at_default_zoom() {
    let layers = load();
    let mut state = ViewState::default();

    for projection in Projection::ALL {
        state.set_projection(projection);
        for rotate in [0.0, 45.0, 90.0, 200.0] {
            state.set_rotate(rotate);
            for aspect in [0.6, 1.0, 1.6] {
                let t = FrameTransforms::compute(&state, layers.centroid(), layers.radius(), aspect);
                for layer in layers.iter() {
                    for p in layer.geometry().points() {
                        let ndc = t.world_to_ndc(p);
                        assert!(
                            ndc.abs().max_element() <= 1.0,
                            "{projection} rotate={rotate} aspect={aspect}: {p:?} -> {ndc:?}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn removing_buildings_moves_the_camera_target() {
    let mut layers = load();
    let before = layers.centroid();
    assert!(layers.remove_layer("buildings"));
    let after = layers.centroid();
    assert!(!before.abs_diff_eq(after, 1e-3));
    assert_eq!(after.z, 0.0);
}

#[test]
fn zooming_in_brings_the_eye_closer() {
    let layers = load();
    let mut state = ViewState::default();
    let far = FrameTransforms::compute(&state, layers.centroid(), layers.radius(), 1.0);
    state.zoom_by(2.0);
    let near = FrameTransforms::compute(&state, layers.centroid(), layers.radius(), 1.0);

    let c = layers.centroid();
    assert!((far.eye.distance(c) / near.eye.distance(c) - 2.0).abs() < 1e-3);
    assert!(near.eye.z > c.z && near.eye.y < c.y);
    assert!(near.view.transform_point3(c).x.abs() < 1e-4);
}

#[test]
fn reloading_replaces_previous_city() {
    let mut layers = load();
    layers
        .load_scene(
            SceneFile::from_json(r#"{ "water": { "coordinates": [0,0,0, 1,0,0, 0,1,0], "indices": [0,1,2] } }"#)
                .unwrap(),
        )
        .unwrap();
    assert_eq!(layers.len(), 1);
    assert!(layers.centroid().abs_diff_eq(Vec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0), 1e-5));
}
