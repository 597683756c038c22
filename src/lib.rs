use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod geometry;
pub mod layers;
pub mod loader;
pub mod programs;
mod renderer;
pub mod scene;
pub mod transforms;
pub mod utils;

#[wasm_bindgen(start)]
pub fn dummy_main() {}

#[wasm_bindgen]
pub async fn run() {
    utils::set_panic_hook();
    renderer::main().await;
}
