use std::{cell::RefCell, rc::Rc};
use bus::{Bus, BusReader};

use crate::error::{Result, ViewerError};
use crate::log; // macro import


/// Outcome of a pick or fetch, delivered to the render loop.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Loaded { name: String, text: String },
    Failed { source: String, message: String },
}
impl LoadEvent {
    /// Returns `(name, text)` of a loaded document.
    pub fn into_result(self) -> Result<(String, String)> {
        match self {
            LoadEvent::Loaded { name, text } => Ok((name, text)),
            LoadEvent::Failed { source, message } => Err(ViewerError::Load { source, message }),
        }
    }
}


/// Reads scene documents off the render thread and hands them back through a bus.
pub struct SceneLoader {
    bus: Rc<RefCell<Bus<LoadEvent>>>,
    rx: BusReader<LoadEvent>,
}
impl Default for SceneLoader {
    fn default() -> Self {
        Self::new()
    }
}
impl SceneLoader {
    const QUEUE_LEN: usize = 4;

    pub fn new() -> Self {
        let mut bus = Bus::<LoadEvent>::new(Self::QUEUE_LEN);
        let rx = bus.add_rx();
        Self {
            bus: Rc::new(RefCell::new(bus)),
            rx,
        }
    }

    /// Opens the browser file dialog and reads the chosen JSON file.
    pub fn pick_file(&self) {
        #[cfg(target_arch = "wasm32")]
        {
            let bus = self.bus.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter("JSON", &["json"])
                    .pick_file()
                    .await
                else {
                    log!("SceneLoader::pick_file(): cancelled");
                    return;
                };

                let name = handle.file_name();
                let bytes = handle.read().await;
                log!("SceneLoader::pick_file(): {} ({} bytes)", name, bytes.len());
                publish(&bus, text_event(name, bytes));
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        log!("SceneLoader::pick_file(): WARNING: file dialog is only available in the browser");
    }

    /// Fetches `url` over HTTP on wasm; reads it as a file path elsewhere.
    pub fn fetch(&self, url: &str) {
        log!("SceneLoader::fetch(): {}", url);

        #[cfg(target_arch = "wasm32")]
        {
            let bus = self.bus.clone();
            let url = url.to_string();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match crate::utils::fetch_text(&url).await {
                    Ok(text) => LoadEvent::Loaded { name: url, text },
                    Err(message) => LoadEvent::Failed { source: url, message },
                };
                publish(&bus, event);
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let event = match std::fs::read(url) {
                Ok(bytes) => text_event(url.to_string(), bytes),
                Err(e) => LoadEvent::Failed {
                    source: url.to_string(),
                    message: e.to_string(),
                },
            };
            publish(&self.bus, event);
        }
    }

    /// Non-blocking; returns the next finished load if there is one.
    pub fn try_recv(&mut self) -> Option<LoadEvent> {
        self.rx.try_recv().ok()
    }
}


fn text_event(name: String, bytes: Vec<u8>) -> LoadEvent {
    match String::from_utf8(bytes) {
        Ok(text) => LoadEvent::Loaded { name, text },
        Err(e) => LoadEvent::Failed {
            source: name,
            message: format!("not UTF-8 text: {}", e),
        },
    }
}


fn publish(bus: &Rc<RefCell<Bus<LoadEvent>>>, event: LoadEvent) {
    // non-blocking (i.e., no atomic.wait)
    let mut bus = bus.borrow_mut();
    if bus.try_broadcast(event).is_err() {
        log!("SceneLoader: WARNING: load queue full, dropping result");
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_local_file_on_native() {
        let path = std::env::temp_dir().join(format!("cityview-loader-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"water": {"coordinates": []}}"#).unwrap();

        let mut loader = SceneLoader::new();
        loader.fetch(path.to_str().unwrap());
        let (name, text) = loader.try_recv().unwrap().into_result().unwrap();
        assert!(name.ends_with(".json"));
        assert!(text.contains("water"));
        assert!(loader.try_recv().is_none());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_reported() {
        let mut loader = SceneLoader::new();
        loader.fetch("/definitely/not/here/city.json");
        let err = loader.try_recv().unwrap().into_result().unwrap_err();
        assert!(matches!(err, ViewerError::Load { .. }));
    }

    #[test]
    fn binary_data_is_rejected() {
        match text_event("blob".into(), vec![0xff, 0xfe, 0xfd]) {
            LoadEvent::Failed { source, .. } => assert_eq!(source, "blob"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
