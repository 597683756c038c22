#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{prelude::*, JsCast};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_futures::JsFuture;
#[cfg(target_arch = "wasm32")]
use web_sys::{HtmlCanvasElement, Request, RequestInit, RequestMode, Response};


/// Writes a formatted line to the browser console (stdout on native).
#[macro_export]
macro_rules! log {
    ( $( $t:tt )* ) => {
        $crate::utils::console_log(&format!( $( $t )* ))
    }
}


pub fn console_log(msg: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&msg.into());

    #[cfg(not(target_arch = "wasm32"))]
    println!("{}", msg);
}


pub fn set_panic_hook() {
    // https://github.com/rustwasm/console_error_panic_hook#readme
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}


/// Looks up the canvas to render into.
#[cfg(target_arch = "wasm32")]
pub fn canvas_by_id(id: &str) -> Option<HtmlCanvasElement> {
    web_sys::window()?
        .document()?
        .get_element_by_id(id)?
        .dyn_into::<HtmlCanvasElement>()
        .ok()
}


/// Query string of the page URL including the leading `?`, or an empty string.
#[cfg(target_arch = "wasm32")]
pub fn location_query() -> String {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default()
}


/// GETs `url` and returns the response body as text.
#[cfg(target_arch = "wasm32")]
pub async fn fetch_text(url: &str) -> Result<String, String> {
    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);

    let request = Request::new_with_str_and_init(url, &opts)
        .map_err(|e| format!("invalid request: {:?}", e))?;
    let window = web_sys::window().ok_or_else(|| String::from("no window"))?;

    let resp_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| format!("fetch failed: {:?}", e))?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|_| String::from("fetch did not return a Response"))?;
    if !resp.ok() {
        return Err(format!("HTTP status {}", resp.status()));
    }

    let text: JsValue = JsFuture::from(resp.text().map_err(|e| format!("{:?}", e))?)
        .await
        .map_err(|e| format!("reading body failed: {:?}", e))?;
    text.as_string().ok_or_else(|| String::from("response body is not text"))
}
