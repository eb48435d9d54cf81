// Re-export all public modules so they can be used from main.rs
pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, MouseEvent, Window};

#[cfg(target_arch = "wasm32")]
use controller::{FrameLoop, InputEvent, InputState};
#[cfg(target_arch = "wasm32")]
use view::{GpuContext, WgpuRenderer};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    logging::init();
    let (window, document, canvas) = init_canvas()?;
    setup_app(&window, &document, &canvas).await
}

/// Main application setup for WASM
#[cfg(target_arch = "wasm32")]
async fn setup_app(window: &Window, document: &Document, canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    let config = config::SceneConfig::embedded().map_err(|e| js_error(format!("Bad scene config: {e}")))?;

    let width = canvas.width();
    let height = canvas.height();
    let gpu = GpuContext::new(canvas, width, height)
        .await
        .map_err(|e| js_error(format!("GPU init failed: {e:?}")))?;

    let mut renderer = WgpuRenderer::new(gpu);
    renderer.set_pixels_per_point(window.device_pixel_ratio() as f32);

    let backend: Rc<dyn assets::DecodeBackend> = Rc::new(assets::WebBackend);
    let frame_loop = Rc::new(RefCell::new(FrameLoop::from_config(&config, backend, renderer, width, height)));

    let input = frame_loop.borrow().input();
    setup_input_listeners(document, window, canvas, input)?;
    setup_resize_listener(window, canvas, frame_loop.clone())?;

    let performance = window.performance();
    RcCellCallback::new(window.clone(), move || {
        let now = performance.as_ref().map(|p| p.now()).unwrap_or(0.0);
        frame_loop.borrow_mut().tick(now);
    })
    .start()
}

/// Event handlers only write into the shared input state; the frame loop
/// reads it once per tick.
#[cfg(target_arch = "wasm32")]
fn setup_input_listeners(
    document: &Document,
    window: &Window,
    canvas: &HtmlCanvasElement,
    input: Rc<RefCell<InputState>>,
) -> Result<(), JsValue> {
    use controller::input::wasm::{keyboard_event_to_input, mouse_move_to_input};

    // Keyboard down
    {
        let input = input.clone();
        let document_for_exit = document.clone();
        let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            let key = e.key();
            let mut state = input.borrow_mut();
            if state.bindings().is_escape(&key) {
                document_for_exit.exit_pointer_lock();
            }
            if state.bindings().action_for(&key).is_some() {
                e.prevent_default();
            }
            state.process_event(&keyboard_event_to_input(&e, true));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
        keydown.forget();
    }

    // Keyboard up
    {
        let input = input.clone();
        let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            input.borrow_mut().process_event(&keyboard_event_to_input(&e, false));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
        keyup.forget();
    }

    // Focus loss - clear all keys
    {
        let input = input.clone();
        let blur = Closure::wrap(Box::new(move |_e: Event| {
            input.borrow_mut().process_event(&InputEvent::FocusLost);
        }) as Box<dyn FnMut(Event)>);
        window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
        blur.forget();
    }

    // Visibility change - clear all keys
    {
        let input = input.clone();
        let doc_vis = document.clone();
        let visibility = Closure::wrap(Box::new(move |_e: Event| {
            let visible = !doc_vis.hidden();
            input.borrow_mut().process_event(&InputEvent::VisibilityChanged { visible });
        }) as Box<dyn FnMut(Event)>);
        document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
        visibility.forget();
    }

    // Pointer lock decides whether controls are engaged
    {
        let input = input.clone();
        let doc_pl = document.clone();
        let plc = Closure::wrap(Box::new(move |_e: Event| {
            let locked = doc_pl.pointer_lock_element().is_some();
            input.borrow_mut().process_event(&InputEvent::PointerLockChanged { locked });
        }) as Box<dyn FnMut(Event)>);
        document.add_event_listener_with_callback("pointerlockchange", plc.as_ref().unchecked_ref())?;
        plc.forget();
    }

    // Canvas click: user gesture plus pointer lock request
    {
        let input = input.clone();
        let canvas_click = canvas.clone();
        let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
            input.borrow_mut().process_event(&InputEvent::MouseClick);
            canvas_click.request_pointer_lock();
        }) as Box<dyn FnMut(MouseEvent)>);
        canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
        click.forget();
    }

    // Mouse move
    {
        let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
            let event = mouse_move_to_input(e.movement_x() as f32, e.movement_y() as f32);
            input.borrow_mut().process_event(&event);
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
        mm.forget();
    }

    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn setup_resize_listener(
    window: &Window,
    canvas: &HtmlCanvasElement,
    frame_loop: Rc<RefCell<FrameLoop<WgpuRenderer>>>,
) -> Result<(), JsValue> {
    let window_for_size = window.clone();
    let canvas = canvas.clone();
    let resize = Closure::wrap(Box::new(move |_e: Event| {
        let (width, height) = viewport_size(&window_for_size);
        canvas.set_width(width);
        canvas.set_height(height);
        let mut frame_loop = frame_loop.borrow_mut();
        frame_loop.renderer_mut().set_pixels_per_point(window_for_size.device_pixel_ratio() as f32);
        frame_loop.resize(width, height);
    }) as Box<dyn FnMut(Event)>);
    window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
    resize.forget();
    Ok(())
}

/// Window size in physical pixels.
#[cfg(target_arch = "wasm32")]
fn viewport_size(window: &Window) -> (u32, u32) {
    let dpr = window.device_pixel_ratio();
    let css = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let width = (css(window.inner_width()) * dpr).round() as u32;
    let height = (css(window.inner_height()) * dpr).round() as u32;
    (width.max(1), height.max(1))
}

#[cfg(target_arch = "wasm32")]
fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
    let window = web_sys::window().ok_or(js_error("no global `window`"))?;
    let document = window.document().ok_or(js_error("no document on window"))?;
    let body = document.body().ok_or(js_error("no body on document"))?;
    let canvas_el = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| js_error("failed to create canvas"))?;
    let (width, height) = viewport_size(&window);
    canvas_el.set_width(width);
    canvas_el.set_height(height);
    canvas_el.set_attribute("style", "width: 100vw; height: 100vh; display: block;")?;
    body.append_child(&canvas_el)?;
    Ok((window, document, canvas_el))
}

#[cfg(target_arch = "wasm32")]
fn js_error<E: Into<String>>(msg: E) -> JsValue {
    JsValue::from_str(&msg.into())
}

/// requestAnimationFrame driver. The next frame is requested before the
/// current tick runs.
#[cfg(target_arch = "wasm32")]
struct RcCellCallback {
    inner: Rc<RefCell<Box<dyn FnMut()>>>,
    window: Window,
}

#[cfg(target_arch = "wasm32")]
impl RcCellCallback {
    fn new(window: Window, f: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(f))),
            window,
        }
    }

    fn start(self) -> Result<(), JsValue> {
        let inner = self.inner.clone();
        let window = self.window.clone();

        let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let callback_clone = callback.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            if let Some(cb) = callback_clone.borrow().as_ref() {
                if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    tracing::error!("requestAnimationFrame failed: {e:?}");
                }
            }
            inner.borrow_mut().as_mut()();
        }) as Box<dyn FnMut()>));

        if let Some(cb) = callback.borrow().as_ref() {
            self.window.request_animation_frame(cb.as_ref().unchecked_ref())?;
        }

        // Leak the closure to keep it alive
        std::mem::forget(callback);
        Ok(())
    }
}
