//! Platform layer
//!
//! The only code that touches the browser:
//! - DOM render binder (inline transform/opacity, particle nodes, flag classes)
//! - Page layout reader (`scrollY`, `innerHeight`, `getBoundingClientRect`)
//!
//! Everything here is wasm-only; native builds drive the engine headlessly.

#[cfg(target_arch = "wasm32")]
mod dom;

#[cfg(target_arch = "wasm32")]
pub use dom::{DomBinder, DomLayout, css_transform};

/// Viewport size in CSS pixels (WASM only)
#[cfg(target_arch = "wasm32")]
pub fn viewport_size() -> Option<glam::Vec2> {
    let window = web_sys::window()?;
    let width = window.inner_width().ok()?.as_f64()?;
    let height = window.inner_height().ok()?.as_f64()?;
    Some(glam::Vec2::new(width as f32, height as f32))
}
