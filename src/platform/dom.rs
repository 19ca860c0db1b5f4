//! DOM binder and page layout reader

use std::collections::{HashMap, HashSet};

use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, Window};

use crate::binder::{RenderBinder, RenderFrame, TargetId};
use crate::engine::NodeId;
use crate::engine::geometry::{Pose, Rect};
use crate::engine::progress::ScrollMetrics;
use crate::engine::section::PageLayout;
use crate::engine::timeline::StoryFlag;

/// CSS `transform` value for a pose
pub fn css_transform(pose: &Pose) -> String {
    format!(
        "translate({:.2}px, {:.2}px) rotate({:.2}deg) scale({:.3})",
        pose.offset.x, pose.offset.y, pose.rotation, pose.scale
    )
}

/// Writes poses as inline styles on elements looked up by id
pub struct DomBinder {
    document: Document,
    particles: HashMap<TargetId, HtmlElement>,
    /// Ids already reported missing, so the log isn't flooded every frame
    missing: HashSet<NodeId>,
}

impl DomBinder {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            particles: HashMap::new(),
            missing: HashSet::new(),
        }
    }

    fn element(&self, id: &str) -> Option<HtmlElement> {
        self.document
            .get_element_by_id(id)?
            .dyn_into::<HtmlElement>()
            .ok()
    }

    fn write(element: &HtmlElement, pose: &Pose) {
        let style = element.style();
        let _ = style.set_property("transform", &css_transform(pose));
        let _ = style.set_property("opacity", &format!("{:.3}", pose.opacity));
    }

    /// Create the particle's node inside its section
    fn spawn_particle(&mut self, target: &TargetId) -> Option<HtmlElement> {
        let TargetId::Particle { section, kind, .. } = target else {
            return None;
        };
        let container = self.element(section)?;
        let element = self
            .document
            .create_element("div")
            .ok()?
            .dyn_into::<HtmlElement>()
            .ok()?;
        element.set_id(&target.to_string());
        element.set_class_name(&format!("particle particle-{}", kind.as_str()));
        container.append_child(&element).ok()?;
        self.particles.insert(*target, element.clone());
        Some(element)
    }
}

impl RenderBinder for DomBinder {
    fn apply(&mut self, frame: &RenderFrame) {
        match frame.target {
            TargetId::Node(id) => match self.element(id) {
                Some(element) => Self::write(&element, &frame.pose),
                None => {
                    if self.missing.insert(id) {
                        log::warn!("No element #{} - skipping", id);
                    }
                }
            },
            TargetId::Particle { .. } => {
                let element = match self.particles.get(&frame.target) {
                    Some(element) => Some(element.clone()),
                    None => self.spawn_particle(&frame.target),
                };
                if let Some(element) = element {
                    Self::write(&element, &frame.pose);
                }
            }
        }
    }

    fn release(&mut self, target: &TargetId) {
        match target {
            TargetId::Node(id) => {
                if let Some(element) = self.element(id) {
                    let style = element.style();
                    let _ = style.remove_property("transform");
                    let _ = style.remove_property("opacity");
                }
            }
            TargetId::Particle { .. } => {
                // Already gone if its section was torn out of the page
                if let Some(element) = self.particles.remove(target) {
                    element.remove();
                }
            }
        }
    }

    fn flag(&mut self, flag: StoryFlag, raised: bool) {
        if let Some(body) = self.document.body() {
            let class = format!("flag-{}", flag.as_str());
            let _ = body.class_list().toggle_with_force(&class, raised);
        }
    }
}

/// Reads live layout from the window
pub struct DomLayout {
    window: Window,
    document: Document,
}

impl DomLayout {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }
}

impl PageLayout for DomLayout {
    fn viewport(&self) -> ScrollMetrics {
        let viewport_height = self
            .window
            .inner_height()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        ScrollMetrics {
            scroll_y: self.window.scroll_y().unwrap_or(0.0) as f32,
            viewport_height: viewport_height as f32,
        }
    }

    fn rect(&self, node: NodeId) -> Option<Rect> {
        let r = self.document.get_element_by_id(node)?.get_bounding_client_rect();
        Some(Rect::from_xywh(
            r.left() as f32,
            r.top() as f32,
            r.width() as f32,
            r.height() as f32,
        ))
    }
}
