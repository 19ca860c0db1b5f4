//! Scroll progress source
//!
//! Turns raw scroll measurements into a bounded progress value for one
//! tracked element. The window is described the way scroll triggers are
//! usually written: "when the element's top meets the viewport's bottom"
//! through "when the element's bottom meets the viewport's top".

use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use crate::error::{ConfigError, ConfigResult};
use crate::inverse_lerp;

/// A point where an element line meets a viewport line.
///
/// Both are fractions: 0 = top edge, 1 = bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub element: f32,
    pub viewport: f32,
}

impl Anchor {
    /// `top bottom`
    pub const TOP_BOTTOM: Anchor = Anchor::new(0.0, 1.0);
    /// `top top`
    pub const TOP_TOP: Anchor = Anchor::new(0.0, 0.0);
    /// `top center`
    pub const TOP_CENTER: Anchor = Anchor::new(0.0, 0.5);
    /// `bottom center`
    pub const BOTTOM_CENTER: Anchor = Anchor::new(1.0, 0.5);
    /// `bottom top`
    pub const BOTTOM_TOP: Anchor = Anchor::new(1.0, 0.0);

    pub const fn new(element: f32, viewport: f32) -> Self {
        Self { element, viewport }
    }

    /// Document scroll offset at which this anchor is reached
    fn scroll_offset(&self, element_doc_top: f32, element_height: f32, viewport_height: f32) -> f32 {
        element_doc_top + self.element * element_height - self.viewport * viewport_height
    }
}

/// End of a scroll window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowEnd {
    Anchor(Anchor),
    /// `+=N%`: this many viewport heights after the start
    Relative(f32),
}

/// Start/end thresholds for one tracked element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollWindow {
    pub start: Anchor,
    pub end: WindowEnd,
}

impl ScrollWindow {
    pub fn new(start: Anchor, end: WindowEnd) -> ConfigResult<Self> {
        ConfigError::check_finite("window.start.element", start.element)?;
        ConfigError::check_finite("window.start.viewport", start.viewport)?;
        match end {
            WindowEnd::Anchor(a) => {
                ConfigError::check_finite("window.end.element", a.element)?;
                ConfigError::check_finite("window.end.viewport", a.viewport)?;
                if a == start {
                    return Err(ConfigError::InvalidRange {
                        field: "window.end",
                        value: a.element,
                    });
                }
            }
            WindowEnd::Relative(screens) => {
                ConfigError::check_finite("window.end.relative", screens)?;
                if screens <= 0.0 {
                    return Err(ConfigError::InvalidRange {
                        field: "window.end.relative",
                        value: screens,
                    });
                }
            }
        }
        Ok(Self { start, end })
    }

    /// Element enters at the bottom, leaves at the top (parallax default)
    pub fn full_pass() -> Self {
        Self {
            start: Anchor::TOP_BOTTOM,
            end: WindowEnd::Anchor(Anchor::BOTTOM_TOP),
        }
    }

    /// Scroll offsets `(start, end)` for an element with the given viewport-relative box
    pub fn scroll_range(&self, metrics: &ScrollMetrics, element: &Rect) -> (f32, f32) {
        let doc_top = element.top() + metrics.scroll_y;
        let h = element.height();
        let vh = metrics.viewport_height;
        let start = self.start.scroll_offset(doc_top, h, vh);
        let end = match self.end {
            WindowEnd::Anchor(a) => a.scroll_offset(doc_top, h, vh),
            WindowEnd::Relative(screens) => start + screens * vh,
        };
        (start, end)
    }
}

/// Viewport state at the time of a scroll/resize event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_y: f32,
    pub viewport_height: f32,
}

/// Result of one measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Computed from the current layout
    Fresh(f32),
    /// Layout was unusable; this is the last good value
    Stale(f32),
}

impl Measurement {
    pub fn value(self) -> f32 {
        match self {
            Measurement::Fresh(v) | Measurement::Stale(v) => v,
        }
    }

    pub fn is_fresh(self) -> bool {
        matches!(self, Measurement::Fresh(_))
    }
}

/// Progress for one tracked element, clamped to [0, 1]
#[derive(Debug, Clone)]
pub struct ProgressSource {
    window: ScrollWindow,
    last: f32,
    before_start: bool,
}

impl ProgressSource {
    pub fn new(window: ScrollWindow) -> Self {
        Self {
            window,
            last: 0.0,
            before_start: true,
        }
    }

    pub fn window(&self) -> &ScrollWindow {
        &self.window
    }

    /// Last good value
    pub fn last(&self) -> f32 {
        self.last
    }

    /// Scroll position was above the window's start at the last good measurement.
    ///
    /// Progress reads 0 there too; this tells "not reached yet" from "just
    /// reached".
    pub fn before_start(&self) -> bool {
        self.before_start
    }

    /// Re-evaluate on scroll/resize.
    ///
    /// A detached element (`None`), a zero-size box, a collapsed window or a
    /// zero-height viewport all keep the previous value.
    pub fn measure(&mut self, metrics: &ScrollMetrics, element: Option<&Rect>) -> Measurement {
        let Some(element) = element else {
            return Measurement::Stale(self.last);
        };
        if element.is_degenerate()
            || !metrics.scroll_y.is_finite()
            || !(metrics.viewport_height > 0.0)
        {
            log::trace!("Skipping progress update: unusable layout {:?}", element);
            return Measurement::Stale(self.last);
        }

        let (start, end) = self.window.scroll_range(metrics, element);
        if !(end > start) {
            return Measurement::Stale(self.last);
        }

        self.before_start = metrics.scroll_y < start;
        self.last = inverse_lerp(start, end, metrics.scroll_y);
        Measurement::Fresh(self.last)
    }
}

/// Unbounded progress accumulated from raw scroll/wheel deltas.
///
/// Used when a timeline spans several units (phase B at [1, 2] and so on)
/// rather than a single clamped window.
#[derive(Debug, Clone)]
pub struct ScrollAccumulator {
    value: f32,
    px_per_unit: f32,
}

impl ScrollAccumulator {
    pub fn new(px_per_unit: f32) -> ConfigResult<Self> {
        ConfigError::check_finite("accumulator.px_per_unit", px_per_unit)?;
        if px_per_unit <= 0.0 {
            return Err(ConfigError::InvalidRange {
                field: "accumulator.px_per_unit",
                value: px_per_unit,
            });
        }
        Ok(Self {
            value: 0.0,
            px_per_unit,
        })
    }

    /// Add a delta in pixels. Never goes below zero; non-finite deltas are dropped.
    pub fn push(&mut self, delta_px: f32) -> f32 {
        if delta_px.is_finite() {
            self.value = (self.value + delta_px / self.px_per_unit).max(0.0);
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_y: f32) -> ScrollMetrics {
        ScrollMetrics {
            scroll_y,
            viewport_height: 800.0,
        }
    }

    /// Box as `getBoundingClientRect` reports it for an element at `doc_top`
    fn client_rect(doc_top: f32, height: f32, scroll_y: f32) -> Rect {
        Rect::from_xywh(0.0, doc_top - scroll_y, 1000.0, height)
    }

    #[test]
    fn test_top_top_plus_one_screen() {
        let window = ScrollWindow::new(Anchor::TOP_TOP, WindowEnd::Relative(1.0)).unwrap();
        let mut source = ProgressSource::new(window);

        // Section at document y=1000, one screen tall
        for (scroll, expected) in [(500.0, 0.0), (1000.0, 0.0), (1400.0, 0.5), (1800.0, 1.0), (3000.0, 1.0)] {
            let m = source.measure(&metrics(scroll), Some(&client_rect(1000.0, 800.0, scroll)));
            assert!(m.is_fresh());
            assert!((m.value() - expected).abs() < 1e-5, "scroll {scroll}");
        }
    }

    #[test]
    fn test_before_start_tracks_window_opening() {
        let window = ScrollWindow::new(Anchor::TOP_TOP, WindowEnd::Relative(1.0)).unwrap();
        let mut source = ProgressSource::new(window);
        assert!(source.before_start());

        source.measure(&metrics(500.0), Some(&client_rect(1000.0, 800.0, 500.0)));
        assert!(source.before_start());
        source.measure(&metrics(1000.0), Some(&client_rect(1000.0, 800.0, 1000.0)));
        assert!(!source.before_start());
        assert_eq!(source.last(), 0.0);

        // Detached: keeps the last relation too
        source.measure(&metrics(200.0), None);
        assert!(!source.before_start());
    }

    #[test]
    fn test_full_pass_window() {
        let mut source = ProgressSource::new(ScrollWindow::full_pass());
        // Element at doc 1000..1200: starts at scroll 200, ends at scroll 1200
        let m = source.measure(&metrics(700.0), Some(&client_rect(1000.0, 200.0, 700.0)));
        assert!((m.value() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_detached_element_keeps_last_value() {
        let window = ScrollWindow::new(Anchor::TOP_TOP, WindowEnd::Relative(1.0)).unwrap();
        let mut source = ProgressSource::new(window);
        source.measure(&metrics(400.0), Some(&client_rect(0.0, 800.0, 400.0)));

        assert_eq!(source.measure(&metrics(600.0), None), Measurement::Stale(0.5));
        let zero = Rect::from_xywh(0.0, 0.0, 0.0, 0.0);
        assert_eq!(source.measure(&metrics(600.0), Some(&zero)), Measurement::Stale(0.5));
    }

    #[test]
    fn test_zero_viewport_is_stale() {
        let mut source = ProgressSource::new(ScrollWindow::full_pass());
        let m = source.measure(
            &ScrollMetrics {
                scroll_y: 10.0,
                viewport_height: 0.0,
            },
            Some(&client_rect(0.0, 100.0, 10.0)),
        );
        assert_eq!(m, Measurement::Stale(0.0));
    }

    #[test]
    fn test_invalid_windows_rejected() {
        assert!(ScrollWindow::new(Anchor::TOP_TOP, WindowEnd::Relative(0.0)).is_err());
        assert!(ScrollWindow::new(Anchor::TOP_TOP, WindowEnd::Anchor(Anchor::TOP_TOP)).is_err());
        assert!(ScrollWindow::new(Anchor::new(f32::NAN, 0.0), WindowEnd::Relative(1.0)).is_err());
    }

    #[test]
    fn test_accumulator_unbounded_above_floored_below() {
        let mut acc = ScrollAccumulator::new(1000.0).unwrap();
        acc.push(2500.0);
        assert!((acc.value() - 2.5).abs() < 1e-5);
        acc.push(-10_000.0);
        assert_eq!(acc.value(), 0.0);
        acc.push(f32::NAN);
        assert_eq!(acc.value(), 0.0);
        assert!(ScrollAccumulator::new(0.0).is_err());
    }
}
