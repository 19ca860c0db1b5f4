//! Proximity and collision detection
//!
//! The rocket looks ahead (toward smaller y) for the nearest obstacle whose
//! top edge falls inside the look-ahead window, and leans away from it. Its
//! center point entering an obstacle box is an impact, reported once per
//! entry.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use super::NodeId;
use super::geometry::{Pose, Rect};
use crate::clamp01;
use crate::error::{ConfigError, ConfigResult};

pub type ObstacleId = u32;

/// A region the actor reacts to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub bounds: Rect,
}

/// Supplies the current obstacle boxes on demand.
///
/// The detector never owns or mutates obstacles; an empty set is fine.
pub trait ObstacleProvider {
    fn obstacles(&self, time_secs: f32) -> Vec<Obstacle>;

    /// Poses for obstacles that also need drawing. Static ones draw themselves.
    fn poses(&self, _time_secs: f32) -> Vec<(NodeId, Pose)> {
        Vec::new()
    }
}

impl ObstacleProvider for Vec<Obstacle> {
    fn obstacles(&self, _time_secs: f32) -> Vec<Obstacle> {
        self.clone()
    }
}

/// A cloud that bobs around its resting box (sine yoyo)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftingObstacle {
    pub id: ObstacleId,
    pub base: Rect,
    pub amplitude: Vec2,
    pub period_secs: f32,
}

impl DriftingObstacle {
    pub fn bounds_at(&self, time_secs: f32) -> Rect {
        if self.period_secs <= 0.0 {
            return self.base;
        }
        let wave = (time_secs / self.period_secs * TAU).sin();
        self.base.translate(self.amplitude * wave)
    }
}

/// Independently animated obstacles, answered for any point in time
#[derive(Debug, Clone, Default)]
pub struct ObstacleField {
    pub clouds: Vec<(NodeId, DriftingObstacle)>,
}

impl ObstacleProvider for ObstacleField {
    fn obstacles(&self, time_secs: f32) -> Vec<Obstacle> {
        self.clouds
            .iter()
            .map(|(_, c)| Obstacle {
                id: c.id,
                bounds: c.bounds_at(time_secs),
            })
            .collect()
    }

    fn poses(&self, time_secs: f32) -> Vec<(NodeId, Pose)> {
        self.clouds
            .iter()
            .map(|(node, c)| {
                let offset = c.bounds_at(time_secs).min - c.base.min;
                (*node, Pose::at(offset.x, offset.y))
            })
            .collect()
    }
}

/// Detector tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// How far ahead of the actor's top edge to look (px)
    pub look_ahead: f32,
    /// Obstacles this far to the side still count as ahead (px)
    pub lateral_margin: f32,
    /// Sideways deflection at full strength (px)
    pub max_dx: f32,
    /// Lean at full strength (degrees)
    pub max_rotation: f32,
    /// Per-check multiplier once nothing is ahead
    pub decay: f32,
    /// Strength below which avoidance snaps to zero
    pub epsilon: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            look_ahead: 300.0,
            lateral_margin: 40.0,
            max_dx: 200.0,
            max_rotation: 15.0,
            decay: 0.9,
            epsilon: crate::consts::AVOIDANCE_EPSILON,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        ConfigError::check_range("detector.look_ahead", self.look_ahead, f32::MIN_POSITIVE, f32::MAX)?;
        ConfigError::check_range("detector.lateral_margin", self.lateral_margin, 0.0, f32::MAX)?;
        ConfigError::check_range("detector.max_dx", self.max_dx, 0.0, f32::MAX)?;
        ConfigError::check_range("detector.max_rotation", self.max_rotation, 0.0, 180.0)?;
        ConfigError::check_range("detector.decay", self.decay, 0.0, 0.999)?;
        ConfigError::check_range("detector.epsilon", self.epsilon, 0.0, 1.0)?;
        Ok(())
    }
}

/// Closest obstacle in the look-ahead window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestObstacle {
    pub id: ObstacleId,
    /// Actor top edge minus obstacle top edge (px, >= 0)
    pub distance: f32,
    pub bounds: Rect,
}

/// Find the nearest obstacle ahead of `actor`.
///
/// Ahead means the obstacle's top edge lies between the actor's top edge and
/// `look_ahead` pixels above it, and the obstacle overlaps the actor's column
/// widened by `lateral_margin`. Linear scan; there are only a handful.
pub fn nearest_ahead(
    actor: &Rect,
    obstacles: &[Obstacle],
    look_ahead: f32,
    lateral_margin: f32,
) -> Option<NearestObstacle> {
    obstacles
        .iter()
        .filter(|o| !o.bounds.is_degenerate())
        .filter(|o| actor.overlaps_horizontally(&o.bounds, lateral_margin))
        .filter_map(|o| {
            let distance = actor.top() - o.bounds.top();
            (0.0..=look_ahead).contains(&distance).then_some(NearestObstacle {
                id: o.id,
                distance,
                bounds: o.bounds,
            })
        })
        .min_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Avoidance strength in [0, 1]: 1 at distance 0, falling linearly to 0 at the window edge
#[inline]
pub fn avoidance_strength(distance: f32, look_ahead: f32) -> f32 {
    if look_ahead <= 0.0 {
        return 0.0;
    }
    clamp01(1.0 - distance / look_ahead)
}

/// Sideways nudge and lean applied on top of the timeline pose
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Avoidance {
    pub dx: f32,
    /// Degrees
    pub rotation: f32,
    /// Strength in [0, 1]
    pub magnitude: f32,
}

impl Avoidance {
    pub const ZERO: Avoidance = Avoidance {
        dx: 0.0,
        rotation: 0.0,
        magnitude: 0.0,
    };

    /// Full-response avoidance of `nearest` for an actor centered at `actor_x`
    fn toward_clear_side(nearest: &NearestObstacle, actor_x: f32, config: &DetectorConfig) -> Self {
        let strength = avoidance_strength(nearest.distance, config.look_ahead);
        // Dodge away from the obstacle's center; dead center dodges right
        let side = if actor_x >= nearest.bounds.center().x {
            1.0
        } else {
            -1.0
        };
        Avoidance {
            dx: side * strength * config.max_dx,
            rotation: side * strength * config.max_rotation,
            magnitude: strength,
        }
    }

    fn decayed(self, factor: f32, epsilon: f32) -> Self {
        let magnitude = self.magnitude * factor;
        if magnitude < epsilon {
            return Avoidance::ZERO;
        }
        Avoidance {
            dx: self.dx * factor,
            rotation: self.rotation * factor,
            magnitude,
        }
    }
}

/// Discrete collision transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionEvent {
    /// Center entered an obstacle box
    Impact { id: ObstacleId, point: Vec2 },
    /// Center left the box it was in (or the obstacle went away)
    Cleared { id: ObstacleId },
}

/// Result of one detector pass
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorReport {
    pub nearest: Option<NearestObstacle>,
    pub avoidance: Avoidance,
    pub events: Vec<CollisionEvent>,
}

/// Stateful detector: smoothed avoidance plus the active collision id
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    config: DetectorConfig,
    avoidance: Avoidance,
    active: Option<ObstacleId>,
}

impl CollisionDetector {
    pub fn new(config: DetectorConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            avoidance: Avoidance::ZERO,
            active: None,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn avoidance(&self) -> Avoidance {
        self.avoidance
    }

    /// Obstacle the actor's center is currently inside, if any
    pub fn active_collision(&self) -> Option<ObstacleId> {
        self.active
    }

    /// Run one pass for the actor's box.
    ///
    /// Both the look-ahead and the impact test use the box as given; the
    /// returned avoidance is for the caller to apply afterwards.
    pub fn check(&mut self, planned: &Rect, obstacles: &[Obstacle]) -> DetectorReport {
        let nearest = nearest_ahead(
            planned,
            obstacles,
            self.config.look_ahead,
            self.config.lateral_margin,
        );

        self.avoidance = match &nearest {
            Some(n) => Avoidance::toward_clear_side(n, planned.center().x, &self.config),
            None => self
                .avoidance
                .decayed(self.config.decay, self.config.epsilon),
        };

        let events = self.track_collision(planned.center(), obstacles);

        DetectorReport {
            nearest,
            avoidance: self.avoidance,
            events,
        }
    }

    fn track_collision(&mut self, center: Vec2, obstacles: &[Obstacle]) -> Vec<CollisionEvent> {
        let mut events = Vec::new();

        if let Some(id) = self.active {
            let still_inside = obstacles
                .iter()
                .any(|o| o.id == id && o.bounds.contains_strict(center));
            if still_inside {
                return events;
            }
            self.active = None;
            events.push(CollisionEvent::Cleared { id });
        }

        if let Some(hit) = obstacles.iter().find(|o| o.bounds.contains_strict(center)) {
            log::debug!("Impact with obstacle {} at {:?}", hit.id, center);
            self.active = Some(hit.id);
            events.push(CollisionEvent::Impact {
                id: hit.id,
                point: center,
            });
        }

        events
    }

    /// Drop smoothing and collision state (section unmount)
    pub fn reset(&mut self) {
        self.avoidance = Avoidance::ZERO;
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn actor_at(center_x: f32, center_y: f32) -> Rect {
        Rect::from_center(Vec2::new(center_x, center_y), Vec2::new(20.0, 40.0))
    }

    fn obstacle(id: ObstacleId, x: f32, y: f32, w: f32, h: f32) -> Obstacle {
        Obstacle {
            id,
            bounds: Rect::from_xywh(x, y, w, h),
        }
    }

    /// Obstacle whose top edge is far beyond any look-ahead window
    fn tall(id: ObstacleId, x: f32, w: f32) -> Obstacle {
        obstacle(id, x, -1000.0, w, 1500.0)
    }

    fn detector() -> CollisionDetector {
        CollisionDetector::new(DetectorConfig::default()).unwrap()
    }

    #[test]
    fn test_collision_scenario() {
        let mut det = detector();
        let obstacles = vec![tall(7, 100.0, 100.0)];
        let report = det.check(&actor_at(150.0, 100.0), &obstacles);
        assert!(report.nearest.is_none());
        assert_eq!(det.active_collision(), Some(7));
        assert!(matches!(report.events[..], [CollisionEvent::Impact { id: 7, .. }]));

        let report = det.check(&actor_at(250.0, 100.0), &obstacles);
        assert_eq!(det.active_collision(), None);
        assert_eq!(report.events, vec![CollisionEvent::Cleared { id: 7 }]);
    }

    #[test]
    fn test_collision_with_obstacle_in_look_ahead() {
        let mut det = detector();
        // Top edge 30px above the actor's top: inside the look-ahead window
        let obstacles = vec![obstacle(7, 100.0, 50.0, 100.0, 100.0)];
        let report = det.check(&actor_at(150.0, 100.0), &obstacles);
        assert!(report.nearest.is_some());
        assert!(report.avoidance.dx != 0.0);
        assert_eq!(det.active_collision(), Some(7));
        assert!(matches!(report.events[..], [CollisionEvent::Impact { id: 7, .. }]));

        let report = det.check(&actor_at(250.0, 100.0), &obstacles);
        assert_eq!(det.active_collision(), None);
        assert_eq!(report.events, vec![CollisionEvent::Cleared { id: 7 }]);
    }

    #[test]
    fn test_impact_deduplicated_until_reentry() {
        let mut det = detector();
        let obstacles = vec![tall(1, 100.0, 100.0)];
        let inside = actor_at(150.0, 100.0);

        let impacts = |r: &DetectorReport| {
            r.events
                .iter()
                .filter(|e| matches!(e, CollisionEvent::Impact { .. }))
                .count()
        };

        assert_eq!(impacts(&det.check(&inside, &obstacles)), 1);
        for _ in 0..10 {
            assert_eq!(impacts(&det.check(&inside, &obstacles)), 0);
        }
        det.check(&actor_at(300.0, 100.0), &obstacles);
        assert_eq!(impacts(&det.check(&inside, &obstacles)), 1);
    }

    #[test]
    fn test_moving_between_overlapping_obstacles() {
        let mut det = detector();
        let obstacles = vec![tall(1, 0.0, 100.0), tall(2, 80.0, 100.0)];
        det.check(&actor_at(50.0, 300.0), &obstacles);
        assert_eq!(det.active_collision(), Some(1));
        // Center at x=90 is inside both: stays with the first, no new impact
        let report = det.check(&actor_at(90.0, 300.0), &obstacles);
        assert!(report.events.is_empty());
        // Out of 1, still inside 2: clear then a fresh impact
        let report = det.check(&actor_at(150.0, 300.0), &obstacles);
        assert!(matches!(
            report.events[..],
            [CollisionEvent::Cleared { id: 1 }, CollisionEvent::Impact { id: 2, .. }]
        ));
    }

    #[test]
    fn test_vanished_obstacle_clears() {
        let mut det = detector();
        det.check(&actor_at(150.0, 100.0), &[tall(3, 100.0, 100.0)]);
        let report = det.check(&actor_at(150.0, 100.0), &[]);
        assert_eq!(report.events, vec![CollisionEvent::Cleared { id: 3 }]);
    }

    #[test]
    fn test_nearest_ahead_picks_closest_top_edge() {
        // Actor top edge at y=480
        let actor = actor_at(100.0, 500.0);
        let obstacles = vec![
            obstacle(1, 50.0, 300.0, 100.0, 50.0), // 180 ahead
            obstacle(2, 50.0, 400.0, 100.0, 50.0), // 80 ahead
            obstacle(3, 50.0, 490.0, 100.0, 50.0), // top edge behind the actor
            obstacle(4, 900.0, 450.0, 100.0, 50.0), // off to the side
            obstacle(5, 50.0, 100.0, 100.0, 50.0), // beyond the window
        ];
        let nearest = nearest_ahead(&actor, &obstacles, 300.0, 40.0).unwrap();
        assert_eq!(nearest.id, 2);
        assert!((nearest.distance - 80.0).abs() < 1e-4);
        assert!(nearest_ahead(&actor, &[], 300.0, 40.0).is_none());
    }

    #[test]
    fn test_avoidance_dodges_away_from_obstacle_center() {
        let mut det = detector();
        // Obstacle centered at x=120, actor at x=100: dodge left
        let report = det.check(&actor_at(100.0, 500.0), &[obstacle(1, 70.0, 400.0, 100.0, 50.0)]);
        assert!(report.avoidance.dx < 0.0);
        assert!(report.avoidance.rotation < 0.0);
        assert!(report.avoidance.magnitude > 0.0);
    }

    #[test]
    fn test_avoidance_decays_instead_of_snapping() {
        let mut det = detector();
        let actor = actor_at(100.0, 500.0);
        det.check(&actor, &[obstacle(1, 50.0, 470.0, 100.0, 5.0)]);
        let start = det.avoidance().magnitude;
        assert!(start > 0.9);

        let after_one = det.check(&actor, &[]).avoidance.magnitude;
        assert!(after_one > 0.0 && after_one < start);

        let mut last = after_one;
        for _ in 0..200 {
            let m = det.check(&actor, &[]).avoidance.magnitude;
            assert!(m <= last && m >= 0.0);
            last = m;
        }
        assert_eq!(det.avoidance(), Avoidance::ZERO);
    }

    #[test]
    fn test_drifting_obstacle() {
        let cloud = DriftingObstacle {
            id: 1,
            base: Rect::from_xywh(0.0, 0.0, 10.0, 10.0),
            amplitude: Vec2::new(20.0, 15.0),
            period_secs: 4.0,
        };
        assert_eq!(cloud.bounds_at(0.0), cloud.base);
        let quarter = cloud.bounds_at(1.0);
        assert!((quarter.min.x - 20.0).abs() < 1e-3);
        assert!((quarter.min.y - 15.0).abs() < 1e-3);
        let field = ObstacleField {
            clouds: vec![("cloud-1", cloud)],
        };
        assert_eq!(field.obstacles(1.0)[0].bounds, quarter);
        let (node, pose) = field.poses(1.0)[0];
        assert_eq!(node, "cloud-1");
        assert!((pose.offset - Vec2::new(20.0, 15.0)).length() < 1e-3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = DetectorConfig {
            decay: 1.5,
            ..Default::default()
        };
        assert!(CollisionDetector::new(bad).is_err());
        let bad = DetectorConfig {
            look_ahead: 0.0,
            ..Default::default()
        };
        assert!(CollisionDetector::new(bad).is_err());
    }

    proptest! {
        #[test]
        fn prop_strength_non_increasing(a in 0.0f32..500.0, b in 0.0f32..500.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(avoidance_strength(near, 300.0) >= avoidance_strength(far, 300.0));
            prop_assert!(avoidance_strength(far, 300.0) >= 0.0);
            prop_assert!(avoidance_strength(near, 300.0) <= 1.0);
        }

        #[test]
        fn prop_magnitude_never_negative(distance in 0.0f32..300.0, idle in 0usize..100) {
            let mut det = detector();
            let actor = actor_at(100.0, 500.0);
            let top = actor.top() - distance;
            det.check(&actor, &[obstacle(1, 50.0, top, 100.0, 10.0)]);
            for _ in 0..idle {
                let m = det.check(&actor, &[]).avoidance.magnitude;
                prop_assert!(m >= 0.0);
            }
        }
    }
}
