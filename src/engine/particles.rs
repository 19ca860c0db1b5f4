//! Particle lifecycle manager
//!
//! Fixed-capacity arena of particle slots addressed by generational ids.
//! Every particle is born with a finite time-to-live and is released by
//! `tick` once it fades out, so the live count always drains back to zero.
//! Bursts spawn a batch at once; streams spawn at a fixed rate while their
//! condition holds.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, TAU};

use super::NodeId;
use crate::error::{ConfigError, ConfigResult};

/// Most particles a single stream may emit in one tick (long frames)
const MAX_STREAM_SPAWNS_PER_TICK: u32 = 8;

/// Handle to a particle slot; stale once the slot is reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleId {
    pub index: u32,
    pub generation: u32,
}

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "particle-{}-{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleKind {
    Exhaust,
    Impact,
    Twinkle,
}

impl ParticleKind {
    /// CSS class suffix for the particle's node
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticleKind::Exhaust => "exhaust",
            ParticleKind::Impact => "impact",
            ParticleKind::Twinkle => "twinkle",
        }
    }
}

/// Randomization ranges shared by bursts and streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmissionParams {
    pub kind: ParticleKind,
    /// Central launch angle (radians, screen space: +π/2 points down)
    pub angle: f32,
    /// Total cone width around `angle`
    pub spread: f32,
    pub speed: (f32, f32),
    pub scale: (f32, f32),
    pub opacity: (f32, f32),
    pub ttl: (f32, f32),
    /// Scale multiplier reached at end of life (0 = shrink away)
    pub end_scale: f32,
    /// Fraction of velocity kept per second
    pub damping: f32,
}

impl EmissionParams {
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, (lo, hi)) in [
            ("emission.speed", self.speed),
            ("emission.scale", self.scale),
            ("emission.opacity", self.opacity),
            ("emission.ttl", self.ttl),
        ] {
            ConfigError::check_range(field, lo, 0.0, f32::MAX)?;
            ConfigError::check_range(field, hi, lo, f32::MAX)?;
        }
        // Zero ttl would create a particle that never animates
        ConfigError::check_range("emission.ttl", self.ttl.0, 1e-3, f32::MAX)?;
        ConfigError::check_range("emission.opacity", self.opacity.1, 0.0, 1.0)?;
        ConfigError::check_finite("emission.angle", self.angle)?;
        ConfigError::check_range("emission.spread", self.spread, 0.0, TAU)?;
        ConfigError::check_range("emission.end_scale", self.end_scale, 0.0, f32::MAX)?;
        ConfigError::check_range("emission.damping", self.damping, 0.0, 1.0)?;
        Ok(())
    }
}

/// Built-in emitters used by the story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BurstPreset {
    /// Engine smoke trailing below the rocket
    Exhaust,
    /// Sparks when the rocket clips a cloud
    Impact,
    /// Star glints around the station on docking
    Twinkle,
}

impl BurstPreset {
    pub fn params(self) -> EmissionParams {
        match self {
            BurstPreset::Exhaust => EmissionParams {
                kind: ParticleKind::Exhaust,
                angle: FRAC_PI_2,
                spread: 0.6,
                speed: (80.0, 160.0),
                scale: (0.6, 1.2),
                opacity: (0.6, 0.9),
                ttl: (0.4, 0.8),
                end_scale: 1.8,
                damping: 0.2,
            },
            BurstPreset::Impact => EmissionParams {
                kind: ParticleKind::Impact,
                angle: -FRAC_PI_2,
                spread: TAU,
                speed: (100.0, 250.0),
                scale: (2.5, 4.5),
                opacity: (0.8, 1.0),
                ttl: (0.3, 0.55),
                end_scale: 0.0,
                damping: 0.05,
            },
            BurstPreset::Twinkle => EmissionParams {
                kind: ParticleKind::Twinkle,
                angle: 0.0,
                spread: TAU,
                speed: (10.0, 30.0),
                scale: (0.5, 1.5),
                opacity: (0.5, 1.0),
                ttl: (0.5, 1.5),
                end_scale: 0.0,
                damping: 0.5,
            },
        }
    }

    /// Batch size for a one-shot burst
    pub fn default_count(self) -> usize {
        match self {
            BurstPreset::Exhaust => 6,
            BurstPreset::Impact => 8,
            BurstPreset::Twinkle => 12,
        }
    }
}

/// A live particle
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub kind: ParticleKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub age: f32,
    pub ttl: f32,
    pub start_opacity: f32,
    pub start_scale: f32,
    pub end_scale: f32,
    pub damping: f32,
}

impl Particle {
    /// 0 at birth, 1 at end of life
    pub fn life_fraction(&self) -> f32 {
        crate::clamp01(self.age / self.ttl)
    }

    pub fn opacity(&self) -> f32 {
        self.start_opacity * (1.0 - self.life_fraction())
    }

    pub fn scale(&self) -> f32 {
        self.start_scale * crate::lerp(1.0, self.end_scale, self.life_fraction())
    }

    /// Advance; returns false once the terminal state is reached
    fn advance(&mut self, dt: f32) -> bool {
        self.age += dt;
        self.pos += self.vel * dt;
        self.vel *= self.damping.powf(dt);
        self.age < self.ttl && self.opacity() > 0.0
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    particle: Option<Particle>,
}

/// Where a stream emits from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmitterOrigin {
    Fixed(Vec2),
    /// Resolved each tick; a missing node skips emission
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u32);

#[derive(Debug, Clone)]
struct Stream {
    id: StreamId,
    origin: EmitterOrigin,
    params: EmissionParams,
    interval: f32,
    accumulator: f32,
    active: bool,
}

/// Arena of particles plus their emitters
#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    streams: Vec<Stream>,
    next_stream: u32,
    rng: Pcg32,
    spawned: u64,
    released: u64,
    dropped: u64,
}

impl ParticlePool {
    pub fn new(capacity: usize, seed: u64) -> ConfigResult<Self> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(Self {
            slots: vec![Slot::default(); capacity],
            // Pop from the back, so low indices are handed out first
            free: (0..capacity as u32).rev().collect(),
            streams: Vec::new(),
            next_stream: 1,
            rng: Pcg32::seed_from_u64(seed),
            spawned: 0,
            released: 0,
            dropped: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Lifetime totals: (spawned, released, dropped because the pool was full)
    pub fn totals(&self) -> (u64, u64, u64) {
        (self.spawned, self.released, self.dropped)
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.particle.as_ref()
    }

    pub fn live(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.particle.as_ref().map(|p| {
                (
                    ParticleId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    p,
                )
            })
        })
    }

    fn sample(&mut self, (lo, hi): (f32, f32)) -> f32 {
        if hi <= lo {
            lo
        } else {
            self.rng.random_range(lo..hi)
        }
    }

    /// Spawn one particle. `Ok(None)` when the pool is full.
    pub fn spawn(
        &mut self,
        origin: Vec2,
        params: &EmissionParams,
    ) -> ConfigResult<Option<ParticleId>> {
        params.validate()?;
        Ok(self.emit(origin, params))
    }

    /// Spawn up to `count` particles at `origin`
    pub fn burst(
        &mut self,
        origin: Vec2,
        params: &EmissionParams,
        count: usize,
    ) -> ConfigResult<Vec<ParticleId>> {
        params.validate()?;
        Ok((0..count)
            .map_while(|_| self.emit(origin, params))
            .collect())
    }

    /// Params must already be validated; sampling panics on NaN bounds
    fn emit(&mut self, origin: Vec2, params: &EmissionParams) -> Option<ParticleId> {
        let Some(index) = self.free.pop() else {
            self.dropped += 1;
            if self.dropped == 1 || self.dropped.is_multiple_of(100) {
                log::warn!("Particle pool full ({} slots), dropping", self.slots.len());
            }
            return None;
        };

        let half_spread = params.spread / 2.0;
        let angle = params.angle + self.sample((-half_spread, half_spread));
        let speed = self.sample(params.speed);
        let particle = Particle {
            kind: params.kind,
            pos: origin,
            vel: Vec2::new(angle.cos(), angle.sin()) * speed,
            age: 0.0,
            ttl: self.sample(params.ttl),
            start_opacity: self.sample(params.opacity),
            start_scale: self.sample(params.scale),
            end_scale: params.end_scale,
            damping: params.damping,
        };

        let slot = &mut self.slots[index as usize];
        slot.particle = Some(particle);
        self.spawned += 1;
        Some(ParticleId {
            index,
            generation: slot.generation,
        })
    }

    /// Register a rate-limited emitter. Starts inactive.
    pub fn start_stream(
        &mut self,
        origin: EmitterOrigin,
        params: EmissionParams,
        rate_hz: f32,
    ) -> ConfigResult<StreamId> {
        params.validate()?;
        ConfigError::check_range("stream.rate_hz", rate_hz, 1e-3, 1000.0)?;
        let id = StreamId(self.next_stream);
        self.next_stream += 1;
        self.streams.push(Stream {
            id,
            origin,
            params,
            interval: 1.0 / rate_hz,
            accumulator: 0.0,
            active: false,
        });
        Ok(id)
    }

    /// Gate a stream on its condition. Unknown ids are ignored.
    pub fn set_stream_active(&mut self, id: StreamId, active: bool) {
        if let Some(stream) = self.streams.iter_mut().find(|s| s.id == id) {
            if !active {
                stream.accumulator = 0.0;
            }
            stream.active = active;
        }
    }

    pub fn is_stream_active(&self, id: StreamId) -> bool {
        self.streams.iter().any(|s| s.id == id && s.active)
    }

    /// Remove a stream; already emitted particles live out their ttl
    pub fn stop_stream(&mut self, id: StreamId) {
        self.streams.retain(|s| s.id != id);
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Age every particle, release the finished ones, then run streams.
    ///
    /// `resolve` maps stream origin nodes to positions; a node that has gone
    /// away simply emits nothing this tick. Returns the released particles so
    /// the caller can drop their visual nodes.
    pub fn tick<F>(&mut self, dt: f32, resolve: F) -> Vec<(ParticleId, ParticleKind)>
    where
        F: Fn(NodeId) -> Option<Vec2>,
    {
        let dt = dt.max(0.0);
        let mut released = Vec::new();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(particle) = slot.particle.as_mut() else {
                continue;
            };
            if !particle.advance(dt) {
                released.push((
                    ParticleId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    particle.kind,
                ));
                slot.particle = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.released += released.len() as u64;

        let mut emissions: Vec<(Vec2, EmissionParams)> = Vec::new();
        for stream in self.streams.iter_mut().filter(|s| s.active) {
            let origin = match stream.origin {
                EmitterOrigin::Fixed(p) => Some(p),
                EmitterOrigin::Node(node) => resolve(node),
            };
            let Some(origin) = origin else {
                stream.accumulator = 0.0;
                continue;
            };
            stream.accumulator += dt;
            let mut count = 0;
            while stream.accumulator >= stream.interval && count < MAX_STREAM_SPAWNS_PER_TICK {
                stream.accumulator -= stream.interval;
                emissions.push((origin, stream.params));
                count += 1;
            }
            if count == MAX_STREAM_SPAWNS_PER_TICK {
                stream.accumulator = 0.0;
            }
        }
        // Stream params were validated in `start_stream`
        for (origin, params) in emissions {
            self.emit(origin, &params);
        }

        released
    }

    /// Release everything and cancel every stream (section teardown)
    pub fn clear(&mut self) -> Vec<(ParticleId, ParticleKind)> {
        let live: Vec<(ParticleId, ParticleKind)> =
            self.live().map(|(id, p)| (id, p.kind)).collect();
        for (id, _) in &live {
            let slot = &mut self.slots[id.index as usize];
            slot.particle = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
        self.released += live.len() as u64;
        self.streams.clear();
        live
    }
}
