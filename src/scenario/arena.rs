//! Headless 2D navigation arena.
//!
//! Bodies start at a fixed pose inside a bounded arena with rectangular walls
//! and must reach a food disc. Each body casts a fan of rays every tick; each
//! ray marches in unit steps and reports what it hit first and how far away.
//!
//! Actuators: `0 > 0` turns left, `1 > 0` turns right, `2 > 0` moves forward.
//! Touching a wall or the arena edge is fatal, and so is reaching the food.

use serde::{Deserialize, Serialize};

use super::{BodyState, Environment};
use crate::config::ConfigError;

/// Ray fan offsets relative to the heading, divided by [`RAY_DIVISOR`] to get
/// radians.
const RAY_OFFSETS: std::ops::RangeInclusive<i32> = -45..=45;
const RAY_STEP: usize = 5;
const RAY_DIVISOR: f32 = 60.0;

/// What a ray ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitType {
    Nothing = 0,
    Wall = 1,
    Food = 2,
}

impl HitType {
    /// Sensor encoding of the hit type.
    #[must_use]
    pub fn code(self) -> f32 {
        f32::from(self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub kind: HitType,
    pub distance: f32,
}

/// Axis-aligned wall given by two corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallRect {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl WallRect {
    #[must_use]
    pub fn new(min: [f32; 2], max: [f32; 2]) -> Self {
        Self { min, max }
    }

    fn contains(&self, [x, y]: [f32; 2]) -> bool {
        self.min[0] < x && x < self.max[0] && self.min[1] < y && y < self.max[1]
    }

    fn touches_disc(&self, [x, y]: [f32; 2], radius: f32) -> bool {
        let nx = x.clamp(self.min[0], self.max[0]);
        let ny = y.clamp(self.min[1], self.max[1]);
        (x - nx).powi(2) + (y - ny).powi(2) < radius * radius
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Lower corner of the walkable area.
    pub min: [f32; 2],
    /// Upper corner of the walkable area.
    pub max: [f32; 2],
    pub start: [f32; 2],
    /// Initial heading in radians.
    pub start_heading: f32,
    pub body_radius: f32,
    /// Units per second when moving forward.
    pub move_speed: f32,
    /// Radians per second while turning.
    pub rotation_speed: f32,
    pub ray_length: f32,
    pub food: [f32; 2],
    pub food_radius: f32,
    /// Fitness bonus for reaching the food.
    pub food_bonus: f32,
    /// Scale of the `1 / (1 + closest distance)` proximity term.
    pub proximity_scale: f32,
    pub walls: Vec<WallRect>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min: [10.0, 10.0],
            max: [390.0, 390.0],
            start: [300.0, 100.0],
            start_heading: std::f32::consts::PI,
            body_radius: 10.0,
            move_speed: 60.0,
            rotation_speed: 3.0,
            ray_length: 100.0,
            food: [150.0, 250.0],
            food_radius: 5.0,
            food_bonus: 100.0,
            proximity_scale: 10.0,
            walls: vec![
                WallRect::new([40.0, 60.0], [100.0, 90.0]),
                WallRect::new([100.0, 300.0], [150.0, 400.0]),
            ],
        }
    }
}

impl ArenaConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the arena is degenerate or the
    /// start pose is already fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min[0] < self.max[0] && self.min[1] < self.max[1]) {
            return Err(ConfigError::Invalid("arena.min must lie below arena.max".into()));
        }
        if !(self.body_radius > 0.0 && self.ray_length >= 1.0 && self.food_radius >= 0.0) {
            return Err(ConfigError::Invalid(
                "arena.body_radius and arena.ray_length must be positive".into(),
            ));
        }
        for wall in &self.walls {
            if !(wall.min[0] <= wall.max[0] && wall.min[1] <= wall.max[1]) {
                return Err(ConfigError::Invalid(format!("arena wall {wall:?} is inverted")));
            }
        }
        let arena = NavigationArena::new(self.clone());
        if arena.collides(self.start) {
            return Err(ConfigError::Invalid("arena.start touches a wall".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Walker {
    position: [f32; 2],
    heading: f32,
    closest: f32,
    reached: bool,
}

/// The navigation environment.
#[derive(Debug, Clone)]
pub struct NavigationArena {
    config: ArenaConfig,
    start_distance: f32,
    bodies: Vec<Walker>,
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

impl NavigationArena {
    #[must_use]
    pub fn new(config: ArenaConfig) -> Self {
        let start_distance = distance(config.start, config.food);
        Self {
            config,
            start_distance,
            bodies: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Number of rays in the sensor fan.
    #[must_use]
    pub fn ray_count() -> usize {
        RAY_OFFSETS.step_by(RAY_STEP).count()
    }

    /// Position and heading of `body`.
    #[must_use]
    pub fn pose(&self, body: usize) -> ([f32; 2], f32) {
        let w = &self.bodies[body];
        (w.position, w.heading)
    }

    /// Whether `body` reached the food this round.
    #[must_use]
    pub fn reached_food(&self, body: usize) -> bool {
        self.bodies[body].reached
    }

    /// March from `origin` along `angle` in unit steps.
    #[must_use]
    pub fn raycast(&self, origin: [f32; 2], angle: f32) -> RayHit {
        let c = &self.config;
        let (dy, dx) = angle.sin_cos();
        let steps = c.ray_length as usize;
        let mut point = origin;
        for _ in 0..steps {
            point = [point[0] + dx, point[1] + dy];
            let out = point[0] <= c.min[0]
                || point[1] <= c.min[1]
                || point[0] >= c.max[0]
                || point[1] >= c.max[1];
            if out || c.walls.iter().any(|w| w.contains(point)) {
                return RayHit {
                    kind: HitType::Wall,
                    distance: distance(origin, point),
                };
            }
            if distance(point, c.food) <= c.food_radius {
                return RayHit {
                    kind: HitType::Food,
                    distance: distance(origin, point),
                };
            }
        }
        RayHit {
            kind: HitType::Nothing,
            distance: distance(origin, point),
        }
    }

    fn collides(&self, p: [f32; 2]) -> bool {
        let c = &self.config;
        let r = c.body_radius;
        p[0] - r < c.min[0]
            || p[1] - r < c.min[1]
            || p[0] + r > c.max[0]
            || p[1] + r > c.max[1]
            || c.walls.iter().any(|w| w.touches_disc(p, r))
    }
}

impl Environment for NavigationArena {
    type Context = ();

    fn sensor_count(&self) -> usize {
        2 + 2 * Self::ray_count()
    }

    fn actuator_count(&self) -> usize {
        3
    }

    fn reset(&mut self, bodies: usize) {
        let walker = Walker {
            position: self.config.start,
            heading: self.config.start_heading,
            closest: self.start_distance,
            reached: false,
        };
        self.bodies = vec![walker; bodies];
    }

    fn advance(&mut self, _dt: f32) {}

    fn sense(&self, _ctx: &(), body: usize, sensors: &mut Vec<f32>) {
        let c = &self.config;
        let w = &self.bodies[body];
        let span = [c.max[0] - c.min[0], c.max[1] - c.min[1]];
        sensors.clear();
        sensors.push((w.position[0] - c.min[0]) / span[0]);
        sensors.push((w.position[1] - c.min[1]) / span[1]);
        for offset in RAY_OFFSETS.step_by(RAY_STEP) {
            let hit = self.raycast(w.position, w.heading + offset as f32 / RAY_DIVISOR);
            sensors.push(hit.kind.code());
            sensors.push(hit.distance / c.ray_length);
        }
    }

    fn apply(&mut self, _ctx: &(), body: usize, actions: &[f32], dt: f32) -> BodyState {
        let fires = |i: usize| actions.get(i).is_some_and(|&a| a > 0.0);
        let (rotation_speed, move_speed) = (self.config.rotation_speed, self.config.move_speed);

        let mut w = self.bodies[body];
        let turn = i8::from(fires(1)) - i8::from(fires(0));
        w.heading += f32::from(turn) * rotation_speed * dt;
        if fires(2) {
            let (dy, dx) = w.heading.sin_cos();
            w.position = [
                w.position[0] + dx * move_speed * dt,
                w.position[1] + dy * move_speed * dt,
            ];
        }

        let to_food = distance(w.position, self.config.food);
        w.closest = w.closest.min(to_food);
        let mut state = BodyState::Alive;
        if to_food <= self.config.body_radius + self.config.food_radius {
            w.reached = true;
            state = BodyState::Dead;
        } else if self.collides(w.position) {
            state = BodyState::Dead;
        }
        self.bodies[body] = w;
        state
    }

    fn fitness(&self, body: usize) -> f32 {
        let c = &self.config;
        let w = &self.bodies[body];
        let progress = self.start_distance - w.closest;
        let proximity = c.proximity_scale / (1.0 + w.closest);
        let bonus = if w.reached { c.food_bonus } else { 0.0 };
        progress + proximity + bonus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const DT: f32 = 1.0 / 30.0;

    fn arena(bodies: usize) -> NavigationArena {
        let mut arena = NavigationArena::new(ArenaConfig::default());
        arena.reset(bodies);
        arena
    }

    #[test]
    fn test_ray_fan_size() {
        assert_eq!(NavigationArena::ray_count(), 19);
        assert_eq!(arena(1).sensor_count(), 40);
    }

    #[test]
    fn test_raycast_hits() {
        let arena = arena(0);
        // Straight up from the start hits the top edge at y = 10.
        let hit = arena.raycast([300.0, 100.0], -FRAC_PI_2);
        assert_eq!(hit.kind, HitType::Wall);
        assert!((hit.distance - 90.0).abs() < 1.5);

        // Towards the food from 50 units away.
        let hit = arena.raycast([150.0, 200.0], FRAC_PI_2);
        assert_eq!(hit.kind, HitType::Food);
        assert!((hit.distance - 45.0).abs() < 1.5);

        // Open space.
        let hit = arena.raycast([250.0, 200.0], 0.0);
        assert_eq!(hit.kind, HitType::Nothing);
        assert!((hit.distance - 100.0).abs() < 1e-3);

        // Interior wall.
        let hit = arena.raycast([70.0, 150.0], -FRAC_PI_2);
        assert_eq!(hit.kind, HitType::Wall);
        assert!((hit.distance - 60.0).abs() < 1.5);
    }

    #[test]
    fn test_sense_layout() {
        let arena = arena(1);
        let mut sensors = Vec::new();
        arena.sense(&(), 0, &mut sensors);
        assert_eq!(sensors.len(), arena.sensor_count());
        assert!((sensors[0] - 290.0 / 380.0).abs() < 1e-6);
        for pair in sensors[2..].chunks(2) {
            assert!([0.0, 1.0, 2.0].contains(&pair[0]));
            assert!((0.0..=1.0 + 1e-3).contains(&pair[1]));
        }
    }

    #[test]
    fn test_turning_and_moving() {
        let mut arena = arena(1);
        arena.apply(&(), 0, &[0.0, 1.0, 0.0], DT);
        let (_, heading) = arena.pose(0);
        assert!((heading - (PI + 3.0 * DT)).abs() < 1e-5);

        arena.apply(&(), 0, &[1.0, 1.0, 0.0], DT);
        assert!((arena.pose(0).1 - heading).abs() < 1e-6);

        let mut arena = self::arena(1);
        arena.apply(&(), 0, &[0.0, 0.0, 1.0], DT);
        let (position, _) = arena.pose(0);
        assert!((position[0] - (300.0 - 60.0 * DT)).abs() < 1e-4);
        assert!((position[1] - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_wall_contact_is_fatal() {
        let config = ArenaConfig {
            start: [379.0, 200.0],
            start_heading: 0.0,
            ..ArenaConfig::default()
        };
        let mut arena = NavigationArena::new(config);
        arena.reset(1);
        assert_eq!(arena.apply(&(), 0, &[0.0, 0.0, 1.0], DT), BodyState::Dead);
    }

    #[test]
    fn test_reaching_food_scores_bonus() {
        let config = ArenaConfig {
            start: [150.0, 225.0],
            start_heading: FRAC_PI_2,
            ..ArenaConfig::default()
        };
        let mut arena = NavigationArena::new(config.clone());
        arena.reset(2);

        let mut state = BodyState::Alive;
        for _ in 0..30 {
            state = arena.apply(&(), 0, &[0.0, 0.0, 1.0], DT);
            if state == BodyState::Dead {
                break;
            }
        }
        assert_eq!(state, BodyState::Dead);
        assert!(arena.reached_food(0));
        assert!(arena.fitness(0) > config.food_bonus);

        // Standing still earns only the proximity term.
        let idle = arena.fitness(1);
        assert!((idle - config.proximity_scale / 26.0).abs() < 1e-4);
    }

    #[test]
    fn test_start_inside_wall_rejected() {
        let config = ArenaConfig {
            start: [70.0, 75.0],
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_err());
        ArenaConfig::default().validate().unwrap();
    }
}
