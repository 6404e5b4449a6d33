//! Headless side-scrolling obstacle course.
//!
//! Bodies fall under gravity and jump when actuator 0 is positive. Columns with
//! a centred opening scroll in from the right at a fixed interval. Touching the
//! floor, the ceiling or a column is fatal. Fitness is survival time in seconds.

use serde::{Deserialize, Serialize};

use super::{BodyState, Environment};
use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    pub width: f32,
    pub height: f32,
    /// Bodies die when their lower edge passes this line.
    pub floor: f32,
    /// Bodies die when their upper edge passes this line.
    pub ceiling: f32,
    /// Seconds between column spawns.
    pub spawn_interval: f32,
    /// Half the height of the opening in each column, measured from the centre.
    pub gap_half_height: f32,
    pub column_width: f32,
    /// Leftward scroll speed in units per second.
    pub scroll_speed: f32,
    pub body_radius: f32,
    pub start_x: f32,
    pub start_y: f32,
    pub gravity: f32,
    /// Vertical velocity set by a jump (negative is up).
    pub jump_velocity: f32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 500.0,
            floor: 480.0,
            ceiling: 20.0,
            spawn_interval: 2.0,
            gap_half_height: 80.0,
            column_width: 20.0,
            scroll_speed: 100.0,
            body_radius: 20.0,
            start_x: 150.0,
            start_y: 250.0,
            gravity: 400.0,
            jump_velocity: -200.0,
        }
    }
}

impl ObstacleConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the course is degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("spawn_interval", self.spawn_interval),
            ("column_width", self.column_width),
            ("body_radius", self.body_radius),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("obstacle.{name} must be positive")));
            }
        }
        if self.ceiling.is_nan() || self.floor.is_nan() || self.ceiling >= self.floor {
            return Err(ConfigError::Invalid("obstacle.ceiling must lie above the floor".into()));
        }
        if self.jump_velocity == 0.0 {
            return Err(ConfigError::Invalid("obstacle.jump_velocity must be non-zero".into()));
        }
        Ok(())
    }

    fn gap(&self) -> (f32, f32) {
        let mid = self.height / 2.0;
        (mid - self.gap_half_height, mid + self.gap_half_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Flapper {
    y: f32,
    velocity: f32,
    survived: f32,
}

/// Closest column still ahead of (or overlapping) the bodies this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextColumn(pub Option<f32>);

/// The obstacle course environment.
#[derive(Debug, Clone)]
pub struct ObstacleCourse {
    config: ObstacleConfig,
    columns: Vec<f32>,
    spawn_timer: f32,
    bodies: Vec<Flapper>,
}

impl ObstacleCourse {
    #[must_use]
    pub fn new(config: ObstacleConfig) -> Self {
        let spawn_timer = config.spawn_interval - 1.0;
        Self {
            config,
            columns: Vec::new(),
            spawn_timer,
            bodies: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ObstacleConfig {
        &self.config
    }

    /// Left edges of the columns on screen, oldest first.
    #[must_use]
    pub fn columns(&self) -> &[f32] {
        &self.columns
    }

    fn touches_column(&self, column: f32, y: f32) -> bool {
        let c = &self.config;
        let (gap_top, gap_bottom) = c.gap();
        let x = c.start_x;
        let r = c.body_radius;
        if x + r < column || x - r > column + c.column_width {
            return false;
        }
        // Overlaps horizontally; safe only if fully inside the opening.
        y - r < gap_top || y + r > gap_bottom
    }
}

impl Environment for ObstacleCourse {
    type Context = NextColumn;

    fn sensor_count(&self) -> usize {
        5
    }

    fn actuator_count(&self) -> usize {
        1
    }

    fn reset(&mut self, bodies: usize) {
        self.columns.clear();
        self.spawn_timer = self.config.spawn_interval - 1.0;
        self.bodies = vec![
            Flapper {
                y: self.config.start_y,
                velocity: 0.0,
                survived: 0.0,
            };
            bodies
        ];
    }

    fn advance(&mut self, dt: f32) -> NextColumn {
        let c = &self.config;
        self.spawn_timer += dt;
        if self.spawn_timer > c.spawn_interval {
            self.spawn_timer = 0.0;
            self.columns.push(c.width - 10.0);
        }
        for x in &mut self.columns {
            *x -= c.scroll_speed * dt;
        }
        self.columns.retain(|&x| x >= 0.0);

        let behind = c.start_x - c.body_radius;
        NextColumn(
            self.columns
                .iter()
                .copied()
                .find(|&x| x + c.column_width >= behind),
        )
    }

    fn sense(&self, ctx: &NextColumn, body: usize, sensors: &mut Vec<f32>) {
        let c = &self.config;
        let flapper = &self.bodies[body];
        let (gap_top, gap_bottom) = c.gap();
        sensors.clear();
        sensors.extend([
            flapper.y / c.height,
            flapper.velocity / c.jump_velocity.abs(),
            ctx.0.map_or(1.0, |x| x / c.width),
            gap_top / c.height,
            gap_bottom / c.height,
        ]);
    }

    fn apply(&mut self, _ctx: &NextColumn, body: usize, actions: &[f32], dt: f32) -> BodyState {
        let c = &self.config;
        let flapper = &mut self.bodies[body];
        flapper.velocity += c.gravity * dt;
        if actions.first().is_some_and(|&a| a > 0.0) {
            flapper.velocity = c.jump_velocity;
        }
        flapper.y += flapper.velocity * dt;
        flapper.survived += dt;

        let y = flapper.y;
        let r = c.body_radius;
        if y - r < c.ceiling || y + r > c.floor {
            return BodyState::Dead;
        }
        if self.columns.iter().any(|&col| self.touches_column(col, y)) {
            return BodyState::Dead;
        }
        BodyState::Alive
    }

    fn fitness(&self, body: usize) -> f32 {
        self.bodies[body].survived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 30.0;

    fn course(bodies: usize) -> ObstacleCourse {
        let mut course = ObstacleCourse::new(ObstacleConfig::default());
        course.reset(bodies);
        course
    }

    #[test]
    fn test_falling_body_hits_floor() {
        let mut course = course(1);
        let mut ticks = 0;
        loop {
            let ctx = course.advance(DT);
            ticks += 1;
            if course.apply(&ctx, 0, &[0.0], DT) == BodyState::Dead {
                break;
            }
            assert!(ticks < 1000);
        }
        // Needs to fall 210 units under 400 u/s^2: roughly a second.
        assert!((25..=40).contains(&ticks), "died after {ticks} ticks");
        assert!((course.fitness(0) - ticks as f32 * DT).abs() < 1e-3);
    }

    #[test]
    fn test_jump_sets_velocity() {
        let mut course = course(1);
        let ctx = course.advance(DT);
        course.apply(&ctx, 0, &[1.0], DT);
        let mut sensors = Vec::new();
        course.sense(&ctx, 0, &mut sensors);
        assert_eq!(sensors.len(), course.sensor_count());
        assert!((sensors[1] + 1.0).abs() < 1e-6);
        assert!(sensors[0] < 0.5);
    }

    #[test]
    fn test_first_column_spawns_after_one_second() {
        let mut course = course(1);
        for _ in 0..29 {
            assert_eq!(course.advance(DT), NextColumn(None));
        }
        let mut spawned = false;
        for _ in 0..3 {
            spawned |= course.advance(DT).0.is_some();
        }
        assert!(spawned);
        assert_eq!(course.columns().len(), 1);
    }

    #[test]
    fn test_column_collision_outside_gap() {
        let course = course(1);
        let c = course.config().clone();
        let over_body = c.start_x - c.column_width / 2.0;
        assert!(!course.touches_column(over_body, c.height / 2.0));
        assert!(course.touches_column(over_body, c.height / 2.0 - c.gap_half_height));
        assert!(!course.touches_column(c.width, 0.0));
    }

    #[test]
    fn test_reset_clears_world() {
        let mut course = course(2);
        for _ in 0..90 {
            course.advance(DT);
        }
        assert!(!course.columns().is_empty());
        course.reset(3);
        assert!(course.columns().is_empty());
        assert_eq!(course.fitness(2), 0.0);
    }
}
