//! Proportional-integral controller turning a CO2 set-point error into an airflow rate.
//!
//! Units follow the usual demand controlled ventilation formulation: gains in airflow per ppm,
//! the integral time in minutes, the dead band in ppm.

use std::time::Instant;


#[derive(Clone, Debug)]
pub struct PiController {
    /// proportional gain
    kp: f32,
    /// integral time, min
    ti: f32,
    /// dead band, ppm
    db: i32,
    min: f32,
    max: f32,
    /// integral error after anti-windup, min·ppm
    ib: f32,
    last_time: Option<Instant>,
}

impl PiController {
    /// Controller without output bounds.
    pub fn new(kp: f32, ti: f32, db: i32) -> Self {
        Self::with_bounds(kp, ti, db, f32::NAN, f32::NAN)
    }

    pub fn with_bounds(kp: f32, ti: f32, db: i32, min: f32, max: f32) -> Self {
        Self {
            kp,
            ti,
            db,
            min,
            max,
            ib: 0.0,
            last_time: None,
        }
    }

    pub fn set_min(&mut self, min: f32) {
        self.min = min;
    }

    pub fn set_max(&mut self, max: f32) {
        self.max = max;
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Forget the integral error and the time of the last update.
    pub fn reset(&mut self) {
        self.ib = 0.0;
        self.last_time = None;
    }

    /// New gains, bounds untouched.
    pub fn reset_gains(&mut self, kp: f32, ti: f32, db: i32) {
        self.kp = kp;
        self.ti = ti;
        self.db = db;
        self.reset();
    }

    pub fn reset_with_bounds(&mut self, kp: f32, ti: f32, db: i32, min: f32, max: f32) {
        self.min = min;
        self.max = max;
        self.reset_gains(kp, ti, db);
    }

    pub fn update(&mut self, setpoint: i32, current: i32) -> f32 {
        self.update_at(setpoint, current, Instant::now())
    }

    /// One controller step at `now`. The first step after a reset integrates nothing.
    pub fn update_at(&mut self, setpoint: i32, current: i32, now: Instant) -> f32 {
        let dt = match self.last_time {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0
        };
        self.last_time = Some(now);

        let e = setpoint - current;

        let e_db = if current < setpoint - self.db {
            e - self.db
        } else if current > setpoint + self.db {
            e + self.db
        } else {
            0
        };
        let e_db = e_db as f32;

        let i = self.ib + (dt / 60.0) * e_db;

        let candidate = -self.kp * (e_db + i / self.ti);

        // NaN bounds never compare, leaving the output unclamped
        self.ib = if candidate < self.min {
            -self.ti * (e_db + self.min / self.kp)
        } else if candidate > self.max {
            -self.ti * (e_db + self.max / self.kp)
        } else {
            i
        };

        -self.kp * (e_db + self.ib / self.ti)
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn controller() -> PiController {
        PiController::with_bounds(0.2736, 8.0, 50, 30.0, 60.0)
    }

    #[test]
    fn test_low_co2_clamps_to_min() {
        let mut pi = controller();
        let v = pi.update_at(700, 450, Instant::now());
        assert!((v - 30.0).abs() < 1e-3, "{v}");
    }

    #[test]
    fn test_high_co2_clamps_to_max() {
        let mut pi = controller();
        let now = Instant::now();
        let v = pi.update_at(700, 1000, now);
        assert!((v - 60.0).abs() < 1e-3, "{v}");

        // the clamped integral does not wind up
        let v = pi.update_at(700, 1000, now);
        assert!((v - 60.0).abs() < 1e-3, "{v}");
        let v = pi.update_at(700, 1000, now + Duration::from_secs(60));
        assert!((v - 60.0).abs() < 1e-3, "{v}");
    }

    #[test]
    fn test_dead_band() {
        let mut pi = PiController::new(0.2736, 8.0, 50);

        assert_eq!(pi.update_at(700, 680, Instant::now()), 0.0);
        assert_eq!(pi.update_at(700, 750, Instant::now()), 0.0);

        // just outside the band only the excess counts
        let v = pi.update_at(700, 760, Instant::now());
        assert!(v > 0.0);
    }

    #[test]
    fn test_unbounded_integrates_over_time() {
        let mut pi = PiController::new(1.0, 10.0, 0);
        let start = Instant::now();

        // e = -100, first call has no history
        assert_eq!(pi.update_at(700, 800, start), 100.0);

        // ten minutes later: i = 10 * -100 = -1000, v = -(-100 + -1000 / 10) = 200
        let v = pi.update_at(700, 800, start + Duration::from_secs(600));
        assert!((v - 200.0).abs() < 1e-3, "{v}");

        pi.reset();
        assert_eq!(pi.update_at(700, 800, start + Duration::from_secs(1200)), 100.0);
    }

    #[test]
    fn test_output_stays_within_bounds() {
        let mut pi = controller();
        let start = Instant::now();

        for (n, co2) in [450, 470, 510, 600, 680, 720, 780, 810, 770, 740, 710, 690].into_iter().enumerate() {
            let v = pi.update_at(700, co2, start + Duration::from_secs(600 * n as u64));
            assert!((30.0 - 1e-3..=60.0 + 1e-3).contains(&v), "{co2}: {v}");
        }
    }

    #[test]
    fn test_reset_gains_keeps_bounds() {
        let mut pi = controller();
        pi.reset_gains(0.5, 4.0, 10);
        assert_eq!(pi.bounds(), (30.0, 60.0));

        pi.reset_with_bounds(0.5, 4.0, 10, f32::NAN, f32::NAN);
        assert!(pi.bounds().0.is_nan());
    }
}
