use crate::common::{one_pole_coefficient, OnePole};
use crate::config::TrackerConfig;
use crate::track::Touch;

/// Position smoothing for one slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct XyFilter {
    x: OnePole,
    y: OnePole,
}

impl XyFilter {
    /// Non-finite positions are ignored.
    pub fn process(&mut self, x: f32, y: f32, k: f32) {
        if x.is_finite() && y.is_finite() {
            self.x.process(x, k);
            self.y.process(y, k);
        }
    }

    /// Jumps directly to a position.
    pub fn snap(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            self.x.reset(x);
            self.y.reset(y);
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x.value(), self.y.value())
    }
}

/// Pressure smoothing and gating for one slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZFilter {
    z: OnePole,
    gated: bool,
    age: u32,
}

impl ZFilter {
    pub fn value(&self) -> f32 {
        self.z.value()
    }

    /// True between the filtered pressure rising above the on threshold and
    /// falling below the off threshold.
    pub fn is_gated(&self) -> bool {
        self.gated
    }

    pub fn age(&self) -> u32 {
        self.age
    }
}

/// Filter state of one slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TouchFilter {
    pub xy: XyFilter,
    pub z: ZFilter,
}

impl TouchFilter {
    pub fn reset(&mut self) {
        *self = TouchFilter::default();
    }
}

/// Coefficients shared by all slot filters.
///
/// Pressure uses a one-pole lowpass with separate attack and release corner
/// frequencies and a hysteresis gate. Position uses a one-pole lowpass whose
/// corner frequency rises linearly with pressure between
/// (`xy_min_pressure`, `xy_min_freq`) and (`xy_max_pressure`, `xy_max_freq`),
/// clamped outside that range, so light touches are smoothed more.
#[derive(Clone, Debug)]
pub struct FilterBank {
    sample_rate: f32,
    attack_k: f32,
    release_k: f32,
    on_threshold: f32,
    off_threshold: f32,
    xy_min_freq: f32,
    xy_max_freq: f32,
    xy_min_pressure: f32,
    xy_max_pressure: f32,
}

impl FilterBank {
    pub fn new(config: &TrackerConfig) -> Self {
        FilterBank {
            sample_rate: config.sample_rate,
            attack_k: one_pole_coefficient(config.z_attack_freq, config.sample_rate),
            release_k: one_pole_coefficient(config.z_release_freq, config.sample_rate),
            on_threshold: config.on_threshold,
            off_threshold: config.off_threshold,
            xy_min_freq: config.xy_min_freq,
            xy_max_freq: config.xy_max_freq,
            xy_min_pressure: config.xy_min_pressure,
            xy_max_pressure: config.xy_max_pressure,
        }
    }

    pub fn set_thresholds(&mut self, on_threshold: f32, off_threshold: f32) {
        self.on_threshold = on_threshold;
        self.off_threshold = off_threshold;
    }

    /// Position filter corner frequency for a pressure.
    pub fn xy_frequency(&self, z: f32) -> f32 {
        if z <= self.xy_min_pressure {
            self.xy_min_freq
        } else if z >= self.xy_max_pressure {
            self.xy_max_freq
        } else {
            let t = (z - self.xy_min_pressure) / (self.xy_max_pressure - self.xy_min_pressure);
            self.xy_min_freq + t * (self.xy_max_freq - self.xy_min_freq)
        }
    }

    /// Filters one raw slot touch. With `snap` the position filter starts from
    /// the raw position. A raw touch without pressure leaves the position
    /// unchanged. Returns the output touch: zero pressure and age while the gate
    /// is closed.
    pub fn process(&self, filter: &mut TouchFilter, raw: &Touch, snap: bool) -> Touch {
        if snap {
            filter.xy.snap(raw.x, raw.y);
        } else if raw.z > 0.0 {
            let k = one_pole_coefficient(self.xy_frequency(raw.z), self.sample_rate);
            filter.xy.process(raw.x, raw.y, k);
        }

        let z_filter = &mut filter.z;
        let previous = z_filter.z.value();
        let k = if raw.z > previous {
            self.attack_k
        } else {
            self.release_k
        };
        let z = z_filter.z.process(raw.z, k);

        if z_filter.gated {
            if z < self.off_threshold {
                z_filter.gated = false;
            }
        } else if z > self.on_threshold {
            z_filter.gated = true;
        }
        z_filter.age = if z_filter.gated { z_filter.age + 1 } else { 0 };

        let (x, y) = filter.xy.position();
        if z_filter.gated {
            Touch {
                x,
                y,
                z,
                dz: z - previous,
                age: z_filter.age,
            }
        } else {
            Touch {
                x,
                y,
                z: 0.0,
                dz: 0.0,
                age: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micromath::F32Ext;

    fn bank() -> FilterBank {
        FilterBank::new(&TrackerConfig::default())
    }

    #[test]
    fn test_xy_frequency() {
        let bank = bank();
        assert_eq!(bank.xy_frequency(0.0), 2.0);
        assert_eq!(bank.xy_frequency(1.0), 40.0);
        assert!((bank.xy_frequency(0.11) - 21.0).abs() < 1e-4);
    }

    #[test]
    fn test_gate_and_age() {
        let bank = bank();
        let mut filter = TouchFilter::default();
        let raw = Touch::new(5.0, 2.0, 0.2);

        let first = bank.process(&mut filter, &raw, true);
        // Attack is fast enough to open the gate on the first frame
        assert!(first.is_active());
        assert_eq!(first.age, 1);
        assert_eq!((first.x, first.y), (5.0, 2.0));
        assert!(first.dz > 0.0);

        let second = bank.process(&mut filter, &raw, false);
        assert_eq!(second.age, 2);
        assert!(second.z > first.z);

        // Release: age keeps counting until the gate closes
        let mut last = second;
        let mut frames = 0;
        while last.is_active() {
            let next = bank.process(&mut filter, &Touch::new(5.0, 2.0, 0.0), false);
            if next.is_active() {
                assert_eq!(next.age, last.age + 1);
                assert!(next.z < last.z);
                assert!(next.dz < 0.0);
            } else {
                assert_eq!(next.z, 0.0);
                assert_eq!(next.dz, 0.0);
            }
            last = next;
            frames += 1;
            assert!(frames < 1000);
        }
        // Position is held during release
        assert_eq!((last.x, last.y), (5.0, 2.0));
    }

    #[test]
    fn test_hysteresis() {
        let bank = bank();
        let mut filter = TouchFilter::default();
        // Between the thresholds the gate does not open
        for _ in 0..500 {
            assert!(!bank.process(&mut filter, &Touch::new(1.0, 1.0, 0.025), false).is_active());
        }
        for _ in 0..500 {
            bank.process(&mut filter, &Touch::new(1.0, 1.0, 0.1), false);
        }
        // ... and once open, it stays open there
        for _ in 0..500 {
            assert!(bank.process(&mut filter, &Touch::new(1.0, 1.0, 0.025), false).is_active());
        }
    }

    #[test]
    fn test_position_smoothing() {
        let bank = bank();
        let mut filter = TouchFilter::default();
        bank.process(&mut filter, &Touch::new(0.0, 0.0, 0.05), true);
        let moved = bank.process(&mut filter, &Touch::new(1.0, 0.0, 0.05), false);
        assert!(moved.x > 0.0 && moved.x < 1.0);
        // Non-finite positions are ignored
        let held = bank.process(&mut filter, &Touch::new(f32::NAN, 0.0, 0.05), false);
        assert_eq!(held.x, moved.x);
    }
}
