use crate::config::MAX_TOUCHES;
use crate::detect::PeakList;
use crate::keymap::KeyMapper;
use crate::track::Touch;

/// Turns the strongest peaks of a frame into candidate touches in key coordinates.
pub struct CandidateBuilder {
    mapper: KeyMapper,
    min_pressure: f32,
}

impl CandidateBuilder {
    /// Peaks below `min_pressure` become empty candidates.
    pub fn new(mapper: KeyMapper, min_pressure: f32) -> Self {
        CandidateBuilder {
            mapper,
            min_pressure,
        }
    }

    pub fn mapper(&self) -> &KeyMapper {
        &self.mapper
    }

    pub fn set_min_pressure(&mut self, min_pressure: f32) {
        self.min_pressure = min_pressure;
    }

    /// Fills the first `count` candidates from `peaks`, which must be sorted by
    /// descending pressure. Candidates without a peak, or with a peak below the
    /// minimum pressure, have zero pressure. Returns the number of non-empty candidates.
    pub fn build(&self, peaks: &PeakList, count: usize, candidates: &mut [Touch; MAX_TOUCHES]) -> usize {
        let mut active = 0;
        for (i, candidate) in candidates.iter_mut().take(count).enumerate() {
            *candidate = match peaks.as_slice().get(i) {
                Some(peak) if peak.z >= self.min_pressure => {
                    active += 1;
                    let (x, y) = self.mapper.map(peak.x, peak.y);
                    Touch::new(x, y, peak.z)
                }
                _ => Touch::default(),
            };
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Peak;

    fn peak(x: f32, z: f32) -> Peak {
        Peak {
            x,
            y: 2.0,
            z,
            saliency: z,
        }
    }

    #[test]
    fn test_truncates_and_zero_fills() {
        let builder = CandidateBuilder::new(KeyMapper::identity(16, 8), 0.02);
        let mut peaks = PeakList::new(8);
        for (x, z) in [(3.0, 0.1), (6.0, 0.3), (9.0, 0.2), (12.0, 0.01)] {
            peaks.insert(peak(x, z));
        }
        let mut candidates = [Touch::new(1.0, 1.0, 1.0); MAX_TOUCHES];

        assert_eq!(builder.build(&peaks, 2, &mut candidates), 2);
        assert_eq!(candidates[0], Touch::new(6.0, 2.0, 0.3));
        assert_eq!(candidates[1], Touch::new(9.0, 2.0, 0.2));
        // Beyond the count, candidates are left alone
        assert_eq!(candidates[2], Touch::new(1.0, 1.0, 1.0));

        assert_eq!(builder.build(&peaks, 6, &mut candidates), 3);
        assert_eq!(candidates[3], Touch::default());
        assert_eq!(candidates[5], Touch::default());
    }

    #[test]
    fn test_maps_to_keys() {
        let builder = CandidateBuilder::new(KeyMapper::soundplane_a(), 0.02);
        let mut peaks = PeakList::new(4);
        peaks.insert(Peak {
            x: 3.5,
            y: 1.25,
            z: 0.1,
            saliency: 0.1,
        });
        let mut candidates = [Touch::default(); MAX_TOUCHES];
        builder.build(&peaks, 4, &mut candidates);
        assert_eq!((candidates[0].x, candidates[0].y), (1.0, 1.0));
    }
}
