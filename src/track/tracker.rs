use alloc::boxed::Box;

use crate::calibration::{CalibrationModel, CalibrationStage, CalibrationStatus, Calibrator, TEMPLATE_SIZE};
use crate::common::Grid;
use crate::config::{CalibrationConfig, DetectorKind, TrackerConfig, MAX_TOUCHES};
use crate::detect::{CurvatureDetector, PeakDetector, PeakList, SpanDetector, MAX_KEY_STATES};
use crate::error::ConfigError;
use crate::keymap::KeyMapper;
use crate::preprocess::FramePreprocessor;
use crate::snapshot::{SnapshotPublisher, TrackerSnapshot};
use crate::track::{
    write_touches, Assignment, CandidateBuilder, FilterBank, Slot, Touch, TouchFilter, TouchMatcher,
    OUTPUT_COLUMNS,
};

/// The outcome of processing one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameStatus {
    /// The output holds the current touches. `active` of them have a non-zero age.
    Tracked { active: usize },
    /// The frame was consumed by calibration and the output was zeroed. A
    /// completed calibration reports `CalibrationStage::Idle` with progress 1.
    Calibrating { stage: CalibrationStage, progress: f32 },
    /// No output is bound, or the output is too small for the configured touches.
    /// The output was not written.
    Disabled,
    /// The frame has the wrong size or contains non-finite samples. Nothing
    /// was written and no state changed.
    BadFrame,
}

/// Everything a [TouchTracker] carries from one frame to the next: the
/// temporal smoothing history, the touch slots and their filters.
///
/// Created by [TouchTracker::new_state] and passed to every
/// [TouchTracker::process] call.
#[derive(Clone)]
pub struct TrackerState {
    history: Grid,
    slots: [Slot; MAX_TOUCHES],
    filters: [TouchFilter; MAX_TOUCHES],
    touches: [Touch; MAX_TOUCHES],
    raw_touches: [Touch; MAX_TOUCHES],
    /// First slot tried for the next new touch in rotate mode.
    next_slot: usize,
    frames: u64,
    dropped: u32,
}

impl TrackerState {
    fn new(width: usize, height: usize) -> Self {
        TrackerState {
            history: Grid::new(width, height),
            slots: [Slot::default(); MAX_TOUCHES],
            filters: [TouchFilter::default(); MAX_TOUCHES],
            touches: [Touch::default(); MAX_TOUCHES],
            raw_touches: [Touch::default(); MAX_TOUCHES],
            next_slot: 0,
            frames: 0,
            dropped: 0,
        }
    }

    /// Filtered touches, one per slot. Slots at or beyond the configured
    /// number of touches are always inactive.
    pub fn touches(&self) -> &[Touch] {
        &self.touches
    }

    /// Slot touches before filtering.
    pub fn raw_touches(&self) -> &[Touch] {
        &self.raw_touches
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Frames processed since creation or the last reset.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Candidates dropped because no slot was free.
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }

    /// Forgets all touches and the smoothing history.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.slots = [Slot::default(); MAX_TOUCHES];
        self.filters = [TouchFilter::default(); MAX_TOUCHES];
        self.touches = [Touch::default(); MAX_TOUCHES];
        self.raw_touches = [Touch::default(); MAX_TOUCHES];
        self.next_slot = 0;
        self.frames = 0;
        self.dropped = 0;
    }

    fn release_slot(&mut self, index: usize) {
        self.slots[index] = Slot::default();
        self.filters[index].reset();
        self.touches[index] = Touch::default();
        self.raw_touches[index] = Touch::default();
    }
}

/// Turns sensor frames into persistent, filtered touches.
///
/// Every frame is smoothed, searched for peaks, mapped to key coordinates and
/// matched against the touches of the previous frame. Each touch slot is then
/// filtered and written to one row of the caller's output buffer, see
/// [OUTPUT_COLUMNS]. The tracker itself holds configuration and scratch
/// buffers; everything that persists between frames lives in a
/// [TrackerState]. Nothing is allocated after construction.
pub struct TouchTracker {
    config: TrackerConfig,
    preprocessor: FramePreprocessor,
    detector: Box<dyn PeakDetector + Send>,
    peaks: PeakList,
    candidates: CandidateBuilder,
    candidate_touches: [Touch; MAX_TOUCHES],
    assignments: [Assignment; MAX_TOUCHES],
    matcher: TouchMatcher,
    filter_bank: FilterBank,
    calibration: CalibrationModel,
    calibrator: Option<Calibrator>,
    output_len: Option<usize>,
    output_enabled: bool,
    publisher: Option<SnapshotPublisher>,
}

impl TouchTracker {
    /// Creates a tracker using the Soundplane model A key layout for a 64x8
    /// grid, and one key per sensor for any other grid size.
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        let mapper = if config.width == 64 && config.height == 8 {
            KeyMapper::soundplane_a()
        } else {
            KeyMapper::identity(config.width, config.height)
        };
        TouchTracker::with_key_mapper(config, mapper)
    }

    pub fn with_key_mapper(config: TrackerConfig, mapper: KeyMapper) -> Result<Self, ConfigError> {
        if let Err(error) = check_config(&config, &mapper) {
            log::warn!("Rejected tracker configuration: {}", error);
            return Err(error);
        }
        let (width, height) = (config.width, config.height);

        let mut preprocessor =
            FramePreprocessor::new(width, height, config.temporal_coefficient, config.spatial_passes);
        if let Some(cutoff) = config.spectral_cutoff {
            preprocessor = preprocessor.with_spectral_filter(cutoff);
        }
        let detector: Box<dyn PeakDetector + Send> = match config.detector {
            DetectorKind::Curvature => Box::new(CurvatureDetector::new(width, height, config.saliency_floor)),
            DetectorKind::Span => Box::new(SpanDetector::new(
                width,
                height,
                mapper,
                config.on_threshold,
                config.saliency_floor,
            )),
        };

        Ok(TouchTracker {
            config,
            preprocessor,
            detector,
            peaks: PeakList::new(config.max_peaks),
            candidates: CandidateBuilder::new(mapper, config.off_threshold),
            candidate_touches: [Touch::default(); MAX_TOUCHES],
            assignments: [Assignment::default(); MAX_TOUCHES],
            matcher: TouchMatcher::new(config.match_distance, config.pressure_weight, config.relink_frames),
            filter_bank: FilterBank::new(&config),
            calibration: CalibrationModel::neutral(),
            calibrator: None,
            output_len: None,
            output_enabled: false,
            publisher: None,
        })
    }

    /// A fresh state for this tracker's grid size.
    pub fn new_state(&self) -> TrackerState {
        TrackerState::new(self.config.width, self.config.height)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn key_mapper(&self) -> &KeyMapper {
        self.candidates.mapper()
    }

    pub fn max_touches(&self) -> usize {
        self.config.max_touches
    }

    /// Number of values the output buffer must hold.
    pub fn required_output_len(&self) -> usize {
        self.config.max_touches * OUTPUT_COLUMNS
    }

    /// Declares the length of the output buffers passed to [TouchTracker::process].
    /// Tracking stays disabled until a binding succeeds.
    pub fn bind_output(&mut self, len: usize) -> Result<(), ConfigError> {
        let required = self.required_output_len();
        self.output_len = Some(len);
        self.output_enabled = len >= required;
        if !self.output_enabled {
            log::warn!("Output of {} values is too small, {} required; tracking disabled", len, required);
            return Err(ConfigError::OutputTooSmall {
                required,
                provided: len,
            });
        }
        Ok(())
    }

    /// Changes the number of touch slots, clamped to [MAX_TOUCHES]. Slots beyond
    /// the new count are released on the next frame. The output binding is checked
    /// again and tracking is disabled if it is now too small.
    pub fn set_max_touches(&mut self, max_touches: usize) -> Result<(), ConfigError> {
        self.config.max_touches = max_touches.min(MAX_TOUCHES);
        match self.output_len {
            Some(len) => self.bind_output(len),
            None => Ok(()),
        }
    }

    /// Switches between round robin and position based allocation of new
    /// touches. Turning rotation off restarts it from slot 0 next time.
    pub fn set_rotate(&mut self, rotate: bool) {
        self.config.rotate = rotate;
    }

    pub fn set_thresholds(&mut self, on_threshold: f32, off_threshold: f32) -> Result<(), ConfigError> {
        if !(off_threshold > 0.0 && off_threshold < on_threshold) {
            log::warn!("Rejected thresholds on {} off {}", on_threshold, off_threshold);
            return Err(ConfigError::ThresholdOrder {
                on: on_threshold,
                off: off_threshold,
            });
        }
        self.config.on_threshold = on_threshold;
        self.config.off_threshold = off_threshold;
        self.apply_thresholds();
        Ok(())
    }

    /// Sets the off threshold, deriving the on threshold with a fixed hysteresis.
    pub fn set_threshold(&mut self, off_threshold: f32) -> Result<(), ConfigError> {
        let mut config = self.config;
        config.set_threshold(off_threshold);
        self.set_thresholds(config.on_threshold, config.off_threshold)
    }

    fn apply_thresholds(&mut self) {
        let (on, off) = (self.config.on_threshold, self.config.off_threshold);
        self.filter_bank.set_thresholds(on, off);
        self.candidates.set_min_pressure(off);
        self.detector.set_on_threshold(on);
    }

    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    pub fn set_calibration(&mut self, model: CalibrationModel) {
        self.calibration = model;
    }

    /// Installs stored calibration data, see [CalibrationModel::from_parts].
    /// Data of the wrong size installs the neutral model instead.
    pub fn set_calibration_data(
        &mut self,
        normalize_map: Option<&[f32]>,
        templates: Option<&[f32]>,
    ) -> Result<(), ConfigError> {
        let (width, height) = (self.config.width, self.config.height);
        match CalibrationModel::from_parts(width, height, normalize_map, templates) {
            Ok(model) => {
                self.calibration = model;
                Ok(())
            }
            Err(error) => {
                log::warn!("Rejected calibration data: {}; using neutral calibration", error);
                self.calibration = CalibrationModel::neutral();
                Err(error)
            }
        }
    }

    /// Starts collecting a new calibration. Until it completes or is cancelled,
    /// frames are consumed by calibration and no touches are reported.
    pub fn begin_calibration(&mut self, config: CalibrationConfig) -> Result<(), ConfigError> {
        let (width, height) = (self.config.width, self.config.height);
        if width < TEMPLATE_SIZE {
            return Err(ConfigError::GridTooSmall { width, height });
        }
        let mut calibrator = Calibrator::new(width, height, config);
        calibrator.begin();
        self.calibrator = Some(calibrator);
        Ok(())
    }

    /// Stops calibration, keeping the previous model.
    pub fn cancel_calibration(&mut self) {
        if let Some(mut calibrator) = self.calibrator.take() {
            calibrator.cancel();
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrator.is_some()
    }

    /// Replaces the snapshot publisher, returning the previous one.
    pub fn set_publisher(&mut self, publisher: Option<SnapshotPublisher>) -> Option<SnapshotPublisher> {
        core::mem::replace(&mut self.publisher, publisher)
    }

    /// Forgets all touches.
    pub fn clear(&self, state: &mut TrackerState) {
        state.reset();
    }

    /// The slot whose active touch lies on a key, if any.
    pub fn touch_at_key(&self, state: &TrackerState, key: usize) -> Option<usize> {
        let mapper = self.key_mapper();
        state.touches[..self.config.max_touches]
            .iter()
            .position(|touch| touch.is_active() && mapper.key_index(touch.x, touch.y) == key)
    }

    /// Processes one frame of `width * height` row major samples and writes one
    /// `[x, y, z, dz, age]` row per touch slot to `output`.
    pub fn process(&mut self, state: &mut TrackerState, frame: &[f32], output: &mut [f32]) -> FrameStatus {
        let (width, height) = (self.config.width, self.config.height);
        if frame.len() != width * height || frame.iter().any(|sample| !sample.is_finite()) {
            log::debug!("Ignoring bad frame of {} samples", frame.len());
            return FrameStatus::BadFrame;
        }
        if state.history.width() != width || state.history.height() != height {
            log::warn!(
                "Tracker state is {}x{}, expected {}x{}",
                state.history.width(),
                state.history.height(),
                width,
                height
            );
            return FrameStatus::BadFrame;
        }
        let max_touches = self.config.max_touches;
        if !self.output_enabled || output.len() < max_touches * OUTPUT_COLUMNS {
            return FrameStatus::Disabled;
        }

        if let Some(status) = self.calibrate(frame) {
            output.fill(0.0);
            return status;
        }

        let field = self
            .preprocessor
            .process(frame, &mut state.history, self.calibration.normalize_map());
        self.detector.detect(field, &mut self.peaks);
        if let (Some(threshold), Some(_)) = (self.config.template_threshold, self.calibration.templates()) {
            let calibration = &self.calibration;
            self.peaks
                .retain(|peak| calibration.template_distance(field, peak.x, peak.y) <= threshold);
        }

        self.candidates
            .build(&self.peaks, max_touches, &mut self.candidate_touches);
        let rotate = if self.config.rotate {
            Some(&mut state.next_slot)
        } else {
            state.next_slot = 0;
            None
        };
        let dropped = self.matcher.assign(
            &state.slots[..max_touches],
            &self.candidate_touches[..max_touches],
            &mut self.assignments[..max_touches],
            rotate,
        );
        state.dropped = state.dropped.saturating_add(dropped as u32);

        for i in 0..max_touches {
            let assignment = self.assignments[i];
            let candidate = assignment.candidate.map(|j| &self.candidate_touches[j]);
            let slot = &mut state.slots[i];
            let raw = match candidate {
                Some(candidate) => Touch::new(candidate.x, candidate.y, candidate.z),
                None => Touch::new(slot.x, slot.y, 0.0),
            };
            let filter = &mut state.filters[i];
            let touch = self.filter_bank.process(filter, &raw, assignment.is_new);
            self.matcher.advance(i, slot, candidate, filter.z.is_gated());

            if slot.is_exiled() {
                state.release_slot(i);
            } else {
                state.touches[i] = touch;
                state.raw_touches[i] = raw;
            }
        }
        for i in max_touches..MAX_TOUCHES {
            state.release_slot(i);
        }

        write_touches(&state.touches[..max_touches], output);
        self.publish(state);
        state.frames += 1;

        FrameStatus::Tracked {
            active: state.touches.iter().filter(|touch| touch.is_active()).count(),
        }
    }

    fn calibrate(&mut self, frame: &[f32]) -> Option<FrameStatus> {
        let calibrator = self.calibrator.as_mut()?;
        match calibrator.add_frame(frame) {
            CalibrationStatus::Collecting { stage, progress } => Some(FrameStatus::Calibrating { stage, progress }),
            CalibrationStatus::Complete => {
                if let Some(model) = calibrator.take_model() {
                    self.calibration = model;
                }
                self.calibrator = None;
                Some(FrameStatus::Calibrating {
                    stage: CalibrationStage::Idle,
                    progress: 1.0,
                })
            }
            CalibrationStatus::Idle => {
                self.calibrator = None;
                None
            }
        }
    }

    fn publish(&mut self, state: &TrackerState) {
        let publisher = match self.publisher.as_mut() {
            Some(publisher) => publisher,
            None => return,
        };
        if !publisher.tick() {
            return;
        }

        let mut snapshot = TrackerSnapshot::new();
        snapshot.frame = state.frames;
        snapshot.touches = state.touches;
        snapshot.raw_touches = state.raw_touches;
        snapshot.touch_count = self.config.max_touches;
        snapshot.peaks = self.peaks;
        snapshot.dropped = state.dropped;

        let field = self.preprocessor.field();
        let on_threshold = self.config.on_threshold;
        for (y, bits) in snapshot.threshold_bitmap.iter_mut().enumerate().take(field.height()) {
            *bits = field
                .row(y)
                .iter()
                .enumerate()
                .filter(|(_, z)| **z > on_threshold)
                .fold(0, |bits, (x, _)| bits | (1u64 << x));
        }
        self.detector.publish(&mut snapshot);

        publisher.publish(snapshot);
    }
}

fn check_config(config: &TrackerConfig, mapper: &KeyMapper) -> Result<(), ConfigError> {
    config.validate()?;
    if config.detector == DetectorKind::Span && mapper.key_count() > MAX_KEY_STATES {
        return Err(ConfigError::TooManyKeys {
            keys: mapper.key_count(),
            max: MAX_KEY_STATES,
        });
    }
    Ok(())
}
