use alloc::{boxed::Box, vec};

use crate::calibration::{
    CalibrationModel, Template, TemplateSet, MAX_NORMALIZE_GAIN, MIN_NORMALIZE_GAIN, TEMPLATE_RADIUS,
    TEMPLATE_SIZE,
};
use crate::common::{Grid, F32ArrayExt};
use crate::config::CalibrationConfig;
use crate::detect::parabolic_offset;
use crate::preprocess::FramePreprocessor;

/// Smoothing passes used to find the area covered by a palm or a finger.
const SMOOTHING_PASSES: usize = 3;
/// The silence threshold is this many times the mean peak of silent frames.
const SILENCE_HEADROOM: f32 = 10.0;
/// The silence threshold grows by this factor after the normalize map is done.
const SETTLE_HEADROOM: f32 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationStage {
    /// Not collecting.
    Idle,
    /// Measuring the noise floor. The surface must not be touched.
    Silence,
    /// Collecting per-cell gains while a palm is swept across the surface.
    Normalize,
    /// Waiting for hands to be lifted after the normalize map is done.
    Settle,
    /// Collecting per-cell touch shapes while a single finger visits every cell.
    Templates,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationStatus {
    /// Collection continues. `progress` is the saturated fraction of the current stage.
    Collecting { stage: CalibrationStage, progress: f32 },
    /// A new model is ready, see [Calibrator::take_model].
    Complete,
    /// The calibrator is idle and ignored the frame.
    Idle,
}

/// Collects a [CalibrationModel] from a stream of raw frames.
///
/// Collection runs through silence, normalize map and (optionally) settle and
/// template stages. It is complete once every cell in the calibrated area has
/// enough samples. Cancelling at any point discards everything collected.
pub struct Calibrator {
    config: CalibrationConfig,
    stage: CalibrationStage,
    frames: u32,
    peak_sum: f32,
    auto_threshold: f32,
    lowpass: FramePreprocessor,
    lowpass_history: Grid,
    smoother: FramePreprocessor,
    smoother_history: Grid,
    input: Grid,
    normalize_sum: Grid,
    normalize_count: Box<[u32]>,
    normalize_map: Grid,
    templates: TemplateSet,
    template_passes: Box<[u32]>,
    last_bin: Option<usize>,
    model: Option<CalibrationModel>,
}

impl Calibrator {
    pub fn new(width: usize, height: usize, config: CalibrationConfig) -> Self {
        if width < 2 * TEMPLATE_RADIUS + 1 || height < 1 {
            panic!("Calibration needs at least {} columns", 2 * TEMPLATE_RADIUS + 1)
        }
        Calibrator {
            config,
            stage: CalibrationStage::Idle,
            frames: 0,
            peak_sum: 0.0,
            auto_threshold: 0.0,
            lowpass: FramePreprocessor::new(width, height, config.input_coefficient, 0),
            lowpass_history: Grid::new(width, height),
            smoother: FramePreprocessor::new(width, height, 1.0, SMOOTHING_PASSES),
            smoother_history: Grid::new(width, height),
            input: Grid::new(width, height),
            normalize_sum: Grid::new(width, height),
            normalize_count: vec![0; width * height].into_boxed_slice(),
            normalize_map: Grid::new(width, height),
            templates: TemplateSet::new(width, height, &Template::filled(1.0)),
            template_passes: vec![0; width * height].into_boxed_slice(),
            last_bin: None,
            model: None,
        }
    }

    pub fn stage(&self) -> CalibrationStage {
        self.stage
    }

    pub fn is_calibrating(&self) -> bool {
        self.stage != CalibrationStage::Idle
    }

    /// Pressure a frame peak must exceed to count as a touch, derived from the silence stage.
    pub fn auto_threshold(&self) -> f32 {
        self.auto_threshold
    }

    /// Starts a new collection, discarding any previous state.
    pub fn begin(&mut self) {
        log::info!("calibration: collecting silence, do not touch the surface");
        self.stage = CalibrationStage::Silence;
        self.frames = 0;
        self.peak_sum = 0.0;
        self.auto_threshold = 0.0;
        self.lowpass_history.fill(0.0);
        self.normalize_sum.fill(0.0);
        for count in self.normalize_count.iter_mut() {
            *count = 0;
        }
        self.normalize_map.fill(1.0);
        self.templates = TemplateSet::new(self.input.width(), self.input.height(), &Template::filled(1.0));
        for passes in self.template_passes.iter_mut() {
            *passes = 0;
        }
        self.last_bin = None;
        self.model = None;
    }

    pub fn cancel(&mut self) {
        if self.is_calibrating() {
            log::info!("calibration: cancelled");
        }
        self.stage = CalibrationStage::Idle;
        self.model = None;
    }

    /// Takes the model produced by the most recent complete collection.
    pub fn take_model(&mut self) -> Option<CalibrationModel> {
        self.model.take()
    }

    pub fn add_frame(&mut self, frame: &[f32]) -> CalibrationStatus {
        if !self.is_calibrating() {
            return CalibrationStatus::Idle;
        }
        self.input
            .copy_from(self.lowpass.process(frame, &mut self.lowpass_history, None));
        let (_, _, peak) = self.input.peak();

        match self.stage {
            CalibrationStage::Silence => self.collect_silence(peak),
            CalibrationStage::Normalize => self.collect_normalize(peak),
            CalibrationStage::Settle => self.settle(),
            CalibrationStage::Templates => self.collect_template(peak),
            CalibrationStage::Idle => CalibrationStatus::Idle,
        }
    }

    fn collect_silence(&mut self, peak: f32) -> CalibrationStatus {
        self.peak_sum += peak;
        self.frames += 1;
        if self.frames < self.config.silence_frames {
            return self.collecting(self.frames as f32 / self.config.silence_frames as f32);
        }
        self.auto_threshold = self.peak_sum / self.frames as f32 * SILENCE_HEADROOM;
        log::info!(
            "calibration: silence collected (auto threshold {}), sweep a palm across the surface",
            self.auto_threshold
        );
        self.stage = CalibrationStage::Normalize;
        self.frames = 0;
        self.collecting(0.0)
    }

    fn collect_normalize(&mut self, peak: f32) -> CalibrationStatus {
        if peak > self.auto_threshold && peak > 0.0 {
            let threshold = peak * self.config.normalize_threshold;
            let smoothed = self.smoother.process(self.input.as_slice(), &mut self.smoother_history, None);
            let width = self.input.width();
            for y in 0..self.input.height() {
                for x in 1..width - 1 {
                    if smoothed.get(x, y) > threshold {
                        let sum = self.normalize_sum.get(x, y) + self.input.get(x, y) / peak;
                        self.normalize_sum.set(x, y, sum);
                        self.normalize_count[y * width + x] += 1;
                    }
                }
            }
        }

        let required = self.config.normalize_samples;
        let progress = self.area_progress(1, |calibrator, index| {
            calibrator.normalize_count[index] as f32 / required as f32
        });
        if progress < 1.0 {
            return self.collecting(progress);
        }

        let maximum = self.make_normalize_map();
        log::info!("calibration: normalize map done (max gain {})", maximum);
        if !self.config.collect_templates {
            return self.complete(false);
        }
        self.stage = CalibrationStage::Settle;
        self.frames = 0;
        self.collecting(0.0)
    }

    fn make_normalize_map(&mut self) -> f32 {
        let width = self.input.width();
        let mut sum = 0.0;
        let mut cells = 0;
        for y in 0..self.input.height() {
            for x in 0..width {
                let count = self.normalize_count[y * width + x];
                if x == 0 || x == width - 1 || count == 0 {
                    self.normalize_map.set(x, y, 0.0);
                    continue;
                }
                let average = self.normalize_sum.get(x, y) / count as f32;
                sum += average;
                cells += 1;
                let gain = if average > 0.0 { 1.0 / average } else { MAX_NORMALIZE_GAIN };
                self.normalize_map.set(x, y, gain);
            }
        }
        if cells > 0 {
            self.normalize_map.scale(sum / cells as f32);
        }
        self.normalize_map.clamp_min(MIN_NORMALIZE_GAIN);
        self.normalize_map.clamp_max(MAX_NORMALIZE_GAIN);
        self.normalize_map.as_slice().peak_level()
    }

    fn settle(&mut self) -> CalibrationStatus {
        self.frames += 1;
        if self.frames < self.config.settle_frames {
            return self.collecting(self.frames as f32 / self.config.settle_frames as f32);
        }
        self.auto_threshold *= SETTLE_HEADROOM;
        log::info!(
            "calibration: settled (auto threshold {}), visit every area with a single finger",
            self.auto_threshold
        );
        self.stage = CalibrationStage::Templates;
        self.last_bin = None;
        self.collecting(0.0)
    }

    fn collect_template(&mut self, peak: f32) -> CalibrationStatus {
        if peak > self.auto_threshold && peak > 0.0 {
            self.input.multiply(&self.normalize_map);
            let smoothed = self.smoother.process(self.input.as_slice(), &mut self.smoother_history, None);

            let (px, py, z) = smoothed.peak();
            let width = smoothed.width();
            let height = smoothed.height();
            if z > 0.0 {
                let (ix, iy) = (px as isize, py as isize);
                let dx = parabolic_offset(smoothed.get_clamped(ix - 1, iy), z, smoothed.get_clamped(ix + 1, iy));
                let dy = parabolic_offset(smoothed.get_clamped(ix, iy - 1), z, smoothed.get_clamped(ix, iy + 1));
                let x = (px as f32 + dx).max(TEMPLATE_RADIUS as f32).min((width - 1 - TEMPLATE_RADIUS) as f32);
                let y = (py as f32 + dy).max(0.0).min((height - 1) as f32);

                let mut sample = Template::filled(0.0);
                let radius = TEMPLATE_RADIUS as f32;
                for j in 0..TEMPLATE_SIZE {
                    for i in 0..TEMPLATE_SIZE {
                        let value = smoothed.interpolated(x + i as f32 - radius, y + j as f32 - radius);
                        sample.set(i, j, value.max(0.0));
                    }
                }
                let center = sample.get(TEMPLATE_RADIUS, TEMPLATE_RADIUS);
                if center > 0.0 {
                    for j in 0..TEMPLATE_SIZE {
                        for i in 0..TEMPLATE_SIZE {
                            sample.set(i, j, sample.get(i, j) / center);
                        }
                    }
                    let (bx, by) = ((x + 0.5) as usize, (y + 0.5) as usize);
                    let (bx, by) = (bx.min(width - 1 - TEMPLATE_RADIUS), by.min(height - 1));
                    let bin = by * width + bx;
                    let mut template = self.templates.get(bx, by);
                    template.min_with(&sample);
                    self.templates.set(bx, by, &template);
                    if self.last_bin != Some(bin) {
                        self.last_bin = Some(bin);
                        if self.template_passes[bin] < self.config.template_passes {
                            self.template_passes[bin] += 1;
                        }
                    }
                }
            }
        } else {
            self.last_bin = None;
        }

        let required = self.config.template_passes;
        let progress = self.area_progress(TEMPLATE_RADIUS, |calibrator, index| {
            calibrator.template_passes[index] as f32 / required as f32
        });
        if progress < 1.0 {
            return self.collecting(progress);
        }
        log::info!("calibration: templates done");
        self.complete(true)
    }

    /// Mean saturation over the cells at least `margin` columns away from the
    /// left and right edges. Returns 1 only if every such cell is saturated.
    fn area_progress<F>(&self, margin: usize, saturation: F) -> f32
    where
        F: Fn(&Calibrator, usize) -> f32,
    {
        let width = self.input.width();
        let mut sum = 0.0;
        let mut cells = 0;
        let mut saturated = true;
        for y in 0..self.input.height() {
            for x in margin..width - margin {
                let value = saturation(self, y * width + x).min(1.0);
                saturated &= value >= 1.0;
                sum += value;
                cells += 1;
            }
        }
        if saturated {
            1.0
        } else {
            (sum / cells as f32).min(0.999)
        }
    }

    fn collecting(&self, progress: f32) -> CalibrationStatus {
        CalibrationStatus::Collecting {
            stage: self.stage,
            progress,
        }
    }

    fn complete(&mut self, with_templates: bool) -> CalibrationStatus {
        let (width, height) = (self.input.width(), self.input.height());
        let templates = if with_templates {
            // Cells outside the calibrated area keep the default shape
            let mut templates = self.templates.clone();
            for y in 0..height {
                for x in 0..width {
                    if x < TEMPLATE_RADIUS || x >= width - TEMPLATE_RADIUS {
                        templates.set(x, y, &Template::cone());
                    }
                }
            }
            Some(templates)
        } else {
            None
        };
        self.model = Some(CalibrationModel::new(Some(self.normalize_map.clone()), templates));
        self.stage = CalibrationStage::Idle;
        CalibrationStatus::Complete
    }
}
