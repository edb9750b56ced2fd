//! Sample-to-column reduction
//!
//! A render pass walks the PCM bytes of a tile in steps of `bytes_per_step`.
//! Each step becomes one `EnvelopeColumn`: for every channel a top and a
//! bottom y position inside that channel's horizontal band of the tile.
//!
//! ## Scales
//!
//! - **Linear**: min and max sample mapped over the full 16-bit range
//! - **Decibel (average)**: the mean absolute amplitude of the step, as a level
//!   above the floor, rising from the bottom of the band. The two envelope
//!   lines are kept `DECIBEL_DRAW_DELTA` pixels apart.
//! - **Decibel (peak)**: min and max sample levels mirrored around the band
//!   center, positive samples above and negative below
//!
//! Decibel passes also record the extreme levels reached so the caller can
//! run a second pass (`rescale`) that stretches the observed range to the
//! full band height.

use narrate_core::{ByteOrder, PcmFormat};

use super::decibel::{DecibelRange, DecibelScale, ReachedLevels};
use super::job::RenderConfig;

/// Keeps envelope lines off the very top and bottom of a band
pub const TOLERANCE: f64 = 5.0;

/// Vertical gap between the two envelope lines in average-decibel mode
pub const DECIBEL_DRAW_DELTA: f64 = 2.0;

/// Most channels the engine draws
pub const MAX_CHANNELS: usize = 2;

/// Magnitude of `i16::MIN`, which `abs()` cannot represent
const MIN_SAMPLE_MAGNITUDE: f64 = 32768.0;

/// Full span of the 16-bit sample range
const SAMPLE_SPAN: f64 = u16::MAX as f64;

/// How amplitudes map to y positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    Linear,
    DecibelAverage,
    DecibelPeak,
}

impl ScaleMode {
    pub fn from_config(config: &RenderConfig) -> Self {
        match (config.use_decibels, config.decibels_no_average) {
            (false, _) => ScaleMode::Linear,
            (true, false) => ScaleMode::DecibelAverage,
            (true, true) => ScaleMode::DecibelPeak,
        }
    }

    pub fn is_decibel(self) -> bool {
        self != ScaleMode::Linear
    }
}

/// Top and bottom of one channel's envelope at a column, in tile pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelEnvelope {
    pub top: f32,
    pub bottom: f32,
}

/// Levels a decibel column was placed from, kept for the rescale pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ChannelLevels {
    low: f64,
    low_negative: bool,
    high: f64,
    high_negative: bool,
}

/// One reduction step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvelopeColumn {
    /// Horizontal position relative to the tile origin
    pub x: f32,
    pub channels: [ChannelEnvelope; MAX_CHANNELS],
    levels: [ChannelLevels; MAX_CHANNELS],
}

/// Raw per-channel statistics of one step
#[derive(Debug, Clone, Copy)]
struct StepStats {
    min: i16,
    max: i16,
    average: f64,
}

/// Reduction parameters frozen for one render job
#[derive(Debug, Clone)]
pub struct Reducer {
    mode: ScaleMode,
    scale: DecibelScale,
    channels: usize,
    byte_depth: usize,
    byte_order: ByteOrder,
    samples_per_step: usize,
    bytes_per_pixel: f64,
    band_height: f64,
    reached: ReachedLevels,
}

impl Reducer {
    /// Returns `None` when the zoom/resolution combination yields no whole
    /// frame per step, which simply means there is nothing to draw.
    pub fn new(
        config: &RenderConfig,
        format: PcmFormat,
        bytes_per_pixel: f64,
        height: f64,
    ) -> Option<Self> {
        if !bytes_per_pixel.is_finite() || bytes_per_pixel <= 0.0 || !(height > 0.0) {
            return None;
        }
        let channels = format.channel_count() as usize;
        let byte_depth = format.byte_depth() as usize;

        let raw = bytes_per_pixel * config.resolution / byte_depth as f64;
        if !raw.is_finite() || raw < 1.0 {
            return None;
        }
        let raw = raw.floor() as usize;
        let samples_per_step = raw - raw % channels;
        if samples_per_step == 0 {
            return None;
        }

        Some(Self {
            mode: ScaleMode::from_config(config),
            scale: DecibelScale::new(config.decibel_resolution),
            channels,
            byte_depth,
            byte_order: format.byte_order(),
            samples_per_step,
            bytes_per_pixel,
            band_height: height / channels as f64,
            reached: ReachedLevels::default(),
        })
    }

    pub fn mode(&self) -> ScaleMode {
        self.mode
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn samples_per_step(&self) -> usize {
        self.samples_per_step
    }

    pub fn bytes_per_step(&self) -> usize {
        self.samples_per_step * self.byte_depth
    }

    /// Horizontal advance of one step
    pub fn pixels_per_step(&self) -> f64 {
        self.bytes_per_step() as f64 / self.bytes_per_pixel
    }

    /// Levels reached so far in this pass
    pub fn reached(&self) -> ReachedLevels {
        self.reached
    }

    /// Fixed range used during the first pass
    pub fn default_range(&self) -> DecibelRange {
        DecibelRange {
            low: self.scale.floor(),
            high: 0.0,
        }
    }

    /// Range that stretches the observed levels over the band
    ///
    /// `None` when nothing but silence was seen.
    pub fn adjusted_range(&self, reached: &ReachedLevels) -> Option<DecibelRange> {
        if reached.is_empty() {
            return None;
        }
        let high = match self.mode {
            ScaleMode::DecibelPeak => reached.max,
            _ => 0.0,
        };
        if high - reached.min <= f64::EPSILON {
            return None;
        }
        Some(DecibelRange {
            low: reached.min,
            high,
        })
    }

    /// Reduce one step of interleaved samples
    ///
    /// Trailing bytes that do not form a whole frame are ignored. Returns
    /// `None` if the slice holds no whole frame.
    pub fn reduce_step(&mut self, bytes: &[u8], x: f32) -> Option<EnvelopeColumn> {
        let frame_bytes = self.channels * self.byte_depth;
        let frames = bytes.len() / frame_bytes;
        if frames == 0 {
            return None;
        }

        let mut column = EnvelopeColumn {
            x,
            channels: [ChannelEnvelope::default(); MAX_CHANNELS],
            levels: [ChannelLevels::default(); MAX_CHANNELS],
        };
        let range = self.default_range();

        for channel in 0..self.channels {
            let stats = self.channel_stats(bytes, frames, channel);
            let levels = self.levels_for(&stats);
            column.levels[channel] = levels;
            column.channels[channel] = match self.mode {
                ScaleMode::Linear => self.place_linear(&stats, channel),
                _ => self.place_decibel(&levels, &range, channel),
            };
        }
        Some(column)
    }

    /// Second pass: re-place decibel columns over `range`
    pub fn rescale(&self, columns: &mut [EnvelopeColumn], range: &DecibelRange) {
        if !self.mode.is_decibel() {
            return;
        }
        for column in columns.iter_mut() {
            for channel in 0..self.channels {
                column.channels[channel] = self.place_decibel(&column.levels[channel], range, channel);
            }
        }
    }

    fn channel_stats(&self, bytes: &[u8], frames: usize, channel: usize) -> StepStats {
        let mut min = i16::MAX;
        let mut max = i16::MIN;
        let mut total = 0.0;
        for frame in 0..frames {
            let offset = (frame * self.channels + channel) * self.byte_depth;
            let sample = self.byte_order.decode([bytes[offset], bytes[offset + 1]]);
            total += if sample == i16::MIN {
                MIN_SAMPLE_MAGNITUDE
            } else {
                sample.unsigned_abs() as f64
            };
            min = min.min(sample);
            max = max.max(sample);
        }
        StepStats {
            min,
            max,
            average: total / frames as f64,
        }
    }

    fn levels_for(&mut self, stats: &StepStats) -> ChannelLevels {
        match self.mode {
            ScaleMode::Linear => ChannelLevels::default(),
            ScaleMode::DecibelAverage => {
                let db = self.level_of(stats.average);
                ChannelLevels {
                    low: db,
                    low_negative: false,
                    high: db,
                    high_negative: false,
                }
            }
            ScaleMode::DecibelPeak => ChannelLevels {
                low: self.level_of(magnitude(stats.min)),
                low_negative: stats.min < 0,
                high: self.level_of(magnitude(stats.max)),
                high_negative: stats.max < 0,
            },
        }
    }

    fn level_of(&mut self, magnitude: f64) -> f64 {
        let db = self.scale.to_db(magnitude);
        if magnitude > 0.0 {
            self.reached.observe(db);
        }
        db
    }

    fn place_linear(&self, stats: &StepStats, channel: usize) -> ChannelEnvelope {
        let hh = self.band_height;
        let pix_per_unit = hh / SAMPLE_SPAN;
        let y_min = hh - pix_per_unit * (stats.min as f64 - i16::MIN as f64);
        let y_max = hh - pix_per_unit * (stats.max as f64 - i16::MIN as f64);
        self.finish(y_max, y_min, channel)
    }

    fn place_decibel(
        &self,
        levels: &ChannelLevels,
        range: &DecibelRange,
        channel: usize,
    ) -> ChannelEnvelope {
        let hh = self.band_height;
        match self.mode {
            ScaleMode::DecibelPeak => {
                let half = hh / 2.0;
                let y_of = |db: f64, negative: bool| {
                    let offset = half * range.fraction(db);
                    if negative {
                        half + offset
                    } else {
                        half - offset
                    }
                };
                let a = y_of(levels.high, levels.high_negative);
                let b = y_of(levels.low, levels.low_negative);
                self.finish(a.min(b), a.max(b), channel)
            }
            _ => {
                let base = hh - hh * range.fraction(levels.high);
                self.finish(base - DECIBEL_DRAW_DELTA, base + DECIBEL_DRAW_DELTA, channel)
            }
        }
    }

    /// Clamp into the tolerance band and shift into the channel's band
    fn finish(&self, top: f64, bottom: f64, channel: usize) -> ChannelEnvelope {
        let hh = self.band_height;
        let clamp = |y: f64| y.max(TOLERANCE).min(hh - TOLERANCE);
        let offset = hh * channel as f64;
        ChannelEnvelope {
            top: (clamp(top) + offset) as f32,
            bottom: (clamp(bottom) + offset) as f32,
        }
    }
}

fn magnitude(sample: i16) -> f64 {
    if sample == i16::MIN {
        MIN_SAMPLE_MAGNITUDE
    } else {
        sample.unsigned_abs() as f64
    }
}
