//! Bar-chart waveform rendering for the master player canvas.

use crate::config::{parse_color, WaveformConfig};
use crate::error::{CoreError, Result};
use image::{Rgba, RgbaImage};

/// Canvas dimensions in CSS pixels plus the display's pixel density
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub css_width: f64,
    pub css_height: f64,
    pub pixel_ratio: f64,
}

impl CanvasSize {
    #[must_use]
    pub const fn new(css_width: f64, css_height: f64, pixel_ratio: f64) -> Self {
        Self {
            css_width,
            css_height,
            pixel_ratio,
        }
    }

    fn ratio(&self) -> f64 {
        if self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0 {
            self.pixel_ratio
        } else {
            1.0
        }
    }

    /// Backing-store dimensions in device pixels, at least 1x1
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn device_size(&self) -> (u32, u32) {
        let scale = |css: f64| {
            let px = (css.max(0.0) * self.ratio()).round();
            if px.is_finite() {
                px.clamp(1.0, f64::from(u32::MAX)) as u32
            } else {
                1
            }
        };
        (scale(self.css_width), scale(self.css_height))
    }
}

/// Colors and bar geometry, in CSS pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RendererStyle {
    pub bar_width: f32,
    pub bar_gap: f32,
    pub played: Rgba<u8>,
    pub unplayed: Rgba<u8>,
    pub background: Rgba<u8>,
}

impl Default for RendererStyle {
    fn default() -> Self {
        Self {
            bar_width: 2.0,
            bar_gap: 1.0,
            played: Rgba([0xFF, 0x55, 0x00, 0xFF]),
            unplayed: Rgba([0x9A, 0x9A, 0x9A, 0xFF]),
            background: Rgba([0, 0, 0, 0]),
        }
    }
}

impl RendererStyle {
    /// Build a style from the `[waveform]` config section
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if either color is not a hex color.
    pub fn from_config(config: &WaveformConfig) -> Result<Self> {
        let color = |hex: &str| {
            parse_color(hex)
                .map(|(r, g, b, a)| Rgba([r, g, b, a]))
                .ok_or_else(|| CoreError::ConfigInvalid {
                    message: format!("invalid waveform color {hex:?}"),
                })
        };
        Ok(Self {
            bar_width: config.bar_width,
            bar_gap: config.bar_gap,
            played: color(&config.played_color)?,
            unplayed: color(&config.unplayed_color)?,
            background: Rgba([0, 0, 0, 0]),
        })
    }
}

/// Reduce `peaks` to `bar_count` bar heights in `[0, 1]`.
///
/// Each bar takes the maximum absolute amplitude of its contiguous slice of
/// samples, normalized by the global maximum. Returns an empty list when
/// there is nothing to draw (no samples, no bars, or all-zero amplitude).
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn bar_amplitudes(peaks: &[f32], bar_count: usize) -> Vec<f32> {
    let global_max = peaks
        .iter()
        .filter(|p| p.is_finite())
        .fold(0.0_f32, |max, p| max.max(p.abs()));
    if peaks.is_empty() || bar_count == 0 || global_max <= 0.0 {
        return Vec::new();
    }

    let step = peaks.len() as f64 / bar_count as f64;
    (0..bar_count)
        .map(|i| {
            let start = ((i as f64 * step) as usize).min(peaks.len() - 1);
            let end = (((i + 1) as f64 * step) as usize).clamp(start + 1, peaks.len());
            let slice_max = peaks[start..end]
                .iter()
                .filter(|p| p.is_finite())
                .fold(0.0_f32, |max, p| max.max(p.abs()));
            slice_max / global_max
        })
        .collect()
}

/// Map a click at `click_x` on a waveform `width` wide to a seek fraction
#[must_use]
pub fn seek_fraction(click_x: f64, width: f64) -> f64 {
    if !click_x.is_finite() || !width.is_finite() || width <= 0.0 {
        return 0.0;
    }
    (click_x / width).clamp(0.0, 1.0)
}

/// Draws peaks and a progress split into a device-pixel image
#[derive(Debug, Clone, Default)]
pub struct WaveformCanvasRenderer {
    style: RendererStyle,
}

impl WaveformCanvasRenderer {
    #[must_use]
    pub const fn new(style: RendererStyle) -> Self {
        Self { style }
    }

    #[must_use]
    pub const fn style(&self) -> &RendererStyle {
        &self.style
    }

    /// How many bars fit on a canvas of `size`
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn bar_count(&self, size: CanvasSize) -> usize {
        let (width, _) = size.device_size();
        let slot = f64::from(self.style.bar_width + self.style.bar_gap) * size.ratio();
        if slot <= 0.0 {
            return 0;
        }
        (f64::from(width) / slot).floor() as usize
    }

    /// Render `peaks` with everything left of `progress` in the played color.
    ///
    /// Pure: identical inputs always give identical pixels. Empty or silent
    /// peaks render the flat center-line placeholder.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn render(&self, peaks: &[f32], progress: f64, size: CanvasSize) -> RgbaImage {
        let (width, height) = size.device_size();
        let mut canvas = RgbaImage::from_pixel(width, height, self.style.background);
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let bars = bar_amplitudes(peaks, self.bar_count(size));
        if bars.is_empty() {
            self.draw_placeholder(&mut canvas, progress, size.ratio());
            return canvas;
        }

        let ratio = size.ratio();
        let slot = f64::from(self.style.bar_width + self.style.bar_gap) * ratio;
        let bar_px = (f64::from(self.style.bar_width) * ratio).round().max(1.0) as u32;
        let bar_total = bars.len() as f64;

        for (i, amplitude) in bars.iter().enumerate() {
            let color = if (i as f64) / bar_total < progress {
                self.style.played
            } else {
                self.style.unplayed
            };
            let bar_height = (f64::from(*amplitude) * f64::from(height))
                .round()
                .clamp(1.0, f64::from(height)) as u32;
            let x0 = (i as f64 * slot).round() as u32;
            let y0 = (height - bar_height) / 2;
            fill_rect(&mut canvas, x0, y0, bar_px, bar_height, color);
        }
        canvas
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn draw_placeholder(&self, canvas: &mut RgbaImage, progress: f64, ratio: f64) {
        let (width, height) = canvas.dimensions();
        let thickness = ratio.round().clamp(1.0, f64::from(height)) as u32;
        let y0 = (height - thickness) / 2;
        let split = (f64::from(width) * progress).round() as u32;
        fill_rect(canvas, 0, y0, split, thickness, self.style.played);
        fill_rect(canvas, split, y0, width.saturating_sub(split), thickness, self.style.unplayed);
    }
}

fn fill_rect(canvas: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    for y in y0..y0.saturating_add(h).min(height) {
        for x in x0..x0.saturating_add(w).min(width) {
            canvas.put_pixel(x, y, color);
        }
    }
}
