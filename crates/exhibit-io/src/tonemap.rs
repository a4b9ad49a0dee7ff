// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CPU-side Reinhard tone mapping.
//!
//! The operator is the image-adaptive variant of Reinhard's global operator:
//! a key value derived from the log-luminance histogram sets the adaptation
//! exponent, each channel is compressed as `c / (c + adapt^key)`, and the
//! result is stretched to `[0, 1]` and gamma encoded.
//!
//! Everything runs on a single thread in a fixed order, with `f64`
//! accumulators for the image statistics, so the same input and settings
//! always produce bit-identical output.

use exhibit_core::ToneMapSettings;
use image::{Rgb, Rgb32FImage, RgbImage};

/// Luminance weights applied to (R, G, B).
// Channel order is R, G, B, so 0.299 weighs red, never blue as a BGR buffer would.
const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Floor applied to luminance before taking its logarithm.
const LOG_LUMA_FLOOR: f32 = 1e-4;

/// Largest 8-bit display value.
const DISPLAY_MAX: f32 = 255.0;

/// The Reinhard operator bound to one set of parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReinhardOperator {
    settings: ToneMapSettings,
}

impl ReinhardOperator {
    /// Creates an operator. `settings` is expected to be validated.
    pub fn new(settings: ToneMapSettings) -> Self {
        Self { settings }
    }

    /// The parameters in use.
    pub fn settings(&self) -> &ToneMapSettings {
        &self.settings
    }

    /// Tone maps a linear HDR image into normalised `[0, 1]` values.
    ///
    /// Negative and non-finite samples carry no radiance and are treated as 0.
    pub fn apply(&self, hdr: &Rgb32FImage) -> Rgb32FImage {
        let mut out = hdr.clone();
        let samples: &mut [f32] = &mut out;
        if samples.is_empty() {
            return out;
        }

        for v in samples.iter_mut() {
            *v = sanitize(*v);
        }
        stretch_to_unit(samples);

        let gray: Vec<f32> = samples.chunks_exact(3).map(luminance).collect();
        let map_key = map_key(&gray);
        let intensity = (-self.settings.intensity).exp();
        let gray_mean = mean(gray.iter().copied()) as f32;
        let channel_means: [f32; 3] =
            std::array::from_fn(|c| mean(samples.iter().skip(c).step_by(3).copied()) as f32);

        let ca = self.settings.color_adapt;
        let la = self.settings.light_adapt;
        for (pixel, &g) in samples.chunks_exact_mut(3).zip(&gray) {
            for (c, value) in pixel.iter_mut().enumerate() {
                let global = ca * channel_means[c] + (1.0 - ca) * gray_mean;
                let local = ca * *value + (1.0 - ca) * g;
                let adapt = la * local + (1.0 - la) * global;
                let adapt = (intensity * adapt).powf(map_key);
                let denom = adapt + *value;
                *value = if denom > 0.0 { *value / denom } else { 0.0 };
            }
        }

        stretch_to_unit(samples);
        let inv_gamma = 1.0 / self.settings.gamma;
        for v in samples.iter_mut() {
            *v = v.powf(inv_gamma);
        }
        out
    }
}

/// Scales normalised values to 8-bit display values.
pub fn to_display(image: &Rgb32FImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgb([display_value(r), display_value(g), display_value(b)])
    })
}

/// `round(clamp(v * 255, 0, 255))`, with NaN mapped to 0.
#[inline]
pub fn display_value(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v * DISPLAY_MAX).clamp(0.0, DISPLAY_MAX).round() as u8
}

#[inline]
fn sanitize(v: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

#[inline]
fn luminance(pixel: &[f32]) -> f32 {
    LUMA_WEIGHTS[0] * pixel[0] + LUMA_WEIGHTS[1] * pixel[1] + LUMA_WEIGHTS[2] * pixel[2]
}

fn mean(values: impl Iterator<Item = f32>) -> f64 {
    let (sum, count) = values.fold((0.0f64, 0usize), |(sum, n), v| (sum + v as f64, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Maps the sample range onto `[0, 1]`. A flat image is left untouched.
fn stretch_to_unit(samples: &mut [f32]) {
    let (min, max) = samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if (max as f64 - min as f64) > f64::EPSILON {
        let range = max - min;
        for v in samples.iter_mut() {
            *v = (*v - min) / range;
        }
    }
}

/// Adaptation exponent from the log-luminance statistics.
///
/// `key` is where the mean log luminance sits between the extremes: a dark
/// image with a few highlights gets a high key and a stronger compression.
fn map_key(gray: &[f32]) -> f32 {
    let mut log_min = f32::INFINITY;
    let mut log_max = f32::NEG_INFINITY;
    let mut log_sum = 0.0f64;
    for &g in gray {
        let l = g.max(LOG_LUMA_FLOOR).ln();
        log_min = log_min.min(l);
        log_max = log_max.max(l);
        log_sum += l as f64;
    }
    let log_mean = (log_sum / gray.len().max(1) as f64) as f32;

    let range = log_max - log_min;
    let key = if range > f32::EPSILON {
        (log_max - log_mean) / range
    } else {
        0.0
    };
    0.3 + 0.7 * key.powf(1.4)
}
