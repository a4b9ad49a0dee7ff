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

//! The HDR to PNG conversion step.

use crate::tonemap::{to_display, ReinhardOperator};
use exhibit_core::{ConversionError, ConvertConfig};
use image::{ImageError, ImageFormat, ImageReader, Rgb32FImage, RgbImage};
use std::io::BufWriter;
use std::path::Path;
use tempfile::NamedTempFile;

/// Dimensions of a successfully written image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Decodes HDR rasters, tone maps them and writes 8-bit PNGs.
#[derive(Debug, Clone)]
pub struct ToneMapConverter {
    operator: ReinhardOperator,
    enable_exr: bool,
}

impl ToneMapConverter {
    /// Builds a converter from its configuration section.
    pub fn new(config: &ConvertConfig) -> Self {
        Self {
            operator: ReinhardOperator::new(config.tonemap),
            enable_exr: config.enable_exr,
        }
    }

    /// Converts the raster at `input` and writes the PNG to `output`.
    ///
    /// The PNG is written to a temporary file next to `output` and renamed
    /// into place, so a failed conversion never leaves a truncated image.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<ConvertedImage, ConversionError> {
        let hdr = self.load_hdr(input)?;
        let ldr = self.tone_map(&hdr);
        write_png(&ldr, output)?;
        Ok(ConvertedImage {
            width: ldr.width(),
            height: ldr.height(),
        })
    }

    /// Tone maps an already decoded raster to display values.
    pub fn tone_map(&self, hdr: &Rgb32FImage) -> RgbImage {
        to_display(&self.operator.apply(hdr))
    }

    /// Decodes `path` into linear RGB `f32`, whatever its channel layout.
    ///
    /// The format is detected from the file contents rather than its name.
    /// Integer rasters are normalised to `[0, 1]`; alpha is discarded.
    pub fn load_hdr(&self, path: &Path) -> Result<Rgb32FImage, ConversionError> {
        let open_err = |source| ConversionError::Open {
            path: path.to_path_buf(),
            source,
        };
        let reader = ImageReader::open(path)
            .map_err(open_err)?
            .with_guessed_format()
            .map_err(open_err)?;

        let format = match reader.format() {
            Some(ImageFormat::OpenExr) if !self.enable_exr => {
                return Err(ConversionError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    format: "OpenEXR (disabled in configuration)".to_string(),
                });
            }
            Some(format) => format,
            None => {
                return Err(ConversionError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    format: "unknown".to_string(),
                });
            }
        };

        let image = reader.decode().map_err(|e| match e {
            ImageError::Unsupported(_) => ConversionError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: format!("{format:?} ({e})"),
            },
            other => ConversionError::Decode {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(ConversionError::EmptyRaster {
                path: path.to_path_buf(),
            });
        }
        log::trace!(
            "Decoded {:?} raster {}x{} ({:?})",
            format,
            image.width(),
            image.height(),
            image.color()
        );
        Ok(image.to_rgb32f())
    }
}

fn write_png(image: &RgbImage, output: &Path) -> Result<(), ConversionError> {
    let encode_err = |source: Box<dyn std::error::Error + Send + Sync>| ConversionError::Encode {
        path: output.to_path_buf(),
        source,
    };

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = NamedTempFile::new_in(dir).map_err(|e| encode_err(Box::new(e)))?;
    {
        let mut writer = BufWriter::new(staging.as_file());
        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(|e| encode_err(Box::new(e)))?;
    }
    staging
        .persist(output)
        .map_err(|e| encode_err(Box::new(e.error)))?;
    Ok(())
}
