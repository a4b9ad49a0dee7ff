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

//! Defines the hierarchy of error types for the harness.
//!
//! [`BuildError`], [`DiscoveryError`] and [`ConfigError`] are fatal and stop
//! the run before any scene is attempted. [`RenderError`] and
//! [`ConversionError`] belong to a single scene; the batch records them as a
//! [`JobError`] and moves on to the next scene.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// An error raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration '{}': {source}", .path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The configuration file is not valid TOML for [`Config`](crate::Config).
    #[error("Failed to parse configuration '{}': {source}", .path.display())]
    Parse {
        /// The configuration file.
        path: PathBuf,
        /// The TOML error.
        source: toml::de::Error,
    },
    /// A value is outside of its accepted range.
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Dotted name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// The external build tool did not produce a usable renderer.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build tool could not be started at all.
    #[error("Failed to start build tool '{program}': {source}")]
    Spawn {
        /// The program that was invoked.
        program: String,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The build tool ran and reported failure.
    #[error("Build failed ({status}){}", tail_suffix(.stderr_tail))]
    Failed {
        /// Human readable exit status.
        status: String,
        /// The last lines the tool printed on stderr.
        stderr_tail: String,
    },
    /// The build reported success but the renderer executable is missing.
    #[error("Renderer executable not found at '{}'", .path.display())]
    MissingExecutable {
        /// The configured executable path.
        path: PathBuf,
    },
}

/// The scene root could not be traversed.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The root does not exist or is not a directory.
    #[error("Scene root '{}' does not exist or is not a directory", .root.display())]
    RootNotFound {
        /// The configured discovery root.
        root: PathBuf,
    },
    /// The root exists but cannot be listed.
    #[error("Scene root '{}' is unreadable: {source}", .root.display())]
    Unreadable {
        /// The configured discovery root.
        root: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// The renderer failed for one scene.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer executable could not be started.
    #[error("Failed to start renderer '{}': {source}", .program.display())]
    Spawn {
        /// The renderer executable.
        program: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The renderer exited unsuccessfully.
    #[error("Renderer exited with {status}{}", tail_suffix(.stderr_tail))]
    Failed {
        /// Human readable exit status.
        status: String,
        /// The last lines the renderer printed on stderr.
        stderr_tail: String,
    },
    /// The renderer was still running when the per-job timeout elapsed.
    #[error("Renderer timed out after {:.1}s and was killed", .timeout.as_secs_f64())]
    TimedOut {
        /// The configured timeout.
        timeout: Duration,
    },
    /// The renderer exited successfully without leaving an artifact.
    #[error("Renderer produced no artifact at '{}'", .path.display())]
    MissingArtifact {
        /// Where the artifact was expected.
        path: PathBuf,
    },
    /// The per-job scratch space could not be prepared.
    #[error("Failed to prepare scratch space '{}': {source}", .path.display())]
    Scratch {
        /// The scratch path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// The HDR artifact of one scene could not be turned into a PNG.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The artifact could not be opened.
    #[error("Failed to open HDR raster '{}': {source}", .path.display())]
    Open {
        /// The artifact path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The raster format is unknown or its codec is disabled.
    #[error("Unsupported raster format for '{}': {format}", .path.display())]
    UnsupportedFormat {
        /// The artifact path.
        path: PathBuf,
        /// Name of the detected format, or `unknown`.
        format: String,
    },
    /// The codec rejected the raster.
    #[error("Failed to decode HDR raster '{}': {source}", .path.display())]
    Decode {
        /// The artifact path.
        path: PathBuf,
        /// The codec error.
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// The raster decoded to zero pixels.
    #[error("HDR raster '{}' has no pixels", .path.display())]
    EmptyRaster {
        /// The artifact path.
        path: PathBuf,
    },
    /// The PNG could not be written.
    #[error("Failed to write image '{}': {source}", .path.display())]
    Encode {
        /// The output path.
        path: PathBuf,
        /// The codec or I/O error.
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// A recoverable failure of a single scene.
#[derive(Debug, Error)]
pub enum JobError {
    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Tone-mapping the artifact failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl JobError {
    /// Short name of the failing step, used in the batch summary.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Render(_) => "render",
            JobError::Conversion(_) => "conversion",
        }
    }
}

fn tail_suffix(tail: &str) -> String {
    if tail.trim().is_empty() {
        String::new()
    } else {
        format!(": {}", tail.trim())
    }
}
