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

//! The explicit configuration object handed to every stage of a batch.
//!
//! Everything the harness needs to know about its collaborators lives here:
//! how to build the renderer, how to invoke it, how to hand it a per-job
//! output path, and which tone-map parameters to use. The whole tree can be
//! loaded from an optional `Exhibit.toml`; every field has a default so an
//! empty file (or no file at all) describes the stock example workflow.

use crate::error::ConfigError;
use crate::scene::SceneFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "Exhibit.toml";

/// Root of the configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// How the renderer is built.
    pub build: BuildConfig,
    /// How the renderer is invoked.
    pub render: RenderConfig,
    /// How artifacts are tone-mapped.
    pub convert: ConvertConfig,
    /// Which scenes are processed and how failures are handled.
    pub batch: BatchConfig,
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            log::info!("Loading configuration from '{}'", path.display());
            Self::from_file(path)
        } else {
            log::info!(
                "No '{}' found. Using default configuration.",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Checks every section for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.convert.tonemap.validate()?;
        self.render.handoff.validate()?;

        if self.batch.scene_extension.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "batch.scene_extension",
                reason: "must not be empty".to_string(),
            });
        }
        if self.batch.max_consecutive_failures == Some(0) {
            return Err(ConfigError::Invalid {
                field: "batch.max_consecutive_failures",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if self.render.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "render.timeout_secs",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for the one-shot renderer build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Set to `false` to use an already built renderer.
    pub enabled: bool,
    /// The build tool.
    pub program: String,
    /// Arguments selecting the release configuration.
    pub args: Vec<String>,
    /// Optional capabilities to enable, passed as `--features a,b`.
    pub features: Vec<String>,
    /// Directory the build tool runs in.
    pub working_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "cargo".to_string(),
            args: vec!["build".to_string(), "--release".to_string()],
            features: vec!["enable_oidn".to_string()],
            working_dir: PathBuf::from("."),
        }
    }
}

impl BuildConfig {
    /// Full argument list, features included.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if !self.features.is_empty() {
            args.push("--features".to_string());
            args.push(self.features.join(","));
        }
        args
    }
}

/// How the renderer learns where to write the artifact of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ArtifactHandoff {
    /// The renderer writes `file_name` into its working directory, which is a
    /// fresh directory per job.
    ScratchDir {
        /// The fixed name the renderer writes to.
        file_name: String,
    },
    /// The renderer reads the per-job artifact path from `var`.
    Env {
        /// Environment variable carrying the artifact path.
        var: String,
        /// Extension of the artifact the renderer writes.
        extension: String,
    },
}

impl Default for ArtifactHandoff {
    fn default() -> Self {
        ArtifactHandoff::ScratchDir {
            file_name: "out.exr".to_string(),
        }
    }
}

impl ArtifactHandoff {
    /// Where the artifact of job `index` lives under the batch scratch root.
    pub fn artifact_path(&self, scratch_root: &Path, index: usize, scene: &SceneFile) -> PathBuf {
        let job_name = format!("{:04}-{}", index, scene.stem());
        match self {
            ArtifactHandoff::ScratchDir { file_name } => scratch_root.join(job_name).join(file_name),
            ArtifactHandoff::Env { extension, .. } => {
                scratch_root.join(format!("{job_name}.{extension}"))
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (field, value) = match self {
            ArtifactHandoff::ScratchDir { file_name } => ("render.handoff.file_name", file_name),
            ArtifactHandoff::Env { var, extension } => {
                if !is_plain_file_name(extension) {
                    return Err(ConfigError::Invalid {
                        field: "render.handoff.extension",
                        reason: format!("expected a bare extension, got '{extension}'"),
                    });
                }
                ("render.handoff.var", var)
            }
        };
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field,
                reason: "must not be empty".to_string(),
            });
        }
        if matches!(self, ArtifactHandoff::ScratchDir { .. }) && !is_plain_file_name(value) {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("expected a file name without directories, got '{value}'"),
            });
        }
        Ok(())
    }
}

/// `true` when `value` names a single entry inside a directory.
///
/// Artifacts must stay inside their per-job scratch slot.
fn is_plain_file_name(value: &str) -> bool {
    if value.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Settings for invoking the renderer once per scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// The renderer executable produced by the build.
    pub executable: PathBuf,
    /// Working directory for [`ArtifactHandoff::Env`] renders.
    pub working_dir: PathBuf,
    /// Extra environment for the renderer. The default blanks `TEV_PATH` so
    /// the renderer does not try to open its image viewer.
    pub env: BTreeMap<String, String>,
    /// How the per-job artifact path is communicated.
    pub handoff: ArtifactHandoff,
    /// Kill a render still running after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("TEV_PATH".to_string(), String::new());
        Self {
            executable: PathBuf::from("target/release/pbrtrs_main"),
            working_dir: PathBuf::from("."),
            env,
            handoff: ArtifactHandoff::default(),
            timeout_secs: None,
        }
    }
}

impl RenderConfig {
    /// The per-job timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Parameters of the Reinhard tone-mapping operator.
///
/// Only the gamma departs from the neutral values; no scene varies these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToneMapSettings {
    /// Output gamma, applied as `v^(1/gamma)`.
    pub gamma: f32,
    /// Exposure bias; the operator scales the adaptation by `exp(-intensity)`.
    pub intensity: f32,
    /// Blend between global (0) and per-pixel (1) adaptation.
    pub light_adapt: f32,
    /// Blend between luminance (0) and per-channel (1) adaptation.
    pub color_adapt: f32,
}

impl Default for ToneMapSettings {
    fn default() -> Self {
        Self {
            gamma: 2.2,
            intensity: 0.0,
            light_adapt: 0.0,
            color_adapt: 0.0,
        }
    }
}

impl ToneMapSettings {
    /// Rejects parameters the operator is not defined for.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "convert.tonemap.gamma",
                reason: format!("expected a positive finite value, got {}", self.gamma),
            });
        }
        if !self.intensity.is_finite() {
            return Err(ConfigError::Invalid {
                field: "convert.tonemap.intensity",
                reason: format!("expected a finite value, got {}", self.intensity),
            });
        }
        for (field, value) in [
            ("convert.tonemap.light_adapt", self.light_adapt),
            ("convert.tonemap.color_adapt", self.color_adapt),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a value in [0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Settings for the tone-map converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Operator parameters.
    pub tonemap: ToneMapSettings,
    /// Accept OpenEXR artifacts. Radiance HDR is always accepted.
    pub enable_exr: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            tonemap: ToneMapSettings::default(),
            enable_exr: true,
        }
    }
}

/// Settings for scene discovery and batch failure handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Directory searched recursively for scenes.
    pub root: PathBuf,
    /// Extension of scene-description files, without the dot.
    pub scene_extension: String,
    /// Cancel the rest of the batch after this many failures in a row.
    pub max_consecutive_failures: Option<u32>,
    /// Leave the scratch directory with every HDR artifact in place.
    pub keep_artifacts: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("examples"),
            scene_extension: "toml".to_string(),
            max_consecutive_failures: None,
            keep_artifacts: false,
        }
    }
}
