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

//! Scene files and the render jobs derived from them.

use std::fmt;
use std::path::{Path, PathBuf};

/// Extension given to every tone-mapped output image.
pub const OUTPUT_EXTENSION: &str = "png";

/// A discovered scene-description file. One scene is one render job.
///
/// The contents are opaque to the harness; only the renderer reads them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SceneFile(PathBuf);

impl SceneFile {
    /// Wraps a path to a scene-description file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The path as discovered.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// The file name without its extension, used to label artifacts.
    pub fn stem(&self) -> &str {
        self.0
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scene")
    }

    /// Where the tone-mapped image for this scene is written.
    pub fn output_path(&self) -> PathBuf {
        output_path_for(&self.0)
    }
}

impl fmt::Display for SceneFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for SceneFile {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// Maps a scene path to its output image: same directory, same base name,
/// extension replaced by `png`.
pub fn output_path_for(scene: &Path) -> PathBuf {
    scene.with_extension(OUTPUT_EXTENSION)
}

/// One unit of work in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// Position of the job in the sorted batch, starting at zero.
    pub index: usize,
    /// The scene to render.
    pub scene: SceneFile,
    /// Where the renderer must leave its HDR raster for this job only.
    pub artifact: PathBuf,
    /// Where the tone-mapped PNG goes.
    pub output: PathBuf,
}

impl RenderJob {
    /// Builds the job for `scene` with its own artifact path.
    pub fn new(index: usize, scene: SceneFile, artifact: PathBuf) -> Self {
        let output = scene.output_path();
        Self {
            index,
            scene,
            artifact,
            output,
        }
    }
}
