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

//! Per-scene outcomes and the batch summary.

use exhibit_core::{JobError, RenderJob, SceneFile};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What happened to one scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// The PNG was written.
    Succeeded {
        /// Width of the written image.
        width: u32,
        /// Height of the written image.
        height: u32,
    },
    /// Rendering or conversion failed.
    Failed {
        /// The failing step, `render` or `conversion`.
        kind: String,
        /// The error message.
        message: String,
    },
    /// The batch was cancelled before this scene ran.
    Skipped,
}

/// The outcome of one scene, in batch order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneOutcome {
    /// The scene file.
    pub scene: PathBuf,
    /// The PNG path the scene maps to, written or not.
    pub output: PathBuf,
    /// What happened.
    #[serde(flatten)]
    pub status: JobStatus,
    /// Wall time spent on the scene.
    pub elapsed_secs: f64,
}

impl SceneOutcome {
    /// A scene whose image was written.
    pub fn succeeded(job: &RenderJob, width: u32, height: u32, elapsed: Duration) -> Self {
        Self::new(&job.scene, job.output.clone(), JobStatus::Succeeded { width, height }, elapsed)
    }

    /// A scene that failed.
    pub fn failed(job: &RenderJob, error: &JobError, elapsed: Duration) -> Self {
        let status = JobStatus::Failed {
            kind: error.kind().to_string(),
            message: error.to_string(),
        };
        Self::new(&job.scene, job.output.clone(), status, elapsed)
    }

    /// A scene that never ran.
    pub fn skipped(job: &RenderJob) -> Self {
        Self::new(&job.scene, job.output.clone(), JobStatus::Skipped, Duration::ZERO)
    }

    fn new(scene: &SceneFile, output: PathBuf, status: JobStatus, elapsed: Duration) -> Self {
        Self {
            scene: scene.path().to_path_buf(),
            output,
            status,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    /// `true` unless the scene failed or was skipped.
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded { .. })
    }
}

/// All outcomes of a batch, one per discovered scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Outcomes in batch order.
    pub outcomes: Vec<SceneOutcome>,
    /// `true` when the batch stopped early.
    pub cancelled: bool,
    /// Wall time of the whole batch, build excluded.
    pub elapsed_secs: f64,
}

impl BatchReport {
    /// Number of written images.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed scenes.
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Failed { .. }))
    }

    /// Number of scenes that never ran.
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Skipped))
    }

    /// Failed outcomes, in batch order.
    pub fn failures(&self) -> impl Iterator<Item = &SceneOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed { .. }))
    }

    /// `true` when every scene produced its image.
    ///
    /// An empty batch is a success.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SceneOutcome::is_success)
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the JSON report to `path`.
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::other)?;
        fs::write(path, json)
    }

    fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}
