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

//! Sequential render then convert loop over the discovered scenes.

use crate::render::Renderer;
use crate::report::{BatchReport, SceneOutcome};
use exhibit_core::{ArtifactHandoff, CancellationToken, JobError, RenderJob, SceneFile};
use exhibit_io::{ConvertedImage, ToneMapConverter};
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Runs every job to completion, isolating per-scene failures.
pub struct Pipeline<R> {
    renderer: R,
    converter: ToneMapConverter,
    handoff: ArtifactHandoff,
    max_consecutive_failures: Option<u32>,
    keep_artifacts: bool,
    cancel: CancellationToken,
}

impl<R: Renderer> Pipeline<R> {
    /// Creates a pipeline with no failure limit and a private token.
    pub fn new(renderer: R, converter: ToneMapConverter, handoff: ArtifactHandoff) -> Self {
        Self {
            renderer,
            converter,
            handoff,
            max_consecutive_failures: None,
            keep_artifacts: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel the remaining jobs after `limit` failures in a row.
    pub fn with_max_consecutive_failures(mut self, limit: Option<u32>) -> Self {
        self.max_consecutive_failures = limit;
        self
    }

    /// Leave artifacts on disk after conversion.
    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    /// Observe an externally owned token instead of a private one.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The token that stops the batch between jobs.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Assigns each scene its artifact path under `scratch_root`.
    pub fn jobs(&self, scenes: &[SceneFile], scratch_root: &Path) -> Vec<RenderJob> {
        scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| {
                let artifact = self.handoff.artifact_path(scratch_root, index, scene);
                RenderJob::new(index, scene.clone(), artifact)
            })
            .collect()
    }

    /// Processes `scenes` in order and reports one outcome per scene.
    ///
    /// A job never starts once the token is cancelled; the job in flight
    /// when cancellation happens finishes normally.
    pub fn run(&mut self, scenes: &[SceneFile], scratch_root: &Path) -> BatchReport {
        let started = Instant::now();
        let jobs = self.jobs(scenes, scratch_root);
        let total = jobs.len();
        let mut report = BatchReport::default();
        let mut consecutive_failures = 0u32;

        for job in &jobs {
            if self.cancel.is_cancelled() {
                log::warn!("[{}/{}] Skipping '{}'", job.index + 1, total, job.scene);
                report.outcomes.push(SceneOutcome::skipped(job));
                continue;
            }

            let job_started = Instant::now();
            let outcome = match self.process(job, total) {
                Ok(image) => {
                    consecutive_failures = 0;
                    log::info!(
                        "[{}/{}] Wrote '{}' ({}x{})",
                        job.index + 1,
                        total,
                        job.output.display(),
                        image.width,
                        image.height
                    );
                    SceneOutcome::succeeded(job, image.width, image.height, job_started.elapsed())
                }
                Err(e) => {
                    consecutive_failures += 1;
                    log::error!(
                        "[{}/{}] '{}' failed during {}: {}",
                        job.index + 1,
                        total,
                        job.scene,
                        e.kind(),
                        e
                    );
                    SceneOutcome::failed(job, &e, job_started.elapsed())
                }
            };
            report.outcomes.push(outcome);
            self.cleanup(job, scratch_root);

            if let Some(limit) = self.max_consecutive_failures {
                if consecutive_failures >= limit && !self.cancel.is_cancelled() {
                    log::error!(
                        "{consecutive_failures} consecutive failures, cancelling the remaining scenes"
                    );
                    self.cancel.cancel();
                }
            }
        }

        report.cancelled = self.cancel.is_cancelled();
        report.elapsed_secs = started.elapsed().as_secs_f64();
        report
    }

    fn process(&mut self, job: &RenderJob, total: usize) -> Result<ConvertedImage, JobError> {
        log::info!("[{}/{}] Rendering '{}'", job.index + 1, total, job.scene);
        self.renderer.render(job)?;

        log::info!(
            "[{}/{}] Converting '{}'",
            job.index + 1,
            total,
            job.artifact.display()
        );
        Ok(self.converter.convert(&job.artifact, &job.output)?)
    }

    fn cleanup(&self, job: &RenderJob, scratch_root: &Path) {
        if self.keep_artifacts {
            return;
        }
        let target = match &self.handoff {
            ArtifactHandoff::ScratchDir { .. } => job.artifact.parent(),
            ArtifactHandoff::Env { .. } => Some(job.artifact.as_path()),
        };
        // Never delete anything outside the batch scratch root.
        let Some(target) = target.filter(|t| t.starts_with(scratch_root) && *t != scratch_root)
        else {
            log::warn!(
                "Artifact '{}' lies outside '{}', leaving it in place",
                job.artifact.display(),
                scratch_root.display()
            );
            return;
        };

        let result = if target.is_dir() {
            fs::remove_dir_all(target)
        } else {
            fs::remove_file(target)
        };
        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::debug!("Could not remove artifact '{}': {}", target.display(), e);
            }
        }
    }
}
