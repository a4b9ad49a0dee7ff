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

//! Render invocation: one renderer process per scene.

use exhibit_core::process::resolve_against;
use exhibit_core::{ArtifactHandoff, ProcessRunner, ProcessSpec, RenderConfig, RenderError, RenderJob};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lines of renderer output quoted in a [`RenderError::Failed`].
const STDERR_TAIL_LINES: usize = 10;

/// Produces the HDR artifact of a job.
///
/// Implementations must leave a complete raster at [`RenderJob::artifact`]
/// when they return `Ok`.
pub trait Renderer {
    /// Renders `job`, blocking until the artifact is written or rendering failed.
    fn render(&mut self, job: &RenderJob) -> Result<(), RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, job: &RenderJob) -> Result<(), RenderError> {
        (**self).render(job)
    }
}

/// Runs the external renderer executable through a [`ProcessRunner`].
pub struct ProcessRenderer<P> {
    config: RenderConfig,
    executable: PathBuf,
    base_dir: PathBuf,
    runner: P,
}

impl<P: ProcessRunner> ProcessRenderer<P> {
    /// Creates a renderer; relative paths in `config` and in jobs are
    /// resolved against `base_dir`.
    pub fn new(config: RenderConfig, base_dir: impl Into<PathBuf>, runner: P) -> Self {
        let base_dir = base_dir.into();
        let executable = resolve_against(&base_dir, &config.executable);
        Self {
            config,
            executable,
            base_dir,
            runner,
        }
    }

    /// The executable that will be spawned.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The runner renders go through.
    pub fn runner(&self) -> &P {
        &self.runner
    }

    fn spec_for(&self, job: &RenderJob) -> ProcessSpec {
        let scene = resolve_against(&self.base_dir, job.scene.path());
        let mut spec = ProcessSpec::new(&self.executable)
            .arg(&scene)
            .timeout(self.config.timeout())
            .label(format!("render:{}", job.scene.stem()));
        for (key, value) in &self.config.env {
            spec = spec.env(key, value);
        }

        match &self.config.handoff {
            ArtifactHandoff::ScratchDir { .. } => {
                let job_dir = job.artifact.parent().unwrap_or(&self.base_dir);
                spec.current_dir(job_dir)
            }
            ArtifactHandoff::Env { var, .. } => spec
                .current_dir(resolve_against(&self.base_dir, &self.config.working_dir))
                .env(var, &job.artifact),
        }
    }
}

impl<P: ProcessRunner> Renderer for ProcessRenderer<P> {
    fn render(&mut self, job: &RenderJob) -> Result<(), RenderError> {
        prepare_artifact_slot(&job.artifact)?;

        let spec = self.spec_for(job);
        log::debug!("Render command: {}", spec.command_line());
        let output = self.runner.run(&spec).map_err(|source| RenderError::Spawn {
            program: self.executable.clone(),
            source,
        })?;

        if output.timed_out {
            return Err(RenderError::TimedOut {
                timeout: spec.timeout.unwrap_or_default(),
            });
        }
        if !output.success {
            return Err(RenderError::Failed {
                status: output.status.clone(),
                stderr_tail: output.stderr_tail(STDERR_TAIL_LINES),
            });
        }
        ensure_artifact(&job.artifact)?;
        log::debug!(
            "Rendered '{}' in {:.2}s",
            job.scene,
            output.elapsed.as_secs_f64()
        );
        Ok(())
    }
}

/// Creates the artifact's directory and removes any file already at its path,
/// so only this job's renderer can satisfy [`ensure_artifact`].
pub fn prepare_artifact_slot(artifact: &Path) -> Result<(), RenderError> {
    let scratch_err = |source| RenderError::Scratch {
        path: artifact.to_path_buf(),
        source,
    };
    if let Some(parent) = artifact.parent() {
        fs::create_dir_all(parent).map_err(scratch_err)?;
    }
    match fs::remove_file(artifact) {
        Ok(()) => {
            log::warn!("Removed stale artifact '{}'", artifact.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(scratch_err(e)),
    }
}

/// Checks that a renderer left a non-empty artifact behind.
pub fn ensure_artifact(artifact: &Path) -> Result<(), RenderError> {
    match fs::metadata(artifact) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(RenderError::MissingArtifact {
            path: artifact.to_path_buf(),
        }),
    }
}
