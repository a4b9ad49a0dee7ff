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

//! Batch orchestration: build the renderer once, then render and convert
//! every discovered scene.

pub mod builder;
pub mod pipeline;
pub mod render;
pub mod report;

pub use builder::RendererBuilder;
pub use pipeline::Pipeline;
pub use render::{ProcessRenderer, Renderer};
pub use report::{BatchReport, JobStatus, SceneOutcome};

use exhibit_core::process::resolve_against;
use exhibit_core::{
    BuildError, CancellationToken, Config, ConfigError, DiscoveryError, ProcessRunner,
};
use exhibit_io::{discover_scenes, ToneMapConverter};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A failure that prevents the batch from running at all.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The configuration is out of range.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The renderer could not be built.
    #[error("Build failed: {0}")]
    Build(#[from] BuildError),
    /// The scene root could not be walked.
    #[error("Scene discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    /// The batch scratch directory could not be created.
    #[error("Failed to create scratch directory: {0}")]
    Scratch(#[source] io::Error),
}

/// Runs a whole batch.
///
/// Relative paths in `config` are resolved against `base_dir`. The build
/// and the renders go through `runner`; `cancel` stops the batch between
/// scenes.
///
/// # Errors
/// Only batch-level failures are errors. Scene failures are reported in the
/// returned [`BatchReport`].
pub fn run_batch<P: ProcessRunner>(
    config: &Config,
    base_dir: &Path,
    runner: P,
    cancel: CancellationToken,
) -> Result<BatchReport, BatchError> {
    config.validate()?;
    let mut build = config.build.clone();
    build.working_dir = resolve_against(base_dir, &build.working_dir);
    let renderer = ProcessRenderer::new(config.render.clone(), base_dir, runner);
    RendererBuilder::new(build, renderer.runner()).build(renderer.executable())?;

    let root = resolve_against(base_dir, &config.batch.root);
    let scenes = discover_scenes(&root, &config.batch.scene_extension)?;
    log::info!(
        "Found {} scene(s) under '{}'",
        scenes.len(),
        root.display()
    );
    if scenes.is_empty() {
        log::warn!("Nothing to render");
        return Ok(BatchReport::default());
    }

    let scratch = tempfile::Builder::new()
        .prefix("exhibit-")
        .tempdir()
        .map_err(BatchError::Scratch)?;
    let (_guard, scratch_root): (Option<tempfile::TempDir>, PathBuf) = if config.batch.keep_artifacts
    {
        let path = scratch.keep();
        log::info!("Keeping HDR artifacts in '{}'", path.display());
        (None, path)
    } else {
        let path = scratch.path().to_path_buf();
        (Some(scratch), path)
    };

    let mut pipeline = Pipeline::new(
        renderer,
        ToneMapConverter::new(&config.convert),
        config.render.handoff.clone(),
    )
    .with_max_consecutive_failures(config.batch.max_consecutive_failures)
    .with_keep_artifacts(config.batch.keep_artifacts)
    .with_cancellation(cancel);

    Ok(pipeline.run(&scenes, &scratch_root))
}
