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

use anyhow::Result;
use exhibit_core::{
    ArtifactHandoff, BuildError, CancellationToken, Config, ProcessOutput, ProcessRunner,
    ProcessSpec,
};
use exhibit_runtime::{run_batch, BatchError, JobStatus};
use image::{Rgb, Rgb32FImage};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Stands in for both the build tool and the renderer.
///
/// A scene containing `fail` exits non-zero. Any other scene gets a 2x2
/// raster whose colour is read from the scene's `color = r,g,b` line.
#[derive(Default)]
struct FakeToolchain {
    build_fails: bool,
    labels: RefCell<Vec<String>>,
}

impl FakeToolchain {
    fn exit(code: i32) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(code),
            success: code == 0,
            status: format!("exit status: {code}"),
            stderr: if code == 0 {
                String::new()
            } else {
                "scene rejected\n".to_string()
            },
            ..ProcessOutput::default()
        }
    }

    fn artifact_target(spec: &ProcessSpec) -> PathBuf {
        let from_env = spec
            .env
            .iter()
            .find(|(k, _)| k == "RENDER_OUTPUT")
            .map(|(_, v)| PathBuf::from(v));
        from_env.unwrap_or_else(|| spec.current_dir.clone().unwrap().join("out.exr"))
    }
}

impl ProcessRunner for FakeToolchain {
    fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessOutput> {
        self.labels.borrow_mut().push(spec.label.clone());
        if spec.label == "build" {
            return Ok(Self::exit(if self.build_fails { 101 } else { 0 }));
        }

        let scene = fs::read_to_string(&spec.args[0])?;
        if scene.contains("fail") {
            return Ok(Self::exit(1));
        }
        let rgb: Vec<f32> = scene
            .trim()
            .trim_start_matches("color = ")
            .split(',')
            .map(|v| v.trim().parse().unwrap())
            .collect();
        Rgb32FImage::from_pixel(2, 2, Rgb([rgb[0], rgb[1], rgb[2]]))
            .save(Self::artifact_target(spec))
            .map_err(io::Error::other)?;
        Ok(Self::exit(0))
    }
}

fn workspace(scenes: &[(&str, &str)]) -> Result<tempfile::TempDir> {
    let dir = tempdir()?;
    let exe = dir.path().join("target/release/pbrtrs_main");
    fs::create_dir_all(exe.parent().unwrap())?;
    fs::write(&exe, "")?;
    for (name, body) in scenes {
        let path = dir.path().join("examples").join(name);
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(path, body)?;
    }
    Ok(dir)
}

fn dominant_channel(path: &Path) -> Result<usize> {
    let png = image::open(path)?.to_rgb8();
    let px = png.get_pixel(0, 0).0;
    Ok((0..3).max_by_key(|&c| px[c]).unwrap())
}

#[test]
fn test_every_scene_gets_its_own_image() -> Result<()> {
    let dir = workspace(&[
        ("a.toml", "color = 8.0, 0.1, 0.1"),
        ("nested/b.toml", "color = 0.1, 0.1, 8.0"),
    ])?;
    let runner = FakeToolchain::default();

    let report = run_batch(&Config::default(), dir.path(), &runner, CancellationToken::new())?;

    assert!(report.is_success());
    assert_eq!(report.succeeded(), 2);
    assert_eq!(dominant_channel(&dir.path().join("examples/a.png"))?, 0);
    assert_eq!(dominant_channel(&dir.path().join("examples/nested/b.png"))?, 2);
    assert_eq!(
        *runner.labels.borrow(),
        ["build", "render:a", "render:b"]
    );
    Ok(())
}

#[test]
fn test_env_handoff_isolates_jobs() -> Result<()> {
    let dir = workspace(&[
        ("a.toml", "color = 8.0, 0.1, 0.1"),
        ("b.toml", "color = 0.1, 8.0, 0.1"),
    ])?;
    let mut config = Config::default();
    config.render.handoff = ArtifactHandoff::Env {
        var: "RENDER_OUTPUT".to_string(),
        extension: "exr".to_string(),
    };

    let report = run_batch(&config, dir.path(), FakeToolchain::default(), CancellationToken::new())?;

    assert_eq!(report.succeeded(), 2);
    assert_eq!(dominant_channel(&dir.path().join("examples/a.png"))?, 0);
    assert_eq!(dominant_channel(&dir.path().join("examples/b.png"))?, 1);
    Ok(())
}

#[test]
fn test_failed_scene_does_not_leak_previous_artifact() -> Result<()> {
    let dir = workspace(&[
        ("a.toml", "color = 8.0, 0.1, 0.1"),
        ("b.toml", "fail"),
        ("c.toml", "color = 0.1, 0.1, 8.0"),
    ])?;

    let report = run_batch(
        &Config::default(),
        dir.path(),
        FakeToolchain::default(),
        CancellationToken::new(),
    )?;

    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 2);
    assert!(!dir.path().join("examples/b.png").exists());
    assert_eq!(dominant_channel(&dir.path().join("examples/c.png"))?, 2);

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.scene, dir.path().join("examples/b.toml"));
    match &failure.status {
        JobStatus::Failed { kind, message } => {
            assert_eq!(kind, "render");
            assert!(message.contains("scene rejected"), "{message}");
        }
        other => panic!("unexpected status {other:?}"),
    }
    Ok(())
}

#[test]
fn test_failure_limit_skips_remaining_scenes() -> Result<()> {
    let dir = workspace(&[
        ("a.toml", "fail"),
        ("b.toml", "color = 1.0, 1.0, 1.0"),
    ])?;
    let mut config = Config::default();
    config.batch.max_consecutive_failures = Some(1);
    let runner = FakeToolchain::default();

    let report = run_batch(&config, dir.path(), &runner, CancellationToken::new())?;

    assert!(report.cancelled);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 1);
    assert!(!report.is_success());
    assert_eq!(*runner.labels.borrow(), ["build", "render:a"]);
    Ok(())
}

#[test]
fn test_build_failure_aborts_before_any_render() -> Result<()> {
    let dir = workspace(&[("a.toml", "color = 1.0, 1.0, 1.0")])?;
    let runner = FakeToolchain {
        build_fails: true,
        ..FakeToolchain::default()
    };

    let err = run_batch(&Config::default(), dir.path(), &runner, CancellationToken::new())
        .unwrap_err();

    assert!(matches!(err, BatchError::Build(BuildError::Failed { .. })));
    assert_eq!(*runner.labels.borrow(), ["build"]);
    assert!(!dir.path().join("examples/a.png").exists());
    Ok(())
}

#[test]
fn test_artifact_name_escaping_job_dir_is_rejected() -> Result<()> {
    let dir = workspace(&[("a.toml", "color = 1.0, 1.0, 1.0")])?;
    let user_data = dir.path().join("renders");
    fs::create_dir_all(&user_data)?;
    fs::write(user_data.join("precious.txt"), "keep me")?;
    let mut config = Config::default();
    config.render.handoff = ArtifactHandoff::ScratchDir {
        file_name: user_data.join("out.exr").to_string_lossy().into_owned(),
    };
    let runner = FakeToolchain::default();

    let err = run_batch(&config, dir.path(), &runner, CancellationToken::new()).unwrap_err();

    assert!(matches!(err, BatchError::Config(_)));
    assert!(runner.labels.borrow().is_empty());
    assert!(user_data.join("precious.txt").exists());
    Ok(())
}

#[test]
fn test_missing_scene_root_is_batch_error() -> Result<()> {
    let dir = workspace(&[])?;
    let mut config = Config::default();
    config.build.enabled = false;

    let err = run_batch(&config, dir.path(), FakeToolchain::default(), CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, BatchError::Discovery(_)));
    Ok(())
}

#[test]
fn test_empty_scene_root_is_empty_success() -> Result<()> {
    let dir = workspace(&[])?;
    fs::create_dir_all(dir.path().join("examples"))?;
    let mut config = Config::default();
    config.build.enabled = false;

    let report = run_batch(&config, dir.path(), FakeToolchain::default(), CancellationToken::new())?;
    assert!(report.outcomes.is_empty());
    assert!(report.is_success());
    Ok(())
}
