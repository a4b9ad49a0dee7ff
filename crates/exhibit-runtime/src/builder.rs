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

//! One-shot build of the renderer executable.

use exhibit_core::{BuildConfig, BuildError, ProcessRunner, ProcessSpec};
use std::path::Path;

/// Lines of build output quoted in a [`BuildError::Failed`].
const STDERR_TAIL_LINES: usize = 20;

/// Runs the external build tool and checks that it produced the renderer.
pub struct RendererBuilder<P> {
    config: BuildConfig,
    runner: P,
}

impl<P: ProcessRunner> RendererBuilder<P> {
    /// Creates a builder for the given build section.
    pub fn new(config: BuildConfig, runner: P) -> Self {
        Self { config, runner }
    }

    /// Builds the renderer and verifies `executable` exists afterwards.
    ///
    /// When the build is disabled only the existence check runs.
    ///
    /// # Errors
    /// Any error here is fatal for the batch: no scene may run against a
    /// missing or outdated renderer.
    pub fn build(&self, executable: &Path) -> Result<(), BuildError> {
        if self.config.enabled {
            let args = self.config.command_args();
            let spec = ProcessSpec::new(&self.config.program)
                .args(&args)
                .current_dir(&self.config.working_dir)
                .label("build");

            log::info!("Building renderer: {}", spec.command_line());
            let output = self.runner.run(&spec).map_err(|source| BuildError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
            if !output.success {
                return Err(BuildError::Failed {
                    status: output.status.clone(),
                    stderr_tail: output.stderr_tail(STDERR_TAIL_LINES),
                });
            }
            log::info!(
                "Build completed in {:.2}s",
                output.elapsed.as_secs_f64()
            );
        } else {
            log::info!("Build step disabled, using existing renderer");
        }

        if !executable.is_file() {
            return Err(BuildError::MissingExecutable {
                path: executable.to_path_buf(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exhibit_core::ProcessOutput;
    use std::cell::RefCell;
    use std::io;
    use tempfile::tempdir;

    /// Records every spec and answers with a canned output.
    struct FakeRunner {
        success: bool,
        calls: RefCell<Vec<ProcessSpec>>,
    }

    impl FakeRunner {
        fn new(success: bool) -> Self {
            Self {
                success,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessOutput> {
            self.calls.borrow_mut().push(spec.clone());
            Ok(ProcessOutput {
                exit_code: Some(if self.success { 0 } else { 101 }),
                success: self.success,
                status: if self.success {
                    "exit status: 0".to_string()
                } else {
                    "exit status: 101".to_string()
                },
                stderr: "error[E0425]: cannot find value `x`\n".to_string(),
                ..ProcessOutput::default()
            })
        }
    }

    struct BrokenRunner;

    impl ProcessRunner for BrokenRunner {
        fn run(&self, _spec: &ProcessSpec) -> io::Result<ProcessOutput> {
            Err(io::Error::new(io::ErrorKind::NotFound, "cargo not found"))
        }
    }

    #[test]
    fn test_invokes_release_build_with_features() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("renderer");
        std::fs::write(&exe, "").unwrap();

        let runner = FakeRunner::new(true);
        RendererBuilder::new(BuildConfig::default(), &runner)
            .build(&exe)
            .unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].command_line(),
            "cargo build --release --features enable_oidn"
        );
    }

    #[test]
    fn test_nonzero_status_is_fatal() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("renderer");
        std::fs::write(&exe, "").unwrap();

        let err = RendererBuilder::new(BuildConfig::default(), FakeRunner::new(false))
            .build(&exe)
            .unwrap_err();
        match err {
            BuildError::Failed {
                status,
                stderr_tail,
            } => {
                assert_eq!(status, "exit status: 101");
                assert!(stderr_tail.contains("E0425"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let dir = tempdir().unwrap();
        let err = RendererBuilder::new(BuildConfig::default(), BrokenRunner)
            .build(&dir.path().join("renderer"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
    }

    #[test]
    fn test_successful_build_without_executable_is_fatal() {
        let dir = tempdir().unwrap();
        let err = RendererBuilder::new(BuildConfig::default(), FakeRunner::new(true))
            .build(&dir.path().join("renderer"))
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingExecutable { .. }));
    }

    #[test]
    fn test_disabled_build_skips_tool() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("renderer");
        std::fs::write(&exe, "").unwrap();

        let runner = FakeRunner::new(false);
        let config = BuildConfig {
            enabled: false,
            ..BuildConfig::default()
        };
        RendererBuilder::new(config, &runner).build(&exe).unwrap();
        assert!(runner.calls.borrow().is_empty());
    }
}
