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

use crate::helpers::*;
use anyhow::{Context, Result};
use clap::Args;
use exhibit_core::{CancellationToken, Config, SystemRunner, DEFAULT_CONFIG_FILE};
use exhibit_runtime::run_batch;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ExamplesArgs {
    /// Configuration file; defaults apply when it does not exist
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Directory searched for scene files
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Use the renderer that is already built
    #[arg(long)]
    pub skip_build: bool,
    /// Kill a render after this many seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
    /// Stop after this many failed scenes in a row
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_consecutive_failures: Option<u32>,
    /// Keep the HDR artifacts instead of deleting them
    #[arg(long)]
    pub keep_artifacts: bool,
    /// Write a JSON report of every scene outcome
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Loads the configuration file and applies the command-line overrides.
pub fn load_config(args: &ExamplesArgs) -> Result<Config> {
    let mut config = Config::load_or_default(&args.config)?;
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &ExamplesArgs) {
    if let Some(root) = &args.root {
        config.batch.root = root.clone();
    }
    if args.skip_build {
        config.build.enabled = false;
    }
    if args.timeout.is_some() {
        config.render.timeout_secs = args.timeout;
    }
    if args.max_consecutive_failures.is_some() {
        config.batch.max_consecutive_failures = args.max_consecutive_failures;
    }
    config.batch.keep_artifacts |= args.keep_artifacts;
}

pub fn run(args: &ExamplesArgs) -> Result<()> {
    print_task_start("Rendering Examples", CAMERA, MAGENTA);
    let config = load_config(args)?;
    let base_dir = std::env::current_dir().context("Failed to read the working directory")?;

    let report = run_batch(&config, &base_dir, SystemRunner, CancellationToken::new())
        .context("Batch aborted")?;
    print_report(&report);

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }

    let total = report.outcomes.len();
    if !report.is_success() {
        anyhow::bail!(
            "{} of {} scenes did not produce an image",
            total - report.succeeded(),
            total
        );
    }
    print_success("Example gallery is up to date");
    Ok(())
}

fn write_report(report: &exhibit_runtime::BatchReport, path: &Path) -> Result<()> {
    report
        .write_json(path)
        .with_context(|| format!("Failed to write report '{}'", path.display()))?;
    print_info(&format!("Report written to '{}'", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct ExamplesCli {
        #[command(flatten)]
        args: ExamplesArgs,
    }

    fn parse(flags: &[&str]) -> ExamplesArgs {
        let argv = std::iter::once("examples").chain(flags.iter().copied());
        ExamplesCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Exhibit.toml");
        fs::write(
            &path,
            "[render]\ntimeout_secs = 60\n\n[batch]\nroot = \"scenes\"\n",
        )
        .unwrap();

        let args = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--skip-build",
            "--timeout",
            "5",
        ]);
        let config = load_config(&args).unwrap();

        assert!(!config.build.enabled);
        assert_eq!(config.render.timeout_secs, Some(5));
        assert_eq!(config.batch.root, PathBuf::from("scenes"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let args = parse(&["--config", path.to_str().unwrap()]);
        let config = load_config(&args).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_flag_defaults_to_workspace_file() {
        let args = parse(&[]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(!args.skip_build);
        assert_eq!(args.timeout, None);
    }

    #[test]
    fn test_zero_timeout_is_rejected_by_parser() {
        assert!(ExamplesCli::try_parse_from(["examples", "--timeout", "0"]).is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Exhibit.toml");
        fs::write(&path, "[convert.tonemap]\ngamma = 0.0\n").unwrap();

        let args = parse(&["--config", path.to_str().unwrap()]);
        assert!(load_config(&args).is_err());
    }
}
