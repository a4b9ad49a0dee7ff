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
use exhibit_core::{Config, DEFAULT_CONFIG_FILE};
use exhibit_io::ToneMapConverter;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// HDR raster written by the renderer
    pub input: PathBuf,
    /// PNG to write
    pub output: PathBuf,
    /// Configuration file holding the tone-map settings
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Override the display gamma
    #[arg(long)]
    pub gamma: Option<f32>,
}

pub fn run(args: &ConvertArgs) -> Result<()> {
    print_task_start("Converting Raster", BRUSH, MAGENTA);

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(gamma) = args.gamma {
        config.convert.tonemap.gamma = gamma;
    }
    config.validate()?;

    let image = ToneMapConverter::new(&config.convert)
        .convert(&args.input, &args.output)
        .with_context(|| format!("Failed to convert '{}'", args.input.display()))?;
    print_success(&format!(
        "Wrote '{}' ({}x{})",
        args.output.display(),
        image.width,
        image.height
    ));
    Ok(())
}
