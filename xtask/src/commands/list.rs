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
use anyhow::Result;
use clap::Args;
use exhibit_core::{Config, DEFAULT_CONFIG_FILE};
use exhibit_io::discover_scenes;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Configuration file naming the scene root
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Directory searched for scene files
    #[arg(long)]
    pub root: Option<PathBuf>,
}

pub fn run(args: &ListArgs) -> Result<()> {
    print_task_start("Discovering Scenes", MAGNIFIER, CYAN);

    let config = Config::load_or_default(&args.config)?;
    let root = args.root.clone().unwrap_or(config.batch.root);
    let scenes = discover_scenes(&root, &config.batch.scene_extension)?;

    for (index, scene) in scenes.iter().enumerate() {
        println!(
            "{}{:>4}{} {} → {}",
            BOLD,
            index + 1,
            RESET,
            scene,
            scene.output_path().display()
        );
    }
    print_success(&format!("{} scene(s) under '{}'", scenes.len(), root.display()));
    Ok(())
}
