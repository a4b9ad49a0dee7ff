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

// Regenerates the example gallery.
// Run with: cargo xtask <command>

mod commands;
mod helpers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{convert::ConvertArgs, examples::ExamplesArgs, list::ListArgs};
use helpers::{print_error, BANNER};

#[derive(Parser, Debug)]
#[command(version, about = "Example rendering harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the renderer, render every example scene and write its PNG
    Examples(ExamplesArgs),
    /// Tone map a single HDR raster into a PNG
    Convert(ConvertArgs),
    /// List the scenes a batch would render, in order
    List(ListArgs),
}

fn main() {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    println!("{}", BANNER);
    if let Err(e) = run(cli.command) {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Examples(args) => commands::examples::run(&args),
        Command::Convert(args) => commands::convert::run(&args),
        Command::List(args) => commands::list::run(&args),
    }
}
