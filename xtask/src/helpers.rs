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

use exhibit_runtime::{BatchReport, JobStatus};

// ANSI color codes
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const GREEN: &str = "\x1b[32m";
pub const RED: &str = "\x1b[31m";
pub const BLUE: &str = "\x1b[34m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const MAGENTA: &str = "\x1b[35m";

// Visual symbols
pub const CHECK: &str = "✓";
pub const CROSS: &str = "✗";
pub const SKIP: &str = "⊘";
pub const CAMERA: &str = "📷";
pub const BRUSH: &str = "🎨";
pub const MAGNIFIER: &str = "🔍";

pub const BANNER: &str = concat!(
    "\x1b[1m",
    "\x1b[36m", // BOLD, CYAN
    "╔═══════════════════════════════════════════════════════════╗\n",
    "║                     ",
    "📷",
    " EXHIBIT ",
    "🎨",
    "                          ║\n",
    "║                Example Rendering Harness                  ║\n",
    "╚═══════════════════════════════════════════════════════════╝",
    "\x1b[0m" // RESET
);

pub fn print_task_start(task_name: &str, emoji: &str, color: &str) {
    println!(
        "\n{}{}━━━ {} {} {}━━━{}",
        BOLD, color, emoji, task_name, emoji, RESET
    );
}

pub fn print_success(message: &str) {
    println!("{}{} {} {}{}", BOLD, GREEN, CHECK, message, RESET);
}

pub fn print_error(message: &str) {
    println!("{}{} {} {}{}", BOLD, RED, CROSS, message, RESET);
}

pub fn print_info(message: &str) {
    println!("{}💡 Info:{} {}", BOLD, RESET, message);
}

/// One line per scene, then the totals.
pub fn print_report(report: &BatchReport) {
    println!(
        "\n{}{}╔═══════════════════════════════════════╗{}",
        BOLD, CYAN, RESET
    );
    println!(
        "{}{}║             BATCH SUMMARY             ║{}",
        BOLD, CYAN, RESET
    );
    println!(
        "{}{}╚═══════════════════════════════════════╝{}",
        BOLD, CYAN, RESET
    );

    for outcome in &report.outcomes {
        let scene = outcome.scene.display();
        match &outcome.status {
            JobStatus::Succeeded { width, height } => println!(
                "{}{}{} {} → {} ({}x{}, {:.2}s)",
                GREEN,
                CHECK,
                RESET,
                scene,
                outcome.output.display(),
                width,
                height,
                outcome.elapsed_secs
            ),
            JobStatus::Failed { kind, message } => {
                println!("{}{}{} {} [{}]", RED, CROSS, RESET, scene, kind);
                for line in message.lines() {
                    println!("    {}", line);
                }
            }
            JobStatus::Skipped => println!("{}{}{} {} (skipped)", YELLOW, SKIP, RESET, scene),
        }
    }

    let total = report.outcomes.len();
    if report.is_success() {
        println!(
            "\n{}{} {} All {} scenes rendered {}{}",
            BOLD, GREEN, CHECK, total, BRUSH, RESET
        );
    } else {
        println!(
            "\n{}{} ⚠ {}/{} scenes rendered, {} failed, {} skipped{}",
            BOLD,
            YELLOW,
            report.succeeded(),
            total,
            report.failed(),
            report.skipped(),
            RESET
        );
    }
    println!(
        "{}{}Total time: {:.2}s{}",
        BOLD, BLUE, report.elapsed_secs, RESET
    );
}
