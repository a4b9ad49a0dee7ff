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

//! File-facing services of the harness: finding scenes on disk and turning
//! HDR render artifacts into PNGs.

#![warn(missing_docs)]

pub mod convert;
pub mod discovery;
pub mod tonemap;

pub use convert::{ConvertedImage, ToneMapConverter};
pub use discovery::discover_scenes;
pub use tonemap::{display_value, to_display, ReinhardOperator};
