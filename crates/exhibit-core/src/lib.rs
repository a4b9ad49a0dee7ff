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

//! # Exhibit Core
//!
//! Foundational crate of the example renderer harness: the job data model,
//! the explicit configuration object, the error taxonomy and the
//! process-invocation abstraction shared by every other crate.

#![warn(missing_docs)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod process;
pub mod scene;

pub use cancel::CancellationToken;
pub use config::{
    ArtifactHandoff, BatchConfig, BuildConfig, Config, ConvertConfig, RenderConfig,
    ToneMapSettings, DEFAULT_CONFIG_FILE,
};
pub use error::{
    BuildError, ConfigError, ConversionError, DiscoveryError, JobError, RenderError,
};
pub use process::{ProcessOutput, ProcessRunner, ProcessSpec, SystemRunner};
pub use scene::{output_path_for, RenderJob, SceneFile};
