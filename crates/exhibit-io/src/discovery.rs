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

//! Recursive discovery of scene-description files.

use exhibit_core::{DiscoveryError, SceneFile};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Collects every file under `root` whose extension is exactly `extension`.
///
/// Symbolic links are followed, both to files and to directories; link
/// cycles are reported by the walk and skipped.
///
/// The result is sorted by path so batch order does not depend on the
/// filesystem's traversal order. An empty result is not an error.
///
/// # Errors
/// Fails when `root` is missing, is not a directory, or cannot be listed.
/// Unreadable entries below the root are logged and skipped.
pub fn discover_scenes(root: &Path, extension: &str) -> Result<Vec<SceneFile>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::RootNotFound {
            root: root.to_path_buf(),
        });
    }
    // Surface permission problems on the root itself instead of an empty batch.
    fs::read_dir(root).map_err(|source| DiscoveryError::Unreadable {
        root: root.to_path_buf(),
        source,
    })?;

    let mut scenes = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under '{}': {e}", root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == extension);
        if matches {
            scenes.push(SceneFile::new(entry.into_path()));
        }
    }

    scenes.sort();
    log::debug!(
        "Discovered {} '*.{}' scene(s) under '{}'",
        scenes.len(),
        extension,
        root.display()
    );
    Ok(scenes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_finds_nested_scenes_in_sorted_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("zeta.toml"));
        touch(&root.join("materials/glass.toml"));
        touch(&root.join("alpha.toml"));
        touch(&root.join("materials/deep/metal.toml"));

        let scenes = discover_scenes(root, "toml").unwrap();
        let relative: Vec<_> = scenes
            .iter()
            .map(|s| s.path().strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            [
                Path::new("alpha.toml"),
                Path::new("materials/deep/metal.toml"),
                Path::new("materials/glass.toml"),
                Path::new("zeta.toml"),
            ]
        );
    }

    #[test]
    fn test_only_exact_extension_matches() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("scene.toml"));
        touch(&root.join("scene.png"));
        touch(&root.join("notes.toml.bak"));
        touch(&root.join("LOUD.TOML"));
        fs::create_dir_all(root.join("dir.toml")).unwrap();

        let scenes = discover_scenes(root, "toml").unwrap();
        assert_eq!(scenes, [SceneFile::new(root.join("scene.toml"))]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_scenes_are_found() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        touch(&dir.path().join("shared/real.toml"));
        touch(&dir.path().join("library/brick.toml"));
        let root = dir.path().join("examples");
        fs::create_dir_all(&root).unwrap();
        symlink("../shared/real.toml", root.join("linked.toml")).unwrap();
        symlink(dir.path().join("library"), root.join("library")).unwrap();
        symlink(&root, root.join("library/loop")).unwrap();

        let scenes = discover_scenes(&root, "toml").unwrap();
        assert_eq!(
            scenes,
            [
                SceneFile::new(root.join("library/brick.toml")),
                SceneFile::new(root.join("linked.toml")),
            ]
        );
    }

    #[test]
    fn test_empty_root_yields_no_scenes() {
        let dir = tempdir().unwrap();
        assert!(discover_scenes(dir.path(), "toml").unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_scenes(&missing, "toml"),
            Err(DiscoveryError::RootNotFound { .. })
        ));
    }

    #[test]
    fn test_file_root_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("scene.toml");
        touch(&file);
        assert!(matches!(
            discover_scenes(&file, "toml"),
            Err(DiscoveryError::RootNotFound { .. })
        ));
    }
}
