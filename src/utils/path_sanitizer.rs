// SPDX-License-Identifier: GPL-3.0-only
use std::path::{Component, Path, PathBuf};
use anyhow::Result;

/// Last component of a name reported by the platform, either separator style
fn remote_file_name(remote_name: &str) -> &str {
    remote_name.rsplit(['/', '\\']).next().unwrap_or("")
}

/// Whether a private storage name is a single plain file name
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Validate that a relative path stays within a base directory when joined
pub fn validate_path_within_base_new(path: &Path, base: &Path) -> Result<()> {
    if path.is_absolute() {
        return Err(anyhow::anyhow!("Path {} is absolute", path.display()));
    }

    for component in path.components() {
        if let Component::ParentDir = component {
            return Err(anyhow::anyhow!(
                "Path contains parent directory reference (..)"
            ));
        }
    }

    let resolved = base.join(path);
    if !resolved.starts_with(base) {
        return Err(anyhow::anyhow!(
            "Path {} is outside base directory {}",
            resolved.display(),
            base.display()
        ));
    }

    Ok(())
}

/// Local path for downloaded content, or `None` if the remote name is unusable
///
/// The remote name is kept byte for byte; only its directory part is dropped.
pub fn resolve_content_path(base: &Path, remote_name: &str) -> Option<PathBuf> {
    let name = remote_file_name(remote_name);
    if !is_plain_file_name(name) {
        return None;
    }

    validate_path_within_base_new(Path::new(name), base).ok()?;
    Some(base.join(name))
}
