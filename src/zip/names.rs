//! Mapping between filesystem paths and archive entry names.
//!
//! Entry names always use `/` as the separator. On extraction a name is
//! only accepted if every segment is a plain name: absolute paths, drive
//! prefixes and `..` segments are rejected so no entry can land outside
//! the destination directory.

use anyhow::{Context, Result, bail};
use std::path::{Component, Path, PathBuf};

/// Build the archive entry name for a path relative to the archive root.
pub fn entry_name(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .with_context(|| format!("Path is not valid UTF-8: {}", relative.display()))?,
            ),
            Component::CurDir => {}
            _ => bail!("Not a relative path: {}", relative.display()),
        }
    }

    if parts.is_empty() {
        bail!("Empty entry name for '{}'", relative.display());
    }
    Ok(parts.join("/"))
}

/// Resolve an entry name to a path under `destination`.
pub fn resolve_entry_path(destination: &Path, name: &str) -> Result<PathBuf> {
    if name.starts_with('/') || name.starts_with('\\') {
        bail!("Refusing absolute entry path '{}'", name);
    }

    let mut relative = PathBuf::new();
    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => bail!("Refusing entry path '{}' that escapes the destination", name),
            _ => {}
        }

        // Anything the platform would not treat as a single plain name
        // (e.g. a drive prefix like "C:") is rejected
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !is_drive(segment) => relative.push(segment),
            _ => bail!("Refusing unsafe entry path '{}'", name),
        }
    }

    if relative.as_os_str().is_empty() {
        bail!("Empty entry path '{}'", name);
    }
    Ok(destination.join(relative))
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_use_forward_slashes() {
        let relative: PathBuf = ["dir", "sub", "file.txt"].iter().collect();
        assert_eq!(entry_name(&relative).unwrap(), "dir/sub/file.txt");
        assert_eq!(entry_name(Path::new("./top.bin")).unwrap(), "top.bin");
    }

    #[test]
    fn entry_name_rejects_escaping_paths() {
        assert!(entry_name(Path::new("../x")).is_err());
        assert!(entry_name(Path::new("")).is_err());
    }

    #[test]
    fn resolves_nested_names() {
        let dest = Path::new("out");
        assert_eq!(
            resolve_entry_path(dest, "a/b/c.txt").unwrap(),
            dest.join("a").join("b").join("c.txt")
        );
        assert_eq!(
            resolve_entry_path(dest, "./a//b/").unwrap(),
            dest.join("a").join("b")
        );
    }

    #[test]
    fn rejects_traversal_and_absolute_names() {
        let dest = Path::new("out");
        for name in [
            "../evil.txt",
            "a/../../evil.txt",
            "..",
            "/etc/passwd",
            "\\windows\\system32",
            "C:/evil.txt",
            "a\\..\\..\\evil",
            "",
            "./",
        ] {
            assert!(
                resolve_entry_path(dest, name).is_err(),
                "'{name}' should be rejected"
            );
        }
    }
}
