//! Translation between local paths and the transfer service's namespace
//!
//! The service addresses files as POSIX-style paths inside a collection.
//! Two mappings are applied:
//! - a root prefix: everything under `local_root` lives under `remote_root`
//! - Windows drive letters: `C:/data/x.tif` is addressed as `/C/data/x.tif`
//!
//! Both are reversible, so `remote_to_local(local_to_remote(p)) == p` for any
//! path written with forward slashes.

use std::path::{Path, PathBuf};

use log::debug;

/// Maps local staging paths to service paths and back
#[derive(Debug, Clone, Default)]
pub struct PathTranslator {
    local_root: Option<PathBuf>,
    remote_root: Option<String>,
    drive_letters: bool,
}

impl PathTranslator {
    /// Translator with no root mapping; drive letters follow the host OS
    pub fn new() -> Self {
        PathTranslator {
            local_root: None,
            remote_root: None,
            drive_letters: cfg!(windows),
        }
    }

    /// Map everything under `local_root` to `remote_root`
    pub fn with_roots(mut self, local_root: impl Into<PathBuf>, remote_root: &str) -> Self {
        self.local_root = Some(local_root.into());
        self.remote_root = Some(trim_trailing_slash(remote_root).to_string());
        self
    }

    /// Force drive-letter translation on or off
    pub fn with_drive_letters(mut self, enabled: bool) -> Self {
        self.drive_letters = enabled;
        self
    }

    /// Service path for a local path
    pub fn local_to_remote(&self, local: &Path) -> String {
        if let (Some(local_root), Some(remote_root)) = (&self.local_root, &self.remote_root) {
            if let Ok(rest) = local.strip_prefix(local_root) {
                let rest = to_slashes(&rest.to_string_lossy());
                let remote = if rest.is_empty() {
                    remote_root.clone()
                } else {
                    format!("{}/{}", remote_root, rest)
                };
                debug!("Translated {} -> {}", local.display(), remote);
                return remote;
            }
        }

        let text = local.to_string_lossy();
        if self.drive_letters {
            let text = to_slashes(&text);
            if let Some((drive, rest)) = split_drive(&text) {
                return format!("/{}{}", drive, rest);
            }
            return text;
        }
        text.into_owned()
    }

    /// Local path for a service path
    pub fn remote_to_local(&self, remote: &str) -> PathBuf {
        if let (Some(local_root), Some(remote_root)) = (&self.local_root, &self.remote_root) {
            if let Some(rest) = remote.strip_prefix(remote_root.as_str()) {
                if rest.is_empty() {
                    return local_root.clone();
                }
                if let Some(rest) = rest.strip_prefix('/') {
                    return local_root.join(rest);
                }
            }
        }

        if self.drive_letters {
            let bytes = remote.as_bytes();
            let is_drive = bytes.len() >= 2
                && bytes[0] == b'/'
                && bytes[1].is_ascii_alphabetic()
                && (bytes.len() == 2 || bytes[2] == b'/');
            if is_drive {
                let drive = bytes[1] as char;
                return PathBuf::from(format!("{}:{}", drive, &remote[2..]));
            }
        }
        PathBuf::from(remote)
    }
}

fn to_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Split `C:/rest` into (`C`, `/rest`)
fn split_drive(path: &str) -> Option<(char, &str)> {
    let mut chars = path.chars();
    let drive = chars.next()?;
    if !drive.is_ascii_alphabetic() || chars.next()? != ':' {
        return None;
    }
    Some((drive, &path[2..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_letters_round_trip() {
        let translator = PathTranslator::new().with_drive_letters(true);
        let remote = translator.local_to_remote(Path::new("C:/data/slide_001.tif"));
        assert_eq!(remote, "/C/data/slide_001.tif");
        assert_eq!(translator.remote_to_local(&remote), PathBuf::from("C:/data/slide_001.tif"));
    }

    #[test]
    fn backslashes_become_service_paths() {
        let translator = PathTranslator::new().with_drive_letters(true);
        assert_eq!(translator.local_to_remote(Path::new(r"D:\stage\a.tif")), "/D/stage/a.tif");
    }

    #[test]
    fn root_prefix_round_trip() {
        let translator = PathTranslator::new()
            .with_drive_letters(false)
            .with_roots("/scratch/stage", "/~/stage/");

        let local = Path::new("/scratch/stage/run1/p_001.tif");
        let remote = translator.local_to_remote(local);
        assert_eq!(remote, "/~/stage/run1/p_001.tif");
        assert_eq!(translator.remote_to_local(&remote), local.to_path_buf());
    }

    #[test]
    fn root_prefix_respects_component_boundaries() {
        let translator = PathTranslator::new()
            .with_drive_letters(false)
            .with_roots("/scratch/stage", "/remote");

        assert_eq!(translator.local_to_remote(Path::new("/scratch/stage2/a.tif")), "/scratch/stage2/a.tif");
        assert_eq!(translator.remote_to_local("/remote2/a.tif"), PathBuf::from("/remote2/a.tif"));
    }

    #[test]
    fn posix_paths_pass_through() {
        let translator = PathTranslator::new().with_drive_letters(false);
        let local = Path::new("/data/x.tif");
        assert_eq!(translator.local_to_remote(local), "/data/x.tif");
        assert_eq!(translator.remote_to_local("/data/x.tif"), local.to_path_buf());
    }
}
