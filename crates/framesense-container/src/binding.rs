//! Host to container path bindings.
//!
//! Every container call declares the host directories it mounts. Arguments
//! that are paths below one of those directories are rewritten to the
//! matching location inside the container; everything else passes through.

use std::fmt;
use std::path::{Path, PathBuf};

/// A `(host directory, container directory)` mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    host: PathBuf,
    container: PathBuf,
}

impl Binding {
    /// Create a binding. A relative host path is made absolute against the
    /// current directory.
    pub fn new(host: impl AsRef<Path>, container: impl Into<PathBuf>) -> Self {
        let host = host.as_ref();
        let host = std::path::absolute(host).unwrap_or_else(|_| host.to_path_buf());
        Self {
            host,
            container: container.into(),
        }
    }

    pub fn host(&self) -> &Path {
        &self.host
    }

    pub fn container(&self) -> &Path {
        &self.container
    }

    /// `host:container`, the mount spec both engines accept.
    pub fn mount_spec(&self) -> String {
        format!("{}:{}", self.host.display(), self.container.display())
    }

    /// Container location of `path`, if `path` lies under the host directory.
    pub fn translate(&self, path: &Path) -> Option<PathBuf> {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        absolute
            .strip_prefix(&self.host)
            .ok()
            .map(|rel| {
                if rel.as_os_str().is_empty() {
                    self.container.clone()
                } else {
                    self.container.join(rel)
                }
            })
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mount_spec())
    }
}

/// One command argument, typed so that only paths get translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Text(String),
    Path(PathBuf),
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<&Path> for Arg {
    fn from(p: &Path) -> Self {
        Arg::Path(p.to_path_buf())
    }
}

impl From<PathBuf> for Arg {
    fn from(p: PathBuf) -> Self {
        Arg::Path(p)
    }
}

impl From<&PathBuf> for Arg {
    fn from(p: &PathBuf) -> Self {
        Arg::Path(p.clone())
    }
}

/// Container location of `path` under the first matching binding, if any.
pub fn translate_path(bindings: &[Binding], path: &Path) -> Option<PathBuf> {
    bindings.iter().find_map(|b| b.translate(path))
}

/// Render `args` for the container: bound paths are rewritten (first binding
/// wins), unbound paths and text pass through unchanged.
///
/// # Examples
///
/// ```
/// use framesense_container::binding::{translate, Arg, Binding};
/// use std::path::Path;
///
/// let bindings = [Binding::new("/host/a", "/data")];
/// let args = [Arg::from("--in"), Arg::from(Path::new("/host/a/b/c.jpg"))];
/// assert_eq!(translate(&bindings, &args), ["--in", "/data/b/c.jpg"]);
/// ```
pub fn translate(bindings: &[Binding], args: &[Arg]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg {
            Arg::Text(s) => s.clone(),
            Arg::Path(p) => translate_path(bindings, p)
                .unwrap_or_else(|| p.clone())
                .to_string_lossy()
                .into_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_under_binding_is_rewritten() {
        let bindings = [Binding::new("/host/a", "/data")];
        let out = translate(&bindings, &[Arg::from(Path::new("/host/a/b/c.jpg"))]);
        assert_eq!(out, vec!["/data/b/c.jpg"]);
    }

    #[test]
    fn test_path_outside_binding_passes_through() {
        let bindings = [Binding::new("/host/a", "/data")];
        let out = translate(&bindings, &[Arg::from(Path::new("/elsewhere/x.jpg"))]);
        assert_eq!(out, vec!["/elsewhere/x.jpg"]);
    }

    #[test]
    fn test_sibling_prefix_is_not_a_match() {
        // `/host/ab` shares a string prefix with `/host/a` but is not under it
        let bindings = [Binding::new("/host/a", "/data")];
        let out = translate(&bindings, &[Arg::from(Path::new("/host/ab/c.jpg"))]);
        assert_eq!(out, vec!["/host/ab/c.jpg"]);
    }

    #[test]
    fn test_text_is_never_translated() {
        let bindings = [Binding::new("/host/a", "/data")];
        let out = translate(&bindings, &[Arg::from("/host/a/b.jpg")]);
        assert_eq!(out, vec!["/host/a/b.jpg"]);
    }

    #[test]
    fn test_first_binding_wins() {
        let bindings = [
            Binding::new("/host", "/outer"),
            Binding::new("/host/a", "/inner"),
        ];
        let out = translate(&bindings, &[Arg::from(Path::new("/host/a/x"))]);
        assert_eq!(out, vec!["/outer/a/x"]);
    }

    #[test]
    fn test_binding_root_maps_to_container_dir() {
        let b = Binding::new("/host/a", "/data");
        assert_eq!(b.translate(Path::new("/host/a")), Some(PathBuf::from("/data")));
        assert_eq!(b.mount_spec(), "/host/a:/data");
    }

    #[test]
    fn test_relative_host_is_made_absolute() {
        let b = Binding::new("media", "/data");
        assert!(b.host().is_absolute());
        assert!(b.host().ends_with("media"));
    }
}
