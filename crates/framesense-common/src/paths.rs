//! Path utilities for walking a collection's on-disk layout.
//!
//! A collection root holds one folder per video. Clip folders live under a
//! video folder, and shot folders live under `<clip>/shots/<NNN>/` next to the
//! frames (`0001.jpg`, ...) extracted from them.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "webm", "mov", "wmv", "flv",
];

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Name of the folder holding one sub-folder per detected shot.
pub const SHOTS_FOLDER: &str = "shots";

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use framesense_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.mp4")));
/// assert!(!is_video_file(Path::new("frames.json")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    has_extension_in(path, VIDEO_EXTENSIONS)
}

/// Check if a path has an image file extension.
pub fn is_image_file(path: &Path) -> bool {
    has_extension_in(path, IMAGE_EXTENSIONS)
}

fn has_extension_in(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Immediate sub-directories of `dir`, sorted by name.
///
/// A missing or unreadable directory yields an empty list.
pub fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Files directly inside `dir` matching `predicate`, sorted by name.
pub fn files_matching(dir: &Path, predicate: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && predicate(p))
        .collect();
    files.sort();
    files
}

/// The video file of a video or clip folder (first by name).
pub fn find_video_file(folder: &Path) -> Option<PathBuf> {
    files_matching(folder, is_video_file).into_iter().next()
}

/// Frame images (`*.jpg`) of a shot folder, sorted by name.
pub fn frame_files(shot_folder: &Path) -> Vec<PathBuf> {
    files_matching(shot_folder, |p| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg"))
    })
}

/// Every `shots/<NNN>/` folder below `root`, sorted.
pub fn shot_folders(root: &Path) -> Vec<PathBuf> {
    let mut folders: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| {
            e.path()
                .parent()
                .and_then(|p| p.file_name())
                .is_some_and(|name| name == SHOTS_FOLDER)
        })
        .map(|e| e.into_path())
        .collect();
    folders.sort();
    folders
}

/// Clip folders of a collection: `<root>/<video>/<clip>/` holding a video file.
pub fn clip_files(root: &Path) -> Vec<PathBuf> {
    subdirectories(root)
        .iter()
        .flat_map(|video| subdirectories(video))
        .filter_map(|clip| find_video_file(&clip))
        .collect()
}

/// Artifact id of a frame file: its leading digits (`0003.jpg` → `0003`).
pub fn frame_id(path: &Path) -> Option<String> {
    static LEADING_DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = LEADING_DIGITS.get_or_init(|| Regex::new(r"^(\d+)").expect("valid regex"));

    let name = path.file_name()?.to_str()?;
    re.captures(name).map(|c| c[1].to_string())
}

/// Lowercase slug with every run of non-word characters collapsed to `-`.
///
/// # Examples
///
/// ```
/// use framesense_common::paths::slugify;
///
/// assert_eq!(slugify("My Video (2021)"), "my-video-2021");
/// ```
pub fn slugify(s: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"\W+").expect("valid regex"));

    re.replace_all(&s.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Whether `path` passes the `--filter` substring selection.
pub fn is_selected(path: &Path, filter: Option<&str>) -> bool {
    match filter {
        Some(f) if !f.is_empty() => path.to_string_lossy().contains(f),
        _ => true,
    }
}
