use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the viewer can display (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

/// Check if a path has one of the supported image extensions
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// List the images directly inside `folder`, in Explorer order.
///
/// Subfolders are not descended into. Unreadable entries are skipped.
pub fn list_images(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    // Surface a missing or unreadable folder instead of returning nothing
    std::fs::read_dir(folder)?;

    tracing::info!("🔍 Scanning folder: {}", folder.display());

    let mut images: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported_image(path))
        .collect();

    images.sort_by(|a, b| explorer_order(file_name(a), file_name(b)));

    tracing::info!("Found {} images in {}", images.len(), folder.display());
    Ok(images)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Character class rank in Explorer order: symbols, then digits, then letters
fn class_rank(c: char) -> u8 {
    if c.is_alphabetic() {
        2
    } else if c.is_numeric() {
        1
    } else {
        0
    }
}

/// Compare file names the way Windows Explorer lists them:
/// case-insensitive, character by character, with symbols (including `_`)
/// before digits before letters.
pub fn explorer_order(a: String, b: String) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let key = |c: char| (class_rank(c), c);
    a.chars().map(key).cmp(b.chars().map(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| file_name(p)).collect()
    }

    #[test]
    fn test_explorer_order() {
        let mut files = vec![
            "b.jpg".to_string(),
            "_a.jpg".to_string(),
            "10.jpg".to_string(),
            "A2.jpg".to_string(),
            "a10.jpg".to_string(),
            "a.jpg".to_string(),
        ];
        files.sort_by(|a, b| explorer_order(a.clone(), b.clone()));
        assert_eq!(files, vec!["_a.jpg", "10.jpg", "a.jpg", "a10.jpg", "A2.jpg", "b.jpg"]);
    }

    #[test]
    fn test_lists_only_supported_files_in_order() {
        let dir = tempdir().unwrap();
        for name in ["b.JPG", "a.png", "notes.txt", "c.tiff", "_x.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("d.jpg"), b"x").unwrap();

        let images = list_images(dir.path()).unwrap();
        assert_eq!(names(&images), vec!["_x.gif", "a.png", "b.JPG", "c.tiff"]);
    }

    #[test]
    fn test_missing_folder_is_error() {
        let dir = tempdir().unwrap();
        assert!(list_images(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("x.JPEG")));
        assert!(is_supported_image(Path::new("/a/b/c.bmp")));
        assert!(!is_supported_image(Path::new("x.nef")));
        assert!(!is_supported_image(Path::new("jpg")));
    }
}
