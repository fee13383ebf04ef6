use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::EvaluationError;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "webp", "tif"];

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub path: PathBuf,
    pub label: usize,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub root: PathBuf,
    pub class_labels: Vec<String>,
    pub samples: Vec<Sample>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_labels.len()];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collects `root/<class>/**/<image>` samples. Classes are indexed in sorted name order.
pub fn discover_dataset(root: &Path) -> Result<Dataset, EvaluationError> {
    let io_err = |source| EvaluationError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut class_dirs = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            class_dirs.push(entry.path());
        }
    }
    class_dirs.sort();

    let mut class_labels = Vec::with_capacity(class_dirs.len());
    let mut samples = Vec::new();
    for (label, dir) in class_dirs.iter().enumerate() {
        class_labels.push(
            dir.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_supported_image(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        samples.extend(files.into_iter().map(|path| Sample { path, label }));
    }

    if samples.is_empty() {
        return Err(EvaluationError::EmptyDataset(root.to_path_buf()));
    }

    Ok(Dataset {
        root: root.to_path_buf(),
        class_labels,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classes_are_indexed_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        for (class, files) in [
            ("pituitary_tumor", vec!["a.jpg"]),
            ("glioma_tumor", vec!["b.JPG", "c.png", "notes.txt"]),
            ("no_tumor", vec!["nested/d.jpeg"]),
            ("meningioma_tumor", vec![]),
        ] {
            let class_dir = dir.path().join(class);
            fs::create_dir_all(&class_dir).unwrap();
            for file in files {
                let path = class_dir.join(file);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, b"x").unwrap();
            }
        }
        fs::write(dir.path().join("stray.jpg"), b"x").unwrap();

        let dataset = discover_dataset(dir.path()).unwrap();
        assert_eq!(
            dataset.class_labels,
            vec!["glioma_tumor", "meningioma_tumor", "no_tumor", "pituitary_tumor"]
        );
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.class_counts(), vec![2, 0, 1, 1]);
        assert!(dataset.samples[2].path.ends_with("nested/d.jpeg"));
        assert_eq!(dataset.samples[2].label, 2);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("glioma_tumor")).unwrap();
        assert!(matches!(
            discover_dataset(dir.path()),
            Err(EvaluationError::EmptyDataset(_))
        ));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        assert!(matches!(
            discover_dataset(Path::new("/nonexistent/testing")),
            Err(EvaluationError::Io { .. })
        ));
    }
}
