// ============================================================
// Layer 4 — Image Dataset Readers
// ============================================================
// Reads the two classic benchmark formats straight from disk.
// No network access: point --data-dir at the extracted files.
//
// CIFAR-10 "binary version":
//   data_batch_1.bin .. data_batch_5.bin   ← training split
//   test_batch.bin                         ← test split
//   Every record is 3073 bytes:
//     [label: u8][red: 1024 u8][green: 1024 u8][blue: 1024 u8]
//
// MNIST IDX:
//   train-images-idx3-ubyte / train-labels-idx1-ubyte
//   t10k-images-idx3-ubyte  / t10k-labels-idx1-ubyte
//   Header fields are big-endian u32:
//     images: magic=2051, count, rows, cols, then count*rows*cols u8
//     labels: magic=2049, count, then count u8
//
// Reference: https://www.cs.toronto.edu/~kriz/cifar.html
//            http://yann.lecun.com/exdb/mnist/

use anyhow::{bail, ensure, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::{
    kinds::DatasetKind,
    sample::ImageSample,
    traits::{SampleSource, Split},
};

const CIFAR_SIDE:        usize = 32;
const CIFAR_RECORD_LEN:  usize = 1 + 3 * CIFAR_SIDE * CIFAR_SIDE;
const CIFAR_NUM_CLASSES: usize = 10;

const IDX_IMAGES_MAGIC: u32 = 2051;
const IDX_LABELS_MAGIC: u32 = 2049;
const MNIST_NUM_CLASSES: usize = 10;

/// Build the reader that matches a dataset kind.
pub fn source_for(kind: DatasetKind, dir: impl Into<PathBuf>) -> Box<dyn SampleSource> {
    match kind {
        DatasetKind::Cifar10 => Box::new(Cifar10Loader::new(dir)),
        DatasetKind::Mnist   => Box::new(MnistLoader::new(dir)),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Cannot read dataset file '{}'", path.display()))
}

// ─── CIFAR-10 ─────────────────────────────────────────────────────────────────
pub struct Cifar10Loader {
    dir: PathBuf,
}

impl Cifar10Loader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn batch_files(split: Split) -> Vec<String> {
        match split {
            Split::Train => (1..=5).map(|i| format!("data_batch_{i}.bin")).collect(),
            Split::Test  => vec!["test_batch.bin".to_string()],
        }
    }
}

impl SampleSource for Cifar10Loader {
    fn load_split(&self, split: Split) -> Result<Vec<ImageSample>> {
        let mut samples = Vec::new();
        for name in Self::batch_files(split) {
            let path  = self.dir.join(&name);
            let bytes = read_file(&path)?;
            let batch = parse_cifar_batch(&bytes)
                .with_context(|| format!("Malformed CIFAR-10 batch '{}'", path.display()))?;
            tracing::debug!("Read {} images from '{}'", batch.len(), path.display());
            samples.extend(batch);
        }
        Ok(samples)
    }
}

/// Decode one CIFAR-10 binary batch.
pub fn parse_cifar_batch(bytes: &[u8]) -> Result<Vec<ImageSample>> {
    ensure!(
        bytes.len() % CIFAR_RECORD_LEN == 0,
        "length {} is not a multiple of the {}-byte record size",
        bytes.len(), CIFAR_RECORD_LEN,
    );

    bytes
        .chunks_exact(CIFAR_RECORD_LEN)
        .enumerate()
        .map(|(i, record)| {
            let label = record[0] as usize;
            ensure!(label < CIFAR_NUM_CLASSES, "record {i} has label {label}");
            Ok(ImageSample::new(record[1..].to_vec(), label, 3, CIFAR_SIDE, CIFAR_SIDE))
        })
        .collect()
}

// ─── MNIST ────────────────────────────────────────────────────────────────────
pub struct MnistLoader {
    dir: PathBuf,
}

impl MnistLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_names(split: Split) -> (&'static str, &'static str) {
        match split {
            Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            Split::Test  => ("t10k-images-idx3-ubyte",  "t10k-labels-idx1-ubyte"),
        }
    }
}

impl SampleSource for MnistLoader {
    fn load_split(&self, split: Split) -> Result<Vec<ImageSample>> {
        let (images_name, labels_name) = Self::file_names(split);
        let images_path = self.dir.join(images_name);
        let labels_path = self.dir.join(labels_name);

        let images = read_file(&images_path)?;
        let labels = read_file(&labels_path)?;
        let samples = parse_mnist(&images, &labels).with_context(|| {
            format!(
                "Malformed MNIST files '{}' / '{}'",
                images_path.display(), labels_path.display()
            )
        })?;
        // The conv backbone's flatten width only works out for 28x28
        let (rows, cols) = DatasetKind::Mnist.image_size();
        if let Some(s) = samples.first() {
            ensure!(
                (s.height, s.width) == (rows, cols),
                "MNIST images in '{}' are {}x{}, expected {rows}x{cols}",
                images_path.display(), s.height, s.width
            );
        }
        tracing::debug!("Read {} images from '{}'", samples.len(), images_path.display());
        Ok(samples)
    }
}

fn be_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let field = bytes
        .get(offset..offset + 4)
        .with_context(|| format!("header truncated at byte {offset}"))?;
    Ok(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

/// Decode a pair of MNIST IDX buffers (images, labels).
pub fn parse_mnist(images: &[u8], labels: &[u8]) -> Result<Vec<ImageSample>> {
    let magic = be_u32(images, 0)?;
    ensure!(magic == IDX_IMAGES_MAGIC, "image file magic is {magic}, expected {IDX_IMAGES_MAGIC}");
    let magic = be_u32(labels, 0)?;
    ensure!(magic == IDX_LABELS_MAGIC, "label file magic is {magic}, expected {IDX_LABELS_MAGIC}");

    let count = be_u32(images, 4)? as usize;
    let rows  = be_u32(images, 8)? as usize;
    let cols  = be_u32(images, 12)? as usize;
    let label_count = be_u32(labels, 4)? as usize;
    if count != label_count {
        bail!("{count} images but {label_count} labels");
    }

    ensure!(rows > 0 && cols > 0, "image header declares {rows}x{cols} images");

    let pixels = &images[16..];
    let labels = &labels[8..];
    let plane  = rows * cols;
    ensure!(pixels.len() >= count * plane, "image data truncated");
    ensure!(labels.len() >= count,         "label data truncated");

    pixels
        .chunks_exact(plane)
        .zip(labels.iter())
        .take(count)
        .enumerate()
        .map(|(i, (img, &label))| {
            let label = label as usize;
            ensure!(label < MNIST_NUM_CLASSES, "image {i} has label {label}");
            Ok(ImageSample::new(img.to_vec(), label, 1, rows, cols))
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn idx_header(magic: u32, dims: &[u32]) -> Vec<u8> {
        let mut out = magic.to_be_bytes().to_vec();
        for d in dims {
            out.extend_from_slice(&d.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_parse_cifar_records() {
        let mut bytes = Vec::new();
        for label in [3u8, 7u8] {
            bytes.push(label);
            bytes.extend(std::iter::repeat(label * 10).take(3072));
        }
        let samples = parse_cifar_batch(&bytes).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].label, 7);
        assert_eq!(samples[1].pixels.len(), 3072);
        assert_eq!(samples[1].at(2, 31, 31), 70);
    }

    #[test]
    fn test_truncated_cifar_is_rejected() {
        let bytes = vec![0u8; CIFAR_RECORD_LEN + 10];
        assert!(parse_cifar_batch(&bytes).is_err());
    }

    #[test]
    fn test_parse_mnist_pair() {
        let mut images = idx_header(IDX_IMAGES_MAGIC, &[2, 2, 2]);
        images.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut labels = idx_header(IDX_LABELS_MAGIC, &[2]);
        labels.extend_from_slice(&[9, 4]);

        let samples = parse_mnist(&images, &labels).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, 9);
        assert_eq!(samples[1].pixels, vec![5, 6, 7, 8]);
        assert_eq!(samples[1].channels, 1);
    }

    #[test]
    fn test_mnist_bad_magic() {
        let images = idx_header(1234, &[0, 28, 28]);
        let labels = idx_header(IDX_LABELS_MAGIC, &[0]);
        let err = parse_mnist(&images, &labels).unwrap_err().to_string();
        assert!(err.contains("magic"));
    }

    #[test]
    fn test_mnist_count_mismatch() {
        let mut images = idx_header(IDX_IMAGES_MAGIC, &[1, 1, 1]);
        images.push(0);
        let labels = idx_header(IDX_LABELS_MAGIC, &[2]);
        assert!(parse_mnist(&images, &labels).is_err());
    }

    #[test]
    fn test_mnist_zero_sized_images_rejected() {
        for dims in [[1, 0, 28], [1, 28, 0]] {
            let mut images = idx_header(IDX_IMAGES_MAGIC, &dims);
            images.extend_from_slice(&[0; 28]);
            let mut labels = idx_header(IDX_LABELS_MAGIC, &[1]);
            labels.push(3);
            let err = parse_mnist(&images, &labels).unwrap_err().to_string();
            assert!(err.contains("header declares"), "{err}");
        }
    }

    #[test]
    fn test_mnist_label_out_of_range() {
        let mut images = idx_header(IDX_IMAGES_MAGIC, &[2, 1, 1]);
        images.extend_from_slice(&[7, 8]);
        let mut labels = idx_header(IDX_LABELS_MAGIC, &[2]);
        labels.extend_from_slice(&[1, 42]);
        let err = parse_mnist(&images, &labels).unwrap_err().to_string();
        assert!(err.contains("image 1 has label 42"), "{err}");
    }

    #[test]
    fn test_mnist_loader_rejects_odd_image_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut images = idx_header(IDX_IMAGES_MAGIC, &[1, 2, 2]);
        images.extend_from_slice(&[1, 2, 3, 4]);
        let mut labels = idx_header(IDX_LABELS_MAGIC, &[1]);
        labels.push(5);
        fs::write(dir.path().join("t10k-images-idx3-ubyte"), &images).unwrap();
        fs::write(dir.path().join("t10k-labels-idx1-ubyte"), &labels).unwrap();

        let err = MnistLoader::new(dir.path()).load_split(Split::Test).unwrap_err().to_string();
        assert!(err.contains("2x2, expected 28x28"), "{err}");
    }

    #[test]
    fn test_mnist_loader_reads_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut images = idx_header(IDX_IMAGES_MAGIC, &[1, 28, 28]);
        images.extend(std::iter::repeat(9u8).take(28 * 28));
        let mut labels = idx_header(IDX_LABELS_MAGIC, &[1]);
        labels.push(6);
        fs::write(dir.path().join("train-images-idx3-ubyte"), &images).unwrap();
        fs::write(dir.path().join("train-labels-idx1-ubyte"), &labels).unwrap();

        let samples = MnistLoader::new(dir.path()).load_split(Split::Train).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label, 6);
        assert_eq!((samples[0].height, samples[0].width), (28, 28));
    }

    #[test]
    fn test_cifar_loader_reads_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = vec![5u8];
        record.extend(std::iter::repeat(1u8).take(3072));
        fs::write(dir.path().join("test_batch.bin"), &record).unwrap();

        let samples = Cifar10Loader::new(dir.path()).load_split(Split::Test).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label, 5);

        // Training batches are missing → a contextual error, not a panic
        let err = Cifar10Loader::new(dir.path()).load_split(Split::Train).unwrap_err();
        assert!(err.to_string().contains("data_batch_1.bin"));
    }
}
