use crate::data::DataError;
use burn::data::dataset::{
    Dataset, InMemDataset,
    transform::{Mapper, MapperDataset},
};
use flate2::read::GzDecoder;
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

pub const WIDTH: usize = 28;
pub const HEIGHT: usize = 28;
pub const NUM_CLASSES: usize = 10;

/// Dataset split, named after the directory that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }

    fn images_file(&self) -> &'static str {
        match self {
            Self::Train => TRAIN_IMAGES,
            Self::Test => TEST_IMAGES,
        }
    }

    fn labels_file(&self) -> &'static str {
        match self {
            Self::Train => TRAIN_LABELS,
            Self::Test => TEST_LABELS,
        }
    }
}

/// MNIST item.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MnistItem {
    /// Image as a flat, row-major array of floats.
    /// Each value is a brightness, in between 0.0 and 255.0.
    ///
    /// # Shape
    /// [HEIGHT * WIDTH]
    pub image: Vec<f32>,

    /// Label of the image.
    /// Each value is in between 0 and 9.
    pub label: u8,
}

#[derive(Deserialize, Debug, Clone)]
struct MnistItemRaw {
    pub image_bytes: Vec<u8>,
    pub label: u8,
}

struct BytesToImage;

impl Mapper<MnistItemRaw, MnistItem> for BytesToImage {
    /// Convert a raw MNIST item (image bytes) to a MNIST item (float array image).
    fn map(&self, item: &MnistItemRaw) -> MnistItem {
        debug_assert_eq!(item.image_bytes.len(), WIDTH * HEIGHT);

        let image: Vec<f32> = item
            .image_bytes
            .iter()
            .map(|brightness| {
                let element: f32 = (*brightness).as_();
                element
            })
            .collect();

        MnistItem {
            image,
            label: item.label,
        }
    }
}

type MappedDataset = MapperDataset<InMemDataset<MnistItemRaw>, BytesToImage, MnistItemRaw>;

/// One split of an MNIST-layout dataset directory, decoded into memory.
///
/// The root directory is expected to hold `train/` and `test/`
/// subdirectories containing the idx-format image/label pairs. A `.gz`
/// copy of any file is accepted in place of the raw file.
pub struct MnistDataset {
    dataset: MappedDataset,
}

impl std::fmt::Debug for MnistDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MnistDataset").finish_non_exhaustive()
    }
}

impl Dataset<MnistItem> for MnistDataset {
    fn get(&self, index: usize) -> Option<MnistItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl MnistDataset {
    /// Creates the train split dataset.
    pub fn train(root: &Path) -> Result<Self, DataError> {
        Self::new(root, Split::Train)
    }

    /// Creates the test split dataset.
    pub fn test(root: &Path) -> Result<Self, DataError> {
        Self::new(root, Split::Test)
    }

    pub fn new(root: &Path, split: Split) -> Result<Self, DataError> {
        let dir = root.join(split.dir_name());
        if !dir.is_dir() {
            return Err(DataError::MissingSplit(dir));
        }

        // MNIST is tiny so we can load it in-memory
        // Train images (u8): 28 * 28 * 60000 = 47.04Mb
        // Test images (u8): 28 * 28 * 10000 = 7.84Mb
        let images = read_images(&dir.join(split.images_file()))?;
        let labels = read_labels(&dir.join(split.labels_file()))?;

        if images.len() != labels.len() {
            return Err(DataError::CountMismatch {
                dir,
                images: images.len(),
                labels: labels.len(),
            });
        }

        let items: Vec<_> = images
            .into_iter()
            .zip(labels)
            .map(|(image_bytes, label)| MnistItemRaw { image_bytes, label })
            .collect();

        let dataset = InMemDataset::new(items);
        let dataset = MapperDataset::new(dataset, BytesToImage);

        Ok(Self { dataset })
    }
}

/// Read the idx image file at `path`.
/// Each image is a vector of `HEIGHT * WIDTH` bytes.
fn read_images(path: &Path) -> Result<Vec<Vec<u8>>, DataError> {
    let bytes = read_file(path)?;
    if bytes.len() < 16 {
        return Err(DataError::UnexpectedLength {
            path: path.to_owned(),
            expected: 16,
            found: bytes.len(),
        });
    }

    let magic = be_u32(&bytes, 0);
    if magic != IMAGES_MAGIC {
        return Err(DataError::BadMagic {
            path: path.to_owned(),
            expected: IMAGES_MAGIC,
            found: magic,
        });
    }

    let count = be_u32(&bytes, 4) as usize;
    let rows = be_u32(&bytes, 8) as usize;
    let cols = be_u32(&bytes, 12) as usize;
    if rows != HEIGHT || cols != WIDTH {
        return Err(DataError::BadDimensions {
            path: path.to_owned(),
            rows,
            cols,
        });
    }

    let payload = &bytes[16..];
    if payload.len() != count * HEIGHT * WIDTH {
        return Err(DataError::UnexpectedLength {
            path: path.to_owned(),
            expected: count * HEIGHT * WIDTH,
            found: payload.len(),
        });
    }

    Ok(payload
        .chunks(WIDTH * HEIGHT)
        .map(|chunk| chunk.to_vec())
        .collect())
}

/// Read the idx label file at `path`.
fn read_labels(path: &Path) -> Result<Vec<u8>, DataError> {
    let bytes = read_file(path)?;
    if bytes.len() < 8 {
        return Err(DataError::UnexpectedLength {
            path: path.to_owned(),
            expected: 8,
            found: bytes.len(),
        });
    }

    let magic = be_u32(&bytes, 0);
    if magic != LABELS_MAGIC {
        return Err(DataError::BadMagic {
            path: path.to_owned(),
            expected: LABELS_MAGIC,
            found: magic,
        });
    }

    let count = be_u32(&bytes, 4) as usize;
    let payload = &bytes[8..];
    if payload.len() != count {
        return Err(DataError::UnexpectedLength {
            path: path.to_owned(),
            expected: count,
            found: payload.len(),
        });
    }

    Ok(payload.to_vec())
}

/// Read `path`, or its gzip-compressed sibling when only `<path>.gz`
/// exists. Distribution mirrors ship the files either way.
fn read_file(path: &Path) -> Result<Vec<u8>, DataError> {
    let mut bytes = Vec::new();
    if path.is_file() {
        let mut file = File::open(path).map_err(|source| DataError::Io {
            path: path.to_owned(),
            source,
        })?;
        file.read_to_end(&mut bytes).map_err(|source| DataError::Io {
            path: path.to_owned(),
            source,
        })?;
        return Ok(bytes);
    }

    let gz_path = path.with_added_extension("gz");
    if gz_path.is_file() {
        let file = File::open(&gz_path).map_err(|source| DataError::Io {
            path: gz_path.clone(),
            source,
        })?;
        let mut decoder = GzDecoder::new(file);
        decoder
            .read_to_end(&mut bytes)
            .map_err(|source| DataError::Io {
                path: gz_path.clone(),
                source,
            })?;
        return Ok(bytes);
    }

    Err(DataError::Io {
        path: path.to_owned(),
        source: std::io::ErrorKind::NotFound.into(),
    })
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(buf)
}


#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::Write;
    use temp_dir::TempDir;

    #[test]
    fn decodes_a_synthetic_split() {
        let root = TempDir::new().unwrap();
        fixtures::write_split(root.path(), Split::Train, 3);

        let dataset = MnistDataset::train(root.path()).unwrap();
        assert_eq!(dataset.len(), 3);

        for index in 0..3 {
            let item = dataset.get(index).unwrap();
            let expected: Vec<f32> = fixtures::sample_image(index)
                .into_iter()
                .map(f32::from)
                .collect();
            assert_eq!(item.image, expected);
            assert_eq!(item.label, (index % NUM_CLASSES) as u8);
        }
        assert!(dataset.get(3).is_none());
    }

    #[test]
    fn decodes_gzipped_files() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("test");
        fs::create_dir_all(&dir).unwrap();

        let images = vec![fixtures::sample_image(0), fixtures::sample_image(1)];
        let labels = vec![7u8, 2u8];
        for (name, bytes) in [
            (TEST_IMAGES, fixtures::encode_images(&images)),
            (TEST_LABELS, fixtures::encode_labels(&labels)),
        ] {
            let file = fs::File::create(dir.join(format!("{name}.gz"))).unwrap();
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&bytes).unwrap();
            encoder.finish().unwrap();
        }

        let dataset = MnistDataset::test(root.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        let first = dataset.get(0).unwrap();
        let expected: Vec<f32> = fixtures::sample_image(0).into_iter().map(f32::from).collect();
        assert_eq!(first.image, expected);
        assert_eq!(first.label, 7);
        assert_eq!(dataset.get(1).unwrap().label, 2);
    }

    #[test]
    fn missing_split_directory_is_an_error() {
        let root = TempDir::new().unwrap();
        let err = MnistDataset::train(root.path()).unwrap_err();
        assert!(matches!(err, DataError::MissingSplit(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("train")).unwrap();
        let err = MnistDataset::train(root.path()).unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
    }

    #[test]
    fn bad_magic_is_an_error() {
        let root = TempDir::new().unwrap();
        fixtures::write_split(root.path(), Split::Train, 2);

        let path = root.path().join("train").join(TRAIN_IMAGES);
        let mut bytes = fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&LABELS_MAGIC.to_be_bytes());
        fs::write(&path, bytes).unwrap();

        let err = MnistDataset::train(root.path()).unwrap_err();
        assert!(matches!(
            err,
            DataError::BadMagic {
                expected: IMAGES_MAGIC,
                ..
            }
        ));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let root = TempDir::new().unwrap();
        fixtures::write_split(root.path(), Split::Train, 2);

        let path = root.path().join("train").join(TRAIN_IMAGES);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let err = MnistDataset::train(root.path()).unwrap_err();
        assert!(matches!(err, DataError::UnexpectedLength { .. }));
    }

    #[test]
    fn unexpected_image_dimensions_are_an_error() {
        let root = TempDir::new().unwrap();
        fixtures::write_split(root.path(), Split::Train, 1);

        let path = root.path().join("train").join(TRAIN_IMAGES);
        let mut bytes = fs::read(&path).unwrap();
        bytes[8..12].copy_from_slice(&14u32.to_be_bytes());
        fs::write(&path, bytes).unwrap();

        let err = MnistDataset::train(root.path()).unwrap_err();
        assert!(matches!(err, DataError::BadDimensions { rows: 14, .. }));
    }

    #[test]
    fn image_label_count_mismatch_is_an_error() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("train");
        fs::create_dir_all(&dir).unwrap();

        let images = vec![fixtures::sample_image(0), fixtures::sample_image(1)];
        fs::write(dir.join(TRAIN_IMAGES), fixtures::encode_images(&images)).unwrap();
        fs::write(dir.join(TRAIN_LABELS), fixtures::encode_labels(&[1u8])).unwrap();

        let err = MnistDataset::train(root.path()).unwrap_err();
        assert!(matches!(
            err,
            DataError::CountMismatch {
                images: 2,
                labels: 1,
                ..
            }
        ));
    }
}
