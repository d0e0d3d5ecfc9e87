//! Dataset readers for the two on-disk formats the classifiers are exercised
//! with: whitespace-separated text tables (iris) and IDX binaries (MNIST).

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::common_types::{Data, Feature};
use crate::error::{Error, Result};

pub const IDX_IMAGE_MAGIC: u32 = 0x0000_0803;
pub const IDX_LABEL_MAGIC: u32 = 0x0000_0801;

/// Upper bound on rows reserved up front from an IDX header's item count.
const IDX_PREALLOCATED_ITEMS: usize = 1 << 16;

/// Parses a text table: one row per non-blank line, values separated by
/// whitespace.
pub fn read_text_table<F: Feature, R: BufRead>(reader: R) -> Result<Data<F>> {
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .ok()
                    .and_then(num_traits::cast::<f64, F>)
                    .ok_or_else(|| Error::Parse {
                        line: i + 1,
                        token: token.to_string(),
                    })
            })
            .collect::<Result<Vec<F>>>()?;
        rows.push(row);
    }
    Data::from_rows(rows)
}

pub fn load_text_table<F: Feature>(path: impl AsRef<Path>) -> Result<Data<F>> {
    let path = path.as_ref();
    let table = File::open(path)
        .map_err(Error::from)
        .and_then(|file| read_text_table(BufReader::new(file)));
    match &table {
        Ok(data) => log::info!(
            "loaded {} x {} table from {}",
            data.n_rows(),
            data.n_cols(),
            path.display()
        ),
        Err(err) => log::error!("failed to load data from {}: {err}", path.display()),
    }
    table
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_be_bytes(bytes))
}

/// Parses an IDX file. Images become one row of `rows * cols` pixels per
/// item; labels become a single-column table.
pub fn read_idx<F: Feature, R: Read>(mut reader: R) -> Result<Data<F>> {
    let magic = read_u32(&mut reader)?;
    let items = read_u32(&mut reader)? as usize;
    let width = match magic {
        IDX_IMAGE_MAGIC => {
            let rows = read_u32(&mut reader)? as usize;
            let cols = read_u32(&mut reader)? as usize;
            rows.checked_mul(cols).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("IDX image size {rows} x {cols} overflows"),
                )
            })?
        }
        IDX_LABEL_MAGIC => 1,
        other => return Err(Error::BadMagic(other)),
    };

    // the header is untrusted: grow with the bytes actually read
    let mut rows = Vec::with_capacity(items.min(IDX_PREALLOCATED_ITEMS));
    let mut buffer = Vec::new();
    for _ in 0..items {
        buffer.clear();
        let read = reader.by_ref().take(width as u64).read_to_end(&mut buffer)?;
        if read < width {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("IDX item {} has {read} of {width} bytes", rows.len()),
            )
            .into());
        }
        let row = buffer
            .iter()
            .map(|&b| num_traits::cast::<u8, F>(b).unwrap_or_else(F::zero))
            .collect();
        rows.push(row);
    }
    Data::from_rows(rows)
}

pub fn load_idx<F: Feature>(path: impl AsRef<Path>) -> Result<Data<F>> {
    let path = path.as_ref();
    let table = File::open(path)
        .map_err(Error::from)
        .and_then(|file| read_idx(BufReader::new(file)));
    match &table {
        Ok(data) => log::info!(
            "loaded {} items of width {} from {}",
            data.n_rows(),
            data.n_cols(),
            path.display()
        ),
        Err(err) => log::error!("failed to load data from {}: {err}", path.display()),
    }
    table
}

/// Shuffles rows with a seeded generator and moves the last
/// `ceil(test_fraction * n)` of them into the test split.
///
/// Returns `(x_train, x_test, y_train, y_test)`.
pub fn train_test_split<F: Copy>(
    x: &Data<F>,
    y: &Data<F>,
    test_fraction: f64,
    seed: u64,
) -> Result<(Data<F>, Data<F>, Data<F>, Data<F>)> {
    if x.n_rows() != y.n_rows() {
        return Err(Error::LabelCountMismatch {
            expected: x.n_rows(),
            found: y.n_rows(),
        });
    }
    let n = x.n_rows();
    let n_test = ((test_fraction.clamp(0.0, 1.0) * n as f64).ceil() as usize).min(n);

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let (train, test) = order.split_at(n - n_test);

    let pick = |table: &Data<F>, idx: &[usize]| -> Result<Data<F>> {
        Data::from_rows(idx.iter().map(|&i| table.row(i).to_vec()).collect())
    };
    Ok((pick(x, train)?, pick(x, test)?, pick(y, train)?, pick(y, test)?))
}

/// Iris tables as written by the dataset generator.
pub mod iris {
    use std::path::Path;

    use super::load_text_table;
    use crate::common_types::{Data, Feature};
    use crate::error::Result;

    pub const TRAIN_X: &str = "X_train";
    pub const TRAIN_Y: &str = "y_train";
    pub const TEST_X: &str = "X_test";
    pub const TEST_Y: &str = "y_test";

    pub fn load_train_set<F: Feature>(dir: impl AsRef<Path>) -> Result<(Data<F>, Data<F>)> {
        let dir = dir.as_ref();
        Ok((load_text_table(dir.join(TRAIN_X))?, load_text_table(dir.join(TRAIN_Y))?))
    }

    pub fn load_test_set<F: Feature>(dir: impl AsRef<Path>) -> Result<(Data<F>, Data<F>)> {
        let dir = dir.as_ref();
        Ok((load_text_table(dir.join(TEST_X))?, load_text_table(dir.join(TEST_Y))?))
    }
}

/// MNIST in its distributed IDX files.
pub mod mnist {
    use std::path::Path;

    use super::load_idx;
    use crate::common_types::{Data, Feature};
    use crate::error::Result;

    pub const TRAIN_IMAGES: &str = "train-images.idx3-ubyte";
    pub const TRAIN_LABELS: &str = "train-labels.idx1-ubyte";
    pub const TEST_IMAGES: &str = "t10k-images.idx3-ubyte";
    pub const TEST_LABELS: &str = "t10k-labels.idx1-ubyte";

    pub fn load_train_set<F: Feature>(dir: impl AsRef<Path>) -> Result<(Data<F>, Data<F>)> {
        let dir = dir.as_ref();
        Ok((load_idx(dir.join(TRAIN_IMAGES))?, load_idx(dir.join(TRAIN_LABELS))?))
    }

    pub fn load_test_set<F: Feature>(dir: impl AsRef<Path>) -> Result<(Data<F>, Data<F>)> {
        let dir = dir.as_ref();
        Ok((load_idx(dir.join(TEST_IMAGES))?, load_idx(dir.join(TEST_LABELS))?))
    }
}
