//! COCO run-length encoding of binary masks
//!
//! Masks are scanned in column-major order. Counts alternate between runs of
//! zeros and runs of ones, always starting with zeros (so the first count is 0
//! when the top-left pixel is set). The compressed form packs counts into
//! printable ASCII, five bits per character, storing counts after the second as
//! deltas against the count two positions earlier.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Uncompressed run-length encoding of one mask
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rle {
    /// Mask height in pixels
    pub height: usize,
    /// Mask width in pixels
    pub width: usize,
    /// Alternating zero/one run lengths, column-major
    pub counts: Vec<u32>,
}

impl Rle {
    /// Encode a `height x width` mask; any non-zero pixel is foreground.
    pub fn encode(mask: ArrayView2<'_, u8>) -> Self {
        let (height, width) = mask.dim();
        let mut counts = Vec::new();
        let mut current = false;
        let mut run = 0u32;

        // Transposed iteration visits pixels column by column.
        for &pixel in mask.t().iter() {
            let value = pixel != 0;
            if value != current {
                counts.push(run);
                run = 0;
                current = value;
            }
            run += 1;
        }
        counts.push(run);

        Self { height, width, counts }
    }

    /// Decode back into a `height x width` mask of 0/1 values.
    pub fn decode(&self) -> Result<Array2<u8>> {
        let total: u64 = self.counts.iter().map(|&c| c as u64).sum();
        if total != (self.height * self.width) as u64 {
            return Err(Error::serialization(format!(
                "RLE counts cover {total} pixels, expected {}",
                self.height * self.width
            )));
        }

        let mut column_major = Vec::with_capacity(self.height * self.width);
        for (i, &count) in self.counts.iter().enumerate() {
            let value = (i % 2) as u8;
            column_major.extend(std::iter::repeat(value).take(count as usize));
        }
        // Fill a (width, height) array row-major, then transpose.
        let transposed = Array2::from_shape_vec((self.width, self.height), column_major)
            .map_err(Error::serialization)?;
        Ok(transposed.reversed_axes().as_standard_layout().into_owned())
    }

    /// Foreground pixel count
    pub fn area(&self) -> u64 {
        self.counts.iter().skip(1).step_by(2).map(|&c| c as u64).sum()
    }

    /// COCO compressed counts string.
    pub fn to_compressed_string(&self) -> String {
        let mut out = String::new();
        for i in 0..self.counts.len() {
            let mut x = self.counts[i] as i64;
            if i > 2 {
                x -= self.counts[i - 2] as i64;
            }
            loop {
                let mut c = (x & 0x1f) as u8;
                x >>= 5;
                let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
                if more {
                    c |= 0x20;
                }
                out.push((c + 48) as char);
                if !more {
                    break;
                }
            }
        }
        out
    }

    /// Parse a COCO compressed counts string.
    pub fn from_compressed_string(height: usize, width: usize, s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let mut counts: Vec<u32> = Vec::new();
        let mut p = 0;

        while p < bytes.len() {
            let mut x: i64 = 0;
            let mut k = 0;
            loop {
                let byte = bytes[p];
                if !(48..48 + 64).contains(&byte) {
                    return Err(Error::serialization(format!(
                        "invalid RLE character {:?} at {p}",
                        byte as char
                    )));
                }
                let c = (byte - 48) as i64;
                x |= (c & 0x1f) << (5 * k);
                p += 1;
                k += 1;
                let more = c & 0x20 != 0;
                if !more {
                    if c & 0x10 != 0 {
                        x |= -1i64 << (5 * k);
                    }
                    break;
                }
                if p >= bytes.len() || k >= 12 {
                    return Err(Error::serialization("truncated RLE counts string"));
                }
            }
            let m = counts.len();
            if m > 2 {
                x += counts[m - 2] as i64;
            }
            let count = u32::try_from(x)
                .map_err(|_| Error::serialization(format!("RLE count {x} out of range")))?;
            counts.push(count);
        }

        Ok(Self { height, width, counts })
    }

    /// Compressed form as serialized in COCO result files.
    pub fn compress(&self) -> CompressedRle {
        CompressedRle { size: [self.height, self.width], counts: self.to_compressed_string() }
    }
}

/// `{"size": [h, w], "counts": "..."}` as written in COCO result files
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedRle {
    /// `[height, width]`
    pub size: [usize; 2],
    /// Compressed counts string
    pub counts: String,
}

impl CompressedRle {
    /// Expand to uncompressed counts.
    pub fn decompress(&self) -> Result<Rle> {
        Rle::from_compressed_string(self.size[0], self.size[1], &self.counts)
    }
}
