//! Byte-budget quality search.
//!
//! Encoded size is assumed to grow with quality, so the highest quality that
//! fits a budget can be found by bisection over `[1, 100]`.

use bytes::Bytes;

use crate::codec::{MAX_QUALITY, MIN_QUALITY};
use crate::error::CodecError;

/// Outcome of a quality search.
#[derive(Debug, Clone)]
pub struct Targeted {
    /// Quality the output was encoded at
    pub quality: u8,

    /// Encoded output
    pub data: Bytes,

    /// False when even the minimum quality exceeded the budget
    pub within_budget: bool,
}

/// Finds the highest encoding quality whose output fits a byte budget.
#[derive(Debug, Clone, Copy)]
pub struct QualityTargeter {
    max_bytes: u64,
}

impl QualityTargeter {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Bisect on `encode(quality)` until the bounds are adjacent.
    ///
    /// `low` tracks the best quality within budget (starting just below the
    /// minimum), `high` the lowest quality known to be over it (starting just
    /// above the maximum). When nothing fits, the minimum quality's output is
    /// returned with `within_budget = false`.
    pub fn search<F>(&self, mut encode: F) -> Result<Targeted, CodecError>
    where
        F: FnMut(u8) -> Result<Bytes, CodecError>,
    {
        let mut low = MIN_QUALITY - 1;
        let mut high = MAX_QUALITY + 1;
        let mut best: Option<(u8, Bytes)> = None;
        let mut smallest_over: Option<(u8, Bytes)> = None;

        while high - low > 1 {
            let mid = low + (high - low) / 2;
            let data = encode(mid)?;
            if data.len() as u64 <= self.max_bytes {
                low = mid;
                best = Some((mid, data));
            } else {
                high = mid;
                smallest_over = Some((mid, data));
            }
        }

        match (best, smallest_over) {
            (Some((quality, data)), _) => Ok(Targeted {
                quality,
                data,
                within_budget: true,
            }),
            (None, Some((quality, data))) => Ok(Targeted {
                quality,
                data,
                within_budget: false,
            }),
            (None, None) => {
                let data = encode(MIN_QUALITY)?;
                Ok(Targeted {
                    quality: MIN_QUALITY,
                    within_budget: data.len() as u64 <= self.max_bytes,
                    data,
                })
            }
        }
    }
}
