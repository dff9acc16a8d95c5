//! Cheap statistical sanity checks for generator output.
//!
//! None of these prove randomness. They catch the gross failures (stuck
//! sources, repeated blocks, low-entropy patterns) that should never reach a
//! caller.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::Serialize;

/// Shannon entropy in bits per byte.
pub fn quick_shannon(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    byte_counts(data)
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Min-entropy in bits per byte: `-log2(p_max)`.
pub fn quick_min_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let max = byte_counts(data).into_iter().max().unwrap_or(0);
    let p_max = max as f64 / data.len() as f64;
    -p_max.log2()
}

/// Summary of a sample.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub samples: usize,
    pub unique_values: usize,
    pub shannon_entropy: f64,
    pub min_entropy: f64,
    /// Compressed / raw length under zlib. Random data sits at or above 1.0.
    pub compression_ratio: f64,
    /// 0-100.
    pub quality_score: f64,
    pub grade: char,
}

impl QualityReport {
    fn empty(samples: usize) -> Self {
        Self {
            samples,
            unique_values: 0,
            shannon_entropy: 0.0,
            min_entropy: 0.0,
            compression_ratio: 0.0,
            quality_score: 0.0,
            grade: 'F',
        }
    }
}

/// Score a sample. Fewer than 16 bytes is always an `F`.
pub fn quick_quality(data: &[u8]) -> QualityReport {
    if data.len() < 16 {
        return QualityReport::empty(data.len());
    }

    let shannon = quick_shannon(data);
    let min_entropy = quick_min_entropy(data);
    let compression_ratio = compression_ratio(data);
    let unique = byte_counts(data).iter().filter(|&&c| c > 0).count();

    let score = (shannon / 8.0) * 60.0
        + compression_ratio.min(1.0) * 20.0
        + (unique as f64 / 256.0).min(1.0) * 20.0;

    QualityReport {
        samples: data.len(),
        unique_values: unique,
        shannon_entropy: shannon,
        min_entropy,
        compression_ratio,
        quality_score: score,
        grade: grade(score),
    }
}

fn grade(score: f64) -> char {
    match score {
        s if s >= 80.0 => 'A',
        s if s >= 60.0 => 'B',
        s if s >= 40.0 => 'C',
        s if s >= 20.0 => 'D',
        _ => 'F',
    }
}

fn byte_counts(data: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

fn compression_ratio(data: &[u8]) -> f64 {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    // Writing into a Vec cannot fail.
    let compressed = encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map(|v| v.len())
        .unwrap_or(0);
    compressed as f64 / data.len() as f64
}
