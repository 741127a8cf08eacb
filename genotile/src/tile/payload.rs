//! Tile payload flavours.
//!
//! The cache treats payloads as opaque; it only needs a sample count for the
//! oversize check, an optional value range, and the bytes to place in a
//! block texture row.

use std::borrow::Cow;

/// Texel layout a payload uploads as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    /// One unsigned byte per texel.
    R8Unorm,
    /// One 32-bit float per texel.
    R32Float,
    /// Four unsigned bytes per texel.
    Rgba8Unorm,
}

impl TexelFormat {
    pub fn bytes_per_texel(&self) -> usize {
        match self {
            TexelFormat::R8Unorm => 1,
            TexelFormat::R32Float => 4,
            TexelFormat::Rgba8Unorm => 4,
        }
    }

    /// Whether the device must support float textures for this format.
    pub fn is_float(&self) -> bool {
        matches!(self, TexelFormat::R32Float)
    }
}

/// Inclusive value range of a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f32,
    pub max: f32,
}

/// Data stored in a tile.
pub trait TilePayload: Send + Sync + 'static {
    /// Texel format used when the payload is uploaded into a block texture.
    const TEXEL_FORMAT: TexelFormat;

    /// Number of samples (texels) carried.
    fn sample_count(&self) -> usize;

    /// Value range, if the payload has one.
    fn min_max(&self) -> Option<MinMax> {
        None
    }

    /// Row bytes in [`Self::TEXEL_FORMAT`] layout.
    fn texel_bytes(&self) -> Cow<'_, [u8]>;
}

/// Continuous signal samples (coverage, conservation, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalPayload {
    samples: Vec<f32>,
    min_max: Option<MinMax>,
}

impl SignalPayload {
    pub fn new(samples: Vec<f32>) -> Self {
        let min_max = samples
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<MinMax>, v| match acc {
                None => Some(MinMax { min: v, max: v }),
                Some(range) => Some(MinMax {
                    min: range.min.min(v),
                    max: range.max.max(v),
                }),
            });
        Self { samples, min_max }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl TilePayload for SignalPayload {
    const TEXEL_FORMAT: TexelFormat = TexelFormat::R32Float;

    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn min_max(&self) -> Option<MinMax> {
        self.min_max
    }

    fn texel_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(bytemuck::cast_slice(&self.samples))
    }
}

/// Nucleotide base indices, one byte per base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencePayload {
    bases: Vec<u8>,
}

impl SequencePayload {
    pub fn new(bases: Vec<u8>) -> Self {
        Self { bases }
    }

    /// Encode an ASCII sequence as base indices (A=0, C=1, G=2, T=3, other=4).
    pub fn from_ascii(sequence: &[u8]) -> Self {
        let bases = sequence
            .iter()
            .map(|b| match b.to_ascii_uppercase() {
                b'A' => 0,
                b'C' => 1,
                b'G' => 2,
                b'T' => 3,
                _ => 4,
            })
            .collect();
        Self { bases }
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }
}

impl TilePayload for SequencePayload {
    const TEXEL_FORMAT: TexelFormat = TexelFormat::R8Unorm;

    fn sample_count(&self) -> usize {
        self.bases.len()
    }

    fn texel_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.bases)
    }
}
