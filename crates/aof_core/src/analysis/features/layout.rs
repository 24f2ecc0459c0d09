//! Static description of the per-frame feature vector.

use serde::{Deserialize, Serialize};

/// One kind of sub-feature in a frame vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Standardized cepstral coefficients.
    Cepstral,
    /// Frame RMS energy.
    Energy,
    /// Spectral rolloff over sample rate.
    Rolloff,
    /// Spectral centroid over sample rate.
    Centroid,
    /// Chroma energy profile.
    Chroma,
    /// Onset strength.
    OnsetStrength,
    /// Predominant local pulse.
    Pulse,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Cepstral => write!(f, "cepstral"),
            FeatureKind::Energy => write!(f, "energy"),
            FeatureKind::Rolloff => write!(f, "rolloff"),
            FeatureKind::Centroid => write!(f, "centroid"),
            FeatureKind::Chroma => write!(f, "chroma"),
            FeatureKind::OnsetStrength => write!(f, "onset strength"),
            FeatureKind::Pulse => write!(f, "pulse"),
        }
    }
}

/// A contiguous run of columns holding one sub-feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureBlock {
    pub kind: FeatureKind,
    /// First column of the block.
    pub offset: usize,
    /// Number of columns.
    pub width: usize,
}

impl FeatureBlock {
    /// Column range covered by the block.
    pub fn columns(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.width
    }
}

/// Ordered list of sub-features with fixed widths.
///
/// Built once per extractor; the total dimension never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    blocks: Vec<FeatureBlock>,
    dimension: usize,
}

impl FeatureLayout {
    /// Layout with `n_mfcc` cepstral and `n_chroma` chroma columns.
    ///
    /// Order: cepstral, energy, rolloff, centroid, chroma, onset strength, pulse.
    pub fn new(n_mfcc: usize, n_chroma: usize) -> Self {
        let widths = [
            (FeatureKind::Cepstral, n_mfcc),
            (FeatureKind::Energy, 1),
            (FeatureKind::Rolloff, 1),
            (FeatureKind::Centroid, 1),
            (FeatureKind::Chroma, n_chroma),
            (FeatureKind::OnsetStrength, 1),
            (FeatureKind::Pulse, 1),
        ];

        let mut blocks = Vec::with_capacity(widths.len());
        let mut offset = 0;
        for (kind, width) in widths {
            blocks.push(FeatureBlock {
                kind,
                offset,
                width,
            });
            offset += width;
        }

        Self {
            blocks,
            dimension: offset,
        }
    }

    /// Total number of columns.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Blocks in column order.
    pub fn blocks(&self) -> &[FeatureBlock] {
        &self.blocks
    }

    /// Find the block for `kind`.
    pub fn block(&self, kind: FeatureKind) -> Option<&FeatureBlock> {
        self.blocks.iter().find(|b| b.kind == kind)
    }

    /// Find the block containing `column`.
    pub fn block_at(&self, column: usize) -> Option<&FeatureBlock> {
        self.blocks.iter().find(|b| b.columns().contains(&column))
    }
}
