//! Intrusion classification
//!
//! Feature rows (32 values each) are validated, laid out as a
//! `(batch, 32, 1)` tensor for the classifier's 1-D convolution, scored, and
//! mapped to one of five traffic labels.

pub mod features;
pub mod model;
pub mod pipeline;

use crate::error::GuardResult;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

pub use features::{FeatureBatch, FeatureVector};
pub use model::ModelGate;
#[cfg(feature = "onnx")]
pub use model::OnnxClassifier;
pub use pipeline::{argmax, InferencePipeline};

/// Values per feature row
pub const FEATURE_COUNT: usize = 32;

/// Classes in the classifier output
pub const CLASS_COUNT: usize = 5;

/// Intrusion categories, in the classifier's output index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatLabel {
    Normal,
    Dos,
    Probe,
    R2L,
    U2R,
}

impl ThreatLabel {
    /// All labels by output index. Part of the artifact contract.
    pub const ALL: [ThreatLabel; CLASS_COUNT] = [
        ThreatLabel::Normal,
        ThreatLabel::Dos,
        ThreatLabel::Probe,
        ThreatLabel::R2L,
        ThreatLabel::U2R,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLabel::Normal => "Normal",
            ThreatLabel::Dos => "Dos",
            ThreatLabel::Probe => "Probe",
            ThreatLabel::R2L => "R2L",
            ThreatLabel::U2R => "U2R",
        }
    }

    pub fn is_attack(&self) -> bool {
        *self != ThreatLabel::Normal
    }
}

impl std::fmt::Display for ThreatLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-trained classifier.
///
/// Takes a `(batch, 32, 1)` tensor and returns a `(batch, 5)` distribution
/// whose columns follow [`ThreatLabel::ALL`]. Implementations are shared
/// between threads and must tolerate concurrent calls.
pub trait Classifier: Send + Sync {
    fn infer(&self, input: &Array3<f32>) -> GuardResult<Array2<f32>>;
}

/// Label assigned to one feature row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub input: FeatureVector,
    pub label: ThreatLabel,
    /// Raw class distribution, indexed like [`ThreatLabel::ALL`]
    pub scores: [f32; CLASS_COUNT],
    /// Score of the winning label
    pub confidence: f32,
}

/// Number of results per label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    counts: [usize; CLASS_COUNT],
}

impl LabelSummary {
    pub fn from_results(results: &[ClassificationResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.counts[result.label.index()] += 1;
        }
        summary
    }

    pub fn count(&self, label: ThreatLabel) -> usize {
        self.counts[label.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Rows labelled as anything but Normal
    pub fn attacks(&self) -> usize {
        self.total() - self.count(ThreatLabel::Normal)
    }

    /// (label, count) pairs in label order, zero counts included
    pub fn iter(&self) -> impl Iterator<Item = (ThreatLabel, usize)> + '_ {
        ThreatLabel::ALL.iter().map(move |label| (*label, self.count(*label)))
    }
}
