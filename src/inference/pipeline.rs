//! Validate, classify, and label feature rows

use super::{
    ClassificationResult, Classifier, FeatureBatch, FeatureVector, ModelGate, ThreatLabel,
    CLASS_COUNT,
};
use crate::error::{GuardError, GuardResult};
use crate::utils::Logger;
use std::sync::Arc;
use std::time::Instant;

/// Index of the largest score. Ties go to the lowest index.
///
/// Returns 0 for an empty slice. NaN scores never win.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] || (scores[best].is_nan() && !score.is_nan()) {
            best = i;
        }
    }
    best
}

/// Runs validated batches through a shared classifier
#[derive(Clone)]
pub struct InferencePipeline {
    classifier: Arc<dyn Classifier>,
}

impl InferencePipeline {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Pipeline over the gate's classifier, loading it if needed
    pub fn from_gate(gate: &ModelGate) -> GuardResult<Self> {
        Ok(Self::new(gate.get()?))
    }

    /// Label every row of the batch, in input order
    pub fn classify(&self, batch: &FeatureBatch) -> GuardResult<Vec<ClassificationResult>> {
        let started = Instant::now();
        let scores = self.classifier.infer(&batch.to_tensor())?;

        if scores.shape() != [batch.len(), CLASS_COUNT] {
            return Err(GuardError::Inference(format!(
                "classifier returned shape {:?}, expected [{}, {}]",
                scores.shape(),
                batch.len(),
                CLASS_COUNT
            )));
        }

        let results = batch
            .rows()
            .iter()
            .zip(scores.rows())
            .map(|(input, row)| {
                let mut distribution = [0.0f32; CLASS_COUNT];
                for (slot, score) in distribution.iter_mut().zip(row.iter()) {
                    *slot = *score;
                }
                let index = argmax(&distribution);
                ClassificationResult {
                    input: input.clone(),
                    label: ThreatLabel::ALL[index],
                    scores: distribution,
                    confidence: distribution[index],
                }
            })
            .collect::<Vec<_>>();

        Logger::log_classification(results.len(), started.elapsed());
        Ok(results)
    }

    pub fn classify_one(&self, vector: FeatureVector) -> GuardResult<ClassificationResult> {
        let mut results = self.classify(&FeatureBatch::single(vector))?;
        results
            .pop()
            .ok_or_else(|| GuardError::Inference("classifier returned no rows".to_string()))
    }

    /// Validate raw rows first; the classifier is never called on bad input
    pub fn classify_rows(&self, rows: Vec<Vec<f32>>) -> GuardResult<Vec<ClassificationResult>> {
        let batch = FeatureBatch::new(rows)?;
        self.classify(&batch)
    }

    /// Classify one comma-separated record
    pub fn classify_manual(&self, input: &str) -> GuardResult<ClassificationResult> {
        let vector = FeatureVector::parse_manual(input)?;
        self.classify_one(vector)
    }
}

impl std::fmt::Debug for InferencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferencePipeline").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::inference::FEATURE_COUNT;
    use ndarray::{Array2, Array3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores each row by the class index stored in its first feature
    struct FirstFeature {
        calls: AtomicUsize,
    }

    impl FirstFeature {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0) })
        }
    }

    impl Classifier for FirstFeature {
        fn infer(&self, input: &Array3<f32>) -> GuardResult<Array2<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rows = input.shape()[0];
            let mut scores = Array2::from_elem((rows, CLASS_COUNT), 0.05);
            for row in 0..rows {
                let class = input[[row, 0, 0]] as usize % CLASS_COUNT;
                scores[[row, class]] = 0.8;
            }
            Ok(scores)
        }
    }

    struct WrongShape;

    impl Classifier for WrongShape {
        fn infer(&self, _input: &Array3<f32>) -> GuardResult<Array2<f32>> {
            Ok(Array2::zeros((1, 3)))
        }
    }

    fn row(first: f32) -> Vec<f32> {
        let mut values = vec![0.0; FEATURE_COUNT];
        values[0] = first;
        values
    }

    #[test]
    fn test_argmax_first_maximum_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.1, 0.05, 0.05]), 1);
        assert_eq!(argmax(&[0.2, 0.2, 0.2, 0.2, 0.2]), 0);
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1, 0.0]), 1);
        assert_eq!(argmax(&[f32::NAN, 0.1, 0.3]), 2);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_labels_follow_input_order() {
        let classifier = FirstFeature::new();
        let pipeline = InferencePipeline::new(classifier.clone());

        let results = pipeline.classify_rows(vec![row(1.0), row(0.0), row(4.0)]).unwrap();
        let labels: Vec<ThreatLabel> = results.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![ThreatLabel::Dos, ThreatLabel::Normal, ThreatLabel::U2R]);
        assert!((results[0].confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_rows_never_reach_classifier() {
        let classifier = FirstFeature::new();
        let pipeline = InferencePipeline::new(classifier.clone());

        let err = pipeline.classify_rows(vec![row(1.0), vec![0.0; 31]]).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Validation(ValidationError::FeatureCount { expected: 32, found: 31 })
        ));

        let err = pipeline.classify_manual("1,2,x").unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_record() {
        let pipeline = InferencePipeline::new(FirstFeature::new());
        let mut values = vec!["0".to_string(); FEATURE_COUNT];
        values[0] = "2".to_string();
        let result = pipeline.classify_manual(&values.join(", ")).unwrap();
        assert_eq!(result.label, ThreatLabel::Probe);
        assert_eq!(result.input.as_slice()[0], 2.0);
    }

    #[test]
    fn test_unexpected_output_shape() {
        let pipeline = InferencePipeline::new(Arc::new(WrongShape));
        let err = pipeline.classify_one(FeatureVector::zeros()).unwrap_err();
        assert!(matches!(err, GuardError::Inference(_)));
    }

    #[test]
    fn test_from_gate_reports_missing_model() {
        let gate = ModelGate::new("Model.onnx", |path| {
            Err(GuardError::model_unavailable(path.display().to_string(), "file not found"))
        });
        assert!(matches!(
            InferencePipeline::from_gate(&gate),
            Err(GuardError::ModelUnavailable { .. })
        ));
    }
}
