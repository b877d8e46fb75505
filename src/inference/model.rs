//! Classifier artifact loading

use super::Classifier;
use crate::config::ModelConfig;
use crate::error::{GuardError, GuardResult};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Loader = Box<dyn Fn(&Path) -> GuardResult<Arc<dyn Classifier>> + Send + Sync>;

/// Loads the classifier on first use and shares it afterwards.
///
/// Concurrent first callers block until one load finishes, so the artifact is
/// loaded at most once. A failed load is not cached: every later call retries
/// and reports `ModelUnavailable` again until the artifact can be read.
pub struct ModelGate {
    path: PathBuf,
    loader: Loader,
    cell: OnceCell<Arc<dyn Classifier>>,
}

impl ModelGate {
    pub fn new<F>(path: impl Into<PathBuf>, loader: F) -> Self
    where
        F: Fn(&Path) -> GuardResult<Arc<dyn Classifier>> + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            loader: Box::new(loader),
            cell: OnceCell::new(),
        }
    }

    /// Gate over the ONNX artifact named in the config
    #[cfg(feature = "onnx")]
    pub fn from_config(config: &ModelConfig) -> Self {
        let threads = config.intra_threads;
        Self::new(config.path.clone(), move |path| {
            let classifier = OnnxClassifier::load(path, threads)?;
            Ok(Arc::new(classifier) as Arc<dyn Classifier>)
        })
    }

    /// Without the `onnx` feature no artifact can be executed
    #[cfg(not(feature = "onnx"))]
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.path.clone(), |path| {
            Err(GuardError::model_unavailable(
                path.display().to_string(),
                "built without ONNX runtime support",
            ))
        })
    }

    /// Gate that is already loaded with `classifier`
    pub fn preloaded(path: impl Into<PathBuf>, classifier: Arc<dyn Classifier>) -> Self {
        let gate = Self::new(path, |path| {
            Err(GuardError::model_unavailable(path.display().to_string(), "no loader"))
        });
        // A fresh cell cannot already be set
        let _ = gate.cell.set(classifier);
        gate
    }

    /// Shared classifier, loading it if this is the first call
    pub fn get(&self) -> GuardResult<Arc<dyn Classifier>> {
        self.cell
            .get_or_try_init(|| {
                log::info!("Loading classifier from {}", self.path.display());
                (self.loader)(&self.path).map_err(|e| match e {
                    GuardError::ModelUnavailable { .. } => e,
                    other => GuardError::model_unavailable(self.path.display().to_string(), other),
                })
            })
            .map(Arc::clone)
            .map_err(|e| {
                log::error!("{}", e);
                e
            })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ModelGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGate")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use super::super::{Classifier, CLASS_COUNT};
    use crate::error::{GuardError, GuardResult};
    use anyhow::Context;
    use ndarray::{Array2, Array3, Ix2};
    use ort::session::Session;
    use ort::value::TensorRef;
    use std::path::Path;
    use std::sync::Mutex;

    /// ONNX Runtime session over the exported classifier
    pub struct OnnxClassifier {
        // `Session::run` needs exclusive access
        session: Mutex<Session>,
        input_name: String,
        output_name: String,
    }

    impl OnnxClassifier {
        pub fn load(path: &Path, intra_threads: usize) -> GuardResult<Self> {
            Self::open(path, intra_threads)
                .map_err(|e| GuardError::model_unavailable(path.display().to_string(), format!("{:#}", e)))
        }

        fn open(path: &Path, intra_threads: usize) -> anyhow::Result<Self> {
            if !path.is_file() {
                anyhow::bail!("file not found");
            }

            let session = Session::builder()?
                .with_intra_threads(intra_threads.max(1))?
                .commit_from_file(path)
                .context("failed to load ONNX model")?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .context("model declares no inputs")?;
            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .context("model declares no outputs")?;

            log::debug!("ONNX session ready: {} -> {}", input_name, output_name);

            Ok(Self {
                session: Mutex::new(session),
                input_name,
                output_name,
            })
        }

        fn run(&self, input: &Array3<f32>) -> anyhow::Result<Array2<f32>> {
            let tensor = TensorRef::from_array_view(input)?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("lock error: {e}"))?;
            let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

            let scores = outputs[self.output_name.as_str()]
                .try_extract_array::<f32>()?
                .into_dimensionality::<Ix2>()
                .context("classifier output is not a matrix")?
                .to_owned();

            if scores.ncols() != CLASS_COUNT {
                anyhow::bail!("classifier produced {} classes, expected {}", scores.ncols(), CLASS_COUNT);
            }
            Ok(scores)
        }
    }

    impl Classifier for OnnxClassifier {
        fn infer(&self, input: &Array3<f32>) -> GuardResult<Array2<f32>> {
            self.run(input).map_err(|e| GuardError::Inference(format!("{:#}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Uniform;

    impl Classifier for Uniform {
        fn infer(&self, input: &Array3<f32>) -> GuardResult<Array2<f32>> {
            Ok(Array2::from_elem((input.shape()[0], 5), 0.2))
        }
    }

    #[test]
    fn test_failed_load_is_retried_every_call() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let gate = ModelGate::new("missing.onnx", move |path| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(GuardError::model_unavailable(path.display().to_string(), "file not found"))
        });

        for _ in 0..3 {
            assert!(matches!(gate.get(), Err(GuardError::ModelUnavailable { .. })));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(!gate.is_loaded());
    }

    #[test]
    fn test_successful_load_happens_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let gate = ModelGate::new("Model.onnx", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Uniform) as Arc<dyn Classifier>)
        });

        let first = gate.get().unwrap();
        let second = gate.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(gate.is_loaded());
    }

    #[test]
    fn test_other_load_errors_become_model_unavailable() {
        let gate = ModelGate::new("Model.onnx", |_| Err(GuardError::Inference("bad graph".to_string())));
        match gate.get() {
            Err(GuardError::ModelUnavailable { path, reason }) => {
                assert_eq!(path, "Model.onnx");
                assert!(reason.contains("bad graph"));
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_artifact_from_config() {
        let config = ModelConfig {
            path: PathBuf::from("/nonexistent/cityguard/Model.onnx"),
            ..ModelConfig::default()
        };
        let gate = ModelGate::from_config(&config);
        assert!(matches!(gate.get(), Err(GuardError::ModelUnavailable { .. })));
        assert!(matches!(gate.get(), Err(GuardError::ModelUnavailable { .. })));
    }

    #[test]
    fn test_preloaded_gate() {
        let gate = ModelGate::preloaded("in-memory", Arc::new(Uniform));
        assert!(gate.is_loaded());
        assert!(gate.get().is_ok());
    }
}
