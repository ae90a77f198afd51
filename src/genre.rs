// Optional genre classification from time-averaged MFCCs.
//
// The classifier artifact is loaded once at start-up and handed to every request
// as an immutable shared handle. When no artifact exists, or inference fails for
// a clip, the genre is reported as "Unknown" and the request carries on.

use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::audio::decoder::MonoAudio;
use crate::audio::mfcc::{mean_mfcc, N_MFCC};
use crate::error::ClassifierError;

/// Genre reported whenever classification is unavailable or fails.
pub const UNKNOWN_GENRE: &str = "Unknown";

/// A model that maps a single MFCC-mean vector to a genre label.
pub trait GenreModel: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<String, ClassifierError>;
}

/// ONNX genre model with input `[1, 40]` f32.
///
/// The first output is read either as per-class scores (argmax) or as an int64
/// class index. Class indices are mapped through `<model>.labels.json`, a JSON
/// array of genre names stored beside the model.
pub struct OnnxGenreModel {
    // `Session::run` needs `&mut self`
    session: Mutex<Session>,
    labels: Vec<String>,
}

impl OnnxGenreModel {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| ClassifierError::Load(e.to_string()))?;

        let labels_path = labels_path_for(path);
        let labels = match std::fs::read_to_string(&labels_path) {
            Ok(json) => serde_json::from_str::<Vec<String>>(&json).map_err(|e| {
                ClassifierError::Load(format!("invalid label file {:?}: {}", labels_path, e))
            })?,
            Err(_) => {
                tracing::warn!(
                    "No label file at {:?}, genres will be reported as class indices",
                    labels_path
                );
                Vec::new()
            }
        };

        Ok(Self {
            session: Mutex::new(session),
            labels,
        })
    }

    fn label_for(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }
}

impl GenreModel for OnnxGenreModel {
    fn predict(&self, features: &[f32]) -> Result<String, ClassifierError> {
        let input = Tensor::from_array(([1usize, features.len()], features.to_vec()))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("model lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let (_, value) = outputs.iter().next().ok_or(ClassifierError::NoScores)?;

        if let Ok((_, scores)) = value.try_extract_tensor::<f32>() {
            let index = argmax(scores).ok_or(ClassifierError::NoScores)?;
            return Ok(self.label_for(index));
        }

        let (_, classes) = value
            .try_extract_tensor::<i64>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let class = *classes.first().ok_or(ClassifierError::NoScores)?;
        Ok(self.label_for(class.max(0) as usize))
    }
}

fn labels_path_for(model_path: &Path) -> PathBuf {
    model_path.with_extension("labels.json")
}

fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Handle to the optional genre model. Cheap to clone, shared across requests.
#[derive(Clone, Default)]
pub struct GenreClassifier {
    model: Option<Arc<dyn GenreModel>>,
}

impl GenreClassifier {
    /// Classifier that always answers "Unknown".
    pub fn disabled() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: Arc<dyn GenreModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Load the model at `path` if it exists. A missing or unloadable artifact
    /// yields a disabled classifier.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!(
                "Genre model not found at {:?}, genre will be reported as \"{}\"",
                path,
                UNKNOWN_GENRE
            );
            return Self::disabled();
        }

        match OnnxGenreModel::load(path) {
            Ok(model) => {
                tracing::debug!("Genre model loaded from {:?}", path);
                Self::with_model(Arc::new(model))
            }
            Err(e) => {
                tracing::error!("{}", e);
                Self::disabled()
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.model.is_some()
    }

    /// Genre for a clip, or "Unknown" when disabled or on any failure.
    pub fn classify(&self, audio: &MonoAudio) -> String {
        let Some(model) = &self.model else {
            return UNKNOWN_GENRE.to_string();
        };

        let features = mean_mfcc(audio);
        debug_assert_eq!(features.len(), N_MFCC);

        match model.predict(&features) {
            Ok(genre) => genre,
            Err(e) => {
                tracing::error!("Genre detection failed: {}", e);
                UNKNOWN_GENRE.to_string()
            }
        }
    }
}
