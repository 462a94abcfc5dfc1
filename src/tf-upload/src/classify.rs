use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::{Error, InputTensor, Result};

/// A pretrained classifier: one row of per-class scores for every image in
/// the input batch.
pub trait Model {
    fn predict(&self, input: &InputTensor) -> Result<Vec<Vec<f32>>>;
}

/// Class index -> (class id, label), as shipped in `imagenet_class_index.json`.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    entries: HashMap<String, (String, String)>,
}

impl LabelIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let failure = |reason: String| Error::LabelIndex {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path).map_err(|e| failure(e.to_string()))?;
        let index = Self::from_json(&raw).map_err(|e| failure(e.to_string()))?;

        debug!("Loaded {} labels from {}", index.len(), path.display());

        Ok(index)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        Ok(LabelIndex {
            entries: serde_json::from_str(raw)?,
        })
    }

    pub fn get(&self, class: usize) -> Option<(&str, &str)> {
        self.entries
            .get(&class.to_string())
            .map(|(id, label)| (id.as_str(), label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One ranked class of a classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_id: String,
    pub label: String,
    pub score: f32,
}

impl Prediction {
    /// Score as a percentage rounded to 4 decimals, e.g. `87.1234%`, `50.0%`.
    pub fn confidence(&self) -> String {
        let percent = (f64::from(self.score) * 100.0 * 10_000.0).round() / 10_000.0;

        if percent.fract() == 0.0 {
            format!("{:.1}%", percent)
        } else {
            format!("{}%", percent)
        }
    }
}

/// Indices of the `k` highest scores, highest first.
///
/// Indices are stably sorted by ascending score and the last `k` taken in
/// reverse, so equal scores come out with the higher index first.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    indices.into_iter().rev().take(k).collect()
}

/// Top `k` predictions for every row of model output.
pub fn decode_predictions(
    rows: &[Vec<f32>],
    labels: &LabelIndex,
    k: usize,
) -> Result<Vec<Vec<Prediction>>> {
    rows.iter()
        .map(|scores| {
            let mut result = top_k(scores, k)
                .into_iter()
                .map(|class| {
                    let (class_id, label) = labels.get(class).ok_or(Error::UnknownClass(class))?;
                    Ok(Prediction {
                        class_id: class_id.to_owned(),
                        label: label.to_owned(),
                        score: scores[class],
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            result.sort_by(|a, b| b.score.total_cmp(&a.score));

            Ok(result)
        })
        .collect()
}

/// A model together with the labels of its classes.
pub struct Classifier<M> {
    model: M,
    labels: LabelIndex,
    top: usize,
}

impl<M: Model> Classifier<M> {
    pub fn new(model: M, labels: LabelIndex, top: usize) -> Self {
        Classifier { model, labels, top }
    }

    /// Ranked predictions for the single image in `input`.
    pub fn classify(&self, input: &InputTensor) -> Result<Vec<Prediction>> {
        let rows = self.model.predict(input)?;

        decode_predictions(&rows, &self.labels, self.top)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("model returned no output rows".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{label_index, FixedScores};
    use crate::{preprocess, Normalization};
    use image::{DynamicImage, RgbImage};
    use std::io::Write;

    fn prediction(score: f32) -> Prediction {
        Prediction {
            class_id: "n0".into(),
            label: "x".into(),
            score,
        }
    }

    #[test]
    fn top_k_orders_by_descending_score() {
        let scores = [0.05, 0.4, 0.01, 0.3, 0.2, 0.04];
        assert_eq!(top_k(&scores, 3), vec![1, 3, 4]);
        assert_eq!(top_k(&scores, 10).len(), 6);
    }

    #[test]
    fn top_k_ties_list_higher_index_first() {
        let scores = [0.1, 0.5, 0.5, 0.2, 0.5];
        assert_eq!(top_k(&scores, 4), vec![4, 2, 1, 3]);
    }

    #[test]
    fn confidence_is_rounded_percentage() {
        assert_eq!(prediction(0.871234).confidence(), "87.1234%");
        assert_eq!(prediction(0.5).confidence(), "50.0%");
        assert_eq!(prediction(1.0).confidence(), "100.0%");
        assert_eq!(prediction(0.00001234).confidence(), "0.0012%");
        assert_eq!(prediction(0.0).confidence(), "0.0%");
        assert_eq!(prediction(0.123456789).confidence(), "12.3457%");
    }

    #[test]
    fn decode_looks_up_labels_by_index() {
        let labels = label_index(4);
        let rows = vec![vec![0.1, 0.6, 0.0, 0.3]];

        let decoded = decode_predictions(&rows, &labels, 2).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(
            decoded[0],
            vec![
                Prediction {
                    class_id: "n00000001".into(),
                    label: "label_1".into(),
                    score: 0.6,
                },
                Prediction {
                    class_id: "n00000003".into(),
                    label: "label_3".into(),
                    score: 0.3,
                },
            ]
        );
    }

    #[test]
    fn decode_fails_on_unknown_class() {
        let labels = label_index(2);
        let rows = vec![vec![0.1, 0.2, 0.7]];

        let err = decode_predictions(&rows, &labels, 2).unwrap_err();
        assert!(matches!(err, Error::UnknownClass(2)));
    }

    #[test]
    fn label_index_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"0": ["n01440764", "tench"], "1": ["n01443537", "goldfish"]}}"#
        )
        .unwrap();

        let labels = LabelIndex::load(file.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(1), Some(("n01443537", "goldfish")));
        assert_eq!(labels.get(2), None);
    }

    #[test]
    fn label_index_reports_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();

        let err = LabelIndex::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::LabelIndex { .. }));

        let missing = LabelIndex::load(Path::new("/nonexistent/class_index.json")).unwrap_err();
        assert!(matches!(missing, Error::LabelIndex { .. }));
    }

    #[test]
    fn classifier_returns_first_row() {
        let classifier = Classifier::new(
            FixedScores(vec![vec![0.2, 0.1, 0.7], vec![0.9, 0.05, 0.05]]),
            label_index(3),
            2,
        );
        let input = preprocess(
            &DynamicImage::ImageRgb8(RgbImage::new(2, 2)),
            Normalization::MobileNet,
        );

        let predictions = classifier.classify(&input).unwrap();
        let labels: Vec<&str> = predictions.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["label_2", "label_0"]);
    }

    #[test]
    fn classifier_without_output_rows_fails() {
        let classifier = Classifier::new(FixedScores(vec![]), label_index(3), 5);
        let input = preprocess(
            &DynamicImage::ImageRgb8(RgbImage::new(2, 2)),
            Normalization::MobileNet,
        );

        assert!(matches!(classifier.classify(&input), Err(Error::Model(_))));
    }
}
