use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Error, Prediction, Result};

/// Number of label/score pairs in a successful response.
pub const TOP_RESULTS: usize = 5;

/// Status/body envelope returned to the gateway. `body` is itself JSON: a
/// single encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl Response {
    /// `label1&score1&...&label5&score5`, in the order given.
    pub fn success(predictions: &[Prediction]) -> Result<Self> {
        if predictions.len() < TOP_RESULTS {
            return Err(Error::NotEnoughPredictions {
                found: predictions.len(),
                required: TOP_RESULTS,
            });
        }

        let text = predictions
            .iter()
            .take(TOP_RESULTS)
            .map(|p| format!("{}&{}", p.label, p.confidence()))
            .collect::<Vec<_>>()
            .join("&");

        Ok(Response {
            status_code: 200,
            body: json_string(&text),
        })
    }

    pub fn failure(err: &impl Display) -> Self {
        Response {
            status_code: 500,
            body: json_string(&err.to_string()),
        }
    }

    /// The body with its JSON string encoding removed.
    pub fn text(&self) -> Option<String> {
        serde_json::from_str(&self.body).ok()
    }
}

fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_owned()).to_string()
}
