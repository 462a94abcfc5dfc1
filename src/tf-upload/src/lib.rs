//! Classify images uploaded through an API gateway.
//!
//! An upload arrives as a base64-encoded multipart body. The first part is
//! decoded into an image, archived unmodified to object storage, resized and
//! normalized for the model, classified, and answered with the five most
//! likely labels.

mod archive;
mod classify;
mod error;
mod preprocess;
mod response;
#[cfg(feature = "tensorflow")]
mod saved_model;
mod settings;
mod timer;
mod upload;

pub mod request;

pub use archive::{archive_key, Archiver, MemoryStore, ObjectStore, PutObject, S3Store};
pub use classify::{decode_predictions, top_k, Classifier, LabelIndex, Model, Prediction};
pub use error::{Error, Result};
pub use preprocess::{preprocess, InputTensor, Normalization, CHANNELS, INPUT_SIZE};
pub use request::UploadEvent;
pub use response::{Response, TOP_RESULTS};
#[cfg(feature = "tensorflow")]
pub use saved_model::SavedModel;
pub use settings::Settings;
pub use timer::Timer;
pub use upload::UploadedImage;

use log::{error, info};

/// The whole request path: decode, archive, preprocess, classify, respond.
pub struct Pipeline<S, M> {
    archiver: Option<Archiver<S>>,
    classifier: Classifier<M>,
    normalization: Normalization,
}

impl<S: ObjectStore, M: Model> Pipeline<S, M> {
    pub fn new(
        classifier: Classifier<M>,
        archiver: Option<Archiver<S>>,
        normalization: Normalization,
    ) -> Self {
        Pipeline {
            archiver,
            classifier,
            normalization,
        }
    }

    pub fn archiver(&self) -> Option<&Archiver<S>> {
        self.archiver.as_ref()
    }

    /// Answer one upload. Failures of any stage become a 500 response
    /// carrying the error text.
    pub async fn handle(&self, event: &UploadEvent) -> Response {
        let mut t = Timer::new_start("Handling request");

        let response = match self
            .predict(event)
            .await
            .and_then(|predictions| Response::success(&predictions))
        {
            Ok(response) => response,
            Err(err) => {
                error!("Request failed: {}", err);
                Response::failure(&err)
            }
        };

        t.stop();

        response
    }

    /// Ranked predictions for the image carried by `event`.
    pub async fn predict(&self, event: &UploadEvent) -> Result<Vec<Prediction>> {
        let bytes = request::extract_image(&event.body_json).await?;
        let upload = UploadedImage::from_bytes(bytes)?;

        let (width, height) = upload.dimensions();
        info!(
            "Received {} image, {}x{}",
            upload.format_name(),
            width,
            height
        );

        if let Some(archiver) = &self.archiver {
            archiver.archive(&upload).await?;
        }

        let input = preprocess(upload.image(), self.normalization);

        self.classifier.classify(&input)
    }
}
