use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::debug;
use std::sync::Arc;
use tf_upload::{
    Classifier, LabelIndex, Model, ObjectStore, Pipeline, Response, S3Store, SavedModel, Settings,
    UploadEvent,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let settings = Settings::load()?;
    debug!("Settings: {:?}", settings);

    let model = SavedModel::load(&settings.model_dir, &settings.signature)?;
    let labels = LabelIndex::load(&settings.class_index)?;
    let classifier = Classifier::new(model, labels, settings.top_k);

    debug!("Loaded model in memory");

    let store = S3Store::from_env().await;
    let pipeline = Arc::new(Pipeline::new(
        classifier,
        settings.archiver(store),
        settings.normalization,
    ));

    debug!("Dispatching handler");
    lambda_runtime::run(service_fn(move |event: LambdaEvent<UploadEvent>| {
        let pipeline = Arc::clone(&pipeline);
        async move { handle_request(event, pipeline.as_ref()).await }
    }))
    .await?;

    Ok(())
}

async fn handle_request<S: ObjectStore, M: Model>(
    event: LambdaEvent<UploadEvent>,
    pipeline: &Pipeline<S, M>,
) -> Result<Response, Error> {
    debug!("Inside handler, request id {}", event.context.request_id);

    let response = pipeline.handle(&event.payload).await;

    debug!(
        "Responding with status {}: {}",
        response.status_code, response.body
    );

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_runtime::Context;
    use tf_upload::{InputTensor, MemoryStore, Normalization};

    struct Uniform(usize);

    impl Model for Uniform {
        fn predict(&self, _input: &InputTensor) -> tf_upload::Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0 / self.0 as f32; self.0]])
        }
    }

    fn labels(n: usize) -> LabelIndex {
        let entries: Vec<String> = (0..n)
            .map(|i| format!("\"{}\": [\"n{:08}\", \"class {}\"]", i, i, i))
            .collect();
        LabelIndex::from_json(&format!("{{{}}}", entries.join(", "))).unwrap()
    }

    #[tokio::test]
    async fn bad_payload_becomes_500_envelope() {
        let pipeline: Pipeline<MemoryStore, _> = Pipeline::new(
            Classifier::new(Uniform(10), labels(10), 5),
            None,
            Normalization::MobileNet,
        );
        let payload: UploadEvent =
            serde_json::from_value(serde_json::json!({"body-json": "@@@"})).unwrap();

        let response = handle_request(LambdaEvent::new(payload, Context::default()), &pipeline)
            .await
            .unwrap();

        assert_eq!(response.status_code, 500);
        let envelope = serde_json::to_value(&response).unwrap();
        assert_eq!(envelope["statusCode"], 500);
        assert!(envelope["body"].as_str().unwrap().starts_with('"'));
    }
}
