use std::error::Error;
use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;
use tf_upload::{
    Classifier, LabelIndex, MemoryStore, ObjectStore, Pipeline, S3Store, SavedModel, Settings,
    UploadEvent,
};

use log::info;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "tf-classify",
    about = "Run an image upload through the classification pipeline locally"
)]
struct CmdArgs {
    #[structopt(help = "Image file, or recorded gateway event with --event")]
    input: PathBuf,

    #[structopt(long, help = "Treat the input as a gateway event JSON file")]
    event: bool,

    #[structopt(long, help = "Upload the archive copy to the configured bucket")]
    archive: bool,

    #[structopt(long, help = "Export directory of TensorFlow SavedModel")]
    model_dir: Option<PathBuf>,

    #[structopt(long, help = "Path to the JSON class index")]
    class_index: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let mut settings = Settings::load()?;
    if let Some(model_dir) = args.model_dir {
        settings.model_dir = model_dir;
    }
    if let Some(class_index) = args.class_index {
        settings.class_index = class_index;
    }

    let event = if args.event {
        serde_json::from_str(&fs::read_to_string(&args.input)?)?
    } else {
        let data = fs::read(&args.input)?;
        let filename = args
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        UploadEvent::from_file(&filename, "application/octet-stream", &data)
    };

    let classifier = Classifier::new(
        SavedModel::load(&settings.model_dir, &settings.signature)?,
        LabelIndex::load(&settings.class_index)?,
        settings.top_k,
    );

    let response = if args.archive {
        let store = S3Store::from_env().await;
        run(classifier, settings.archiver(store), &settings, &event).await
    } else {
        run::<MemoryStore>(classifier, None, &settings, &event).await
    };

    info!("Status {}", response.status_code);
    println!("{}", serde_json::to_string(&response)?);

    Ok(())
}

async fn run<S: ObjectStore>(
    classifier: Classifier<SavedModel>,
    archiver: Option<tf_upload::Archiver<S>>,
    settings: &Settings,
    event: &UploadEvent,
) -> tf_upload::Response {
    Pipeline::new(classifier, archiver, settings.normalization)
        .handle(event)
        .await
}
