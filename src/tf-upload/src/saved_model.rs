use std::path::Path;

use log::debug;
use tensorflow::{Graph, SavedModelBundle, SessionOptions, SessionRunArgs, Tensor};

use crate::{Error, InputTensor, Model, Result, Timer};

/// Tag the Keras/TF2 exporters give to the serving meta graph.
const SERVE_TAG: &str = "serve";

/// A TensorFlow SavedModel with a single-input, single-output signature.
pub struct SavedModel {
    /// TensorFlow model graph
    graph: Graph,

    /// Loaded bundle, owns the session
    bundle: SavedModelBundle,

    /// Operation name and output index fed with the image batch
    input: (String, i32),

    /// Operation name and output index holding the class scores
    output: (String, i32),
}

impl SavedModel {
    pub fn load(export_dir: &Path, signature: &str) -> Result<Self> {
        let mut t = Timer::new_start("Loading saved model");

        let mut graph = Graph::new();
        let bundle =
            SavedModelBundle::load(&SessionOptions::new(), &[SERVE_TAG], &mut graph, export_dir)?;

        let (input, output) = {
            let sig = bundle.meta_graph_def().get_signature(signature)?;

            let input = sig.inputs().values().next().ok_or_else(|| {
                Error::Model(format!("signature '{}' has no inputs", signature))
            })?;
            let output = sig.outputs().values().next().ok_or_else(|| {
                Error::Model(format!("signature '{}' has no outputs", signature))
            })?;

            (
                (input.name().name.clone(), input.name().index),
                (output.name().name.clone(), output.name().index),
            )
        };

        debug!(
            "Signature '{}': input {}:{}, output {}:{}",
            signature, input.0, input.1, output.0, output.1
        );

        t.stop();

        Ok(SavedModel {
            graph,
            bundle,
            input,
            output,
        })
    }
}

impl Model for SavedModel {
    fn predict(&self, image: &InputTensor) -> Result<Vec<Vec<f32>>> {
        let mut t = Timer::new_start("Running session");

        let input = Tensor::new(&image.dims()).with_values(image.data())?;

        let mut args = SessionRunArgs::new();

        args.add_feed(
            &self.graph.operation_by_name_required(&self.input.0)?,
            self.input.1,
            &input,
        );

        let result = args.request_fetch(
            &self.graph.operation_by_name_required(&self.output.0)?,
            self.output.1,
        );

        self.bundle.session.run(&mut args)?;
        let output: Tensor<f32> = args.fetch(result)?;

        t.stop();

        let classes = output.dims().last().copied().unwrap_or(0) as usize;
        if classes == 0 {
            return Err(Error::Model(format!(
                "unexpected output shape {:?}",
                output.dims()
            )));
        }

        Ok(output.chunks(classes).map(<[f32]>::to_vec).collect())
    }
}
