use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use anyhow::Context;
use log::{info, warn};
use nl_codebase::data::bands::LsBands;
use nl_codebase::data::batcher::{Batch, Batcher};
use nl_codebase::models::resnet::{build_resnet, final_layer_prefix, first_conv_key, ModelParams};
use nl_codebase::nn::batch_config::ForwardMode;
use nl_codebase::nn::controller::NNController;
use nl_codebase::nn::loss::loss_func::LossFunc;
use nl_codebase::utils::GenericResult;
use serde::Serialize;
use crate::context::ComputeContext;
use crate::metrics::{EvalRecord, MetricsAccumulator, RegressionMetrics};
use crate::nl_preds::{expected_outputs, select_nl_preds, sensor_mask};
use crate::run_config::HsWeightInit;
use crate::weights::{find_checkpoint, load_storage, merge_pretrained, save_storage, PretrainedOptions, BEST_CHECKPOINT, LAST_CHECKPOINT};

pub const RESULTS_FILE: &str = "results.json";

/// The steps of a training run, sequenced by the run driver
pub trait EpochTrainer {
    /// Metrics over at most **max_batches** batches sampled from the training set
    fn eval_train(&mut self, max_batches: usize) -> GenericResult<RegressionMetrics>;
    /// Metrics over at most **max_batches** batches of the validation set, from its start
    fn eval_val(&mut self, max_batches: usize) -> GenericResult<RegressionMetrics>;
    /// Returns the mean training loss of the epoch
    fn train_epoch(&mut self, print_every: usize) -> GenericResult<f64>;
    fn log_results(&mut self) -> GenericResult<()>;
}

pub struct TrainerInputs<'a> {
    pub train: Batcher,
    pub train_eval: Batcher,
    pub val: Batcher,
    pub model_params: ModelParams,
    pub context: &'a ComputeContext,
    pub steps_per_epoch: f64,
    pub ls_bands: Option<LsBands>,
    pub lr: f32,
    pub lr_decay: f32,
    pub out_dir: PathBuf,
    pub init_ckpt_dir: Option<PathBuf>,
    pub imagenet_weights_path: Option<PathBuf>,
    pub hs_weight_init: Option<HsWeightInit>,
    pub exclude_final_layer: bool,
    /// Seeds the random initialization of the parameters missing from the checkpoint or weights
    pub seed: u64,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct TrainingHistory {
    /// Mean loss of every training epoch
    pub train_loss: Vec<f64>,
    pub train_eval: Vec<EvalRecord>,
    pub val: Vec<EvalRecord>,
    pub best_val_epoch: Option<usize>,
    pub best_val_r2: Option<f64>,
}

#[derive(Serialize)]
struct ResultsFile<'a> {
    epochs: usize,
    steps: u64,
    lr: f32,
    lr_decay: f32,
    final_train_eval: Option<&'a RegressionMetrics>,
    final_val: Option<&'a RegressionMetrics>,
    history: &'a TrainingHistory,
}

/// Trains one model on nightlights regression. The training, training-eval and validation
/// pipelines all go through the same controller, so they always see the same weights.
pub struct RegressionTrainer<'a> {
    train: Batcher,
    train_eval: Batcher,
    val: Batcher,
    controller: NNController,
    context: &'a ComputeContext,
    steps_per_epoch: f64,
    lr: f32,
    lr_decay: f32,
    out_dir: PathBuf,
    epoch: usize,
    history: TrainingHistory,
}

fn init_controller(inputs: &TrainerInputs) -> GenericResult<NNController> {
    let layer = build_resnet(&inputs.model_params)?;

    if let Some(dir) = &inputs.init_ckpt_dir {
        let path = find_checkpoint(dir)?;
        info!("Restoring weights from {}", path.display());
        return NNController::load_seeded(layer, LossFunc::Mse, load_storage(&path)?, inputs.seed);
    }

    if let Some(path) = &inputs.imagenet_weights_path {
        info!("Initializing weights from {}", path.display());
        let fresh = NNController::new_seeded(layer.clone(), LossFunc::Mse, inputs.seed)?.export();
        let first_conv = first_conv_key(&inputs.model_params);
        let options = PretrainedOptions {
            first_conv_key: &first_conv,
            ls_bands: inputs.ls_bands,
            hs_weight_init: inputs.hs_weight_init,
            exclude_final_layer: inputs.exclude_final_layer,
            final_layer_prefix: final_layer_prefix(),
        };
        let storage = merge_pretrained(fresh, load_storage(path)?, &options)?;
        return NNController::load_seeded(layer, LossFunc::Mse, storage, inputs.seed);
    }

    info!("Initializing weights randomly with seed {}", inputs.seed);
    NNController::new_seeded(layer, LossFunc::Mse, inputs.seed)
}

fn evaluate(batcher: &mut Batcher, controller: &NNController, context: &ComputeContext, max_batches: usize) -> GenericResult<RegressionMetrics> {
    let mut metrics = MetricsAccumulator::default();

    for _ in 0..max_batches {
        let batch = match batcher.next_batch()? {
            Some(v) => v,
            None => break,
        };
        let outputs = context.install(|| controller.forward(batch.images.into_dyn(), ForwardMode::Eval))?;
        let preds = select_nl_preds(&outputs, &batch.years)?;
        metrics.add(preds.view(), batch.labels.view());
    }

    Ok(metrics.finish())
}

fn describe(metrics: &RegressionMetrics) -> String {
    format!("loss={:.5} rmse={:.5} r2={:.4} R2={:.4} count={}",
            metrics.loss, metrics.rmse, metrics.r2, metrics.r2_score, metrics.count)
}

impl<'a> RegressionTrainer<'a> {
    /// Weights come from the checkpoint directory if given, else from the pretrained weights if
    /// given, else from a random initialization
    pub fn new(inputs: TrainerInputs<'a>) -> GenericResult<Self> {
        info!("Building model...");
        let controller = init_controller(&inputs)?;

        Ok(Self {
            controller,
            train: inputs.train,
            train_eval: inputs.train_eval,
            val: inputs.val,
            context: inputs.context,
            steps_per_epoch: inputs.steps_per_epoch,
            lr: inputs.lr,
            lr_decay: inputs.lr_decay,
            out_dir: inputs.out_dir,
            epoch: 0,
            history: TrainingHistory::default(),
        })
    }

    /// Rewinds the training and training-eval pipelines
    pub fn init_iterators(&mut self) {
        self.train.init();
        self.train_eval.init();
    }

    pub fn controller(&self) -> &NNController {
        &self.controller
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    fn train_step(&mut self, batch: Batch) -> GenericResult<f64> {
        let expected = expected_outputs(&batch.labels, &batch.years).into_dyn();
        let mask = sensor_mask(&batch.years).into_dyn();
        let controller = &mut self.controller;
        self.context.install(|| controller.train_batch_masked(batch.images.into_dyn(), &expected, &mask))
    }
}

impl<'a> EpochTrainer for RegressionTrainer<'a> {
    fn eval_train(&mut self, max_batches: usize) -> GenericResult<RegressionMetrics> {
        let metrics = evaluate(&mut self.train_eval, &self.controller, self.context, max_batches)?;
        info!("Epoch {} train eval: {}", self.epoch, describe(&metrics));
        self.history.train_eval.push(EvalRecord { epoch: self.epoch, metrics: metrics.clone() });
        Ok(metrics)
    }

    fn eval_val(&mut self, max_batches: usize) -> GenericResult<RegressionMetrics> {
        self.val.init();
        let metrics = evaluate(&mut self.val, &self.controller, self.context, max_batches)?;
        info!("Epoch {} val: {}", self.epoch, describe(&metrics));
        self.history.val.push(EvalRecord { epoch: self.epoch, metrics: metrics.clone() });

        let improved = metrics.count > 0 && self.history.best_val_r2.map_or(true, |best| metrics.r2 > best);
        if improved {
            self.history.best_val_r2 = Some(metrics.r2);
            self.history.best_val_epoch = Some(self.epoch);
            save_storage(&self.controller.export(), &self.out_dir.join(BEST_CHECKPOINT))?;
            info!("New best val r2 {:.4}", metrics.r2);
        }
        Ok(metrics)
    }

    fn train_epoch(&mut self, print_every: usize) -> GenericResult<f64> {
        let lr_multiplier = self.lr_decay.powi(self.epoch as i32);
        self.controller.set_lr_multiplier(lr_multiplier);
        info!("Start epoch {} with lr={:e}", self.epoch + 1, self.lr * lr_multiplier);

        let steps = self.steps_per_epoch.ceil() as usize;
        let mut total_loss = 0.0;
        let mut done = 0;
        while done < steps {
            let batch = match self.train.next_batch()? {
                Some(v) => v,
                None => {
                    warn!("Training pipeline ran out of batches after {} steps", done);
                    break;
                }
            };
            total_loss += self.train_step(batch)?;
            done += 1;

            if print_every != 0 && done % print_every == 0 {
                info!("    {} -> loss={:.5}", done, total_loss / done as f64);
            }
        }

        let avg_loss = if done == 0 { 0.0 } else { total_loss / done as f64 };
        self.epoch += 1;
        self.history.train_loss.push(avg_loss);
        save_storage(&self.controller.export(), &self.out_dir.join(LAST_CHECKPOINT))?;
        info!("Finished epoch {} with avg_loss={:.5}", self.epoch, avg_loss);
        Ok(avg_loss)
    }

    fn log_results(&mut self) -> GenericResult<()> {
        let results = ResultsFile {
            epochs: self.epoch,
            steps: self.controller.iterations(),
            lr: self.lr,
            lr_decay: self.lr_decay,
            final_train_eval: self.history.train_eval.last().map(|o| &o.metrics),
            final_val: self.history.val.last().map(|o| &o.metrics),
            history: &self.history,
        };

        let path = self.out_dir.join(RESULTS_FILE);
        let file = File::create(&path).with_context(|| format!("can't create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &results)?;

        match (results.final_val, self.history.best_val_epoch) {
            (Some(last), Some(best)) => info!("Final val: {}, best val r2 at epoch {}", describe(last), best),
            _ => info!("No validation results"),
        }
        info!("Results written to {}", path.display());
        Ok(())
    }
}
