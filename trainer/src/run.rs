use std::path::Path;
use std::time::Instant;
use anyhow::bail;
use chrono::Local;
use log::info;
use nl_codebase::data::bands::num_input_bands;
use nl_codebase::data::batcher::{Batcher, BatcherOptions, DEFAULT_SHUFFLE_BUFFER};
use nl_codebase::data::dataset_constants::DatasetTable;
use nl_codebase::data::normalization::PrepareOptions;
use nl_codebase::models::resnet::ModelParams;
use nl_codebase::utils::GenericResult;
use crate::context::{ComputeContext, DeviceConfig};
use crate::dataset::{count_split_examples, dataset_info, find_shards, steps_per_epoch, ShardIndexSet};
use crate::errors::RunError;
use crate::flags::Flags;
use crate::run_config::{prepare_out_dir, RunConfig};
use crate::trainer::{EpochTrainer, RegressionTrainer, TrainerInputs};

const SUPPORTED_MODEL: &str = "resnet";
/// Batches sampled from the training set at every evaluation
pub const EVAL_TRAIN_BATCHES: usize = 200;
/// Batches sampled from the training set at the final evaluation
pub const FINAL_EVAL_TRAIN_BATCHES: usize = 500;
/// The model predicts one value per nightlights sensor
const NUM_OUTPUTS: usize = 2;

/// Resolves the flags, creates the output directory and the compute context, and runs the training
pub fn run_training_wrapper(flags: Flags) -> GenericResult<()> {
    let start = Instant::now();
    info!("Current time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{:#?}", flags);

    let config = RunConfig::resolve(&flags)?;
    let out_dir = prepare_out_dir(&config)?;
    info!("Outputs directory: {}", out_dir.display());

    // Zero threads: one per core, the batchers have their own pools
    let context = ComputeContext::new(DeviceConfig::from_gpu(config.gpu), 0)?;
    let result = run_training(&config, &out_dir, &context);
    context.close();
    result?;

    info!("End time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("Time elapsed (sec.): {:.1}", start.elapsed().as_secs_f64());
    Ok(())
}

fn load_dataset_table(config: &RunConfig) -> GenericResult<DatasetTable> {
    match &config.datasets_config {
        Some(path) => DatasetTable::load(path),
        None => DatasetTable::builtin(),
    }
}

/// Builds the pipelines, the model and the trainer for **config**, writing to **out_dir**
pub fn run_training(config: &RunConfig, out_dir: &Path, context: &ComputeContext) -> GenericResult<()> {
    if !out_dir.is_dir() {
        return Err(RunError::MissingOutDir(out_dir.to_owned()).into());
    }
    if config.model_name != SUPPORTED_MODEL {
        return Err(RunError::UnsupportedModel(config.model_name.clone()).into());
    }

    let table = load_dataset_table(config)?;
    let info = dataset_info(&table, &config.dataset)?;
    let shards = ShardIndexSet::partition(find_shards(&config.data_root, &config.dataset, info)?, config.seed);
    let (train_files, val_files) = (shards.train_files(), shards.val_files());
    let num_train = count_split_examples(&train_files)?;
    let num_val = count_split_examples(&val_files)?;
    let train_steps = steps_per_epoch(num_train, config.batch_size);
    let val_steps = steps_per_epoch(num_val, config.batch_size);
    info!("{} train shards with {} examples, {} val shards with {} examples",
        train_files.len(), num_train, val_files.len(), num_val);

    let prepare = PrepareOptions {
        ls_bands: config.ls_bands,
        nl_band: config.nl_band,
        nl_label: config.nl_label,
        clipneg: true,
        normalization: info.normalization.clone(),
    };
    let batcher = |files, shuffle, augment, epochs, cache, seed| Batcher::new(files, BatcherOptions {
        prepare: prepare.clone(),
        batch_size: config.batch_size,
        epochs,
        shuffle,
        augment,
        cache,
        num_threads: config.num_threads,
        shuffle_buffer: DEFAULT_SHUFFLE_BUFFER,
        seed,
    });

    let train = batcher(train_files.clone(), true, config.augment, config.max_epochs, config.cache.train, config.seed)?;
    // Shuffled, so that evaluations sample the whole training set
    let train_eval = batcher(train_files, true, false, config.max_epochs, config.cache.train_eval, config.seed.wrapping_add(1))?;
    let val = batcher(val_files, false, false, 1, true, config.seed.wrapping_add(2))?;

    let model_params = ModelParams {
        fc_reg: config.fc_reg,
        conv_reg: config.conv_reg,
        num_layers: config.num_layers,
        use_dilated_conv_in_first_layer: false,
        num_input_bands: num_input_bands(config.ls_bands, config.nl_band),
        num_outputs: NUM_OUTPUTS,
        base_channels: config.base_channels,
        lr: config.lr,
    };

    let mut trainer = RegressionTrainer::new(TrainerInputs {
        train,
        train_eval,
        val,
        model_params,
        context,
        steps_per_epoch: train_steps,
        ls_bands: config.ls_bands,
        lr: config.lr,
        lr_decay: config.lr_decay,
        out_dir: out_dir.to_owned(),
        init_ckpt_dir: config.init_ckpt_dir.clone(),
        imagenet_weights_path: config.imagenet_weights_path.clone(),
        hs_weight_init: config.hs_weight_init,
        exclude_final_layer: false,
        seed: config.seed,
    })?;
    trainer.init_iterators();

    drive_epochs(&mut trainer, config.max_epochs, config.eval_every, config.print_every, val_steps)
}

/// Evaluates every **eval_every** epochs and trains one epoch at a time, then runs a longer
/// final evaluation and logs the results
pub fn drive_epochs(trainer: &mut impl EpochTrainer, max_epochs: usize, eval_every: usize, print_every: usize, val_steps: f64) -> GenericResult<()> {
    if eval_every == 0 {
        bail!("eval_every must be positive");
    }
    let val_batches = val_steps.ceil() as usize;

    for epoch in 0..max_epochs {
        if epoch % eval_every == 0 {
            trainer.eval_train(EVAL_TRAIN_BATCHES)?;
            trainer.eval_val(val_batches)?;
        }
        trainer.train_epoch(print_every)?;
    }

    trainer.eval_train(FINAL_EVAL_TRAIN_BATCHES)?;
    trainer.eval_val(val_batches)?;
    trainer.log_results()
}
