use std::path::PathBuf;
use clap::{ArgAction, Parser};

/// String flags that accept "None" as an explicit absent value
pub const NONE_SENTINEL: &str = "None";

/// Trains ResNet models estimating nightlights from multi-spectral daytime satellite imagery
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "train_nightlights", version)]
pub struct Flags {
    /// Name of the experiment being run
    #[arg(long, default_value = "new_experiment")]
    pub experiment_name: String,

    /// Path to the output directory for checkpoints and logs, must already exist
    #[arg(long, default_value = "outputs/")]
    pub out_dir: PathBuf,

    /// Checkpoint directory from which to initialize weights
    #[arg(long, default_value = NONE_SENTINEL)]
    pub init_ckpt_dir: String,

    /// Path to pretrained weights for initialization
    #[arg(long, default_value = NONE_SENTINEL)]
    pub imagenet_weights_path: String,

    /// Initialization of the non-RGB bands of the first conv layer: None, random, same, samescaled
    #[arg(long, default_value = NONE_SENTINEL)]
    pub hs_weight_init: String,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Whether to use data augmentation
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub augment: bool,

    /// Regularization penalty factor for fully connected layers
    #[arg(long, default_value_t = 1e-3)]
    pub fc_reg: f32,

    /// Regularization penalty factor for convolution layers
    #[arg(long, default_value_t = 1e-3)]
    pub conv_reg: f32,

    /// Learning rate for the optimizer
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f32,

    /// Decay rate of the learning rate per epoch, 1.0 for no decay
    #[arg(long, default_value_t = 1.0)]
    pub lr_decay: f32,

    /// Name of the model, only "resnet" is supported
    #[arg(long, default_value = "resnet")]
    pub model_name: String,

    /// Number of ResNet layers: 18, 34 or 50
    #[arg(long, default_value_t = 18)]
    pub num_layers: usize,

    /// Dataset to use, a name of the dataset table
    #[arg(long, default_value = "DHS_NL")]
    pub dataset: String,

    /// Landsat bands to use: None, rgb, ms
    #[arg(long, default_value = NONE_SENTINEL)]
    pub ls_bands: String,

    /// Nightlights input band: None, merge, split
    #[arg(long, default_value = NONE_SENTINEL)]
    pub nl_band: String,

    /// Nightlights value to train on: center, mean
    #[arg(long, default_value = "center")]
    pub nl_label: String,

    /// Which accelerator to use
    #[arg(long)]
    pub gpu: Option<usize>,

    /// Number of threads of each batcher
    #[arg(long, default_value_t = 1)]
    pub num_threads: usize,

    /// Comma-separated list of pipelines to cache in memory: train, train_eval, val
    #[arg(long, value_delimiter = ',')]
    pub cache: Vec<String>,

    /// Maximum number of training epochs
    #[arg(long, default_value_t = 150)]
    pub max_epochs: usize,

    /// Evaluate the model after every so many epochs
    #[arg(long, default_value_t = 1)]
    pub eval_every: usize,

    /// Log training statistics after every so many steps
    #[arg(long, default_value_t = 40)]
    pub print_every: usize,

    /// Seed for the partition, shuffling and augmentation
    #[arg(long, default_value_t = 123)]
    pub seed: u64,

    /// Directory with one subdirectory of shards per dataset
    #[arg(long, default_value = "data/dhsnl_records")]
    pub data_root: PathBuf,

    /// TOML dataset table replacing the built-in one
    #[arg(long)]
    pub datasets_config: Option<PathBuf>,

    /// Channels of the first ResNet stage
    #[arg(long, default_value_t = 64)]
    pub base_channels: usize,

    /// Enable debug logs
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn parse(args: &[&str]) -> Flags {
        let mut all = vec!["train_nightlights"];
        all.extend_from_slice(args);
        Flags::try_parse_from(all).unwrap()
    }

    #[test]
    fn test_defaults() {
        let flags = parse(&[]);
        assert_eq!(flags.experiment_name, "new_experiment");
        assert_eq!(flags.batch_size, 64);
        assert!(flags.augment);
        assert_eq!(flags.ls_bands, "None");
        assert_eq!(flags.nl_label, "center");
        assert_eq!(flags.gpu, None);
        assert!(flags.cache.is_empty());
        assert_eq!(flags.max_epochs, 150);
        assert_eq!(flags.print_every, 40);
        assert_eq!(flags.seed, 123);
    }

    #[test]
    fn test_cache_list_and_bool() {
        let flags = parse(&["--cache", "train,val", "--augment", "false", "--gpu", "1"]);
        assert_eq!(flags.cache, vec!["train".to_owned(), "val".to_owned()]);
        assert!(!flags.augment);
        assert_eq!(flags.gpu, Some(1));
    }
}
