use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use nl_codebase::data::bands::{LsBands, NlBand, NlLabel, ParseOptionError};
use crate::errors::RunError;
use crate::flags::{Flags, NONE_SENTINEL};

pub const PARAMS_FILE: &str = "params.txt";

/// How the first conv layer treats the bands that pretrained RGB weights don't have
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HsWeightInit {
    /// Keep the fresh random kernels
    Random,
    /// Copy the mean RGB kernel
    Same,
    /// Copy the mean RGB kernel and rescale every input kernel by 3 / bands
    SameScaled,
}

impl FromStr for HsWeightInit {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(HsWeightInit::Random),
            "same" => Ok(HsWeightInit::Same),
            "samescaled" => Ok(HsWeightInit::SameScaled),
            _ => Err(ParseOptionError { option: "hs_weight_init", value: s.to_owned(), expected: "None, random, same, samescaled" }),
        }
    }
}

impl Display for HsWeightInit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HsWeightInit::Random => "random",
            HsWeightInit::Same => "same",
            HsWeightInit::SameScaled => "samescaled",
        })
    }
}

/// Pipelines whose decoded examples are kept in memory
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheSplits {
    pub train: bool,
    pub train_eval: bool,
    pub val: bool,
}

impl CacheSplits {
    fn parse(values: &[String]) -> Result<Self, RunError> {
        let mut result = CacheSplits::default();
        for value in values.iter().map(|o| o.trim()).filter(|o| !o.is_empty()) {
            match value {
                "train" => result.train = true,
                "train_eval" => result.train_eval = true,
                "val" => result.val = true,
                NONE_SENTINEL => {}
                _ => return Err(RunError::Config(format!(
                    "cache entry {:?} is not one of train, train_eval, val", value))),
            }
        }
        Ok(result)
    }
}

/// Every parameter of one training run, resolved and typed. Written to params.txt before training.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub experiment_name: String,
    pub out_dir: PathBuf,
    pub init_ckpt_dir: Option<PathBuf>,
    pub imagenet_weights_path: Option<PathBuf>,
    pub hs_weight_init: Option<HsWeightInit>,
    pub batch_size: usize,
    pub augment: bool,
    pub fc_reg: f32,
    pub conv_reg: f32,
    pub lr: f32,
    pub lr_decay: f32,
    pub model_name: String,
    pub num_layers: usize,
    pub dataset: String,
    pub ls_bands: Option<LsBands>,
    pub nl_band: Option<NlBand>,
    pub nl_label: NlLabel,
    pub gpu: Option<usize>,
    pub num_threads: usize,
    pub cache: CacheSplits,
    pub max_epochs: usize,
    pub eval_every: usize,
    pub print_every: usize,
    pub seed: u64,
    pub data_root: PathBuf,
    pub datasets_config: Option<PathBuf>,
    pub base_channels: usize,
}

/// Maps the "None" sentinel to an absent value, any other string is kept as is
pub fn none_sentinel(value: &str) -> Option<&str> {
    if value == NONE_SENTINEL {
        None
    } else {
        Some(value)
    }
}

fn parse_optional<T: FromStr>(value: &str) -> Result<Option<T>, RunError>
    where T::Err: Display {
    none_sentinel(value)
        .map(|o| o.parse::<T>().map_err(|e| RunError::Config(e.to_string())))
        .transpose()
}

fn check(condition: bool, message: &str) -> Result<(), RunError> {
    if condition {
        Ok(())
    } else {
        Err(RunError::Config(message.to_owned()))
    }
}

impl RunConfig {
    pub fn resolve(flags: &Flags) -> Result<Self, RunError> {
        check(flags.batch_size > 0, "batch_size must be positive")?;
        check(flags.num_threads > 0, "num_threads must be positive")?;
        check(flags.eval_every > 0, "eval_every must be positive")?;
        check(flags.print_every > 0, "print_every must be positive")?;
        check(flags.base_channels > 0, "base_channels must be positive")?;
        check(flags.lr > 0.0, "lr must be positive")?;
        check(flags.lr_decay > 0.0 && flags.lr_decay <= 1.0, "lr_decay must be in (0, 1]")?;
        check(flags.fc_reg >= 0.0 && flags.conv_reg >= 0.0, "fc_reg and conv_reg can't be negative")?;

        let nl_label = flags.nl_label.parse::<NlLabel>()
            .map_err(|e| RunError::Config(e.to_string()))?;

        Ok(Self {
            experiment_name: flags.experiment_name.clone(),
            out_dir: flags.out_dir.clone(),
            init_ckpt_dir: none_sentinel(&flags.init_ckpt_dir).map(PathBuf::from),
            imagenet_weights_path: none_sentinel(&flags.imagenet_weights_path).map(PathBuf::from),
            hs_weight_init: parse_optional(&flags.hs_weight_init)?,
            batch_size: flags.batch_size,
            augment: flags.augment,
            fc_reg: flags.fc_reg,
            conv_reg: flags.conv_reg,
            lr: flags.lr,
            lr_decay: flags.lr_decay,
            model_name: flags.model_name.clone(),
            num_layers: flags.num_layers,
            dataset: flags.dataset.clone(),
            ls_bands: parse_optional(&flags.ls_bands)?,
            nl_band: parse_optional(&flags.nl_band)?,
            nl_label,
            gpu: flags.gpu,
            num_threads: flags.num_threads,
            cache: CacheSplits::parse(&flags.cache)?,
            max_epochs: flags.max_epochs,
            eval_every: flags.eval_every,
            print_every: flags.print_every,
            seed: flags.seed,
            data_root: flags.data_root.clone(),
            datasets_config: flags.datasets_config.clone(),
            base_channels: flags.base_channels,
        })
    }

    pub fn full_experiment_name(&self) -> String {
        full_experiment_name(&self.experiment_name, self.batch_size, self.fc_reg, self.conv_reg, self.lr)
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.out_dir.join(self.full_experiment_name())
    }
}

/// Shortest round-trip text of **value** in the usual scientific layout: positional between 1e-4
/// and 1e16 with at least one decimal ("0.001", "1.0"), else a signed two digit exponent ("1e-05")
fn float_text(value: f32) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }

    let sign = if value.is_sign_negative() && value != 0.0 { "-" } else { "" };
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = match scientific.split_once('e').map(|(m, e)| (m, e.parse::<i32>())) {
        Some((m, Ok(e))) => (m, e),
        _ => return value.to_string(),
    };
    let digits = mantissa.replace('.', "");

    let body = if (-4..16).contains(&exponent) {
        if exponent < 0 {
            format!("0.{}{}", "0".repeat((-exponent - 1) as usize), digits)
        } else {
            let whole = exponent as usize + 1;
            if digits.len() <= whole {
                format!("{}{}.0", digits, "0".repeat(whole - digits.len()))
            } else {
                format!("{}.{}", &digits[..whole], &digits[whole..])
            }
        }
    } else {
        let exponent_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, exponent_sign, exponent.abs())
    };
    format!("{}{}", sign, body)
}

fn compact_float(value: f32) -> String {
    float_text(value).replace('.', "")
}

/// Unique directory name of an experiment, e.g. "exp_b64_fc0001_conv0001_lr0001"
pub fn full_experiment_name(name: &str, batch_size: usize, fc_reg: f32, conv_reg: f32, lr: f32) -> String {
    format!("{}_b{}_fc{}_conv{}_lr{}", name, batch_size, compact_float(fc_reg), compact_float(conv_reg), compact_float(lr))
}

/// Creates the experiment directory and writes params.txt into it. Fails when params.txt is
/// already there, so two launches of the same experiment can't share a directory.
pub fn prepare_out_dir(config: &RunConfig) -> Result<PathBuf, RunError> {
    if !config.out_dir.is_dir() {
        return Err(RunError::MissingOutDir(config.out_dir.clone()));
    }

    let out_dir = config.experiment_dir();
    fs::create_dir_all(&out_dir).map_err(|e| RunError::io(&out_dir, e))?;
    write_params(config, &out_dir)?;
    Ok(out_dir)
}

fn write_params(config: &RunConfig, out_dir: &Path) -> Result<(), RunError> {
    let path = out_dir.join(PARAMS_FILE);
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(v) => v,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(RunError::ParamsExist(path)),
        Err(e) => return Err(RunError::io(path, e)),
    };

    writeln!(file, "{:#?}", config)
        .and_then(|_| writeln!(file, "Outputs directory: {}", out_dir.display()))
        .map_err(|e| RunError::io(&path, e))
}
