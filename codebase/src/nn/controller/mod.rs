mod evaluating;
mod training;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use crate::nn::key_assigner::KeyAssigner;
use crate::nn::layers::nn_layers::*;
use crate::nn::loss::loss_func::LossFunc;
use crate::utils::{Array1F, GenericResult};

/// Storage key holding the number of optimizer steps taken so far
pub const ITERATIONS_KEY: &str = "controller_iterations";

/// Main struct to train and use the AI model. One controller owns one set of weights, so the
/// same parameters are used for training and evaluation.
/// ```ignore
/// use nl_codebase::nn::controller::NNController;
/// use nl_codebase::nn::batch_config::ForwardMode;
///
/// let mut controller = NNController::new(main_layer, LossFunc::Mse).unwrap();
///
/// for epoch in 0..10 {
///     controller.set_lr_multiplier(0.96f32.powi(epoch));
///     let loss = controller.train_batch(data_inputs.clone(), &data_expected).unwrap();
///     println!("Epoch {} finished with avg loss {}", epoch, loss);
/// }
///
/// let predictions = controller.forward(data_inputs, ForwardMode::Eval).unwrap();
/// ```
pub struct NNController {
    main_layer: Layer,
    storage: GenericStorage,
    loss: LossFunc,
    iterations: u64,
    lr_multiplier: f32,
}

impl NNController {
    /// Create a controller with an empty storage and init its layers
    pub fn new(main_layer: Layer, loss: LossFunc) -> GenericResult<Self> {
        Self::load(main_layer, loss, GenericStorage::new())
    }

    /// Same as **new**, but the random parameters only depend on **seed**
    pub fn new_seeded(main_layer: Layer, loss: LossFunc, seed: u64) -> GenericResult<Self> {
        Self::load_seeded(main_layer, loss, GenericStorage::new(), seed)
    }

    /// Create a controller with the provided storage and init its layers. Parameters already
    /// present in **storage** are kept, the missing ones are initialized.
    pub fn load(main_layer: Layer, loss: LossFunc, storage: GenericStorage) -> GenericResult<Self> {
        Self::init(main_layer, loss, storage, &mut StdRng::from_entropy())
    }

    pub fn load_seeded(main_layer: Layer, loss: LossFunc, storage: GenericStorage, seed: u64) -> GenericResult<Self> {
        Self::init(main_layer, loss, storage, &mut StdRng::seed_from_u64(seed))
    }

    fn init(main_layer: Layer, loss: LossFunc, mut storage: GenericStorage, rng: &mut StdRng) -> GenericResult<Self> {
        let mut assigner = KeyAssigner::new();
        init_layer(
            &main_layer,
            InitData {
                assigner: &mut assigner,
                storage: &mut storage,
                rng,
            },
        ).context("failed to init the model layers")?;

        let iterations = storage.remove(ITERATIONS_KEY)
            .and_then(|o| o.first().and_then(|o| o.iter().next().copied()))
            .map(|o| o.max(0.0) as u64)
            .unwrap_or(0);

        Ok(Self {
            main_layer,
            storage,
            loss,
            iterations,
            lr_multiplier: 1.0,
        })
    }

    /// Return a copy of the inner storage, with the optimizer step count
    pub fn export(&self) -> GenericStorage {
        let mut result = self.storage.clone();
        result.insert(ITERATIONS_KEY.to_owned(), vec![Array1F::from(vec![self.iterations as f32]).into_dyn()]);
        result
    }

    pub fn storage(&self) -> &GenericStorage {
        &self.storage
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Scales every learning rate of the model, starting from the next training step
    pub fn set_lr_multiplier(&mut self, lr_multiplier: f32) {
        self.lr_multiplier = lr_multiplier;
    }

    pub fn lr_multiplier(&self) -> f32 {
        self.lr_multiplier
    }
}
