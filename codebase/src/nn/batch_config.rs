/// Whether a forward pass runs with training behaviour (batch statistics in batch norm) or
/// inference behaviour (running statistics).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardMode {
    Train,
    Eval,
}

/// Simple struct that contains some information about the current batch
#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub is_training: bool,
    /// 1-based count of optimizer steps, used for Adam's bias correction
    pub iteration: u64,
    /// Multiplies the base learning rate of every layer (learning rate decay)
    pub lr_multiplier: f32,
}

impl BatchConfig {
    pub fn new_not_train() -> Self {
        Self { is_training: false, iteration: 0, lr_multiplier: 1.0 }
    }

    pub fn new_train() -> Self {
        Self::new_train_step(1, 1.0)
    }

    pub fn new_train_step(iteration: u64, lr_multiplier: f32) -> Self {
        Self { is_training: true, iteration: iteration.max(1), lr_multiplier }
    }

    pub fn for_mode(mode: ForwardMode) -> Self {
        match mode {
            ForwardMode::Train => Self::new_train(),
            ForwardMode::Eval => Self::new_not_train(),
        }
    }
}
