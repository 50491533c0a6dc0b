pub mod data;
pub mod integration;
pub mod models;
pub mod nn;
pub mod utils;

pub use utils::{Array4F, ArrayDynF};
