use anyhow::bail;
use nl_codebase::data::bands::VIIRS_START_YEAR;
use nl_codebase::utils::{Array1F, Array2F, ArrayDynF, GenericResult};

/// Output channel of the sensor that was active in **year**: 0 for DMSP, 1 for VIIRS
pub fn sensor_channel(year: i32) -> usize {
    if year < VIIRS_START_YEAR {
        0
    } else {
        1
    }
}

/// Picks, for each example, the model output of the sensor of that example's year.
/// **outputs** has shape (Batch, 2).
pub fn select_nl_preds(outputs: &ArrayDynF, years: &[i32]) -> GenericResult<Array1F> {
    if outputs.ndim() != 2 || outputs.shape()[1] != 2 || outputs.shape()[0] != years.len() {
        bail!("expected outputs of shape [{}, 2], got {:?}", years.len(), outputs.shape());
    }
    Ok(years.iter()
        .enumerate()
        .map(|(index, year)| outputs[[index, sensor_channel(*year)]])
        .collect())
}

/// One-hot (Batch, 2) mask of the channels chosen by **select_nl_preds**
pub fn sensor_mask(years: &[i32]) -> Array2F {
    let mut mask = Array2F::zeros((years.len(), 2));
    for (index, year) in years.iter().enumerate() {
        mask[[index, sensor_channel(*year)]] = 1.0;
    }
    mask
}

/// (Batch, 2) targets with each label in its sensor channel and zero in the other one
pub fn expected_outputs(labels: &Array1F, years: &[i32]) -> Array2F {
    let mut expected = Array2F::zeros((years.len(), 2));
    for (index, (label, year)) in labels.iter().zip(years).enumerate() {
        expected[[index, sensor_channel(*year)]] = *label;
    }
    expected
}
