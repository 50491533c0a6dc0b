use anyhow::bail;
use ndarray::{stack, ArrayView2, Axis};
use crate::data::bands::{Band, LsBands, NlBand, NlLabel, VIIRS_START_YEAR};
use crate::data::dataset_constants::Normalization;
use crate::data::shard::Example;
use crate::utils::{Array2F, Array3F, GenericResult};

/// An example ready to be batched: selected and normalized channels, and its regression target
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedExample {
    /// (Channels, Height, Width)
    pub image: Array3F,
    pub year: i32,
    pub label: f32,
    /// (lat, lon)
    pub loc: [f32; 2],
}

#[derive(Clone, Debug)]
pub struct PrepareOptions {
    pub ls_bands: Option<LsBands>,
    pub nl_band: Option<NlBand>,
    pub nl_label: NlLabel,
    pub clipneg: bool,
    pub normalization: Normalization,
}

fn normalize(band: ArrayView2<f32>, which: Band, year: i32, normalization: &Normalization) -> Array2F {
    let mean = normalization.means.get(which, year);
    let std = normalization.stds.get(which, year);
    band.mapv(|o| (o - mean) / std)
}

/// The label always comes from the stored nightlights band before normalization
pub fn nl_label_value(nightlights: ArrayView2<f32>, nl_label: NlLabel) -> f32 {
    match nl_label {
        NlLabel::Center => {
            let (height, width) = nightlights.dim();
            nightlights[(height / 2, width / 2)]
        }
        NlLabel::Mean => nightlights.mean().unwrap_or(0.0),
    }
}

pub fn prepare_example(example: Example, options: &PrepareOptions) -> GenericResult<PreparedExample> {
    let Example { year, lat, lon, mut bands } = example;
    if options.clipneg {
        bands.mapv_inplace(|o| o.max(0.0));
    }

    let nightlights = bands.index_axis(Axis(0), Band::Nightlights.index());
    let label = nl_label_value(nightlights, options.nl_label);

    let mut channels: Vec<Array2F> = Vec::new();
    if let Some(ls_bands) = options.ls_bands {
        for band in ls_bands.bands() {
            channels.push(normalize(bands.index_axis(Axis(0), band.index()), *band, year, &options.normalization));
        }
    }
    if let Some(nl_band) = options.nl_band {
        let normalized = normalize(nightlights, Band::Nightlights, year, &options.normalization);
        match nl_band {
            NlBand::Merge => channels.push(normalized),
            NlBand::Split => {
                let zeros = Array2F::zeros(normalized.raw_dim());
                if year < VIIRS_START_YEAR {
                    channels.push(normalized);
                    channels.push(zeros);
                } else {
                    channels.push(zeros);
                    channels.push(normalized);
                }
            }
        }
    }

    if channels.is_empty() {
        bail!("no input bands selected");
    }
    let views: Vec<_> = channels.iter().map(|o| o.view()).collect();
    let image = stack(Axis(0), &views)?;

    Ok(PreparedExample { image, year, label, loc: [lat, lon] })
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::data::bands::STORED_BANDS;
    use crate::data::dataset_constants::BandStats;
    use super::*;

    pub fn unit_normalization() -> Normalization {
        let stats = |value: f32| BandStats {
            blue: value, green: value, red: value, nir: value, swir1: value,
            swir2: value, temp1: value, dmsp: value, viirs: value,
        };
        Normalization { means: stats(0.0), stds: stats(1.0) }
    }

    pub fn options(ls_bands: Option<LsBands>, nl_band: Option<NlBand>) -> PrepareOptions {
        PrepareOptions {
            ls_bands,
            nl_band,
            nl_label: NlLabel::Center,
            clipneg: true,
            normalization: unit_normalization(),
        }
    }

    /// Band `b` is filled with `b + 1`, the nightlights band has a bright centre pixel
    pub fn example(year: i32) -> Example {
        let mut bands = Array3F::zeros((STORED_BANDS, 3, 3));
        for (index, mut band) in bands.outer_iter_mut().enumerate() {
            band.fill(index as f32 + 1.0);
        }
        bands[(Band::Nightlights.index(), 1, 1)] = 17.0;
        bands[(Band::Nightlights.index(), 0, 0)] = -10.0;
        Example { year, lat: 1.0, lon: 2.0, bands }
    }

    #[test]
    fn test_rgb_band_order() {
        let prepared = prepare_example(example(2010), &options(Some(LsBands::Rgb), None)).unwrap();
        assert_eq!(prepared.image.shape(), &[3, 3, 3]);
        // RED, GREEN, BLUE
        assert_eq!(prepared.image[(0, 0, 0)], 3.0);
        assert_eq!(prepared.image[(1, 0, 0)], 2.0);
        assert_eq!(prepared.image[(2, 0, 0)], 1.0);
        assert_eq!(prepared.label, 17.0);
        assert_eq!(prepared.loc, [1.0, 2.0]);
    }

    #[test]
    fn test_split_zeroes_inactive_sensor() {
        let dmsp = prepare_example(example(2010), &options(None, Some(NlBand::Split))).unwrap();
        assert_eq!(dmsp.image.shape(), &[2, 3, 3]);
        assert_eq!(dmsp.image[(0, 1, 1)], 17.0);
        assert_eq!(dmsp.image.index_axis(Axis(0), 1).sum(), 0.0);

        let viirs = prepare_example(example(2014), &options(None, Some(NlBand::Split))).unwrap();
        assert_eq!(viirs.image.index_axis(Axis(0), 0).sum(), 0.0);
        assert_eq!(viirs.image[(1, 1, 1)], 17.0);
    }

    #[test]
    fn test_clipneg_and_mean_label() {
        let mut opts = options(None, Some(NlBand::Merge));
        opts.nl_label = NlLabel::Mean;
        let prepared = prepare_example(example(2010), &opts).unwrap();
        // 7 pixels of 8, one of 17, one clipped to 0
        assert!((prepared.label - (7.0 * 8.0 + 17.0) / 9.0).abs() < 1e-5);
        assert_eq!(prepared.image[(0, 0, 0)], 0.0);
    }

    #[test]
    fn test_normalization_by_sensor() {
        let mut opts = options(None, Some(NlBand::Merge));
        opts.normalization.means.dmsp = 8.0;
        opts.normalization.stds.dmsp = 2.0;
        let prepared = prepare_example(example(2011), &opts).unwrap();
        assert_eq!(prepared.image[(0, 0, 1)], 0.0);
        assert_eq!(prepared.image[(0, 1, 1)], 4.5);

        let prepared = prepare_example(example(2012), &opts).unwrap();
        assert_eq!(prepared.image[(0, 0, 1)], 8.0);
    }

    #[test]
    fn test_no_bands_is_error() {
        assert!(prepare_example(example(2010), &options(None, None)).is_err());
    }
}
