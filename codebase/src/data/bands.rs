use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Nightlights before this year come from DMSP, from this year on from VIIRS
pub const VIIRS_START_YEAR: i32 = 2012;

/// Layout of the band axis of every stored image
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    Temp1,
    Nightlights,
}

impl Band {
    pub const ALL: [Band; 8] = [
        Band::Blue, Band::Green, Band::Red, Band::Nir,
        Band::Swir1, Band::Swir2, Band::Temp1, Band::Nightlights,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

pub const STORED_BANDS: usize = Band::ALL.len();

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid value '{value}' for {option}, expected one of {expected}")]
pub struct ParseOptionError {
    pub option: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Which Landsat bands are fed to the model
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LsBands {
    Rgb,
    Ms,
}

impl LsBands {
    pub fn bands(self) -> &'static [Band] {
        match self {
            LsBands::Rgb => &[Band::Red, Band::Green, Band::Blue],
            LsBands::Ms => &[Band::Blue, Band::Green, Band::Red, Band::Nir, Band::Swir1, Band::Swir2, Band::Temp1],
        }
    }
}

impl FromStr for LsBands {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgb" => Ok(LsBands::Rgb),
            "ms" => Ok(LsBands::Ms),
            _ => Err(ParseOptionError { option: "ls_bands", value: s.to_owned(), expected: "rgb, ms" }),
        }
    }
}

impl Display for LsBands {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LsBands::Rgb => "rgb",
            LsBands::Ms => "ms",
        })
    }
}

/// How the nightlights band is fed to the model as an input
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NlBand {
    /// One band, whatever sensor produced it
    Merge,
    /// One band per sensor, the one that didn't produce the image is zero
    Split,
}

impl NlBand {
    pub fn channels(self) -> usize {
        match self {
            NlBand::Merge => 1,
            NlBand::Split => 2,
        }
    }
}

impl FromStr for NlBand {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(NlBand::Merge),
            "split" => Ok(NlBand::Split),
            _ => Err(ParseOptionError { option: "nl_band", value: s.to_owned(), expected: "merge, split" }),
        }
    }
}

impl Display for NlBand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NlBand::Merge => "merge",
            NlBand::Split => "split",
        })
    }
}

/// Which nightlights value of an image is the regression target
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NlLabel {
    Center,
    Mean,
}

impl FromStr for NlLabel {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(NlLabel::Center),
            "mean" => Ok(NlLabel::Mean),
            _ => Err(ParseOptionError { option: "nl_label", value: s.to_owned(), expected: "center, mean" }),
        }
    }
}

impl Display for NlLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NlLabel::Center => "center",
            NlLabel::Mean => "mean",
        })
    }
}

/// Number of channels of the images produced by the pipeline
pub fn num_input_bands(ls_bands: Option<LsBands>, nl_band: Option<NlBand>) -> usize {
    ls_bands.map(|o| o.bands().len()).unwrap_or(0) + nl_band.map(NlBand::channels).unwrap_or(0)
}
