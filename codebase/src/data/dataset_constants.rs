use std::collections::BTreeMap;
use std::path::Path;
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use crate::data::bands::{Band, VIIRS_START_YEAR};
use crate::utils::GenericResult;

const BUILTIN_DATASETS: &str = include_str!("../../configs/datasets.toml");

/// One value per stored band, with separate nightlights values per sensor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", deny_unknown_fields)]
pub struct BandStats {
    pub blue: f32,
    pub green: f32,
    pub red: f32,
    pub nir: f32,
    pub swir1: f32,
    pub swir2: f32,
    pub temp1: f32,
    pub dmsp: f32,
    pub viirs: f32,
}

impl BandStats {
    pub fn get(&self, band: Band, year: i32) -> f32 {
        match band {
            Band::Blue => self.blue,
            Band::Green => self.green,
            Band::Red => self.red,
            Band::Nir => self.nir,
            Band::Swir1 => self.swir1,
            Band::Swir2 => self.swir2,
            Band::Temp1 => self.temp1,
            Band::Nightlights if year < VIIRS_START_YEAR => self.dmsp,
            Band::Nightlights => self.viirs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub means: BandStats,
    pub stds: BandStats,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Directory under the data root, with one subdirectory per export partition
    pub dir: String,
    pub expected_shards: usize,
    pub normalization: Normalization,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatasetTable {
    datasets: BTreeMap<String, DatasetInfo>,
}

impl DatasetTable {
    pub fn builtin() -> GenericResult<Self> {
        Self::parse(BUILTIN_DATASETS).context("built-in dataset table is invalid")
    }

    pub fn load(path: &Path) -> GenericResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("can't read dataset table {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid dataset table {}", path.display()))
    }

    pub fn parse(text: &str) -> GenericResult<Self> {
        let datasets: BTreeMap<String, DatasetInfo> = toml::from_str(text)?;
        for (name, info) in datasets.iter() {
            let stds = &info.normalization.stds;
            let all = [stds.blue, stds.green, stds.red, stds.nir, stds.swir1, stds.swir2, stds.temp1, stds.dmsp, stds.viirs];
            if all.iter().any(|o| *o <= 0.0) {
                return Err(anyhow!("dataset {} has a non-positive standard deviation", name));
            }
        }
        Ok(Self { datasets })
    }

    pub fn get(&self, name: &str) -> Option<&DatasetInfo> {
        self.datasets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(|o| o.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_dhs_nl() {
        let table = DatasetTable::builtin().unwrap();
        let info = table.get("DHS_NL").unwrap();
        assert_eq!(info.dir, "dhsnl");
        assert!(info.expected_shards > 0);
        assert_eq!(info.normalization.means.get(Band::Nightlights, 2011), info.normalization.means.dmsp);
        assert_eq!(info.normalization.means.get(Band::Nightlights, 2012), info.normalization.means.viirs);
    }

    #[test]
    fn test_missing_band_is_error() {
        let text = r#"
            [TINY]
            dir = "tiny"
            expected_shards = 1
            [TINY.normalization.means]
            BLUE = 0.0
            [TINY.normalization.stds]
            BLUE = 1.0
        "#;
        assert!(DatasetTable::parse(text).is_err());
    }
}
