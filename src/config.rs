//! Run configuration loaded from YAML

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::fuel::FuelModelTable;
use crate::region::{Polygon, RegionMask, WorldPoint};
use crate::sampler::{Stride, TreeSpecies};
use crate::scenario::CellTemplate;

pub const MAX_STRIDE: u32 = 1000;

fn default_stride() -> u32 {
    50
}

fn default_overlay_species() -> TreeSpecies {
    TreeSpecies::Locust
}

fn default_write_manifest() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    pub name: String,
    pub sources: SourcePaths,
    pub output: PathBuf,
    #[serde(default = "default_stride")]
    pub stride: u32,
    #[serde(default)]
    pub region: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub sub_region: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub fuel_models: Option<FuelModelTable>,
    #[serde(default)]
    pub template: CellTemplate,
    #[serde(default = "default_overlay_species")]
    pub overlay_species: TreeSpecies,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_write_manifest")]
    pub write_manifest: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePaths {
    pub elevation: PathBuf,
    pub landcover: PathBuf,
    #[serde(default)]
    pub overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ConversionConfig {
    pub fn from_yaml_str(text: &str) -> ConvertResult<Self> {
        serde_yaml::from_str(text).map_err(|err| ConvertError::config(err.to_string()))
    }

    pub fn to_yaml(&self) -> ConvertResult<String> {
        serde_yaml::to_string(self).map_err(|err| ConvertError::config(err.to_string()))
    }

    pub fn validate(&self) -> ConvertResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConvertError::config("name must not be empty"));
        }
        self.stride()?;
        if self.sub_region.is_some() && self.region.is_none() {
            return Err(ConvertError::config("sub_region requires a region"));
        }
        self.region_mask()?;
        if matches!(&self.fuel_models, Some(table) if table.is_empty()) {
            return Err(ConvertError::config("fuel_models must not be empty when given"));
        }
        Ok(())
    }

    pub fn stride(&self) -> ConvertResult<Stride> {
        if self.stride > MAX_STRIDE {
            return Err(ConvertError::config(format!(
                "stride {} exceeds the maximum of {MAX_STRIDE}",
                self.stride
            )));
        }
        Stride::new(self.stride)
    }

    pub fn fuel_table(&self) -> FuelModelTable {
        self.fuel_models.clone().unwrap_or_default()
    }

    pub fn region_mask(&self) -> ConvertResult<Option<RegionMask>> {
        let Some(outer) = &self.region else {
            return Ok(None);
        };
        let mut mask = RegionMask::new(polygon(outer)?);
        if let Some(sub_region) = &self.sub_region {
            mask = mask.with_sub_region(polygon(sub_region)?);
        }
        Ok(Some(mask))
    }

    /// Make relative source and output paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.sources.elevation);
        resolve(&mut self.sources.landcover);
        if let Some(overlay) = self.sources.overlay.as_mut() {
            resolve(overlay);
        }
        resolve(&mut self.output);
    }
}

fn polygon(points: &[[f64; 2]]) -> ConvertResult<Polygon> {
    Polygon::new(points.iter().copied().map(WorldPoint::from))
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Read and parse a config file. Relative paths inside it are taken
    /// relative to the file's own directory. Validation is left to the
    /// caller so command-line overrides can be applied first.
    pub fn load(&self, file: impl AsRef<Path>) -> ConvertResult<ConversionConfig> {
        let path = self.base_dir.join(file);
        let text = fs::read_to_string(&path).map_err(|err| {
            ConvertError::config(format!("failed to read {}: {err}", path.display()))
        })?;
        let mut config = ConversionConfig::from_yaml_str(&text).map_err(|err| {
            ConvertError::config(format!("failed to parse {}: {err}", path.display()))
        })?;
        let config_dir = path.parent().unwrap_or(&self.base_dir).to_path_buf();
        config.resolve_paths(&config_dir);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: bruce_peninsula
sources:
  elevation: rasters/dtm.tif
  landcover: rasters/landcover.tif
output: out/map.json
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ConversionConfig::from_yaml_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.stride().unwrap().get(), 50);
        assert_eq!(config.overlay_species, TreeSpecies::Locust);
        assert!(config.write_manifest);
        assert!(!config.parallel);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.template, CellTemplate::default());
        assert_eq!(config.fuel_table(), FuelModelTable::default());
        assert!(config.region_mask().unwrap().is_none());
    }

    #[test]
    fn stride_bounds_are_enforced() {
        let mut config = ConversionConfig::from_yaml_str(MINIMAL).unwrap();
        config.stride = 0;
        assert!(matches!(config.validate(), Err(ConvertError::InvalidStride(0))));
        config.stride = 1001;
        assert!(matches!(config.validate(), Err(ConvertError::Config(_))));
        config.stride = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn regions_and_fuel_overrides_parse() {
        let text = format!(
            "{MINIMAL}region: [[0, 0], [100, 0], [100, 100], [0, 100]]\n\
             sub_region: [[10, 10], [20, 10], [20, 20]]\n\
             fuel_models: {{42: 7}}\n\
             overlay_species: 2\n"
        );
        let config = ConversionConfig::from_yaml_str(&text).unwrap();
        config.validate().unwrap();

        let mask = config.region_mask().unwrap().unwrap();
        assert_eq!(mask.outer().points().len(), 5);
        assert!(mask.sub_region().unwrap().contains(15.0, 12.0));
        assert!(config.fuel_table().contains(42.0));
        assert!(!config.fuel_table().contains(10.0));
        assert_eq!(config.overlay_species, TreeSpecies::Pine);
    }

    #[test]
    fn sub_region_without_region_is_rejected() {
        let text = format!("{MINIMAL}sub_region: [[10, 10], [20, 10], [20, 20]]\n");
        let config = ConversionConfig::from_yaml_str(&text).unwrap();
        assert!(matches!(config.validate(), Err(ConvertError::Config(_))));
    }

    #[test]
    fn loader_resolves_paths_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.yaml"), MINIMAL).unwrap();

        let config = ConfigLoader::new(dir.path()).load("run.yaml").unwrap();
        assert_eq!(config.sources.elevation, dir.path().join("rasters/dtm.tif"));
        assert_eq!(config.output, dir.path().join("out/map.json"));
        assert!(config.sources.overlay.is_none());
    }

    #[test]
    fn loader_defers_validation_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.yaml"), format!("{MINIMAL}stride: 5000\n")).unwrap();

        let mut config = ConfigLoader::new(dir.path()).load("run.yaml").unwrap();
        assert!(config.validate().is_err());

        config.stride = 10;
        config.validate().unwrap();
        assert_eq!(config.stride().unwrap().get(), 10);
    }

    #[test]
    fn yaml_round_trip_preserves_settings() {
        let config = ConversionConfig::from_yaml_str(MINIMAL).unwrap();
        let reloaded = ConversionConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(reloaded.name, config.name);
        assert_eq!(reloaded.stride, config.stride);
        assert_eq!(reloaded.output, config.output);
    }
}
