use std::path::PathBuf;
use std::time::Instant;

use crate::config::ConversionConfig;
use crate::error::ConvertResult;
use crate::fuel::FuelModelTable;
use crate::neighborhood::NeighborhoodBuilder;
use crate::raster::{load_geotiff, AlignedLayers, RasterGrid};
use crate::region::{rasterize_overlay, RegionMask};
use crate::sampler::{GridSampler, Stride, TreeSpecies};
use crate::scenario::{CellTemplate, ManifestSources, Scenario, ScenarioManifest};

pub struct ConversionSettings {
    pub name: String,
    pub stride: Stride,
    pub template: CellTemplate,
    pub overlay_species: TreeSpecies,
    pub parallel: bool,
}

impl ConversionSettings {
    pub fn new(name: impl Into<String>, stride: Stride) -> Self {
        Self {
            name: name.into(),
            stride,
            template: CellTemplate::default(),
            overlay_species: TreeSpecies::Locust,
            parallel: false,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> ConvertResult<Self> {
        Ok(Self {
            name: config.name.clone(),
            stride: config.stride()?,
            template: config.template.clone(),
            overlay_species: config.overlay_species,
            parallel: config.parallel,
        })
    }
}

/// Rasters for one run, already clipped to the region by the caller.
pub struct ConversionInputs {
    pub elevation: RasterGrid,
    pub landcover: RasterGrid,
    pub overlay: Option<RasterGrid>,
    pub region: Option<RegionMask>,
}

impl ConversionInputs {
    pub fn new(elevation: RasterGrid, landcover: RasterGrid) -> Self {
        Self {
            elevation,
            landcover,
            overlay: None,
            region: None,
        }
    }

    pub fn with_overlay(mut self, overlay: RasterGrid) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_region(mut self, region: RegionMask) -> Self {
        self.region = Some(region);
        self
    }
}

#[derive(Clone, Debug)]
pub struct StageReport {
    pub name: &'static str,
    pub duration_ms: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ConversionStats {
    /// Pixels visited by the stride walk, valid or not.
    pub visited: usize,
    pub cells: usize,
    pub edges: usize,
    pub skipped_samples: usize,
    pub stages: Vec<StageReport>,
}

pub struct Conversion {
    pub scenario: Scenario,
    pub stats: ConversionStats,
}

#[derive(Clone, Debug)]
pub struct ConversionSummary {
    pub name: String,
    pub stats: ConversionStats,
    pub output: PathBuf,
    pub manifest: Option<PathBuf>,
}

pub struct ConverterBuilder {
    settings: ConversionSettings,
    fuels: FuelModelTable,
}

impl ConverterBuilder {
    pub fn new(settings: ConversionSettings) -> Self {
        Self {
            settings,
            fuels: FuelModelTable::default(),
        }
    }

    pub fn with_fuel_table(mut self, fuels: FuelModelTable) -> Self {
        self.fuels = fuels;
        self
    }

    pub fn build(self) -> Converter {
        Converter {
            settings: self.settings,
            fuels: self.fuels,
        }
    }
}

/// Alignment → sampling → neighbourhood → serialization, one pass per run.
/// Holds no state between runs.
pub struct Converter {
    settings: ConversionSettings,
    fuels: FuelModelTable,
}

impl Converter {
    pub fn from_config(config: &ConversionConfig) -> ConvertResult<Self> {
        Ok(ConverterBuilder::new(ConversionSettings::from_config(config)?)
            .with_fuel_table(config.fuel_table())
            .build())
    }

    /// Build the scenario in memory.
    pub fn convert(&self, inputs: ConversionInputs) -> ConvertResult<Conversion> {
        let ConversionInputs {
            elevation,
            landcover,
            overlay,
            region,
        } = inputs;
        let mut stages = Vec::with_capacity(4);

        if let Some(region) = &region {
            warn_if_disjoint(&elevation, region);
        }

        let start = Instant::now();
        let mut layers = AlignedLayers::new(elevation, &landcover, overlay.as_ref())?;
        if layers.overlay().is_none() {
            if let Some(sub_region) = region.as_ref().and_then(RegionMask::sub_region) {
                let rasterized = rasterize_overlay(layers.elevation(), sub_region);
                layers = layers.with_overlay(rasterized)?;
            }
        } else if region.as_ref().and_then(RegionMask::sub_region).is_some() {
            tracing::info!(
                target: "terrain_graph::pipeline",
                "overlay raster supplied; sub-region used for reference only"
            );
        }
        stages.push(report("align", start));

        let start = Instant::now();
        let sampler = GridSampler::new(&layers, &self.fuels, self.settings.stride)
            .with_overlay_species(self.settings.overlay_species);
        let mut cells = if self.settings.parallel {
            sampler.sample_parallel()
        } else {
            sampler.sample()
        };
        let visited = sampler.visited();
        stages.push(report("sample", start));

        let start = Instant::now();
        NeighborhoodBuilder::new(&layers, &self.fuels, self.settings.stride)
            .parallel(self.settings.parallel)
            .attach(&mut cells);
        stages.push(report("neighborhood", start));

        let start = Instant::now();
        let sampled = cells.len();
        let scenario = Scenario::new(self.settings.template.clone(), cells);
        stages.push(report("assemble", start));

        let stats = ConversionStats {
            visited,
            cells: scenario.cells().len(),
            edges: scenario.edge_count(),
            skipped_samples: visited - sampled,
            stages,
        };
        tracing::info!(
            target: "terrain_graph::pipeline",
            name = %self.settings.name,
            stride = self.settings.stride.get(),
            width = layers.width(),
            height = layers.height(),
            visited = stats.visited,
            cells = stats.cells,
            edges = stats.edges,
            skipped = stats.skipped_samples,
            "conversion.complete"
        );
        Ok(Conversion { scenario, stats })
    }

    /// Load the configured rasters, convert, and write the scenario (and
    /// its manifest when enabled).
    pub fn run(&self, config: &ConversionConfig) -> ConvertResult<ConversionSummary> {
        let elevation = load_geotiff(&config.sources.elevation)?;
        let landcover = load_geotiff(&config.sources.landcover)?;
        let mut inputs = ConversionInputs::new(elevation, landcover);
        if let Some(path) = &config.sources.overlay {
            inputs = inputs.with_overlay(load_geotiff(path)?);
        }
        if let Some(region) = config.region_mask()? {
            inputs = inputs.with_region(region);
        }

        let Conversion { scenario, mut stats } = self.convert(inputs)?;

        let start = Instant::now();
        scenario.write_file(&config.output)?;
        stats.stages.push(report("write", start));
        tracing::info!(
            target: "terrain_graph::pipeline",
            path = %config.output.display(),
            "scenario.written"
        );

        let manifest = if config.write_manifest {
            let path = ScenarioManifest::path_for(&config.output);
            ScenarioManifest {
                name: self.settings.name.clone(),
                generated_at: ScenarioManifest::timestamp(),
                stride: self.settings.stride,
                sources: ManifestSources {
                    elevation: config.sources.elevation.clone(),
                    landcover: config.sources.landcover.clone(),
                    overlay: config.sources.overlay.clone(),
                },
                cells: stats.cells,
                edges: stats.edges,
                skipped_samples: stats.skipped_samples,
            }
            .write(&path)?;
            Some(path)
        } else {
            None
        };

        Ok(ConversionSummary {
            name: self.settings.name.clone(),
            stats,
            output: config.output.clone(),
            manifest,
        })
    }
}

fn report(name: &'static str, start: Instant) -> StageReport {
    StageReport {
        name,
        duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
    }
}

fn warn_if_disjoint(elevation: &RasterGrid, region: &RegionMask) {
    let corners = [
        elevation.pixel_to_world(0, 0),
        elevation.pixel_to_world(elevation.width(), 0),
        elevation.pixel_to_world(0, elevation.height()),
        elevation.pixel_to_world(elevation.width(), elevation.height()),
    ];
    let (min_x, min_y, max_x, max_y) = corners.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(min_x, min_y, max_x, max_y), &(x, y)| {
            (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
        },
    );
    let (r_min_x, r_min_y, r_max_x, r_max_y) = region.outer().bounds();
    if r_max_x < min_x || r_min_x > max_x || r_max_y < min_y || r_min_y > max_y {
        tracing::warn!(
            target: "terrain_graph::pipeline",
            "region does not overlap the elevation raster extent"
        );
    }
}
