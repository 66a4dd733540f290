//! Scenario aggregate and its JSON serializer.
//!
//! Document layout:
//!
//! ```text
//! { "cells": { "default": { "delay", "model", "state" },
//!              "<x>_<y>": { "state", "neighborhood": { "<x>_<y>": weight } } } }
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::neighborhood::AdjacencyEdge;
use crate::sampler::{CellState, SampleCell, Stride};

fn default_delay() -> String {
    "inertial".to_string()
}

fn default_model() -> String {
    "plant_population".to_string()
}

/// The `"default"` entry every simulator cell inherits from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTemplate {
    #[serde(default = "default_delay")]
    pub delay: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub state: CellState,
}

impl Default for CellTemplate {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            model: default_model(),
            state: CellState::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    template: CellTemplate,
    cells: Vec<SampleCell>,
}

impl Scenario {
    /// Assemble the aggregate. Cells sharing an id collapse onto the first
    /// position with the later cell's contents.
    pub fn new(template: CellTemplate, cells: Vec<SampleCell>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(cells.len());
        let mut unique: Vec<SampleCell> = Vec::with_capacity(cells.len());
        for cell in cells {
            match index.get(cell.id.as_str()) {
                Some(&slot) => {
                    tracing::warn!(
                        target: "terrain_graph::scenario",
                        id = %cell.id,
                        col = cell.col,
                        row = cell.row,
                        "scenario.duplicate_cell_id"
                    );
                    unique[slot] = cell;
                }
                None => {
                    index.insert(cell.id.as_str().to_string(), unique.len());
                    unique.push(cell);
                }
            }
        }
        Self {
            template,
            cells: unique,
        }
    }

    pub fn template(&self) -> &CellTemplate {
        &self.template
    }

    pub fn cells(&self) -> &[SampleCell] {
        &self.cells
    }

    pub fn edge_count(&self) -> usize {
        self.cells.iter().map(|cell| cell.neighborhood.len()).sum()
    }

    /// Pretty JSON with four-space indentation, held in memory.
    pub fn render(&self) -> ConvertResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        Ok(buffer)
    }

    /// Render the document, then hand it to `writer` in one pass. I/O
    /// failures surface as [`ConvertError::SinkWrite`].
    pub fn write_to<W: Write>(&self, writer: W) -> ConvertResult<()> {
        let buffer = self.render()?;
        write_all(writer, &buffer, || "writer".to_string())
    }

    pub fn to_json_string(&self) -> ConvertResult<String> {
        // serde_json only emits UTF-8
        Ok(String::from_utf8_lossy(&self.render()?).into_owned())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> ConvertResult<()> {
        write_sink(path.as_ref(), &self.render()?)
    }
}

/// Serialize `template` and `cells` into `sink`.
pub fn serialize<W: Write>(template: &CellTemplate, cells: &[SampleCell], sink: W) -> ConvertResult<()> {
    Scenario::new(template.clone(), cells.to_vec()).write_to(sink)
}

fn write_all<W: Write>(
    mut writer: W,
    bytes: &[u8],
    sink: impl Fn() -> String,
) -> ConvertResult<()> {
    let sink_err = |source: std::io::Error| ConvertError::SinkWrite {
        sink: sink(),
        source,
    };
    writer.write_all(bytes).map_err(sink_err)?;
    writer.flush().map_err(sink_err)
}

fn write_sink(path: &Path, bytes: &[u8]) -> ConvertResult<()> {
    let sink = || path.display().to_string();
    let file = File::create(path).map_err(|source| ConvertError::SinkWrite {
        sink: sink(),
        source,
    })?;
    write_all(file, bytes, sink)
}

impl Serialize for Scenario {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut root = serializer.serialize_map(Some(1))?;
        root.serialize_entry("cells", &CellsView(self))?;
        root.end()
    }
}

struct CellsView<'a>(&'a Scenario);

impl Serialize for CellsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let scenario = self.0;
        let mut map = serializer.serialize_map(Some(scenario.cells.len() + 1))?;
        map.serialize_entry("default", &scenario.template)?;
        for cell in &scenario.cells {
            map.serialize_entry(
                cell.id.as_str(),
                &CellEntry {
                    state: &cell.state,
                    neighborhood: NeighborhoodView(&cell.neighborhood),
                },
            )?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct CellEntry<'a> {
    state: &'a CellState,
    neighborhood: NeighborhoodView<'a>,
}

struct NeighborhoodView<'a>(&'a [AdjacencyEdge]);

impl Serialize for NeighborhoodView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for edge in self.0 {
            map.serialize_entry(edge.target.as_str(), &edge.weight)?;
        }
        map.end()
    }
}

/// Sidecar describing how a scenario file was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioManifest {
    pub name: String,
    pub generated_at: String,
    pub stride: Stride,
    pub sources: ManifestSources,
    pub cells: usize,
    pub edges: usize,
    pub skipped_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSources {
    pub elevation: PathBuf,
    pub landcover: PathBuf,
    #[serde(default)]
    pub overlay: Option<PathBuf>,
}

impl ScenarioManifest {
    pub fn timestamp() -> String {
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
    }

    /// `<dir>/<stem>.manifest.json` next to the scenario file.
    pub fn path_for(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scenario".to_string());
        output.with_file_name(format!("{stem}.manifest.json"))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> ConvertResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_sink(path.as_ref(), json.as_bytes())
    }

    pub fn load(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| ConvertError::config(format!("{}: {err}", path.display())))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{CellId, TreeSpecies};

    fn cell(at: (f64, f64), col: usize, elevation: u32, targets: &[(f64, f64)]) -> SampleCell {
        let id = CellId::from_world(at.0, at.1);
        SampleCell {
            neighborhood: targets
                .iter()
                .map(|&(x, y)| AdjacencyEdge {
                    source: id.clone(),
                    target: CellId::from_world(x, y),
                    weight: 50,
                })
                .collect(),
            id,
            col,
            row: 0,
            state: CellState {
                elevation,
                tree_type: TreeSpecies::Locust,
                ..CellState::default()
            },
        }
    }

    #[test]
    fn empty_scenario_still_has_default() {
        let scenario = Scenario::new(CellTemplate::default(), Vec::new());
        let json: serde_json::Value =
            serde_json::from_str(&scenario.to_json_string().unwrap()).unwrap();

        let cells = json["cells"].as_object().unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells["default"]["delay"], "inertial");
        assert_eq!(cells["default"]["model"], "plant_population");
        assert_eq!(cells["default"]["state"]["tree_type"], 0);
        assert_eq!(cells["default"]["state"]["current_resources"]["water"], 0);
    }

    #[test]
    fn cells_follow_default_in_insertion_order() {
        let scenario = Scenario::new(
            CellTemplate::default(),
            vec![
                cell((50.0, 0.0), 1, 7, &[(0.0, 0.0)]),
                cell((0.0, 0.0), 0, 3, &[(50.0, 0.0)]),
            ],
        );
        let text = scenario.to_json_string().unwrap();

        let default_at = text.find("\"default\"").unwrap();
        let first_at = text.find("\"50_0\": {").unwrap();
        let second_at = text.find("\"0_0\": {").unwrap();
        assert!(default_at < first_at && first_at < second_at);
        assert!(text.contains("\n        \"default\": {"), "four-space indent expected");

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["cells"]["50_0"]["state"]["elevation"], 7);
        assert_eq!(json["cells"]["50_0"]["state"]["tree_type"], 1);
        assert_eq!(json["cells"]["50_0"]["neighborhood"]["0_0"], 50);
        assert_eq!(scenario.edge_count(), 2);
    }

    #[test]
    fn duplicate_ids_keep_first_slot_and_last_contents() {
        let scenario = Scenario::new(
            CellTemplate::default(),
            vec![
                cell((0.0, 0.0), 0, 1, &[]),
                cell((9.0, 9.0), 1, 2, &[]),
                cell((0.4, 0.7), 2, 3, &[]),
            ],
        );
        assert_eq!(scenario.cells().len(), 2);
        assert_eq!(scenario.cells()[0].id.as_str(), "0_0");
        assert_eq!(scenario.cells()[0].state.elevation, 3);
    }

    #[test]
    fn unwritable_sink_reports_sink_error() {
        let scenario = Scenario::new(CellTemplate::default(), Vec::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("map.json");

        let err = scenario.write_file(&path).unwrap_err();
        assert!(err.is_sink_write(), "unexpected error: {err}");
    }

    struct ReadOnlySink;

    impl Write for ReadOnlySink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only sink",
            ))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failing_writer_reports_sink_error() {
        let err = serialize(&CellTemplate::default(), &[], ReadOnlySink).unwrap_err();
        assert!(err.is_sink_write(), "unexpected error: {err}");
        assert!(err.to_string().contains("read-only sink"));
    }

    #[test]
    fn serialize_writes_whole_document() {
        let mut out = Vec::new();
        serialize(
            &CellTemplate::default(),
            &[cell((0.0, 0.0), 0, 4, &[])],
            &mut out,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["cells"]["0_0"]["state"]["elevation"], 4);
        assert_eq!(json["cells"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn manifest_sits_next_to_output() {
        let path = ScenarioManifest::path_for(Path::new("/tmp/out/map.json"));
        assert_eq!(path, PathBuf::from("/tmp/out/map.manifest.json"));
    }
}
