//! Neighborhood builder - cardinal adjacency between sampled cells

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fuel::FuelModelTable;
use crate::raster::AlignedLayers;
use crate::sampler::{is_habitable, CellId, SampleCell, Stride};

/// Directed edge from a cell to one of its sampled neighbours.
///
/// The weight is the nominal spacing between adjacent samples, carried as
/// the sampling stride.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjacencyEdge {
    pub source: CellId,
    pub target: CellId,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    East,
    West,
    South,
    North,
}

impl Direction {
    /// Emission order of a cell's neighbourhood.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::South,
        Direction::North,
    ];

    /// `(d_col, d_row)` in pixel units for a stride of one.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::South => (0, 1),
            Direction::North => (0, -1),
        }
    }
}

/// Outgoing edges of `cell`.
///
/// Each direction re-applies the habitability gate at the neighbour pixel
/// instead of consulting the set of already sampled cells, so edges are
/// emitted one cell at a time and symmetry only follows from both ends
/// passing the same test.
///
/// Neighbours whose ids truncate to the same string (pixels smaller than a
/// world unit) collapse onto the first edge, which takes the later weight.
pub fn build_edges(
    cell: &SampleCell,
    layers: &AlignedLayers,
    fuels: &FuelModelTable,
    stride: Stride,
) -> Vec<AdjacencyEdge> {
    let step = i64::from(stride.get());
    let (col, row) = (cell.col as i64, cell.row as i64);

    let mut edges: Vec<AdjacencyEdge> = Vec::with_capacity(Direction::ALL.len());
    let candidates = Direction::ALL
        .iter()
        .filter_map(|direction| {
            let (d_col, d_row) = direction.offset();
            let (n_col, n_row) = (col + d_col * step, row + d_row * step);
            if !is_habitable(layers, fuels, n_col, n_row) {
                return None;
            }
            let (x, y) = layers
                .elevation()
                .transform()
                .apply(n_col as f64, n_row as f64);
            Some(AdjacencyEdge {
                source: cell.id.clone(),
                target: CellId::from_world(x, y),
                weight: stride.get(),
            })
        });
    for edge in candidates {
        match edges.iter_mut().find(|existing| existing.target == edge.target) {
            Some(existing) => *existing = edge,
            None => edges.push(edge),
        }
    }
    edges
}

pub struct NeighborhoodBuilder<'a> {
    layers: &'a AlignedLayers,
    fuels: &'a FuelModelTable,
    stride: Stride,
    parallel: bool,
}

impl<'a> NeighborhoodBuilder<'a> {
    pub fn new(layers: &'a AlignedLayers, fuels: &'a FuelModelTable, stride: Stride) -> Self {
        Self {
            layers,
            fuels,
            stride,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fill in every cell's neighbourhood and return the total edge count.
    pub fn attach(&self, cells: &mut [SampleCell]) -> usize {
        let fill = |cell: &mut SampleCell| {
            cell.neighborhood = build_edges(cell, self.layers, self.fuels, self.stride);
            cell.neighborhood.len()
        };
        let edges = if self.parallel {
            cells.par_iter_mut().map(fill).sum()
        } else {
            cells.iter_mut().map(fill).sum()
        };
        tracing::debug!(
            target: "terrain_graph::neighborhood",
            cells = cells.len(),
            edges,
            "neighborhood.attached"
        );
        edges
    }
}
