// Grid cells, resources, and the harvested-cell active set

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Good, Position, Tick};

/// A regenerating resource patch on one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: Good,
    pub amount: Decimal,
    pub original_amount: Decimal,
    pub last_harvested_tick: Option<Tick>,
}

impl Resource {
    pub fn new(kind: Good, amount: Decimal) -> Self {
        Self {
            kind,
            amount,
            original_amount: amount,
            last_harvested_tick: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.amount >= self.original_amount
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    pub resource: Option<Resource>,
}

/// W×H cell array plus the active set of cells that have been harvested
/// and not yet regenerated to full. Regeneration iterates only the active
/// set, never the whole grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
    cells: Vec<Cell>,
    pub harvested_cells: BTreeSet<Position>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); (width * height) as usize],
            harvested_cells: BTreeSet::new(),
        }
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: Position) -> usize {
        (pos.y as u32 * self.width + pos.x as u32) as usize
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.in_bounds(pos).then(|| &self.cells[self.index(pos)])
    }

    pub fn cell_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    pub fn resource(&self, pos: Position) -> Option<&Resource> {
        self.cell(pos).and_then(|c| c.resource.as_ref())
    }

    pub fn resource_mut(&mut self, pos: Position) -> Option<&mut Resource> {
        self.cell_mut(pos).and_then(|c| c.resource.as_mut())
    }

    pub fn place_resource(&mut self, pos: Position, resource: Resource) {
        if let Some(cell) = self.cell_mut(pos) {
            cell.resource = Some(resource);
        }
    }

    /// Positions with a resource present, in lexicographic order.
    /// Used for snapshots and conservation accounting.
    pub fn resource_positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let pos = Position::new(x, y);
                if self.resource(pos).is_some() {
                    positions.push(pos);
                }
            }
        }
        positions
    }

    pub fn mark_harvested(&mut self, pos: Position) {
        self.harvested_cells.insert(pos);
    }
}
