// SPDX-License-Identifier: MIT
//! # Square Grid Composition
//!
//! Packs up to `cols × cols` frames into one canvas, in the order given, row-major.
//!
//! ## Layout Rules
//!
//! - **Cell size**: `cell_width` wide, height derived from the *first* frame's aspect
//!   ratio; every other frame is forced into that exact cell.
//! - **Canvas**: `cols × cell_width` wide and only as many rows as the batch needs,
//!   so a partial final batch produces a shorter canvas.
//! - **Empty cells**: a `None` entry (undecodable frame) and the unused tail of the last
//!   row stay filled with the background color.
//! - **Labels**: when enabled, each occupied cell gets its label burned into the
//!   top-left corner.

use anyhow::{ensure, Result};
use fast_image_resize::Resizer;

use crate::cpu::scale_rgb_cpu;
use crate::label::{draw_label, scale_for_width};
use crate::presets::{build_plan, ScaleTarget, Size};

/// Grid configuration.
#[derive(Clone, Copy, Debug)]
pub struct GridCfg {
    /// Columns (and maximum rows) of the square grid
    pub cols: u32,
    /// Width of every cell in pixels
    pub cell_width: u32,
    /// Burn labels into the top-left corner of each cell
    pub show_labels: bool,
    /// Canvas background (RGB)
    pub background: [u8; 3],
}

impl Default for GridCfg {
    fn default() -> Self {
        Self {
            cols: 4,
            cell_width: 640,
            show_labels: true,
            background: [0, 0, 0],
        }
    }
}

impl GridCfg {
    /// Maximum number of frames a single grid can hold.
    pub fn capacity(&self) -> usize {
        (self.cols as usize) * (self.cols as usize)
    }
}

/// A borrowed RGB8 frame to place in a cell.
#[derive(Clone, Copy, Debug)]
pub struct CellImage<'a> {
    pub rgb: &'a [u8],
    pub size: Size,
}

/// Computed geometry for one grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    pub cell: Size,
}

impl GridLayout {
    /// Canvas size for this layout.
    pub fn canvas(&self) -> Size {
        Size {
            w: self.cols * self.cell.w,
            h: self.rows * self.cell.h,
        }
    }

    /// Top-left pixel of cell `index` (row-major).
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        let row = index / self.cols;
        let col = index % self.cols;
        (col * self.cell.w, row * self.cell.h)
    }
}

/// Compute the layout for `count` frames whose first frame has size `first`.
pub fn plan_layout(first: Size, count: usize, cfg: GridCfg) -> GridLayout {
    let cols = cfg.cols.max(1);
    let cell = build_plan(first, ScaleTarget::FixedWidth(cfg.cell_width)).out;
    let count = count.min(cfg.capacity()).max(1) as u32;
    let rows = count.div_ceil(cols);
    GridLayout { cols, rows, cell }
}

/// Finished composite image.
#[derive(Clone, Debug)]
pub struct GridCanvas {
    pub rgb: Vec<u8>,
    pub size: Size,
    pub layout: GridLayout,
}

/// Compose `cells` into one canvas.
///
/// The first `Some` entry determines the cell aspect ratio. `labels[i]` is drawn on
/// cell `i` when labels are enabled; missing labels are skipped.
///
/// # Errors
/// Fails when `cells` is empty, exceeds the grid capacity, or holds no decodable frame.
pub fn compose_grid(
    resizer: &mut Resizer,
    cells: &[Option<CellImage<'_>>],
    labels: &[String],
    cfg: GridCfg,
) -> Result<GridCanvas> {
    ensure!(cfg.cols > 0, "grid needs at least one column");
    ensure!(!cells.is_empty(), "grid needs at least one frame");
    ensure!(
        cells.len() <= cfg.capacity(),
        "{} frames exceed a {}x{} grid",
        cells.len(),
        cfg.cols,
        cfg.cols
    );
    let first = cells
        .iter()
        .flatten()
        .next()
        .map(|c| c.size)
        .ok_or_else(|| anyhow::anyhow!("grid has no decodable frame"))?;

    let layout = plan_layout(first, cells.len(), cfg);
    let canvas_size = layout.canvas();
    let mut canvas = vec![0u8; canvas_size.rgb_len()];
    for px in canvas.chunks_exact_mut(3) {
        px.copy_from_slice(&cfg.background);
    }

    let cell_plan = |src: Size| build_plan(src, ScaleTarget::Exact(layout.cell));
    let mut scratch = vec![0u8; layout.cell.rgb_len()];
    let label_scale = scale_for_width(layout.cell.w);

    for (i, cell) in cells.iter().enumerate() {
        let Some(cell) = cell else { continue };
        let plan = cell_plan(cell.size);
        scale_rgb_cpu(resizer, cell.rgb, cell.size, &plan, &mut scratch)?;

        let (x0, y0) = layout.cell_origin(i);
        blit(&mut canvas, canvas_size, &scratch, layout.cell, x0, y0);

        if cfg.show_labels {
            if let Some(text) = labels.get(i) {
                draw_label(&mut canvas, canvas_size, x0 + 2, y0 + 2, text, label_scale);
            }
        }
    }

    Ok(GridCanvas {
        rgb: canvas,
        size: canvas_size,
        layout,
    })
}

/// Copy a tightly packed RGB8 tile into the canvas at (`x0`, `y0`), clipped to the canvas.
fn blit(canvas: &mut [u8], canvas_size: Size, tile: &[u8], tile_size: Size, x0: u32, y0: u32) {
    let copy_w = tile_size.w.min(canvas_size.w.saturating_sub(x0)) as usize;
    let copy_h = tile_size.h.min(canvas_size.h.saturating_sub(y0)) as usize;
    let tile_row = tile_size.w as usize * 3;
    let canvas_row = canvas_size.w as usize * 3;
    for r in 0..copy_h {
        let s = &tile[r * tile_row..r * tile_row + copy_w * 3];
        let off = (y0 as usize + r) * canvas_row + x0 as usize * 3;
        canvas[off..off + copy_w * 3].copy_from_slice(s);
    }
}
