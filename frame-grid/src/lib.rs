// SPDX-License-Identifier: MIT
//! # frame-grid: Frame Scaling and Grid Composition for VLM Review
//!
//! This crate packs several video frames into one composite image so that a single
//! vision-model request can inspect many moments of a clip at once.
//!
//! ## Architecture Overview
//!
//! The crate is designed around three core principles:
//! 1. **Caller-owned pixels**: every operation works on tightly packed RGB8 buffers
//! 2. **SIMD acceleration**: use fast_image_resize for CPU-optimized scaling
//! 3. **Traceability**: every cell can carry a burned-in timestamp label
//!
//! ## Key Components
//!
//! - [`presets`]: Scale plan computation (fixed cell width, exact cell box)
//! - [`cpu`]: CPU-based scaling implementation using SIMD acceleration
//! - [`grid`]: Square grid layout and canvas composition
//! - [`label`]: Minimal bitmap font for `mm:ss.cc` labels and annotation bands
//!
//! ## Usage Example
//!
//! ```rust
//! use frame_grid::grid::{compose_grid, CellImage, GridCfg};
//! use frame_grid::presets::Size;
//!
//! let frame = vec![200u8; 64 * 36 * 3];
//! let cells = vec![Some(CellImage { rgb: &frame, size: Size { w: 64, h: 36 } })];
//! let labels = vec!["00:01.50".to_string()];
//!
//! let mut resizer = fast_image_resize::Resizer::new();
//! let cfg = GridCfg { cols: 2, cell_width: 32, ..GridCfg::default() };
//! let canvas = compose_grid(&mut resizer, &cells, &labels, cfg)?;
//! assert_eq!(canvas.size, Size { w: 64, h: 18 });
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cpu;
pub mod grid;
pub mod label;
pub mod presets;
