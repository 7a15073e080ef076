//! Grid batching: pack consecutive samples into square composite images.
//!
//! Each grid holds up to `cols × cols` samples in temporal order, scaled to a fixed cell
//! width using the aspect ratio of the grid's first sample, with `mm:ss.cc` burned into
//! every cell. The batch keeps its cell timestamps so a cell reference in a review
//! response can be mapped back to a real sample time.

use fast_image_resize::Resizer;
use frame_grid::grid::{compose_grid, CellImage, GridCfg};
use frame_grid::label::format_timestamp;
use frame_grid::presets::Size;
use image::RgbImage;
use tracing::{debug, warn};

use crate::config::GridOptions;
use crate::error::ReviewError;
use crate::sampling::Sample;
use crate::video::encode_jpeg;

/// JPEG quality for composite grids; higher than single samples since cells are small.
pub const GRID_JPEG_QUALITY: u8 = 90;

/// One composite image and the timestamps of its cells, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GridBatch {
    pub image: Vec<u8>,
    pub timestamps: Vec<f64>,
    pub cols: u32,
    pub width: u32,
    pub height: u32,
}

impl GridBatch {
    /// `"12.0s ~ 27.5s"`
    pub fn time_range(&self) -> String {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => format!("{first:.1}s ~ {last:.1}s"),
            _ => String::new(),
        }
    }

    /// Map a cell label from a review response onto the closest cell timestamp.
    /// Labels that do not parse resolve to the first cell.
    pub fn resolve_timestamp(&self, label: &str) -> f64 {
        let first = self.timestamps.first().copied().unwrap_or(0.0);
        let Some(wanted) = parse_cell_timestamp(label) else {
            return first;
        };
        self.timestamps
            .iter()
            .copied()
            .min_by(|a, b| (a - wanted).abs().total_cmp(&(b - wanted).abs()))
            .unwrap_or(first)
    }
}

/// Parse `m:ss.cc`, `mm:ss.cc`, `h:mm:ss`, `12.5s` or plain seconds.
pub fn parse_cell_timestamp(label: &str) -> Option<f64> {
    let s = label
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    if s.is_empty() {
        return None;
    }
    if let Some(secs) = s.strip_suffix('s').or_else(|| s.strip_suffix('S')) {
        return secs.trim().parse::<f64>().ok().filter(|v| *v >= 0.0);
    }
    if s.contains(':') {
        let mut total = 0.0;
        for part in s.split(':') {
            let v: f64 = part.trim().parse().ok()?;
            if v < 0.0 {
                return None;
            }
            total = total * 60.0 + v;
        }
        return Some(total);
    }
    s.parse::<f64>().ok().filter(|v| *v >= 0.0)
}

/// Builds composite grids, reusing one resizer across batches.
pub struct GridBatcher {
    resizer: Resizer,
    cfg: GridCfg,
}

impl GridBatcher {
    pub fn new(opts: &GridOptions) -> Self {
        Self {
            resizer: Resizer::new(),
            cfg: GridCfg {
                cols: opts.cols.max(1),
                cell_width: opts.cell_width,
                show_labels: opts.show_labels,
                background: [0, 0, 0],
            },
        }
    }

    pub fn capacity(&self) -> usize {
        self.cfg.capacity()
    }

    /// Pack `samples` into grids, preserving their order.
    ///
    /// Samples whose image does not decode leave a blank cell. A chunk with no
    /// decodable sample at all is skipped.
    pub fn batch(&mut self, samples: &[Sample]) -> Vec<GridBatch> {
        let mut out = Vec::new();
        for (n, chunk) in samples.chunks(self.capacity()).enumerate() {
            match self.build_one(chunk) {
                Ok(batch) => out.push(batch),
                Err(e) => warn!(batch = n, error = %e, "skipping grid"),
            }
        }
        debug!(samples = samples.len(), grids = out.len(), cols = self.cfg.cols, "grid batching done");
        out
    }

    fn build_one(&mut self, chunk: &[Sample]) -> Result<GridBatch, ReviewError> {
        let decoded: Vec<Option<RgbImage>> = chunk
            .iter()
            .map(|s| match image::load_from_memory(&s.image) {
                Ok(img) => Some(img.to_rgb8()),
                Err(e) => {
                    warn!(timestamp = s.timestamp, error = %e, "sample image does not decode, leaving cell blank");
                    None
                }
            })
            .collect();

        let cells: Vec<Option<CellImage<'_>>> = decoded
            .iter()
            .map(|img| {
                img.as_ref().map(|img| CellImage {
                    rgb: img.as_raw(),
                    size: Size {
                        w: img.width(),
                        h: img.height(),
                    },
                })
            })
            .collect();
        let labels: Vec<String> = chunk.iter().map(|s| format_timestamp(s.timestamp)).collect();

        let canvas = compose_grid(&mut self.resizer, &cells, &labels, self.cfg).map_err(ReviewError::grid)?;
        let image = encode_jpeg(&canvas.rgb, canvas.size.w, canvas.size.h, GRID_JPEG_QUALITY)?;

        Ok(GridBatch {
            image,
            timestamps: chunk.iter().map(|s| s.timestamp).collect(),
            cols: canvas.layout.cols,
            width: canvas.size.w,
            height: canvas.size.h,
        })
    }
}

/// Convenience wrapper for a one-off batching pass.
pub fn batch(samples: &[Sample], opts: &GridOptions) -> Vec<GridBatch> {
    GridBatcher::new(opts).batch(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_sample(timestamp: f64, w: u32, h: u32, v: u8) -> Sample {
        Sample {
            timestamp,
            frame_index: (timestamp * 30.0) as u64,
            image: encode_jpeg(&vec![v; (w * h * 3) as usize], w, h, 85).unwrap(),
            width: w,
            height: h,
        }
    }

    fn opts(cols: u32, cell_width: u32) -> GridOptions {
        GridOptions {
            enabled: true,
            cols,
            cell_width,
            show_labels: true,
        }
    }

    #[test]
    fn parses_cell_labels() {
        assert_eq!(parse_cell_timestamp("0:18.00"), Some(18.0));
        assert_eq!(parse_cell_timestamp("01:02.50"), Some(62.5));
        assert_eq!(parse_cell_timestamp("[00:03.25]"), Some(3.25));
        assert_eq!(parse_cell_timestamp("12.5s"), Some(12.5));
        assert_eq!(parse_cell_timestamp("7"), Some(7.0));
        assert_eq!(parse_cell_timestamp("1:00:00"), Some(3600.0));
        assert_eq!(parse_cell_timestamp("bottom right"), None);
        assert_eq!(parse_cell_timestamp(""), None);
    }

    #[test]
    fn resolves_to_nearest_cell() {
        let batch = GridBatch {
            image: Vec::new(),
            timestamps: vec![16.0, 17.0, 18.0, 19.0],
            cols: 2,
            width: 0,
            height: 0,
        };
        assert_eq!(batch.resolve_timestamp("0:18.30"), 18.0);
        assert_eq!(batch.resolve_timestamp("0:40"), 19.0);
        assert_eq!(batch.resolve_timestamp("somewhere"), 16.0);
        assert_eq!(batch.time_range(), "16.0s ~ 19.0s");
    }

    #[test]
    fn packs_square_grids_with_partial_tail() {
        let samples: Vec<Sample> = (0..5).map(|i| jpeg_sample(i as f64, 64, 36, 100)).collect();
        let grids = batch(&samples, &opts(2, 32));
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0].timestamps, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(grids[1].timestamps, vec![4.0]);
        assert_eq!((grids[0].width, grids[0].height), (64, 36));
        // partial grid still has full columns, one row
        assert_eq!((grids[1].width, grids[1].height), (64, 18));
        let decoded = image::load_from_memory(&grids[0].image).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 36));
    }

    #[test]
    fn undecodable_chunk_is_skipped() {
        let mut broken = jpeg_sample(0.0, 16, 16, 0);
        broken.image = vec![1, 2, 3];
        let good = jpeg_sample(5.0, 16, 16, 50);
        let grids = batch(&[broken.clone(), good], &opts(1, 16));
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].timestamps, vec![5.0]);

        let grids = batch(&[broken], &opts(1, 16));
        assert!(grids.is_empty());
    }

    #[test]
    fn blank_cell_keeps_its_timestamp() {
        let mut broken = jpeg_sample(1.0, 16, 16, 0);
        broken.image.truncate(4);
        let samples = vec![jpeg_sample(0.0, 16, 16, 200), broken];
        let grids = batch(&samples, &opts(2, 16));
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].timestamps, vec![0.0, 1.0]);
    }
}
