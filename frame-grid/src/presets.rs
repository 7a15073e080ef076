// SPDX-License-Identifier: MIT
//! # Scale Plan Computation
//!
//! Computes output dimensions for a frame before it is resized into a grid cell.
//!
//! A [`ScaleTarget`] names the constraint and [`build_plan`] turns it into a
//! [`ScalePlan`] holding the final output size.
//!
//! Grid cells are sized once per batch from the first frame (fixed width, preserved
//! aspect) and every frame of the batch is then forced into that exact cell.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    /// Number of bytes for a tightly packed RGB8 buffer of this size.
    pub fn rgb_len(self) -> usize {
        (self.w as usize) * (self.h as usize) * 3
    }
}

/// Defines the target size constraint for scaling operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Force the width, derive the height from the aspect ratio (upscaling allowed).
    FixedWidth(u32),
    /// Stretch or squeeze into exactly these dimensions.
    Exact(Size),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target size constraint used for planning
    pub target: ScaleTarget,
    /// Final computed output dimensions
    pub out: Size,
}

/// Compute a complete scaling plan from input parameters.
///
/// # Arguments
/// * `input` - Source image dimensions
/// * `target` - Size constraint to apply
pub fn build_plan(input: Size, target: ScaleTarget) -> ScalePlan {
    let out = match target {
        ScaleTarget::FixedWidth(w) => fit_width(input, w),
        ScaleTarget::Exact(out) => Size {
            w: out.w.max(1),
            h: out.h.max(1),
        },
    };
    ScalePlan { input, target, out }
}

/// Derive the height for a fixed width while keeping the input aspect ratio.
fn fit_width(input: Size, width: u32) -> Size {
    let width = width.max(1);
    if input.w == 0 {
        return Size { w: width, h: 1 };
    }
    let ratio = f64::from(input.h) / f64::from(input.w);
    Size {
        w: width,
        h: ((f64::from(width) * ratio) as u32).max(1),
    }
}
