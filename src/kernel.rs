/// Convolution kernel math
///
/// Produces the weight tables consumed by the filter programs:
/// - Normalized Gaussian tables (blur and the spatial part of bilateral)
/// - The fixed 3x3 sharpening table
/// - The fixed 3x3 gradient / Laplacian tables for edge detection
///
/// Every table is row-major, top-left to bottom-right. The top row is the
/// +y offset row, matching the order the Gaussian is generated in.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FilterError, Result};

/// Smallest deviation accepted by the Gaussian formula
pub const MIN_DEVIATION: f32 = 1e-3;

/// Smallest range accepted by the bilateral intensity term
pub const MIN_RANGE: f32 = 1e-3;

/// Largest kernel is 9x9
pub const MAX_WEIGHTS: usize = 81;

/// Number of vec4 rows needed to upload `MAX_WEIGHTS` floats
pub const WEIGHT_ROWS: usize = (MAX_WEIGHTS + 3) / 4;

/// Supported kernel edge lengths
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum KernelSize {
    #[default]
    Three,
    Five,
    Seven,
    Nine,
}

impl KernelSize {
    pub const ALL: [KernelSize; 4] = [Self::Three, Self::Five, Self::Seven, Self::Nine];

    /// Edge length in texels
    pub fn get(self) -> usize {
        match self {
            Self::Three => 3,
            Self::Five => 5,
            Self::Seven => 7,
            Self::Nine => 9,
        }
    }

    /// Distance from the centre to the border (size / 2)
    pub fn half_width(self) -> i32 {
        (self.get() / 2) as i32
    }

    /// Map a kernel-size slider position (0..=3) to a size
    pub fn from_slider_index(index: u8) -> Result<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| FilterError::invalid(format!("kernel size slider index {index} out of 0..=3")))
    }

    /// Inverse of `from_slider_index`
    pub fn slider_index(self) -> u8 {
        match self {
            Self::Three => 0,
            Self::Five => 1,
            Self::Seven => 2,
            Self::Nine => 3,
        }
    }
}

impl TryFrom<u32> for KernelSize {
    type Error = FilterError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            3 => Ok(Self::Three),
            5 => Ok(Self::Five),
            7 => Ok(Self::Seven),
            9 => Ok(Self::Nine),
            other => Err(FilterError::invalid(format!(
                "kernel size {other} is not one of 3, 5, 7, 9"
            ))),
        }
    }
}

impl From<KernelSize> for u32 {
    fn from(size: KernelSize) -> Self {
        size.get() as u32
    }
}

impl fmt::Display for KernelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.get();
        write!(f, "{n}x{n}")
    }
}

/// Edge detection operators
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdgeAlgorithm {
    #[default]
    LaplacianOfGaussian,
    Sobel,
    Prewitt,
}

impl EdgeAlgorithm {
    pub const ALL: [EdgeAlgorithm; 3] = [Self::LaplacianOfGaussian, Self::Sobel, Self::Prewitt];

    /// Sobel and Prewitt run as separate x and y passes
    pub fn is_two_pass(self) -> bool {
        matches!(self, Self::Sobel | Self::Prewitt)
    }
}

impl fmt::Display for EdgeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LaplacianOfGaussian => "Laplacian of Gaussian",
            Self::Sobel => "Sobel",
            Self::Prewitt => "Prewitt",
        };
        f.write_str(name)
    }
}

/// Which pass an edge kernel is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePass {
    /// One-pass operators (LoG)
    Single,
    /// x direction of a separable operator
    First,
    /// y direction of a separable operator
    Second,
}

/// A square table of weights, row-major from the top-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    size: usize,
    weights: Vec<f32>,
}

impl Kernel {
    fn fixed(weights: [f32; 9]) -> Self {
        Self {
            size: 3,
            weights: weights.to_vec(),
        }
    }

    /// Edge length
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Weight at offset (x, y) from the centre, y pointing up
    pub fn weight_at(&self, x: i32, y: i32) -> Option<f32> {
        let half = (self.size / 2) as i32;
        if x.abs() > half || y.abs() > half {
            return None;
        }
        let row = (half - y) as usize;
        let col = (x + half) as usize;
        self.weights.get(row * self.size + col).copied()
    }
}

/// Spatial table plus the intensity sensitivity for the bilateral program
#[derive(Debug, Clone, PartialEq)]
pub struct BilateralKernel {
    pub spatial: Kernel,
    pub range: f32,
}

/// Normalized Gaussian kernel of the given size
///
/// A deviation at or below zero (or NaN) is clamped to `MIN_DEVIATION`
/// so the weights stay finite.
pub fn gaussian_kernel(size: KernelSize, sigma: f32) -> Kernel {
    let sigma = clamp_deviation(sigma);
    let n = size.get();
    let half = size.half_width();

    let two_sigma_sq = 2.0 * f64::from(sigma) * f64::from(sigma);
    let scale = 1.0 / (std::f64::consts::PI * two_sigma_sq);

    let mut raw = Vec::with_capacity(n * n);
    for y in (-half..=half).rev() {
        for x in -half..=half {
            let r_sq = f64::from(x * x + y * y);
            raw.push(scale * (-r_sq / two_sigma_sq).exp());
        }
    }

    let sum: f64 = raw.iter().sum();
    let weights = raw.iter().map(|w| (w / sum) as f32).collect();

    Kernel { size: n, weights }
}

/// Spatial weight table for the bilateral filter
///
/// The range term depends on the sampled pixels, so it is applied by the
/// program; here it is only clamped and passed along.
pub fn bilateral_kernel(size: KernelSize, sigma: f32, range: f32) -> BilateralKernel {
    BilateralKernel {
        spatial: gaussian_kernel(size, sigma),
        range: clamp_range(range),
    }
}

/// Fixed 3x3 sharpening table (sum 0); the scale factor is applied by the program
pub fn sharpening_kernel() -> Kernel {
    Kernel::fixed([0.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 0.0])
}

/// Fixed gradient / Laplacian table for an (algorithm, pass) pair
pub fn edge_kernel(algorithm: EdgeAlgorithm, pass: EdgePass) -> Result<Kernel> {
    let weights = match (algorithm, pass) {
        (EdgeAlgorithm::LaplacianOfGaussian, EdgePass::Single) => {
            [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0]
        }
        (EdgeAlgorithm::Sobel, EdgePass::First) => {
            [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0]
        }
        (EdgeAlgorithm::Sobel, EdgePass::Second) => {
            [1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0]
        }
        (EdgeAlgorithm::Prewitt, EdgePass::First) => {
            [-1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0]
        }
        (EdgeAlgorithm::Prewitt, EdgePass::Second) => {
            [1.0, 1.0, 1.0, 0.0, 0.0, 0.0, -1.0, -1.0, -1.0]
        }
        (algorithm, pass) => {
            return Err(FilterError::invalid(format!(
                "no edge kernel for {algorithm} in pass {pass:?}"
            )))
        }
    };
    Ok(Kernel::fixed(weights))
}

pub(crate) fn clamp_deviation(sigma: f32) -> f32 {
    let clamped = sigma.max(MIN_DEVIATION);
    if clamped != sigma {
        debug!(sigma, clamped, "clamped degenerate deviation");
    }
    clamped
}

pub(crate) fn clamp_range(range: f32) -> f32 {
    let clamped = range.max(MIN_RANGE);
    if clamped != range {
        debug!(range, clamped, "clamped degenerate range");
    }
    clamped
}
