/// Active filter selection and parameters
///
/// At most one filter is active at a time. The selector remembers the last
/// parameters of every filter, so switching back to a filter restores its
/// sliders. The whole selection serializes to JSON for session persistence.

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::kernel::{self, EdgeAlgorithm, KernelSize};

/// Upper bound of the sharpening scale factor
pub const MAX_SCALE_FACTOR: f32 = 50.0;

/// The selectable filters
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Blur,
    Bilateral,
    Sharpen,
    Edge,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [Self::Blur, Self::Bilateral, Self::Sharpen, Self::Edge];

    pub fn label(self) -> &'static str {
        match self {
            Self::Blur => "Gaussian Blur",
            Self::Bilateral => "Bilateral Filter",
            Self::Sharpen => "Sharpening",
            Self::Edge => "Edge Detection",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BlurParams {
    pub kernel_size: KernelSize,
    /// Standard deviation of the Gaussian, > 0
    pub deviation: f32,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            kernel_size: KernelSize::Three,
            deviation: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BilateralParams {
    pub kernel_size: KernelSize,
    /// Spatial standard deviation, > 0
    pub deviation: f32,
    /// Intensity-difference sensitivity, > 0
    pub range: f32,
}

impl Default for BilateralParams {
    fn default() -> Self {
        Self {
            kernel_size: KernelSize::Three,
            deviation: 0.5,
            range: 0.1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct SharpenParams {
    /// Strength of the Laplacian added back, 0..=50
    pub scale_factor: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeParams {
    pub algorithm: EdgeAlgorithm,
}

/// Parameters of one filter, tagged by kind
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterParams {
    Blur(BlurParams),
    Bilateral(BilateralParams),
    Sharpen(SharpenParams),
    Edge(EdgeParams),
}

impl FilterParams {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Blur(_) => FilterKind::Blur,
            Self::Bilateral(_) => FilterKind::Bilateral,
            Self::Sharpen(_) => FilterKind::Sharpen,
            Self::Edge(_) => FilterKind::Edge,
        }
    }

    /// Default parameters for a kind
    pub fn default_for(kind: FilterKind) -> Self {
        match kind {
            FilterKind::Blur => Self::Blur(BlurParams::default()),
            FilterKind::Bilateral => Self::Bilateral(BilateralParams::default()),
            FilterKind::Sharpen => Self::Sharpen(SharpenParams::default()),
            FilterKind::Edge => Self::Edge(EdgeParams::default()),
        }
    }

    /// Same parameters with every value clamped into its domain
    pub fn clamped(self) -> Self {
        match self {
            Self::Blur(mut p) => {
                p.deviation = kernel::clamp_deviation(p.deviation);
                Self::Blur(p)
            }
            Self::Bilateral(mut p) => {
                p.deviation = kernel::clamp_deviation(p.deviation);
                p.range = kernel::clamp_range(p.range);
                Self::Bilateral(p)
            }
            Self::Sharpen(mut p) => {
                p.scale_factor = clamp_scale_factor(p.scale_factor);
                Self::Sharpen(p)
            }
            Self::Edge(p) => Self::Edge(p),
        }
    }

    /// Number of passes this filter needs
    pub fn plan(&self) -> PassPlan {
        match self {
            Self::Edge(edge) if edge.algorithm.is_two_pass() => PassPlan::TwoPass,
            _ => PassPlan::OnePass,
        }
    }
}

/// Whether a frame is rendered straight to the screen or through an
/// off-screen intermediate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPlan {
    OnePass,
    TwoPass,
}

/// A single-field change coming from a UI control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamUpdate {
    KernelSize(KernelSize),
    Deviation(f32),
    Range(f32),
    ScaleFactor(f32),
    EdgeAlgorithm(EdgeAlgorithm),
}

/// Mutually exclusive filter state
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FilterSelector {
    active: Option<FilterKind>,
    #[serde(default)]
    blur: BlurParams,
    #[serde(default)]
    bilateral: BilateralParams,
    #[serde(default)]
    sharpen: SharpenParams,
    #[serde(default)]
    edge: EdgeParams,
}

impl FilterSelector {
    /// Nothing active, every filter at its default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `params`' filter with those parameters, deactivating any other
    pub fn set_active(&mut self, params: FilterParams) {
        self.store(params);
        self.active = Some(params.kind());
    }

    /// Activate a filter with its remembered parameters
    pub fn activate(&mut self, kind: FilterKind) {
        self.active = Some(kind);
    }

    /// Turn `kind` off if it is the active filter
    ///
    /// Returns whether anything changed.
    pub fn deactivate(&mut self, kind: FilterKind) -> bool {
        if self.active == Some(kind) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Checkbox entry point
    pub fn toggle(&mut self, kind: FilterKind, enabled: bool) {
        if enabled {
            self.activate(kind);
        } else {
            self.deactivate(kind);
        }
    }

    /// Back to the original image
    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Change one field of the active filter
    ///
    /// Fails without touching anything if the active filter has no such field.
    pub fn update_parameter(&mut self, update: ParamUpdate) -> Result<()> {
        match (self.active, update) {
            (Some(FilterKind::Blur), ParamUpdate::KernelSize(size)) => {
                self.blur.kernel_size = size;
            }
            (Some(FilterKind::Blur), ParamUpdate::Deviation(deviation)) => {
                self.blur.deviation = kernel::clamp_deviation(deviation);
            }
            (Some(FilterKind::Bilateral), ParamUpdate::KernelSize(size)) => {
                self.bilateral.kernel_size = size;
            }
            (Some(FilterKind::Bilateral), ParamUpdate::Deviation(deviation)) => {
                self.bilateral.deviation = kernel::clamp_deviation(deviation);
            }
            (Some(FilterKind::Bilateral), ParamUpdate::Range(range)) => {
                self.bilateral.range = kernel::clamp_range(range);
            }
            (Some(FilterKind::Sharpen), ParamUpdate::ScaleFactor(scale)) => {
                self.sharpen.scale_factor = clamp_scale_factor(scale);
            }
            (Some(FilterKind::Edge), ParamUpdate::EdgeAlgorithm(algorithm)) => {
                self.edge.algorithm = algorithm;
            }
            (active, update) => {
                return Err(FilterError::invalid(format!(
                    "{update:?} does not apply to the active filter ({active:?})"
                )));
            }
        }
        Ok(())
    }

    pub fn is_active(&self, kind: FilterKind) -> bool {
        self.active == Some(kind)
    }

    pub fn active_kind(&self) -> Option<FilterKind> {
        self.active
    }

    /// Parameters of the active filter, `None` for pass-through
    pub fn active(&self) -> Option<FilterParams> {
        self.active.map(|kind| self.params(kind))
    }

    /// Remembered parameters of any filter, active or not
    pub fn params(&self, kind: FilterKind) -> FilterParams {
        match kind {
            FilterKind::Blur => FilterParams::Blur(self.blur),
            FilterKind::Bilateral => FilterParams::Bilateral(self.bilateral),
            FilterKind::Sharpen => FilterParams::Sharpen(self.sharpen),
            FilterKind::Edge => FilterParams::Edge(self.edge),
        }
    }

    /// Two passes only for an active Sobel or Prewitt edge filter
    pub fn current_plan(&self) -> PassPlan {
        self.active()
            .map(|params| params.plan())
            .unwrap_or(PassPlan::OnePass)
    }

    /// Serialize the selection for storage
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored selection, clamping any out-of-domain values
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let mut selector: Self = serde_json::from_str(json)?;
        selector.normalize();
        Ok(selector)
    }

    /// Clamp every remembered parameter into its domain
    pub fn normalize(&mut self) {
        for kind in FilterKind::ALL {
            self.store(self.params(kind));
        }
    }

    fn store(&mut self, params: FilterParams) {
        match params.clamped() {
            FilterParams::Blur(p) => self.blur = p,
            FilterParams::Bilateral(p) => self.bilateral = p,
            FilterParams::Sharpen(p) => self.sharpen = p,
            FilterParams::Edge(p) => self.edge = p,
        }
    }
}

fn clamp_scale_factor(scale: f32) -> f32 {
    if scale.is_nan() {
        0.0
    } else {
        scale.clamp(0.0, MAX_SCALE_FACTOR)
    }
}
