//! Measurement oracle contract.
//!
//! The packer and splitter never lay out text themselves; they ask a
//! [`Measure`] implementation how tall a candidate render unit would be at the
//! content width. Implementations must be pure functions of `(unit, width)`:
//! binary search relies on repeatable answers. [`crate::metrics::TextMetrics`]
//! is the built-in oracle; hosts with a real layout engine plug in their own.

use crate::error::LayoutError;
use crate::plan::RenderUnit;

pub trait Measure {
    /// Rendered height of `unit` at `width`, in the page's unit system.
    fn measure(&self, unit: &RenderUnit, width: f32) -> Result<f32, LayoutError>;
}

/// Infallible closures are oracles too.
impl<F> Measure for F
where
    F: Fn(&RenderUnit, f32) -> f32,
{
    fn measure(&self, unit: &RenderUnit, width: f32) -> Result<f32, LayoutError> {
        Ok(self(unit, width))
    }
}

/// Ask `oracle` for a height and reject values the packer cannot use.
pub fn measure_unit<M: Measure + ?Sized>(
    oracle: &M,
    unit: &RenderUnit,
    width: f32,
) -> Result<f32, LayoutError> {
    let height = oracle.measure(unit, width)?;
    if !height.is_finite() || height < 0.0 {
        return Err(LayoutError::InvalidHeight {
            height,
            unit: unit.kind(),
        });
    }
    Ok(height)
}
