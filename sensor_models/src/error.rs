//! Observation-model errors.

/// Failure to evaluate an observation model at a given state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObservationError {
    /// Position too close to the sensor origin for the polar model.
    #[error("degenerate range: px² + py² = {range_sq:e} is below the polar model threshold")]
    DegenerateRange { range_sq: f64 },
}
