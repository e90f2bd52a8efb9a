//! Environment-driven configuration, read fresh on every allocation:
//! placement policy selection and debug scribbling.

use std::env;

/// Name of the environment variable selecting the placement policy.
const ALGORITHM_VAR: &str = "ALLOCATOR_ALGORITHM";
/// Name of the environment variable enabling payload scribbling.
const SCRIBBLE_VAR: &str = "ALLOCATOR_SCRIBBLE";

/// Byte written into freshly returned payloads when scribbling is enabled.
pub(crate) const SCRIBBLE_BYTE: u8 = 0xAA;

/// Free-space placement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Policy {
    FirstFit,
    BestFit,
    WorstFit,
}

impl Policy {
    /// Reads [`ALGORITHM_VAR`] from the environment. Unknown or absent
    /// values fall back to [`Policy::FirstFit`].
    pub(crate) fn from_env() -> Self {
        match env::var(ALGORITHM_VAR) {
            Ok(value) => match value.as_str() {
                "first_fit" => Policy::FirstFit,
                "best_fit" => Policy::BestFit,
                "worst_fit" => Policy::WorstFit,
                other => {
                    tracing::warn!(value = other, "unknown ALLOCATOR_ALGORITHM, using first_fit");
                    Policy::FirstFit
                }
            },
            Err(_) => Policy::FirstFit,
        }
    }
}

/// Reads [`SCRIBBLE_VAR`] from the environment: `"1"` enables scribbling,
/// anything else (including unset) disables it.
pub(crate) fn scribble_enabled() -> bool {
    matches!(env::var(SCRIBBLE_VAR), Ok(v) if v == "1")
}
