/*
 * @file error.rs
 *
 * Error types for the search core.
 */

use thiserror::Error;

/** Result type alias using this crate's [`Error`]. */
pub type Result<T> = std::result::Result<T, Error>;

/** Errors surfaced by the search core.
 *
 * Shape and bounds violations on internal hot paths (the bit matrix and
 * the row reducer) are programming errors and assert instead.
 * `ShapeMismatch` surfaces when nets are built from caller-supplied
 * matrices; `OutOfBounds` surfaces from the checked coordinate
 * accessors (`Net::try_matrix`, `DigitalNet::gen_value`).
 */
#[derive(Error, Debug)]
pub enum Error {
    /** Impossible or unsupported combination of inputs. */
    #[error("configuration error: {0}")]
    Configuration(String),

    /** Matrix or vector dimensions disagree at a boundary. */
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /** Index into a structure beyond its size. */
    #[error("index {index} out of bounds for size {size}")]
    OutOfBounds { index: usize, size: usize },

    /** The search exhausted its space without a finite-merit candidate. */
    #[error("no candidate found: search exhausted its space")]
    NoCandidate,

    /** Cooperative abort signal propagated up from an evaluator. */
    #[error("merit computation aborted")]
    Aborted,

    /** Kernel or weight argument out of its numeric domain. */
    #[error("numeric domain error: {0}")]
    NumericDomain(String),
}
