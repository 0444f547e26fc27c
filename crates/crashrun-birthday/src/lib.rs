//! # crashrun-birthday
//!
//! Birthday-bound collision probability curves.
//!
//! Estimates how likely at least one collision is among `k` uniformly random
//! values from a fixed-size hash space, for increasing `k`, and stops once the
//! estimate is numerically indistinguishable from 1.
//!
//! ## Example
//!
//! ```rust
//! use crashrun_birthday::{write_curve, CollisionCurve, CurveParams, OutputFormat};
//!
//! let mut out = Vec::new();
//! let records = write_curve(&mut out, CollisionCurve::new(CurveParams::default()), OutputFormat::Plain)?;
//! assert_eq!(records, 1904);
//! # Ok::<(), crashrun_birthday::BirthdayError>(())
//! ```

pub mod curve;
pub mod error;
pub mod report;

pub use curve::{
    collision_probability, saturation_point, CollisionCurve, CurveParams, CurvePoint, DEFAULT_SPACE_SIZE, MAX_TRIALS,
    SPACE_BITS, TOLERANCE,
};
pub use error::{BirthdayError, Result};
pub use report::{write_curve, OutputFormat, CSV_HEADER};
