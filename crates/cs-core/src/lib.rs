//! cs-core: stable foundation for carbspec.
//!
//! Contains:
//! - error (shared error taxonomy)
//! - numeric (finiteness/positivity checks, polynomial evaluation)
//! - units (uom SI types + constructors)
//! - state (seawater state shared by every equilibrium-constant function)
//! - correlated (first-order uncertainty propagation)

pub mod correlated;
pub mod error;
pub mod numeric;
pub mod state;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use correlated::{CorrelatedValue, UncertaintyBasis, correlated_values};
pub use error::{CsError, CsResult};
pub use numeric::*;
pub use state::SeawaterState;
pub use units::*;
