//! Invoice payload normalization and totals.
//!
//! Two incompatible input schemas arrive at the same endpoint; everything
//! downstream (totals, rendering) works on one canonical model.
//!
//! ```text
//! JSON body ──▶ schema (detect once) ──▶ normalize (defaults) ──▶ totals ──▶ render
//! ```

pub mod model;
pub mod normalize;
pub mod schema;
pub mod totals;
