//! # Trendwire Shared Types
//!
//! Market and signal primitives shared by every Trendwire component.
//!
//! ## Design Philosophy
//!
//! - **One type per concept**: `Bar`/`Series` for price history, `Timeframe` for
//!   bar duration, `Direction`/`SignalEvent` for outbound signals.
//! - **Validated at the boundary**: a `Series` is sorted ascending with unique
//!   timestamps by construction; downstream code never re-checks ordering.
//! - **Explicit undefined**: indicator warm-up values are `Option<f64>`, never a
//!   silent zero.

pub mod bar;
pub mod signal;
pub mod timeframe;

pub use bar::{Bar, Series, SeriesError};
pub use signal::{Direction, SignalEvent, SignalPayload};
pub use timeframe::Timeframe;
