//! # almacen-core: Pure Business Logic for the Almacén Ledger
//!
//! This crate is the heart of the inventory-transactional ledger. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Request layer (out of scope)               │
//! │        auth • role checks • DTO shape validation            │
//! └────────────────────────────┬────────────────────────────────┘
//!                              │
//! ┌────────────────────────────▼────────────────────────────────┐
//! │                ★ almacen-core (THIS CRATE) ★                │
//! │                                                             │
//! │   types      money       validation     sale     layaway    │
//! │   StockEntry Money(i64)  re-validate    totals   state      │
//! │   Sale/Plan  no floats   everything     math     machine    │
//! │                                                             │
//! │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS        │
//! └────────────────────────────┬────────────────────────────────┘
//!                              │
//! ┌────────────────────────────▼────────────────────────────────┐
//! │                 almacen-db (SQLite layer)                   │
//! │       repositories • transactional services • retries       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (StockEntry, Sale, LayawayPlan, Abono, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Typed domain errors
//! - [`validation`] - Business rule validation for operation inputs
//! - [`sale`] - Sale total computation (discount clamping)
//! - [`layaway`] - Layaway debt arithmetic and state machine
//!
//! ## Design Principles
//!
//! 1. **Pure functions**: same input, same output, every time
//! 2. **No I/O**: database, network and file access are forbidden here
//! 3. **Integer money**: all monetary values are cents (i64)
//! 4. **Explicit errors**: typed enums, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod layaway;
pub mod money;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single sale, purchase or layaway plan.
///
/// ## Business Reason
/// Bounds the work done inside one database transaction; a commit holding
/// the write lock for hundreds of reservations would stall every other
/// terminal.
pub const MAX_LINES_PER_TRANSACTION: usize = 100;

/// Maximum quantity on a single line.
///
/// ## Business Reason
/// Catches fat-finger entries (1000 instead of 10) before they reach the
/// stock ledger.
pub const MAX_LINE_QUANTITY: i64 = 999;
