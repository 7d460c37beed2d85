//! # Repository Module
//!
//! Repository implementations for the ledger tables.
//!
//! Each repository owns the SQL for one aggregate. Methods come in two
//! flavors: pool-scoped reads/writes that manage their own access, and
//! `*_in_tx` helpers that take the caller's open transaction so the service
//! layer can compose stock mutations and record inserts into one
//! all-or-nothing commit.
//!
//! ## Available Repositories
//!
//! - [`stock::StockRepository`] - the stock ledger (reserve/release/adjust)
//! - [`sale::SaleRepository`] - sales, lines, history query
//! - [`purchase::PurchaseRepository`] - purchases and lines
//! - [`layaway::LayawayRepository`] - plans, items, abono ledger

pub mod layaway;
pub mod purchase;
pub mod sale;
pub mod stock;
