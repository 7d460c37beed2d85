//! # almacen-db: Persistence Layer for the Inventory Ledger
//!
//! SQLite persistence and transactional services for the almacén inventory
//! ledger, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Inventory Ledger Data Flow                    │
//! │                                                                     │
//! │  Caller (commit_sale, apply_abono, ...)                             │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                    almacen-db (THIS CRATE)                    │ │
//! │  │                                                               │ │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐  │ │
//! │  │   │   Services   │   │ Repositories │   │    Database     │  │ │
//! │  │   │ (service/)   │──►│ (repository/)│──►│    (pool.rs)    │  │ │
//! │  │   │              │   │              │   │                 │  │ │
//! │  │   │ SaleProcessor│   │ StockRepo    │   │ SqlitePool, WAL │  │ │
//! │  │   │ PurchaseProc.│   │ SaleRepo     │   │ embedded        │  │ │
//! │  │   │ LayawayEngine│   │ LayawayRepo  │   │ migrations      │  │ │
//! │  │   └──────────────┘   └──────────────┘   └─────────────────┘  │ │
//! │  │          │                                                    │ │
//! │  │          ▼                                                    │ │
//! │  │   almacen-core (pure rules: totals, debt arithmetic,          │ │
//! │  │                 validation, state machine)                    │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and combined ledger error types
//! - [`repository`] - Per-aggregate persistence (stock, sale, purchase, layaway)
//! - [`service`] - Transactional operations composed from the repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use almacen_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/almacen.db")).await?;
//!
//! let sale = db.sale_processor().commit_sale(input).await?;
//! let history = db.sales().query(&SaleQuery::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::layaway::LayawayRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sale::SaleRepository;
pub use repository::stock::StockRepository;

// Service re-exports
pub use service::layaway::LayawayEngine;
pub use service::purchase::PurchaseProcessor;
pub use service::sale::SaleProcessor;
