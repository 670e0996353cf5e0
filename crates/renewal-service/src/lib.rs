//! Renewal billing service.
//!
//! This crate runs the recurring billing engine:
//!
//! - Daily subscription charges with month-advance scheduling
//! - Reminders for debtors ahead of their charge date
//! - A durable notification outbox delivered over a messaging channel
//! - A periodic scheduler and a thin admin HTTP API
//!
//! # Authentication
//!
//! Everything under `/v1` requires the `X-Admin-Key` header. `/health` is
//! public.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for consistency
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use channel::{DeliveryChannel, DeliveryError, TelegramChannel, UnconfiguredChannel};
pub use config::ServiceConfig;
pub use engine::{BillingEngine, EngineConfig, EngineError};
pub use error::ApiError;
pub use routes::create_router;
pub use scheduler::{JobBoard, JobKind, Scheduler};
pub use state::AppState;
