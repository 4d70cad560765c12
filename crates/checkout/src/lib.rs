//! Checkout saga orchestration for the tour platform.
//!
//! This crate drives a multi-step purchase as a saga with compensating
//! actions on failure. The checkout pipeline runs these steps in order:
//! 1. Validate the buyer
//! 2. Reserve the cart's items
//! 3. Charge the payment
//! 4. Issue purchase tokens
//! 5. Record purchase statistics (best-effort, never fatal)
//!
//! If a step fails, previously completed steps are compensated in reverse
//! order and the attempt is finalized as failed in the transaction ledger.

pub mod cart;
pub mod clients;
pub mod config;
pub mod error;
pub mod money;
pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod step;
pub mod token;

pub use cart::{CartError, CartSnapshot, LineItem};
pub use clients::{
    ActivitySink, CatalogService, IdentityService, InMemoryActivitySink, InMemoryCatalogService,
    InMemoryIdentityService, InMemoryPaymentGateway, PaymentGateway,
};
pub use config::{CheckoutConfig, IdentityOutagePolicy};
pub use error::{CheckoutError, Result};
pub use money::Money;
pub use orchestrator::CheckoutOrchestrator;
pub use outcome::CheckoutOutcome;
pub use step::{CheckoutStep, StepContext};
pub use token::{InMemoryTokenIssuer, PurchaseToken, TokenIssuer, TokenStatus};
