//! Checkout orchestrator: drives the step pipeline and its compensation.

use std::future::Future;
use std::sync::Arc;

use common::{BuyerId, TransactionId};
use ledger::{LedgerStore, TransactionRecord, TransactionStatus};

use crate::cart::CartSnapshot;
use crate::clients::{ActivitySink, CatalogService, IdentityService, PaymentGateway};
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::outcome::CheckoutOutcome;
use crate::pipeline;
use crate::step::{CheckoutStep, StepContext};
use crate::token::TokenIssuer;

/// Orchestrates one checkout attempt across the external services.
///
/// The orchestrator runs its steps strictly in order, persisting each
/// completion to the ledger before moving on. On a fatal step failure it
/// walks the completed steps in reverse, invoking each compensation and
/// recording its outcome, then finalizes the ledger record as failed.
/// Failures never escape `execute`; they come back as a `CheckoutOutcome`.
pub struct CheckoutOrchestrator<L: LedgerStore> {
    ledger: L,
    steps: Vec<Box<dyn CheckoutStep>>,
    config: CheckoutConfig,
}

impl<L: LedgerStore> CheckoutOrchestrator<L> {
    /// Creates an orchestrator with the standard five-step pipeline.
    pub fn new(
        ledger: L,
        identity: Arc<dyn IdentityService>,
        catalog: Arc<dyn CatalogService>,
        payment: Arc<dyn PaymentGateway>,
        issuer: Arc<dyn TokenIssuer>,
        activity: Arc<dyn ActivitySink>,
        config: CheckoutConfig,
    ) -> Self {
        let steps = pipeline::standard_pipeline(
            identity,
            catalog,
            payment,
            issuer,
            activity,
            config.identity_outage,
        );
        Self::with_steps(ledger, steps, config)
    }

    /// Creates an orchestrator over an arbitrary step list.
    ///
    /// The engine makes no assumptions about the steps beyond the
    /// `CheckoutStep` contract, which is what makes it testable against
    /// fakes.
    pub fn with_steps(
        ledger: L,
        steps: Vec<Box<dyn CheckoutStep>>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            ledger,
            steps,
            config,
        }
    }

    /// Executes one checkout attempt for the given cart snapshot.
    ///
    /// Never returns an error and never panics across this boundary; every
    /// internal failure is translated into a failure outcome.
    #[tracing::instrument(
        skip(self, cart),
        fields(cart_id = %cart.cart_id, buyer_id = %buyer_id)
    )]
    pub async fn execute(&self, cart: &CartSnapshot, buyer_id: BuyerId) -> CheckoutOutcome {
        metrics::counter!("checkout_executions_total").increment(1);
        let started = std::time::Instant::now();

        let outcome = self.run(cart, buyer_id).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        if outcome.success {
            metrics::counter!("checkout_completed").increment(1);
            tracing::info!(
                transaction_id = ?outcome.transaction_id,
                tokens = outcome.tokens.len(),
                "checkout completed"
            );
        } else {
            metrics::counter!("checkout_failed").increment(1);
            tracing::warn!(
                transaction_id = ?outcome.transaction_id,
                error = ?outcome.error,
                "checkout failed"
            );
        }

        outcome
    }

    async fn run(&self, cart: &CartSnapshot, buyer_id: BuyerId) -> CheckoutOutcome {
        if let Err(e) = cart.validate() {
            return CheckoutOutcome::rejected(CheckoutError::from(e).to_string());
        }

        let record = match self.ledger.create(buyer_id, cart.cart_id).await {
            Ok(record) => record,
            Err(e) => return CheckoutOutcome::rejected(CheckoutError::from(e).to_string()),
        };
        let transaction_id = record.transaction_id;
        let mut ctx = StepContext::new(transaction_id, buyer_id, cart.clone());

        let mut completed: Vec<&dyn CheckoutStep> = Vec::new();
        let mut failure: Option<CheckoutError> = None;

        for step in &self.steps {
            if let Err(e) = self.ledger.begin_step(transaction_id, step.name()).await {
                if step.fatal_on_failure() {
                    failure = Some(e.into());
                    break;
                }
                tracing::warn!(step = step.name(), error = %e, "skipping non-fatal step, ledger write failed");
                continue;
            }

            tracing::info!(step = step.name(), "checkout step started");
            match self.bounded(step.name(), step.forward(&mut ctx)).await {
                Ok(()) => {
                    // The external effect exists from here on; include the
                    // step in any rollback even if recording it fails.
                    let recorded = self.ledger.record_step(transaction_id, step.name()).await;
                    completed.push(step.as_ref());
                    if let Err(e) = recorded {
                        failure = Some(e.into());
                        break;
                    }
                }
                Err(e) if !step.fatal_on_failure() => {
                    metrics::counter!("checkout_side_effect_failures").increment(1);
                    tracing::warn!(
                        step = step.name(),
                        error = %e,
                        "non-fatal step failed, continuing"
                    );
                }
                Err(e) => {
                    tracing::warn!(step = step.name(), error = %e, "checkout step failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        match failure {
            None => {
                if let Err(e) = self
                    .ledger
                    .finalize(transaction_id, TransactionStatus::Completed, None)
                    .await
                {
                    // The purchase is paid and tokenized; a stale ledger row
                    // is the lesser evil than unwinding it now.
                    tracing::error!(%transaction_id, error = %e, "failed to finalize completed checkout");
                }
                CheckoutOutcome::completed(transaction_id, ctx.tokens)
            }
            Some(error) => {
                let detail = error.to_string();
                if let Err(e) = self.ledger.record_error(transaction_id, &detail).await {
                    tracing::error!(%transaction_id, error = %e, "failed to record error detail");
                }

                self.compensate(&completed, &ctx).await;

                if let Err(e) = self
                    .ledger
                    .finalize(transaction_id, TransactionStatus::Failed, Some(&detail))
                    .await
                {
                    tracing::error!(%transaction_id, error = %e, "failed to finalize failed checkout");
                }
                CheckoutOutcome::failed(transaction_id, detail)
            }
        }
    }

    /// Runs compensations for the completed steps, most recent first.
    ///
    /// Every attempt is logged to the ledger whether or not the
    /// compensating action succeeded; a failed compensation does not stop
    /// the remaining chain. Partial cleanup beats abandoning the rest.
    #[tracing::instrument(skip(self, completed, ctx), fields(transaction_id = %ctx.transaction_id))]
    async fn compensate(&self, completed: &[&dyn CheckoutStep], ctx: &StepContext) {
        for step in completed.iter().rev() {
            if !step.has_compensation() {
                continue;
            }

            tracing::info!(step = step.name(), "compensating step");
            let outcome = match self.bounded(step.name(), step.compensate(ctx)).await {
                Ok(description) => description,
                Err(e) => {
                    tracing::warn!(step = step.name(), error = %e, "compensation failed");
                    format!("compensation failed: {e}")
                }
            };

            if let Err(e) = self
                .ledger
                .record_compensation(ctx.transaction_id, step.name(), &outcome)
                .await
            {
                tracing::error!(
                    step = step.name(),
                    error = %e,
                    "failed to record compensation outcome"
                );
            }
        }
    }

    /// Bounds a step's remote call with the configured timeout.
    async fn bounded<T, F>(&self, step: &str, fut: F) -> Result<T, CheckoutError>
    where
        F: Future<Output = Result<T, CheckoutError>> + Send,
    {
        match tokio::time::timeout(self.config.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CheckoutError::StepTimeout {
                step: step.to_string(),
                timeout: self.config.step_timeout,
            }),
        }
    }

    /// Retrieves the ledger record for a transaction.
    pub async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<TransactionRecord>, CheckoutError> {
        Ok(self.ledger.get(transaction_id).await?)
    }

    /// Lists all checkout attempts for a buyer, oldest first.
    pub async fn list_transactions(
        &self,
        buyer_id: BuyerId,
    ) -> Result<Vec<TransactionRecord>, CheckoutError> {
        Ok(self.ledger.list_for_buyer(buyer_id).await?)
    }
}
