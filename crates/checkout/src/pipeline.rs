//! The production checkout pipeline: step names and step implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{ActivitySink, CatalogService, IdentityService, PaymentGateway};
use crate::config::IdentityOutagePolicy;
use crate::error::CheckoutError;
use crate::step::{CheckoutStep, StepContext};
use crate::token::TokenIssuer;

/// Step name: Confirm the buyer exists and is not suspended.
pub const STEP_VALIDATE_BUYER: &str = "validate_buyer";

/// Step name: Confirm every cart item is purchasable.
pub const STEP_RESERVE_ITEMS: &str = "reserve_items";

/// Step name: Charge the cart total through the payment gateway.
pub const STEP_CHARGE_PAYMENT: &str = "charge_payment";

/// Step name: Issue one purchase token per line item.
pub const STEP_ISSUE_TOKENS: &str = "issue_tokens";

/// Step name: Announce the purchase to the activity feed.
pub const STEP_RECORD_STATISTICS: &str = "record_statistics";

/// Assembles the five production steps, in pipeline order.
pub fn standard_pipeline(
    identity: Arc<dyn IdentityService>,
    catalog: Arc<dyn CatalogService>,
    payment: Arc<dyn PaymentGateway>,
    issuer: Arc<dyn TokenIssuer>,
    activity: Arc<dyn ActivitySink>,
    identity_outage: IdentityOutagePolicy,
) -> Vec<Box<dyn CheckoutStep>> {
    vec![
        Box::new(ValidateBuyerStep {
            identity,
            outage_policy: identity_outage,
        }),
        Box::new(ReserveItemsStep { catalog }),
        Box::new(ChargePaymentStep { payment }),
        Box::new(IssueTokensStep { issuer }),
        Box::new(RecordStatisticsStep { activity }),
    ]
}

/// Step 1: buyer identity check. Read-only, no compensation.
struct ValidateBuyerStep {
    identity: Arc<dyn IdentityService>,
    outage_policy: IdentityOutagePolicy,
}

#[async_trait]
impl CheckoutStep for ValidateBuyerStep {
    fn name(&self) -> &'static str {
        STEP_VALIDATE_BUYER
    }

    async fn forward(&self, ctx: &mut StepContext) -> Result<(), CheckoutError> {
        match self.identity.is_buyer_valid(ctx.buyer_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(CheckoutError::Validation(format!(
                "buyer {} not found or suspended",
                ctx.buyer_id
            ))),
            Err(e) => match self.outage_policy {
                IdentityOutagePolicy::FailOpen => {
                    tracing::warn!(
                        buyer_id = %ctx.buyer_id,
                        error = %e,
                        "identity service unreachable, continuing per fail-open policy"
                    );
                    Ok(())
                }
                IdentityOutagePolicy::FailClosed => Err(e),
            },
        }
    }
}

/// Step 2: catalog availability check, one lookup per distinct item.
///
/// There is no true inventory hold behind this; compensation is a release
/// notification the catalog accepts even when nothing was reserved.
struct ReserveItemsStep {
    catalog: Arc<dyn CatalogService>,
}

#[async_trait]
impl CheckoutStep for ReserveItemsStep {
    fn name(&self) -> &'static str {
        STEP_RESERVE_ITEMS
    }

    async fn forward(&self, ctx: &mut StepContext) -> Result<(), CheckoutError> {
        for item_id in ctx.cart.distinct_item_ids() {
            if !self.catalog.is_item_available(item_id).await? {
                return Err(CheckoutError::Validation(format!(
                    "item {item_id} is not available for purchase"
                )));
            }
        }
        Ok(())
    }

    fn has_compensation(&self) -> bool {
        true
    }

    async fn compensate(&self, ctx: &StepContext) -> Result<String, CheckoutError> {
        let item_ids = ctx.cart.distinct_item_ids();
        self.catalog.release_reservation(&item_ids).await?;
        Ok(format!("released {} item reservations", item_ids.len()))
    }
}

/// Step 3: one charge for the cart total, keyed by transaction id.
struct ChargePaymentStep {
    payment: Arc<dyn PaymentGateway>,
}

#[async_trait]
impl CheckoutStep for ChargePaymentStep {
    fn name(&self) -> &'static str {
        STEP_CHARGE_PAYMENT
    }

    async fn forward(&self, ctx: &mut StepContext) -> Result<(), CheckoutError> {
        let total = ctx.cart.total_price();
        let accepted = self
            .payment
            .charge(ctx.buyer_id, total, ctx.transaction_id)
            .await?;
        if accepted {
            Ok(())
        } else {
            Err(CheckoutError::Payment(format!(
                "charge of {total} declined by gateway"
            )))
        }
    }

    fn has_compensation(&self) -> bool {
        true
    }

    async fn compensate(&self, ctx: &StepContext) -> Result<String, CheckoutError> {
        let total = ctx.cart.total_price();
        let refunded = self.payment.refund(ctx.transaction_id, total).await?;
        if refunded {
            Ok(format!("refunded {total}"))
        } else {
            Ok("no charge on record, nothing refunded".to_string())
        }
    }
}

/// Step 4: batch token issuance, one token per line item.
struct IssueTokensStep {
    issuer: Arc<dyn TokenIssuer>,
}

#[async_trait]
impl CheckoutStep for IssueTokensStep {
    fn name(&self) -> &'static str {
        STEP_ISSUE_TOKENS
    }

    async fn forward(&self, ctx: &mut StepContext) -> Result<(), CheckoutError> {
        let tokens = self
            .issuer
            .issue(ctx.transaction_id, ctx.buyer_id, &ctx.cart.items)
            .await?;
        ctx.tokens = tokens;
        Ok(())
    }

    fn has_compensation(&self) -> bool {
        true
    }

    async fn compensate(&self, ctx: &StepContext) -> Result<String, CheckoutError> {
        let revoked = self
            .issuer
            .revoke_for_transaction(ctx.transaction_id)
            .await?;
        Ok(format!("revoked {revoked} purchase tokens"))
    }
}

/// Step 5: best-effort activity feed notification.
///
/// Mutates no authoritative state; a failure here must never unwind a
/// purchase that has already been paid for and tokenized.
struct RecordStatisticsStep {
    activity: Arc<dyn ActivitySink>,
}

#[async_trait]
impl CheckoutStep for RecordStatisticsStep {
    fn name(&self) -> &'static str {
        STEP_RECORD_STATISTICS
    }

    async fn forward(&self, ctx: &mut StepContext) -> Result<(), CheckoutError> {
        self.activity
            .record_purchase(ctx.buyer_id, ctx.cart.item_count())
            .await
    }

    fn fatal_on_failure(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartSnapshot, LineItem};
    use crate::clients::{
        InMemoryActivitySink, InMemoryCatalogService, InMemoryIdentityService,
        InMemoryPaymentGateway,
    };
    use crate::money::Money;
    use crate::token::InMemoryTokenIssuer;
    use common::{BuyerId, CartId, ItemId, TransactionId};

    fn ctx_with_items(items: Vec<LineItem>) -> StepContext {
        let buyer_id = BuyerId::new();
        StepContext::new(
            TransactionId::new(),
            buyer_id,
            CartSnapshot::new(CartId::new(), buyer_id, items),
        )
    }

    #[tokio::test]
    async fn test_validate_buyer_fail_open_vs_fail_closed() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.set_unreachable(true);
        let mut ctx = ctx_with_items(vec![]);

        let closed = ValidateBuyerStep {
            identity: identity.clone(),
            outage_policy: IdentityOutagePolicy::FailClosed,
        };
        assert!(closed.forward(&mut ctx).await.is_err());

        let open = ValidateBuyerStep {
            identity,
            outage_policy: IdentityOutagePolicy::FailOpen,
        };
        assert!(open.forward(&mut ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_reserve_items_names_the_missing_item() {
        let catalog = Arc::new(InMemoryCatalogService::new());
        catalog.publish(ItemId::new(1));
        let step = ReserveItemsStep { catalog };

        let mut ctx = ctx_with_items(vec![
            LineItem::new(ItemId::new(1), "Canyon hike", Money::from_cents(1000), 1),
            LineItem::new(ItemId::new(3), "Wine tasting", Money::from_cents(3000), 2),
        ]);

        let err = step.forward(&mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("item 3"));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_reserve_items_looks_up_each_distinct_item_once() {
        let catalog = Arc::new(InMemoryCatalogService::new());
        catalog.publish(ItemId::new(5));
        let step = ReserveItemsStep {
            catalog: catalog.clone(),
        };

        let mut ctx = ctx_with_items(vec![
            LineItem::new(ItemId::new(5), "A", Money::from_cents(100), 1),
            LineItem::new(ItemId::new(5), "A", Money::from_cents(100), 2),
        ]);
        assert!(step.forward(&mut ctx).await.is_ok());

        let released = step.compensate(&ctx).await.unwrap();
        assert_eq!(released, "released 1 item reservations");
        assert_eq!(catalog.released_count(), 1);
    }

    #[tokio::test]
    async fn test_charge_payment_declined_maps_to_payment_error() {
        let payment = Arc::new(InMemoryPaymentGateway::new());
        payment.set_decline_charges(true);
        let step = ChargePaymentStep { payment };

        let mut ctx = ctx_with_items(vec![LineItem::new(
            ItemId::new(1),
            "Canyon hike",
            Money::from_cents(10000),
            1,
        )]);

        let err = step.forward(&mut ctx).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Payment(_)));
    }

    #[tokio::test]
    async fn test_charge_then_refund_roundtrip() {
        let payment = Arc::new(InMemoryPaymentGateway::new());
        let step = ChargePaymentStep {
            payment: payment.clone(),
        };

        let mut ctx = ctx_with_items(vec![LineItem::new(
            ItemId::new(1),
            "Canyon hike",
            Money::from_cents(10000),
            1,
        )]);

        step.forward(&mut ctx).await.unwrap();
        assert_eq!(
            payment.charged_amount(ctx.transaction_id),
            Some(Money::from_cents(10000))
        );

        let outcome = step.compensate(&ctx).await.unwrap();
        assert_eq!(outcome, "refunded $100.00");
        assert_eq!(payment.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_issue_tokens_fills_context() {
        let issuer = Arc::new(InMemoryTokenIssuer::new());
        let step = IssueTokensStep {
            issuer: issuer.clone(),
        };

        let mut ctx = ctx_with_items(vec![
            LineItem::new(ItemId::new(1), "A", Money::from_cents(100), 1),
            LineItem::new(ItemId::new(2), "B", Money::from_cents(200), 1),
        ]);

        step.forward(&mut ctx).await.unwrap();
        assert_eq!(ctx.tokens.len(), 2);

        let outcome = step.compensate(&ctx).await.unwrap();
        assert_eq!(outcome, "revoked 2 purchase tokens");
        assert_eq!(issuer.token_count(), 0);
    }

    #[tokio::test]
    async fn test_record_statistics_is_not_fatal() {
        let activity = Arc::new(InMemoryActivitySink::new());
        let step = RecordStatisticsStep { activity };
        assert!(!step.fatal_on_failure());
        assert!(!step.has_compensation());
    }

    #[test]
    fn test_standard_pipeline_order() {
        let steps = standard_pipeline(
            Arc::new(InMemoryIdentityService::new()),
            Arc::new(InMemoryCatalogService::new()),
            Arc::new(InMemoryPaymentGateway::new()),
            Arc::new(InMemoryTokenIssuer::new()),
            Arc::new(InMemoryActivitySink::new()),
            IdentityOutagePolicy::FailClosed,
        );

        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                STEP_VALIDATE_BUYER,
                STEP_RESERVE_ITEMS,
                STEP_CHARGE_PAYMENT,
                STEP_ISSUE_TOKENS,
                STEP_RECORD_STATISTICS,
            ]
        );
    }
}
