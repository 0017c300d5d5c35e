use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfront_core::payment::{CaptureResult, GatewayError, IntentStatus, PaymentGateway, PaymentIntent};
use shopfront_core::{publish_event, EventPublisher};
use shopfront_shared::models::events::{PaymentSettledEvent, PAYMENT_SETTLED_TOPIC};
use shopfront_shared::Masked;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::OrderError;
use crate::manager::OrderManager;
use crate::models::{Order, Payment, PaymentMethod, PaymentRecordStatus, PaymentStatus};
use crate::repository::{OrderRepository, PaymentRepository};

/// Body of `POST /payments/pay`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[validate(required(message = "orderId is required"))]
    pub order_id: Option<Uuid>,
    #[validate(required(message = "paymentMethod is required"))]
    pub payment_method: Option<String>,
    #[validate(required(message = "amount is required"))]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    /// Where the customer authorizes the payment. Absent for cash.
    pub redirect_url: Option<String>,
}

/// Result of the provider's return redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Completed { order_id: Uuid },
    Failed { order_id: Uuid },
    /// The provider could not be reached; nothing changed and the capture may be retried.
    Pending { order_id: Uuid },
    AlreadySettled { order_id: Uuid, status: PaymentRecordStatus },
    /// The order was settled by another payment. This attempt was failed
    /// without capturing; `order_payment` is the order's own payment status.
    Superseded { order_id: Uuid, order_payment: PaymentStatus },
}

impl ConfirmOutcome {
    pub fn order_id(&self) -> Uuid {
        match self {
            ConfirmOutcome::Completed { order_id }
            | ConfirmOutcome::Failed { order_id }
            | ConfirmOutcome::Pending { order_id }
            | ConfirmOutcome::AlreadySettled { order_id, .. }
            | ConfirmOutcome::Superseded { order_id, .. } => *order_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfirmOutcome::Completed { .. } => "completed",
            ConfirmOutcome::Failed { .. } => "failed",
            ConfirmOutcome::Pending { .. } => "pending",
            ConfirmOutcome::AlreadySettled { .. } => "already_settled",
            ConfirmOutcome::Superseded { .. } => "superseded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled { order_id: Uuid },
    AlreadySettled { order_id: Uuid, status: PaymentRecordStatus },
    Superseded { order_id: Uuid, order_payment: PaymentStatus },
    /// No payment was ever recorded for the token.
    NoPayment,
}

/// What `settle` did with a pending payment.
enum Settlement {
    Applied,
    /// Another request settled the payment first.
    Lost,
    /// The order no longer waits for payment; the attempt was failed.
    Superseded(PaymentStatus),
}

/// Creates payment intents and reconciles provider callbacks with orders.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    publisher: Arc<dyn EventPublisher>,
    currency: String,
}

impl PaymentOrchestrator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        publisher: Arc<dyn EventPublisher>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            orders,
            payments,
            publisher,
            currency: currency.into(),
        }
    }

    /// Starts paying for an order. The amount must match the frozen order total.
    pub async fn initiate(
        &self,
        user_id: &str,
        request: PaymentRequest,
    ) -> Result<PaymentInitiation, OrderError> {
        if user_id.trim().is_empty() {
            return Err(OrderError::Unauthenticated);
        }
        request.validate()?;

        let (order_id, method, amount) = match (request.order_id, request.payment_method, request.amount) {
            (Some(order_id), Some(method), Some(amount)) => (order_id, method, amount),
            _ => return Err(OrderError::InvalidInput("orderId, paymentMethod and amount are required".into())),
        };

        let method = method
            .parse::<PaymentMethod>()
            .map_err(|_| OrderError::InvalidPaymentMethod(method.clone()))?;

        let order = self
            .load_order(order_id)
            .await?
            .filter(|o| o.is_owned_by(user_id))
            .ok_or_else(|| OrderError::NotFound(format!("Order {}", order_id)))?;

        if order.payment_status != PaymentStatus::Pending {
            return Err(OrderError::InvalidInput(format!(
                "Order {} payment is already {}",
                order.id, order.payment_status
            )));
        }

        if amount != order.total_amount {
            return Err(OrderError::AmountMismatch {
                expected: order.total_amount,
                actual: amount,
            });
        }

        self.retire_pending_attempt(order.id).await?;

        match method {
            PaymentMethod::Paypal => self.initiate_external(&order, amount).await,
            PaymentMethod::Cash => self.initiate_cash(&order, amount).await,
        }
    }

    async fn initiate_external(
        &self,
        order: &Order,
        amount: Decimal,
    ) -> Result<PaymentInitiation, OrderError> {
        let intent: PaymentIntent = self
            .gateway
            .create_intent(order.id, amount, &self.currency)
            .await
            .map_err(|e| {
                error!("{} intent creation failed for order {}: {}", self.gateway.name(), order.id, e);
                OrderError::from(e)
            })?;

        let redirect_url = intent.approval_url.clone().ok_or_else(|| OrderError::Provider {
            message: format!("{} returned no approval link", self.gateway.name()),
            rate_limited: false,
        })?;

        let payment = Payment::new(order, PaymentMethod::Paypal, Some(intent.id.clone()), amount);
        self.payments
            .create_payment(&payment)
            .await
            .map_err(OrderError::storage)?;

        info!(
            "Payment {} created for order {} via {} (intent {:?})",
            payment.id,
            order.id,
            self.gateway.name(),
            Masked(&intent.id)
        );

        Ok(PaymentInitiation {
            payment_id: payment.id,
            order_id: order.id,
            redirect_url: Some(redirect_url),
        })
    }

    /// Cash is trusted at intent time: the order is marked paid right away.
    async fn initiate_cash(
        &self,
        order: &Order,
        amount: Decimal,
    ) -> Result<PaymentInitiation, OrderError> {
        let transaction_id = cash_transaction_id();
        let transition = OrderManager::mark_paid(order, Some(transaction_id.clone()))?;

        let payment = Payment::new(order, PaymentMethod::Cash, Some(transaction_id), amount);
        self.payments
            .create_payment(&payment)
            .await
            .map_err(OrderError::storage)?;

        let applied = self
            .orders
            .apply_transition(order.id, &transition)
            .await
            .map_err(OrderError::storage)?;
        if !applied {
            return Err(OrderError::InvalidTransition {
                from: transition.from.to_string(),
                to: transition.status.to_string(),
            });
        }

        info!("Cash payment {} recorded, order {} is processing", payment.id, order.id);
        self.announce(&payment, "completed").await;

        Ok(PaymentInitiation {
            payment_id: payment.id,
            order_id: order.id,
            redirect_url: None,
        })
    }

    /// Handles the provider's success redirect. Safe to call repeatedly for the
    /// same token: only the first settlement mutates anything, and nothing is
    /// captured once the order has been settled by another payment.
    pub async fn confirm(&self, token: &str) -> Result<ConfirmOutcome, OrderError> {
        let payment = self.find_payment(token).await?.ok_or_else(|| {
            OrderError::NotFound(format!("Payment for token {}", Masked(token)))
        })?;

        if payment.status != PaymentRecordStatus::Pending {
            info!("Payment {} already {}, ignoring confirmation", payment.id, payment.status);
            return Ok(match self.settled_elsewhere(&payment).await? {
                Some(order_payment) => ConfirmOutcome::Superseded { order_id: payment.order_id, order_payment },
                None => ConfirmOutcome::AlreadySettled {
                    order_id: payment.order_id,
                    status: payment.status,
                },
            });
        }

        let order = self.require_order(payment.order_id).await?;
        if order.payment_status != PaymentStatus::Pending {
            self.retire(&payment).await?;
            return Ok(ConfirmOutcome::Superseded {
                order_id: order.id,
                order_payment: order.payment_status,
            });
        }

        let capture: Result<CaptureResult, GatewayError> = self.gateway.capture_payment(token).await;
        let target = match capture {
            Ok(result) if result.is_completed() => PaymentRecordStatus::Completed,
            Ok(result) => {
                warn!("Capture for payment {} ended as {:?}", payment.id, result.status);
                PaymentRecordStatus::Failed
            }
            Err(e) if e.is_retryable() => {
                warn!("Capture for payment {} still pending: {}", payment.id, e);
                return Ok(ConfirmOutcome::Pending { order_id: payment.order_id });
            }
            Err(e @ GatewayError::Rejected { .. }) => {
                warn!("Capture for payment {} rejected: {}", payment.id, e);
                PaymentRecordStatus::Failed
            }
            Err(e) => {
                error!("Capture for payment {} failed: {}", payment.id, e);
                return Err(e.into());
            }
        };

        let order_id = payment.order_id;
        Ok(match self.settle(&payment, target, Some(token)).await? {
            Settlement::Applied if target == PaymentRecordStatus::Completed => {
                ConfirmOutcome::Completed { order_id }
            }
            Settlement::Applied => ConfirmOutcome::Failed { order_id },
            Settlement::Lost => ConfirmOutcome::AlreadySettled {
                order_id,
                status: self.current_status(token).await?,
            },
            Settlement::Superseded(order_payment) => {
                if target == PaymentRecordStatus::Completed {
                    error!(
                        "Payment {} was captured after order {} settled; refund {:?} manually",
                        payment.id,
                        order_id,
                        Masked(token)
                    );
                }
                ConfirmOutcome::Superseded { order_id, order_payment }
            }
        })
    }

    /// Handles the provider's cancel redirect. Unknown tokens are a no-op.
    pub async fn cancel(&self, token: &str) -> Result<CancelOutcome, OrderError> {
        let Some(payment) = self.find_payment(token).await? else {
            info!("Cancel for unknown token {:?}, nothing to do", Masked(token));
            return Ok(CancelOutcome::NoPayment);
        };
        let order_id = payment.order_id;

        if payment.status != PaymentRecordStatus::Pending {
            return Ok(match self.settled_elsewhere(&payment).await? {
                Some(order_payment) => CancelOutcome::Superseded { order_id, order_payment },
                None => CancelOutcome::AlreadySettled { order_id, status: payment.status },
            });
        }

        Ok(match self.settle(&payment, PaymentRecordStatus::Failed, None).await? {
            Settlement::Applied => CancelOutcome::Cancelled { order_id },
            Settlement::Lost => CancelOutcome::AlreadySettled {
                order_id,
                status: self.current_status(token).await?,
            },
            Settlement::Superseded(order_payment) => CancelOutcome::Superseded { order_id, order_payment },
        })
    }

    /// Latest payment attempt for an order, visible to its owner and to admins.
    pub async fn payment_for_order(
        &self,
        user_id: &str,
        is_admin: bool,
        order_id: Uuid,
    ) -> Result<Payment, OrderError> {
        self.payments
            .find_latest_for_order(order_id)
            .await
            .map_err(OrderError::storage)?
            .filter(|p| is_admin || p.user_id == user_id)
            .ok_or_else(|| OrderError::NotFound(format!("Payment for order {}", order_id)))
    }

    pub async fn all_payments(&self) -> Result<Vec<Payment>, OrderError> {
        self.payments.list_payments().await.map_err(OrderError::storage)
    }

    /// Moves a pending payment and its order to the settled state. The order
    /// transition is checked before the payment row changes, and a payment
    /// whose order transition loses a race is put back and then retired, so
    /// the two rows never disagree.
    async fn settle(
        &self,
        payment: &Payment,
        target: PaymentRecordStatus,
        transaction_id: Option<&str>,
    ) -> Result<Settlement, OrderError> {
        let order = self.require_order(payment.order_id).await?;
        if order.payment_status != PaymentStatus::Pending {
            self.retire(payment).await?;
            return Ok(Settlement::Superseded(order.payment_status));
        }

        let transition = match target {
            PaymentRecordStatus::Completed => {
                OrderManager::mark_paid(&order, transaction_id.map(str::to_string))?
            }
            _ => OrderManager::mark_payment_failed(&order)?,
        };

        let won = self
            .payments
            .transition_status(payment.id, PaymentRecordStatus::Pending, target)
            .await
            .map_err(OrderError::storage)?;
        if !won {
            return Ok(Settlement::Lost);
        }

        let applied = self
            .orders
            .apply_transition(order.id, &transition)
            .await
            .map_err(OrderError::storage)?;
        if !applied {
            warn!("Order {} changed while settling payment {}", order.id, payment.id);
            self.payments
                .transition_status(payment.id, target, PaymentRecordStatus::Pending)
                .await
                .map_err(OrderError::storage)?;
            let current = self.require_order(order.id).await?;
            self.retire(payment).await?;
            return Ok(Settlement::Superseded(current.payment_status));
        }

        info!(
            "Payment {} {}; order {} is now {}/{}",
            payment.id, target, order.id, transition.status, transition.payment_status
        );
        self.announce(payment, &target.to_string()).await;
        Ok(Settlement::Applied)
    }

    /// Fails a pending attempt without touching its order.
    async fn retire(&self, payment: &Payment) -> Result<(), OrderError> {
        let retired = self
            .payments
            .transition_status(payment.id, PaymentRecordStatus::Pending, PaymentRecordStatus::Failed)
            .await
            .map_err(OrderError::storage)?;
        if retired {
            info!("Payment {} retired for order {}", payment.id, payment.order_id);
        }
        Ok(())
    }

    /// A new attempt replaces any pending one, so at most one intent per order
    /// can be captured.
    async fn retire_pending_attempt(&self, order_id: Uuid) -> Result<(), OrderError> {
        let latest = self
            .payments
            .find_latest_for_order(order_id)
            .await
            .map_err(OrderError::storage)?;
        match latest {
            Some(payment) if payment.status == PaymentRecordStatus::Pending => self.retire(&payment).await,
            _ => Ok(()),
        }
    }

    /// For a failed attempt whose order was paid by another payment, the
    /// order's payment status.
    async fn settled_elsewhere(&self, payment: &Payment) -> Result<Option<PaymentStatus>, OrderError> {
        if payment.status != PaymentRecordStatus::Failed {
            return Ok(None);
        }
        let order = self.require_order(payment.order_id).await?;
        Ok((order.payment_status == PaymentStatus::Completed).then_some(order.payment_status))
    }

    async fn require_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.load_order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {}", id)))
    }

    async fn current_status(&self, token: &str) -> Result<PaymentRecordStatus, OrderError> {
        Ok(self
            .find_payment(token)
            .await?
            .map(|p| p.status)
            .unwrap_or(PaymentRecordStatus::Pending))
    }

    async fn find_payment(&self, token: &str) -> Result<Option<Payment>, OrderError> {
        if token.trim().is_empty() {
            return Err(OrderError::InvalidInput("token is required".into()));
        }
        self.payments
            .find_by_transaction_id(token)
            .await
            .map_err(OrderError::storage)
    }

    async fn load_order(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        self.orders.get_order(id).await.map_err(OrderError::storage)
    }

    async fn announce(&self, payment: &Payment, outcome: &str) {
        let event = PaymentSettledEvent {
            order_id: payment.order_id,
            payment_id: payment.id,
            payment_method: payment.payment_method.to_string(),
            outcome: outcome.to_string(),
            amount: payment.amount,
            timestamp: Utc::now().timestamp(),
        };
        publish_event(
            self.publisher.as_ref(),
            PAYMENT_SETTLED_TOPIC,
            &payment.order_id.to_string(),
            &event,
        )
        .await;
    }
}

/// `CASH-<unix millis>-<8 hex chars>`
pub fn cash_transaction_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("CASH-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Gateway that approves and completes every payment. Used for local runs.
pub struct MockPaymentGateway;

#[async_trait::async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let id = format!("MOCK-{}", Uuid::new_v4().simple());
        Ok(PaymentIntent {
            approval_url: Some(format!("https://mock-gateway.local/checkout?token={}", id)),
            id,
            order_id,
            amount,
            currency: currency.to_string(),
            status: IntentStatus::Created,
            created_at: Utc::now(),
        })
    }

    async fn capture_payment(&self, intent_id: &str) -> Result<CaptureResult, GatewayError> {
        Ok(CaptureResult {
            id: intent_id.to_string(),
            status: IntentStatus::Completed,
        })
    }
}
