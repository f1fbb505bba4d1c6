//! Checkout coordinator: the server-owned saga behind a booking reference.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{BookingRef, Currency, Money};
use domain::{
    Aggregate, BookingDraft, BookingError, BookingPayload, BookingService, BookingStatus,
    CancelRequest, CommandHandler, CompleteCancellation, DomainError, DomainEvent, DraftPayload,
    FailCancellation, FinalizePayload, Payer, RecomputeFinancials, RequestCancellation,
};
use ledger::{AppendOptions, Claim, EntryQuery, IdempotencyStore, Ledger, LedgerEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::CheckoutSaga;
use crate::caller::{Caller, CallerRole};
use crate::config::CheckoutConfig;
use crate::error::{Result, SagaError};
use crate::events::CheckoutEvent;
use crate::handoff::{HandoffSigner, HandoffToken};
use crate::outcome::{CancellationResult, CheckoutOutcome, ReserveReceipt};
use crate::services::{
    BillingDetails, CancellationService, CardDetails, ConfirmRequest, FinancialService,
    IntentRequest, PaymentGateway, PaymentIntentStatus,
};

/// Card and billing details submitted with a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleRequest {
    pub card: CardDetails,
    #[serde(default)]
    pub billing_details: BillingDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeRequest {
    /// Defaults to the number of rooms searched for.
    #[serde(default)]
    pub room_count: Option<u32>,
}

/// External collaborators of the coordinator.
#[derive(Clone)]
pub struct CheckoutServices {
    pub gateway: Arc<dyn PaymentGateway>,
    pub financial: Arc<dyn FinancialService>,
    pub cancellations: Arc<dyn CancellationService>,
    pub idempotency: Arc<dyn IdempotencyStore>,
}

/// What an attempt needs to know about the draft it is paying for.
struct AttemptContext {
    attempt: u32,
    amount: Money,
    currency: Currency,
    payer: Payer,
    payment_gateway: String,
    details_failure: Option<String>,
}

/// Drives a booking from reservation through payment to finalization, and
/// handles cancellation afterwards.
///
/// Every step is keyed by the booking reference. Saga progress is recorded
/// as entries on the reference's `CheckoutSaga` stream, next to the
/// booking's own stream. Once a card is charged the payment is never
/// retried: a booking that cannot be finalized is flagged for an operator
/// instead.
pub struct CheckoutCoordinator<S: Ledger> {
    bookings: BookingService<S>,
    sagas: CommandHandler<S, CheckoutSaga>,
    services: CheckoutServices,
    signer: HandoffSigner,
    config: CheckoutConfig,
    authorizations: Arc<Mutex<HashMap<BookingRef, CancellationToken>>>,
}

impl<S> CheckoutCoordinator<S>
where
    S: Ledger + Clone,
{
    pub fn new(
        ledger: S,
        services: CheckoutServices,
        signer: HandoffSigner,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            bookings: BookingService::new(ledger.clone()),
            sagas: CommandHandler::new(ledger),
            services,
            signer,
            config,
            authorizations: Arc::default(),
        }
    }

    pub fn bookings(&self) -> &BookingService<S> {
        &self.bookings
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Reserves a booking reference with a pending draft.
    ///
    /// A second submission for the same reference, while the first is in
    /// flight or after it finished, writes nothing and reports
    /// `deduplicated`. A failed reservation releases its claim so the user
    /// can retry.
    #[tracing::instrument(skip(self, payload), fields(booking_ref = %payload.booking_ref))]
    pub async fn reserve(&self, payload: DraftPayload) -> Result<ReserveReceipt> {
        let booking_ref = payload.booking_ref.clone();
        payload.validate().map_err(DomainError::from)?;

        let key = reserve_key(&booking_ref);
        match self.services.idempotency.begin(&key).await? {
            Claim::Acquired => {}
            Claim::InFlight | Claim::Completed(_) => {
                debug!(%booking_ref, "Duplicate reservation ignored");
                metrics::counter!("checkout_reservations_total", "outcome" => "deduplicated")
                    .increment(1);
                return Ok(ReserveReceipt {
                    booking_ref,
                    deduplicated: true,
                });
            }
        }

        match self.write_reservation(payload).await {
            Ok(()) => {
                let receipt = ReserveReceipt {
                    booking_ref: booking_ref.clone(),
                    deduplicated: false,
                };
                self.complete_claim(&key, &receipt).await;
                info!(%booking_ref, "Booking reference reserved");
                metrics::counter!("checkout_reservations_total", "outcome" => "reserved")
                    .increment(1);
                Ok(receipt)
            }
            Err(e) => {
                self.release_claim(&key).await;
                warn!(%booking_ref, error = %e, "Reservation failed");
                metrics::counter!("checkout_reservations_total", "outcome" => "failed")
                    .increment(1);
                Err(match e {
                    SagaError::Domain(DomainError::Booking(_)) => e,
                    other => SagaError::ReservationFailed {
                        booking_ref,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    async fn write_reservation(&self, payload: DraftPayload) -> Result<()> {
        let booking_ref = payload.booking_ref.clone();
        self.bookings
            .upsert_booking(BookingPayload::Draft(payload))
            .await?;

        let mut saga = self.sagas.load(&booking_ref).await?;
        if !saga.is_reserved() {
            let event = CheckoutEvent::reservation_confirmed(booking_ref.clone());
            self.record(&booking_ref, &mut saga, event).await?;
        }
        Ok(())
    }

    /// Reprices a draft for an agent and stores the new totals.
    ///
    /// Only agents may do this, and only before payment. Other callers are
    /// turned away before the financial service is called.
    #[tracing::instrument(skip(self, request))]
    pub async fn recompute_financials(
        &self,
        booking_ref: &BookingRef,
        caller: &Caller,
        request: RecomputeRequest,
    ) -> Result<BookingDraft> {
        if caller.role != CallerRole::Agent {
            return Err(SagaError::Forbidden(
                "only agents can recompute booking financials".to_string(),
            ));
        }

        let draft = self.bookings.get_booking(booking_ref).await?;
        match draft.status() {
            BookingStatus::Paid => {
                return Err(DomainError::from(BookingError::FinancialsImmutable).into());
            }
            status if !status.can_recompute() => {
                return Err(DomainError::from(BookingError::InvalidStateTransition {
                    current_state: status,
                    action: "recompute financials",
                })
                .into());
            }
            _ => {}
        }

        let saga = self.sagas.load(booking_ref).await?;
        if saga.state().is_in_flight() {
            return Err(SagaError::SettlementInProgress(booking_ref.clone()));
        }

        let (Some(stay), Some(quote)) = (draft.stay(), draft.quote()) else {
            return Err(SagaError::NotReserved(booking_ref.clone()));
        };
        let room_count = request.room_count.unwrap_or(stay.rooms);

        let recomputed = self
            .services
            .financial
            .recompute(room_count, stay.checkin, stay.checkout, quote)
            .await?;

        let result = self
            .bookings
            .recompute_financials(RecomputeFinancials::new(
                booking_ref.clone(),
                recomputed.quote,
                recomputed.agent_fee,
            ))
            .await?;

        info!(
            %booking_ref,
            agent_fee = %recomputed.agent_fee,
            "Financials recomputed for agent"
        );
        metrics::counter!("financials_recomputed_total").increment(1);
        Ok(result.aggregate)
    }

    /// Runs one payment attempt for a reserved booking.
    ///
    /// Card problems come back as `Ok(Declined | Failed | Abandoned)` and a
    /// new attempt may follow. Once the card is charged the outcome is
    /// `Confirmed` or `PaidPendingReconciliation`, and repeating the call
    /// returns that same outcome without touching the gateway.
    #[tracing::instrument(skip(self, request))]
    pub async fn settle(
        &self,
        booking_ref: &BookingRef,
        request: SettleRequest,
    ) -> Result<CheckoutOutcome> {
        let key = settle_key(booking_ref);
        match self.services.idempotency.begin(&key).await? {
            Claim::Acquired => {}
            Claim::InFlight => return Err(SagaError::SettlementInProgress(booking_ref.clone())),
            Claim::Completed(stored) => {
                debug!(%booking_ref, "Returning stored settlement outcome");
                return Ok(serde_json::from_value(stored)?);
            }
        }

        let result = self.run_attempt(booking_ref, request).await;
        match &result {
            Ok(outcome) if outcome.is_paid() => self.complete_claim(&key, outcome).await,
            _ => self.release_claim(&key).await,
        }
        result
    }

    async fn run_attempt(
        &self,
        booking_ref: &BookingRef,
        request: SettleRequest,
    ) -> Result<CheckoutOutcome> {
        let mut saga = self.sagas.load(booking_ref).await?;
        if !saga.is_reserved() {
            return Err(SagaError::NotReserved(booking_ref.clone()));
        }
        self.expire_stale_attempt(booking_ref, &mut saga).await?;
        if !saga.state().can_start_attempt() {
            return Err(SagaError::InvalidSettlementState {
                booking_ref: booking_ref.clone(),
                state: saga.state(),
            });
        }

        let draft = self.bookings.get_booking(booking_ref).await?;
        if !draft.status().can_finalize() {
            return Err(DomainError::from(BookingError::InvalidStateTransition {
                current_state: draft.status(),
                action: "settle payment",
            })
            .into());
        }
        let (Some(payer), Some(quote)) = (draft.payer(), draft.quote()) else {
            return Err(SagaError::NotReserved(booking_ref.clone()));
        };

        let mut ctx = AttemptContext {
            attempt: saga.attempts() + 1,
            amount: draft.financials().charge_amount(),
            currency: quote.currency.clone(),
            payer: payer.clone(),
            payment_gateway: draft
                .payment_gateway()
                .unwrap_or(self.config.payment_gateway.as_str())
                .to_string(),
            details_failure: None,
        };

        let started = CheckoutEvent::attempt_started(ctx.attempt, ctx.amount, ctx.currency.clone());
        self.record(booking_ref, &mut saga, started).await?;
        info!(%booking_ref, attempt = ctx.attempt, amount = %ctx.amount, "Payment attempt started");

        // Intent creation and the details write run together; both settle
        // before authorization.
        let intent_request = IntentRequest {
            amount: ctx.amount,
            currency: ctx.currency.clone(),
            email: ctx.payer.email.clone(),
            booking_ref: booking_ref.clone(),
        };
        let details = FinalizePayload::unpaid(booking_ref.clone(), ctx.payment_gateway.clone());
        let (intent, persisted) = tokio::join!(
            self.services.gateway.create_intent(&intent_request),
            self.bookings.upsert_booking(BookingPayload::Finalize(details)),
        );

        if let Err(e) = persisted {
            warn!(%booking_ref, error = %e, "Booking details write failed, continuing with payment");
            let message = e.to_string();
            let event = CheckoutEvent::details_persist_failed(ctx.attempt, message.clone());
            self.record_best_effort(booking_ref, &mut saga, event).await;
            ctx.details_failure = Some(message);
        }

        let intent = match intent {
            Ok(intent) => intent,
            Err(e) => {
                return self
                    .fail_setup(booking_ref, &mut saga, ctx.attempt, e.message)
                    .await;
            }
        };
        let Some(client_secret) = intent.client_secret.clone() else {
            return self
                .fail_setup(
                    booking_ref,
                    &mut saga,
                    ctx.attempt,
                    "payment intent has no client secret".to_string(),
                )
                .await;
        };
        let payment_intent_id = intent.payment_intent_id;

        let created = CheckoutEvent::intent_created(ctx.attempt, payment_intent_id.clone());
        self.record(booking_ref, &mut saga, created).await?;

        // The card is only charged for a booking that is still payable.
        let current = self.bookings.get_booking(booking_ref).await?;
        if !current.status().can_finalize() || current.cancellation_requested() {
            return self
                .fail_setup(
                    booking_ref,
                    &mut saga,
                    ctx.attempt,
                    format!("booking is {} and can no longer be paid", current.status()),
                )
                .await;
        }

        // Abandonable from the moment the saga reads as authorizing.
        let token = CancellationToken::new();
        self.authorizations
            .lock()
            .await
            .insert(booking_ref.clone(), token.clone());

        let started = CheckoutEvent::authorization_started(ctx.attempt);
        if let Err(e) = self.record(booking_ref, &mut saga, started).await {
            self.authorizations.lock().await.remove(booking_ref);
            return Err(e);
        }

        let confirm = ConfirmRequest {
            client_secret,
            card: request.card,
            billing_details: request.billing_details,
        };

        let authorizing = Instant::now();
        let confirmed = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = timeout(
                self.config.authorization_timeout,
                self.services.gateway.confirm_card_payment(&confirm),
            ) => Some(result),
        };

        self.authorizations.lock().await.remove(booking_ref);
        metrics::histogram!("payment_authorization_duration_seconds")
            .record(authorizing.elapsed().as_secs_f64());

        let status = match confirmed {
            None => {
                info!(%booking_ref, attempt = ctx.attempt, "Payment attempt abandoned");
                metrics::counter!("payment_attempts_abandoned_total").increment(1);
                let event = CheckoutEvent::attempt_abandoned(ctx.attempt);
                self.record_best_effort(booking_ref, &mut saga, event).await;
                return Ok(CheckoutOutcome::Abandoned {
                    booking_ref: booking_ref.clone(),
                });
            }
            Some(Err(_)) => {
                let message = format!(
                    "payment authorization timed out after {}s",
                    self.config.authorization_timeout.as_secs()
                );
                return self
                    .fail_authorization(booking_ref, &mut saga, ctx.attempt, message)
                    .await;
            }
            Some(Ok(Err(declined))) => {
                info!(%booking_ref, message = %declined.message, "Payment declined");
                metrics::counter!("payment_declines_total").increment(1);
                let event = CheckoutEvent::payment_declined(ctx.attempt, declined.message.clone());
                self.record_best_effort(booking_ref, &mut saga, event).await;
                return Ok(CheckoutOutcome::Declined {
                    booking_ref: booking_ref.clone(),
                    message: declined.message,
                });
            }
            Some(Ok(Ok(status))) => status,
        };

        if status != PaymentIntentStatus::Succeeded {
            let message = format!("payment was not completed (status {status})");
            return self
                .fail_authorization(booking_ref, &mut saga, ctx.attempt, message)
                .await;
        }

        Ok(self
            .finalize_paid(booking_ref, &mut saga, &ctx, payment_intent_id)
            .await)
    }

    /// Persists a charged booking. Never fails: a charge that cannot be
    /// finalized is flagged for reconciliation and still redirects to the
    /// success page.
    async fn finalize_paid(
        &self,
        booking_ref: &BookingRef,
        saga: &mut CheckoutSaga,
        ctx: &AttemptContext,
        payment_intent_id: String,
    ) -> CheckoutOutcome {
        info!(%booking_ref, %payment_intent_id, "Payment authorized");
        metrics::counter!("payment_authorizations_total").increment(1);
        let authorized = CheckoutEvent::payment_authorized(ctx.attempt, payment_intent_id.clone());
        self.record_with_retry(booking_ref, saga, authorized).await;

        let payload = FinalizePayload::paid(
            booking_ref.clone(),
            ctx.payment_gateway.clone(),
            payment_intent_id.clone(),
        );
        let finalized = self
            .bookings
            .upsert_booking(BookingPayload::Finalize(payload))
            .await;

        let redirect_url = self.success_redirect(booking_ref, ctx.amount, &ctx.currency, &ctx.payer);

        let failure = match (finalized, &ctx.details_failure) {
            (Err(e), _) => Some(format!("finalization failed: {e}")),
            (Ok(_), Some(details)) => Some(format!("booking details were not saved: {details}")),
            (Ok(_), None) => None,
        };

        match failure {
            Some(reason) => {
                error!(%booking_ref, %payment_intent_id, %reason, "Payment taken but booking not finalized");
                metrics::counter!("bookings_pending_reconciliation_total").increment(1);
                let event = CheckoutEvent::reconciliation_required(payment_intent_id, reason);
                self.record_with_retry(booking_ref, saga, event).await;
                CheckoutOutcome::paid_pending_reconciliation(booking_ref.clone(), redirect_url)
            }
            None => {
                info!(%booking_ref, "Booking finalized");
                metrics::counter!("bookings_finalized_total").increment(1);
                let event = CheckoutEvent::booking_finalized(payment_intent_id, false);
                self.record_best_effort(booking_ref, saga, event).await;
                CheckoutOutcome::Confirmed {
                    booking_ref: booking_ref.clone(),
                    redirect_url,
                }
            }
        }
    }

    async fn fail_setup(
        &self,
        booking_ref: &BookingRef,
        saga: &mut CheckoutSaga,
        attempt: u32,
        reason: String,
    ) -> Result<CheckoutOutcome> {
        warn!(%booking_ref, %reason, "Payment setup failed");
        metrics::counter!("payment_setup_failures_total").increment(1);
        let event = CheckoutEvent::intent_failed(attempt, reason.clone());
        self.record_best_effort(booking_ref, saga, event).await;
        Err(SagaError::PaymentSetupFailed {
            booking_ref: booking_ref.clone(),
            reason,
        })
    }

    async fn fail_authorization(
        &self,
        booking_ref: &BookingRef,
        saga: &mut CheckoutSaga,
        attempt: u32,
        message: String,
    ) -> Result<CheckoutOutcome> {
        warn!(%booking_ref, %message, "Payment authorization failed");
        metrics::counter!("payment_authorization_failures_total").increment(1);
        let event = CheckoutEvent::authorization_failed(attempt, message.clone());
        self.record_best_effort(booking_ref, saga, event).await;
        Ok(CheckoutOutcome::Failed {
            booking_ref: booking_ref.clone(),
            message,
        })
    }

    /// Stops waiting on an authorization for this reference, as when the
    /// client navigates away. Returns whether an attempt was pending.
    /// Calling it again, or with nothing pending, does nothing.
    ///
    /// An attempt this process does not own, left behind by a restart or a
    /// dropped request, is closed once it has been quiet for longer than
    /// the authorization timeout.
    pub async fn abandon(&self, booking_ref: &BookingRef) -> Result<bool> {
        if let Some(token) = self.authorizations.lock().await.get(booking_ref) {
            debug!(%booking_ref, "Abandoning pending authorization");
            token.cancel();
            return Ok(true);
        }

        let mut saga = self.sagas.load(booking_ref).await?;
        self.expire_stale_attempt(booking_ref, &mut saga).await
    }

    async fn expire_stale_attempt(
        &self,
        booking_ref: &BookingRef,
        saga: &mut CheckoutSaga,
    ) -> Result<bool> {
        if !saga.state().is_in_flight()
            || self.authorizations.lock().await.contains_key(booking_ref)
        {
            return Ok(false);
        }
        let quiet_for = saga
            .updated_at()
            .and_then(|at| chrono::Utc::now().signed_duration_since(at).to_std().ok())
            .unwrap_or_default();
        if quiet_for < self.config.authorization_timeout {
            return Ok(false);
        }

        warn!(
            %booking_ref,
            state = %saga.state(),
            attempt = saga.attempts(),
            "Closing interrupted payment attempt"
        );
        metrics::counter!("payment_attempts_expired_total").increment(1);
        let event = CheckoutEvent::attempt_abandoned(saga.attempts());
        self.record(booking_ref, saga, event).await?;
        Ok(true)
    }

    /// Retries finalization for a booking whose card was charged but which
    /// could not be persisted. Operators only. The payment is not touched.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(
        &self,
        booking_ref: &BookingRef,
        caller: &Caller,
    ) -> Result<CheckoutOutcome> {
        if caller.role != CallerRole::Operator {
            return Err(SagaError::Forbidden(
                "only operators can reconcile bookings".to_string(),
            ));
        }

        let mut saga = self.sagas.load(booking_ref).await?;
        if !saga.reconciliation_required() {
            return Err(SagaError::NothingToReconcile(booking_ref.clone()));
        }
        let payment_intent_id = saga
            .payment_intent_id()
            .map(str::to_string)
            .ok_or_else(|| SagaError::NothingToReconcile(booking_ref.clone()))?;

        let draft = self.bookings.get_booking(booking_ref).await?;
        let payer = draft
            .payer()
            .cloned()
            .ok_or_else(|| SagaError::NotReserved(booking_ref.clone()))?;
        let currency = saga
            .currency()
            .cloned()
            .or_else(|| draft.quote().map(|q| q.currency.clone()))
            .ok_or_else(|| SagaError::NotReserved(booking_ref.clone()))?;
        let amount = saga
            .amount()
            .unwrap_or_else(|| draft.financials().charge_amount());
        let payment_gateway = draft
            .payment_gateway()
            .unwrap_or(self.config.payment_gateway.as_str())
            .to_string();

        let payload =
            FinalizePayload::paid(booking_ref.clone(), payment_gateway, payment_intent_id.clone());
        if let Err(e) = self
            .bookings
            .upsert_booking(BookingPayload::Finalize(payload))
            .await
        {
            warn!(%booking_ref, error = %e, "Reconciliation attempt failed");
            return Err(SagaError::FinalizationFailed {
                booking_ref: booking_ref.clone(),
                reason: e.to_string(),
            });
        }

        let event = CheckoutEvent::booking_finalized(payment_intent_id, true);
        self.record(booking_ref, &mut saga, event).await?;

        info!(%booking_ref, "Booking reconciled");
        metrics::counter!("bookings_reconciled_total").increment(1);

        Ok(CheckoutOutcome::Confirmed {
            booking_ref: booking_ref.clone(),
            redirect_url: self.success_redirect(booking_ref, amount, &currency, &payer),
        })
    }

    /// Sagas that were charged but still wait for an operator.
    pub async fn pending_reconciliations(&self) -> Result<Vec<CheckoutSaga>> {
        let query = EntryQuery::for_stream_type(CheckoutSaga::aggregate_type())
            .entry_type("ReconciliationRequired");
        let entries = self.sagas.ledger().query(query).await?;

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for entry in entries {
            if !seen.insert(entry.booking_ref.clone()) {
                continue;
            }
            let saga = self.sagas.load(&entry.booking_ref).await?;
            if saga.reconciliation_required() {
                pending.push(saga);
            }
        }
        Ok(pending)
    }

    /// Cancels a confirmed booking through the cancellation API.
    ///
    /// A booking that cannot be cancelled is rejected before anything is
    /// written or called. A failed API call clears the in-flight flag and
    /// leaves the booking as it was.
    ///
    /// Cancellation and settlement exclude each other through the
    /// reference's settle claim: a cancel sent while a payment attempt is
    /// running is rejected with `SettlementInProgress`, and a payment
    /// submitted while a cancel runs is rejected the same way.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        booking_ref: &BookingRef,
        reason: Option<String>,
    ) -> Result<CancellationResult> {
        let key = settle_key(booking_ref);
        let claimed = match self.services.idempotency.begin(&key).await? {
            Claim::Acquired => true,
            Claim::InFlight => return Err(SagaError::SettlementInProgress(booking_ref.clone())),
            Claim::Completed(_) => false,
        };

        let result = self.run_cancellation(booking_ref, reason).await;
        if claimed {
            self.release_claim(&key).await;
        }
        result
    }

    async fn run_cancellation(
        &self,
        booking_ref: &BookingRef,
        reason: Option<String>,
    ) -> Result<CancellationResult> {
        let saga = self.sagas.load(booking_ref).await?;
        if saga.state().is_in_flight() {
            info!(%booking_ref, state = %saga.state(), "Cancellation rejected during payment");
            metrics::counter!("cancellations_total", "outcome" => "rejected").increment(1);
            return Err(SagaError::SettlementInProgress(booking_ref.clone()));
        }

        let request = CancelRequest {
            booking_ref: booking_ref.clone(),
            reason,
        };
        match self
            .bookings
            .request_cancellation(RequestCancellation::new(request))
            .await
        {
            Ok(_) => {}
            Err(DomainError::Booking(e)) => {
                info!(%booking_ref, reason = %e, "Cancellation rejected");
                metrics::counter!("cancellations_total", "outcome" => "rejected").increment(1);
                return Err(SagaError::CancellationNotAllowed {
                    booking_ref: booking_ref.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        let message = match self.services.cancellations.cancel_booking(booking_ref).await {
            Ok(response) if response.cancelled => {
                let result = self
                    .bookings
                    .complete_cancellation(CompleteCancellation::new(
                        booking_ref.clone(),
                        response.message.clone(),
                    ))
                    .await?;
                info!(%booking_ref, "Booking cancelled");
                metrics::counter!("cancellations_total", "outcome" => "cancelled").increment(1);
                return Ok(CancellationResult {
                    booking_ref: booking_ref.clone(),
                    status: result.aggregate.status(),
                    message: response.message,
                });
            }
            Ok(response) => response.message,
            Err(SagaError::CancellationFailed { message, .. }) => message,
            Err(e) => e.to_string(),
        };

        warn!(%booking_ref, %message, "Cancellation failed");
        self.bookings
            .fail_cancellation(FailCancellation::new(booking_ref.clone(), message.clone()))
            .await?;
        metrics::counter!("cancellations_total", "outcome" => "failed").increment(1);
        Err(SagaError::CancellationFailed {
            booking_ref: booking_ref.clone(),
            message,
        })
    }

    pub async fn get_saga(&self, booking_ref: &BookingRef) -> Result<CheckoutSaga> {
        self.sagas
            .load_existing(booking_ref)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound {
                    aggregate_type: CheckoutSaga::aggregate_type(),
                    booking_ref: booking_ref.clone(),
                }
                .into()
            })
    }

    pub fn verify_handoff(&self, token: &str) -> Result<HandoffToken> {
        self.signer.verify(token)
    }

    fn success_redirect(
        &self,
        booking_ref: &BookingRef,
        price: Money,
        currency: &Currency,
        payer: &Payer,
    ) -> String {
        let token = HandoffToken {
            booking_ref: booking_ref.clone(),
            price,
            currency: currency.clone(),
            invoice_url: self.config.invoice_url(booking_ref),
            user_id: payer.user_id.clone(),
            client_email: payer.email.clone(),
            issued_at: chrono::Utc::now(),
        };
        match self.signer.sign(&token) {
            Ok(signed) => self.config.success_redirect(&signed),
            Err(e) => {
                error!(%booking_ref, error = %e, "Could not sign hand-off token");
                self.config.success_url_base.clone()
            }
        }
    }

    /// Appends a saga event at the next version and applies it.
    async fn record(
        &self,
        booking_ref: &BookingRef,
        saga: &mut CheckoutSaga,
        event: CheckoutEvent,
    ) -> Result<()> {
        let current = saga.version();
        let entry = LedgerEntry::builder()
            .entry_type(event.event_type())
            .stream(CommandHandler::<S, CheckoutSaga>::stream_key(booking_ref))
            .version(current.next())
            .payload(&event)?
            .build()
            .ok_or_else(|| DomainError::IncompleteEntry(event.event_type().to_string()))?;

        let version = self
            .sagas
            .ledger()
            .append(vec![entry], AppendOptions::expect_version(current))
            .await?;

        saga.apply(event);
        saga.set_version(version);
        Ok(())
    }

    /// Records an event once the outcome no longer depends on it.
    async fn record_best_effort(
        &self,
        booking_ref: &BookingRef,
        saga: &mut CheckoutSaga,
        event: CheckoutEvent,
    ) {
        let event_type = event.event_type();
        if let Err(e) = self.record(booking_ref, saga, event).await {
            error!(%booking_ref, event_type, error = %e, "Failed to record saga event");
        }
    }

    /// Records an event that must survive once the card has been charged.
    /// A failed append reloads the saga and tries again before giving up.
    async fn record_with_retry(
        &self,
        booking_ref: &BookingRef,
        saga: &mut CheckoutSaga,
        event: CheckoutEvent,
    ) {
        let event_type = event.event_type();
        for attempt in 1..=RECORD_ATTEMPTS {
            let e = match self.record(booking_ref, saga, event.clone()).await {
                Ok(()) => return,
                Err(e) => e,
            };
            if attempt == RECORD_ATTEMPTS {
                error!(%booking_ref, event_type, error = %e, "Failed to record saga event after retries");
                metrics::counter!("saga_record_failures_total", "event_type" => event_type)
                    .increment(1);
                return;
            }
            warn!(%booking_ref, event_type, attempt, error = %e, "Saga append failed, retrying");
            tokio::time::sleep(RECORD_BACKOFF * attempt).await;
            match self.sagas.load(booking_ref).await {
                Ok(reloaded) => *saga = reloaded,
                Err(e) => warn!(%booking_ref, error = %e, "Could not reload saga"),
            }
        }
    }

    async fn complete_claim<T: Serialize>(&self, key: &str, response: &T) {
        let stored = match serde_json::to_value(response) {
            Ok(value) => self.services.idempotency.complete(key, value).await,
            Err(e) => {
                error!(key, error = %e, "Could not serialize idempotent response");
                self.services.idempotency.release(key).await
            }
        };
        if let Err(e) = stored {
            error!(key, error = %e, "Failed to store idempotency key");
        }
    }

    async fn release_claim(&self, key: &str) {
        if let Err(e) = self.services.idempotency.release(key).await {
            error!(key, error = %e, "Failed to release idempotency key");
        }
    }
}

const RECORD_ATTEMPTS: u32 = 5;
const RECORD_BACKOFF: Duration = Duration::from_millis(50);

fn reserve_key(booking_ref: &BookingRef) -> String {
    format!("reserve:{booking_ref}")
}

fn settle_key(booking_ref: &BookingRef) -> String {
    format!("settle:{booking_ref}")
}
