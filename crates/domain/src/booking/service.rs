//! Booking service: the booking ledger API.

use common::BookingRef;
use ledger::{Ledger, LedgerEntry};
use tracing::{debug, info};

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    BookingDraft, BookingPayload, CompleteCancellation, FailCancellation, PersistFinalize,
    RecomputeFinancials, RequestCancellation, ReserveDraft,
};

/// Service for managing booking drafts.
///
/// Wraps the command handler and exposes one method per booking operation,
/// plus `upsert_booking` which routes a tagged payload to the right one.
pub struct BookingService<S: Ledger> {
    handler: CommandHandler<S, BookingDraft>,
}

impl<S: Ledger> BookingService<S> {
    pub fn new(ledger: S) -> Self {
        Self {
            handler: CommandHandler::new(ledger),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, BookingDraft> {
        &self.handler
    }

    /// Idempotent upsert keyed by booking reference.
    #[tracing::instrument(skip(self, payload), fields(booking_ref = %payload.booking_ref(), phase = payload.phase()))]
    pub async fn upsert_booking(&self, payload: BookingPayload) -> Result<BookingDraft, DomainError> {
        let result = match payload {
            BookingPayload::Draft(p) => self.reserve(ReserveDraft::new(p)).await?,
            BookingPayload::Finalize(p) => self.persist_finalize(PersistFinalize::new(p)).await?,
            BookingPayload::Cancel(r) => {
                self.request_cancellation(RequestCancellation::new(r)).await?
            }
        };
        Ok(result.aggregate)
    }

    /// Reserves a booking reference.
    ///
    /// Returns the existing draft when the reference is already reserved,
    /// including when a concurrent reserve won the race.
    #[tracing::instrument(skip(self, cmd), fields(booking_ref = %cmd.payload.booking_ref))]
    pub async fn reserve(
        &self,
        cmd: ReserveDraft,
    ) -> Result<CommandResult<BookingDraft>, DomainError> {
        let booking_ref = cmd.payload.booking_ref.clone();

        match self
            .handler
            .execute(&booking_ref, |draft| draft.reserve(&cmd.payload))
            .await
        {
            Ok(result) => {
                if !result.events.is_empty() {
                    info!(%booking_ref, "Draft reserved");
                    metrics::counter!("bookings_reserved_total").increment(1);
                }
                Ok(result)
            }
            Err(e) if e.is_concurrency_conflict() => {
                debug!(%booking_ref, "Concurrent reserve lost the race, returning existing draft");
                let aggregate = self.get_booking(&booking_ref).await?;
                let new_version = aggregate.version();
                Ok(CommandResult {
                    aggregate,
                    events: vec![],
                    new_version,
                })
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self, cmd), fields(booking_ref = %cmd.booking_ref))]
    pub async fn recompute_financials(
        &self,
        cmd: RecomputeFinancials,
    ) -> Result<CommandResult<BookingDraft>, DomainError> {
        let RecomputeFinancials {
            booking_ref,
            quote,
            agent_fee,
        } = cmd;

        self.require_existing(&booking_ref).await?;
        self.handler
            .execute(&booking_ref, |draft| draft.recompute_financials(quote, agent_fee))
            .await
    }

    /// Persists details (`unpaid`) or finalizes (`paid`).
    #[tracing::instrument(skip(self, cmd), fields(booking_ref = %cmd.payload.booking_ref, status = ?cmd.payload.status))]
    pub async fn persist_finalize(
        &self,
        cmd: PersistFinalize,
    ) -> Result<CommandResult<BookingDraft>, DomainError> {
        let booking_ref = cmd.payload.booking_ref.clone();
        self.require_existing(&booking_ref).await?;

        let result = self
            .handler
            .execute(&booking_ref, |draft| draft.apply_finalize(&cmd.payload))
            .await?;

        if !result.events.is_empty() {
            info!(%booking_ref, status = %result.aggregate.status(), "Booking details persisted");
        }
        Ok(result)
    }

    #[tracing::instrument(skip(self, cmd), fields(booking_ref = %cmd.request.booking_ref))]
    pub async fn request_cancellation(
        &self,
        cmd: RequestCancellation,
    ) -> Result<CommandResult<BookingDraft>, DomainError> {
        let booking_ref = cmd.request.booking_ref.clone();
        self.require_existing(&booking_ref).await?;

        let reason = cmd.request.reason;
        self.handler
            .execute(&booking_ref, |draft| draft.request_cancellation(reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_cancellation(
        &self,
        cmd: CompleteCancellation,
    ) -> Result<CommandResult<BookingDraft>, DomainError> {
        let message = cmd.message;
        self.handler
            .execute(&cmd.booking_ref, |draft| draft.complete_cancellation(message))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail_cancellation(
        &self,
        cmd: FailCancellation,
    ) -> Result<CommandResult<BookingDraft>, DomainError> {
        let message = cmd.message;
        self.handler
            .execute(&cmd.booking_ref, |draft| draft.fail_cancellation(message))
            .await
    }

    pub async fn get_booking(&self, booking_ref: &BookingRef) -> Result<BookingDraft, DomainError> {
        self.find_booking(booking_ref)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                aggregate_type: BookingDraft::aggregate_type(),
                booking_ref: booking_ref.clone(),
            })
    }

    pub async fn find_booking(
        &self,
        booking_ref: &BookingRef,
    ) -> Result<Option<BookingDraft>, DomainError> {
        self.handler.load_existing(booking_ref).await
    }

    /// Raw ledger entries for a booking, oldest first.
    pub async fn history(&self, booking_ref: &BookingRef) -> Result<Vec<LedgerEntry>, DomainError> {
        let stream = CommandHandler::<S, BookingDraft>::stream_key(booking_ref);
        Ok(self.handler.ledger().read_stream(&stream).await?)
    }

    async fn require_existing(&self, booking_ref: &BookingRef) -> Result<(), DomainError> {
        self.get_booking(booking_ref).await.map(|_| ())
    }
}
