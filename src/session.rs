use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::{error, info};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{FormError, PersistError, SessionError};
use crate::markup::MarkupEdit;

#[cfg(test)]
use mockall::automock;

/// What actually hits the wire for one confirmed markup change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateUpdate {
    pub base_currency: String,
    pub target_currency: String,
    pub rate: Decimal,
    pub manual_expiry: String,
}

/// The rate-setting endpoint, behind a trait so sessions can be driven
/// against a mock in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RateWriter: Send + Sync {
    async fn update_exchange_rate(&self, update: &RateUpdate) -> Result<(), PersistError>;
}

/// Immutable copy of the form taken at submission. Later edits to the
/// underlying form never change what the operator is asked to confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationSnapshot {
    pub base_currency: String,
    pub destination_currency: String,
    pub exchange_rate: Decimal,
    pub markup_percent: Option<Decimal>,
    pub final_rate: Decimal,
    pub effective_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    PendingConfirmation,
    Persisted,
    Discarded,
}

/// One operator's pass through the markup workflow:
/// Editing -> PendingConfirmation -> Persisted, with back/cancel exits.
///
/// The session owns its MarkupEdit exclusively; if two sessions race on
/// the same pair, last write wins at the rate-setting endpoint.
pub struct EditSession {
    id: Uuid,
    form: MarkupEdit,
    pending: Option<ConfirmationSnapshot>,
    state: SessionState,
}

impl EditSession {
    pub fn open(form: MarkupEdit) -> Self {
        Self {
            id: Uuid::new_v4(),
            form,
            pending: None,
            state: SessionState::Editing,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn form(&self) -> &MarkupEdit {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut MarkupEdit {
        &mut self.form
    }

    pub fn pending(&self) -> Option<&ConfirmationSnapshot> {
        self.pending.as_ref()
    }

    /// Validates the form and, on success, freezes it into the pending
    /// confirmation snapshot.
    pub fn submit(&mut self) -> Result<&ConfirmationSnapshot, SessionError> {
        match self.state {
            SessionState::Persisted | SessionState::Discarded => {
                return Err(SessionError::Closed);
            }
            SessionState::Editing | SessionState::PendingConfirmation => {}
        }
        self.form.validate_for_submit()?;
        let (Some(final_rate), Some(effective_at)) =
            (self.form.final_rate(), self.form.effective_at())
        else {
            // validate_for_submit guarantees both are set
            return Err(SessionError::Invalid(FormError::MissingField("final rate")));
        };
        let snapshot = ConfirmationSnapshot {
            base_currency: self.form.base_currency().to_string(),
            destination_currency: self.form.destination_currency().to_string(),
            exchange_rate: self.form.exchange_rate(),
            markup_percent: self.form.markup_percent(),
            final_rate,
            effective_at,
        };
        self.state = SessionState::PendingConfirmation;
        Ok(&*self.pending.insert(snapshot))
    }

    /// Returns to the form, restoring the fields frozen at submission
    /// rather than whatever the form holds now.
    pub fn back(&mut self) -> Result<(), SessionError> {
        let snapshot = self.pending.take().ok_or(SessionError::NothingPending)?;
        self.form.restore(
            snapshot.markup_percent,
            Some(snapshot.final_rate),
            Some(snapshot.effective_at),
        );
        self.state = SessionState::Editing;
        Ok(())
    }

    /// Commits the pending snapshot. On failure the snapshot stays live
    /// so the operator can retry or go back; nothing is rolled back.
    pub async fn confirm(
        &mut self,
        writer: &dyn RateWriter,
    ) -> Result<ConfirmationSnapshot, SessionError> {
        let snapshot = self.pending.clone().ok_or(SessionError::NothingPending)?;
        let update = RateUpdate {
            base_currency: snapshot.base_currency.clone(),
            target_currency: snapshot.destination_currency.clone(),
            rate: snapshot.final_rate,
            manual_expiry: manual_expiry(snapshot.effective_at),
        };
        if let Err(err) = writer.update_exchange_rate(&update).await {
            error!(
                "session {}: rate update {}/{} failed: {err}",
                self.id, update.base_currency, update.target_currency
            );
            return Err(err.into());
        }
        info!(
            "session {}: committed {}/{} rate {} effective {}",
            self.id, update.base_currency, update.target_currency, update.rate, update.manual_expiry
        );
        self.form.clear();
        self.pending = None;
        self.state = SessionState::Persisted;
        Ok(snapshot)
    }

    /// Abandons the edit entirely.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.state = SessionState::Discarded;
    }
}

/// ISO-8601 to whole seconds, no timezone suffix, as the rate-setting
/// endpoint expects.
fn manual_expiry(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}
