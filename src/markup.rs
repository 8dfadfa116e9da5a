use chrono::{Duration, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use crate::error::FormError;

/// Rates and markups are entered and displayed at two decimal places.
const RATE_SCALE: u32 = 2;

/// Shifts an operator-picked wall-clock time into the platform's
/// operational timezone (UTC+3). The offset is policy, kept in one place
/// so it can change without touching the form logic.
pub fn operational_time(picked: NaiveDateTime) -> NaiveDateTime {
    picked + Duration::hours(3)
}

/// "Now" expressed in the operational timezone, for comparing against
/// stored effective dates.
pub fn operational_now() -> NaiveDateTime {
    operational_time(Utc::now().naive_utc())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EditableFields {
    markup_percent: Option<Decimal>,
    final_rate: Option<Decimal>,
    effective_at: Option<NaiveDateTime>,
}

/// One in-progress edit of a base/destination pair.
///
/// The exchange rate is snapshotted when the editor opens and never
/// live-updated while the operator types. Whichever of markup and final
/// rate was touched last is authoritative; the other is recomputed:
///
///   final = exchange * (1 - markup/100)
///   markup = (final/exchange - 1) * 100
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupEdit {
    base_currency: String,
    destination_currency: String,
    exchange_rate: Decimal,
    fields: EditableFields,
    opened: EditableFields,
}

impl MarkupEdit {
    pub fn open(
        base_currency: String,
        destination_currency: String,
        exchange_rate: Decimal,
    ) -> Result<Self, FormError> {
        if exchange_rate <= Decimal::ZERO {
            return Err(FormError::NonPositiveExchangeRate);
        }
        Ok(Self {
            base_currency,
            destination_currency,
            exchange_rate,
            fields: EditableFields::default(),
            opened: EditableFields::default(),
        })
    }

    /// Opens the editor pre-seeded with the pair's current markup, so
    /// `reset` returns to these values rather than an empty form.
    pub fn open_with_markup(
        base_currency: String,
        destination_currency: String,
        exchange_rate: Decimal,
        markup_percent: Decimal,
    ) -> Result<Self, FormError> {
        let mut edit = Self::open(base_currency, destination_currency, exchange_rate)?;
        edit.set_markup_percent(markup_percent);
        edit.opened = edit.fields.clone();
        Ok(edit)
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn destination_currency(&self) -> &str {
        &self.destination_currency
    }

    pub fn exchange_rate(&self) -> Decimal {
        self.exchange_rate
    }

    pub fn markup_percent(&self) -> Option<Decimal> {
        self.fields.markup_percent
    }

    pub fn final_rate(&self) -> Option<Decimal> {
        self.fields.final_rate
    }

    pub fn effective_at(&self) -> Option<NaiveDateTime> {
        self.fields.effective_at
    }

    /// The markup drives: the final rate is recomputed.
    pub fn set_markup_percent(&mut self, percent: Decimal) {
        self.fields.markup_percent = Some(percent);
        let final_rate = self.exchange_rate * (Decimal::ONE - percent / Decimal::ONE_HUNDRED);
        self.fields.final_rate = Some(final_rate.round_dp(RATE_SCALE));
    }

    /// The final rate drives: the markup is recomputed.
    pub fn set_final_rate(&mut self, rate: Decimal) {
        self.fields.final_rate = Some(rate);
        let markup = (rate / self.exchange_rate - Decimal::ONE) * Decimal::ONE_HUNDRED;
        self.fields.markup_percent = Some(markup.round_dp(RATE_SCALE));
    }

    /// Stores the picked time shifted into the operational timezone.
    pub fn set_effective_date(&mut self, picked: NaiveDateTime) {
        self.fields.effective_at = Some(operational_time(picked));
    }

    pub fn validate_for_submit(&self) -> Result<(), FormError> {
        if self.base_currency.is_empty() {
            return Err(FormError::MissingField("base currency"));
        }
        if self.destination_currency.is_empty() {
            return Err(FormError::MissingField("destination currency"));
        }
        if self.fields.final_rate.is_none() {
            return Err(FormError::MissingField("final rate"));
        }
        match self.fields.effective_at {
            None => Err(FormError::MissingField("effective date")),
            Some(at) if at < operational_now() => Err(FormError::EffectiveDateInPast),
            Some(_) => Ok(()),
        }
    }

    /// Restores the form to the values it held when the editor opened.
    pub fn reset(&mut self) {
        self.fields = self.opened.clone();
    }

    /// Overwrites the editable fields, used when backing out of a pending
    /// confirmation.
    pub(crate) fn restore(
        &mut self,
        markup_percent: Option<Decimal>,
        final_rate: Option<Decimal>,
        effective_at: Option<NaiveDateTime>,
    ) {
        self.fields = EditableFields {
            markup_percent,
            final_rate,
            effective_at,
        };
    }

    /// Empties the editable fields after a successful commit.
    pub(crate) fn clear(&mut self) {
        self.fields = EditableFields::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn edit(rate: Decimal) -> MarkupEdit {
        MarkupEdit::open("USD".to_string(), "KES".to_string(), rate).unwrap()
    }

    fn future_date() -> NaiveDateTime {
        Utc::now().naive_utc() + Duration::days(1)
    }

    #[test]
    fn markup_drives_final_rate() {
        let mut form = edit(dec!(150.00));
        form.set_markup_percent(dec!(10));
        assert_eq!(form.final_rate(), Some(dec!(135.00)));
        assert_eq!(form.markup_percent(), Some(dec!(10)));
    }

    #[test]
    fn final_rate_drives_markup() {
        let mut form = edit(dec!(150.00));
        form.set_final_rate(dec!(140.00));
        assert_eq!(form.markup_percent(), Some(dec!(-6.67)));
        assert_eq!(form.final_rate(), Some(dec!(140.00)));
    }

    #[test]
    fn markup_round_trips_through_the_invariant() {
        // final = exchange * (1 - markup/100), so the markup implied by a
        // computed final rate must come back within rounding tolerance.
        let exchange = dec!(150.00);
        for markup in [dec!(0), dec!(10), dec!(2.5), dec!(-7.25), dec!(33.33)] {
            let mut form = edit(exchange);
            form.set_markup_percent(markup);
            let final_rate = form.final_rate().unwrap();
            let implied = (Decimal::ONE - final_rate / exchange) * Decimal::ONE_HUNDRED;
            assert!(
                (implied - markup).abs() <= dec!(0.01),
                "markup {markup} came back as {implied}"
            );
        }
    }

    #[test]
    fn rounding_is_two_decimal_places() {
        let mut form = edit(dec!(150.00));
        form.set_markup_percent(dec!(7.25));
        // 150 * (1 - 0.0725) = 139.125, rounds to 139.13
        assert_eq!(form.final_rate(), Some(dec!(139.13)));
    }

    #[test]
    fn picked_date_is_shifted_to_operational_time() {
        let picked = NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let mut form = edit(dec!(150.00));
        form.set_effective_date(picked);
        assert_eq!(
            form.effective_at(),
            Some(picked + Duration::hours(3)),
        );
    }

    #[test]
    fn validate_fails_without_effective_date() {
        let mut form = edit(dec!(150.00));
        form.set_markup_percent(dec!(10));
        assert_eq!(
            form.validate_for_submit(),
            Err(FormError::MissingField("effective date"))
        );
    }

    #[test]
    fn validate_fails_without_final_rate() {
        let mut form = edit(dec!(150.00));
        form.set_effective_date(future_date());
        assert_eq!(
            form.validate_for_submit(),
            Err(FormError::MissingField("final rate"))
        );
    }

    #[test]
    fn validate_rejects_past_effective_dates() {
        let mut form = edit(dec!(150.00));
        form.set_markup_percent(dec!(10));
        form.set_effective_date(Utc::now().naive_utc() - Duration::days(1));
        assert_eq!(
            form.validate_for_submit(),
            Err(FormError::EffectiveDateInPast)
        );
    }

    #[test]
    fn validate_passes_with_all_fields_populated() {
        let mut form = edit(dec!(150.00));
        form.set_markup_percent(dec!(10));
        form.set_effective_date(future_date());
        assert_eq!(form.validate_for_submit(), Ok(()));
    }

    #[test]
    fn reset_restores_opening_values() {
        let mut form =
            MarkupEdit::open_with_markup("USD".to_string(), "KES".to_string(), dec!(150.00), dec!(5))
                .unwrap();
        assert_eq!(form.final_rate(), Some(dec!(142.50)));

        form.set_markup_percent(dec!(20));
        assert_eq!(form.final_rate(), Some(dec!(120.00)));

        form.reset();
        assert_eq!(form.markup_percent(), Some(dec!(5)));
        assert_eq!(form.final_rate(), Some(dec!(142.50)));
    }

    #[test]
    fn reset_on_a_fresh_form_clears_edits() {
        let mut form = edit(dec!(150.00));
        form.set_markup_percent(dec!(12));
        form.reset();
        assert_eq!(form.markup_percent(), None);
        assert_eq!(form.final_rate(), None);
    }

    #[test]
    fn open_rejects_non_positive_exchange_rates() {
        assert_eq!(
            MarkupEdit::open("USD".to_string(), "KES".to_string(), Decimal::ZERO),
            Err(FormError::NonPositiveExchangeRate)
        );
        assert_eq!(
            MarkupEdit::open("USD".to_string(), "KES".to_string(), dec!(-1)),
            Err(FormError::NonPositiveExchangeRate)
        );
    }
}
