use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::board::{BoardSnapshot, RateBoard, RateQuote, RateValue};
use crate::error::SourceError;
use crate::treasury::TreasuryRate;

#[cfg(test)]
use mockall::automock;

/// Source of the platform's own quoted rates (the treasury list).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TreasurySource: Send + Sync {
    async fn rate_list(&self) -> Result<Vec<TreasuryRate>, SourceError>;
}

/// Source of third-party market rates for one currency pair.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FxSource: Send + Sync {
    async fn pair_rate(&self, base: &str, target: &str) -> Result<Decimal, SourceError>;
}

const TREASURY_BASES: [&str; 2] = ["USD", "GBP"];
const TREASURY_TARGET: &str = "KES";

/// KES conversions from the major bases are quoted by the treasury
/// itself; everything else comes from the FX provider.
fn routes_through_treasury(base: &str, target: &str) -> bool {
    TREASURY_BASES.contains(&base) && target == TREASURY_TARGET
}

fn treasury_rate(list: &[TreasuryRate], base: &str, target: &str) -> RateValue {
    list.iter()
        .find(|row| row.base_currency == base && row.target_currency == target)
        .and_then(|row| Decimal::try_from(row.current_rate).ok())
        .map(RateValue::Available)
        .unwrap_or(RateValue::Unavailable)
}

/// Assembles one complete board. Every destination resolves on its own:
/// a failed lookup degrades that code to `Unavailable` and never touches
/// the others.
pub async fn fetch_board(
    treasury: &dyn TreasurySource,
    fx: &dyn FxSource,
    base: &str,
    destinations: &[String],
) -> BoardSnapshot {
    // One list call serves both the treasury-routed market rates and the
    // platform-quoted side of every pair.
    let treasury_list = match treasury.rate_list().await {
        Ok(list) => list,
        Err(err) => {
            debug!("treasury rate list unavailable: {err}");
            Vec::new()
        }
    };

    let mut quotes = RateBoard::new();
    for code in destinations {
        let market_rate = if routes_through_treasury(base, code) {
            treasury_rate(&treasury_list, base, code)
        } else {
            match fx.pair_rate(base, code).await {
                Ok(rate) => RateValue::Available(rate),
                Err(err) => {
                    debug!("market rate {base}/{code} unavailable: {err}");
                    RateValue::Unavailable
                }
            }
        };
        let tuma_rate = treasury_rate(&treasury_list, base, code);
        quotes.insert(code.clone(), RateQuote { market_rate, tuma_rate });
    }

    BoardSnapshot {
        base: base.to_string(),
        fetched_at: Utc::now(),
        quotes,
    }
}

/// Background refresh loop for the rate board.
///
/// Publishes a fresh snapshot on every tick and immediately when the base
/// currency changes. The task stops when `stop` is called or the poller
/// is dropped, so unmounting a view never leaves overlapping polls
/// behind.
pub struct RatePoller {
    base_tx: watch::Sender<String>,
    board_rx: watch::Receiver<BoardSnapshot>,
    handle: JoinHandle<()>,
}

impl RatePoller {
    pub fn spawn(
        treasury: Arc<dyn TreasurySource>,
        fx: Arc<dyn FxSource>,
        base: String,
        destinations: Vec<String>,
        interval: Duration,
    ) -> Self {
        let (base_tx, mut base_rx) = watch::channel(base.clone());
        let (board_tx, board_rx) = watch::channel(BoardSnapshot::empty(base));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = base_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // Refresh right away for the new base; the next
                        // scheduled tick starts a full interval from now.
                        ticker.reset();
                    }
                }
                let base = base_rx.borrow().clone();
                let snapshot =
                    fetch_board(treasury.as_ref(), fx.as_ref(), &base, &destinations).await;
                if board_tx.send(snapshot).is_err() {
                    break;
                }
            }
        });

        Self {
            base_tx,
            board_rx,
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.board_rx.clone()
    }

    pub fn set_base(&self, base: String) {
        let _ = self.base_tx.send(base);
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for RatePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(base: &str, target: &str, rate: f64) -> TreasuryRate {
        TreasuryRate {
            base_currency: base.to_string(),
            target_currency: target.to_string(),
            current_rate: rate,
        }
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|code| code.to_string()).collect()
    }

    #[tokio::test]
    async fn one_failing_lookup_does_not_blank_the_others() {
        let mut treasury = MockTreasurySource::new();
        treasury
            .expect_rate_list()
            .returning(|| Err(SourceError::Status(reqwest::StatusCode::BAD_GATEWAY)));
        let mut fx = MockFxSource::new();
        fx.expect_pair_rate()
            .withf(|base, target| base == "USD" && target == "EUR")
            .returning(|_, _| Ok(dec!(0.92)));

        let snapshot = fetch_board(&treasury, &fx, "USD", &codes(&["KES", "EUR"])).await;

        assert_eq!(snapshot.quotes["KES"].market_rate, RateValue::Unavailable);
        assert_eq!(
            snapshot.quotes["EUR"].market_rate,
            RateValue::Available(dec!(0.92))
        );
    }

    #[tokio::test]
    async fn kes_from_major_bases_never_hits_the_fx_provider() {
        let mut treasury = MockTreasurySource::new();
        treasury
            .expect_rate_list()
            .returning(|| Ok(vec![row("USD", "KES", 129.53)]));
        let mut fx = MockFxSource::new();
        fx.expect_pair_rate().never();

        let snapshot = fetch_board(&treasury, &fx, "USD", &codes(&["KES"])).await;

        assert_eq!(
            snapshot.quotes["KES"].market_rate,
            RateValue::Available(dec!(129.53))
        );
        assert_eq!(
            snapshot.quotes["KES"].tuma_rate,
            RateValue::Available(dec!(129.53))
        );
    }

    #[tokio::test]
    async fn tuma_side_requires_an_exact_pair_match() {
        let mut treasury = MockTreasurySource::new();
        treasury
            .expect_rate_list()
            .returning(|| Ok(vec![row("GBP", "KES", 163.07)]));
        let mut fx = MockFxSource::new();
        fx.expect_pair_rate().returning(|_, _| Ok(dec!(0.92)));

        let snapshot = fetch_board(&treasury, &fx, "USD", &codes(&["EUR"])).await;

        // The GBP/KES row must not satisfy a USD/EUR lookup.
        assert_eq!(snapshot.quotes["EUR"].tuma_rate, RateValue::Unavailable);
        assert_eq!(
            snapshot.quotes["EUR"].market_rate,
            RateValue::Available(dec!(0.92))
        );
    }

    #[tokio::test]
    async fn fx_errors_degrade_to_unavailable() {
        let mut treasury = MockTreasurySource::new();
        treasury.expect_rate_list().returning(|| Ok(Vec::new()));
        let mut fx = MockFxSource::new();
        fx.expect_pair_rate().returning(|base, target| {
            Err(SourceError::NoRate {
                base: base.to_string(),
                target: target.to_string(),
            })
        });

        let snapshot = fetch_board(&treasury, &fx, "USD", &codes(&["NGN"])).await;

        assert_eq!(snapshot.quotes["NGN"].market_rate, RateValue::Unavailable);
    }

    #[tokio::test]
    async fn poller_publishes_and_refetches_on_base_change() {
        let mut treasury = MockTreasurySource::new();
        treasury.expect_rate_list().returning(|| Ok(Vec::new()));
        let mut fx = MockFxSource::new();
        fx.expect_pair_rate().returning(|_, _| Ok(dec!(0.92)));

        // Interval long enough that only the initial tick and the base
        // change can trigger fetches within the test.
        let poller = RatePoller::spawn(
            Arc::new(treasury),
            Arc::new(fx),
            "USD".to_string(),
            codes(&["EUR"]),
            Duration::from_secs(3600),
        );
        let mut boards = poller.subscribe();

        {
            let board = boards
                .wait_for(|board| !board.quotes.is_empty())
                .await
                .unwrap();
            assert_eq!(board.base, "USD");
        }

        poller.set_base("GBP".to_string());
        {
            let board = boards.wait_for(|board| board.base == "GBP").await.unwrap();
            assert!(board.quotes.contains_key("EUR"));
        }

        poller.stop();
    }
}
