use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use reqwest::Client;
use rust_decimal::Decimal;

use auth::{ConfiguredToken, CredentialProvider};
use board::BoardSnapshot;
use fetcher::{FxSource, RatePoller, TreasurySource, fetch_board};
use fx::FxApi;
use markup::MarkupEdit;
use session::{ConfirmationSnapshot, EditSession};
use settings::Settings;
use treasury::TreasuryApi;

mod auth;
mod board;
mod error;
mod fetcher;
mod fx;
mod markup;
mod session;
mod settings;
mod treasury;

#[derive(Parser)]
#[command(name = "ratedesk", about = "Back-office desk for exchange-rate markups")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the rate sources and print the live rate board
    Watch {
        #[arg(long, default_value = "USD")]
        base: String,
    },
    /// Edit and commit the markup for one currency pair
    SetMarkup {
        #[arg(long, default_value = "USD")]
        base: String,
        #[arg(long)]
        dest: String,
        /// Markup percent; the final rate is derived
        #[arg(long, conflicts_with = "final_rate")]
        markup: Option<Decimal>,
        /// Final rate; the markup percent is derived
        #[arg(long)]
        final_rate: Option<Decimal>,
        /// Effective date, "YYYY-MM-DD HH:MM" in desk-local time
        #[arg(long)]
        effective: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Command::Watch { base } => watch(settings, base.to_uppercase()).await,
        Command::SetMarkup {
            base,
            dest,
            markup,
            final_rate,
            effective,
            yes,
        } => {
            set_markup(
                settings,
                base.to_uppercase(),
                dest.to_uppercase(),
                markup,
                final_rate,
                &effective,
                yes,
            )
            .await
        }
    }
}

async fn watch(settings: Settings, base: String) -> Result<()> {
    let credentials: Arc<dyn CredentialProvider> =
        Arc::new(ConfiguredToken::new(settings.api_token.clone()));
    let client = Client::new();
    let treasury: Arc<dyn TreasurySource> = Arc::new(TreasuryApi::new(
        client.clone(),
        settings.treasury_url.clone(),
        credentials.clone(),
    ));
    let fx: Arc<dyn FxSource> = Arc::new(FxApi::new(client, settings.fx_url.clone(), credentials));

    let poller = RatePoller::spawn(
        treasury,
        fx,
        base,
        settings.destinations.clone(),
        settings.poll_interval,
    );
    let mut boards = poller.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                break;
            }
            changed = boards.changed() => {
                changed?;
                let snapshot = boards.borrow_and_update().clone();
                print_board(&snapshot);
            }
        }
    }
    Ok(())
}

async fn set_markup(
    settings: Settings,
    base: String,
    dest: String,
    markup: Option<Decimal>,
    final_rate: Option<Decimal>,
    effective: &str,
    yes: bool,
) -> Result<()> {
    let credentials: Arc<dyn CredentialProvider> =
        Arc::new(ConfiguredToken::new(settings.api_token.clone()));
    let client = Client::new();
    let treasury = TreasuryApi::new(
        client.clone(),
        settings.treasury_url.clone(),
        credentials.clone(),
    );
    let fx = FxApi::new(client, settings.fx_url.clone(), credentials);

    let snapshot = fetch_board(&treasury, &fx, &base, std::slice::from_ref(&dest)).await;
    let quote = snapshot
        .quotes
        .get(&dest)
        .with_context(|| format!("no quote for {dest}"))?;
    let exchange_rate = quote
        .market_rate
        .available()
        .with_context(|| format!("no market rate available for {base}/{dest} right now"))?;

    let mut form = MarkupEdit::open(base, dest, exchange_rate)?;
    if let Some(percent) = markup {
        form.set_markup_percent(percent);
    }
    if let Some(rate) = final_rate {
        form.set_final_rate(rate);
    }
    let picked = NaiveDateTime::parse_from_str(effective, "%Y-%m-%d %H:%M")
        .context("effective date must look like \"2026-09-01 14:30\"")?;
    form.set_effective_date(picked);

    let mut session = EditSession::open(form);
    let pending = session.submit()?.clone();
    print_confirmation(&pending);

    if !yes && !operator_confirmed()? {
        session.cancel();
        println!("aborted, nothing committed");
        return Ok(());
    }

    let committed = session
        .confirm(&treasury)
        .await
        .context("the change was not committed; rerun to retry")?;
    println!(
        "committed {}/{} at {} effective {}",
        committed.base_currency,
        committed.destination_currency,
        committed.final_rate,
        committed.effective_at.format("%Y-%m-%dT%H:%M:%S"),
    );
    Ok(())
}

fn print_board(snapshot: &BoardSnapshot) {
    println!(
        "{} rates at {}",
        snapshot.base,
        snapshot.fetched_at.format("%H:%M:%S")
    );
    let mut codes: Vec<_> = snapshot.quotes.keys().collect();
    codes.sort();
    for code in codes {
        let quote = &snapshot.quotes[code];
        println!(
            "  {code}  market {:>12}  tuma {:>12}",
            quote.market_rate.to_string(),
            quote.tuma_rate.to_string(),
        );
    }
}

fn print_confirmation(pending: &ConfirmationSnapshot) {
    println!("pending change:");
    println!(
        "  pair          {} -> {}",
        pending.base_currency, pending.destination_currency
    );
    println!("  market rate   {}", pending.exchange_rate);
    if let Some(percent) = pending.markup_percent {
        println!("  markup        {percent}%");
    }
    println!("  final rate    {}", pending.final_rate);
    println!(
        "  effective at  {} (operational time)",
        pending.effective_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn operator_confirmed() -> Result<bool> {
    print!("commit this rate? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
