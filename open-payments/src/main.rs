use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use dotenv::dotenv;
use open_payments::types::{InteractFinish, Limits};
use open_payments::{Config, Error, OpenPaymentsClient, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Send a payment between two Open Payments wallets.
///
/// The sender's wallet must be the one configured through
/// `OPEN_PAYMENTS_WALLET_ADDRESS`; the outgoing payment grant is approved
/// interactively in a browser.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Receiving wallet address URL
    #[arg(long)]
    receiver: String,

    /// Amount to receive, in the receiver's minor units
    #[arg(long)]
    amount: u64,

    /// Sending wallet address URL (defaults to the configured client wallet)
    #[arg(long)]
    sender: Option<String>,

    /// Where the authorization server redirects after approval
    #[arg(long, default_value = "http://localhost:3344")]
    finish_uri: String,

    /// Cap the outgoing payment grant at this debit amount (sender minor units)
    #[arg(long)]
    debit_limit: Option<u64>,

    /// Incoming payment lifetime in minutes
    #[arg(long, default_value_t = 10)]
    expires_in_minutes: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let client = OpenPaymentsClient::from_config(&config)?;

    let sender_uri = cli.sender.as_deref().unwrap_or(&config.wallet_address);
    let sender = client.fetch_wallet_address(sender_uri).await?;
    let receiver = client.fetch_wallet_address(&cli.receiver).await?;

    // 1. Incoming payment on the receiver
    let incoming_grant = client.request_incoming_payment_grant(&receiver).await?;
    let incoming_token = incoming_grant.access_token()?;
    let incoming = client
        .create_incoming_payment(
            &receiver,
            incoming_token,
            cli.amount,
            Some(Utc::now() + ChronoDuration::minutes(cli.expires_in_minutes)),
        )
        .await?;
    println!("Incoming payment: {}", incoming.id);

    // 2. Quote on the sender
    let quote_grant = client.request_quote_grant(&sender).await?;
    let quote = client
        .create_quote(&sender, &incoming.id, quote_grant.access_token()?)
        .await?;
    println!("Quote: debit {} -> receive {}", quote.debit_amount, quote.receive_amount);

    // 3. Interactive outgoing payment grant
    let debit_cap = match cli.debit_limit {
        Some(value) => sender.amount(value),
        None => quote.debit_amount.clone(),
    };
    let limits = Limits::debit(debit_cap);
    let nonce = uuid::Uuid::new_v4().to_string();
    let pending = client
        .request_outgoing_payment_grant(
            &sender,
            Some(limits),
            Some(InteractFinish::redirect(&cli.finish_uri, nonce)),
        )
        .await?;
    let (Some(redirect), Some(continuation)) = (pending.redirect(), pending.continuation()) else {
        return Err(Error::Protocol(
            "outgoing payment grant did not ask for interaction".to_string(),
        ));
    };

    println!("Approve the payment at:\n  {}", redirect);
    println!("Then paste the interact_ref from the finish redirect:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interact_ref = lines
        .next_line()
        .await
        .map_err(|e| Error::Config(format!("Failed to read interact_ref: {}", e)))?
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| Error::Config("No interact_ref given".to_string()))?;

    // 4. Continue once the wait interval has elapsed
    let wait = continuation.seconds_until_ready(Utc::now());
    if wait > 0 {
        log::info!("[OPEN-PAYMENTS] Waiting {}s before continuing the grant", wait);
        tokio::time::sleep(Duration::from_secs(wait)).await;
    }
    let granted = client
        .negotiator()
        .continue_grant(continuation, Some(&interact_ref))
        .await?;

    // 5. Outgoing payment
    let payment = client
        .create_outgoing_payment(&sender, &quote, granted.access_token()?)
        .await?;
    println!("Outgoing payment: {} (debit {})", payment.id, payment.debit_amount);

    Ok(())
}
