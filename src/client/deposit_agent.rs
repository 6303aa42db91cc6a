use anyhow::{Context, Result};
use qris_gateway::client::DepositClient;
use qris_gateway::models::DepositStatus;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    let base_url = std::env::var("GATEWAY_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());
    let api_id = std::env::var("API_ID").context("API_ID required")?;
    let api_key = std::env::var("API_KEY").context("API_KEY required")?;
    let amount: i64 = std::env::var("DEPOSIT_AMOUNT")
        .unwrap_or_else(|_| "10000".to_string())
        .parse()
        .context("Invalid DEPOSIT_AMOUNT")?;
    let poll_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .context("Invalid POLL_INTERVAL_SECS")?;
    let max_polls: u32 = std::env::var("MAX_POLLS")
        .unwrap_or_else(|_| "120".to_string())
        .parse()
        .context("Invalid MAX_POLLS")?;

    let client = DepositClient::new(&base_url, &api_id, &api_key);

    println!("QRIS Deposit Agent");
    println!("==================");
    println!("Gateway: {}", base_url);

    let profile = client.profile().await?;
    println!("Balance before: {}", profile.balance);
    println!();

    println!("Step 1: Creating deposit of {}...", amount);
    let deposit = client.create_deposit(amount).await?;
    println!("   [OK] ref_id: {}", deposit.ref_id);
    println!("   Pay exactly: {}", deposit.final_amount);
    println!("   QR string: {}", deposit.qr_string);
    println!("   QR image: {}", deposit.qr_image);
    println!("   Expires at: {}", deposit.expires_at);
    println!();

    println!("Step 2: Waiting for payment (every {}s)...", poll_secs);
    let mut interval = tokio::time::interval(Duration::from_secs(poll_secs));
    let mut last = deposit;
    for _ in 0..max_polls {
        interval.tick().await;

        match client.check_deposit(&last.ref_id).await {
            Ok(current) => last = current,
            Err(e) => {
                println!("   [WARN] {}", e);
                continue;
            }
        }

        if last.status.is_terminal() {
            break;
        }
        println!("   ... still {}", last.status);
    }

    match last.status {
        DepositStatus::Paid => {
            println!("   [OK] Paid at {:?}", last.paid_at);
            let profile = client.profile().await?;
            println!("Balance after: {}", profile.balance);
        }
        DepositStatus::Expired => println!("   [FAILED] Deposit expired"),
        DepositStatus::Unpaid => println!("   [FAILED] Gave up waiting; deposit still unpaid"),
    }

    println!();
    println!("Recent deposits:");
    for d in client.list_deposits(None, Some(5)).await? {
        println!("   {}  {:>10}  {}", d.ref_id, d.final_amount, d.status);
    }

    Ok(())
}
