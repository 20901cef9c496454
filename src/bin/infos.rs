//! mailspend-infos - prints the remote project's categories, payment modes
//! and members, i.e. the numeric ids used in the COSPEND_* configuration.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailspend::{Config, CospendClient};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let client = CospendClient::new(&config)?;
    let infos = client
        .project_infos()
        .await
        .context("failed to fetch project infos")?;

    println!("Categories  (Used for  COSPEND_CATEGORYID_... )");
    println!("----------");
    for (id, category) in &infos.categories {
        let icon = category.icon.as_deref().unwrap_or("");
        println!("  - {}: {} {}", id, category.name, icon);
    }
    println!();

    println!("Payment Modes  (Used for  COSPEND_PAYMENTMODEID_... )");
    println!("-------------");
    for (id, mode) in &infos.paymentmodes {
        let icon = mode.icon.as_deref().unwrap_or("");
        println!("  - {}: {} {}", id, mode.name, icon);
    }
    println!();

    println!("Members  (Used for  COSPEND_PAYED_FOR_...  (multiple separated by a ',') and  COSPEND_PAYER_... )");
    println!("-------");
    for member in &infos.members {
        println!("  - {}: {}", member.id, member.name);
    }

    Ok(())
}
