//! Accounts command implementation.

use crate::worker::{connect, SimulatedServer};
use calworker_protocol::{Account, AccountEntry};
use calworker_service::{CalendarService, CALDAV_PROVIDER, LOCAL_PROVIDER};
use std::sync::Arc;
use std::time::Duration;

/// Runs the accounts command.
pub async fn run(
    create: Option<&str>,
    caldav: bool,
    json_wire: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(SimulatedServer::new(Duration::ZERO, Default::default()));
    let service = CalendarService::builder(server).build()?;
    let client = connect(&service, json_wire);

    if let Some(preset) = create {
        let account = if caldav {
            Account::new(CALDAV_PROVIDER, preset).with_user(format!("{preset}@example.com"))
        } else {
            Account::new(LOCAL_PROVIDER, preset)
        };
        let account = client.create_account(&account).await?;
        println!("Created account {}", account.id);
    }

    let stream = client.observe_accounts().await?;
    let mut updates = stream.listen_channel();
    let entries: Vec<AccountEntry> = match updates.recv().await {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };
    stream.cancel().await;

    if entries.is_empty() {
        println!("No accounts");
    }
    for entry in &entries {
        let calendars = service.accounts().calendars(&entry.account.id)?;
        println!(
            "{}  {:<8} preset={:<10} sync={} calendars={}",
            entry.account.id,
            entry.account.provider_type,
            entry.account.preset,
            if entry.provider.can_sync { "yes" } else { "no" },
            calendars.len()
        );
    }

    client.close().await?;
    Ok(())
}
