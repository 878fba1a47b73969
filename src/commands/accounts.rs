//! `accounts` command: list the connected accounts the API reports.

use crate::config::Config;
use crate::error::Result;
use crate::publish::SchedulerClient;

pub async fn accounts() -> Result<()> {
    let config = Config::from_env()?;
    config.validate()?;

    let client = SchedulerClient::new(&config.api)?;
    let accounts = client.list_accounts(&[]).await?;

    if accounts.is_empty() {
        println!("No connected accounts found");
        return Ok(());
    }

    println!("Connected accounts ({}):", accounts.len());
    for account in &accounts {
        println!(
            "  {}  platform={}  username={}  status={}",
            account.id, account.platform, account.username, account.status
        );
    }

    Ok(())
}
