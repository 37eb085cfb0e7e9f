//! `roster config`: effective configuration, secrets redacted.

use anyhow::Result;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use roster_core::{Config, Secret};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ConfigArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let rows = rows(config);
        if self.json {
            let map: serde_json::Map<String, serde_json::Value> = rows
                .into_iter()
                .map(|row| (row.key, serde_json::Value::String(row.value)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
            return Ok(());
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "setting")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
}

fn redact(secret: &Secret) -> String {
    if secret.is_empty() {
        "(empty)".to_owned()
    } else {
        "***".to_owned()
    }
}

fn rows(config: &Config) -> Vec<ConfigRow> {
    let s = &config.source;
    let d = &config.directory;
    let y = &config.sync;
    let pairs = [
        ("source.base_url", s.base_url.clone()),
        ("source.token", redact(&s.token)),
        ("source.timeout_secs", s.timeout.as_secs().to_string()),
        ("source.page_size", s.page_size.to_string()),
        ("source.site_name", s.site_name.clone().unwrap_or_else(|| "(all)".into())),
        ("directory.url", d.url.clone()),
        ("directory.bind_dn", d.bind_dn.clone()),
        ("directory.bind_password", redact(&d.bind_password)),
        ("directory.base_dn", d.base_dn.clone()),
        ("directory.managed_dn", d.managed_dn().to_string()),
        ("sync.interval_secs", y.interval.as_secs().to_string()),
        ("sync.exclude_surnames", y.exclude_surnames.join(",")),
        ("sync.retry_max_attempts", y.retry_max_attempts.to_string()),
        ("sync.retry_base_delay_ms", y.retry_base_delay.as_millis().to_string()),
        ("sync.pacing_delay_ms", y.pacing_delay.as_millis().to_string()),
        (
            "sync.backup_dir",
            y.backup_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(disabled)".into()),
        ),
    ];
    pairs
        .into_iter()
        .map(|(key, value)| ConfigRow {
            key: key.to_owned(),
            value,
        })
        .collect()
}
