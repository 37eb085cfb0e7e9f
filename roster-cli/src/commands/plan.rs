//! `roster plan`: show the pending reconciliation without applying it.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use roster_core::{Attributes, Config};
use roster_daemon::{init_tracing, LiveCycle};
use roster_sync::{plan_cycle, CycleReport, ReconciliationPlan};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self, config: Config) -> Result<()> {
        init_tracing();
        let cycle = LiveCycle::new(config);
        let (plan, report) = plan_cycle(&cycle.context()).context("failed to compute plan")?;

        if self.json {
            let out = PlanJson {
                generated_at: Utc::now().to_rfc3339(),
                report: &report,
                plan: &plan,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        print_table(&plan, &report);
        Ok(())
    }
}

#[derive(Serialize)]
struct PlanJson<'a> {
    generated_at: String,
    report: &'a CycleReport,
    plan: &'a ReconciliationPlan,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "uid")]
    uid: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "mail")]
    mail: String,
    #[tabled(rename = "dn")]
    dn: String,
}

fn first(attributes: &Attributes, name: &str) -> String {
    attributes
        .get(name)
        .and_then(|values| values.first())
        .cloned()
        .unwrap_or_default()
}

fn rows(plan: &ReconciliationPlan) -> Vec<PlanRow> {
    let creates = plan.creates.iter().map(|c| PlanRow {
        action: "create".green().to_string(),
        uid: c.uid.to_string(),
        name: first(&c.attributes, "cn"),
        mail: first(&c.attributes, "mail"),
        dn: c.dn.to_string(),
    });
    let updates = plan.updates.iter().map(|u| PlanRow {
        action: "update".to_string(),
        uid: u.uid.to_string(),
        name: first(&u.attributes, "cn"),
        mail: first(&u.attributes, "mail"),
        dn: u.dn.to_string(),
    });
    let deletes = plan.deletes.iter().map(|d| PlanRow {
        action: "delete".red().to_string(),
        uid: d.uid.to_string(),
        name: first(&d.attributes, "cn"),
        mail: first(&d.attributes, "mail"),
        dn: d.dn.to_string(),
    });
    creates.chain(updates).chain(deletes).collect()
}

fn print_table(plan: &ReconciliationPlan, report: &CycleReport) {
    println!(
        "{} candidates from {} policies; {} eligible after filters ({} inactive, {} excluded, {} failed)",
        report.candidates,
        report.extract.policies,
        report.resolve.eligible(),
        report.resolve.skipped_inactive,
        report.resolve.skipped_excluded,
        report.resolve.failed
    );
    if plan.is_empty() {
        println!("{} nothing to do", "✓".green());
        return;
    }

    let mut table = Table::new(rows(plan));
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} create, {} update, {} delete",
        plan.creates.len(),
        plan.updates.len(),
        plan.deletes.len()
    );
}
