//! Command handlers and console output

use crate::cli::{template_vars_from_env, Cli, Commands};
use anyhow::Result;
use colored::Colorize;
use tidemark::migration::{
    CallbackOutcome, MigrateReport, MigrationStatus, Preview, ScriptPreview, SeedReport,
};
use tidemark::{Migrator, PgConnector};

const RULE_WIDTH: usize = 60;

/// Run the selected command to completion
pub fn run(cli: &Cli) -> Result<()> {
    let config = cli.connection_config()?;
    let migrator = cli.migrator(&config.user, template_vars_from_env())?;
    log::debug!("Target {}:{}/{}", config.host, config.port, config.database);

    match cli.command {
        Commands::Migrate { dry_run } => {
            println!("🚀 Starting migration process...");
            print_target(&config.database, &config.user);
            println!("   Migrations directory: {}", migrator.migrations_dir().display());
            if dry_run {
                println!("   Mode: {}", "DRY RUN (no changes will be made)".yellow());
            }
            let connector = PgConnector::new(config);
            handle_migrate(&migrator, &connector, dry_run)
        }
        Commands::Seed { dry_run } => {
            println!("🌱 Running seed data scripts...");
            println!("   Database: {}", config.database);
            if dry_run {
                println!("   Mode: {}", "DRY RUN (no changes will be made)".yellow());
            }
            let connector = PgConnector::new(config);
            handle_seed(&migrator, &connector, dry_run)
        }
        Commands::Info { .. } => {
            println!("📊 Migration Status");
            println!("   Database: {}", config.database);
            let connector = PgConnector::new(config);
            let status = migrator.info(&connector)?;
            print_status(&status);
            Ok(())
        }
    }
}

fn print_target(database: &str, user: &str) {
    println!("   Database: {database}");
    println!("   User: {user}");
}

fn handle_migrate(migrator: &Migrator, connector: &PgConnector, dry_run: bool) -> Result<()> {
    let report = migrator.migrate(connector, dry_run)?;
    print_migrate_report(&report);
    Ok(())
}

fn handle_seed(migrator: &Migrator, connector: &PgConnector, dry_run: bool) -> Result<()> {
    let report = migrator.seed(connector, dry_run)?;
    print_seed_report(&report);
    Ok(())
}

fn print_migrate_report(report: &MigrateReport) {
    if report.database_created {
        println!("\n{} Database created", "✅".green());
    }

    for drift in &report.drifted {
        println!(
            "\n{}  WARNING: Migration {} has been modified after being applied!",
            "⚠️".yellow(),
            drift.script
        );
        println!("   Applied:  {}", drift.applied_checksum);
        println!("   Current:  {}", drift.current_checksum);
        println!("   Migration files should not be modified after being applied!");
    }
    for script in &report.previously_failed {
        println!(
            "\n{}  Migration {} is recorded as failed and will not be retried",
            "⚠️".yellow(),
            script
        );
    }

    if report.is_up_to_date() {
        println!("\n✨ No pending migrations. Database is up to date!");
    } else {
        println!("\n📋 Found {} pending migration(s)", report.applied_count());
    }

    if report.dry_run {
        for preview in &report.previews {
            println!("\n📝 Would apply migration: {}", preview.script);
            print_preview(&preview.preview);
        }
        print_callback_previews(&report.callback_previews);
        println!("\n{} Dry run complete; nothing was changed", "✅".green());
        return;
    }

    for applied in &report.applied {
        println!("\n📝 Applied migration: {}", applied.description);
        println!("   File: {}", applied.script);
        println!(
            "   {} Migration applied successfully ({}ms)",
            "✅".green(),
            applied.duration_millis
        );
    }

    if !report.callbacks.is_empty() {
        println!("\n🔄 Running afterMigrate scripts...");
        for outcome in &report.callbacks {
            print_callback(outcome);
        }
    }

    println!(
        "\n{} Successfully applied {} migration(s)",
        "✅".green(),
        report.applied.len()
    );
}

fn print_callback(outcome: &CallbackOutcome) {
    match outcome {
        CallbackOutcome::Succeeded {
            script,
            duration_millis,
        } => println!(
            "   📄 {script}: {} ({duration_millis}ms)",
            "executed successfully".green()
        ),
        CallbackOutcome::Failed { script, error } => {
            println!("   📄 {script}: {} {error}", "⚠️  failed:".yellow())
        }
    }
}

fn print_callback_previews(previews: &[ScriptPreview]) {
    if previews.is_empty() {
        return;
    }
    println!("\n🔄 afterMigrate scripts that would run:");
    for preview in previews {
        println!("   📄 {}", preview.script);
        print_preview(&preview.preview);
    }
}

fn print_seed_report(report: &SeedReport) {
    if report.dry_run {
        if report.previews.is_empty() {
            println!("   {}  No seed files found", "⚠️".yellow());
        }
        for preview in &report.previews {
            println!("\n📄 Would execute: {}", preview.script);
            print_preview(&preview.preview);
        }
        return;
    }

    if report.executed.is_empty() {
        println!("   {}  No seed files found", "⚠️".yellow());
        return;
    }
    for seed in &report.executed {
        println!(
            "\n📄 {}: {} ({}ms)",
            seed.script,
            "executed successfully".green(),
            seed.duration_millis
        );
    }
    println!("\n{} All seeds executed successfully", "✅".green());
}

fn print_preview(preview: &Preview) {
    println!("   [DRY RUN] Would execute:");
    println!("   {}", "-".repeat(RULE_WIDTH));
    println!("   {}", preview.text.replace('\n', "\n   "));
    if preview.truncated {
        println!("   ...");
    }
    println!("   {}", "-".repeat(RULE_WIDTH));
}

fn print_status(status: &MigrationStatus) {
    println!("\n{} Applied migrations: {}", "✅".green(), status.applied_count());
    for entry in &status.applied {
        let marker = if entry.success {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "   {} {}: {} ({}, {}ms)",
            marker,
            entry.script,
            entry.description,
            entry.applied_at.format("%Y-%m-%d %H:%M:%S"),
            entry.duration_millis
        );
    }

    println!("\n⏳ Pending migrations: {}", status.pending_count());
    for migration in &status.pending {
        println!("   ⏳ {}: {}", migration.name, migration.description);
    }

    if !status.drifted.is_empty() {
        println!("\n{}  Modified after being applied:", "⚠️".yellow());
        for drift in &status.drifted {
            println!("   {} (applied {}, now {})", drift.script, drift.applied_checksum, drift.current_checksum);
        }
    }
    if !status.orphaned.is_empty() {
        println!("\n❓ Applied but missing on disk:");
        for script in &status.orphaned {
            println!("   {script}");
        }
    }

    if status.is_up_to_date() {
        println!("   Database is up to date!");
    }
    if let Some(latest) = status.latest_applied() {
        println!("\nLatest applied: {}", latest.script);
    }
    if let Some(next) = status.next_pending() {
        println!("Next pending: {}", next.name);
    }
    let failed = status.failed().count();
    if failed > 0 {
        println!("{} {} failed attempt(s) recorded in the ledger", "❌".red(), failed);
    }
    println!(
        "\n📈 Summary: {} applied, {} pending",
        status.applied_count(),
        status.pending_count()
    );
}
