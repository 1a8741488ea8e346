use std::io::Read;

use anyhow::{bail, Context};
use colored::Colorize;
use dtl_gate::ActorContext;
use dtl_refs::{AdminOverride, CreateReceipt, PushOutcome};
use dtl_resolve::CurrentDeployment;
use dtl_sdk::{DeploymentLedger, GitCliBackend, LedgerConfig};
use dtl_types::Subproject;
use serde::Serialize;

use crate::cli::*;

type Ledger = DeploymentLedger<GitCliBackend>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = LedgerConfig::discover(&cli.repo, cli.config.as_deref())
        .context("loading ledger configuration")?;
    let ledger = DeploymentLedger::open(&cli.repo, config)?;
    let format = cli.format;

    match cli.command {
        Command::Classify(args) => cmd_classify(&ledger, format, args),
        Command::Release(args) => cmd_release(&ledger, format, args),
        Command::Mark(args) => cmd_mark(&ledger, format, args),
        Command::Deploy(args) => cmd_deploy(&ledger, format, args),
        Command::Rollback(args) => cmd_rollback(&ledger, format, args),
        Command::Current(args) => cmd_current(&ledger, format, args),
        Command::Status(args) => cmd_status(&ledger, format, args),
        Command::ScopeKey(args) => cmd_scope_key(&ledger, format, args),
        Command::Violations => cmd_violations(&ledger, format),
        Command::Delete(args) => cmd_delete(&ledger, format, args),
        Command::Hook(HookArgs {
            hook: HookCommand::PrePush { remote, .. },
        }) => cmd_pre_push(&ledger, format, remote),
    }
}

fn subproject(raw: &Option<String>) -> anyhow::Result<Option<Subproject>> {
    Ok(raw.as_deref().map(|s| Subproject::new(s)).transpose()?)
}

fn emit_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_push(push: &PushOutcome) {
    match push {
        PushOutcome::LocalOnly => println!("  Push: {}", "local only".dimmed()),
        PushOutcome::Confirmed { remote } => println!("  Push: {} {}", "confirmed on".green(), remote.bold()),
        PushOutcome::Drifted(drift) => println!(
            "  Push: {} {} holds {} (intended {})",
            "DRIFT".yellow().bold(),
            drift.remote.bold(),
            drift.observed.as_ref().map(|c| c.short()).unwrap_or("nothing"),
            drift.intended.short()
        ),
    }
}

fn print_receipt(receipt: &CreateReceipt) -> colored::ColoredString {
    match receipt {
        CreateReceipt::Created => "Created".green().bold(),
        CreateReceipt::AlreadyPresent => "Already present".cyan().bold(),
    }
}

fn cmd_classify(ledger: &Ledger, format: OutputFormat, args: ClassifyArgs) -> anyhow::Result<()> {
    let tag = ledger.classify(&args.name)?;
    if format == OutputFormat::Json {
        return emit_json(&serde_json::json!({
            "name": tag,
            "kind": tag.kind(),
            "subproject": tag.subproject(),
            "semver": tag.semver(),
            "environment": tag.environment(),
            "state": tag.state(),
            "mutable": tag.is_mutable(),
        }));
    }
    println!("{} {}", tag.kind().to_string().cyan().bold(), tag.to_string().yellow());
    if let Some(sub) = tag.subproject() {
        println!("  Subproject: {sub}");
    }
    if let Some(version) = tag.semver() {
        println!("  Version: {version}");
    }
    if let Some(env) = tag.environment() {
        println!("  Environment: {env}");
    }
    if let Some(state) = tag.state() {
        println!("  State: {state}");
    }
    println!("  Mutable: {}", tag.is_mutable());
    Ok(())
}

fn cmd_release(ledger: &Ledger, format: OutputFormat, args: ReleaseArgs) -> anyhow::Result<()> {
    let sub = subproject(&args.subproject)?;
    let commit = ledger
        .resolve_revision(&args.commit)
        .with_context(|| format!("resolving revision '{}'", args.commit))?;
    let report = ledger.release(sub.as_ref(), &args.version, &commit, args.message.as_deref())?;
    if format == OutputFormat::Json {
        return emit_json(&report);
    }
    println!("{} {} at {}", print_receipt(&report.receipt), report.tag.to_string().yellow(), report.commit.short());
    if !report.colocated_versions.is_empty() {
        let others: Vec<String> = report.colocated_versions.iter().map(|t| t.to_string()).collect();
        println!(
            "  {} commit also carries {}",
            "WARNING".yellow().bold(),
            others.join(", ")
        );
    }
    print_push(&report.push);
    Ok(())
}

fn cmd_mark(ledger: &Ledger, format: OutputFormat, args: MarkArgs) -> anyhow::Result<()> {
    let sub = subproject(&args.subproject)?;
    let report = ledger.mark(sub.as_ref(), &args.version, args.state.into(), args.reason.as_deref())?;
    if format == OutputFormat::Json {
        return emit_json(&report);
    }
    println!(
        "{} {} at {} ({})",
        print_receipt(&report.receipt),
        report.tag.to_string().yellow(),
        report.commit.short(),
        report.version_tag
    );
    print_push(&report.push);
    Ok(())
}

fn cmd_deploy(ledger: &Ledger, format: OutputFormat, args: DeployArgs) -> anyhow::Result<()> {
    let sub = subproject(&args.subproject)?;
    let report = ledger.deploy(sub.as_ref(), &args.environment, &args.version)?;
    if format == OutputFormat::Json {
        return emit_json(&report);
    }
    println!(
        "{} {} -> {} ({})",
        "✓ Deployed".green().bold(),
        report.environment_tag.to_string().yellow(),
        report.version_tag.to_string().cyan(),
        report.commit.short()
    );
    match &report.previous {
        Some(previous) => println!("  Previous: {}", previous.short()),
        None => println!("  Previous: {}", "none (first deployment)".dimmed()),
    }
    println!("  Scope key: {}", report.scope_key.as_str().bold());
    print_push(&report.push);
    Ok(())
}

fn cmd_rollback(ledger: &Ledger, format: OutputFormat, args: RollbackArgs) -> anyhow::Result<()> {
    let sub = subproject(&args.subproject)?;
    let report = match ledger.rollback(sub.as_ref(), &args.environment, args.dry_run) {
        Ok(report) => report,
        Err(dtl_sdk::SdkError::Resolve(dtl_resolve::ResolveError::NoRollbackTarget { trace })) => {
            if format == OutputFormat::Json {
                emit_json(&trace)?;
            } else {
                eprint!("{trace}");
            }
            bail!("no rollback target for {}", trace.environment_tag);
        }
        Err(err) => return Err(err.into()),
    };
    if format == OutputFormat::Json {
        return emit_json(&report);
    }

    let target = &report.target;
    print!("{}", target.trace);
    match &report.applied {
        Some(applied) => {
            println!(
                "{} {} -> {} ({})",
                "✓ Rolled back".green().bold(),
                applied.environment_tag.to_string().yellow(),
                target.version_tag.to_string().cyan(),
                target.commit.short()
            );
            println!("  Scope key: {}", applied.scope_key.as_str().bold());
            print_push(&applied.push);
        }
        None => println!(
            "{} would roll back to {} ({})",
            "Dry run:".bold(),
            target.version_tag.to_string().cyan(),
            target.commit.short()
        ),
    }
    Ok(())
}

fn print_deployment(label: &str, deployment: &CurrentDeployment) {
    match deployment {
        CurrentDeployment::NotDeployed => println!("{label}: {}", "not deployed".dimmed()),
        CurrentDeployment::Version { tag, commit, .. } => {
            println!("{label}: {} ({})", tag.to_string().cyan(), commit.short())
        }
        CurrentDeployment::Untracked { commit } => println!(
            "{label}: {} {}",
            commit.short(),
            "(no version tag)".yellow()
        ),
    }
}

fn cmd_current(ledger: &Ledger, format: OutputFormat, args: EnvironmentArgs) -> anyhow::Result<()> {
    let sub = subproject(&args.subproject)?;
    let current = ledger.current(sub.as_ref(), &args.environment)?;
    if format == OutputFormat::Json {
        return emit_json(&current);
    }
    print_deployment(&args.environment, &current);
    Ok(())
}

fn cmd_status(ledger: &Ledger, format: OutputFormat, args: StatusArgs) -> anyhow::Result<()> {
    let sub = subproject(&args.subproject)?;
    let rows = ledger.status(sub.as_ref())?;
    if format == OutputFormat::Json {
        return emit_json(&rows);
    }
    let scope = sub.as_ref().map(Subproject::as_str).unwrap_or("(root)");
    println!("Deployments for {}", scope.bold());
    for row in &rows {
        let label = format!("  {:<12}", row.environment);
        match &row.deployment {
            Some(deployment) => print_deployment(&label, deployment),
            None => println!(
                "{label}: {} {}",
                "AMBIGUOUS".red().bold(),
                row.ambiguous_tags.join(", ")
            ),
        }
    }
    Ok(())
}

fn cmd_scope_key(ledger: &Ledger, format: OutputFormat, args: EnvironmentArgs) -> anyhow::Result<()> {
    let sub = subproject(&args.subproject)?;
    let key = ledger.scope_key(sub.as_ref(), &args.environment)?;
    if format == OutputFormat::Json {
        return emit_json(&key);
    }
    println!("{key}");
    Ok(())
}

fn cmd_violations(ledger: &Ledger, format: OutputFormat) -> anyhow::Result<()> {
    let violations = ledger.violations()?;
    if format == OutputFormat::Json {
        return emit_json(&violations);
    }
    if violations.is_empty() {
        println!("{} No commit carries more than one version tag", "✓".green().bold());
        return Ok(());
    }
    for v in &violations {
        println!("{} {}: {}", "✗".red().bold(), v.commit.short(), v.tags.join(", "));
    }
    Ok(())
}

fn cmd_delete(ledger: &Ledger, format: OutputFormat, args: DeleteArgs) -> anyhow::Result<()> {
    let admin = AdminOverride::new(args.override_actor, args.override_reason);
    let report = ledger.delete(&args.name, &admin)?;
    if format == OutputFormat::Json {
        return emit_json(&report);
    }
    println!(
        "{} {} (was {}) by {}: {}",
        "Deleted".red().bold(),
        report.tag.to_string().yellow(),
        report.commit.short(),
        report.actor.bold(),
        report.reason
    );
    Ok(())
}

fn cmd_pre_push(ledger: &Ledger, format: OutputFormat, remote: Option<String>) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading pre-push input")?;

    let actor = ActorContext::from_lookup(&ledger.config().gate, |key| std::env::var(key).ok());
    let verdicts = ledger.evaluate_push(&input, &actor)?;
    if format == OutputFormat::Json {
        emit_json(&verdicts)?;
    }

    let mut blocked = 0usize;
    for verdict in &verdicts {
        if let Some(message) = verdict.block_message() {
            blocked += 1;
            eprintln!("{message}");
        } else if let Some(audit) = verdict.audit() {
            eprintln!(
                "{} override of '{}' by {} recorded ({})",
                "AUDIT".yellow().bold(),
                audit.tag,
                audit.actor,
                audit.id
            );
        }
    }
    if blocked > 0 {
        bail!(
            "push to {} blocked: {blocked} protected tag mutation(s)",
            remote.as_deref().unwrap_or("remote")
        );
    }
    Ok(())
}
