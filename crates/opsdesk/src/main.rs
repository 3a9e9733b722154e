//! `opsdesk` - CLI for the operations dashboard core
//!
//! This binary logs in with the configured credential table and lists or
//! edits the dashboard's collections with the rights of that user.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::Parser;

use opsdesk::cli::{
    record_from_fields, AddCommand, Cli, Command, ConfigCommand, DeleteCommand, ListCommand,
    OutputFormat, UpdateCommand,
};
use opsdesk::policy::hash_password;
use opsdesk::{init_logging, CollectionSpec, Config, Dashboard, Record, Session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Commands that never touch the store
    match &cli.command {
        Command::HashPassword { password } => {
            println!("{}", hash_password(password)?);
            return Ok(());
        }
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        _ => {}
    }

    let dashboard = Dashboard::open(&config).context("opening the backend store")?;
    let mut session = Session::new();
    if cli.command.needs_login() {
        login(&dashboard, &mut session, &cli).await?;
    }

    match cli.command {
        Command::Login => handle_login(&session),
        Command::List(cmd) => handle_list(&dashboard, &session, &cmd).await,
        Command::Add(cmd) => handle_add(&dashboard, &session, cmd).await,
        Command::Update(cmd) => handle_update(&dashboard, &session, cmd).await,
        Command::Delete(cmd) => handle_delete(&dashboard, &session, &cmd).await,
        Command::Toggle { index } => {
            let assignment = dashboard.toggle_assignment_done(&session, index).await?;
            println!("#{index} {} is now {}", assignment.task, assignment.status());
            Ok(())
        }
        Command::Assignments { json } => handle_assignments(&dashboard, &session, json).await,
        Command::Whoami => handle_login(&session),
        Command::Capabilities { collection } => {
            handle_capabilities(&dashboard, &session, collection.as_deref())
        }
        Command::LastAccess => {
            match dashboard.last_access().await {
                Some(last) => println!("Last access: {last}"),
                None => println!("Last access: N/A"),
            }
            Ok(())
        }
        Command::HashPassword { .. } | Command::Config(_) => Ok(()),
    }
}

async fn login(dashboard: &Dashboard, session: &mut Session, cli: &Cli) -> anyhow::Result<()> {
    let (Some(user), Some(password)) = (&cli.user, &cli.password) else {
        bail!("this command needs --user and --password (or OPSDESK_USER / OPSDESK_PASSWORD)");
    };
    dashboard.authenticate(session, user, password).await?;
    Ok(())
}

fn handle_login(session: &Session) -> anyhow::Result<()> {
    let identity = session.require_identity()?;
    println!("Logged in as {identity}");
    Ok(())
}

async fn handle_list(
    dashboard: &Dashboard,
    session: &Session,
    cmd: &ListCommand,
) -> anyhow::Result<()> {
    let records = dashboard.get_records(session, &cmd.collection).await?;
    let spec = dashboard
        .collections()
        .iter()
        .find(|c| c.name == cmd.collection)
        .context("collection disappeared from configuration")?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Plain => {
            for (index, record) in records.iter().enumerate() {
                let fields: Vec<String> =
                    record.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!("#{index} {}: {}", record.label(index), fields.join(" "));
            }
        }
        OutputFormat::Table => print_table(spec, &records),
    }
    if records.is_empty() && cmd.format != OutputFormat::Json {
        println!("No records in {}.", spec.title);
    }
    Ok(())
}

fn print_table(spec: &CollectionSpec, records: &[Record]) {
    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            spec.fields
                .iter()
                .map(|field| record.get(field).map(ToString::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = spec
        .fields
        .iter()
        .enumerate()
        .map(|(col, field)| {
            cells
                .iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(field.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = spec
        .fields
        .iter()
        .zip(&widths)
        .map(|(field, width)| format!("{field:<width$}"))
        .collect();
    println!("{:>4}  {}", "#", header.join("  "));

    for (index, row) in cells.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        println!("{index:>4}  {}", line.join("  "));
    }
}

async fn handle_add(
    dashboard: &Dashboard,
    session: &Session,
    cmd: AddCommand,
) -> anyhow::Result<()> {
    let record = record_from_fields(cmd.fields);
    let index = dashboard
        .create_record(session, &cmd.collection, record)
        .await?;
    println!("Added #{index} to {}.", cmd.collection);
    Ok(())
}

async fn handle_update(
    dashboard: &Dashboard,
    session: &Session,
    cmd: UpdateCommand,
) -> anyhow::Result<()> {
    let record = record_from_fields(cmd.fields);
    let previous = dashboard
        .update_record(session, &cmd.collection, cmd.index, record)
        .await?;
    println!(
        "Updated {} in {}.",
        previous.label(cmd.index),
        cmd.collection
    );
    Ok(())
}

async fn handle_delete(
    dashboard: &Dashboard,
    session: &Session,
    cmd: &DeleteCommand,
) -> anyhow::Result<()> {
    let removed = dashboard
        .delete_record(session, &cmd.collection, cmd.index)
        .await?;
    println!("Deleted {} from {}.", removed.label(cmd.index), cmd.collection);
    Ok(())
}

async fn handle_assignments(
    dashboard: &Dashboard,
    session: &Session,
    json: bool,
) -> anyhow::Result<()> {
    let views = dashboard.assignment_views(session).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    if views.is_empty() {
        println!("No assignments.");
    }
    for view in &views {
        let a = &view.assignment;
        let mut actions = Vec::new();
        if view.can_toggle {
            actions.push("toggle");
        }
        if view.can_delete {
            actions.push("delete");
        }
        println!(
            "#{} [{}] P{} {} -> {}{}",
            view.index,
            a.status(),
            a.priority,
            a.task,
            a.assigned_to,
            if actions.is_empty() {
                String::new()
            } else {
                format!("  ({})", actions.join(", "))
            }
        );
    }
    Ok(())
}

fn handle_capabilities(
    dashboard: &Dashboard,
    session: &Session,
    collection: Option<&str>,
) -> anyhow::Result<()> {
    let identity = session.require_identity()?;
    println!("Capabilities for {identity}:");
    for spec in dashboard.collections() {
        if collection.is_some_and(|name| name != spec.name) {
            continue;
        }
        println!(
            "  {:<14} {}",
            spec.name,
            dashboard.capabilities(session, &spec.name)
        );
    }
    if let Some(name) = collection {
        if !dashboard.collections().iter().any(|c| c.name == name) {
            bail!("unknown collection '{name}'");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Backend:            {:?}", config.store.backend);
                println!("  Data directory:     {}", config.store.data_dir().display());
                println!(
                    "  Database path:      {}",
                    config.store.database_path().display()
                );
                if let Some(url) = &config.store.remote.base_url {
                    println!("  Remote URL:         {url}");
                }
                println!();
                println!("[Auth]");
                println!("  Editors:            {}", config.auth.editors.len());
                println!("  Publishers:         {}", config.auth.publishers.len());
                println!(
                    "  Viewer password:    {}",
                    if config.auth.viewer_password_hash.is_some() {
                        "set"
                    } else {
                        "not set"
                    }
                );
                println!();
                println!("[Assignments]");
                println!("  Collection:         {}", config.assignments.collection);
                println!(
                    "  Deletion policy:    {}",
                    config.assignments.deletion_policy
                );
                println!();
                println!("[Collections]");
                for spec in &config.collections {
                    println!(
                        "  {:<14} {:<16} {}",
                        spec.name,
                        spec.kind.to_string(),
                        spec.fields.join(", ")
                    );
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.clone().unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
