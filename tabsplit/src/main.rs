//! tabsplit - split a restaurant bill from a receipt photo
//!
//! Scans receipts with an LLM, tracks who had what, and works out what each
//! diner owes including their share of tax and their own tip.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/tabsplit/bills.db (~/.local/share/tabsplit/bills.db)
//! - Config: $XDG_CONFIG_HOME/tabsplit/config.toml (~/.config/tabsplit/config.toml)
//! - Logs: $XDG_STATE_HOME/tabsplit/tabsplit.log

mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tabsplit_core::format::{share_text, totals_csv};
use tabsplit_core::llm::{AssignmentService, LlmServices};
use tabsplit_core::{BillStore, Config, Database, ReceiptImage};

#[derive(Parser)]
#[command(name = "tabsplit")]
#[command(about = "Split restaurant bills from a receipt photo")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a receipt image and create a bill
    New {
        /// Receipt photo (jpg, png, webp, gif, heic)
        image: PathBuf,

        /// Diner to add to the new bill (repeatable)
        #[arg(short, long = "diner")]
        diners: Vec<String>,
    },

    /// List unsettled bills
    List,

    /// Show a bill's items, diners, totals, and chat
    Show {
        /// Bill ID (unique prefix supported)
        bill: String,

        /// Print the stored bill as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assign items by describing who had what
    Chat {
        bill: String,

        /// e.g. "Ana and Ben shared the nachos"
        message: String,
    },

    /// Rename a bill
    Title { bill: String, title: String },

    /// Correct an item's name or price
    Item {
        bill: String,
        item_id: u32,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        price: Option<f64>,
    },

    /// Set who shares an item (no names leaves it unassigned)
    Assign {
        bill: String,
        item_id: u32,
        names: Vec<String>,
    },

    /// Manage a bill's diners
    Diner {
        #[command(subcommand)]
        command: DinerCommand,
    },

    /// Set the tip percentage for one diner, or everyone
    Tip {
        bill: String,

        /// Percentage, 0 to 30
        percent: u8,

        /// Only this diner (default: all diners)
        #[arg(short, long)]
        diner: Option<String>,
    },

    /// Toggle whether a diner has paid
    Settle { bill: String, diner: String },

    /// Toggle the gratuity-included flag
    Gratuity { bill: String },

    /// Assign every item to every diner
    SplitEvenly { bill: String },

    /// Unassign every item and reopen every diner
    ClearAssignments { bill: String },

    /// Delete a bill
    Delete {
        bill: String,

        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Delete every settled bill
    ClearSettled {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Export a bill's totals
    Export {
        bill: String,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Text)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Suggest diner names from past bills
    Frequent,
}

#[derive(Subcommand)]
enum DinerCommand {
    /// Add a diner
    Add { bill: String, name: String },

    /// Remove a diner and detach them from every item
    Remove { bill: String, name: String },

    /// Put a diner on every item
    AllItems { bill: String, name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Text,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        tabsplit_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    let mut store = BillStore::open(db).context("failed to load bills")?;

    match args.command {
        Command::New { image, diners } => cmd_new(&config, &mut store, image, &diners),
        Command::List => {
            render::print_dashboard(&store.dashboard());
            Ok(())
        }
        Command::Show { bill, json } => cmd_show(&store, &bill, json),
        Command::Chat { bill, message } => cmd_chat(&config, &mut store, &bill, &message),
        Command::Title { bill, title } => {
            let id = resolve(&store, &bill)?;
            let changed = store.update(&id, |b| Ok(b.rename(&title)))?;
            if !changed {
                println!("Title unchanged (blank titles are ignored).");
            }
            Ok(())
        }
        Command::Item {
            bill,
            item_id,
            name,
            price,
        } => cmd_item(&mut store, &bill, item_id, name, price),
        Command::Assign {
            bill,
            item_id,
            names,
        } => {
            let id = resolve(&store, &bill)?;
            store.update(&id, |b| b.assign_item(item_id, &names))?;
            Ok(())
        }
        Command::Diner { command } => cmd_diner(&mut store, command),
        Command::Tip {
            bill,
            percent,
            diner,
        } => {
            let id = resolve(&store, &bill)?;
            store.update(&id, |b| match &diner {
                Some(name) => b.set_tip(name, percent),
                None => b.apply_tip_to_all(percent),
            })?;
            Ok(())
        }
        Command::Settle { bill, diner } => {
            let id = resolve(&store, &bill)?;
            let settled = store.update(&id, |b| b.toggle_settled(&diner))?;
            println!(
                "{} is now {}.",
                diner,
                if settled { "settled" } else { "unsettled" }
            );
            Ok(())
        }
        Command::Gratuity { bill } => {
            let id = resolve(&store, &bill)?;
            let included = store.update(&id, |b| Ok(b.toggle_gratuity_included()))?;
            println!(
                "Gratuity included: {}",
                if included { "yes" } else { "no" }
            );
            Ok(())
        }
        Command::SplitEvenly { bill } => {
            let id = resolve(&store, &bill)?;
            store.update(&id, |b| {
                b.split_evenly();
                Ok(())
            })?;
            Ok(())
        }
        Command::ClearAssignments { bill } => {
            let id = resolve(&store, &bill)?;
            store.update(&id, |b| {
                b.clear_assignments();
                Ok(())
            })?;
            Ok(())
        }
        Command::Delete { bill, yes } => {
            let id = resolve(&store, &bill)?;
            if !yes {
                bail!("refusing to delete bill {} without --yes", id);
            }
            store.delete(&id)?;
            println!("Deleted bill {}", id);
            Ok(())
        }
        Command::ClearSettled { yes } => {
            let pending = store.dashboard().settled_count;
            if pending == 0 {
                println!("No settled bills to clear.");
                return Ok(());
            }
            if !yes {
                bail!("refusing to delete {} settled bill(s) without --yes", pending);
            }
            let removed = store.clear_settled()?;
            println!("Removed {} settled bill(s).", removed);
            Ok(())
        }
        Command::Export {
            bill,
            format,
            output,
        } => cmd_export(&store, &bill, format, output),
        Command::Frequent => {
            let names = store.frequent_diners();
            if names.is_empty() {
                println!("No diners yet.");
            }
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

/// Resolve a user-supplied bill reference to a full ID
fn resolve(store: &BillStore, query: &str) -> Result<String> {
    Ok(store.resolve(query)?.id.clone())
}

fn cmd_new(
    config: &Config,
    store: &mut BillStore,
    image: PathBuf,
    diners: &[String],
) -> Result<()> {
    let image = ReceiptImage::from_path(&image)?;
    let services = LlmServices::from_config(config.require_llm()?)
        .context("failed to create LLM client")?;

    for diner in diners {
        store.stage_diner(diner);
    }

    println!("Scanning receipt...");
    let bill = store
        .create_bill(&image, &services)
        .context("could not read the receipt, try a clearer photo")?;

    println!("Created bill {} ({})", &bill.id[..8], bill.title);
    println!();
    render::print_bill(bill);
    Ok(())
}

fn cmd_show(store: &BillStore, bill: &str, json: bool) -> Result<()> {
    let bill = store.resolve(bill)?;
    if json {
        println!("{}", serde_json::to_string_pretty(bill)?);
    } else {
        render::print_bill(bill);
    }
    Ok(())
}

fn cmd_chat(config: &Config, store: &mut BillStore, bill: &str, message: &str) -> Result<()> {
    let id = resolve(store, bill)?;
    let services = LlmServices::from_config(config.require_llm()?)
        .context("failed to create LLM client")?;

    // Rejections here append nothing, so there is no reply to show
    let pending = store.begin_reconciliation(&id, message)?;
    let proposed =
        services.update_assignments(&pending.instruction, &pending.receipt, &pending.assignments);
    let result = store.finish_reconciliation(pending, proposed);

    // Phase two always ends with the assistant's reply
    if let Some(reply) = store.bill(&id)?.chat_history.last() {
        println!("{}", reply.text);
    }

    match result {
        Ok(outcome) => {
            if !outcome.new_diners.is_empty() {
                println!("New diners: {}", outcome.new_diners.join(", "));
            }
            println!();
            render::print_totals(&store.totals(&id)?);
            Ok(())
        }
        Err(e) => {
            tracing::warn!(bill_id = %id, error = %e, "Chat update failed");
            Err(anyhow::Error::new(e).context("I had trouble understanding that, please rephrase"))
        }
    }
}

fn cmd_item(
    store: &mut BillStore,
    bill: &str,
    item_id: u32,
    name: Option<String>,
    price: Option<f64>,
) -> Result<()> {
    if name.is_none() && price.is_none() {
        bail!("nothing to change: pass --name and/or --price");
    }

    let id = resolve(store, bill)?;
    store.update(&id, |b| {
        let current = b
            .parsed_receipt
            .as_ref()
            .and_then(|r| r.item(item_id))
            .cloned()
            .ok_or(tabsplit_core::Error::ItemNotFound(item_id))?;
        b.edit_item(
            item_id,
            name.as_deref().unwrap_or(&current.name),
            price.unwrap_or(current.price),
        )
    })?;

    if let Some(receipt) = &store.bill(&id)?.parsed_receipt {
        render::print_receipt_totals(receipt);
    }
    Ok(())
}

fn cmd_diner(store: &mut BillStore, command: DinerCommand) -> Result<()> {
    match command {
        DinerCommand::Add { bill, name } => {
            let id = resolve(store, &bill)?;
            if !store.update(&id, |b| Ok(b.add_diner(&name)))? {
                println!("'{}' is blank or already on this bill.", name.trim());
            }
        }
        DinerCommand::Remove { bill, name } => {
            let id = resolve(store, &bill)?;
            if !store.update(&id, |b| Ok(b.remove_diner(&name)))? {
                println!("'{}' is not on this bill.", name);
            }
        }
        DinerCommand::AllItems { bill, name } => {
            let id = resolve(store, &bill)?;
            store.update(&id, |b| b.add_diner_to_all_items(&name))?;
        }
    }
    Ok(())
}

fn cmd_export(
    store: &BillStore,
    bill: &str,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let id = resolve(store, bill)?;
    let totals = store.totals(&id)?;
    let rendered = match format {
        ExportFormat::Csv => totals_csv(&totals),
        ExportFormat::Text => format!("{}\n", share_text(&totals)),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
