use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    new_item_id, BudgetSummary, LocalCatalogFile, LocalStatusFile, StatusFilter, WishlistApi,
    WishlistClient, DEFAULT_BUDGET,
};
use shared::domain::{Category, CategoryId, Item, ItemId, ItemStatus};

#[derive(Parser, Debug)]
#[command(name = "wishlist", about = "Shopping wishlist tracker")]
struct Cli {
    /// Base URL of the wishlist server, e.g. http://127.0.0.1:8080
    #[arg(long, conflicts_with = "data_dir")]
    server_url: Option<String>,
    /// Directory with local catalog.json / state.json files (offline mode)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Spending ceiling for the summary
    #[arg(long, default_value_t = DEFAULT_BUDGET)]
    budget: f64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the catalog with statuses
    List {
        #[arg(long, default_value = "")]
        search: String,
        /// all, to-buy, shortlisted or purchased
        #[arg(long, default_value = "all")]
        filter: StatusFilter,
    },
    /// Print the budget summary
    Summary,
    /// Add an item to a category
    Add {
        #[arg(long)]
        category: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        preferred: bool,
        /// May be passed multiple times
        #[arg(long)]
        note: Vec<String>,
    },
    /// Mark an item shortlisted (again to clear)
    Shortlist { item_id: String },
    /// Mark an item purchased (again to clear)
    Purchase { item_id: String },
    /// Clear an item's status
    Clear { item_id: String },
    /// Clear every status
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let client = build_client(&cli)?;
    client.set_budget(cli.budget).await;
    client.load().await?;

    match cli.command {
        Command::List { search, filter } => {
            let categories = client.filtered(&search, filter).await;
            if categories.is_empty() {
                println!("nothing matches");
            }
            for category in &categories {
                print_category(&client, category).await;
            }
        }
        Command::Summary => {
            print_summary(&client.summary().await);
        }
        Command::Add {
            category,
            name,
            url,
            price,
            image_url,
            preferred,
            note,
        } => {
            let item = Item {
                id: new_item_id(),
                name,
                url,
                price,
                image_url,
                is_preferred: preferred,
                notes: note,
            };
            let id = item.id.clone();
            client.add_item(&CategoryId(category), item).await?;
            client.drain_pending().await;
            println!("added item {id}");
        }
        Command::Shortlist { item_id } => {
            apply_status(&client, item_id, ItemStatus::Shortlisted).await?;
        }
        Command::Purchase { item_id } => {
            apply_status(&client, item_id, ItemStatus::Purchased).await?;
        }
        Command::Clear { item_id } => {
            apply_status(&client, item_id, ItemStatus::Unset).await?;
        }
        Command::Reset => {
            client.reset_all().await;
            client.drain_pending().await;
            println!("cleared all statuses");
        }
    }

    Ok(())
}

fn build_client(cli: &Cli) -> Result<WishlistClient> {
    if let Some(server_url) = &cli.server_url {
        let api = Arc::new(WishlistApi::new(server_url.clone()));
        Ok(WishlistClient::new(api.clone(), api))
    } else if let Some(data_dir) = &cli.data_dir {
        let catalog = Arc::new(LocalCatalogFile::new(data_dir.join("catalog.json")));
        let statuses = Arc::new(LocalStatusFile::new(data_dir.join("state.json")));
        Ok(WishlistClient::new(catalog, statuses))
    } else {
        bail!("pass --server-url for a remote list or --data-dir for a local one");
    }
}

async fn apply_status(client: &WishlistClient, item_id: String, status: ItemStatus) -> Result<()> {
    let item_id = ItemId(item_id);
    let known = client
        .categories()
        .await
        .iter()
        .any(|category| category.items.iter().any(|item| item.id == item_id));
    if !known {
        bail!("unknown item '{item_id}'");
    }

    let resulting = client.set_status(&item_id, status).await;
    client.drain_pending().await;
    println!("{item_id}: {resulting}");
    Ok(())
}

async fn print_category(client: &WishlistClient, category: &Category) {
    print!("{} {}", category.icon, category.name);
    match &category.purchase_deadline {
        Some(deadline) => println!("  (by {deadline})"),
        None => println!(),
    }
    for item in &category.items {
        let status = client.status_of(&item.id).await;
        let price = item
            .price
            .map(|p| format!("${p:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let star = if item.is_preferred { " ★" } else { "" };
        println!("  {} {:<10} {}{}  ({})", status_symbol(status), price, item.name, star, item.id);
        for note in &item.notes {
            println!("        · {note}");
        }
    }
}

fn status_symbol(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Unset => "[ ]",
        ItemStatus::Shortlisted => "[~]",
        ItemStatus::Purchased => "[x]",
    }
}

const BAR_WIDTH: usize = 40;

fn print_summary(summary: &BudgetSummary) {
    println!(
        "items: {}  estimated: ${:.2}",
        summary.total_items, summary.total_estimated
    );
    println!(
        "shortlisted: {} (${:.2})  purchased: {} (${:.2})",
        summary.shortlisted_count,
        summary.shortlisted_total,
        summary.purchased_count,
        summary.purchased_total
    );
    println!("remaining: ${:.2}", summary.remaining);
    println!("{}", render_bar(summary));
}

/// Stacked two-segment bar; collapses to a single full-width segment when
/// the budget is blown.
fn render_bar(summary: &BudgetSummary) -> String {
    if summary.over_budget {
        return format!("[{}] over budget", "!".repeat(BAR_WIDTH));
    }
    let purchased = (summary.purchased_bar_pct / 100.0 * BAR_WIDTH as f64).round() as usize;
    let shortlisted = (summary.shortlisted_bar_pct / 100.0 * BAR_WIDTH as f64).round() as usize;
    let shortlisted = shortlisted.min(BAR_WIDTH - purchased);
    let rest = BAR_WIDTH - purchased - shortlisted;
    format!(
        "[{}{}{}]",
        "#".repeat(purchased),
        "+".repeat(shortlisted),
        ".".repeat(rest)
    )
}
