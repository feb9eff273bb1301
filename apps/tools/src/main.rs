use anyhow::Result;
use clap::{Parser, Subcommand};
use server_api::{seed_catalog, ApiContext};
use shared::domain::{Category, CategoryId, Item, ItemId};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/wishlist.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load categories and items from a seed JSON file (empty catalog only)
    Seed { path: String },
    /// Create a category at the end of the display order
    CreateCategory {
        id: String,
        name: String,
        icon: String,
        #[arg(long)]
        purchase_deadline: Option<String>,
    },
    /// Add an item at the end of a category
    AddItem {
        category_id: String,
        id: String,
        name: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        price: Option<f64>,
    },
    /// Print every stored status
    ListStatuses,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed { path } => {
            let raw = std::fs::read_to_string(&path)?;
            let categories: Vec<Category> = serde_json::from_str(&raw)?;
            let api = ApiContext { storage };
            let seeded = seed_catalog(&api, &categories).await?;
            if seeded {
                println!("seeded {} categories", categories.len());
            } else {
                println!("catalog not empty, nothing seeded");
            }
        }
        Command::CreateCategory {
            id,
            name,
            icon,
            purchase_deadline,
        } => {
            storage
                .create_category(
                    &CategoryId(id.clone()),
                    &name,
                    &icon,
                    purchase_deadline.as_deref(),
                )
                .await?;
            println!("created category {id}");
        }
        Command::AddItem {
            category_id,
            id,
            name,
            url,
            price,
        } => {
            let item = Item {
                id: ItemId(id.clone()),
                name,
                url,
                price,
                image_url: None,
                is_preferred: false,
                notes: Vec::new(),
            };
            storage.insert_item(&CategoryId(category_id), &item).await?;
            println!("added item {id}");
        }
        Command::ListStatuses => {
            let mut statuses: Vec<_> = storage.list_statuses().await?.into_iter().collect();
            statuses.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
            for (item_id, status) in statuses {
                println!("{item_id}\t{status}");
            }
        }
    }

    Ok(())
}
