use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};

use reciplease::{FavoritesStore, Recipe, RecipeService, RecipleaseConfig, SearchSession};

#[derive(Parser)]
#[command(name = "reciplease", version, about = "Find recipes from the ingredients you have")]
struct Cli {
    /// Favorites document (overrides configuration)
    #[arg(long, global = true, env = "RECIPLEASE_FAVORITES")]
    favorites: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search recipes by ingredients
    Search {
        /// Ingredients, e.g. `chicken rice "green beans"`
        #[arg(required = true)]
        ingredients: Vec<String>,
        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Save the result at this position (1-based) to favorites
        #[arg(long)]
        save: Option<usize>,
    },
    /// Manage saved recipes
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// List saved recipes
    List,
    /// Show one saved recipe
    Show { uri: String },
    /// Remove a saved recipe
    Remove { uri: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Search {
            ingredients,
            pages,
            save,
        } => {
            let config = RecipleaseConfig::load()?;
            let service = Arc::new(RecipeService::from_config(&config)?);
            let session = SearchSession::new(service);

            session.start_search(&ingredients).await?;
            for _ in 1..pages {
                if !session.has_more() {
                    break;
                }
                session.load_more().await?;
            }

            let results = session.results();
            println!(
                "{} of {} recipes for {}",
                results.len(),
                session.total_results(),
                session.ingredients().join(", ")
            );
            for (i, recipe) in results.iter().enumerate() {
                println!("{:>3}. {} ({:.0} kcal)", i + 1, recipe.label, recipe.calories);
            }

            if let Some(position) = save {
                let recipe = position
                    .checked_sub(1)
                    .and_then(|i| results.get(i))
                    .ok_or_else(|| format!("No result at position {}", position))?;
                let store = open_store(cli.favorites.unwrap_or(config.favorites_path)).await?;
                store.save(recipe).await?;
                println!("Saved \"{}\"", recipe.label);
            }
        }
        Command::Favorites { action } => {
            let path = match cli.favorites {
                Some(path) => path,
                None => RecipleaseConfig::load()
                    .map(|c| c.favorites_path)
                    .unwrap_or_else(|_| PathBuf::from("favorites.json")),
            };
            let store = open_store(path).await?;

            match action {
                FavoritesAction::List => {
                    let recipes = store.fetch_all().await?;
                    if recipes.is_empty() {
                        println!("No saved recipes");
                    }
                    for recipe in &recipes {
                        println!("{}  {}", recipe.uri, recipe.label);
                    }
                }
                FavoritesAction::Show { uri } => match store.get(&uri).await {
                    Some(recipe) => print_recipe(&recipe),
                    None => return Err(format!("No saved recipe with id {}", uri).into()),
                },
                FavoritesAction::Remove { uri } => match store.get(&uri).await {
                    Some(recipe) => {
                        store.delete(&recipe).await?;
                        println!("Removed \"{}\"", recipe.label);
                    }
                    None => info!("No saved recipe with id {}", uri),
                },
            }
        }
    }

    Ok(())
}

/// The app cannot work without its favorites, so a failure here ends the process
async fn open_store(path: PathBuf) -> Result<FavoritesStore, Box<dyn std::error::Error>> {
    FavoritesStore::open_file(&path).await.map_err(|e| {
        error!("Unable to open favorites at {}: {}", path.display(), e);
        e.into()
    })
}

fn print_recipe(recipe: &Recipe) {
    println!("{}", recipe.label);
    println!("{:.0} kcal", recipe.calories);
    if !recipe.image.is_empty() {
        println!("Image: {}", recipe.image);
    }
    println!();
    for line in &recipe.ingredient_lines {
        println!("- {}", line);
    }
    if !recipe.url.is_empty() {
        println!();
        println!("Instructions: {}", recipe.url);
    }
}
