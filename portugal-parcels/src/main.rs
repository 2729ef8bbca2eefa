//! Point d'entrée CLI pour portugal-parcels

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::RunArgs;

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Télécharger et fusionner les parcelles cadastrales portugaises (INSPIRE + RGG)
#[derive(Parser)]
#[command(name = "portugal-parcels")]
#[command(author, version)]
#[command(about = "Télécharger les parcelles cadastrales portugaises (INSPIRE + RGG) en un seul GeoJSON")]
#[command(long_about = "Télécharge les parcelles INSPIRE (DGT, WFS) et RGG (BUPi, ArcGIS), reprojette en EPSG:4326 et fusionne le tout en un seul GeoJSON.\n\nLe fichier final n'apparaît qu'une fois les deux sources complètes.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    cli::cmd_run(&cli.run).await
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
