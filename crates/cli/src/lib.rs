pub mod commands;
pub mod fixtures;

use std::path::PathBuf;
use std::process::ExitCode;

use basketwise_core::config::EngineConfig;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "basketwise",
    about = "Basketwise recommendation and cart optimization CLI",
    long_about = "Mine order history for product affinities, generate recommendations, \
                  optimize carts, and score abandoned-cart recovery from JSON fixtures.",
    after_help = "Examples:\n  basketwise mine --orders orders.json --products products.json\n  basketwise recommend --purchases purchases.json --products products.json --strategy hybrid --customer c-100\n  basketwise optimize --cart cart.json --products products.json --orders orders.json\n  basketwise recover --cart cart.json --products products.json --strategy aggressive"
)]
pub struct Cli {
    #[arg(long, global = true, help = "TOML config file applied over built-in defaults")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Mine association rules, sequential patterns, and bundles from orders")]
    Mine {
        #[arg(long, help = "JSON file with an array of orders")]
        orders: PathBuf,
        #[arg(long, help = "JSON file with an array of catalog products")]
        products: PathBuf,
        #[arg(long, help = "Minimum rule support, overriding the configured value")]
        min_support: Option<f64>,
        #[arg(long, help = "Minimum rule confidence, overriding the configured value")]
        min_confidence: Option<f64>,
    },
    #[command(about = "Train from fixtures and generate recommendations")]
    Recommend {
        #[arg(long, help = "JSON file with an array of purchase records")]
        purchases: PathBuf,
        #[arg(long, help = "JSON file with an array of catalog products")]
        products: PathBuf,
        #[arg(long, help = "JSON file mapping session ids to event arrays")]
        events: Option<PathBuf>,
        #[arg(long, help = "Strategy: collaborative, content_based, hybrid, thompson_sampling, session_based, popularity")]
        strategy: String,
        #[arg(long, help = "Customer id for personalized strategies")]
        customer: Option<String>,
        #[arg(long, help = "Session id for the session-based strategy")]
        session: Option<String>,
        #[arg(long = "context", help = "Context product id, repeatable")]
        context: Vec<String>,
        #[arg(long, default_value_t = 10, help = "Maximum recommendations to return")]
        max: usize,
    },
    #[command(about = "Run the full optimization pipeline for one cart")]
    Optimize {
        #[arg(long, help = "JSON file with the cart to optimize")]
        cart: PathBuf,
        #[arg(long, help = "JSON file with an array of catalog products")]
        products: PathBuf,
        #[arg(long, help = "JSON file with orders to mine cross-sell affinities from")]
        orders: Option<PathBuf>,
    },
    #[command(about = "Score a recovery attempt for an abandoned cart")]
    Recover {
        #[arg(long, help = "JSON file with the abandoned cart")]
        cart: PathBuf,
        #[arg(long, help = "JSON file with an array of catalog products")]
        products: PathBuf,
        #[arg(long, help = "Recovery strategy: standard or aggressive")]
        strategy: String,
    },
    #[command(about = "Show the effective engine configuration")]
    Config,
}

fn init_logging(config: &EngineConfig) {
    use basketwise_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match EngineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            let result = commands::CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };
    init_logging(&config);

    let result = match cli.command {
        Command::Mine { orders, products, min_support, min_confidence } => {
            commands::mine::run(&config, &orders, &products, min_support, min_confidence)
        }
        Command::Recommend {
            purchases,
            products,
            events,
            strategy,
            customer,
            session,
            context,
            max,
        } => commands::recommend::run(
            config.clone(),
            commands::recommend::Args {
                purchases,
                products,
                events,
                strategy,
                customer,
                session,
                context,
                max,
            },
        ),
        Command::Optimize { cart, products, orders } => {
            commands::optimize::run(config.clone(), &cart, &products, orders.as_deref())
        }
        Command::Recover { cart, products, strategy } => {
            commands::recover::run(config.clone(), &cart, &products, &strategy)
        }
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(&config, cli.config.as_deref()),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
