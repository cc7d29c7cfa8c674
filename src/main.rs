mod clock;
mod config;
mod controller;
mod host;
mod idle;
mod ipc;
mod motion;
mod palette;
mod platform;
mod renderer;

use clap::Parser;
use log::{error, info};
use palette::{ColorScheme, Palette};

/// HyprBounce - A bouncing text/clock screensaver daemon for Hyprland
#[derive(Parser, Debug)]
#[command(name = "hyprbounce", version, about)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "~/.config/hypr/hyprbounce.toml")]
    config: String,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Show the screensaver immediately (bypass idle detection) and exit when dismissed
    #[arg(short, long)]
    preview: bool,

    /// Override the configured color scheme
    #[arg(short, long, value_parser = parse_scheme)]
    scheme: Option<ColorScheme>,

    /// List available color schemes
    #[arg(long)]
    list: bool,
}

fn parse_scheme(name: &str) -> Result<ColorScheme, palette::PaletteError> {
    Palette::resolve(name).map(|p| p.scheme())
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("HyprBounce v{} starting", env!("CARGO_PKG_VERSION"));

    // List color schemes and exit
    if cli.list {
        list_schemes();
        return;
    }

    // Load config
    let config_path = shellexpand(&cli.config);
    let cfg = match config::Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config from {}: {}", config_path, e);
            info!("Using default configuration");
            config::Config::default()
        }
    };

    if let Some(scheme) = cli.scheme {
        info!("Using color scheme '{}'", scheme.name());
    }

    if cli.preview {
        info!("Preview mode: showing screensaver now");
    }

    if let Err(e) = host::run(cfg, cli.scheme, config_path, cli.preview) {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("HyprBounce shutting down");
}

fn list_schemes() {
    println!("Available color schemes:");
    println!();
    for scheme in ColorScheme::ALL {
        let palette = Palette::new(scheme);
        let swatches: Vec<String> = palette
            .colors()
            .iter()
            .map(|c| format!("\x1b[38;2;{};{};{}m\u{2588}\u{2588}\x1b[0m", c.0, c.1, c.2))
            .collect();
        println!("  {:<12} {}", scheme.name(), swatches.join(" "));
    }
    println!();
    println!("Set the scheme in ~/.config/hypr/hyprbounce.toml:");
    println!("  [bounce]");
    println!("  color_scheme = \"neon\"");
}

/// Expand ~ to home directory in paths
fn shellexpand(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return format!("{}/{}", home, stripped);
    }
    path.to_string()
}
