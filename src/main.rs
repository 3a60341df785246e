use agrispeak::app::{run_chunk_command, run_speak_command};
use agrispeak::cli::{Cli, Commands, ConfigAction};
use agrispeak::config::Config;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Speak(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_speak_command(config, args, cli.quiet, cli.verbose).await?;
        }
        Commands::Chunk { text, min_chars } => {
            let config = load_config(cli.config.as_deref())?;
            run_chunk_command(&config, text, min_chars)?;
        }
        Commands::Devices => {
            list_audio_devices()?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "agrispeak",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the log subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows -q / -v / -vv.
fn init_logging(quiet: bool, verbosity: u8) {
    let level = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agrispeak={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/agrispeak/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path()?)?
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// List available audio output devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = agrispeak::audio::playback::list_output_devices()?;

    if devices.is_empty() {
        eprintln!("No audio output devices found");
        std::process::exit(1);
    }

    println!("Available audio output devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    anyhow::bail!("built without speaker output support")
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    let config_path = match custom_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            if let Err(e) = config.validate() {
                eprintln!("{}", format!("Warning: {}", e).yellow());
            }
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let marker = if config_path.exists() {
                "exists".green().to_string()
            } else {
                "not created".dimmed().to_string()
            };
            println!("{} ({})", config_path.display(), marker);
        }
    }
    Ok(())
}
