use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use voxlink::app::run_session_command;
use voxlink::audio::capture::{list_input_devices, list_output_devices};
use voxlink::cli::{Cli, Commands};
use voxlink::config::Config;
use voxlink::defaults;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => {
            let config = load_config(&cli)?;
            run_session_command(
                config,
                cli.device,
                cli.output_device,
                cli.model,
                cli.voice,
                cli.system,
                cli.quiet,
                cli.duration,
            )
            .await?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Check) => {
            check_environment();
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxlink",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the tracing subscriber: warnings by default, info with -v, full
/// diagnostics with -vv. RUST_LOG wins when set.
fn init_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let default_filter = match verbosity {
        0 => "voxlink=warn",
        1 => "voxlink=info",
        _ => "voxlink=debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load config from the CLI-given path or the default location, with
/// environment overrides applied.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                return Err(voxlink::VoxlinkError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            Config::load(path)?
        }
        None => Config::load_or_default(&Config::default_path()),
    };
    Ok(config.with_env_overrides())
}

/// Print input and output devices, recommended ones first-class.
fn list_audio_devices() -> Result<()> {
    println!("{}", "Input devices:".bold());
    for device in list_input_devices()? {
        println!("  {}", device);
    }

    println!();
    println!("{}", "Output devices:".bold());
    for device in list_output_devices()? {
        println!("  {}", device);
    }

    Ok(())
}

/// Verify the environment is ready for a session.
fn check_environment() {
    let mut ok = true;

    match std::env::var(defaults::API_KEY_ENV) {
        Ok(key) if !key.is_empty() => {
            println!("{} {} is set", "✓".green(), defaults::API_KEY_ENV);
        }
        _ => {
            println!(
                "{} {} is not set — export your API key first",
                "✗".red(),
                defaults::API_KEY_ENV
            );
            ok = false;
        }
    }

    match list_input_devices() {
        Ok(devices) if !devices.is_empty() => {
            println!("{} {} input device(s) found", "✓".green(), devices.len());
        }
        Ok(_) => {
            println!("{} no input devices found", "✗".red());
            ok = false;
        }
        Err(e) => {
            println!("{} input device enumeration failed: {}", "✗".red(), e);
            ok = false;
        }
    }

    match list_output_devices() {
        Ok(devices) if !devices.is_empty() => {
            println!("{} {} output device(s) found", "✓".green(), devices.len());
        }
        Ok(_) => {
            println!("{} no output devices found", "✗".red());
            ok = false;
        }
        Err(e) => {
            println!("{} output device enumeration failed: {}", "✗".red(), e);
            ok = false;
        }
    }

    if ok {
        println!("{}", "Ready for a live session.".bold());
    } else {
        std::process::exit(1);
    }
}
