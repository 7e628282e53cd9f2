//! Config validation CLI tool
//!
//! Validates a pomodorod configuration file and reports any errors.

use pomo_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a pomodorod configuration file.");
            eprintln!();
            eprintln!("The daemon reads: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match pomo_config::load_config(&config_path) {
        Ok(config) => {
            let timer = &config.timer;
            println!("✓ Configuration is valid");
            println!();
            println!("Timer:");
            println!("  Work:          {} min", timer.work_duration);
            println!("  Short break:   {} min", timer.short_break_duration);
            println!("  Long break:    {} min", timer.long_break_duration);
            println!(
                "  Long break every {} work sessions",
                timer.sessions_until_long_break
            );
            println!("  Auto-start breaks: {}", timer.auto_start_breaks);
            println!("  Auto-start work:   {}", timer.auto_start_work);
            println!(
                "  Desktop notifications: {}",
                timer.show_desktop_notifications
            );
            if let Some(socket) = &config.daemon.socket_path {
                println!("Socket: {}", socket.display());
            }
            if let Some(data_dir) = &config.daemon.data_dir {
                println!("Data dir: {}", data_dir.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                pomo_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                pomo_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                pomo_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                pomo_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        pomo_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
