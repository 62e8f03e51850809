mod detect;
mod serve;
mod tokens;

use anyhow::Result;
use console::style;

use crate::core::terminal::{self, GuideSection, print_error};
use crate::platform::{NativePlatform, Platform};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Server")
        .command("serve", "Start the API server and generation worker")
        .command("serve --api-host <h>", "Bind address (default 127.0.0.1)")
        .command("serve --api-port <p>", "Listen port (default 3001)")
        .print();

    GuideSection::new("Generation")
        .command("detect <prompt...>", "Show the FHIR resources a prompt maps to")
        .command("templates", "List the built-in starter templates")
        .print();

    GuideSection::new("Access")
        .command("token create --user <id>", "Issue an API token for a user")
        .command("token list", "List issued tokens")
        .command("token revoke <id>", "Revoke a token")
        .print();

    GuideSection::new("Environment")
        .status("FHIRBUILDERS_DATA_DIR", "data directory (default ~/.fhirbuilders)")
        .status("FHIRBUILDERS_CONFIG", "path to config.toml")
        .status("ANTHROPIC_API_KEY", "model provider key")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style(NativePlatform::binary_name()).green()
    );
}

/// Value following `flag` in `args[start..]`, if any.
pub(crate) fn flag_value(args: &[String], start: usize, flag: &str) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> Result<(String, u16)> {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().map_err(|_| {
                        anyhow::anyhow!("Invalid --api-port value '{}'", args[i + 1])
                    })?;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    Ok((api_host, api_port))
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "serve" => serve::run_serve_command(&args).await,
        "detect" => detect::run_detect_command(&args),
        "templates" => {
            detect::run_templates_command();
            Ok(())
        }
        "token" | "tokens" => tokens::run_token_command(&args).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("{} {}", NativePlatform::binary_name(), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command '{}'", other));
            print_help();
            std::process::exit(2);
        }
    }
}
