use anyhow::{Result, bail};
use console::style;

use super::flag_value;
use crate::core::config::AppConfig;
use crate::core::store::Store;
use crate::core::terminal::{print_info, print_success};

pub async fn run_token_command(args: &[String]) -> Result<()> {
    let sub_cmd = args.get(2).map(String::as_str).unwrap_or("");
    let config = AppConfig::load()?;

    match sub_cmd {
        "create" => {
            let Some(user_id) = flag_value(args, 3, "--user").filter(|u| !u.trim().is_empty())
            else {
                bail!("Usage: fhirbuilders token create --user <id> [--name <name>]");
            };
            let name = flag_value(args, 3, "--name").unwrap_or_else(|| "cli".to_string());

            let store = Store::open(&config.data_dir).await?;
            let (token, record) = store.create_api_token(user_id.trim(), &name).await?;

            println!();
            print_success(&format!(
                "API token '{}' created for user '{}'.",
                record.name, record.user_id
            ));
            println!(
                "\n  {} {}\n",
                style("Token:").bold(),
                style(&token).green().bold()
            );
            println!(
                "  {} Save this token now. It will not be shown again.",
                style("!").yellow()
            );
            println!(
                "  {} Use it with: Authorization: Bearer {}\n",
                style("→").cyan(),
                token
            );
        }
        "list" | "ls" => {
            let store = Store::open(&config.data_dir).await?;
            let tokens = store.list_api_tokens().await?;
            if tokens.is_empty() {
                print_info("No API tokens issued yet.");
                return Ok(());
            }
            println!();
            for t in tokens {
                println!(
                    "  {}  {}  {}  {}",
                    style(&t.id).dim(),
                    style(&t.user_id).cyan(),
                    style(&t.name).bold(),
                    style(&t.created_at).dim()
                );
            }
            println!();
        }
        "revoke" | "delete" | "rm" => {
            let Some(id) = args.get(3).filter(|s| !s.starts_with("--")) else {
                bail!("Usage: fhirbuilders token revoke <id>");
            };
            let store = Store::open(&config.data_dir).await?;
            if !store.delete_api_token(id).await? {
                bail!("No token with id '{}'", id);
            }
            print_success(&format!("Token {} revoked.", id));
        }
        _ => bail!("Usage: fhirbuilders token <create|list|revoke>"),
    }
    Ok(())
}
