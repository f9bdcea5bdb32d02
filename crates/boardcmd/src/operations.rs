use anyhow::Result;
use boardcmd_commands::Operation;
use clap::Args;
use colored::Colorize;
use serde_json::json;

#[derive(Args, Debug)]
pub struct OperationsArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: OperationsArgs) -> Result<()> {
    if args.json {
        let list: Vec<_> = Operation::ALL
            .iter()
            .map(|op| {
                json!({
                    "name": op.name(),
                    "category": op.category().as_str(),
                    "description": op.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    for op in Operation::ALL {
        println!(
            "{:<20} {:<8} {}",
            op.name().bold(),
            op.category().as_str().cyan(),
            op.description()
        );
    }
    Ok(())
}
