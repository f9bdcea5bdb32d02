use anyhow::{Context, Result};
use boardcmd_board::Board;
use boardcmd_commands::{BoardCommands, BoardRef, Params};
use clap::Args;
use log::info;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the .kicad_pcb file
    #[arg(value_name = "BOARD")]
    board: PathBuf,

    /// Operation name (see `boardcmd operations`)
    #[arg(value_name = "OPERATION")]
    operation: String,

    /// Operation parameters as a JSON object
    #[arg(short, long, value_name = "JSON", default_value = "{}")]
    params: String,

    /// Write the board back to BOARD after a successful operation
    #[arg(long)]
    save: bool,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let params = parse_params(&args.params)?;
    let board = Board::load(&args.board)
        .with_context(|| format!("Failed to load board {}", args.board.display()))?;
    let document = BoardRef::new(board);
    let commands = BoardCommands::new(Some(document.clone()));

    let result = commands.invoke(&args.operation, params)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let succeeded = result.get("success") == Some(&Value::Bool(true));
    if !succeeded {
        let message = result
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("operation failed");
        anyhow::bail!("{} failed: {message}", args.operation);
    }

    if args.save {
        let mut board = document.lock();
        if board.is_modified() {
            board.save()?;
            info!("Saved {}", args.board.display());
        }
    }
    Ok(())
}

fn parse_params(text: &str) -> Result<Params> {
    let value: Value = serde_json::from_str(text).context("--params is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => anyhow::bail!("--params must be a JSON object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_must_be_an_object() {
        assert!(parse_params("{}").unwrap().is_empty());
        assert!(parse_params("null").unwrap().is_empty());
        assert_eq!(parse_params(r#"{"width": 10}"#).unwrap()["width"], 10);
        assert!(parse_params("[1, 2]").is_err());
        assert!(parse_params("{width: 10}").is_err());
    }
}
