use anyhow::Result;
use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use boardcmd_board::Board;
use serde_json::{Value, json};

fn boardcmd() -> Command {
    let mut cmd = Command::cargo_bin("boardcmd").expect("boardcmd binary is built");
    cmd.env_remove("RUST_LOG")
        .env_remove("BOARDCMD_BOARD")
        .env_remove("BOARDCMD_AUTOSAVE");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn run_saves_when_asked() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.child("board.kicad_pcb");
    Board::new().save_as(file.path())?;

    let output = boardcmd()
        .arg("run")
        .arg(file.path())
        .arg("set_board_size")
        .args(["--params", r#"{"width": 40, "height": 25}"#, "--save"])
        .output()?;
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout_json(&output)["size"]["width"], json!(40.0));

    let bbox = Board::load(file.path())?
        .edges_bounding_box()
        .expect("outline was saved");
    assert_eq!((bbox.width(), bbox.height()), (40.0, 25.0));
    Ok(())
}

#[test]
fn run_without_save_leaves_file_alone() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.child("board.kicad_pcb");
    Board::new().save_as(file.path())?;
    let before = std::fs::read_to_string(file.path())?;

    let output = boardcmd()
        .arg("run")
        .arg(file.path())
        .arg("add_text")
        .args(["--params", r#"{"text": "hi", "position": {"x": 1, "y": 1}}"#])
        .output()?;
    assert!(output.status.success(), "{output:?}");
    assert_eq!(std::fs::read_to_string(file.path())?, before);
    Ok(())
}

#[test]
fn run_reports_failures() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.child("board.kicad_pcb");
    Board::new().save_as(file.path())?;

    let unknown = boardcmd()
        .arg("run")
        .arg(file.path())
        .arg("autoroute")
        .output()?;
    assert!(!unknown.status.success());
    let stderr = String::from_utf8_lossy(&unknown.stderr);
    assert!(stderr.contains("Unknown operation: autoroute"), "{stderr}");

    let empty = boardcmd()
        .arg("run")
        .arg(file.path())
        .arg("get_board_extents")
        .output()?;
    assert!(!empty.status.success());
    assert_eq!(stdout_json(&empty)["message"], json!("Board has no items"));
    Ok(())
}

#[test]
fn diagnose_json_report() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.child("diag.kicad_pcb");
    Board::new().save_as(file.path())?;

    let output = boardcmd()
        .arg("diagnose")
        .arg(file.path())
        .arg("--json")
        .output()?;
    assert!(output.status.success(), "{output:?}");
    let report = stdout_json(&output);
    let statuses: Vec<&str> = report["probes"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p["status"].as_str())
        .collect();
    assert_eq!(statuses, vec!["pass", "pass", "pass"]);
    Ok(())
}

#[test]
fn diagnose_fails_on_broken_board() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.child("broken.kicad_pcb");
    file.write_str("(kicad_sch (version 1))")?;

    let output = boardcmd().arg("diagnose").arg(file.path()).output()?;
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL"), "{stdout}");
    Ok(())
}

#[test]
fn serve_speaks_mcp() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.child("served.kicad_pcb");
    Board::new().save_as(file.path())?;

    let requests = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
               "params": {"name": "add_board_outline",
                          "arguments": {"shape": "rectangle", "width": 20, "height": 10}}}),
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
               "params": {"name": "get_board_info", "arguments": {}}}),
    ];
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();

    let output = boardcmd()
        .arg("serve")
        .arg("--autosave")
        .env("BOARDCMD_BOARD", file.path())
        .write_stdin(input)
        .output()?;
    assert!(output.status.success(), "{output:?}");

    let responses: Vec<Value> = String::from_utf8(output.stdout)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], json!("boardcmd"));
    assert_eq!(responses[1]["result"]["tools"].as_array().map(Vec::len), Some(13));
    assert_eq!(responses[2]["result"]["isError"], json!(false));
    let info = &responses[3]["result"]["structuredContent"]["board"];
    assert_eq!(info["size"]["width"], json!(20.0));

    // --autosave wrote the outline back to disk.
    let saved = Board::load(file.path())?;
    assert_eq!(saved.edge_graphics().len(), 1);
    Ok(())
}
