mod support;

use predicates::str::contains;
use serde_json::Value;

use boardflow::lock::{lock_path_for, FileLock};
use boardflow::task::{Scope, TaskStatus};
use support::{board_cmd, boardflow_cmd, sprint, TestBoard};

#[test]
fn boardflow_help_works() {
    boardflow_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("kanban"));
}

#[test]
fn subcommand_help_works() {
    for cmd in ["init", "board", "columns", "move"] {
        boardflow_cmd().arg(cmd).arg("--help").assert().success();
    }
}

#[test]
fn init_creates_config_and_sample_board() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::empty()?;

    board_cmd(&board)
        .arg("init")
        .assert()
        .success()
        .stdout(contains("initialized board"));
    assert!(board.path().join(".boardflow.toml").is_file());
    assert!(board.path().join(".boardflow").join("tasks.json").is_file());

    board_cmd(&board)
        .arg("init")
        .assert()
        .success()
        .stdout(contains("nothing to do"));
    Ok(())
}

#[test]
fn root_flag_points_at_another_directory() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;
    let elsewhere = tempfile::tempdir()?;

    boardflow_cmd()
        .current_dir(elsewhere.path())
        .args(["--root"])
        .arg(board.path())
        .args(["columns", "--scope", "backlog"])
        .assert()
        .success()
        .stdout(contains("BF-1"));
    Ok(())
}

#[test]
fn columns_json_lists_sprint_columns() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;

    let output = board_cmd(&board)
        .args(["--json", "columns", "--scope", "sprint:1"])
        .output()?;
    assert!(output.status.success());

    let payload: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(payload["command"], "columns");
    assert_eq!(payload["status"], "success");
    let columns = payload["data"]["columns"].as_array().expect("columns");
    let statuses: Vec<&str> = columns
        .iter()
        .map(|column| column["status"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(statuses, ["to-do", "in-progress", "review", "done"]);
    assert_eq!(columns[0]["tasks"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn columns_requires_init() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::empty()?;

    board_cmd(&board)
        .args(["--json", "columns"])
        .assert()
        .code(2)
        .stdout(contains("\"status\": \"error\""))
        .stdout(contains("boardflow init"));
    Ok(())
}

#[test]
fn move_persists_confirmed_status() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;

    board_cmd(&board)
        .args(["--json", "move", "t-5", "in-progress"])
        .assert()
        .success()
        .stdout(contains("\"command\": \"move\""))
        .stdout(contains("\"changed\": true"));

    assert_eq!(board.status_of(&sprint(), "t-5"), Some(TaskStatus::InProgress));
    Ok(())
}

#[test]
fn move_to_current_status_changes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;

    board_cmd(&board)
        .args(["move", "t-8", "done"])
        .assert()
        .success()
        .stdout(contains("already done"));
    assert_eq!(board.status_of(&sprint(), "t-8"), Some(TaskStatus::Done));
    Ok(())
}

#[test]
fn move_emits_jsonl_events_to_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;

    board_cmd(&board)
        .args(["--json", "move", "t-1", "done", "--scope", "backlog", "--events", "-"])
        .assert()
        .success()
        .stdout(contains("boardflow.notification.v1"))
        .stdout(contains("transition_succeeded"));

    assert_eq!(board.status_of(&Scope::Backlog, "t-1"), Some(TaskStatus::Done));
    Ok(())
}

#[test]
fn move_rolls_back_when_backend_fails() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;
    board.write_config("[backend]\nfail_every = 1\n")?;

    board_cmd(&board)
        .args(["move", "t-5", "review"])
        .assert()
        .code(3)
        .stderr(contains("t-5 stays to-do"));

    assert_eq!(board.status_of(&sprint(), "t-5"), Some(TaskStatus::ToDo));
    Ok(())
}

#[test]
fn move_unknown_task_is_user_error() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;

    board_cmd(&board)
        .args(["move", "t-404", "done"])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn move_rejects_unknown_status() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;

    board_cmd(&board)
        .args(["move", "t-5", "someday"])
        .assert()
        .code(2);
    assert_eq!(board.status_of(&sprint(), "t-5"), Some(TaskStatus::ToDo));
    Ok(())
}

#[test]
fn invalid_config_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;
    board.write_config("[board.sprint]\ncolumns = []\n")?;

    board_cmd(&board)
        .args(["columns"])
        .assert()
        .code(2)
        .stderr(contains("error:"));
    Ok(())
}

#[test]
fn move_timed_out_behind_lock_leaves_file_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let board = TestBoard::init()?;
    board.write_config("[backend]\ntimeout_ms = 100\n")?;
    let held = FileLock::acquire(lock_path_for(&board.storage().tasks_file()), 5_000)?;

    board_cmd(&board)
        .args(["move", "t-1", "done", "--scope", "backlog"])
        .assert()
        .code(3)
        .stderr(contains("t-1 stays to-do"));

    drop(held);
    std::thread::sleep(std::time::Duration::from_millis(300));
    assert_eq!(board.status_of(&Scope::Backlog, "t-1"), Some(TaskStatus::ToDo));
    Ok(())
}
