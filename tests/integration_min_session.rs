// Minimal integration test that drives the compiled binary through a PTY.
// This exercises the real event loop and crossterm input handling without
// relying on internal modules.
//
// Notes:
// - Requires a TTY; uses expectrl which allocates a pseudo terminal.
// - Marked Unix-only and ignored by default.
// - Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn practice_session_completes_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("snippets.db");

    let bin = assert_cmd::cargo::cargo_bin("rote");
    let status = std::process::Command::new(&bin)
        .arg("--db")
        .arg(&db)
        .args(["add", "--title", "pty smoke snippet", "--file"])
        .arg(write_code(dir.path())?)
        .status()?;
    assert!(status.success());

    let cmd = format!("{} --db {} --no-celebrate", bin.display(), db.display());
    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));

    // open the only snippet and type it
    p.send("\r")?;
    std::thread::sleep(Duration::from_millis(100));
    p.send("print(42)")?;
    std::thread::sleep(Duration::from_millis(200));

    // back to the list, then quit
    p.send("\x1b")?;
    std::thread::sleep(Duration::from_millis(100));
    p.send("q")?;
    p.expect(Eof)?;

    let listed = std::process::Command::new(&bin)
        .arg("--db")
        .arg(&db)
        .arg("list")
        .output()?;
    assert!(String::from_utf8(listed.stdout)?.contains("1 tests"));
    Ok(())
}

fn write_code(dir: &std::path::Path) -> std::io::Result<std::path::PathBuf> {
    let path = dir.join("code.py");
    std::fs::write(&path, "print(42)")?;
    Ok(path)
}
