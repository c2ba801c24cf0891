use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Session on a small throwaway disk, reading lines from `--command`.
fn session(dir: &Path, lines: &str) -> Command {
    let mut cmd = Command::cargo_bin("debug86").unwrap();
    cmd.arg("--minimal")
        .arg("--sectors")
        .arg("4")
        .arg("--disk")
        .arg(dir.join("disk.img"))
        .arg("--command")
        .arg(lines);
    cmd
}

fn workspace() -> TempDir {
    tempdir().unwrap()
}

#[test]
fn runs_to_end_of_input() {
    let dir = workspace();
    session(dir.path(), "").assert().success();
    assert_eq!(fs::metadata(dir.path().join("disk.img")).unwrap().len(), 4 * 512);
}

#[test]
fn hex_math() {
    let dir = workspace();
    session(dir.path(), "h 5 3;q")
        .assert()
        .success()
        .stderr(predicate::str::contains("0008  0002"));
}

#[test]
fn fill_then_display() {
    let dir = workspace();
    session(dir.path(), "f 100 10f 'BUFFER';d 100 10f")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "0000:0100  42 55 46 46 45 52 42 55-46 46 45 52 42 55 46 46  BUFFERBUFFERBUFF",
        ));
}

#[test]
fn overlapping_move_is_refused() {
    let dir = workspace();
    session(dir.path(), "m 100 10f 108;q")
        .assert()
        .success()
        .stderr(predicate::str::contains("overlaps source"));
}

#[test]
fn unknown_command_continues() {
    let dir = workspace();
    session(dir.path(), "frobnicate;h 1 1")
        .assert()
        .success()
        .stderr(predicate::str::contains("Type `help` for a list of commands."))
        .stderr(predicate::str::contains("0002  0000"));
}

#[test]
fn evaluate_single_instruction() {
    let dir = workspace();
    session(dir.path(), "p mov ax, 5;r")
        .assert()
        .success()
        .stderr(predicate::str::contains("mov ax, 0x0005  AX=0005"))
        .stderr(predicate::str::contains("AX=0005  BX=0000"));
}

#[test]
fn assemble_and_go() {
    let dir = workspace();
    let lines = "a;mov dl, 0x41;mov ah, 2;int 21h;mov ax, 0x4C07;int 21h;q;g";
    session(dir.path(), lines)
        .assert()
        .code(7)
        .stdout(predicate::str::diff("A"))
        .stderr(predicate::str::contains("Program terminated with exit code 7."));
}

#[test]
fn breakpoint_stops_go() {
    let dir = workspace();
    let lines = "a;mov ax, 1;mov bx, 2;hlt;q;bp 104;g";
    session(dir.path(), lines)
        .assert()
        .success()
        .stderr(predicate::str::contains("Reached breakpoint at 0000:0104."))
        .stderr(predicate::str::contains("AX=0001  BX=0000"));
}

#[test]
fn breakpoint_at_label() {
    let dir = workspace();
    let lines = "a;mov ax, 1;emit: mov bx, 2;hlt;q;bp EMIT;bl;g";
    session(dir.path(), lines)
        .assert()
        .success()
        .stderr(predicate::str::contains("Added breakpoint at 0000:0104."))
        .stderr(predicate::str::contains("0000:0104  emit"))
        .stderr(predicate::str::contains("Reached breakpoint at 0000:0104."));
}

#[test]
fn breakpoint_at_unknown_label() {
    let dir = workspace();
    session(dir.path(), "bp nowhere;bl")
        .assert()
        .success()
        .stderr(predicate::str::contains("Label not found named `nowhere`."))
        .stderr(predicate::str::contains("No breakpoints exist."));
}

#[test]
fn trace_shows_bytes_and_changes() {
    let dir = workspace();
    let lines = "trace on;a;mov ax, 1;mov bx, ax;q;t 2";
    session(dir.path(), lines)
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "0000:0100  B8000100    mov ax, 0x0001          AX=0001",
        ))
        .stderr(predicate::str::contains("mov bx, ax              BX=0001"));
}

#[test]
fn watch_reports_changes() {
    let dir = workspace();
    session(dir.path(), "watch ax;p mov ax, 5;unwatch ax;p mov ax, 6")
        .assert()
        .success()
        .stderr(predicate::str::contains("Watching AX."))
        .stderr(predicate::str::contains("AX: 0000 -> 0005"))
        .stderr(predicate::str::contains("0005 -> 0006").not());
}

#[test]
fn long_byte_list() {
    let dir = workspace();
    let lines = format!("e 100 {};d 100 100", vec!["41"; 300].join(" "));
    session(dir.path(), &lines)
        .assert()
        .success()
        .stderr(predicate::str::contains("0000:0100  41"));
}

#[test]
fn zero_sector_size_is_rejected() {
    let dir = workspace();
    Command::cargo_bin("debug86")
        .unwrap()
        .arg("--sector-size")
        .arg("0")
        .arg("--disk")
        .arg(dir.path().join("disk.img"))
        .arg("--command")
        .arg("cat 0 0")
        .assert()
        .failure();
}

#[test]
fn disk_persists_between_sessions() {
    let dir = workspace();
    session(dir.path(), "e 100 'hi';w 100 1 1;q")
        .assert()
        .success();
    session(dir.path(), "l 200 1 1;d 200 201")
        .assert()
        .success()
        .stderr(predicate::str::contains("0000:0200  68 69"));
}

#[test]
fn assemble_and_disassemble_files() {
    let dir = workspace();
    let source = dir.path().join("prog.asm");
    fs::write(&source, "mov cx, 3\nagain:\n  dec cx\n  jnz again\n  int 20h\n").unwrap();

    Command::cargo_bin("debug86")
        .unwrap()
        .arg("assemble")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished"));

    Command::cargo_bin("debug86")
        .unwrap()
        .arg("disassemble")
        .arg(dir.path().join("prog.bin"))
        .assert()
        .success()
        .stdout(predicate::str::contains("0100  mov cx, 0x0003"))
        .stdout(predicate::str::contains("int 0x20"));
}

#[test]
fn check_reports_errors() {
    let dir = workspace();
    let source = dir.path().join("bad.asm");
    fs::write(&source, "mov ax, 1\nmvo bx, 2\n").unwrap();

    Command::cargo_bin("debug86")
        .unwrap()
        .arg("check")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown mnemonic `mvo`."));
}
