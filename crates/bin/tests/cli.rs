use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn mucgly() -> Command {
    Command::cargo_bin("mucgly").unwrap()
}

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn processes_a_file_to_stdout() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_file(&dir, "in.mg", "Hello -<.1+2>- world\n");
    mucgly()
        .arg(&input)
        .assert()
        .success()
        .stdout("Hello 3 world\n")
        .stderr("");
}

#[test]
fn processes_stdin_when_no_inputs() {
    mucgly()
        .write_stdin("A-<.1+2>-B")
        .assert()
        .success()
        .stdout("A3B");
}

#[test]
fn writes_to_an_output_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_file(&dir, "in.mg", "x-<.\"y\">-z");
    let output = dir.path().join("out.txt");
    mucgly()
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout("");
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "xyz");
}

#[test]
fn multiple_inputs_share_one_state() {
    let dir = tempfile::TempDir::new().unwrap();
    let first = write_file(&dir, "a.mg", "-<x = 20>-");
    let second = write_file(&dir, "b.mg", "-<.x + 1>-\n");
    mucgly()
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stdout("21\n");
}

#[test]
fn delimiter_overrides() {
    mucgly()
        .args(["--hookbeg", "{{", "--hookend", "}}"])
        .write_stdin("a{{.2*3}}b")
        .assert()
        .success()
        .stdout("a6b");
}

#[test]
fn eval_runs_before_processing() {
    mucgly()
        .args(["--eval", "x = 7"])
        .write_stdin("-<.x>-")
        .assert()
        .success()
        .stdout("7");
}

#[test]
fn load_runs_a_script_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let lib = write_file(&dir, "lib.mg", "greeting = \"hi\"\n");
    mucgly()
        .arg("--load")
        .arg(&lib)
        .write_stdin("-<.greeting>-!")
        .assert()
        .success()
        .stdout("hi!");
}

#[test]
fn unknown_directive_fails_with_diagnostic() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_file(&dir, "in.mg", "-<:nope>-");
    mucgly()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "unknown internal command: \"nope\"",
        ))
        .stderr(predicate::str::contains("mucgly error in"));
}

#[test]
fn missing_input_file_is_fatal() {
    mucgly()
        .arg("definitely-not-here.mg")
        .assert()
        .failure()
        .stderr(predicate::str::contains("mucgly fatal error"))
        .stderr(predicate::str::contains(
            "can't open \"definitely-not-here.mg\"",
        ));
}

#[test]
fn end_of_input_inside_macro_is_fatal() {
    mucgly()
        .write_stdin("-<never closed")
        .assert()
        .failure()
        .stderr(predicate::str::contains("end of input within macro"));
}

#[test]
fn closing_the_outermost_output_warns_and_continues() {
    mucgly()
        .write_stdin("a-<closeoutput()>-b")
        .assert()
        .success()
        .stdout("ab")
        .stderr(predicate::str::contains("mucgly warning"))
        .stderr(predicate::str::contains("cannot close the outermost output"));
}

#[test]
fn exit_directive_terminates_cleanly() {
    mucgly()
        .write_stdin("before-<:exit>-after")
        .assert()
        .success()
        .stdout("before");
}
