use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;

// C1: x, C2: !x, C3: y
const SCENARIO: &str = "p cnf 2 3\n1 0\n-1 0\n2 0\n";

fn input(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn marco(args: &[&str], file: &NamedTempFile) -> Output {
    Command::new(env!("CARGO_BIN_EXE_marco"))
        .args(args)
        .arg(file.path())
        .output()
        .unwrap()
}

fn sorted_lines(output: &Output) -> Vec<String> {
    let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect();
    lines.sort();
    lines
}

#[test]
fn verbose_run_lists_every_result() {
    let file = input(SCENARIO);
    let output = marco(&["--force-minisat", "-v"], &file);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(sorted_lines(&output), vec!["MSS 1 3", "MSS 2 3", "MUS 1 2"]);
}

#[test]
fn plain_run_prints_kinds_only() {
    let file = input(SCENARIO);
    let output = marco(&["--force-minisat", "--aim", "MCSes"], &file);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(sorted_lines(&output), vec!["MSS", "MSS", "MUS"]);
}

#[test]
fn limit_stops_early() {
    let file = input(SCENARIO);
    let output = marco(&["--force-minisat", "-l", "1"], &file);
    assert!(output.status.success());
    assert_eq!(sorted_lines(&output).len(), 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Result limit reached."));

    let output = marco(&["--force-minisat", "-l", "0"], &file);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn elapsed_timeout_exits_with_interrupt_status() {
    let file = input(SCENARIO);
    let output = marco(&["--force-minisat", "-T", "0"], &file);
    assert_eq!(output.status.code(), Some(128));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Time limit reached."));
}

#[test]
fn smus_reports_one_smallest_mus() {
    let gcnf = "p gcnf 2 4 3\n{0} 2 0\n{1} 1 0\n{2} -1 0\n{3} -2 0\n";
    let file = input(gcnf);
    let output = marco(&["--force-minisat", "--smus", "-v"], &file);
    assert!(output.status.success(), "{output:?}");
    let lines = sorted_lines(&output);
    let muses: Vec<&String> = lines.iter().filter(|line| line.starts_with("MUS")).collect();
    assert_eq!(muses, vec!["MUS 3"]);
}

#[test]
fn stats_json_goes_to_stderr() {
    let file = input(SCENARIO);
    let output = marco(&["--force-minisat", "--stats-json"], &file);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"phases\""), "{stderr}");
    assert_eq!(sorted_lines(&output).len(), 3);
}

#[test]
fn yaml_config_is_applied() {
    let file = input(SCENARIO);
    let config = input("aim: mcses\nmaximize: none\n");
    let path = config.path().to_str().unwrap().to_owned();
    let output = marco(&["--force-minisat", "-v", "--config", &path], &file);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(sorted_lines(&output), vec!["MSS 1 3", "MSS 2 3", "MUS 1 2"]);
}

#[test]
fn malformed_input_exits_with_failure() {
    let file = input("p cnf 1 1\n1 x 0\n");
    let output = marco(&["--force-minisat"], &file);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error"));
}

#[test]
fn missing_minimizer_is_rejected() {
    let file = input(SCENARIO);
    let output = marco(&["--muser", "/nonexistent/muser2"], &file);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn default_minimizer_falls_back_to_in_process() {
    let file = input(SCENARIO);
    let output = marco(&["-v"], &file);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(sorted_lines(&output), vec!["MSS 1 3", "MSS 2 3", "MUS 1 2"]);
}

#[test]
fn maximize_flags_are_exclusive() {
    let file = input(SCENARIO);
    let output = marco(&["--nomax", "--smus"], &file);
    assert_eq!(output.status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn ctrl_c_while_reading_stdin_ends_the_process() {
    use std::os::unix::process::ExitStatusExt;

    let mut child = Command::new(env!("CARGO_BIN_EXE_marco"))
        .arg("--force-minisat")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // Keep stdin open so the read blocks.
    let stdin = child.stdin.take().unwrap();
    thread::sleep(Duration::from_millis(300));
    let sent = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("marco kept reading stdin after SIGINT");
        }
        thread::sleep(Duration::from_millis(20));
    };
    drop(stdin);
    assert_eq!(status.signal(), Some(2));
}

#[test]
fn smus_with_mss_guidance_is_rejected() {
    let file = input(SCENARIO);
    let output = marco(&["--force-minisat", "--smus", "--mssguided"], &file);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("conflicting-options"));
}
