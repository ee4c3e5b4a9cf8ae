//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tokio::task;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mount `GET /{name}` answering `status` after `delay_ms`.
pub async fn mount_delayed(server: &MockServer, name: &str, status: u16, delay_ms: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{name}")))
        .respond_with(ResponseTemplate::new(status).set_delay(Duration::from_millis(delay_ms)))
        .mount(server)
        .await;
}

/// Start a server with one delayed route per `(name, status, delay_ms)`.
pub async fn start_server(routes: &[(&str, u16, u64)]) -> MockServer {
    let server = MockServer::start().await;
    for &(name, status, delay_ms) in routes {
        mount_delayed(&server, name, status, delay_ms).await;
    }
    server
}

pub fn url(server: &MockServer, name: &str) -> String {
    format!("{}/{name}", server.uri())
}

/// Run the `snakepit` binary with an empty home directory.
///
/// Blocks, so async tests should call it through `spawn_blocking`.
pub fn run_cli(args: &[String], stdin: Option<&str>) -> Output {
    let home = tempfile::tempdir().unwrap();
    let mut child = spawn_cli(args, home.path());

    let mut pipe = child.stdin.take().unwrap();
    if let Some(input) = stdin {
        pipe.write_all(input.as_bytes()).unwrap();
    }
    drop(pipe);

    child.wait_with_output().unwrap()
}

pub async fn run_cli_async(args: Vec<String>, stdin: Option<String>) -> Output {
    task::spawn_blocking(move || run_cli(&args, stdin.as_deref()))
        .await
        .unwrap()
}

/// Write `line` to the binary's stdin, leave stdin open for `hold`, and
/// return the first line printed together with how long it took to appear.
pub fn first_line_while_stdin_open(line: &str, hold: Duration) -> (String, Duration) {
    let home = tempfile::tempdir().unwrap();
    let mut child = spawn_cli(&[], home.path());

    let begin = Instant::now();
    let mut pipe = child.stdin.take().unwrap();
    writeln!(pipe, "{line}").unwrap();
    pipe.flush().unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut first = String::new();
    stdout.read_line(&mut first).unwrap();
    let elapsed = begin.elapsed();

    thread::sleep(hold.saturating_sub(elapsed));
    drop(pipe);
    child.wait().unwrap();

    (first.trim_end().to_string(), elapsed)
}

fn spawn_cli(args: &[String], home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_snakepit"))
        .args(args)
        .env("HOME", home)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

pub fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}
