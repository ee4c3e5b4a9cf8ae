//! End-to-end tests of the `snakepit` binary

use std::io::Write;
use std::time::Duration;

use tokio::task;

use crate::common::{first_line_while_stdin_open, run_cli_async, start_server, stdout_lines, url};

#[tokio::test(flavor = "multi_thread")]
async fn prints_responses_in_settlement_order() {
    let server = start_server(&[("slow", 200, 300), ("fast", 200, 10), ("mid", 201, 150)]).await;
    let args = vec![
        url(&server, "slow"),
        url(&server, "fast"),
        url(&server, "mid"),
        "--concurrency".to_string(),
        "3".to_string(),
    ];

    let output = run_cli_async(args, None).await;

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec![
            format!("200\t{}", url(&server, "fast")),
            format!("201\t{}", url(&server, "mid")),
            format!("200\t{}", url(&server, "slow")),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn reads_urls_from_stdin_skipping_blank_lines() {
    let server = start_server(&[("a", 200, 0), ("b", 204, 0)]).await;
    let input = format!("{}\n\n   \n{}\n", url(&server, "a"), url(&server, "b"));

    let output = run_cli_async(vec!["-c".to_string(), "1".to_string()], Some(input)).await;

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec![
            format!("200\t{}", url(&server, "a")),
            format!("204\t{}", url(&server, "b")),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn stdin_response_is_printed_before_stdin_closes() {
    let server = start_server(&[("a", 200, 0)]).await;
    let target = url(&server, "a");

    let line = target.clone();
    let (first, elapsed) =
        task::spawn_blocking(move || first_line_while_stdin_open(&line, Duration::from_secs(3)))
            .await
            .unwrap();

    assert_eq!(first, format!("200\t{target}"));
    assert!(elapsed < Duration::from_secs(2), "first line took {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn stops_at_first_failure_by_default() {
    let server = start_server(&[("ok", 200, 0), ("later", 200, 0)]).await;
    let args = vec![
        url(&server, "ok"),
        "not a url".to_string(),
        url(&server, "later"),
        "-c".to_string(),
        "1".to_string(),
    ];

    let output = run_cli_async(args, None).await;

    assert!(!output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 2, "{lines:?}");
    assert_eq!(lines[0], format!("200\t{}", url(&server, "ok")));
    assert!(lines[1].starts_with("error\t"), "{}", lines[1]);
    assert!(lines[1].contains("not a url"));
}

#[tokio::test(flavor = "multi_thread")]
async fn keep_going_reports_every_failure() {
    let server = start_server(&[("ok", 200, 0), ("missing", 404, 50), ("broken", 500, 100)]).await;
    let args = vec![
        url(&server, "missing"),
        url(&server, "broken"),
        url(&server, "ok"),
        "--keep-going".to_string(),
    ];

    let output = run_cli_async(args, None).await;

    assert!(!output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 3, "{lines:?}");
    assert_eq!(lines[0], format!("200\t{}", url(&server, "ok")));
    assert!(lines[1].starts_with("error\t") && lines[1].contains("404"));
    assert!(lines[2].starts_with("error\t") && lines[2].contains("500"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("2 request(s) failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn config_file_sets_concurrency() {
    let server = start_server(&[("first", 200, 200), ("second", 200, 10)]).await;
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "concurrency = 1").unwrap();

    let args = vec![
        url(&server, "first"),
        url(&server, "second"),
        "--config".to_string(),
        config.path().display().to_string(),
    ];
    let output = run_cli_async(args, None).await;

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec![
            format!("200\t{}", url(&server, "first")),
            format!("200\t{}", url(&server, "second")),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn flags_override_config_file() {
    let server = start_server(&[("first", 200, 200), ("second", 200, 10)]).await;
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "concurrency = 1").unwrap();

    let args = vec![
        url(&server, "first"),
        url(&server, "second"),
        "--config".to_string(),
        config.path().display().to_string(),
        "--concurrency".to_string(),
        "2".to_string(),
    ];
    let output = run_cli_async(args, None).await;

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec![
            format!("200\t{}", url(&server, "second")),
            format!("200\t{}", url(&server, "first")),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_explicit_config_is_fatal() {
    let output = run_cli_async(
        vec![
            "--config".to_string(),
            "/nonexistent/snakepit.toml".to_string(),
            "http://127.0.0.1:9/".to_string(),
        ],
        None,
    )
    .await;

    assert!(!output.status.success());
    assert!(stdout_lines(&output).is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("loading config"));
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_flag_fails_slow_requests() {
    let server = start_server(&[("slow", 200, 1_000)]).await;
    let args = vec![
        url(&server, "slow"),
        "--timeout".to_string(),
        "0.1".to_string(),
    ];

    let output = run_cli_async(args, None).await;

    assert!(!output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("error\t"));
}
