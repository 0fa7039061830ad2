use std::process::Command;

fn ftp_bridge() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ftp-bridge"))
}

#[test]
fn test_cli_help() {
    let output = ftp_bridge()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    for command in ["get", "get-text", "put", "put-text", "mkdir", "ls", "fetch", "config"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_cli_version() {
    let output = ftp_bridge()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ftp-bridge"));
}

#[test]
fn test_invalid_uri_exits_with_input_code() {
    let output = ftp_bridge()
        .args(["ls", "http://example.org/pub"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported scheme"));
}

#[test]
fn test_unreachable_server_exits_with_connect_code() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let output = ftp_bridge()
        .args(["get-text", &format!("ftp://u:p@127.0.0.1:{port}/a.txt")])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}
