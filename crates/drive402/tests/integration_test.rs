use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

struct DriverProcess {
    child: Child,
    addr: String,
}

impl DriverProcess {
    fn start() -> Self {
        let bin_path = env!("CARGO_BIN_EXE_drive402");

        let listener = TcpListener::bind("127.0.0.1:0")
            .expect("Failed to bind ephemeral port for integration test");
        let addr = listener
            .local_addr()
            .expect("Failed to resolve bound address");
        let bind_addr = format!("127.0.0.1:{}", addr.port());
        drop(listener);

        let child = Command::new(bin_path)
            .args(["--bind", &bind_addr, "--period-ms", "10"])
            .spawn()
            .expect("Failed to start drive402");

        // Loop until port is open (up to 5s)
        let start = std::time::Instant::now();
        while start.elapsed().as_secs() < 5 {
            if TcpStream::connect(&bind_addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }

        // Give the cyclic loop time to reach its running state
        thread::sleep(Duration::from_millis(200));
        Self {
            child,
            addr: bind_addr,
        }
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn connect(addr: &str) -> (TcpStream, BufReader<TcpStream>) {
    let stream = TcpStream::connect(addr).expect("Failed to connect to driver");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let reader = BufReader::new(stream.try_clone().unwrap());
    (stream, reader)
}

/// Send one command and read lines until its response arrives. Telemetry
/// lines interleave on the same stream and are skipped over.
fn send_command(
    stream: &mut TcpStream,
    reader: &mut BufReader<TcpStream>,
    request: serde_json::Value,
) -> serde_json::Value {
    let id = request["id"].as_u64().expect("request needs an id");
    writeln!(stream, "{}", request).unwrap();

    let mut line = String::new();
    for _ in 0..200 {
        line.clear();
        reader.read_line(&mut line).unwrap();
        let msg: serde_json::Value = serde_json::from_str(&line).unwrap();
        if msg["type"] == "response" && msg["id"] == id {
            return msg;
        }
    }
    panic!("no response for command id {}", id);
}

fn command(id: u64, op: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "command",
        "protocol_version": { "major": 1, "minor": 0 },
        "id": id,
        "op": op,
    })
}

#[test]
fn test_command_round_trips() {
    let driver = DriverProcess::start();
    let (mut stream, mut reader) = connect(driver.addr());

    let ready = send_command(&mut stream, &mut reader, command(1, "is_ready"));
    assert_eq!(ready["success"], true, "simulated transport should be up");

    let init = send_command(&mut stream, &mut reader, command(2, "init"));
    assert_eq!(init["success"], true, "init failed: {}", init["message"]);

    let mut set_mode = command(3, "set_mode");
    set_mode["mode"] = serde_json::json!("profiled_velocity");
    let mode = send_command(&mut stream, &mut reader, set_mode);
    assert_eq!(mode["success"], true, "set_mode failed: {}", mode["message"]);

    let mut set_target = command(4, "set_target");
    set_target["value"] = serde_json::json!(12.5);
    let target = send_command(&mut stream, &mut reader, set_target);
    assert_eq!(
        target["success"], true,
        "set_target failed: {}",
        target["message"]
    );
}

#[test]
fn test_failed_command_reports_reason() {
    let driver = DriverProcess::start();
    let (mut stream, mut reader) = connect(driver.addr());

    // Targets are rejected while no operation mode is active.
    let mut set_target = command(1, "set_target");
    set_target["value"] = serde_json::json!(5.0);
    let response = send_command(&mut stream, &mut reader, set_target);
    assert_eq!(response["success"], false);
    assert!(
        response["message"].as_str().unwrap_or_default().len() > 0,
        "failure must carry a reason"
    );

    // Unknown operations still get exactly one response.
    let response = send_command(&mut stream, &mut reader, command(2, "warp_drive"));
    assert_eq!(response["success"], false);
}

#[test]
fn test_telemetry_covers_every_channel() {
    let driver = DriverProcess::start();
    let (_stream, mut reader) = connect(driver.addr());

    let expected: HashSet<&str> = [
        "position",
        "velocity",
        "current_rms",
        "temperature_c",
        "digital_inputs",
        "drive_status",
    ]
    .into_iter()
    .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut line = String::new();
    for _ in 0..100 {
        line.clear();
        reader.read_line(&mut line).unwrap();
        let msg: serde_json::Value = serde_json::from_str(&line).unwrap();
        if msg["type"] == "telemetry" {
            assert!(msg["timestamp_us"].is_u64());
            assert!(msg["value"].is_number());
            if let Some(channel) = msg["channel"].as_str() {
                seen.insert(channel.to_string());
            }
        }
        if seen.len() == expected.len() {
            break;
        }
    }

    let seen_refs: HashSet<&str> = seen.iter().map(String::as_str).collect();
    assert_eq!(seen_refs, expected);
}
