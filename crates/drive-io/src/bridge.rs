use crate::metrics::{BRIDGE_CONNECTED, COMMANDS_TOTAL, COMMAND_FAILURES};
use crate::protocol::{channel_values, CommandMsg, IncomingMessage, ResponseMsg, TelemetryMsg};
use drive_core::{CommandOutcome, CommandSurface, MotionDevice, OperationMode, SampleCell};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{atomic::AtomicBool, Arc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Responses are never dropped; telemetry emission is skipped while the
/// outgoing buffer is backed up past this size.
const MAX_BUFFERED_TELEMETRY_BYTES: usize = 64 * 1024;

pub struct BridgeConfig {
    pub bind_addr: String,
    pub publish_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7402".to_string(),
            publish_interval: Duration::from_millis(100),
        }
    }
}

/// Single-client TCP bridge: line-delimited JSON requests in, one response
/// per command out, plus per-channel telemetry at the publish interval.
pub fn run_bridge<D: MotionDevice>(
    surface: CommandSurface<D>,
    sample: Arc<SampleCell>,
    config: BridgeConfig,
    stop: Arc<AtomicBool>,
) {
    let listener = TcpListener::bind(&config.bind_addr)
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));
    listener
        .set_nonblocking(true)
        .expect("Failed to set nonblocking");

    info!(addr = %config.bind_addr, "Bridge listening");

    let mut client: Option<TcpStream> = None;
    let mut recv_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut send_buf: Vec<u8> = Vec::new();
    let mut send_offset: usize = 0;
    let mut last_publish = Instant::now();

    loop {
        if stop.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }
        if client.is_none() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    info!(client_addr = %addr, "Bridge client connected");
                    stream
                        .set_nonblocking(true)
                        .expect("Failed to set nonblocking on client");
                    client = Some(stream);
                    BRIDGE_CONNECTED.set(1.0);
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!("Bridge accept error: {}", err);
                }
            }
        }

        let mut drop_client = false;
        if let Some(stream) = client.as_mut() {
            // Receive data
            let mut temp = [0u8; 1024];
            match stream.read(&mut temp) {
                Ok(0) => {
                    info!("Bridge client disconnected");
                    drop_client = true;
                    BRIDGE_CONNECTED.set(0.0);
                }
                Ok(n) => {
                    recv_buf.extend_from_slice(&temp[..n]);
                    while let Some(pos) = recv_buf.iter().position(|b| *b == b'\n') {
                        let line = recv_buf.drain(..=pos).collect::<Vec<u8>>();
                        if let Ok(text) = std::str::from_utf8(&line) {
                            let trimmed = text.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            if let Some(msg) = IncomingMessage::parse(trimmed) {
                                if let Some(response) = handle_incoming(msg, &surface) {
                                    enqueue_line(&mut send_buf, &response);
                                }
                            }
                        }
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!(error = %err, "Bridge read error");
                    drop_client = true;
                    BRIDGE_CONNECTED.set(0.0);
                }
            }

            // Publish telemetry: one line per channel.
            if last_publish.elapsed() >= config.publish_interval {
                if send_buf.len() - send_offset < MAX_BUFFERED_TELEMETRY_BYTES {
                    let snapshot = sample.read();
                    for (channel, value) in channel_values(&snapshot) {
                        let msg = TelemetryMsg::new(channel, snapshot.timestamp_us, value);
                        enqueue_line(&mut send_buf, &msg);
                    }
                }
                last_publish = Instant::now();
            }

            if send_offset < send_buf.len() {
                match stream.write(&send_buf[send_offset..]) {
                    Ok(0) => {
                        info!("Bridge client disconnected");
                        drop_client = true;
                        BRIDGE_CONNECTED.set(0.0);
                    }
                    Ok(n) => {
                        send_offset += n;
                        if send_offset >= send_buf.len() {
                            send_buf.clear();
                            send_offset = 0;
                        }
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(err) => {
                        warn!(error = %err, "Bridge write error");
                        drop_client = true;
                        BRIDGE_CONNECTED.set(0.0);
                    }
                }
            }
        }

        if drop_client {
            client = None;
            recv_buf.clear();
            send_buf.clear();
            send_offset = 0;
        }

        std::thread::sleep(Duration::from_millis(5));
    }
}

fn enqueue_line<T: serde::Serialize>(send_buf: &mut Vec<u8>, msg: &T) {
    if let Ok(line) = serde_json::to_string(msg) {
        send_buf.extend_from_slice(line.as_bytes());
        send_buf.push(b'\n');
    }
}

fn handle_incoming<D: MotionDevice>(
    msg: IncomingMessage,
    surface: &CommandSurface<D>,
) -> Option<ResponseMsg> {
    match msg {
        IncomingMessage::Command(cmd) => Some(handle_command(cmd, surface)),
        IncomingMessage::Target(target) => {
            if !target.protocol_version.is_supported() {
                warn!(
                    major = target.protocol_version.major,
                    minor = target.protocol_version.minor,
                    "Unsupported protocol version on target stream"
                );
                return None;
            }
            debug!(value = target.value, "Streamed target received");
            surface.stream_target(target.value);
            None
        }
    }
}

fn handle_command<D: MotionDevice>(
    cmd: CommandMsg,
    surface: &CommandSurface<D>,
) -> ResponseMsg {
    COMMANDS_TOTAL.inc();

    if !cmd.protocol_version.is_supported() {
        COMMAND_FAILURES.inc();
        return ResponseMsg::new(cmd.id, false, "unsupported protocol version".into());
    }

    let outcome = dispatch(&cmd, surface);
    if !outcome.success {
        COMMAND_FAILURES.inc();
    }
    debug!(op = %cmd.op, id = cmd.id, success = outcome.success, "Command handled");
    ResponseMsg::new(cmd.id, outcome.success, outcome.message)
}

fn dispatch<D: MotionDevice>(cmd: &CommandMsg, surface: &CommandSurface<D>) -> CommandOutcome {
    match cmd.op.as_str() {
        "init" => surface.init(),
        "recover" => surface.recover(),
        "halt" => surface.halt(),
        "is_ready" => surface.is_ready(),
        "set_mode" => match cmd.mode.as_deref().and_then(OperationMode::parse) {
            Some(mode) => surface.set_mode(mode),
            None => CommandOutcome::failure("set_mode requires a valid 'mode' field"),
        },
        "set_target" => match cmd.value {
            Some(value) => surface.set_target(value),
            None => CommandOutcome::failure("set_target requires a 'value' field"),
        },
        other => CommandOutcome::failure(format!("unknown operation '{other}'")),
    }
}
