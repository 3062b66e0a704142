use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::ClientConfig;
use crate::session::SessionConfig;
use crate::utils::{validate_msg_count, validate_port, validate_system_id};

/// SMPP Stress - floods a bound receiver with deliver_sm traffic
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Which end of the session to run
    #[clap(long, value_enum, default_value_t = Role::Server, help_heading = "Core Options")]
    pub role: Role,

    /// Number of deliver_sm PDUs to send
    #[clap(
        short = 'c',
        long,
        default_value_t = crate::defaults::MSG_COUNT,
        help_heading = "Core Options"
    )]
    pub msg_count: u32,

    /// TCP port to listen on (server) or connect to (client)
    #[clap(short = 'p', long, default_value_t = crate::defaults::LISTEN_PORT)]
    pub port: u16,

    /// Address to listen on (server) or connect to (client)
    #[clap(long, default_value = crate::defaults::HOST)]
    pub host: String,

    /// System id: returned in bind_receiver_resp (server) or sent in bind_receiver (client)
    #[clap(long, default_value = crate::defaults::SYSTEM_ID)]
    pub system_id: String,

    /// Password sent in bind_receiver (client only)
    #[clap(long, default_value = "")]
    pub password: String,

    /// System type sent in bind_receiver (client only)
    #[clap(long, default_value = "")]
    pub system_type: String,

    /// Send our own unbind after this many deliveries (client only)
    #[clap(long)]
    pub unbind_after: Option<u32>,

    /// Deadline for each frame read or write (e.g. "500ms", "10s"); none by default
    #[clap(long, value_parser = parse_duration)]
    pub io_timeout: Option<Duration>,

    /// Largest inbound frame accepted, in bytes
    #[clap(long, default_value_t = crate::defaults::MAX_FRAME_LEN)]
    pub max_frame_len: usize,

    /// Log progress every N deliveries (0 disables)
    #[clap(long, default_value_t = crate::defaults::PROGRESS_INTERVAL)]
    pub progress_interval: u32,

    /// Socket send/receive buffer size in bytes; OS default if unset
    #[clap(long)]
    pub socket_buffer_size: Option<usize>,

    /// Output file for the session report (JSON format)
    #[clap(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// Session roles
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Accept one connection and flood it with deliveries
    #[clap(name = "server")]
    Server,

    /// Bind as a receiver and acknowledge deliveries
    #[clap(name = "client")]
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Server => write!(f, "Server"),
            Role::Client => write!(f, "Client"),
        }
    }
}

impl Args {
    /// Reject option values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_port(self.port)?;
        validate_system_id(&self.system_id)?;
        if self.role == Role::Server {
            validate_msg_count(self.msg_count)?;
        }
        if self.max_frame_len < crate::smpp::HEADER_LEN {
            anyhow::bail!(
                "Max frame length {} is smaller than the {}-byte header",
                self.max_frame_len,
                crate::smpp::HEADER_LEN
            );
        }
        Ok(())
    }

    /// `host:port` string for binding or connecting
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&Args> for SessionConfig {
    fn from(args: &Args) -> Self {
        Self {
            system_id: args.system_id.clone(),
            io_timeout: args.io_timeout,
            max_frame_len: args.max_frame_len,
            progress_interval: args.progress_interval,
            ..Default::default()
        }
    }
}

impl From<&Args> for ClientConfig {
    fn from(args: &Args) -> Self {
        Self {
            system_id: args.system_id.clone(),
            password: args.password.clone(),
            system_type: args.system_type.clone(),
            unbind_after: args.unbind_after,
            io_timeout: args.io_timeout,
            max_frame_len: args.max_frame_len,
            ..Default::default()
        }
    }
}

/// Parse duration from string (e.g., "500ms", "10s", "5m", "1h")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", s));
    }

    let duration = match unit {
        "ms" => Duration::from_millis(num as u64),
        "s" => Duration::from_secs_f64(num),
        "m" => Duration::from_secs_f64(num * 60.0),
        "h" => Duration::from_secs_f64(num * 3600.0),
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(duration)
}
