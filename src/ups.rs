//! UPS status via a Network UPS Tools (NUT) server.
//!
//! The NUT client is not safe for concurrent use, so a single long-lived
//! connection is kept behind a mutex. It is opened lazily on first use,
//! reused across scrapes, dropped after any failure and logged out on
//! shutdown.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{CollectError, Result};
use crate::metric::{strip_repeated_meta, Metric};

pub const DEFAULT_NUT_PORT: u16 = 3493;
const NUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Operations the exporter needs from a UPS protocol client.
pub trait UpsClient: Send {
    fn list_ups(&mut self) -> Result<Vec<String>>;
    fn list_vars(&mut self, ups: &str) -> Result<Vec<(String, String)>>;
    fn disconnect(&mut self) -> Result<()>;
}

/// Minimal NUT text protocol client.
pub struct NutClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl NutClient {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| CollectError::Ups(format!("resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| CollectError::Ups(format!("no address for {host}")))?;
        let stream = TcpStream::connect_timeout(&addr, NUT_TIMEOUT)
            .map_err(|e| CollectError::Ups(format!("connect {addr}: {e}")))?;
        stream
            .set_read_timeout(Some(NUT_TIMEOUT))
            .map_err(|e| CollectError::Ups(e.to_string()))?;
        let writer = stream
            .try_clone()
            .map_err(|e| CollectError::Ups(e.to_string()))?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    fn send(&mut self, command: &str) -> Result<()> {
        self.writer
            .write_all(format!("{command}\n").as_bytes())
            .map_err(|e| CollectError::Ups(format!("send {command}: {e}")))
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| CollectError::Ups(format!("read: {e}")))?;
        if n == 0 {
            return Err(CollectError::Ups("connection closed".into()));
        }
        let line = line.trim_end().to_string();
        if let Some(code) = line.strip_prefix("ERR ") {
            return Err(CollectError::Ups(code.to_string()));
        }
        Ok(line)
    }

    /// Sends `LIST <what>` and returns the lines between BEGIN and END.
    fn list(&mut self, what: &str) -> Result<Vec<String>> {
        self.send(&format!("LIST {what}"))?;
        let begin = self.read_line()?;
        if begin != format!("BEGIN LIST {what}") {
            return Err(CollectError::Ups(format!("unexpected reply {begin:?}")));
        }
        let end = format!("END LIST {what}");
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == end {
                return Ok(lines);
            }
            lines.push(line);
        }
    }
}

impl UpsClient for NutClient {
    fn list_ups(&mut self) -> Result<Vec<String>> {
        Ok(self
            .list("UPS")?
            .iter()
            .filter_map(|line| line.strip_prefix("UPS "))
            .filter_map(|rest| rest.split_whitespace().next())
            .map(str::to_string)
            .collect())
    }

    fn list_vars(&mut self, ups: &str) -> Result<Vec<(String, String)>> {
        let prefix = format!("VAR {ups} ");
        Ok(self
            .list(&format!("VAR {ups}"))?
            .iter()
            .filter_map(|line| line.strip_prefix(prefix.as_str()))
            .filter_map(parse_var)
            .collect())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.send("LOGOUT")?;
        let reply = self.read_line()?;
        debug!("NUT logout reply: {}", reply);
        Ok(())
    }
}

/// Parses `battery.charge "100"` into its name and unquoted value.
fn parse_var(rest: &str) -> Option<(String, String)> {
    let (name, quoted) = rest.split_once(' ')?;
    let inner = quoted.trim().strip_prefix('"')?.strip_suffix('"')?;
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                value.push(next);
            }
        } else {
            value.push(c);
        }
    }
    Some((name.to_string(), value))
}

pub type UpsConnector = Box<dyn Fn() -> Result<Box<dyn UpsClient>> + Send + Sync>;

/// Lock-guarded, lazily connected UPS client.
pub struct UpsState {
    connector: UpsConnector,
    client: Mutex<Option<Box<dyn UpsClient>>>,
}

impl UpsState {
    pub fn new(connector: UpsConnector) -> Self {
        Self {
            connector,
            client: Mutex::new(None),
        }
    }

    /// UPS state talking to a NUT server at `host:port`.
    pub fn nut(host: String, port: u16) -> Self {
        Self::new(Box::new(move || {
            let client = NutClient::connect(&host, port)?;
            info!("Connected to NUT server {}:{}", host, port);
            Ok(Box::new(client) as Box<dyn UpsClient>)
        }))
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_client<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn UpsClient) -> Result<T>,
    {
        let mut guard = self
            .client
            .lock()
            .map_err(|e| CollectError::Ups(format!("lock poisoned: {e}")))?;

        let mut client = match guard.take() {
            Some(client) => client,
            None => (self.connector)()?,
        };

        let result = f(client.as_mut());
        match &result {
            Ok(_) => *guard = Some(client),
            Err(e) => warn!("UPS query failed, dropping connection: {}", e),
        }
        result
    }

    pub fn is_connected(&self) -> bool {
        self.client.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Logs out of the server if a connection is open.
    pub fn close(&self) {
        let Ok(mut guard) = self.client.lock() else {
            return;
        };
        if let Some(mut client) = guard.take() {
            match client.disconnect() {
                Ok(()) => info!("Disconnected from UPS server"),
                Err(e) => warn!("Failed to disconnect from UPS server: {}", e),
            }
        }
    }
}

fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Emits every numeric UPS variable plus one sample per status flag.
pub fn collect_ups_metrics(state: &UpsState) -> Result<Vec<Metric>> {
    state.with_client(|client| {
        let mut metrics = Vec::new();
        for ups in client.list_ups()? {
            for (name, value) in client.list_vars(&ups)? {
                if name == "ups.status" {
                    for flag in value.split_whitespace() {
                        metrics.push(
                            Metric::gauge("node_ups_status", "UPS status flags reported by NUT", 1.0)
                                .with_label("ups", &ups)
                                .with_label("status", flag),
                        );
                    }
                    continue;
                }
                if let Ok(v) = value.parse::<f64>() {
                    metrics.push(
                        Metric::gauge(
                            format!("node_ups_{}", sanitize_metric_name(&name)),
                            format!("UPS variable {name}"),
                            v,
                        )
                        .with_label("ups", &ups),
                    );
                }
            }
        }
        Ok(strip_repeated_meta(metrics))
    })
}
