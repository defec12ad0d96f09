//! Lifecycle of a locally spawned bridge server.

use lazy_static::lazy_static;
use log::Level;
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use super::EngineError;
use crate::settings::EngineSettings;

lazy_static! {
    /// Bridge output lines carry an optional level prefix.
    static ref LEVEL_PREFIX: Regex = Regex::new(r"^(DEBUG|WARN|ERROR)\s+(.*)$").unwrap();
}

/// Map one line of bridge output to a log level and message.
///
/// Lines without a recognized prefix are informational.
pub fn parse_log_line(line: &str) -> (Level, &str) {
    match LEVEL_PREFIX.captures(line) {
        Some(caps) => {
            let level = match &caps[1] {
                "DEBUG" => Level::Debug,
                "WARN" => Level::Warn,
                _ => Level::Error,
            };
            let message = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            (level, message)
        }
        None => (Level::Info, line),
    }
}

/// A bridge server child process listening on `host:port`.
pub struct EngineProcess {
    child: Child,
    host: String,
    port: u16,
    forwarders: Vec<JoinHandle<()>>,
}

impl EngineProcess {
    /// Spawn `<command> <script> <port> <host>`.
    pub fn spawn(settings: &EngineSettings) -> Result<Self, EngineError> {
        let script = settings
            .script
            .as_ref()
            .ok_or_else(|| EngineError::Startup("no bridge script configured".to_string()))?;

        if !script.exists() {
            return Err(EngineError::Startup(format!(
                "bridge script not found: {}",
                script.display()
            )));
        }

        let port = if settings.port == 0 {
            free_port(&settings.host)?
        } else {
            settings.port
        };

        log::debug!(
            "Starting engine: {} {} {} {}",
            settings.command,
            script.display(),
            port,
            settings.host
        );

        let mut child = Command::new(&settings.command)
            .arg(script)
            .arg(port.to_string())
            .arg(&settings.host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::Startup(format!("failed to execute {}: {}", settings.command, e))
            })?;

        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward_output(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_output(stderr, true));
        }

        Ok(Self {
            child,
            host: settings.host.clone(),
            port,
            forwarders,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL of the bridge server.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Whether the child has not exited yet.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the child if it still runs and reap it.
    pub fn kill(&mut self) {
        if self.is_running() {
            log::debug!("Killing engine process {}", self.child.id());
            if let Err(e) = self.child.kill() {
                log::warn!("Failed to kill engine process: {}", e);
            }
        }
        let _ = self.child.wait();
        for handle in self.forwarders.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Ask the OS for an unused port on `host`.
fn free_port(host: &str) -> Result<u16, EngineError> {
    let listener = TcpListener::bind((host, 0))?;
    Ok(listener.local_addr()?.port())
}

fn forward_output<R: Read + Send + 'static>(stream: R, is_stderr: bool) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if is_stderr {
                log::error!(target: "engine", "{}", line);
            } else {
                let (level, message) = parse_log_line(&line);
                log::log!(target: "engine", level, "{}", message);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_line_levels() {
        assert_eq!(
            parse_log_line("DEBUG testing debug log"),
            (Level::Debug, "testing debug log")
        );
        assert_eq!(
            parse_log_line("WARN testing warn log"),
            (Level::Warn, "testing warn log")
        );
        assert_eq!(parse_log_line("ERROR boom"), (Level::Error, "boom"));
        assert_eq!(
            parse_log_line("testing info log"),
            (Level::Info, "testing info log")
        );
    }

    #[test]
    fn test_prefix_must_be_followed_by_space() {
        assert_eq!(parse_log_line("DEBUGGING"), (Level::Info, "DEBUGGING"));
    }

    #[test]
    fn test_free_port_is_nonzero() {
        let port = free_port("127.0.0.1").unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn test_spawn_without_script_fails() {
        let settings = EngineSettings::default();
        let err = EngineProcess::spawn(&settings).err().unwrap();
        assert!(matches!(err, EngineError::Startup(_)));
    }
}
