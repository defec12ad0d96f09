//! HTTP client for the bridge server.
//!
//! The bridge exposes one endpoint per engine operation. Calls are
//! synchronous from the caller's point of view: each request is driven to
//! completion on the shared tokio runtime with `block_on`.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use super::process::EngineProcess;
use super::protocol::{
    AnalysisRequest, AnalysisResponse, InitLinterRequest, LoadConfigRequest, LoadConfigResponse,
    RuleConfig,
};
use super::{Engine, EngineError};
use crate::config_graph::ConfigFile;
use crate::settings::EngineSettings;

/// Body the bridge answers to commands and status probes.
const OK_BODY: &str = "OK!";

const STATUS_TIMEOUT: Duration = Duration::from_secs(1);
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Engine reached over HTTP, optionally owning the bridge process.
pub struct HttpEngine {
    runtime: Handle,
    http: Client,
    base_url: String,
    process: Option<EngineProcess>,
    /// Configuration paths of the last analyzed file since the last reset.
    config_context: Vec<String>,
}

impl HttpEngine {
    /// Attach to an engine that is already listening at `url`.
    pub fn connect(runtime: Handle, url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let http = Client::builder()
            .user_agent(concat!("lintbridge/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            runtime,
            http,
            base_url: url.trim_end_matches('/').to_string(),
            process: None,
            config_context: Vec::new(),
        })
    }

    /// Spawn the bridge script and wait until it answers status probes.
    pub fn start(runtime: Handle, settings: &EngineSettings) -> Result<Self, EngineError> {
        let process = EngineProcess::spawn(settings)?;
        let mut engine = Self::connect(runtime, &process.url(), settings.timeout())?;
        engine.process = Some(process);
        engine.wait_until_ready(settings.startup_timeout())?;
        log::info!("Engine started on port {}", engine.port().unwrap_or_default());
        Ok(engine)
    }

    /// Connect when a URL is configured, spawn the bridge otherwise.
    pub fn from_settings(runtime: Handle, settings: &EngineSettings) -> Result<Self, EngineError> {
        match &settings.url {
            Some(url) => {
                let mut engine = Self::connect(runtime, url, settings.timeout())?;
                if !engine.is_alive() {
                    return Err(EngineError::Unavailable(format!("no engine answering at {}", url)));
                }
                Ok(engine)
            }
            None => Self::start(runtime, settings),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Port of the spawned bridge, if this client owns one.
    pub fn port(&self) -> Option<u16> {
        self.process.as_ref().map(|p| p.port())
    }

    /// Configurations the engine analyzes with, as far as this client knows.
    /// Empty before the first analysis and after a reset.
    pub fn config_context(&self) -> &[String] {
        &self.config_context
    }

    fn wait_until_ready(&mut self, startup_timeout: Duration) -> Result<(), EngineError> {
        let deadline = Instant::now() + startup_timeout;
        loop {
            if self.is_alive() {
                return Ok(());
            }
            if let Some(process) = self.process.as_mut() {
                if !process.is_running() {
                    return Err(EngineError::Startup(
                        "engine process exited before answering".to_string(),
                    ));
                }
            }
            if Instant::now() >= deadline {
                if let Some(process) = self.process.as_mut() {
                    process.kill();
                }
                return Err(EngineError::Startup(format!(
                    "engine did not answer within {} ms",
                    startup_timeout.as_millis()
                )));
            }
            std::thread::sleep(STARTUP_POLL_INTERVAL);
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Send a request and return the body of a successful response.
    fn send(&self, request: RequestBuilder) -> Result<String, EngineError> {
        self.runtime.block_on(async move {
            let response = request.send().await.map_err(classify)?;
            let status = response.status();
            let body = response.text().await.map_err(classify)?;
            if !status.is_success() {
                return Err(EngineError::Protocol(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body.trim()
                )));
            }
            Ok(body)
        })
    }

    fn post_command(&self, name: &str) -> Result<String, EngineError> {
        self.send(self.http.post(self.endpoint(name)))
    }

    fn post_json<B, T>(&self, name: &str, body: &B) -> Result<T, EngineError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(self.http.post(self.endpoint(name)).json(body))?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::Protocol(format!("malformed response from /{}: {}", name, e)))
    }
}

/// Sort reqwest failures into the engine error taxonomy.
fn classify(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Timeout
    } else if err.is_connect() {
        EngineError::Unavailable(err.to_string())
    } else {
        EngineError::Transport(err)
    }
}

impl Engine for HttpEngine {
    fn initialize(
        &mut self,
        rules: &[RuleConfig],
        environments: &[String],
        globals: &[String],
    ) -> Result<(), EngineError> {
        let body = InitLinterRequest {
            rules,
            environments,
            globals,
        };
        let answer = self.send(self.http.post(self.endpoint("init-linter")).json(&body))?;
        if answer.trim() != OK_BODY {
            return Err(EngineError::Rejected(answer.trim().to_string()));
        }
        log::debug!("Engine initialized with {} rules", rules.len());
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        if let Some(process) = self.process.as_mut() {
            if !process.is_running() {
                return false;
            }
        }
        let request = self.http.get(self.endpoint("status")).timeout(STATUS_TIMEOUT);
        matches!(self.send(request), Ok(body) if body.trim() == OK_BODY)
    }

    fn load_config(&mut self, path: &Path) -> Result<ConfigFile, EngineError> {
        let path_str = path.to_string_lossy();
        let response: LoadConfigResponse = self.post_json(
            "tsconfig-files",
            &LoadConfigRequest {
                tsconfig: &path_str,
            },
        )?;
        if let Some(error) = &response.error {
            return Err(EngineError::Protocol(format!(
                "failed to load {}: {}",
                path.display(),
                error
            )));
        }
        Ok(ConfigFile::from_response(path, response))
    }

    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResponse, EngineError> {
        let response = self.post_json(request.language.endpoint(), request)?;
        if self.config_context != request.ts_configs {
            self.config_context = request.ts_configs.clone();
        }
        Ok(response)
    }

    fn reset_config_context(&mut self) -> Result<(), EngineError> {
        self.post_command("new-tsconfig")?;
        self.config_context.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if let Some(mut process) = self.process.take() {
            if let Err(e) = self.post_command("close") {
                log::debug!("Engine did not acknowledge close: {}", e);
            }
            process.kill();
        }
        Ok(())
    }
}
