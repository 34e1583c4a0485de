//! Client context object that embedding applications hold.
//!
//! `LicenseClient::init` validates the configuration, builds the lease cache
//! and starts the single background thread that keeps the lease alive.
//! Application threads call `acquire`/`release` concurrently; both sides go
//! through the one cache lock.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::{ClientLeaseEntry, LeaseCache};
use crate::config::ClientConfig;
use crate::error::{LicsError, Result};
use crate::event_queue::{EventQueue, LoopEvent};
use crate::protocol::*;
use crate::transport::LicenseTransport;
use crate::types::{AlgorithmId, TaskClass, Token};

/// Exponential reconnect delay, doubling per failure up to a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[derive(Debug, Default)]
struct Session {
    /// Set while authenticated
    token: Option<Token>,
    /// Most recent token, kept across disconnects for the re-auth log note
    last_token: Option<Token>,
}

struct ClientShared {
    config: ClientConfig,
    transport: Box<dyn LicenseTransport>,
    cache: Mutex<LeaseCache>,
    session: RwLock<Session>,
    events: EventQueue<LoopEvent>,
}

impl ClientShared {
    fn token(&self) -> Result<Token> {
        self.session
            .read()
            .token
            .ok_or_else(|| LicsError::Disconnected("not authenticated with license server".into()))
    }

    fn authenticate(&self) -> Result<Token> {
        let previous = self.session.read().last_token;
        let resp = self.transport.authenticate(&AuthenticateRequest { token: previous })?;
        if !resp.status.is_ok() {
            return Err(LicsError::AuthFailure(format!("server answered {}", resp.status)));
        }

        self.cache.lock().reset_video_usage();
        {
            let mut session = self.session.write();
            session.token = Some(resp.token);
            session.last_token = Some(resp.token);
        }
        info!(token = resp.token, previous = ?previous, "Authenticated with license server");
        Ok(resp.token)
    }

    fn heartbeat(&self, token: Token) -> Result<()> {
        let usage = self.cache.lock().usage_report();
        let resp = self.transport.heartbeat(&HeartbeatRequest { token, usage })?;
        if let Some(err) = LicsError::from_status(resp.status, token, 0) {
            return Err(err);
        }

        let applied = self.cache.lock().apply_shares(&resp.shares);
        debug!(token, shares = applied, "Heartbeat acknowledged");
        Ok(())
    }

    fn disconnect(&self) {
        self.session.write().token = None;
    }
}

/// Authenticate with backoff, then heartbeat at a fixed interval, until an
/// exit event arrives. The backoff only resets after a heartbeat succeeds.
fn run_loop(shared: Arc<ClientShared>) {
    let interval = shared.config.heartbeat_interval();
    let mut backoff = Backoff::new(shared.config.backoff_initial(), shared.config.backoff_max());

    'session: loop {
        let token = match shared.authenticate() {
            Ok(token) => token,
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Authentication failed");
                if shared.events.wait_for_exit(delay) {
                    break 'session;
                }
                continue 'session;
            }
        };

        loop {
            if let Err(e) = shared.heartbeat(token) {
                shared.disconnect();
                // Back off before re-authenticating, same as a failed auth
                let delay = backoff.next_delay();
                error!(
                    token,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Heartbeat failed; client is disconnected"
                );
                if shared.events.wait_for_exit(delay) {
                    break 'session;
                }
                continue 'session;
            }
            backoff.reset();
            if shared.events.wait_for_exit(interval) {
                break 'session;
            }
        }
    }

    shared.disconnect();
    info!("License client loop stopped");
}

/// The main entry point for embedding applications.
pub struct LicenseClient {
    shared: Arc<ClientShared>,
    worker: Option<JoinHandle<()>>,
}

impl LicenseClient {
    /// Validates `config` and starts the background loop over `transport`.
    pub fn init(config: ClientConfig, transport: Box<dyn LicenseTransport>) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(ClientShared {
            cache: Mutex::new(LeaseCache::from_config(&config.algorithms)),
            config,
            transport,
            session: RwLock::new(Session::default()),
            events: EventQueue::new(),
        });

        let loop_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("lics-client".to_string())
            .spawn(move || run_loop(loop_shared))
            .map_err(|e| LicsError::Unknown(format!("failed to start client loop: {}", e)))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// `init` over HTTP to `config.server_url`.
    #[cfg(feature = "http")]
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let transport = crate::transport_http::HttpTransport::new(
            config.server_url.clone(),
            config.request_timeout(),
        );
        Self::init(config, Box::new(transport))
    }

    pub fn is_connected(&self) -> bool {
        self.shared.session.read().token.is_some()
    }

    pub fn token(&self) -> Option<Token> {
        self.shared.session.read().token
    }

    /// Polls until the background loop has authenticated. Never needed for
    /// correctness; `acquire` fails fast instead of blocking.
    pub fn wait_until_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_connected() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }

    pub fn task_class(&self, algorithm_id: AlgorithmId) -> Result<TaskClass> {
        self.shared
            .cache
            .lock()
            .task_class(algorithm_id)
            .ok_or_else(|| {
                LicsError::InvalidParams(format!("algorithm {} is not configured", algorithm_id))
            })
    }

    /// Snapshot of the local cache entry.
    pub fn query(&self, algorithm_id: AlgorithmId) -> Result<ClientLeaseEntry> {
        self.shared.cache.lock().entry(algorithm_id).cloned()
    }

    /// Acquires up to `expected` licenses. The grant may be smaller than
    /// requested; check the returned count.
    pub fn acquire(&self, algorithm_id: AlgorithmId, expected: u32) -> Result<u32> {
        let token = self.shared.token()?;
        let task_class = self.shared.cache.lock().entry(algorithm_id)?.task_class;

        match task_class {
            TaskClass::Picture => self.shared.cache.lock().acquire_picture(algorithm_id, expected),
            TaskClass::Video => {
                let resp = self.shared.transport.create_license(&CreateLicenseRequest {
                    token,
                    algorithm_id,
                    task_class,
                    expected_count: expected,
                })?;
                if let Some(err) = LicsError::from_status(resp.status, token, algorithm_id) {
                    return Err(err);
                }
                self.shared
                    .cache
                    .lock()
                    .record_video_grant(algorithm_id, resp.granted_count);
                Ok(resp.granted_count)
            }
        }
    }

    /// Releases up to `amount` licenses; returns how many were released.
    pub fn release(&self, algorithm_id: AlgorithmId, amount: u32) -> Result<u32> {
        let token = self.shared.token()?;
        let task_class = self.shared.cache.lock().entry(algorithm_id)?.task_class;

        match task_class {
            TaskClass::Picture => self.shared.cache.lock().release_picture(algorithm_id, amount),
            TaskClass::Video => {
                let resp = self.shared.transport.delete_license(&DeleteLicenseRequest {
                    token,
                    algorithm_id,
                    task_class,
                    release_count: amount,
                })?;
                if let Some(err) = LicsError::from_status(resp.status, token, algorithm_id) {
                    return Err(err);
                }
                self.shared
                    .cache
                    .lock()
                    .record_video_release(algorithm_id, resp.released_count);
                Ok(resp.released_count)
            }
        }
    }

    /// Stops the background loop and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.shared.events.enqueue(LoopEvent::Exit);
            if worker.join().is_err() {
                warn!("License client loop panicked");
            }
        }
    }
}

impl Drop for LicenseClient {
    fn drop(&mut self) {
        self.stop();
    }
}
