#[cfg(test)]
mod tests {
    use crate::client::{Backoff, LicenseClient};
    use crate::config::{AlgorithmConfig, ClientConfig, ServerConfig};
    use crate::error::{LicsError, Result};
    use crate::protocol::*;
    use crate::service::LicenseService;
    use crate::transport::{LicenseTransport, LocalTransport};
    use crate::types::{StatusCode, TaskClass};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    const VIDEO: u32 = 100;
    const PICTURE: u32 = 101;

    /// LocalTransport with a switch that makes every call fail like a dead socket,
    /// and a second one that only breaks heartbeats.
    struct FlakyTransport {
        inner: LocalTransport,
        down: Arc<AtomicBool>,
        heartbeat_broken: Arc<AtomicBool>,
        auth_attempts: Arc<AtomicUsize>,
    }

    impl FlakyTransport {
        fn check(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(LicsError::Disconnected("connection refused".into()));
            }
            Ok(())
        }
    }

    impl LicenseTransport for FlakyTransport {
        fn authenticate(&self, req: &AuthenticateRequest) -> Result<AuthenticateResponse> {
            self.auth_attempts.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.authenticate(req)
        }

        fn create_license(&self, req: &CreateLicenseRequest) -> Result<CreateLicenseResponse> {
            self.check()?;
            self.inner.create_license(req)
        }

        fn delete_license(&self, req: &DeleteLicenseRequest) -> Result<DeleteLicenseResponse> {
            self.check()?;
            self.inner.delete_license(req)
        }

        fn heartbeat(&self, req: &HeartbeatRequest) -> Result<HeartbeatResponse> {
            self.check()?;
            if self.heartbeat_broken.load(Ordering::SeqCst) {
                return Err(LicsError::Unknown("HTTP 502".into()));
            }
            self.inner.heartbeat(req)
        }

        fn query_license(&self, req: &QueryLicenseRequest) -> Result<QueryLicenseResponse> {
            self.check()?;
            self.inner.query_license(req)
        }
    }

    struct Harness {
        service: Arc<LicenseService>,
        down: Arc<AtomicBool>,
        heartbeat_broken: Arc<AtomicBool>,
        auth_attempts: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(video_total: u32, picture_total: u32) -> Self {
            let config =
                ServerConfig::new(vec![(VIDEO, TaskClass::Video), (PICTURE, TaskClass::Picture)]);
            let service = Arc::new(LicenseService::from_config(&config).unwrap());
            service.with_ledger(|l| {
                l.merge_quota(&HashMap::from([(VIDEO, video_total), (PICTURE, picture_total)]))
            });
            Self {
                service,
                down: Arc::new(AtomicBool::new(false)),
                heartbeat_broken: Arc::new(AtomicBool::new(false)),
                auth_attempts: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn transport(&self) -> Box<dyn LicenseTransport> {
            Box::new(FlakyTransport {
                inner: LocalTransport::new(Arc::clone(&self.service)),
                down: Arc::clone(&self.down),
                heartbeat_broken: Arc::clone(&self.heartbeat_broken),
                auth_attempts: Arc::clone(&self.auth_attempts),
            })
        }

        fn client(&self, algorithms: Vec<AlgorithmConfig>) -> LicenseClient {
            let (initial, max) = (Duration::from_millis(10), Duration::from_millis(40));
            self.client_with_backoff(algorithms, initial, max)
        }

        fn client_with_backoff(
            &self,
            algorithms: Vec<AlgorithmConfig>,
            initial: Duration,
            max: Duration,
        ) -> LicenseClient {
            let config = ClientConfig::new("local", algorithms)
                .with_heartbeat_interval(Duration::from_millis(20))
                .with_backoff(initial, max);
            LicenseClient::init(config, self.transport()).unwrap()
        }

        fn video_used(&self) -> u32 {
            self.service
                .with_ledger(|l| l.pool(VIDEO).map(|p| p.used).unwrap_or(0))
        }
    }

    fn default_algorithms() -> Vec<AlgorithmConfig> {
        vec![
            AlgorithmConfig::new(VIDEO, TaskClass::Video),
            AlgorithmConfig::new(PICTURE, TaskClass::Picture).with_cap(500),
        ]
    }

    fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        let delays: Vec<u128> = (0..6).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let harness = Harness::new(10, 10);

        let empty = ClientConfig::new("local", vec![]);
        let err = LicenseClient::init(empty, harness.transport()).err().unwrap();
        assert_eq!(err.code(), StatusCode::InvalidParams);

        let duplicate = ClientConfig::new(
            "local",
            vec![
                AlgorithmConfig::new(VIDEO, TaskClass::Video),
                AlgorithmConfig::new(VIDEO, TaskClass::Picture),
            ],
        );
        let err = LicenseClient::init(duplicate, harness.transport()).err().unwrap();
        assert_eq!(err.code(), StatusCode::DuplicateResourceInit);
    }

    #[test]
    fn test_unconfigured_algorithm_for_both_classes() {
        let harness = Harness::new(10, 10);
        let client = harness.client(vec![AlgorithmConfig::new(VIDEO, TaskClass::Video)]);
        let picture_only = harness.client(vec![AlgorithmConfig::new(PICTURE, TaskClass::Picture)]);
        assert!(client.wait_until_connected(Duration::from_secs(5)));
        assert!(picture_only.wait_until_connected(Duration::from_secs(5)));

        assert_eq!(client.acquire(PICTURE, 1).unwrap_err().code(), StatusCode::AlgorithmNotExist);
        assert_eq!(client.release(PICTURE, 1).unwrap_err().code(), StatusCode::AlgorithmNotExist);
        assert_eq!(
            picture_only.acquire(VIDEO, 1).unwrap_err().code(),
            StatusCode::AlgorithmNotExist
        );
        assert_eq!(client.task_class(555).unwrap_err().code(), StatusCode::InvalidParams);
    }

    #[test]
    fn test_video_round_trip_through_server() {
        let harness = Harness::new(8, 0);
        let client = harness.client(default_algorithms());
        assert!(client.wait_until_connected(Duration::from_secs(5)));

        assert_eq!(client.acquire(VIDEO, 5).unwrap(), 5);
        assert_eq!(client.acquire(VIDEO, 5).unwrap(), 3);
        assert_eq!(harness.video_used(), 8);
        assert_eq!(client.query(VIDEO).unwrap().used, 8);

        assert_eq!(client.release(VIDEO, 8).unwrap(), 8);
        assert_eq!(harness.video_used(), 0);
        assert_eq!(client.task_class(VIDEO).unwrap(), TaskClass::Video);
    }

    #[test]
    fn test_video_algorithm_missing_on_server() {
        let harness = Harness::new(8, 0);
        let client = harness.client(vec![AlgorithmConfig::new(300, TaskClass::Video)]);
        assert!(client.wait_until_connected(Duration::from_secs(5)));

        assert_eq!(client.acquire(300, 1).unwrap_err(), LicsError::AlgorithmNotExist(300));
    }

    #[test]
    fn test_picture_served_from_published_share() {
        let harness = Harness::new(0, 1000);
        let a = harness.client(default_algorithms());
        let b = harness.client(default_algorithms());

        // Both clients report, so each share settles at 1000 / 2 = 500
        assert!(eventually(Duration::from_secs(5), || {
            a.query(PICTURE).unwrap().total == 500 && b.query(PICTURE).unwrap().total == 500
        }));

        assert_eq!(a.acquire(PICTURE, 400).unwrap(), 400);
        assert_eq!(a.acquire(PICTURE, 400).unwrap(), 100);
        assert_eq!(a.release(PICTURE, 600).unwrap(), 500);

        // Never debited on the server
        let picture_used = harness.service.with_ledger(|l| l.pool(PICTURE).unwrap().used);
        assert_eq!(picture_used, 0);
    }

    #[test]
    fn test_disconnect_surfaces_immediately_and_recovers() {
        let harness = Harness::new(10, 0);
        let client = harness.client(default_algorithms());
        assert!(client.wait_until_connected(Duration::from_secs(5)));
        let first_token = client.token().unwrap();
        assert_eq!(client.acquire(VIDEO, 4).unwrap(), 4);

        harness.down.store(true, Ordering::SeqCst);
        assert!(eventually(Duration::from_secs(5), || !client.is_connected()));

        let start = Instant::now();
        let err = client.acquire(VIDEO, 1).unwrap_err();
        assert_eq!(err.code(), StatusCode::NetDisconnected);
        assert_eq!(client.acquire(PICTURE, 1).unwrap_err().code(), StatusCode::NetDisconnected);
        // Connection state wins over an unconfigured id
        assert_eq!(client.acquire(555, 1).unwrap_err().code(), StatusCode::NetDisconnected);
        assert_eq!(client.release(555, 1).unwrap_err().code(), StatusCode::NetDisconnected);
        assert!(start.elapsed() < Duration::from_millis(500));

        harness.down.store(false, Ordering::SeqCst);
        assert!(client.wait_until_connected(Duration::from_secs(5)));
        assert_ne!(client.token().unwrap(), first_token);
        // Grants belonged to the old token
        assert_eq!(client.query(VIDEO).unwrap().used, 0);
    }

    #[test]
    fn test_retries_while_server_unreachable() {
        let harness = Harness::new(10, 0);
        harness.down.store(true, Ordering::SeqCst);
        let client = harness.client(default_algorithms());

        assert!(eventually(Duration::from_secs(5), || {
            harness.auth_attempts.load(Ordering::SeqCst) >= 3
        }));
        assert!(!client.is_connected());
        assert_eq!(client.acquire(VIDEO, 1).unwrap_err().code(), StatusCode::NetDisconnected);

        harness.down.store(false, Ordering::SeqCst);
        assert!(client.wait_until_connected(Duration::from_secs(5)));
    }

    #[test]
    fn test_evicted_client_reauthenticates() {
        let harness = Harness::new(10, 0);
        let client = harness.client(default_algorithms());
        assert!(client.wait_until_connected(Duration::from_secs(5)));
        let token = client.token().unwrap();

        // Drop the lease behind the client's back
        harness.service.with_ledger(|l| {
            for now in [u64::MAX / 4, u64::MAX / 2, u64::MAX - 1] {
                l.sweep(now);
            }
        });

        assert!(eventually(Duration::from_secs(5), || {
            client.token().is_some_and(|t| t != token)
        }));
    }

    #[test]
    fn test_shutdown_is_prompt() {
        let harness = Harness::new(10, 10);
        let client = harness.client(default_algorithms());
        assert!(client.wait_until_connected(Duration::from_secs(5)));

        let start = Instant::now();
        client.shutdown();
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn test_shutdown_during_reconnect_backoff() {
        let harness = Harness::new(10, 10);
        harness.down.store(true, Ordering::SeqCst);
        let client = harness.client_with_backoff(
            default_algorithms(),
            Duration::from_secs(10),
            Duration::from_secs(10),
        );
        assert!(eventually(Duration::from_secs(5), || {
            harness.auth_attempts.load(Ordering::SeqCst) >= 1
        }));

        let start = Instant::now();
        client.shutdown();
        assert!(start.elapsed() < Duration::from_millis(250));
        assert_eq!(harness.auth_attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejected_heartbeats_back_off() {
        let harness = Harness::new(10, 10);
        harness.heartbeat_broken.store(true, Ordering::SeqCst);
        let client = harness.client(default_algorithms());

        std::thread::sleep(Duration::from_millis(500));

        // 10ms, 20ms, then 40ms per retry: roughly a dozen in 500ms
        let attempts = harness.auth_attempts.load(Ordering::SeqCst);
        assert!(attempts >= 2, "expected retries, got {}", attempts);
        assert!(attempts < 50, "re-authenticated {} times in 500ms", attempts);
        assert!(harness.service.snapshot().client_count < 50);

        let start = Instant::now();
        client.shutdown();
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn test_concurrent_picture_grants_stay_within_share() {
        let harness = Harness::new(0, 1000);
        let client = harness.client(default_algorithms());

        // Sole reporter, so the share is min(500, 1000 / 1)
        assert!(eventually(Duration::from_secs(5), || {
            client.query(PICTURE).unwrap().total == 500
        }));

        let held = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for i in 0..500u32 {
                        let granted = client.acquire(PICTURE, 1 + i % 7).unwrap();
                        let outstanding = held.fetch_add(granted as usize, Ordering::SeqCst);
                        assert!(outstanding + granted as usize <= 500);

                        let entry = client.query(PICTURE).unwrap();
                        assert!(entry.used <= entry.total);

                        held.fetch_sub(granted as usize, Ordering::SeqCst);
                        assert_eq!(client.release(PICTURE, granted).unwrap(), granted);
                    }
                });
            }
        });

        let entry = client.query(PICTURE).unwrap();
        assert_eq!(entry.used, 0);
        assert_eq!(entry.total, 500);
    }
}
