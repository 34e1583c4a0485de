#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::protocol::*;
    use crate::service::LicenseService;
    use crate::types::{StatusCode, TaskClass, Token};
    use std::collections::HashMap;

    const VIDEO: u32 = 100;
    const PICTURE: u32 = 101;

    fn service(total: u32) -> LicenseService {
        let config =
            ServerConfig::new(vec![(VIDEO, TaskClass::Video), (PICTURE, TaskClass::Picture)]);
        let service = LicenseService::from_config(&config).unwrap();
        service.with_ledger(|l| l.merge_quota(&HashMap::from([(VIDEO, total), (PICTURE, total)])));
        service
    }

    fn login(service: &LicenseService) -> Token {
        let resp = service.authenticate(&AuthenticateRequest::default());
        assert_eq!(resp.status, StatusCode::Ok);
        resp.token
    }

    fn create(
        service: &LicenseService,
        token: Token,
        algorithm_id: u32,
        count: u32,
    ) -> CreateLicenseResponse {
        service.create_license(&CreateLicenseRequest {
            token,
            algorithm_id,
            task_class: TaskClass::Video,
            expected_count: count,
        })
    }

    fn delete(
        service: &LicenseService,
        token: Token,
        algorithm_id: u32,
        count: u32,
    ) -> DeleteLicenseResponse {
        service.delete_license(&DeleteLicenseRequest {
            token,
            algorithm_id,
            task_class: TaskClass::Video,
            release_count: count,
        })
    }

    fn picture_heartbeat(token: Token, max_limit: u32) -> HeartbeatRequest {
        HeartbeatRequest {
            token,
            usage: vec![AlgorithmUsage {
                algorithm_id: PICTURE,
                task_class: TaskClass::Picture,
                used: 0,
                max_limit,
            }],
        }
    }

    #[test]
    fn test_duplicate_catalogue_entry_rejected() {
        let config =
            ServerConfig::new(vec![(VIDEO, TaskClass::Video), (VIDEO, TaskClass::Picture)]);
        let err = LicenseService::from_config(&config).err().unwrap();
        assert_eq!(err.code(), StatusCode::DuplicateResourceInit);
    }

    #[test]
    fn test_create_and_delete_statuses() {
        let service = service(20);
        let token = login(&service);

        let resp = create(&service, token, VIDEO, 25);
        assert_eq!(resp.status, StatusCode::Ok);
        assert_eq!(resp.granted_count, 20);

        assert_eq!(create(&service, token + 100, VIDEO, 1).status, StatusCode::ClientNotExist);
        assert_eq!(create(&service, token, 999, 1).status, StatusCode::AlgorithmNotExist);
        assert_eq!(create(&service, token, PICTURE, 1).status, StatusCode::InvalidParams);

        let released = delete(&service, token, VIDEO, 8);
        assert_eq!(released.status, StatusCode::Ok);
        assert_eq!(released.released_count, 8);
        assert_eq!(service.with_ledger(|l| l.query(token, VIDEO)), Some((20, 12)));
    }

    #[test]
    fn test_exhaustion_is_not_an_error() {
        let service = service(0);
        let token = login(&service);
        let resp = create(&service, token, VIDEO, 5);
        assert_eq!(resp.status, StatusCode::Ok);
        assert_eq!(resp.granted_count, 0);
    }

    #[test]
    fn test_heartbeat_unknown_client() {
        let service = service(10);
        let resp = service.heartbeat(&HeartbeatRequest { token: 9, usage: vec![] });
        assert_eq!(resp.status, StatusCode::ClientNotExist);
        assert!(resp.shares.is_empty());
    }

    #[test]
    fn test_query_license_is_a_stub() {
        let service = service(10);
        let resp = service.query_license(&QueryLicenseRequest::default());
        assert_eq!(resp.status, StatusCode::Ok);
    }

    #[test]
    fn test_status_serializes_as_integer() {
        let resp = CreateLicenseResponse {
            token: 3,
            algorithm_id: VIDEO,
            granted_count: 0,
            status: StatusCode::AlgorithmNotExist,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], 10004);

        let back: CreateLicenseResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, resp);

        let bad = serde_json::from_str::<QueryLicenseResponse>(r#"{"status": 42}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_picture_fair_share_for_k_clients() {
        for k in [1usize, 50, 200, 400, 1000] {
            let service = service(100_000);
            let tokens: Vec<Token> = (0..k).map(|_| login(&service)).collect();
            for token in &tokens {
                service.heartbeat(&picture_heartbeat(*token, 500));
            }

            let expected = 500.min(100_000 / k as u32);
            for token in &tokens {
                let resp = service.heartbeat(&picture_heartbeat(*token, 500));
                assert_eq!(resp.status, StatusCode::Ok);
                assert_eq!(resp.shares[0].share, expected, "k = {}", k);
            }
        }
    }

    #[test]
    fn test_concurrent_allocate_loses_no_updates() {
        let service = service(100_000);
        let tokens: Vec<Token> = (0..1000).map(|_| login(&service)).collect();

        std::thread::scope(|s| {
            for token in &tokens {
                let service = &service;
                s.spawn(move || {
                    let resp = create(service, *token, VIDEO, 10);
                    assert_eq!(resp.granted_count, 10);
                });
            }
        });

        let snapshot = service.snapshot();
        assert_eq!(snapshot.client_count, 1000);
        let pool = snapshot.pools.iter().find(|p| p.algorithm_id == VIDEO).unwrap();
        assert_eq!(pool.used, 10_000);
    }

    #[test]
    fn test_repeated_allocate_free_cycles_converge() {
        let service = service(100_000);
        let tokens: Vec<Token> = (0..1000).map(|_| login(&service)).collect();

        for _ in 0..10 {
            std::thread::scope(|s| {
                for token in &tokens {
                    let service = &service;
                    s.spawn(move || {
                        let granted = create(service, *token, VIDEO, 10).granted_count;
                        delete(service, *token, VIDEO, granted);
                    });
                }
            });
        }

        let snapshot = service.snapshot();
        let pool = snapshot.pools.iter().find(|p| p.algorithm_id == VIDEO).unwrap();
        assert_eq!(pool.used, 0);
        assert_eq!(snapshot.client_count, 1000);
    }
}
