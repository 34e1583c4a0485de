#[cfg(test)]
mod tests {
    use crate::eviction::{EvictionPolicy, SweepVerdict};
    use crate::types::{ClientLease, LeaseState};
    use std::time::Duration;

    #[test]
    fn test_default_policy_constants() {
        let policy = EvictionPolicy::default();
        assert_eq!(policy.heartbeat_timeout_ms, 30_000);
        assert_eq!(policy.miss_threshold, 3);
    }

    #[test]
    fn test_overdue_only_past_timeout() {
        let policy = EvictionPolicy::new(Duration::from_millis(500), 3);
        let lease = ClientLease::new(1, 1000);

        assert!(!policy.is_overdue(&lease, 1000));
        assert!(!policy.is_overdue(&lease, 1500));
        assert!(policy.is_overdue(&lease, 1501));
        // Clock skew backwards is never overdue
        assert!(!policy.is_overdue(&lease, 10));
    }

    #[test]
    fn test_judge_walks_active_degraded_expired() {
        let policy = EvictionPolicy::new(Duration::from_millis(500), 3);
        let mut lease = ClientLease::new(1, 0);
        assert_eq!(policy.state_of(&lease), LeaseState::Active);

        assert_eq!(policy.judge(&mut lease, 100), SweepVerdict::Alive);
        assert_eq!(policy.judge(&mut lease, 600), SweepVerdict::Missed { missed: 1 });
        assert_eq!(policy.state_of(&lease), LeaseState::Degraded);
        assert_eq!(policy.judge(&mut lease, 1200), SweepVerdict::Missed { missed: 2 });
        assert_eq!(policy.judge(&mut lease, 1800), SweepVerdict::Expired);
        assert_eq!(policy.state_of(&lease), LeaseState::Expired);
    }

    #[test]
    fn test_touch_returns_to_active() {
        let policy = EvictionPolicy::new(Duration::from_millis(500), 3);
        let mut lease = ClientLease::new(1, 0);
        policy.judge(&mut lease, 600);
        policy.judge(&mut lease, 1200);

        lease.touch(1300);
        assert_eq!(policy.state_of(&lease), LeaseState::Active);
        assert_eq!(policy.judge(&mut lease, 1700), SweepVerdict::Alive);
    }

    #[test]
    fn test_zero_threshold_is_raised_to_one() {
        let policy = EvictionPolicy::new(Duration::from_millis(10), 0);
        let mut lease = ClientLease::new(1, 0);
        assert_eq!(policy.miss_threshold, 1);
        assert_eq!(policy.judge(&mut lease, 11), SweepVerdict::Expired);
    }
}
