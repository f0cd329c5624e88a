use std::time::Duration;

/// Brute-force protection knobs for `LoginAttemptGuard`.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub attempt_window: Duration,
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        LockoutPolicy {
            enabled: true,
            max_attempts: 5,
            attempt_window: Duration::from_secs(15 * 60),
            lockout_duration: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RevocationPolicy {
    pub enabled: bool,
    /// TTL applied to every JTI blacklisted by a revoke-all. Must cover the
    /// longest token lifetime the codec issues.
    pub revoke_all_ttl: Duration,
}

impl RevocationPolicy {
    pub fn covering(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        RevocationPolicy {
            enabled: true,
            revoke_all_ttl: access_ttl.max(refresh_ttl),
        }
    }
}

impl Default for RevocationPolicy {
    fn default() -> Self {
        RevocationPolicy::covering(Duration::from_secs(15 * 60), Duration::from_secs(2 * 60 * 60))
    }
}

#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    pub enabled: bool,
    pub token_ttl: Duration,
    pub resend_cooldown: Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        VerificationPolicy {
            enabled: true,
            token_ttl: Duration::from_secs(24 * 60 * 60),
            resend_cooldown: Duration::from_secs(60),
        }
    }
}
