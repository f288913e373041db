//! Restart policy for tunnel process supervision

/// Total number of process attempts per session, the first spawn included
pub const MAX_ATTEMPTS: u32 = 5;

/// Bounded, immediate restart policy
///
/// Counts crashes for one session. Each crash below the budget allows one
/// more attempt; there is no backoff between attempts.
#[derive(Debug)]
pub struct RestartPolicy {
    crashes: u32,
    max_attempts: u32,
}

impl RestartPolicy {
    pub fn new() -> Self {
        Self {
            crashes: 0,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Record a crash and decide whether to spawn again
    pub fn should_restart(&mut self) -> bool {
        self.crashes += 1;
        self.crashes < self.max_attempts
    }

    /// Number of crashes seen so far
    pub fn crashes(&self) -> u32 {
        self.crashes
    }

    /// Attempt number of the process that would be spawned next (1-based)
    pub fn next_attempt(&self) -> u32 {
        self.crashes + 1
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new()
    }
}
