use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Where a user-activity event originated. Interaction with the warning
/// dialog itself must never extend the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySource {
    Page,
    WarningDialog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Warning,
    Expired,
}

/// Side effect the host must perform after a transition. `Expire` carries
/// the cleanup obligation: drop tokens, cached user data and cached domain
/// data, then return to the login surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEffect {
    ShowWarning,
    Expire,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    /// Idle time in ACTIVE before the warning appears.
    pub idle_after: Duration,
    /// Length of the WARNING countdown.
    pub countdown: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            idle_after: Duration::from_secs(15 * 60),
            countdown: Duration::from_secs(60),
        }
    }
}

/// Idle-session monitor: ACTIVE → WARNING → EXPIRED, with WARNING → ACTIVE
/// only through an explicit stay-logged-in confirmation.
///
/// The machine owns no timers. The host drives it by calling `tick` with
/// the current instant from a single logical clock; arming the countdown
/// replaces any previous deadline, so two competing countdowns cannot
/// exist. Dropping the monitor cancels everything; there is nothing to leak.
#[derive(Debug)]
pub struct SessionTimeoutMonitor {
    policy: TimeoutPolicy,
    state: SessionState,
    last_activity: Instant,
    warning_deadline: Option<Instant>,
    expire_delivered: bool,
}

impl SessionTimeoutMonitor {
    pub fn new(policy: TimeoutPolicy, now: Instant) -> Self {
        Self {
            policy,
            state: SessionState::Active,
            last_activity: now,
            warning_deadline: None,
            expire_delivered: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registers user activity. Resets the idle clock only while ACTIVE:
    /// in WARNING, dialog interaction must not silently extend the session
    /// and outside activity is ignored while the dialog is up; the only
    /// way back is `confirm_stay_logged_in`.
    pub fn record_activity(&mut self, source: ActivitySource, now: Instant) {
        match self.state {
            SessionState::Active => {
                self.last_activity = now;
            }
            SessionState::Warning => {
                debug!(?source, "Activity ignored while warning is shown");
            }
            SessionState::Expired => {}
        }
    }

    /// Advances the machine to `now`, returning the effect the host must
    /// apply, if any. The Expire effect is delivered at most once even if
    /// a late tick races `force_expire`.
    pub fn tick(&mut self, now: Instant) -> Option<MonitorEffect> {
        match self.state {
            SessionState::Active => {
                if now.duration_since(self.last_activity) >= self.policy.idle_after {
                    info!("Idle threshold reached, showing session warning");
                    self.state = SessionState::Warning;
                    self.warning_deadline = Some(now + self.policy.countdown);
                    Some(MonitorEffect::ShowWarning)
                } else {
                    None
                }
            }
            SessionState::Warning => match self.warning_deadline {
                Some(deadline) if now >= deadline => self.expire(),
                _ => None,
            },
            SessionState::Expired => None,
        }
    }

    /// The explicit "stay logged in" action: dismisses the warning and
    /// restarts the idle clock.
    pub fn confirm_stay_logged_in(&mut self, now: Instant) {
        if self.state == SessionState::Warning {
            info!("User confirmed, session stays active");
            self.state = SessionState::Active;
            self.warning_deadline = None;
            self.last_activity = now;
        }
    }

    /// Immediate logout, from the dialog or the host tearing the session
    /// down. Idempotent: the Expire effect fires at most once.
    pub fn force_expire(&mut self) -> Option<MonitorEffect> {
        self.expire()
    }

    /// Countdown left while the warning is shown, for display.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.warning_deadline) {
            (SessionState::Warning, Some(deadline)) => {
                Some(deadline.saturating_duration_since(now))
            }
            _ => None,
        }
    }

    fn expire(&mut self) -> Option<MonitorEffect> {
        self.state = SessionState::Expired;
        self.warning_deadline = None;

        if self.expire_delivered {
            debug!("Expire already delivered, ignoring");
            return None;
        }

        info!("Session expired, forcing logout");
        self.expire_delivered = true;
        Some(MonitorEffect::Expire)
    }
}
