//! GOOSE retransmission scheduling.
//!
//! Each binding watches an ordered dataset of MMS paths. A change in any
//! entry starts a burst: one immediate transmission, then `burst_count`
//! retransmissions spaced `min_time` apart, then a heartbeat every
//! `max_time` until the next change. The scheduler only computes frames and
//! due times; the engine publishes them and owns the clock.

#![allow(missing_docs)]

use std::time::Duration;

use smol_str::SmolStr;

use crate::error::ConfigError;
use crate::traffic::GooseFrameInfo;

/// Retransmissions at `min_time` spacing before the heartbeat phase.
pub const DEFAULT_BURST_COUNT: u32 = 4;

/// Publisher parameters of one GOOSE control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GooseConfig {
    pub app_id: SmolStr,
    pub conf_rev: u32,
    pub min_time: Duration,
    pub max_time: Duration,
}

impl GooseConfig {
    #[must_use]
    pub fn new(app_id: impl Into<SmolStr>, conf_rev: u32, min_time_ms: u64, max_time_ms: u64) -> Self {
        Self {
            app_id: app_id.into(),
            conf_rev,
            min_time: Duration::from_millis(min_time_ms),
            max_time: Duration::from_millis(max_time_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_time.is_zero() {
            return Err(ConfigError::invalid(
                "goose.min_time_ms",
                format!("{}: must be greater than zero", self.app_id),
            ));
        }
        if self.min_time > self.max_time {
            return Err(ConfigError::invalid(
                "goose.min_time_ms",
                format!(
                    "{}: min_time_ms ({}) exceeds max_time_ms ({})",
                    self.app_id,
                    self.min_time.as_millis(),
                    self.max_time.as_millis()
                ),
            ));
        }
        Ok(())
    }
}

/// Retransmission phase of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoosePhase {
    /// No change observed since registration.
    Idle,
    /// Fast retransmissions still to send.
    Burst { remaining: u32 },
    /// Heartbeat at `max_time`.
    Steady,
}

/// A registered publisher and its dataset.
#[derive(Debug, Clone)]
pub struct GooseBinding {
    pub owner: SmolStr,
    pub publisher: SmolStr,
    pub config: GooseConfig,
    pub entries: Vec<SmolStr>,
    pub phase: GoosePhase,
    pub st_num: u32,
    pub sq_num: u32,
    pub next_due: Option<Duration>,
}

impl GooseBinding {
    fn frame(&self, at: Duration) -> GooseFrame {
        GooseFrame {
            owner: self.owner.clone(),
            publisher: self.publisher.clone(),
            at,
            info: GooseFrameInfo {
                app_id: self.config.app_id.clone(),
                conf_rev: self.config.conf_rev,
                st_num: self.st_num,
                sq_num: self.sq_num,
            },
        }
    }
}

/// One transmission to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GooseFrame {
    pub owner: SmolStr,
    pub publisher: SmolStr,
    pub at: Duration,
    pub info: GooseFrameInfo,
}

/// All GOOSE bindings of one engine.
#[derive(Debug, Clone)]
pub struct GooseScheduler {
    bindings: Vec<GooseBinding>,
    burst_count: u32,
}

impl GooseScheduler {
    #[must_use]
    pub fn new(burst_count: u32) -> Self {
        Self {
            bindings: Vec::new(),
            burst_count,
        }
    }

    /// Adds a binding owned by `owner`. Re-registering a publisher replaces
    /// its binding in place and resets its counters.
    pub fn register(
        &mut self,
        owner: &str,
        publisher: &str,
        config: GooseConfig,
        entries: Vec<SmolStr>,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        let binding = GooseBinding {
            owner: SmolStr::new(owner),
            publisher: SmolStr::new(publisher),
            config,
            entries,
            phase: GoosePhase::Idle,
            st_num: 1,
            sq_num: 0,
            next_due: None,
        };
        tracing::debug!(owner, publisher, "goose binding registered");
        match self
            .bindings
            .iter_mut()
            .find(|existing| existing.publisher == publisher)
        {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
        Ok(())
    }

    /// Drops every binding owned by `owner`, cancelling its timers.
    pub fn unregister_device(&mut self, owner: &str) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|binding| binding.owner != owner);
        before - self.bindings.len()
    }

    /// Clears all bindings.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// `true` if any binding's dataset contains `path`.
    #[must_use]
    pub fn monitors(&self, path: &str) -> bool {
        self.bindings
            .iter()
            .any(|binding| binding.entries.iter().any(|entry| entry == path))
    }

    /// Reacts to a changed dataset value at `now`: every binding watching
    /// `path` restarts its burst and transmits immediately.
    pub fn on_change(&mut self, path: &str, now: Duration) -> Vec<GooseFrame> {
        let burst_count = self.burst_count;
        let mut frames = Vec::new();
        for binding in &mut self.bindings {
            if !binding.entries.iter().any(|entry| entry == path) {
                continue;
            }
            if binding.phase != GoosePhase::Idle {
                binding.st_num = binding.st_num.wrapping_add(1);
            }
            binding.sq_num = 0;
            if burst_count == 0 {
                binding.phase = GoosePhase::Steady;
                binding.next_due = Some(now + binding.config.max_time);
            } else {
                binding.phase = GoosePhase::Burst {
                    remaining: burst_count,
                };
                binding.next_due = Some(now + binding.config.min_time);
            }
            tracing::debug!(
                publisher = %binding.publisher,
                st_num = binding.st_num,
                "goose burst started"
            );
            frames.push(binding.frame(now));
        }
        frames
    }

    /// Earliest pending retransmission.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.bindings.iter().filter_map(|binding| binding.next_due).min()
    }

    /// Emits every retransmission due at or before `now`, in registration
    /// order. Each binding fires at most once per call; callers step through
    /// time with [`GooseScheduler::next_due`].
    pub fn fire_due(&mut self, now: Duration) -> Vec<GooseFrame> {
        let mut frames = Vec::new();
        for binding in &mut self.bindings {
            let Some(due) = binding.next_due else {
                continue;
            };
            if due > now {
                continue;
            }
            binding.sq_num = binding.sq_num.wrapping_add(1);
            frames.push(binding.frame(due));
            let (phase, interval) = match binding.phase {
                GoosePhase::Burst { remaining } if remaining > 1 => (
                    GoosePhase::Burst {
                        remaining: remaining - 1,
                    },
                    binding.config.min_time,
                ),
                _ => (GoosePhase::Steady, binding.config.max_time),
            };
            if phase == GoosePhase::Steady && binding.phase != GoosePhase::Steady {
                tracing::debug!(publisher = %binding.publisher, "goose steady state");
            }
            binding.phase = phase;
            binding.next_due = Some(due + interval);
        }
        frames
    }

    #[must_use]
    pub fn bindings(&self) -> &[GooseBinding] {
        &self.bindings
    }

    #[must_use]
    pub fn binding(&self, publisher: &str) -> Option<&GooseBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.publisher == publisher)
    }
}
