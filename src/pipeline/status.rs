//! Observable run status.
//!
//! The status is a single value overwritten on every transition and
//! published through a `tokio::sync::watch` channel, so observers always
//! see the latest phase without queuing intermediate ones.

use crate::error::PipelineError;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Fetching,
    Analyzing,
    Deduplicating,
    Complete,
    Error,
    Cancelled,
}

impl Phase {
    /// A run is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Fetching | Phase::Analyzing | Phase::Deduplicating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Error | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Analyzing => "analyzing",
            Phase::Deduplicating => "deduplicating",
            Phase::Complete => "complete",
            Phase::Error => "error",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub phase: Phase,
    pub message: String,
    /// 0 to 100, never decreasing within a run.
    pub progress: u8,
    pub current_day: Option<NaiveDate>,
}

impl PipelineStatus {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            message: String::new(),
            progress: 0,
            current_day: None,
        }
    }
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::idle()
    }
}

/// Owner of the status value.
#[derive(Debug)]
pub struct StatusTracker {
    tx: watch::Sender<PipelineStatus>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PipelineStatus::idle());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> PipelineStatus {
        self.tx.borrow().clone()
    }

    /// Enter `fetching` for a new run.
    ///
    /// Fails with [`PipelineError::AlreadyRunning`] while another run is
    /// active. The check and the transition happen under one lock.
    pub fn begin(&self, message: impl Into<String>) -> Result<(), PipelineError> {
        let message = message.into();
        let mut busy = false;

        self.tx.send_if_modified(|status| {
            if status.phase.is_active() {
                busy = true;
                return false;
            }
            *status = PipelineStatus {
                phase: Phase::Fetching,
                message,
                progress: 0,
                current_day: None,
            };
            true
        });

        if busy {
            Err(PipelineError::AlreadyRunning)
        } else {
            Ok(())
        }
    }

    /// Publish a transition within the current run. Progress is clamped so
    /// it never goes backwards.
    pub fn update(
        &self,
        phase: Phase,
        message: impl Into<String>,
        progress: u8,
        current_day: Option<NaiveDate>,
    ) {
        let message = message.into();
        self.tx.send_modify(|status| {
            status.progress = progress.min(100).max(status.progress);
            status.phase = phase;
            status.message = message;
            status.current_day = current_day;
        });
    }

    /// Enter a terminal failure state (`error` or `cancelled`).
    pub fn fail(&self, phase: Phase, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|status| {
            status.phase = phase;
            status.message = message;
            status.current_day = None;
        });
    }

    /// Return to idle. Refused while a run is active.
    pub fn reset(&self) -> Result<(), PipelineError> {
        self.replace_when_inactive(PipelineStatus::idle())
    }

    /// Mark a report loaded from history as the current result.
    pub fn loaded(&self, message: impl Into<String>) -> Result<(), PipelineError> {
        self.replace_when_inactive(PipelineStatus {
            phase: Phase::Complete,
            message: message.into(),
            progress: 100,
            current_day: None,
        })
    }

    fn replace_when_inactive(&self, next: PipelineStatus) -> Result<(), PipelineError> {
        let mut busy = false;
        self.tx.send_if_modified(|status| {
            if status.phase.is_active() {
                busy = true;
                return false;
            }
            *status = next;
            true
        });

        if busy {
            Err(PipelineError::AlreadyRunning)
        } else {
            Ok(())
        }
    }
}
