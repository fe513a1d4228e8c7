//! Keepalive and dead peer detection scheduling.
//!
//! [`keepalive_action`] is a pure decision over the timers, the current
//! time and the host's timeout hint. It never sends anything itself.

use std::time::{Duration, Instant};

/// How sessions are rekeyed, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RekeyMethod {
    /// Never rekey.
    #[default]
    None,
    /// Rekey by renegotiating the session over the primary transport.
    NewTunnel,
    /// Rekey in-band over the existing tunnel.
    Ssl,
}

/// The one thing the scheduler wants done this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Session keys are due for renegotiation.
    Rekey,
    /// Nothing received for two DPD intervals; the peer is gone.
    DeadPeer,
    /// Nothing received for a DPD interval; send a probe.
    DeadPeerDetectionProbe,
    /// Nothing sent for a keepalive interval.
    Keepalive,
    /// Nothing to do.
    None,
}

/// Liveness timers for the datagram path.
///
/// A zero interval disables the corresponding check.
#[derive(Debug, Clone)]
pub struct KeepaliveTimers {
    /// Dead peer detection interval.
    pub dpd: Duration,
    /// Keepalive interval.
    pub keepalive: Duration,
    /// Rekey interval.
    pub rekey: Duration,
    /// Rekey method; [`RekeyMethod::None`] disables rekey checks.
    pub rekey_method: RekeyMethod,
    /// Last time keys were negotiated.
    pub last_rekey: Instant,
    /// Last time an authenticated packet was received.
    pub last_rx: Instant,
    /// Last time a packet was sent.
    pub last_tx: Instant,
    /// Last time a DPD probe was sent.
    pub last_dpd: Instant,
}

impl KeepaliveTimers {
    /// Timers with every check disabled, all timestamps at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            dpd: Duration::ZERO,
            keepalive: Duration::ZERO,
            rekey: Duration::ZERO,
            rekey_method: RekeyMethod::None,
            last_rekey: now,
            last_rx: now,
            last_tx: now,
            last_dpd: now,
        }
    }
}

impl Default for KeepaliveTimers {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

/// Check whether `due` has passed.
///
/// If not, shrink `timeout` so the host wakes up by `due`.
pub fn check_deadline(timeout: &mut Duration, now: Instant, due: Instant) -> bool {
    if now >= due {
        return true;
    }
    let remaining = due - now;
    if *timeout > remaining {
        *timeout = remaining;
    }
    false
}

/// Check whether `base + interval` has passed.
///
/// A deadline too far out for [`Instant`] to represent is never due and
/// leaves `timeout` alone.
pub fn check_deadline_after(
    timeout: &mut Duration,
    now: Instant,
    base: Instant,
    interval: Duration,
) -> bool {
    base.checked_add(interval)
        .is_some_and(|due| check_deadline(timeout, now, due))
}

/// Decide the keepalive action for this pass.
///
/// Checks run in priority order: rekey, dead peer, DPD probe, keepalive.
/// A DPD probe records `last_dpd = now`; nothing else is mutated apart from
/// the timeout hint.
pub fn keepalive_action(
    timers: &mut KeepaliveTimers,
    timeout: &mut Duration,
    now: Instant,
) -> KeepaliveAction {
    if timers.rekey_method != RekeyMethod::None
        && !timers.rekey.is_zero()
        && check_deadline_after(timeout, now, timers.last_rekey, timers.rekey)
    {
        return KeepaliveAction::Rekey;
    }

    // DPD is bidirectional: any received packet proves liveness
    if !timers.dpd.is_zero() {
        let overdue = timers
            .dpd
            .checked_mul(2)
            .and_then(|limit| timers.last_rx.checked_add(limit));
        if overdue.is_some_and(|overdue| now > overdue) {
            return KeepaliveAction::DeadPeer;
        }

        // A probe is already outstanding; repeat it, but only every half
        // interval
        let (base, interval) = if timers.last_dpd > timers.last_rx {
            (timers.last_dpd, timers.dpd / 2)
        } else {
            (timers.last_rx, timers.dpd)
        };

        if check_deadline_after(timeout, now, base, interval) {
            timers.last_dpd = now;
            return KeepaliveAction::DeadPeerDetectionProbe;
        }
    }

    // Keepalives only keep NAT mappings alive
    if !timers.keepalive.is_zero()
        && check_deadline_after(timeout, now, timers.last_tx, timers.keepalive)
    {
        return KeepaliveAction::Keepalive;
    }

    KeepaliveAction::None
}
