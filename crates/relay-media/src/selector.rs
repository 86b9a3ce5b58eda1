//! Active-source selection
//!
//! The selector owns the single piece of cross-task state the relay needs:
//! which source kind is active, and which instance of each kind is in use.
//! Both live in one `watch` channel so an admission check and a switch can
//! never interleave into a state where two kinds are admitted at once.

use crate::lifecycle::LifecycleToken;
use crate::packet::SourceId;
use crate::registry::TrackState;
use relay_protocol::SourceKind;
use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(5);

/// How the active kind is chosen for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// One kind is always active
    Fixed(SourceKind),
    /// Cycle through kinds that have a live track
    Rotate { interval: Duration },
    /// Screen share while one is live, camera otherwise
    PreferSecondary,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::Fixed(SourceKind::Primary)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorState {
    pub active: Option<SourceKind>,
    /// Latest live instance per kind, indexed by [`SourceKind::index`]
    pub in_use: [Option<SourceId>; 2],
}

impl SelectorState {
    pub fn in_use(&self, kind: SourceKind) -> Option<SourceId> {
        self.in_use[kind.index()]
    }
}

/// Outcome of checking one inbound packet against the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Source is not active; discard the packet
    Drop,
    /// First admitted packet after a pause; the receiver needs a key frame
    Resume,
    /// Source was already streaming
    Forward,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        !matches!(self, Admission::Drop)
    }
}

pub struct ActiveSourceSelector {
    policy: SelectionPolicy,
    state: watch::Sender<SelectorState>,
}

impl ActiveSourceSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        let active = match policy {
            SelectionPolicy::Fixed(kind) => kind,
            SelectionPolicy::Rotate { .. } | SelectionPolicy::PreferSecondary => SourceKind::Primary,
        };
        let (state, _rx) = watch::channel(SelectorState {
            active: Some(active),
            in_use: [None, None],
        });
        Self { policy, state }
    }

    pub fn active(&self) -> Option<SourceKind> {
        self.state.borrow().active
    }

    pub fn snapshot(&self) -> SelectorState {
        self.state.borrow().clone()
    }

    /// Make `kind` the active kind. Returns the previously active kind.
    pub fn select(&self, kind: Option<SourceKind>) -> Option<SourceKind> {
        let mut previous = None;
        let changed = self.state.send_if_modified(|state| {
            previous = state.active;
            if state.active == kind {
                return false;
            }
            state.active = kind;
            true
        });

        if changed {
            tracing::info!(
                previous = ?previous,
                active = ?kind,
                "Active source kind changed"
            );
        }

        previous
    }

    /// Whether packets of `track` are currently admitted
    pub fn is_active(&self, track: &TrackState) -> bool {
        let state = self.state.borrow();
        state.active == Some(track.kind()) && state.in_use(track.kind()) == Some(track.source())
    }

    /// Check one packet of `track` and update the track's streaming flag
    pub fn admit(&self, track: &mut TrackState) -> Admission {
        let active = self.is_active(track);
        let was_streaming = track.is_streaming();
        track.set_streaming(active);

        match (active, was_streaming) {
            (false, _) => Admission::Drop,
            (true, false) => Admission::Resume,
            (true, true) => Admission::Forward,
        }
    }

    pub fn is_live(&self, kind: SourceKind) -> bool {
        self.state.borrow().in_use(kind).is_some()
    }

    /// Record which instance of `kind` is in use, `None` when no live one remains
    pub fn set_in_use(&self, kind: SourceKind, source: Option<SourceId>) {
        self.state.send_if_modified(|state| {
            let slot = &mut state.in_use[kind.index()];
            if *slot == source {
                return false;
            }
            *slot = source;
            true
        });

        if self.policy == SelectionPolicy::PreferSecondary {
            let preferred = if self.is_live(SourceKind::Secondary) {
                SourceKind::Secondary
            } else {
                SourceKind::Primary
            };
            self.select(Some(preferred));
        }
    }

    /// Advance to the next kind with a live track. Kinds without one are
    /// skipped; with nothing live the active kind is left alone.
    pub fn rotate(&self) -> Option<SourceKind> {
        let (current, next) = {
            let state = self.state.borrow();
            let current = state.active;
            let start = current.unwrap_or(SourceKind::Secondary);
            let mut candidate = start.next();
            let mut next = None;
            for _ in 0..SourceKind::ALL.len() {
                if state.in_use(candidate).is_some() {
                    next = Some(candidate);
                    break;
                }
                candidate = candidate.next();
            }
            (current, next)
        };

        match next {
            Some(kind) => {
                self.select(Some(kind));
                Some(kind)
            }
            None => current,
        }
    }

    /// Rotation timer for [`SelectionPolicy::Rotate`]; returns immediately for
    /// other policies.
    pub async fn run_rotation(&self, mut token: LifecycleToken) {
        let SelectionPolicy::Rotate { interval } = self.policy else {
            return;
        };

        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let active = self.rotate();
                    tracing::debug!(active = ?active, "Rotation tick");
                }
            }
        }

        tracing::debug!("Rotation timer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;
    use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

    fn track(kind: SourceKind, id: u64) -> TrackState {
        TrackState::new(kind, SourceId(id), id as usize, RTPCodecType::Video, 1000 + id as u32)
    }

    #[test]
    fn test_fixed_policy_admits_only_pinned_kind() {
        let selector = ActiveSourceSelector::new(SelectionPolicy::Fixed(SourceKind::Primary));
        let mut camera = track(SourceKind::Primary, 1);
        let mut screen = track(SourceKind::Secondary, 2);
        selector.set_in_use(SourceKind::Primary, Some(camera.source()));
        selector.set_in_use(SourceKind::Secondary, Some(screen.source()));

        assert_eq!(selector.admit(&mut camera), Admission::Resume);
        assert_eq!(selector.admit(&mut camera), Admission::Forward);
        assert_eq!(selector.admit(&mut screen), Admission::Drop);
        assert!(!screen.is_streaming());
    }

    #[test]
    fn test_switch_flips_on_next_check() {
        let selector = ActiveSourceSelector::new(SelectionPolicy::Fixed(SourceKind::Primary));
        let camera = track(SourceKind::Primary, 1);
        let screen = track(SourceKind::Secondary, 2);
        selector.set_in_use(SourceKind::Primary, Some(camera.source()));
        selector.set_in_use(SourceKind::Secondary, Some(screen.source()));

        assert!(selector.is_active(&camera));
        assert!(!selector.is_active(&screen));

        assert_eq!(selector.select(Some(SourceKind::Secondary)), Some(SourceKind::Primary));

        assert!(!selector.is_active(&camera));
        assert!(selector.is_active(&screen));
    }

    #[test]
    fn test_superseded_instance_is_not_admitted() {
        let selector = ActiveSourceSelector::new(SelectionPolicy::Fixed(SourceKind::Primary));
        let mut stale = track(SourceKind::Primary, 1);
        let mut fresh = track(SourceKind::Primary, 3);
        selector.set_in_use(SourceKind::Primary, Some(stale.source()));
        assert_eq!(selector.admit(&mut stale), Admission::Resume);

        selector.set_in_use(SourceKind::Primary, Some(fresh.source()));
        assert_eq!(selector.admit(&mut stale), Admission::Drop);
        assert_eq!(selector.admit(&mut fresh), Admission::Resume);
    }

    #[test]
    fn test_rotation_skips_kinds_without_live_track() {
        let selector = ActiveSourceSelector::new(SelectionPolicy::Rotate {
            interval: DEFAULT_ROTATION_INTERVAL,
        });
        selector.set_in_use(SourceKind::Primary, Some(SourceId(1)));

        assert_eq!(selector.rotate(), Some(SourceKind::Primary));

        selector.set_in_use(SourceKind::Secondary, Some(SourceId(2)));
        assert_eq!(selector.rotate(), Some(SourceKind::Secondary));
        assert_eq!(selector.rotate(), Some(SourceKind::Primary));

        selector.set_in_use(SourceKind::Primary, None);
        selector.set_in_use(SourceKind::Secondary, None);
        assert_eq!(selector.rotate(), Some(SourceKind::Primary));
    }

    #[test]
    fn test_prefer_secondary_follows_screen_liveness() {
        let selector = ActiveSourceSelector::new(SelectionPolicy::PreferSecondary);
        selector.set_in_use(SourceKind::Primary, Some(SourceId(1)));
        assert_eq!(selector.active(), Some(SourceKind::Primary));

        selector.set_in_use(SourceKind::Secondary, Some(SourceId(2)));
        assert_eq!(selector.active(), Some(SourceKind::Secondary));

        selector.set_in_use(SourceKind::Secondary, None);
        assert_eq!(selector.active(), Some(SourceKind::Primary));
    }

    #[test]
    fn test_interleaved_switches_never_admit_both_kinds() {
        let selector = ActiveSourceSelector::new(SelectionPolicy::Fixed(SourceKind::Primary));
        let camera = track(SourceKind::Primary, 1);
        let screen = track(SourceKind::Secondary, 2);
        selector.set_in_use(SourceKind::Primary, Some(camera.source()));
        selector.set_in_use(SourceKind::Secondary, Some(screen.source()));

        for step in 0..64 {
            let kind = if step % 2 == 0 {
                SourceKind::Secondary
            } else {
                SourceKind::Primary
            };
            selector.select(Some(kind));
            let camera_active = selector.is_active(&camera);
            let screen_active = selector.is_active(&screen);
            assert!(camera_active ^ screen_active);
            assert_eq!(screen_active, kind == SourceKind::Secondary);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_timer_switches_each_interval() {
        let interval = Duration::from_secs(5);
        let selector = std::sync::Arc::new(ActiveSourceSelector::new(SelectionPolicy::Rotate {
            interval,
        }));
        selector.set_in_use(SourceKind::Primary, Some(SourceId(1)));
        selector.set_in_use(SourceKind::Secondary, Some(SourceId(2)));

        let lifecycle = Lifecycle::new();
        let task = {
            let selector = selector.clone();
            let token = lifecycle.token();
            tokio::spawn(async move { selector.run_rotation(token).await })
        };

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(selector.active(), Some(SourceKind::Secondary));

        tokio::time::sleep(interval).await;
        assert_eq!(selector.active(), Some(SourceKind::Primary));

        lifecycle.cancel();
        task.await.unwrap();
    }
}
