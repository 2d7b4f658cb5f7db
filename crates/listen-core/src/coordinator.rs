//! Exclusive-playback coordinator.
//!
//! An app embedding several players (live sessions, on-demand tracks) must
//! never play two at once. Each player registers a pause hook; asking to
//! play pauses whichever player currently holds the slot.

use tracing::debug;

/// Opaque handle identifying a registered player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(u64);

type PauseHook = Box<dyn FnMut()>;

#[derive(Default)]
pub struct NowPlaying {
    next_id: u64,
    players: Vec<(PlayerId, PauseHook)>,
    active: Option<PlayerId>,
}

impl NowPlaying {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player. `on_pause` is invoked when another player takes
    /// over the slot.
    pub fn register(&mut self, on_pause: impl FnMut() + 'static) -> PlayerId {
        let id = PlayerId(self.next_id);
        self.next_id += 1;
        self.players.push((id, Box::new(on_pause)));
        id
    }

    /// Remove a player, releasing the slot if it held it.
    pub fn unregister(&mut self, id: PlayerId) {
        self.players.retain(|(pid, _)| *pid != id);
        if self.active == Some(id) {
            self.active = None;
        }
    }

    /// Claim the playback slot, pausing the previous holder.
    pub fn request_play(&mut self, id: PlayerId) {
        if self.active == Some(id) {
            return;
        }
        if let Some(previous) = self.active {
            debug!(?previous, ?id, "pausing previous player");
            if let Some((_, on_pause)) = self.players.iter_mut().find(|(pid, _)| *pid == previous) {
                on_pause();
            }
        }
        self.active = Some(id);
    }

    /// Release the slot if `id` holds it (player stopped or ended).
    pub fn notify_stopped(&mut self, id: PlayerId) {
        if self.active == Some(id) {
            self.active = None;
        }
    }

    pub fn active(&self) -> Option<PlayerId> {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counter() -> (Rc<RefCell<u32>>, impl FnMut() + 'static) {
        let count = Rc::new(RefCell::new(0u32));
        let inner = count.clone();
        (count, move || *inner.borrow_mut() += 1)
    }

    #[test]
    fn second_player_pauses_first() {
        let mut np = NowPlaying::new();
        let (paused_a, hook_a) = counter();
        let (paused_b, hook_b) = counter();
        let a = np.register(hook_a);
        let b = np.register(hook_b);

        np.request_play(a);
        assert_eq!(*paused_a.borrow(), 0);

        np.request_play(b);
        assert_eq!(*paused_a.borrow(), 1);
        assert_eq!(*paused_b.borrow(), 0);
        assert_eq!(np.active(), Some(b));
    }

    #[test]
    fn replaying_the_active_player_is_a_no_op() {
        let mut np = NowPlaying::new();
        let (paused, hook) = counter();
        let a = np.register(hook);

        np.request_play(a);
        np.request_play(a);
        assert_eq!(*paused.borrow(), 0);
        assert_eq!(np.active(), Some(a));
    }

    #[test]
    fn stopping_releases_the_slot() {
        let mut np = NowPlaying::new();
        let (paused_a, hook_a) = counter();
        let a = np.register(hook_a);
        let b = np.register(|| {});

        np.request_play(a);
        np.notify_stopped(a);
        assert_eq!(np.active(), None);

        // Nobody to pause once the slot is free.
        np.request_play(b);
        assert_eq!(*paused_a.borrow(), 0);
    }

    #[test]
    fn unregistering_the_active_player_clears_the_slot() {
        let mut np = NowPlaying::new();
        let a = np.register(|| {});
        np.request_play(a);
        np.unregister(a);
        assert_eq!(np.active(), None);
    }
}
