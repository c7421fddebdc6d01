//! Modal lifecycle
//!
//! `Hidden -> Visible -> Closing -> Removed`, driven by the host (the wasm
//! runtime or a test harness). Each transition returns the effects the host
//! must carry out; the session itself never touches the page.

/// Delay between the page becoming ready and the modal appearing.
pub const SHOW_DELAY_MS: u32 = 500;

/// Length of the fade-out before the modal is detached.
pub const CLOSE_TRANSITION_MS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalPhase {
    Hidden,
    Visible,
    Closing,
    Removed,
}

/// User action that ends a display session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissTrigger {
    /// A product card was clicked; navigation to its URL proceeds.
    ProductClick { index: usize },
    CloseButton,
    /// Click on the backdrop outside the dialog.
    Overlay,
    Escape,
}

/// Work the host performs after a transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalEffect {
    /// Attach the modal and its listeners to the document.
    Attach,
    /// Stop the page behind the modal from scrolling.
    LockScroll,
    /// Start the fade-in on the next animation frame.
    FadeIn,
    /// Show a loading indicator while a product link navigates.
    ShowLoader,
    /// Persist `now` under the popup's storage key.
    RecordShown { storage_key: String },
    /// Remove the Escape and overlay listeners.
    DetachListeners,
    FadeOut,
    UnlockScroll,
    /// Call [`ModalSession::finish`] after the given delay.
    ScheduleRemoval { after_ms: u32 },
    /// Detach the modal element from the document.
    Remove,
}

/// One display session of one popup.
#[derive(Debug, Clone)]
pub struct ModalSession {
    storage_key: String,
    phase: ModalPhase,
    recorded: bool,
}

impl ModalSession {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            phase: ModalPhase::Hidden,
            recorded: false,
        }
    }

    pub fn phase(&self) -> ModalPhase {
        self.phase
    }

    /// Whether the display record has been written this session.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// `Hidden -> Visible`. No-op in any other phase.
    pub fn show(&mut self) -> Vec<ModalEffect> {
        if self.phase != ModalPhase::Hidden {
            return Vec::new();
        }
        self.phase = ModalPhase::Visible;
        vec![ModalEffect::Attach, ModalEffect::LockScroll, ModalEffect::FadeIn]
    }

    /// `Visible -> Closing`. Only the first trigger counts; later ones are
    /// ignored, so the display record is written exactly once.
    pub fn dismiss(&mut self, trigger: DismissTrigger) -> Vec<ModalEffect> {
        if self.phase != ModalPhase::Visible {
            return Vec::new();
        }
        self.phase = ModalPhase::Closing;

        let mut effects = Vec::with_capacity(7);
        if let DismissTrigger::ProductClick { .. } = trigger {
            effects.push(ModalEffect::ShowLoader);
        }
        if !self.recorded {
            self.recorded = true;
            effects.push(ModalEffect::RecordShown {
                storage_key: self.storage_key.clone(),
            });
        }
        effects.extend([
            ModalEffect::DetachListeners,
            ModalEffect::FadeOut,
            ModalEffect::UnlockScroll,
            ModalEffect::ScheduleRemoval {
                after_ms: CLOSE_TRANSITION_MS,
            },
        ]);
        effects
    }

    /// `Closing -> Removed`, once the fade-out has run.
    pub fn finish(&mut self) -> Vec<ModalEffect> {
        if self.phase != ModalPhase::Closing {
            return Vec::new();
        }
        self.phase = ModalPhase::Removed;
        vec![ModalEffect::Remove]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_count(effects: &[ModalEffect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, ModalEffect::RecordShown { .. }))
            .count()
    }

    #[test]
    fn test_full_lifecycle() {
        let mut session = ModalSession::new("k1");
        assert_eq!(session.phase(), ModalPhase::Hidden);

        let effects = session.show();
        assert_eq!(effects, vec![ModalEffect::Attach, ModalEffect::LockScroll, ModalEffect::FadeIn]);
        assert_eq!(session.phase(), ModalPhase::Visible);

        let effects = session.dismiss(DismissTrigger::CloseButton);
        assert_eq!(session.phase(), ModalPhase::Closing);
        assert_eq!(record_count(&effects), 1);
        assert!(effects.contains(&ModalEffect::UnlockScroll));
        assert!(effects.contains(&ModalEffect::DetachListeners));
        assert_eq!(
            effects.last(),
            Some(&ModalEffect::ScheduleRemoval { after_ms: CLOSE_TRANSITION_MS })
        );

        assert_eq!(session.finish(), vec![ModalEffect::Remove]);
        assert_eq!(session.phase(), ModalPhase::Removed);
    }

    #[test]
    fn test_records_once_across_triggers() {
        let mut session = ModalSession::new("k1");
        session.show();
        let first = session.dismiss(DismissTrigger::ProductClick { index: 0 });
        let second = session.dismiss(DismissTrigger::Escape);
        let third = session.dismiss(DismissTrigger::Overlay);

        assert_eq!(record_count(&first), 1);
        assert!(second.is_empty());
        assert!(third.is_empty());
        assert!(session.is_recorded());
    }

    #[test]
    fn test_product_click_shows_loader() {
        let mut session = ModalSession::new("k1");
        session.show();
        let effects = session.dismiss(DismissTrigger::ProductClick { index: 2 });
        assert_eq!(effects.first(), Some(&ModalEffect::ShowLoader));
        assert_eq!(
            effects[1],
            ModalEffect::RecordShown { storage_key: "k1".to_string() }
        );
    }

    #[test]
    fn test_no_transition_out_of_removed() {
        let mut session = ModalSession::new("k1");
        session.show();
        session.dismiss(DismissTrigger::Escape);
        session.finish();

        assert!(session.show().is_empty());
        assert!(session.dismiss(DismissTrigger::CloseButton).is_empty());
        assert!(session.finish().is_empty());
        assert_eq!(session.phase(), ModalPhase::Removed);
    }

    #[test]
    fn test_dismiss_before_show_is_ignored() {
        let mut session = ModalSession::new("k1");
        assert!(session.dismiss(DismissTrigger::Escape).is_empty());
        assert!(!session.is_recorded());
        assert_eq!(session.phase(), ModalPhase::Hidden);
    }
}
