//! Trackpad controller.
//!
//! Owns the [`GestureEngine`] and the [`ComboBuffer`] and forwards everything
//! they produce to a [`MessageSink`].  The controller never sleeps: the
//! caller reads [`Trackpad::release_deadline`], waits on its own clock, and
//! calls [`Trackpad::fire_release`] with the timer's token.

use std::time::Instant;

use tracing::debug;

use padlink_core::{
    ClientMessage, ComboBuffer, ComboOutcome, ComboState, ContactId, ContactSample,
    GestureConfig, GestureEngine, Intent, ReleaseTimer,
};

use super::input_script::InputEvent;

/// Outbound side of the controller.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink {
    /// Queues `msg` for the host.  Returns `false` when it was dropped.
    fn send(&self, msg: &ClientMessage) -> bool;
}

pub struct Trackpad<S: MessageSink> {
    engine: GestureEngine,
    combo: ComboBuffer,
    sink: S,
}

impl<S: MessageSink> Trackpad<S> {
    pub fn new(config: GestureConfig, sink: S) -> Self {
        Self {
            engine: GestureEngine::new(config),
            combo: ComboBuffer::new(),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn combo_state(&self) -> ComboState {
        self.combo.state()
    }

    pub fn set_gesture_config(&mut self, config: GestureConfig) {
        self.engine.set_config(config);
    }

    pub fn set_scroll_mode(&mut self, enabled: bool) {
        self.engine.set_scroll_mode(enabled);
    }

    // ── Touch ─────────────────────────────────────────────────────────────

    pub fn contacts_down(&mut self, samples: &[ContactSample], at: Instant) {
        self.engine.on_contacts_down(samples, at);
    }

    pub fn contacts_move(&mut self, samples: &[ContactSample], at: Instant) {
        let intents = self.engine.on_contacts_move(samples, at);
        self.emit(intents);
    }

    pub fn contacts_up(&mut self, ids: &[ContactId], at: Instant) {
        let intents = self.engine.on_contacts_up(ids, at);
        self.emit(intents);
    }

    /// The armed deferred-release timer, if a left tap is waiting to release.
    pub fn release_deadline(&self) -> Option<ReleaseTimer> {
        self.engine.pending_release()
    }

    pub fn fire_release(&mut self, token: u64) {
        let intents = self.engine.on_release_timer(token);
        self.emit(intents);
    }

    // ── Keyboard ──────────────────────────────────────────────────────────

    /// Routes a key through the combo buffer.
    ///
    /// `enter` always goes straight to the host.  `escape` while a modifier
    /// is armed cancels the recording instead of being recorded.
    pub fn key(&mut self, name: &str) {
        if name.eq_ignore_ascii_case("enter") {
            self.emit(vec![Intent::Key { name: "enter".to_string() }]);
            return;
        }
        if name.eq_ignore_ascii_case("escape") && self.combo.state() != ComboState::Release {
            self.combo.escape();
            debug!("modifier cancelled");
            return;
        }
        match self.combo.handle_key(name) {
            ComboOutcome::PassThrough => self.emit(vec![Intent::Key { name: name.to_string() }]),
            ComboOutcome::Recorded => debug!("combo buffer: {}", self.combo.label()),
            ComboOutcome::Fire(intent) => self.emit(vec![intent]),
        }
    }

    pub fn text(&mut self, value: &str) {
        if !value.is_empty() {
            self.emit(vec![Intent::Text { value: value.to_string() }]);
        }
    }

    pub fn toggle_modifier(&mut self) -> ComboState {
        let state = self.combo.toggle();
        debug!("modifier state: {state:?}");
        state
    }

    pub fn escape(&mut self) {
        self.combo.escape();
    }

    // ── Clipboard ─────────────────────────────────────────────────────────

    pub fn copy(&self) {
        self.sink.send(&ClientMessage::Copy);
    }

    pub fn paste(&self, text: Option<String>) {
        self.sink.send(&ClientMessage::Paste { text });
    }

    /// Applies one scripted event at time `at`.
    pub fn apply(&mut self, event: InputEvent, at: Instant) {
        match event {
            InputEvent::Down { contacts } => self.contacts_down(&contacts, at),
            InputEvent::Move { contacts } => self.contacts_move(&contacts, at),
            InputEvent::Up { ids } => self.contacts_up(&ids, at),
            InputEvent::Key { name } => self.key(&name),
            InputEvent::Text { value } => self.text(&value),
            InputEvent::Modifier => {
                self.toggle_modifier();
            }
            InputEvent::Escape => self.escape(),
            InputEvent::ScrollMode { enabled } => self.set_scroll_mode(enabled),
            InputEvent::Copy => self.copy(),
            InputEvent::Paste { text } => self.paste(text),
        }
    }

    fn emit(&self, intents: Vec<Intent>) {
        for intent in intents {
            let kind = intent.kind();
            if !self.sink.send(&ClientMessage::from(intent)) {
                debug!("dropped {kind} intent: link not open");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use mockall::Sequence;
    use padlink_core::MouseButton;

    use super::*;

    #[derive(Default)]
    struct Captured(RefCell<Vec<ClientMessage>>);

    impl MessageSink for Captured {
        fn send(&self, msg: &ClientMessage) -> bool {
            self.0.borrow_mut().push(msg.clone());
            true
        }
    }

    fn sent(pad: &Trackpad<Captured>) -> Vec<ClientMessage> {
        pad.sink().0.borrow().clone()
    }

    fn click(button: MouseButton, press: bool) -> ClientMessage {
        ClientMessage::Click { button, press }
    }

    #[test]
    fn test_tap_presses_then_releases_when_timer_fires() {
        // Arrange
        let t0 = Instant::now();
        let mut sink = MockMessageSink::new();
        let mut seq = Sequence::new();
        sink.expect_send()
            .withf(|m| *m == click(MouseButton::Left, true))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        sink.expect_send()
            .withf(|m| *m == click(MouseButton::Left, false))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        let mut pad = Trackpad::new(GestureConfig::default(), sink);

        // Act
        pad.apply(InputEvent::Down { contacts: vec![ContactSample::new(1, 10.0, 10.0)] }, t0);
        pad.apply(InputEvent::Up { ids: vec![1] }, t0 + Duration::from_millis(50));
        let timer = pad.release_deadline().unwrap();
        pad.fire_release(timer.token);

        // Assert
        assert_eq!(timer.deadline, t0 + Duration::from_millis(300));
        assert!(pad.release_deadline().is_none());
    }

    #[test]
    fn test_stale_release_token_sends_nothing() {
        // Arrange
        let t0 = Instant::now();
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.contacts_down(&[ContactSample::new(1, 0.0, 0.0)], t0);
        pad.contacts_up(&[1], t0 + Duration::from_millis(40));
        let token = pad.release_deadline().unwrap().token;

        // Act: a second touch turns the tap into a drag and cancels the timer
        pad.contacts_down(&[ContactSample::new(2, 0.0, 0.0)], t0 + Duration::from_millis(100));
        pad.fire_release(token);

        // Assert
        assert_eq!(sent(&pad), vec![click(MouseButton::Left, true)]);
    }

    #[test]
    fn test_two_finger_tap_is_a_full_right_click() {
        let t0 = Instant::now();
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.contacts_down(&[ContactSample::new(1, 0.0, 0.0), ContactSample::new(2, 40.0, 0.0)], t0);
        pad.contacts_up(&[1, 2], t0 + Duration::from_millis(60));
        assert_eq!(
            sent(&pad),
            vec![click(MouseButton::Right, true), click(MouseButton::Right, false)]
        );
        assert!(pad.release_deadline().is_none());
    }

    #[test]
    fn test_one_finger_drag_sends_moves() {
        // Arrange
        let t0 = Instant::now();
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.contacts_down(&[ContactSample::new(1, 0.0, 0.0)], t0);

        // Act
        pad.contacts_move(&[ContactSample::new(1, 30.0, 0.0)], t0 + Duration::from_millis(100));

        // Assert
        let msgs = sent(&pad);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], ClientMessage::Move { dx, dy } if dx > 0.0 && dy == 0.0));
    }

    #[test]
    fn test_keys_pass_through_outside_combo() {
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.key("enter");
        pad.text("hi");
        pad.text("");
        assert_eq!(
            sent(&pad),
            vec![
                ClientMessage::Key { key: "enter".into() },
                ClientMessage::Text { text: "hi".into() },
            ]
        );
    }

    #[test]
    fn test_modifier_cycle_records_then_fires_combo() {
        // Arrange
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());

        // Act
        assert_eq!(pad.toggle_modifier(), ComboState::Active);
        pad.key("control");
        pad.key("shift");
        assert_eq!(pad.toggle_modifier(), ComboState::Hold);
        pad.key("t");
        pad.key("n");

        // Assert
        assert_eq!(
            sent(&pad),
            vec![
                ClientMessage::Combo { keys: vec!["control".into(), "shift".into(), "t".into()] },
                ClientMessage::Combo { keys: vec!["control".into(), "shift".into(), "n".into()] },
            ]
        );
    }

    #[test]
    fn test_escape_abandons_recording() {
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.toggle_modifier();
        pad.key("alt");
        pad.escape();
        pad.key("a");
        assert_eq!(pad.combo_state(), ComboState::Release);
        assert_eq!(sent(&pad), vec![ClientMessage::Key { key: "a".into() }]);
    }

    #[test]
    fn test_escape_key_cancels_active_recording() {
        // Arrange
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.toggle_modifier();
        pad.key("control");

        // Act
        pad.key("Escape");
        pad.key("a");

        // Assert
        assert_eq!(pad.combo_state(), ComboState::Release);
        assert_eq!(sent(&pad), vec![ClientMessage::Key { key: "a".into() }]);
    }

    #[test]
    fn test_escape_key_in_hold_sends_no_combo() {
        // Arrange
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.toggle_modifier();
        pad.key("control");
        assert_eq!(pad.toggle_modifier(), ComboState::Hold);

        // Act
        pad.key("escape");

        // Assert
        assert_eq!(pad.combo_state(), ComboState::Release);
        assert!(sent(&pad).is_empty());
    }

    #[test]
    fn test_escape_key_outside_combo_reaches_host() {
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.key("escape");
        assert_eq!(sent(&pad), vec![ClientMessage::Key { key: "escape".into() }]);
    }

    #[test]
    fn test_enter_bypasses_armed_modifier() {
        // Arrange
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.toggle_modifier();
        pad.key("shift");

        // Act
        pad.key("Enter");

        // Assert
        assert_eq!(sent(&pad), vec![ClientMessage::Key { key: "enter".into() }]);
        assert_eq!(pad.combo_state(), ComboState::Active);
        assert_eq!(pad.combo.buffer(), ["shift".to_string()]);
    }

    #[test]
    fn test_clipboard_events_are_forwarded() {
        let mut pad = Trackpad::new(GestureConfig::default(), Captured::default());
        pad.apply(InputEvent::Copy, Instant::now());
        pad.apply(InputEvent::Paste { text: Some("x".into()) }, Instant::now());
        assert_eq!(
            sent(&pad),
            vec![ClientMessage::Copy, ClientMessage::Paste { text: Some("x".into()) }]
        );
    }

    #[test]
    fn test_dropped_sends_do_not_panic() {
        let mut sink = MockMessageSink::new();
        sink.expect_send().times(1).return_const(false);
        let mut pad = Trackpad::new(GestureConfig::default(), sink);
        pad.key("escape");
    }
}
