/// Platform-agnostic input handling system
use tracing::info;

/// Platform-independent input events
#[derive(Debug, Clone)]
pub enum InputEvent {
    // Keyboard events
    KeyDown(String),
    KeyUp(String),

    // Mouse events
    MouseMove { dx: f32, dy: f32 },
    MouseClick,

    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
    PointerLockChanged { locked: bool },
}

/// The closed set of movement intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Forward,
        Action::Backward,
        Action::Left,
        Action::Right,
        Action::Up,
        Action::Down,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Backward => "backward",
            Action::Left => "left",
            Action::Right => "right",
            Action::Up => "up",
            Action::Down => "down",
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Key mapping configuration
#[derive(Clone)]
pub struct KeyBindings {
    pub forward: String,
    pub backward: String,
    pub left: String,
    pub right: String,
    pub up: String,
    pub down: String,
    pub escape: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: "w".to_string(),
            backward: "s".to_string(),
            left: "a".to_string(),
            right: "d".to_string(),
            up: " ".to_string(),
            down: "Shift".to_string(),
            escape: "Escape".to_string(),
        }
    }
}

impl KeyBindings {
    /// Case-insensitive, so `W` with caps lock still walks.
    pub fn action_for(&self, key: &str) -> Option<Action> {
        let bound = |binding: &str| key.eq_ignore_ascii_case(binding);
        if bound(&self.forward) {
            Some(Action::Forward)
        } else if bound(&self.backward) {
            Some(Action::Backward)
        } else if bound(&self.left) {
            Some(Action::Left)
        } else if bound(&self.right) {
            Some(Action::Right)
        } else if bound(&self.up) {
            Some(Action::Up)
        } else if bound(&self.down) {
            Some(Action::Down)
        } else {
            None
        }
    }

    pub fn is_escape(&self, key: &str) -> bool {
        key == self.escape
    }
}

/// Current-state input: pressed actions, pending mouse look, engagement.
///
/// Written by event handlers, read once per tick. A press and release that
/// both land between two ticks leave no trace.
pub struct InputState {
    pressed: [bool; 6],
    look_delta: (f32, f32),
    engaged: bool,
    interacted: bool,
    bindings: KeyBindings,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(KeyBindings::default())
    }
}

impl InputState {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            pressed: [false; 6],
            look_delta: (0.0, 0.0),
            engaged: false,
            interacted: false,
            bindings,
        }
    }

    /// Idempotent.
    pub fn set_pressed(&mut self, action: Action, pressed: bool) {
        self.pressed[action.index()] = pressed;
    }

    pub fn is_pressed(&self, action: Action) -> bool {
        self.pressed[action.index()]
    }

    /// Lookup by action name; unknown names are simply not pressed.
    pub fn is_pressed_by_name(&self, name: &str) -> bool {
        Action::from_name(name).is_some_and(|a| self.is_pressed(a))
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.interacted = true;
                if let Some(action) = self.bindings.action_for(key) {
                    self.set_pressed(action, true);
                }
            }
            InputEvent::KeyUp(key) => {
                if let Some(action) = self.bindings.action_for(key) {
                    self.set_pressed(action, false);
                }
            }
            InputEvent::MouseMove { dx, dy } => {
                if self.engaged {
                    self.look_delta.0 += dx;
                    self.look_delta.1 += dy;
                }
            }
            InputEvent::MouseClick => {
                self.interacted = true;
            }
            InputEvent::FocusLost | InputEvent::VisibilityChanged { .. } => {
                self.clear_keys();
            }
            InputEvent::PointerLockChanged { locked } => {
                self.set_engaged(*locked);
            }
        }
    }

    pub fn clear_keys(&mut self) {
        self.pressed = [false; 6];
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    pub fn set_engaged(&mut self, engaged: bool) {
        if engaged != self.engaged {
            if engaged {
                info!("Controls active - WASD to move, mouse to look, ESC to exit");
            } else {
                info!("Controls released - click to re-engage");
                self.look_delta = (0.0, 0.0);
            }
        }
        self.engaged = engaged;
    }

    pub fn consume_look(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.look_delta)
    }

    /// True once per qualifying user gesture (click or key press).
    pub fn take_interaction(&mut self) -> bool {
        std::mem::take(&mut self.interacted)
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::KeyboardEvent;

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }

    pub fn mouse_move_to_input(dx: f32, dy: f32) -> InputEvent {
        InputEvent::MouseMove { dx, dy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_down(k: &str) -> InputEvent {
        InputEvent::KeyDown(k.to_string())
    }

    fn key_up(k: &str) -> InputEvent {
        InputEvent::KeyUp(k.to_string())
    }

    #[test]
    fn set_pressed_is_idempotent() {
        let mut input = InputState::default();
        input.set_pressed(Action::Forward, true);
        input.set_pressed(Action::Forward, true);
        assert!(input.is_pressed(Action::Forward));
        input.set_pressed(Action::Forward, false);
        assert!(!input.is_pressed(Action::Forward));
    }

    #[test]
    fn unknown_names_and_keys_are_ignored() {
        let mut input = InputState::default();
        assert!(!input.is_pressed_by_name("jump"));
        input.process_event(&key_down("F13"));
        assert!(Action::ALL.iter().all(|a| !input.is_pressed(*a)));
    }

    #[test]
    fn default_bindings_follow_browser_key_names() {
        let mut input = InputState::default();
        input.process_event(&key_down("W"));
        input.process_event(&key_down(" "));
        input.process_event(&key_down("Shift"));
        assert!(input.is_pressed_by_name("forward"));
        assert!(input.is_pressed(Action::Up));
        assert!(input.is_pressed(Action::Down));

        input.process_event(&key_up("w"));
        assert!(!input.is_pressed(Action::Forward));
    }

    #[test]
    fn press_and_release_between_reads_leaves_nothing() {
        let mut input = InputState::default();
        input.process_event(&key_down("d"));
        input.process_event(&key_up("d"));
        assert!(!input.is_pressed(Action::Right));
    }

    #[test]
    fn mouse_look_only_accumulates_while_engaged() {
        let mut input = InputState::default();
        input.process_event(&InputEvent::MouseMove { dx: 5.0, dy: 1.0 });
        assert_eq!(input.consume_look(), (0.0, 0.0));

        input.process_event(&InputEvent::PointerLockChanged { locked: true });
        input.process_event(&InputEvent::MouseMove { dx: 5.0, dy: 1.0 });
        input.process_event(&InputEvent::MouseMove { dx: 2.0, dy: -3.0 });
        assert_eq!(input.consume_look(), (7.0, -2.0));
        assert_eq!(input.consume_look(), (0.0, 0.0));
    }

    #[test]
    fn focus_loss_clears_pressed_actions() {
        let mut input = InputState::default();
        input.process_event(&key_down("a"));
        input.process_event(&InputEvent::FocusLost);
        assert!(!input.is_pressed(Action::Left));
    }

    #[test]
    fn interaction_is_reported_once() {
        let mut input = InputState::default();
        assert!(!input.take_interaction());
        input.process_event(&InputEvent::MouseClick);
        assert!(input.take_interaction());
        assert!(!input.take_interaction());
    }
}
