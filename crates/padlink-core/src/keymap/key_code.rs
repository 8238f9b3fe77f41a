//! Named keys and their USB HID usage ids.
//!
//! Keyboard keys carry their usage id from the Keyboard/Keypad page (0x07).
//! Media transport keys live on the Consumer page (0x0C); their value carries
//! the page in the high byte so every variant stays a distinct `u16`.
//!
//! Clients address keys by lower-case name (`"enter"`, `"arrowleft"`,
//! `"control"`).  [`KeyCode::from_name`] accepts the canonical name returned
//! by [`KeyCode::name`] plus the common aliases a browser or a person typing a
//! chord would use (`"ctrl"`, `"esc"`, `"up"`, `"cmd"`).

use serde::{Deserialize, Serialize};

/// Page tag for Consumer-page usages.
pub const CONSUMER_PAGE: u16 = 0x0C00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum KeyCode {
    // Letters
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    // Digits
    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    // Editing
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    CapsLock = 0x39,

    // Function row
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation cluster
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,
    NumLock = 0x53,
    ContextMenu = 0x65,

    // Volume (keyboard page)
    AudioMute = 0x7F,
    AudioVolumeUp = 0x80,
    AudioVolumeDown = 0x81,

    // Modifiers
    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,

    // Media transport (consumer page)
    MediaNextTrack = CONSUMER_PAGE | 0xB5,
    MediaPreviousTrack = CONSUMER_PAGE | 0xB6,
    MediaStop = CONSUMER_PAGE | 0xB7,
    MediaPlayPause = CONSUMER_PAGE | 0xCD,
}

const LETTERS: [KeyCode; 26] = [
    KeyCode::KeyA,
    KeyCode::KeyB,
    KeyCode::KeyC,
    KeyCode::KeyD,
    KeyCode::KeyE,
    KeyCode::KeyF,
    KeyCode::KeyG,
    KeyCode::KeyH,
    KeyCode::KeyI,
    KeyCode::KeyJ,
    KeyCode::KeyK,
    KeyCode::KeyL,
    KeyCode::KeyM,
    KeyCode::KeyN,
    KeyCode::KeyO,
    KeyCode::KeyP,
    KeyCode::KeyQ,
    KeyCode::KeyR,
    KeyCode::KeyS,
    KeyCode::KeyT,
    KeyCode::KeyU,
    KeyCode::KeyV,
    KeyCode::KeyW,
    KeyCode::KeyX,
    KeyCode::KeyY,
    KeyCode::KeyZ,
];

const DIGITS: [KeyCode; 10] = [
    KeyCode::Digit0,
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

const FUNCTION_KEYS: [KeyCode; 12] = [
    KeyCode::F1,
    KeyCode::F2,
    KeyCode::F3,
    KeyCode::F4,
    KeyCode::F5,
    KeyCode::F6,
    KeyCode::F7,
    KeyCode::F8,
    KeyCode::F9,
    KeyCode::F10,
    KeyCode::F11,
    KeyCode::F12,
];

impl KeyCode {
    /// Resolves a key name, case-insensitively.
    ///
    /// Single letters and digits resolve to their key so that chords such as
    /// `["control", "c"]` press real keys.  Returns `None` for anything not in
    /// the table, including other single characters.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_lowercase() {
                return Some(LETTERS[(c as u8 - b'a') as usize]);
            }
            if c.is_ascii_digit() {
                return Some(DIGITS[(c as u8 - b'0') as usize]);
            }
            if c == ' ' {
                return Some(KeyCode::Space);
            }
        }
        if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
            return (1..=FUNCTION_KEYS.len())
                .contains(&n)
                .then(|| FUNCTION_KEYS[n - 1]);
        }

        let code = match lower.as_str() {
            "enter" | "return" => KeyCode::Enter,
            "escape" | "esc" => KeyCode::Escape,
            "backspace" => KeyCode::Backspace,
            "tab" => KeyCode::Tab,
            "space" | "spacebar" => KeyCode::Space,
            "capslock" => KeyCode::CapsLock,
            "printscreen" | "prtsc" => KeyCode::PrintScreen,
            "scrolllock" => KeyCode::ScrollLock,
            "pause" => KeyCode::Pause,
            "insert" => KeyCode::Insert,
            "home" => KeyCode::Home,
            "pageup" => KeyCode::PageUp,
            "delete" | "del" => KeyCode::Delete,
            "end" => KeyCode::End,
            "pagedown" => KeyCode::PageDown,
            "arrowright" | "right" => KeyCode::ArrowRight,
            "arrowleft" | "left" => KeyCode::ArrowLeft,
            "arrowdown" | "down" => KeyCode::ArrowDown,
            "arrowup" | "up" => KeyCode::ArrowUp,
            "numlock" => KeyCode::NumLock,
            "menu" | "contextmenu" => KeyCode::ContextMenu,
            "audiomute" | "mute" => KeyCode::AudioMute,
            "audiovolup" | "audiovolumeup" | "volumeup" => KeyCode::AudioVolumeUp,
            "audiovoldown" | "audiovolumedown" | "volumedown" => KeyCode::AudioVolumeDown,
            "control" | "ctrl" | "controlleft" => KeyCode::ControlLeft,
            "shift" | "shiftleft" => KeyCode::ShiftLeft,
            "alt" | "option" | "altleft" => KeyCode::AltLeft,
            "meta" | "cmd" | "command" | "super" | "win" | "metaleft" => KeyCode::MetaLeft,
            "controlright" => KeyCode::ControlRight,
            "shiftright" => KeyCode::ShiftRight,
            "altright" | "altgr" => KeyCode::AltRight,
            "metaright" => KeyCode::MetaRight,
            "audioforward" | "audionext" | "mediatracknext" => KeyCode::MediaNextTrack,
            "audioback" | "audioprev" | "mediatrackprevious" => KeyCode::MediaPreviousTrack,
            "audiostop" | "mediastop" => KeyCode::MediaStop,
            "playpause" | "audioplay" | "audiopause" | "mediaplaypause" => KeyCode::MediaPlayPause,
            _ => return None,
        };
        Some(code)
    }

    /// Canonical lower-case name, accepted back by [`KeyCode::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            KeyCode::KeyA => "a",
            KeyCode::KeyB => "b",
            KeyCode::KeyC => "c",
            KeyCode::KeyD => "d",
            KeyCode::KeyE => "e",
            KeyCode::KeyF => "f",
            KeyCode::KeyG => "g",
            KeyCode::KeyH => "h",
            KeyCode::KeyI => "i",
            KeyCode::KeyJ => "j",
            KeyCode::KeyK => "k",
            KeyCode::KeyL => "l",
            KeyCode::KeyM => "m",
            KeyCode::KeyN => "n",
            KeyCode::KeyO => "o",
            KeyCode::KeyP => "p",
            KeyCode::KeyQ => "q",
            KeyCode::KeyR => "r",
            KeyCode::KeyS => "s",
            KeyCode::KeyT => "t",
            KeyCode::KeyU => "u",
            KeyCode::KeyV => "v",
            KeyCode::KeyW => "w",
            KeyCode::KeyX => "x",
            KeyCode::KeyY => "y",
            KeyCode::KeyZ => "z",
            KeyCode::Digit1 => "1",
            KeyCode::Digit2 => "2",
            KeyCode::Digit3 => "3",
            KeyCode::Digit4 => "4",
            KeyCode::Digit5 => "5",
            KeyCode::Digit6 => "6",
            KeyCode::Digit7 => "7",
            KeyCode::Digit8 => "8",
            KeyCode::Digit9 => "9",
            KeyCode::Digit0 => "0",
            KeyCode::Enter => "enter",
            KeyCode::Escape => "escape",
            KeyCode::Backspace => "backspace",
            KeyCode::Tab => "tab",
            KeyCode::Space => "space",
            KeyCode::CapsLock => "capslock",
            KeyCode::F1 => "f1",
            KeyCode::F2 => "f2",
            KeyCode::F3 => "f3",
            KeyCode::F4 => "f4",
            KeyCode::F5 => "f5",
            KeyCode::F6 => "f6",
            KeyCode::F7 => "f7",
            KeyCode::F8 => "f8",
            KeyCode::F9 => "f9",
            KeyCode::F10 => "f10",
            KeyCode::F11 => "f11",
            KeyCode::F12 => "f12",
            KeyCode::PrintScreen => "printscreen",
            KeyCode::ScrollLock => "scrolllock",
            KeyCode::Pause => "pause",
            KeyCode::Insert => "insert",
            KeyCode::Home => "home",
            KeyCode::PageUp => "pageup",
            KeyCode::Delete => "delete",
            KeyCode::End => "end",
            KeyCode::PageDown => "pagedown",
            KeyCode::ArrowRight => "arrowright",
            KeyCode::ArrowLeft => "arrowleft",
            KeyCode::ArrowDown => "arrowdown",
            KeyCode::ArrowUp => "arrowup",
            KeyCode::NumLock => "numlock",
            KeyCode::ContextMenu => "menu",
            KeyCode::AudioMute => "audiomute",
            KeyCode::AudioVolumeUp => "audiovolup",
            KeyCode::AudioVolumeDown => "audiovoldown",
            KeyCode::ControlLeft => "control",
            KeyCode::ShiftLeft => "shift",
            KeyCode::AltLeft => "alt",
            KeyCode::MetaLeft => "meta",
            KeyCode::ControlRight => "controlright",
            KeyCode::ShiftRight => "shiftright",
            KeyCode::AltRight => "altright",
            KeyCode::MetaRight => "metaright",
            KeyCode::MediaNextTrack => "audioforward",
            KeyCode::MediaPreviousTrack => "audioback",
            KeyCode::MediaStop => "audiostop",
            KeyCode::MediaPlayPause => "playpause",
        }
    }

    /// Raw usage id, with the page tag for consumer-page keys.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn is_consumer(self) -> bool {
        self.as_u16() & 0xFF00 == CONSUMER_PAGE
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::ControlLeft
                | KeyCode::ControlRight
                | KeyCode::ShiftLeft
                | KeyCode::ShiftRight
                | KeyCode::AltLeft
                | KeyCode::AltRight
                | KeyCode::MetaLeft
                | KeyCode::MetaRight
        )
    }
}
