//! Compiled-in policy for frwm.
//!
//! There is no configuration file: colors, sizes, the launcher command and
//! the keybinding table all live here. Keybindings are written as strings
//! like "Mod4+Shift+q" and parsed once at startup.

/// Maximum number of simultaneously managed windows
pub const MAX_WINDOWS: usize = 64;

/// Maximum number of monitors kept from the geometry provider
pub const MAX_MONITORS: usize = 16;

/// Smallest frame size an interactive resize may produce
pub const MIN_WIDTH: u32 = 20;
pub const MIN_HEIGHT: u32 = 20;

/// Height of the title band at the top of every frame
pub const FRAME_BAR_HEIGHT: u32 = 18;
/// Frame border width
pub const FRAME_BORDER_WIDTH: u32 = 2;

pub const COLOR_FRAME_BACK: u32 = 0x666699;
pub const COLOR_FRAME_BORDER_FOCUS: u32 = 0xFF9933;
pub const COLOR_FRAME_BORDER_UNFOCUS: u32 = 0x777777;

/// Status bar geometry and colors
pub const BAR_HEIGHT: u32 = 18;
pub const BAR_TEXT_X: i32 = 5;
pub const BAR_TEXT_Y: i32 = 0;
pub const COLOR_BAR: u32 = 0xFFFFFF;
pub const COLOR_BAR_TEXT: u32 = 0x000000;
pub const BAR_TEXT_OPACITY: f32 = 1.0;

/// Font used for the status bar
pub const FONT_NAME: &str = "monospace";
pub const FONT_SIZE: u32 = 10;

/// Program started by the launch-menu binding
pub const MENU_COMMAND: &str = "dmenu_run";

/// Actions reachable from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WmAction {
    Quit,
    KillWindow,
    RaiseWindow,
    LaunchMenu,
    ToggleBar,
}

/// The keybinding table
pub const KEYBINDINGS: &[(&str, WmAction)] = &[
    ("Mod4+Shift+e", WmAction::Quit),
    ("Mod4+Shift+q", WmAction::KillWindow),
    ("Mod4+a", WmAction::RaiseWindow),
    ("Mod4+d", WmAction::LaunchMenu),
    ("Mod4+b", WmAction::ToggleBar),
];

// X11 modifier masks
pub const SHIFT_MASK: u16 = 1;
pub const LOCK_MASK: u16 = 2;
pub const CONTROL_MASK: u16 = 4;
pub const MOD1_MASK: u16 = 8; // Alt
pub const MOD2_MASK: u16 = 16; // NumLock
pub const MOD4_MASK: u16 = 64; // Super/Win

/// Modifier used for the pointer bindings (move/resize)
pub const PRIMARY_MODIFIER: u16 = MOD4_MASK;

/// A keybinding resolved to keysym and modifier mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedBinding {
    pub keysym: u32,
    pub modifiers: u16,
}

impl ParsedBinding {
    /// Does a key event with this keysym and raw modifier state trigger the binding?
    /// NumLock and CapsLock are ignored.
    pub fn matches(&self, keysym: u32, state: u16) -> bool {
        let clean_state = state & !(MOD2_MASK | LOCK_MASK);
        self.keysym == keysym && self.modifiers == clean_state
    }
}

/// Parse the compiled-in keybinding table, skipping entries that don't parse
pub fn parse_keybindings() -> Vec<(ParsedBinding, WmAction)> {
    KEYBINDINGS
        .iter()
        .filter_map(|(combo, action)| match parse_key_binding(combo) {
            Some(binding) => Some((binding, *action)),
            None => {
                log::warn!("Failed to parse keybinding: {}", combo);
                None
            }
        })
        .collect()
}

/// Parse a key binding string like "Mod4+Shift+h" into keysym and modifiers
pub fn parse_key_binding(s: &str) -> Option<ParsedBinding> {
    let parts: Vec<&str> = s.split('+').collect();
    let key_part = parts.last()?;

    let mut modifiers: u16 = 0;
    for part in &parts[..parts.len() - 1] {
        match part.to_lowercase().as_str() {
            "mod4" | "super" | "win" => modifiers |= MOD4_MASK,
            "shift" => modifiers |= SHIFT_MASK,
            "control" | "ctrl" => modifiers |= CONTROL_MASK,
            "mod1" | "alt" => modifiers |= MOD1_MASK,
            _ => {
                log::warn!("Unknown modifier: {}", part);
                return None;
            }
        }
    }

    let keysym = key_to_keysym(key_part)?;
    Some(ParsedBinding { keysym, modifiers })
}

/// Convert key name to X11 keysym
fn key_to_keysym(key: &str) -> Option<u32> {
    let lower = key.to_lowercase();

    // Latin-1 letters and digits map directly onto their ASCII codes
    if lower.len() == 1 {
        let c = lower.as_bytes()[0];
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            return Some(c as u32);
        }
    }

    match lower.as_str() {
        "return" | "enter" => Some(0xff0d),
        "tab" => Some(0xff09),
        "escape" | "esc" => Some(0xff1b),
        "space" => Some(0x20),
        "backspace" => Some(0xff08),
        "delete" => Some(0xffff),
        _ => {
            log::warn!("Unknown key: {}", key);
            None
        }
    }
}
