//! Keyboard bindings.

use winit::keyboard::KeyCode;

use crate::visual::palette::Channel;

/// Everything the user can ask for while a track plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Skip,
    Help,
    Diagnostics,
    ToggleShape,
    SelectPalette(u8),
    /// Move the monitored frequency by this many hops.
    MoveMonitor(i32),
    /// Move the loudness threshold by this many 6 dB steps.
    MoveThreshold(i32),
    AdjustFactor(Channel, i32),
    Quit,
}

pub const HELP: &[(&str, &str)] = &[
    ("N / Space", "skip to the next track"),
    ("H", "show this help"),
    ("I", "print track diagnostics and current settings"),
    ("S", "toggle bars / circles"),
    ("1-4", "select palette"),
    ("Left / Right", "move the monitored frequency"),
    ("Down / Up", "lower / raise the loudness threshold"),
    ("[ / ]", "lower / raise the red factor"),
    ("; / '", "lower / raise the green factor"),
    (". / /", "lower / raise the blue factor"),
    ("Esc / Q", "quit"),
];

pub fn command_for_key(key: KeyCode) -> Option<Command> {
    let command = match key {
        KeyCode::KeyN | KeyCode::Space => Command::Skip,
        KeyCode::KeyH => Command::Help,
        KeyCode::KeyI => Command::Diagnostics,
        KeyCode::KeyS => Command::ToggleShape,
        KeyCode::Digit1 => Command::SelectPalette(1),
        KeyCode::Digit2 => Command::SelectPalette(2),
        KeyCode::Digit3 => Command::SelectPalette(3),
        KeyCode::Digit4 => Command::SelectPalette(4),
        KeyCode::ArrowLeft => Command::MoveMonitor(-1),
        KeyCode::ArrowRight => Command::MoveMonitor(1),
        KeyCode::ArrowDown => Command::MoveThreshold(-1),
        KeyCode::ArrowUp => Command::MoveThreshold(1),
        KeyCode::BracketLeft => Command::AdjustFactor(Channel::Red, -1),
        KeyCode::BracketRight => Command::AdjustFactor(Channel::Red, 1),
        KeyCode::Semicolon => Command::AdjustFactor(Channel::Green, -1),
        KeyCode::Quote => Command::AdjustFactor(Channel::Green, 1),
        KeyCode::Period => Command::AdjustFactor(Channel::Blue, -1),
        KeyCode::Slash => Command::AdjustFactor(Channel::Blue, 1),
        KeyCode::Escape | KeyCode::KeyQ => Command::Quit,
        _ => return None,
    };
    Some(command)
}

pub fn print_help() {
    println!("Controls:");
    for (keys, action) in HELP {
        println!("  {:<14} {}", keys, action);
    }
}
