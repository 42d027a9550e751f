//! Terminal input: a poll thread that forwards keypresses to the
//! machine's keyboard device.

use std::io;
use std::thread;
use std::time::Duration;

use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use crossterm::tty::IsTty;
use sim_core::{KeyboardDevice, RunFlag, END_OF_TEXT};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Holds the terminal in raw mode for the lifetime of the value.
pub struct RawModeGuard(());

impl RawModeGuard {
    /// Enables raw mode when stdin is an interactive terminal; returns
    /// `None` when it is not (piped input, CI).
    ///
    /// # Errors
    ///
    /// Propagates the terminal error when raw mode cannot be enabled.
    pub fn engage() -> io::Result<Option<Self>> {
        if !io::stdin().is_tty() {
            return Ok(None);
        }
        terminal::enable_raw_mode()?;
        Ok(Some(Self(())))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Translates one terminal event into a keyboard byte.
///
/// Ctrl-C and Escape become the end-of-text control byte; printable
/// ASCII passes through unchanged.
fn event_to_byte(event: &Event) -> Option<u8> {
    let Event::Key(key) = event else {
        return None;
    };
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(END_OF_TEXT),
        KeyCode::Char(character) if character.is_ascii() => {
            u8::try_from(u32::from(character)).ok()
        }
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x08),
        KeyCode::Esc => Some(END_OF_TEXT),
        _ => None,
    }
}

/// Spawns the poll loop. The thread exits once the run flag clears or
/// the terminal reports an error.
pub fn spawn_input_thread(keyboard: KeyboardDevice, run: RunFlag) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while run.is_running() {
            match poll(POLL_INTERVAL) {
                Ok(true) => {
                    let Ok(event) = read() else { break };
                    if let Some(byte) = event_to_byte(&event) {
                        keyboard.key_event(byte);
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
    })
}
