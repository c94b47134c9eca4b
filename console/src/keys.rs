//! Raw key mode
//!
//! Puts the terminal in raw mode and forwards W/S/A/D and the arrow keys
//! to the console's key binding until Esc or Ctrl+C.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;

use phi_core::{Console, Key};

enum Input {
    Key(Key),
    Leave,
}

/// Map a terminal key to a control key
pub fn key_for(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Char(c) => Key::from_char(c),
        KeyCode::Left => Some(Key::Left),
        KeyCode::Right => Some(Key::Right),
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        _ => None,
    }
}

fn is_leave(event: &KeyEvent) -> bool {
    matches!(event.code, KeyCode::Esc)
        || (event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL))
}

/// Blocking read loop; ends on the leave key or a closed receiver
fn read_keys(tx: mpsc::UnboundedSender<Input>) -> Result<()> {
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let input = if is_leave(&key) {
            Input::Leave
        } else {
            match key_for(key.code) {
                Some(k) => Input::Key(k),
                None => continue,
            }
        };

        let leave = matches!(input, Input::Leave);
        if tx.send(input).is_err() || leave {
            return Ok(());
        }
    }
}

/// Run key mode on the selected robot until the operator leaves
pub async fn run(console: &Console) -> Result<()> {
    enable_raw_mode()?;
    if let Err(e) = console.bind_keys() {
        disable_raw_mode()?;
        return Err(e.into());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = tokio::task::spawn_blocking(move || read_keys(tx));

    while let Some(input) = rx.recv().await {
        match input {
            Input::Key(key) => {
                console.press(key).await;
            }
            Input::Leave => break,
        }
    }

    let read = reader.await;
    disable_raw_mode()?;
    console.unbind_keys();

    read??;
    Ok(())
}
