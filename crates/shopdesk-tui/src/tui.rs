use std::cell::Cell;
use std::io::{self, Stderr};
use std::panic::{self, AssertUnwindSafe};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

thread_local! {
    // Set on the drawing thread while `catch_render_fault` runs.
    static RENDERING: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside `catch_render_fault`.
pub fn is_rendering() -> bool {
    RENDERING.with(|flag| flag.get())
}

#[derive(Debug)]
#[allow(dead_code)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _tx = tx.clone();

        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let app_event = match evt {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                    Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
                    Ok(Event::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!("Terminal event stream error: {}", e);
                        None
                    }
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        // Drives the "Thinking..." animation and completion polling
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic.
///
/// Panics raised while rendering are left to `catch_render_fault`, which
/// swaps in the recovery screen instead of tearing the terminal down.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if is_rendering() {
            tracing::error!("Render fault: {}", panic_info);
            return;
        }
        let _ = restore();
        original_hook(panic_info);
    }));
}

/// Run `render`, turning a panic into an error message.
pub fn catch_render_fault<F: FnOnce()>(render: F) -> std::result::Result<(), String> {
    RENDERING.with(|flag| flag.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(render));
    RENDERING.with(|flag| flag.set(false));

    result.map_err(|payload| {
        if let Some(msg) = payload.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown render fault".to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_render_fault_passes_through_success() {
        let mut drawn = false;
        assert!(catch_render_fault(|| drawn = true).is_ok());
        assert!(drawn);
    }

    #[test]
    fn test_catch_render_fault_captures_message() {
        let err = catch_render_fault(|| panic!("layout overflow")).unwrap_err();
        assert_eq!(err, "layout overflow");

        let err = catch_render_fault(|| panic!("bad index {}", 3)).unwrap_err();
        assert_eq!(err, "bad index 3");
    }

    #[test]
    fn test_rendering_flag_is_scoped_to_drawing_thread() {
        let mut seen_here = false;
        let mut seen_elsewhere = true;
        catch_render_fault(|| {
            seen_here = is_rendering();
            seen_elsewhere = std::thread::spawn(is_rendering).join().unwrap();
        })
        .unwrap();

        assert!(seen_here);
        assert!(!seen_elsewhere);
        assert!(!is_rendering());
    }

    #[test]
    fn test_rendering_flag_clears_after_fault() {
        assert!(catch_render_fault(|| panic!("boom")).is_err());
        assert!(!is_rendering());
    }
}
