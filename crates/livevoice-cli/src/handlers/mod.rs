//! Command handlers and the terminal rendering they share.

use std::io::Write;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use livevoice_core::SessionEvent;
use tokio::sync::mpsc::UnboundedReceiver;

pub mod chat;
#[cfg(feature = "local-audio")]
pub mod talk;
pub mod url;

/// Terminal text for one session event, if it has any.
///
/// Model text arrives as fragments and is printed inline; status events
/// get a line of their own.
#[must_use]
pub fn render(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Text { text } | SessionEvent::OutputTranscription { text } => {
            Some(text.clone())
        }
        SessionEvent::TurnComplete => Some("\n".to_string()),
        SessionEvent::Interrupted => Some("\n[interrupted]\n".to_string()),
        SessionEvent::ToolCall { calls } => {
            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            Some(format!("[tool call: {}]\n", names.join(", ")))
        }
        SessionEvent::SessionEnded { reason } => Some(match reason {
            Some(reason) => format!("[session ended: {reason}]\n"),
            None => "[session ended]\n".to_string(),
        }),
        SessionEvent::Error(info) => Some(format!("[{}] {}\n", info.code, info.message)),
        SessionEvent::Disconnected => Some("[disconnected]\n".to_string()),
        _ => None,
    }
}

pub(crate) fn show(event: &SessionEvent) {
    if let Some(text) = render(event) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{text}");
        let _ = stdout.flush();
    }
}

/// Print events until the gateway confirms the session.
pub(crate) async fn wait_until_started(
    events: &mut UnboundedReceiver<SessionEvent>,
    limit: Duration,
) -> Result<()> {
    let started = async {
        while let Some(event) = events.recv().await {
            show(&event);
            match event {
                SessionEvent::SessionStarted => return Ok(()),
                SessionEvent::Error(info) => return Err(anyhow!("{}: {}", info.code, info.message)),
                SessionEvent::Disconnected => bail!("Gateway closed the connection during setup"),
                _ => {}
            }
        }
        bail!("Session dropped before setup completed")
    };
    tokio::time::timeout(limit, started)
        .await
        .map_err(|_| anyhow!("Gateway did not start the session within {limit:?}"))?
}
