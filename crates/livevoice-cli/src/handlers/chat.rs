//! `livevoice chat`: a text-only live session driven from stdin.
//!
//! Model audio is paced through [`SilentOutput`] so barge-in and playback
//! events behave as they would with a speaker attached.

use std::sync::Arc;

use anyhow::{Context, Result};
use livevoice_audio::{NoInput, SilentOutput};
use livevoice_client::VoiceSession;
use livevoice_core::SessionEvent;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{show, wait_until_started};
use crate::parser::GatewayArgs;

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    ShowVoice,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/voice" => Input::ShowVoice,
        command if command.starts_with('/') => Input::Unknown(command),
        text => Input::Message(text),
    }
}

/// Connect, then relay stdin lines and print model output until `/quit`,
/// end of input, or disconnect.
pub async fn execute(args: &GatewayArgs) -> Result<()> {
    let settings = args.settings();
    let setup_limit = settings.connection.connect_timeout;
    let (session, mut events) = VoiceSession::new(
        settings,
        Arc::new(NoInput),
        Arc::new(SilentOutput::new()),
    );

    session
        .connect()
        .await
        .context("Failed to connect to the gateway")?;
    wait_until_started(&mut events, setup_limit).await?;
    println!(
        "Session started (voice {}). Type a message, /voice or /quit.",
        session.current_voice()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Quit => break,
                    Input::ShowVoice => println!("voice: {}", session.current_voice()),
                    Input::Unknown(command) => eprintln!("unknown command {command}"),
                    Input::Message(text) => {
                        if let Err(e) = session.send_message(text) {
                            eprintln!("{e}");
                        }
                    }
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                show(&event);
                if event == SessionEvent::Disconnected {
                    break;
                }
            }
        }
    }

    session.disconnect();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_recognised() {
        assert_eq!(parse_input("  /quit "), Input::Quit);
        assert_eq!(parse_input("/voice"), Input::ShowVoice);
        assert_eq!(parse_input("/mute"), Input::Unknown("/mute"));
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn other_lines_are_messages() {
        assert_eq!(parse_input("hi there\n"), Input::Message("hi there"));
        assert_eq!(parse_input("what is /voice?"), Input::Message("what is /voice?"));
    }
}
