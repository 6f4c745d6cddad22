//! `livevoice talk`: microphone in, speaker out.

use std::sync::Arc;

use anyhow::{Context, Result};
use livevoice_audio::audio_local::new_pair;
use livevoice_client::VoiceSession;
use livevoice_core::SessionEvent;

use super::{show, wait_until_started};
use crate::parser::GatewayArgs;

/// Record and play until Ctrl-C or disconnect. What the user said is
/// printed at the end of each turn.
///
/// `gate_mic` drops microphone audio while the model speaks, which stops the
/// speaker feeding back into the mic but also prevents spoken interruptions.
pub async fn execute(args: &GatewayArgs, gate_mic: bool) -> Result<()> {
    let mut settings = args.settings();
    settings.capture.gate_during_playback = gate_mic;
    let setup_limit = settings.connection.connect_timeout;
    let (input, output) = new_pair().context("Failed to start the audio thread")?;
    let (session, mut events) = VoiceSession::new(settings, Arc::new(input), Arc::new(output));

    session
        .connect()
        .await
        .context("Failed to connect to the gateway")?;
    wait_until_started(&mut events, setup_limit).await?;
    session
        .start_recording()
        .context("Failed to open the microphone")?;
    println!(
        "Listening (voice {}). Press Ctrl-C to stop.",
        session.current_voice()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut heard = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                if event == SessionEvent::TurnComplete {
                    let input = session.transcript().input;
                    let said = input.get(heard..).unwrap_or(&input).trim();
                    if !said.is_empty() {
                        println!("\n(you) {said}");
                    }
                    heard = input.len();
                }
                show(&event);
                if event == SessionEvent::Disconnected {
                    break;
                }
            }
        }
    }

    session.stop_recording();
    session.disconnect();
    Ok(())
}
