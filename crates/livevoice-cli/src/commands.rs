//! Subcommands.

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the WebSocket URL derived from the gateway options
    Url,

    /// Text chat over a live session; stdin lines are sent as messages
    ///
    /// `/voice` prints the current voice, `/voice NAME` changes it while
    /// disconnected, `/quit` exits.
    Chat,

    /// Talk to the model through the default microphone and speaker until Ctrl-C
    #[cfg(feature = "local-audio")]
    Talk {
        /// Mute the microphone while the model speaks (open speakers, no headset)
        #[arg(long)]
        gate_mic: bool,
    },
}
