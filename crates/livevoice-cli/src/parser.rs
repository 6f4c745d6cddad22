//! Root parser and global gateway/session options.
//!
//! Every option falls back to a `LIVEVOICE_*` environment variable, so a
//! `.env` file next to the binary is enough to configure a session.

use std::time::Duration;

use clap::{Args, Parser};
use livevoice_core::{ClientSettings, GatewayError};

use crate::commands::Commands;

#[derive(Debug, Parser)]
#[command(name = "livevoice")]
#[command(about = "Real-time voice sessions with a live model gateway")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub gateway: GatewayArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct GatewayArgs {
    /// Gateway base URL (http, https, ws or wss)
    #[arg(long, env = "LIVEVOICE_GATEWAY_URL", global = true)]
    pub gateway_url: Option<String>,

    /// Origin used when no gateway URL is configured
    #[arg(long, env = "LIVEVOICE_PAGE_ORIGIN", global = true)]
    pub page_origin: Option<String>,

    /// WebSocket path on the gateway
    #[arg(long, env = "LIVEVOICE_SOCKET_PATH", global = true)]
    pub socket_path: Option<String>,

    /// Model requested in session setup
    #[arg(long, env = "LIVEVOICE_MODEL", global = true)]
    pub model: Option<String>,

    /// Prebuilt voice for model speech
    #[arg(long, env = "LIVEVOICE_VOICE", global = true)]
    pub voice: Option<String>,

    /// System instruction sent with session setup
    #[arg(long, env = "LIVEVOICE_SYSTEM_INSTRUCTION", global = true)]
    pub system_instruction: Option<String>,

    /// Seconds to wait for the WebSocket handshake
    #[arg(long, env = "LIVEVOICE_CONNECT_TIMEOUT_SECS", global = true)]
    pub connect_timeout_secs: Option<u64>,
}

impl GatewayArgs {
    /// Layer the options over [`ClientSettings::with_defaults`].
    #[must_use]
    pub fn settings(&self) -> ClientSettings {
        let mut settings = ClientSettings::with_defaults();

        settings.gateway.base_url.clone_from(&self.gateway_url);
        settings.gateway.page_origin.clone_from(&self.page_origin);
        if let Some(path) = &self.socket_path {
            settings.gateway.socket_path.clone_from(path);
        }

        if self.model.is_some() {
            settings.session.model.clone_from(&self.model);
        }
        if self.voice.is_some() {
            settings.session.voice.clone_from(&self.voice);
        }
        if self.system_instruction.is_some() {
            settings
                .session
                .system_instruction
                .clone_from(&self.system_instruction);
        }
        if let Some(secs) = self.connect_timeout_secs {
            settings.connection.connect_timeout = Duration::from_secs(secs);
        }

        settings
    }

    /// The WebSocket URL a session would connect to.
    pub fn ws_url(&self) -> Result<String, GatewayError> {
        self.settings().gateway.ws_url()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("livevoice").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = parse(&["chat", "--gateway-url", "https://gw.example", "--voice", "Kore"]);
        assert!(matches!(cli.command, Some(Commands::Chat)));
        assert_eq!(cli.gateway.gateway_url.as_deref(), Some("https://gw.example"));
        assert_eq!(cli.gateway.voice.as_deref(), Some("Kore"));
    }

    #[test]
    fn options_override_defaults() {
        let cli = parse(&[
            "--gateway-url",
            "http://localhost:8080",
            "--socket-path",
            "/live",
            "--model",
            "models/live",
            "--system-instruction",
            "Be brief.",
            "--connect-timeout-secs",
            "3",
            "url",
        ]);
        let settings = cli.gateway.settings();

        assert_eq!(settings.gateway.socket_path, "/live");
        assert_eq!(settings.session.model.as_deref(), Some("models/live"));
        assert_eq!(settings.session.voice.as_deref(), Some("Puck"));
        assert_eq!(settings.session.system_instruction.as_deref(), Some("Be brief."));
        assert_eq!(settings.connection.connect_timeout, Duration::from_secs(3));
        assert_eq!(cli.gateway.ws_url().unwrap(), "ws://localhost:8080/live");
    }

    #[cfg(feature = "local-audio")]
    #[test]
    fn talk_leaves_the_microphone_open_unless_asked() {
        assert!(matches!(
            parse(&["talk"]).command,
            Some(Commands::Talk { gate_mic: false })
        ));
        assert!(matches!(
            parse(&["talk", "--gate-mic"]).command,
            Some(Commands::Talk { gate_mic: true })
        ));
    }

    #[test]
    fn unset_options_keep_defaults() {
        let args = GatewayArgs {
            gateway_url: None,
            page_origin: None,
            socket_path: None,
            model: None,
            voice: None,
            system_instruction: None,
            connect_timeout_secs: None,
        };
        assert_eq!(args.settings(), ClientSettings::with_defaults());
    }
}
