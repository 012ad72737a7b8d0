//! Command line interface for the `relaybridge` demo binary.
//!
//! Shared with the build script, which renders a man page from it.

use clap::Parser;

/// Command line arguments for the `relaybridge` binary.
#[derive(Debug, Parser)]
#[command(
    name = "relaybridge",
    version,
    about = "Send packets across an in-memory channel pair with a small frame limit"
)]
pub struct Cli {
    /// Number of packets to send.
    #[arg(short, long, default_value_t = 3)]
    pub count: usize,

    /// Size of each packet in bytes.
    #[arg(short = 's', long, default_value_t = 200)]
    pub packet_size: usize,

    /// Largest write the channel accepts, in bytes.
    #[arg(short, long, default_value_t = 48)]
    pub frame_limit: usize,

    /// Smallest write counted as a delivered chunk.
    #[arg(short, long, default_value_t = 16)]
    pub min_frame_size: usize,

    /// Delay between receive polls, in milliseconds.
    #[arg(short = 'd', long, default_value_t = 5)]
    pub update_delay_ms: u64,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_fit_the_frame_limit() {
        let cli = Cli::parse_from(["relaybridge"]);
        assert_eq!(cli.count, 3);
        assert!(cli.min_frame_size <= cli.frame_limit);
    }

    #[test]
    fn parses_frame_options() {
        let cli = Cli::parse_from(["relaybridge", "--frame-limit", "20", "-m", "14", "-c", "9"]);
        assert_eq!(cli.frame_limit, 20);
        assert_eq!(cli.min_frame_size, 14);
        assert_eq!(cli.count, 9);
    }
}
