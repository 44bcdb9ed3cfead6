use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::salvage::{PrefixWindow, SalvageConfig, WindowAnchor};

#[derive(Parser, Debug)]
#[command(name = "xlsalvage")]
#[command(version)]
#[command(about = "Recover XLSX workbooks mis-saved inside JSON/text wrappers", long_about = None)]
#[command(after_help = "Examples:\n  \
  xlsalvage -s sample_data              recover doc/drug/lab/nurse/xray .json exports\n  \
  xlsalvage -n export.json              check an export without writing the .xlsx\n  \
  xlsalvage -d out -j a.json b.json     write recovered files to out/, JSON report")]
pub struct Cli {
    /// Wrapped exports to recover
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Sample directory holding the fixed export set (doc, drug, lab, nurse, xray)
    #[arg(short = 's', value_name = "DIR")]
    pub sample_dir: Option<PathBuf>,

    /// Write recovered archives into DIR (default: next to each input)
    #[arg(short = 'd', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not write recovered archives
    #[arg(short = 'n')]
    pub dry_run: bool,

    /// Leading bytes eligible for artifact stripping
    #[arg(short = 'w', value_name = "BYTES", default_value_t = PrefixWindow::DEFAULT.get())]
    pub window: usize,

    /// Where the stripping window is measured from
    #[arg(long, value_enum, default_value_t = AnchorArg::Region)]
    pub anchor: AnchorArg,

    /// Fail inputs with no end-of-central-directory record instead of guessing
    #[arg(long)]
    pub strict: bool,

    /// Print the report as JSON
    #[arg(short = 'j')]
    pub json: bool,

    /// More log output (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (-qq => errors only)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnchorArg {
    Region,
    Stream,
}

impl From<AnchorArg> for WindowAnchor {
    fn from(arg: AnchorArg) -> Self {
        match arg {
            AnchorArg::Region => WindowAnchor::Region,
            AnchorArg::Stream => WindowAnchor::Stream,
        }
    }
}

impl Cli {
    pub fn salvage_config(&self) -> SalvageConfig {
        SalvageConfig::new()
            .with_window(self.window)
            .with_anchor(self.anchor.into())
            .with_strict_terminator(self.strict)
    }

    /// Default log filter from -v/-q, used when RUST_LOG is unset.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (q, _) if q > 1 => "error",
            (1, _) => "warn",
            (_, 0) => "info",
            (_, 1) => "debug",
            _ => "trace",
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_salvage_defaults() {
        let cli = Cli::parse_from(["xlsalvage", "doc.json"]);
        assert_eq!(cli.salvage_config(), SalvageConfig::default());
        assert_eq!(cli.log_level(), "info");
        assert!(!cli.dry_run);
    }

    #[test]
    fn flags_flow_into_config() {
        let cli = Cli::parse_from([
            "xlsalvage", "-w", "32", "--anchor", "stream", "--strict", "-s", "data", "-vv",
        ]);
        let config = cli.salvage_config();
        assert_eq!(config.window.get(), 32);
        assert_eq!(config.anchor, WindowAnchor::Stream);
        assert!(config.strict_terminator);
        assert_eq!(cli.sample_dir, Some(PathBuf::from("data")));
        assert_eq!(cli.log_level(), "trace");
    }

    #[test]
    fn quiet_overrides_verbose() {
        let cli = Cli::parse_from(["xlsalvage", "-qq", "-v", "x.json"]);
        assert_eq!(cli.log_level(), "error");
    }
}
