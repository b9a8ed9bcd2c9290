use crate::config::AppConfig;
use crate::core::engine::WriteMode;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Append,
    Update,
}

impl From<ModeArg> for WriteMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Append => WriteMode::Append,
            ModeArg::Update => WriteMode::Update,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "price-scout")]
#[command(about = "Finds the lowest resale price for product identifiers across several sources")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "price-scout.toml")]
    pub config: String,

    /// Price a single barcode or keyword instead of reading the input sheet
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Override the write mode from config
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Override the input sheet path from config
    #[arg(long)]
    pub input: Option<String>,

    /// Override the output sheet path from config
    #[arg(long)]
    pub output: Option<String>,

    /// Fetch and reconcile, but do not write to the sheet
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl CliArgs {
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.run.mode = Some(mode.into());
            tracing::info!("🔧 Write mode overridden to: {:?}", config.write_mode());
        }
        if let Some(input) = &self.input {
            config.store.input_path = Some(input.clone());
        }
        if let Some(output) = &self.output {
            config.store.output_path = output.clone();
        }
    }
}
