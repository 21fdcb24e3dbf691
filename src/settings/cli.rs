use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "IoT platform session and token service")]
pub struct Cli {
    /// Path to a settings file (TOML).
    #[arg(long)]
    pub settings: Option<String>,
}
