use std::path::PathBuf;

use clap::Parser;
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "lintrans",
    author,
    version,
    about = "Draws a quad outline through five linear transformations"
)]
pub struct Cli {
    /// Combined shader file with `#shader vertex` and `#shader fragment` sections.
    #[arg(
        long,
        value_name = "PATH",
        env = "LINTRANS_SHADER",
        default_value = "shaders/basic.shader"
    )]
    pub shader: PathBuf,

    /// Window size in physical pixels (e.g. `900x900`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_size,
        default_value = "900x900"
    )]
    pub size: (u32, u32),

    /// Window title.
    #[arg(long, value_name = "TEXT", default_value = "Linear Transformations")]
    pub title: String,

    /// Adapter preference: `low` (integrated) or `high` (discrete).
    #[arg(
        long,
        value_name = "PREFERENCE",
        value_parser = parse_gpu_power,
        default_value = "low"
    )]
    pub gpu_power: GpuPowerPreference,

    /// Present without waiting for vertical blank.
    #[arg(long)]
    pub no_vsync: bool,

    /// Print the split vertex and fragment sources, then exit. A missing
    /// asset prints empty sections, as the windowed run would load them.
    #[arg(long, conflicts_with = "check")]
    pub print_sources: bool,

    /// Compile and link the shader without opening a window, then exit.
    #[arg(long)]
    pub check: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 900x900".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    if value.trim().is_empty() {
        return Err("GPU power preference must not be empty".to_string());
    }
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("900x900"), Ok((900, 900)));
        assert_eq!(parse_size(" 1280 X 720 "), Ok((1280, 720)));
        assert!(parse_size("900").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn parses_gpu_power() {
        assert_eq!(parse_gpu_power("high"), Ok(GpuPowerPreference::High));
        assert!(parse_gpu_power("").is_err());
        assert!(parse_gpu_power("turbo").is_err());
    }

    #[test]
    fn defaults_match_renderer_config() {
        let cli = Cli::try_parse_from(["lintrans"]).unwrap();
        let defaults = renderer::RendererConfig::default();
        assert_eq!(cli.size, defaults.surface_size);
        assert_eq!(cli.title, defaults.title);
        assert_eq!(cli.gpu_power, defaults.gpu_power);
        assert!(!cli.no_vsync);
        assert!(!cli.check && !cli.print_sources);
    }

    #[test]
    fn check_and_print_sources_conflict() {
        assert!(Cli::try_parse_from(["lintrans", "--check", "--print-sources"]).is_err());
    }
}
