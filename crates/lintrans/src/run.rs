//! Translates CLI input into a `RendererConfig` and dispatches to the offline
//! modes (`--print-sources`, `--check`) or the windowed run.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use renderer::{link_program, Renderer, RendererConfig, ShaderSources, UniformLayout};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

pub fn initialise_tracing() {
    let default_filter = "info,naga=warn,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    if cli.print_sources {
        return print_sources(&cli.shader);
    }
    if cli.check {
        return check(&cli.shader);
    }

    let config = renderer_config(&cli);
    info!(
        shader = %config.shader_source.display(),
        width = config.surface_size.0,
        height = config.surface_size.1,
        gpu_power = %config.gpu_power,
        vsync = config.vsync,
        "starting lintrans"
    );
    Renderer::new(config).run()
}

pub(crate) fn renderer_config(cli: &Cli) -> RendererConfig {
    RendererConfig {
        surface_size: cli.size,
        title: cli.title.clone(),
        shader_source: cli.shader.clone(),
        gpu_power: cli.gpu_power,
        vsync: !cli.no_vsync,
        ..RendererConfig::default()
    }
}

/// Mirrors what the windowed run would compile: an unreadable asset prints two
/// empty sections instead of failing. `--check` is the strict mode.
fn print_sources(path: &Path) -> Result<()> {
    let sources = ShaderSources::load(path);
    println!("VERTEX");
    print!("{}", sources.vertex);
    println!("FRAGMENT");
    print!("{}", sources.fragment);
    Ok(())
}

fn check(path: &Path) -> Result<()> {
    let sources = ShaderSources::read(path)
        .with_context(|| format!("failed to read shader asset {}", path.display()))?;
    let program = link_program(&sources)
        .with_context(|| format!("shader asset {} did not build", path.display()))?;

    println!(
        "{}: vertex entry `{}`, fragment entry `{}`",
        path.display(),
        program.vertex.entry_point(),
        program.fragment.entry_point()
    );
    match program.uniforms.as_ref() {
        Some(layout) => print_layout(layout),
        None => println!("no uniform block"),
    }
    Ok(())
}

fn print_layout(layout: &UniformLayout) {
    println!(
        "uniform block: group {} binding {} ({} bytes)",
        layout.group, layout.binding, layout.size
    );
    for (name, location) in layout.members() {
        println!(
            "  {name:<12} {:<5} offset {}",
            location.kind.to_string(),
            location.offset
        );
    }
}
