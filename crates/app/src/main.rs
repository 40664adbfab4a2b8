//! Entry point for the Svarog model viewer.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use platform::{DEFAULT_MODEL, ViewerConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum GpuBackend {
    #[default]
    Auto,
    #[value(alias = "vk")]
    Vulkan,
    #[value(alias = "d3d12")]
    Dx12,
    #[value(alias = "mtl")]
    Metal,
    #[value(alias = "opengl", alias = "gles")]
    Gl,
}

impl From<GpuBackend> for wgpu::Backends {
    fn from(backend: GpuBackend) -> Self {
        match backend {
            GpuBackend::Auto => wgpu::Backends::all(),
            GpuBackend::Vulkan => wgpu::Backends::VULKAN,
            GpuBackend::Dx12 => wgpu::Backends::DX12,
            GpuBackend::Metal => wgpu::Backends::METAL,
            GpuBackend::Gl => wgpu::Backends::GL,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "svarog-viewer", about = "Minimal real-time 3D model viewer")]
struct Cli {
    /// Model file to load (OBJ or glTF)
    #[arg(default_value = DEFAULT_MODEL)]
    model: PathBuf,

    /// Initial window size, e.g. 800x600
    #[arg(long, value_parser = parse_size, default_value = "800x600")]
    size: (u32, u32),

    /// Graphics backend
    #[arg(long, value_enum, default_value_t = GpuBackend::Auto)]
    gpu_backend: GpuBackend,

    /// Log frames per second once a second
    #[arg(long)]
    show_fps: bool,

    /// Load the model without a window, log a summary and exit
    #[arg(long)]
    inspect: bool,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("invalid width '{w}': {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("invalid height '{h}': {e}"))?;
    if w == 0 || h == 0 {
        return Err("window size must be non-zero".into());
    }
    Ok((w, h))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let (width, height) = cli.size;
    let config = ViewerConfig {
        model_path: cli.model,
        width,
        height,
        backends: cli.gpu_backend.into(),
        show_fps: cli.show_fps,
        ..Default::default()
    };
    log::info!(
        "Starting Svarog Viewer. Model: {}, backend: {:?}, show_fps={}, window_size={}x{}",
        config.model_path.display(),
        cli.gpu_backend,
        config.show_fps,
        width,
        height
    );

    if cli.inspect {
        platform::inspect(config)?;
    } else {
        platform::run(config)?;
    }

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("640X480"), Ok((640, 480)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("0x480").is_err());
        assert!(parse_size("ax480").is_err());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["svarog-viewer"]);
        assert_eq!(cli.model, PathBuf::from(DEFAULT_MODEL));
        assert_eq!(cli.size, (800, 600));
        assert_eq!(cli.gpu_backend, GpuBackend::Auto);
        assert!(!cli.show_fps && !cli.inspect);
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::parse_from([
            "svarog-viewer",
            "scene.gltf",
            "--size",
            "1024x768",
            "--gpu-backend",
            "vulkan",
            "--show-fps",
        ]);
        assert_eq!(cli.model, PathBuf::from("scene.gltf"));
        assert_eq!(cli.size, (1024, 768));
        assert_eq!(wgpu::Backends::from(cli.gpu_backend), wgpu::Backends::VULKAN);
        assert!(cli.show_fps);
    }
}
