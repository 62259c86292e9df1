//! AuroraMapper command line
//!
//! Renders projects offline, writes starter projects, prints layer info and
//! picks layers under an output position.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use glam::Vec2;

use aurora_mapper::math::{normalized_to_ndc, Viewport};
use aurora_mapper::project::{OutputSettings, ProjectDocument, ViewSettings};
use aurora_mapper::render::{CpuRasterizer, GpuContext, GpuRenderer, RenderBackend, StencilCompositor};
use aurora_mapper::scene::{CachedLayer, GeometryCache, LayerKind, Scene, SceneCommand};
use aurora_mapper::settings::CompositorSettings;
use aurora_mapper::source::StillSource;

#[derive(Parser, Debug)]
#[command(name = "aurora-mapper", version, about = "Projection mapping compositor")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one frame of a project to a PNG.
    Render(RenderArgs),
    /// Write a starter project with one surface.
    New(NewArgs),
    /// List a project's layers and surface homographies.
    Inspect(InspectArgs),
    /// Report the layer, handle and surface UV under an output position.
    Pick(PickArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Cpu,
    Gpu,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Project JSON.
    #[arg(long)]
    project: PathBuf,

    /// Image used as the frame for every surface.
    #[arg(long)]
    frame: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Compositor settings JSON. Output size defaults to the project's.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Backend::Cpu)]
    backend: Backend,
}

#[derive(Parser, Debug)]
struct NewArgs {
    /// Output project JSON.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value = "Untitled Project")]
    name: String,

    /// Also add the default triangle mask.
    #[arg(long, default_value_t = false)]
    with_mask: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Project JSON.
    project: PathBuf,
}

#[derive(Parser, Debug)]
struct PickArgs {
    /// Project JSON.
    project: PathBuf,

    /// Output pixel as `x,y`.
    #[arg(long, value_delimiter = ',', num_args = 2, conflicts_with = "at")]
    pixel: Option<Vec<u32>>,

    /// Canvas position as `u,v` in 0..1, origin top-left.
    #[arg(long, value_delimiter = ',', num_args = 2)]
    at: Option<Vec<f32>>,

    /// Compositor settings JSON (handle radius).
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::New(args) => cmd_new(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Pick(args) => cmd_pick(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let document = ProjectDocument::load(&args.project)
        .with_context(|| format!("load project {}", args.project.display()))?;
    let scene = document.to_scene()?;

    let settings = match &args.settings {
        Some(path) => CompositorSettings::load(path)
            .with_context(|| format!("load settings {}", path.display()))?,
        None => CompositorSettings {
            width: document.output_settings.width,
            height: document.output_settings.height,
            ..Default::default()
        },
    };

    let frame = image::open(&args.frame)
        .with_context(|| format!("open frame {}", args.frame.display()))?
        .to_rgba8();

    let image = match args.backend {
        Backend::Cpu => {
            let mut backend = CpuRasterizer::new(settings.width, settings.height, settings.texture_filter)?;
            let mut compositor = StencilCompositor::new(&settings);
            compositor.render(&scene, &StillSource(Arc::new(frame)), &mut backend)?;
            backend.read_pixels()?
        }
        Backend::Gpu => {
            let context = Arc::new(GpuContext::new()?);
            let mut backend = GpuRenderer::new(&settings);
            backend.init(context)?;
            let texture = backend.upload_texture(&frame)?;
            let mut compositor = StencilCompositor::new(&settings);
            compositor.render(&scene, &StillSource(texture), &mut backend)?;
            let image = backend.read_pixels()?;
            backend.teardown();
            image
        }
    };

    image
        .save(&args.out)
        .with_context(|| format!("write {}", args.out.display()))?;
    log::info!(
        "Rendered {} layers at {}x{} to {:?}",
        scene.len(),
        settings.width,
        settings.height,
        args.out
    );
    Ok(())
}

fn cmd_new(args: NewArgs) -> anyhow::Result<()> {
    let mut scene = Scene::new();
    scene.apply(SceneCommand::AddLayer { kind: LayerKind::Surface })?;
    if args.with_mask {
        scene.apply(SceneCommand::AddLayer { kind: LayerKind::Mask })?;
    }

    let document = ProjectDocument::from_scene(
        args.name,
        &scene,
        ViewSettings::default(),
        OutputSettings::default(),
    );
    document.save(&args.out)
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let document = ProjectDocument::load(&args.project)?;
    let scene = document.to_scene()?;
    let mut cache = GeometryCache::new();

    println!("{} (version {})", document.name, document.version);
    println!(
        "output: screen {} at {}x{}",
        document.output_settings.selected_screen_index,
        document.output_settings.width,
        document.output_settings.height
    );

    for (index, layer) in scene.layers().iter().enumerate() {
        let grid = layer.grid();
        println!(
            "[{index}] {} '{}' {} visible={} opacity={:.2} softness={:.2} points={}",
            layer.kind().name(),
            layer.name,
            layer.id,
            layer.is_visible(),
            layer.opacity(),
            layer.edge_softness(),
            grid.len()
        );
        if layer.kind() == LayerKind::Surface {
            let CachedLayer { homography, .. } = cache.get(layer);
            println!("    grid {}x{}", grid.rows, grid.cols);
            for row in &homography.m {
                println!("    [{:>10.5} {:>10.5} {:>10.5}]", row[0], row[1], row[2]);
            }
        }
    }
    Ok(())
}

fn cmd_pick(args: PickArgs) -> anyhow::Result<()> {
    let document = ProjectDocument::load(&args.project)?;
    let scene = document.to_scene()?;
    let settings = match &args.settings {
        Some(path) => CompositorSettings::load(path)
            .with_context(|| format!("load settings {}", path.display()))?,
        None => CompositorSettings::default(),
    };

    let ndc = if let Some(&[x, y]) = args.pixel.as_deref() {
        let output = &document.output_settings;
        Viewport::from_pixels(output.width, output.height).pixel_center_ndc(x, y)
    } else if let Some(&[u, v]) = args.at.as_deref() {
        normalized_to_ndc(Vec2::new(u, v))
    } else {
        anyhow::bail!("pass --pixel x,y or --at u,v");
    };
    println!("ndc: ({:.4}, {:.4})", ndc.x, ndc.y);

    if let Some((id, index)) = scene.point_at(ndc, settings.handle_radius) {
        if let Some(layer) = scene.layer(id) {
            println!("handle: '{}' point {index}", layer.name);
        }
    }

    match scene.layer_at(ndc).and_then(|id| scene.layer(id)) {
        Some(layer) => {
            println!("layer: {} '{}'", layer.kind().name(), layer.name);
            if let Some(uv) = scene.surface_uv_at(layer.id, ndc) {
                println!("uv: ({:.4}, {:.4})", uv.x, uv.y);
            }
        }
        None => println!("layer: none"),
    }
    Ok(())
}
