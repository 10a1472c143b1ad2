use clap::Parser;
use overworld::{GenerationSettings, OverworldGenerator, Rect, Registry, generate};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Генератор оверворлда: рельеф, климат, биомы и территории фракций
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к настройкам генерации в формате TOML (по умолчанию встроенные)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Путь к реестру биомов и рас в формате TOML (по умолчанию встроенный)
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Переопределить зерно из настроек
    #[arg(short, long)]
    seed: Option<u64>,

    /// Путь для сохранения снимка
    #[arg(short, long, default_value = "overworld.png")]
    output: PathBuf,

    /// Вывести сводку по области `x,y,w,h` в JSON
    #[arg(long)]
    stats: Option<Rect>,

    /// Генерировать на текущем потоке, без рабочего потока
    #[arg(long)]
    sync: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => GenerationSettings::from_toml_file(path)?,
        None => GenerationSettings::default(),
    };
    if let Some(seed) = cli.seed {
        settings.seed = seed;
    }
    let registry = Arc::new(match &cli.registry {
        Some(path) => Registry::from_toml_file(path)?,
        None => Registry::builtin(),
    });

    tracing::info!(
        seed = settings.seed,
        width = settings.width,
        height = settings.height,
        "Генерация оверворлда"
    );

    let world = if cli.sync {
        generate(settings, registry)?
    } else {
        let mut generator = OverworldGenerator::new(settings, registry);
        generator.start()?;

        let mut last_label = String::new();
        while !generator.state().is_terminal() {
            let label = generator.stage_label();
            if label != last_label {
                tracing::info!(progress = generator.progress(), "{label}");
                last_label = label;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        generator.wait()?
    };

    world.snapshot().save_png(&cli.output)?;
    tracing::info!(output = %cli.output.display(), "Снимок сохранён");

    if let Some(rect) = cli.stats {
        let stats = world.spawn_stats(rect);
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
