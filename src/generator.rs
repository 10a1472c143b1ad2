//! Конвейер генерации оверворлда
//!
//! Стадии выполняются строго по порядку на одном рабочем потоке:
//!
//! 1. **Базовые высоты** — четыре октавы шума с террасированием
//! 2. **Разломы** — маска расстояний до случайных ломаных
//! 3. **Эрозия** — тысячи капель, понижающих поле эрозии
//! 4. **Выветривание** — размытие эрозии и пересборка высоты
//! 5. **Климат** — температура по широте и перенос влаги по строкам
//! 6. **Биомы** — ближайший центроид в таблице
//! 7. **Вулканы** — кратеры и выжженная земля
//! 8. **Территории** — зародыши фракций и рост заливкой
//!
//! Все изменяемые буферы живут в [`PipelineContext`], которым владеет рабочий поток.
//! Вызывающий видит только [`GenerationStatus`]: состояние, прогресс и название стадии.

use crate::biome::assign_biomes;
use crate::climate::{apply_rainfall, apply_temperature};
use crate::config::GenerationSettings;
use crate::erosion::erode;
use crate::error::{GenError, Result};
use crate::faction::{Faction, check_faction_count, generate_factions};
use crate::faults::apply_faults;
use crate::grid::Grid;
use crate::heightmap::{blur_erosion, generate_height_lookup, rebuild_height, weather};
use crate::registry::Registry;
use crate::territory::grow_territories;
use crate::volcano::carve_volcanoes;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

/// Поток ГСЧ для порождения фракций (отдельно от основного потока стадий)
const FACTION_STREAM: u64 = 0xFAC7;

/// Состояние запуска генерации
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GenerationState {
    NotStarted = 0,
    Generating = 1,
    Finished = 2,
    /// Запуск отменён вызывающим, результат отброшен
    Aborted = 3,
    /// Стадия вернула ошибку или паниковала
    Failed = 4,
}

impl GenerationState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Generating,
            2 => Self::Finished,
            3 => Self::Aborted,
            4 => Self::Failed,
            _ => Self::NotStarted,
        }
    }

    /// Запуск завершён (успешно или нет)
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted | Self::Failed)
    }
}

/// Стадии конвейера в порядке выполнения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    HeightLookup,
    Faults,
    Erosion,
    Weathering,
    Climate,
    Biomes,
    Volcanoes,
    Territory,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::HeightLookup,
        Stage::Faults,
        Stage::Erosion,
        Stage::Weathering,
        Stage::Climate,
        Stage::Biomes,
        Stage::Volcanoes,
        Stage::Territory,
    ];

    /// Человекочитаемая подпись для интерфейса
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Stage::HeightLookup => "Generating heightmap",
            Stage::Faults => "Generating faults",
            Stage::Erosion => "Eroding terrain",
            Stage::Weathering => "Weathering terrain",
            Stage::Climate => "Simulating climate",
            Stage::Biomes => "Assigning biomes",
            Stage::Volcanoes => "Placing volcanoes",
            Stage::Territory => "Growing civilizations",
        }
    }

    /// Доля общего прогресса, отведённая стадии
    #[must_use]
    pub fn weight(self) -> f32 {
        match self {
            Stage::HeightLookup | Stage::Faults | Stage::Territory => 0.15,
            Stage::Erosion => 0.25,
            Stage::Weathering => 0.08,
            Stage::Climate => 0.12,
            Stage::Biomes | Stage::Volcanoes => 0.05,
        }
    }

    /// Прогресс на момент начала стадии
    #[must_use]
    pub fn start(self) -> f32 {
        Stage::ALL
            .iter()
            .take_while(|&&s| s != self)
            .map(|s| s.weight())
            .sum()
    }
}

/// Общее состояние запуска, разделяемое рабочим потоком и вызывающим
#[derive(Debug)]
pub struct GenerationStatus {
    state: AtomicU8,
    progress: AtomicU32,
    label: Mutex<String>,
    cancel: AtomicBool,
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationStatus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(GenerationState::NotStarted as u8),
            progress: AtomicU32::new(0.0f32.to_bits()),
            label: Mutex::new(String::new()),
            cancel: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn state(&self) -> GenerationState {
        GenerationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Прогресс 0.0..=1.0, только растёт
    #[must_use]
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.label
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_abort(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn set_state(&self, state: GenerationState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn set_label(&self, label: &str) {
        let mut guard = self.label.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        guard.push_str(label);
    }

    /// Поднимает прогресс до `value`; меньшие значения игнорируются.
    fn advance(&self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        let _ = self
            .progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (value > f32::from_bits(bits)).then_some(value.to_bits())
            });
    }

    fn complete(&self) {
        self.progress.store(1.0f32.to_bits(), Ordering::Release);
        self.set_state(GenerationState::Finished);
    }
}

/// Отчёт о прогрессе внутри одной стадии.
///
/// Переводит локальную долю `0..1` в общий прогресс и проверяет запрос на отмену.
pub struct StageProgress<'a> {
    status: Option<&'a GenerationStatus>,
    start: f32,
    span: f32,
}

impl<'a> StageProgress<'a> {
    #[must_use]
    pub fn new(status: &'a GenerationStatus, stage: Stage) -> Self {
        Self {
            status: Some(status),
            start: stage.start(),
            span: stage.weight(),
        }
    }

    /// Отчёт, ни с чем не связанный (для вызова стадий напрямую)
    #[must_use]
    pub fn detached() -> Self {
        Self {
            status: None,
            start: 0.0,
            span: 1.0,
        }
    }

    pub fn report(&self, fraction: f32) {
        if let Some(status) = self.status {
            status.advance(self.start + self.span * fraction.clamp(0.0, 1.0));
        }
    }

    /// Обновляет прогресс и возвращает `Aborted`, если вызывающий запросил отмену.
    pub fn checkpoint(&self, fraction: f32) -> Result<()> {
        self.report(fraction);
        match self.status {
            Some(status) if status.is_cancelled() => Err(GenError::Aborted),
            _ => Ok(()),
        }
    }
}

/// Все изменяемые данные одного запуска
pub struct PipelineContext {
    pub settings: GenerationSettings,
    pub registry: Arc<Registry>,
    pub grid: Grid,
    /// Таблица базовых высот, читается каждой пересборкой высоты
    pub height_lookup: Vec<f32>,
    pub rng: ChaCha8Rng,
    pub factions: Vec<Faction>,
}

impl PipelineContext {
    pub fn new(
        settings: GenerationSettings,
        registry: Arc<Registry>,
        factions: Option<Vec<Faction>>,
    ) -> Result<Self> {
        settings.validate()?;
        registry.validate()?;

        let factions = match factions {
            Some(list) => list,
            None => {
                let mut faction_rng = ChaCha8Rng::seed_from_u64(settings.seed);
                faction_rng.set_stream(FACTION_STREAM);
                generate_factions(&registry.races, settings.num_civilizations, &mut faction_rng)?
            }
        };
        check_faction_count(&factions)?;
        for faction in &factions {
            if registry.races.get(&faction.race).is_none() {
                return Err(GenError::UnknownRace(faction.race.clone()));
            }
        }

        Ok(Self {
            grid: Grid::new(settings.width, settings.height),
            height_lookup: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            factions,
            settings,
            registry,
        })
    }
}

/// Готовый оверворлд, передаётся вызывающему после завершения
#[derive(Debug, Clone)]
pub struct Overworld {
    pub settings: GenerationSettings,
    pub grid: Grid,
    pub factions: Vec<Faction>,
    pub registry: Arc<Registry>,
}

fn run_stage<F>(status: &GenerationStatus, stage: Stage, body: F) -> Result<()>
where
    F: FnOnce(&StageProgress<'_>) -> Result<()>,
{
    status.set_label(stage.label());
    let progress = StageProgress::new(status, stage);
    progress.checkpoint(0.0)?;

    let started = Instant::now();
    tracing::info!(target: "overworld::generator", stage = ?stage, "stage.start");
    body(&progress)?;
    progress.report(1.0);
    tracing::info!(
        target: "overworld::generator",
        stage = ?stage,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "stage.done"
    );
    Ok(())
}

/// Выполняет все стадии над контекстом
pub fn run_pipeline(ctx: &mut PipelineContext, status: &GenerationStatus) -> Result<()> {
    let seed = ctx.settings.seed;

    run_stage(status, Stage::HeightLookup, |_| {
        ctx.height_lookup = generate_height_lookup(seed, ctx.settings.width, ctx.settings.height);
        Ok(())
    })?;

    run_stage(status, Stage::Faults, |_| {
        let segments = apply_faults(&mut ctx.grid, &mut ctx.rng, seed, ctx.settings.num_faults);
        rebuild_height(&mut ctx.grid, &ctx.height_lookup);
        tracing::debug!(target: "overworld::generator", segments = segments.len(), "faults.rasterized");
        Ok(())
    })?;

    run_stage(status, Stage::Erosion, |progress| {
        let stats = erode(&mut ctx.grid, &ctx.settings, &mut ctx.rng, progress)?;
        rebuild_height(&mut ctx.grid, &ctx.height_lookup);
        tracing::debug!(
            target: "overworld::generator",
            eroded_steps = stats.eroded_steps,
            reached_sea = stats.reached_sea,
            pooled = stats.pooled,
            "erosion.stats"
        );
        Ok(())
    })?;

    run_stage(status, Stage::Weathering, |progress| {
        let weathering = &ctx.settings.weathering;
        blur_erosion(&mut ctx.grid, weathering.blur_radius);
        rebuild_height(&mut ctx.grid, &ctx.height_lookup);
        for pass in 0..weathering.passes {
            progress.checkpoint(pass as f32 / weathering.passes as f32)?;
            weather(&mut ctx.grid, &ctx.height_lookup, weathering.rate);
        }
        Ok(())
    })?;

    run_stage(status, Stage::Climate, |progress| {
        apply_temperature(&mut ctx.grid, &ctx.settings);
        progress.checkpoint(0.3)?;
        apply_rainfall(&mut ctx.grid, &ctx.settings);
        Ok(())
    })?;

    run_stage(status, Stage::Biomes, |_| {
        assign_biomes(&mut ctx.grid, &ctx.registry.biomes);
        Ok(())
    })?;

    run_stage(status, Stage::Volcanoes, |_| {
        let waste = ctx.registry.waste_biome()?;
        carve_volcanoes(&mut ctx.grid, &mut ctx.rng, ctx.settings.num_volcanoes, waste);
        Ok(())
    })?;

    run_stage(status, Stage::Territory, |progress| {
        let stats = grow_territories(
            &mut ctx.grid,
            &ctx.factions,
            &ctx.registry,
            &ctx.settings,
            &mut ctx.rng,
            progress,
        )?;
        tracing::debug!(
            target: "overworld::generator",
            seeded = stats.seeded,
            claimed = stats.claimed,
            iterations = stats.iterations,
            "territory.stats"
        );
        Ok(())
    })?;

    ctx.grid.copy_borders();
    Ok(())
}

/// Полный запуск с отчётом в `status`.
///
/// Ошибка любой стадии логируется здесь вместе с параметрами запуска и
/// возвращается вызывающему; повторных попыток нет.
pub fn generate_with_status(
    settings: GenerationSettings,
    registry: Arc<Registry>,
    factions: Option<Vec<Faction>>,
    status: &GenerationStatus,
) -> Result<Overworld> {
    status.set_state(GenerationState::Generating);
    let seed = settings.seed;
    let (width, height) = (settings.width, settings.height);
    let cells = settings.cell_count();
    tracing::info!(target: "overworld::generator", seed, width, height, cells, "generation.start");
    let started = Instant::now();

    let outcome = PipelineContext::new(settings, registry, factions).and_then(|mut ctx| {
        run_pipeline(&mut ctx, status)?;
        // Отмена, пришедшая после последней стадии, всё равно отбрасывает результат
        if status.is_cancelled() {
            return Err(GenError::Aborted);
        }
        Ok(ctx)
    });

    match outcome {
        Ok(ctx) => {
            status.complete();
            tracing::info!(
                target: "overworld::generator",
                seed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "generation.finished"
            );
            Ok(Overworld {
                settings: ctx.settings,
                grid: ctx.grid,
                factions: ctx.factions,
                registry: ctx.registry,
            })
        }
        Err(GenError::Aborted) => {
            status.set_state(GenerationState::Aborted);
            tracing::info!(target: "overworld::generator", seed, stage = %status.label(), "generation.aborted");
            Err(GenError::Aborted)
        }
        Err(err) => {
            status.set_state(GenerationState::Failed);
            tracing::error!(
                target: "overworld::generator",
                seed,
                width,
                height,
                stage = %status.label(),
                progress = status.progress(),
                error = %err,
                "generation.failed"
            );
            Err(err)
        }
    }
}

/// Синхронная генерация на текущем потоке
pub fn generate(settings: GenerationSettings, registry: Arc<Registry>) -> Result<Overworld> {
    generate_with_status(settings, registry, None, &GenerationStatus::new())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Генератор, выполняющий конвейер на отдельном рабочем потоке.
///
/// Вызывающий опрашивает [`state`](Self::state), [`progress`](Self::progress) и
/// [`stage_label`](Self::stage_label), может отменить запуск через [`abort`](Self::abort)
/// и забирает результат через [`wait`](Self::wait).
pub struct OverworldGenerator {
    settings: GenerationSettings,
    registry: Arc<Registry>,
    factions: Option<Vec<Faction>>,
    status: Arc<GenerationStatus>,
    worker: Option<JoinHandle<Result<Overworld>>>,
}

impl OverworldGenerator {
    #[must_use]
    pub fn new(settings: GenerationSettings, registry: Arc<Registry>) -> Self {
        Self {
            settings,
            registry,
            factions: None,
            status: Arc::new(GenerationStatus::new()),
            worker: None,
        }
    }

    /// Использовать заранее загруженный список фракций вместо порождения
    #[must_use]
    pub fn with_factions(mut self, factions: Vec<Faction>) -> Self {
        self.factions = Some(factions);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Запускает генерацию на новом рабочем потоке.
    ///
    /// Повторный запуск разрешён после завершения предыдущего; незабранный
    /// результат предыдущего запуска отбрасывается.
    pub fn start(&mut self) -> Result<()> {
        if self.state() == GenerationState::Generating
            || self.worker.as_ref().is_some_and(|w| !w.is_finished())
        {
            return Err(GenError::AlreadyRunning);
        }
        self.settings.validate()?;

        let status = Arc::new(GenerationStatus::new());
        status.set_state(GenerationState::Generating);
        self.status = Arc::clone(&status);

        let settings = self.settings.clone();
        let registry = Arc::clone(&self.registry);
        let factions = self.factions.clone();

        let handle = std::thread::Builder::new()
            .name("overworld-gen".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    generate_with_status(settings, registry, factions, &status)
                }));
                match outcome {
                    Ok(result) => result,
                    Err(payload) => {
                        status.set_state(GenerationState::Failed);
                        tracing::error!(
                            target: "overworld::generator",
                            stage = %status.label(),
                            panic = %panic_message(payload.as_ref()),
                            "generation.panicked"
                        );
                        panic::resume_unwind(payload)
                    }
                }
            })?;
        self.worker = Some(handle);
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> GenerationState {
        self.status.state()
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        self.status.progress()
    }

    #[must_use]
    pub fn stage_label(&self) -> String {
        self.status.label()
    }

    /// Запрашивает отмену; рабочий поток прекращает работу на ближайшей контрольной точке.
    pub fn abort(&self) {
        self.status.request_abort();
    }

    /// Ждёт завершения рабочего потока и возвращает результат.
    pub fn wait(&mut self) -> Result<Overworld> {
        let handle = self.worker.take().ok_or(GenError::NotStarted)?;
        match handle.join() {
            Ok(result) => result,
            Err(payload) => Err(GenError::WorkerPanicked(panic_message(payload.as_ref()))),
        }
    }
}

impl Drop for OverworldGenerator {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.status.request_abort();
        }
    }
}
