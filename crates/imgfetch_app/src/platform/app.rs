use std::io;
use std::sync::mpsc;

use eframe::egui;
use imgfetch_core::{update, AppState, AppViewModel, Msg};
use imgfetch_logging::{imgfetch_info, imgfetch_warn};

use super::config::{self, AppConfig};
use super::effects::EffectRunner;
use super::logging;
use super::ui;

type CreateError = Box<dyn std::error::Error + Send + Sync>;

pub fn run_app() -> anyhow::Result<()> {
    let config_path = config::config_path();
    let loaded = config::load_from(&config_path);
    let config = loaded.as_ref().ok().cloned().unwrap_or_default();

    logging::initialize(config.log_destination, config.level_filter());
    if let Err(err) = &loaded {
        imgfetch_warn!("Using default settings: {}", err);
    }
    imgfetch_info!(
        "Starting imgfetch (overlap policy {:?}, flow timeout {} ms)",
        config.overlap_policy,
        config.flow_timeout_ms
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(ui::constants::WINDOW_TITLE)
            .with_inner_size(ui::constants::WINDOW_SIZE)
            .with_min_inner_size(ui::constants::MIN_WINDOW_SIZE),
        ..Default::default()
    };

    eframe::run_native(
        ui::constants::APP_ID,
        options,
        Box::new(
            move |cc: &eframe::CreationContext<'_>| -> Result<Box<dyn eframe::App>, CreateError> {
                let app = ImageFetchApp::new(&cc.egui_ctx, &config)?;
                Ok(Box::new(app))
            },
        ),
    )
    .map_err(|err| anyhow::anyhow!("UI event loop failed: {err}"))
}

struct DisplayTexture {
    revision: u64,
    handle: egui::TextureHandle,
}

/// The interactive context: owns the state and is the only reader of `msg_rx`.
struct ImageFetchApp {
    state: AppState,
    effects: EffectRunner,
    msg_rx: mpsc::Receiver<Msg>,
    texture: Option<DisplayTexture>,
}

impl ImageFetchApp {
    fn new(ctx: &egui::Context, config: &AppConfig) -> io::Result<Self> {
        let (msg_tx, msg_rx) = mpsc::channel();
        let repaint = ctx.clone();
        let mut settings = config.engine_settings();
        let max_texture_side = ctx.input(|input| input.max_texture_side);
        settings.decode.max_output_side =
            output_side_limit(settings.decode.max_output_side, max_texture_side);
        imgfetch_info!(
            "Frames are limited to {} px per side (GPU allows {})",
            settings.decode.max_output_side,
            max_texture_side
        );
        let effects = EffectRunner::new(settings, msg_tx, move || {
            repaint.request_repaint();
        })?;

        Ok(Self {
            state: AppState::with_policy(config.overlap_policy()),
            effects,
            msg_rx,
            texture: None,
        })
    }

    fn process_pending_messages(&mut self) {
        let inbox: Vec<Msg> = self.msg_rx.try_iter().collect();
        for msg in inbox {
            self.dispatch_msg(msg);
        }
    }

    fn dispatch_msg(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        if !effects.is_empty() {
            self.effects.run(effects);
        }
    }

    /// Uploads the displayed frame only when the display revision changed.
    fn sync_texture(&mut self, ctx: &egui::Context, view: &AppViewModel) {
        let Some(image) = &view.image else {
            self.texture = None;
            return;
        };
        if self
            .texture
            .as_ref()
            .is_some_and(|texture| texture.revision == image.revision)
        {
            return;
        }
        let frame = &image.frame;
        let max_texture_side = ctx.input(|input| input.max_texture_side);
        if !fits_texture(frame.width(), frame.height(), max_texture_side) {
            imgfetch_warn!(
                "Flow {} frame {}x{} exceeds the GPU texture limit {}; not displayed",
                image.flow_id,
                frame.width(),
                frame.height(),
                max_texture_side
            );
            self.texture = None;
            return;
        }
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width() as usize, frame.height() as usize],
            frame.pixels(),
        );
        let handle = ctx.load_texture(
            format!("flow-{}", image.flow_id),
            color_image,
            egui::TextureOptions::LINEAR,
        );
        self.texture = Some(DisplayTexture {
            revision: image.revision,
            handle,
        });
    }
}

/// The configured output side, never above what the GPU can hold.
fn output_side_limit(configured: u32, max_texture_side: usize) -> u32 {
    configured.min(u32::try_from(max_texture_side).unwrap_or(u32::MAX))
}

fn fits_texture(width: u32, height: u32, max_texture_side: usize) -> bool {
    width as usize <= max_texture_side && height as usize <= max_texture_side
}

impl eframe::App for ImageFetchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_pending_messages();

        let view = self.state.view();
        self.sync_texture(ctx, &view);
        let texture = self.texture.as_ref().map(|texture| &texture.handle);
        let msgs = ui::render::render(ctx, &view, texture);
        for msg in msgs {
            self.dispatch_msg(msg);
        }

        if self.state.consume_dirty() {
            ctx.request_repaint();
        }
    }
}

impl Drop for ImageFetchApp {
    fn drop(&mut self) {
        self.effects.shutdown();
    }
}
