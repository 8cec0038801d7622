use eframe::egui;
use imgfetch_core::{AppViewModel, Msg, Stage, StatusView};

use super::constants::*;

/// Draws one frame from the view model and returns the messages the user produced.
pub fn render(
    ctx: &egui::Context,
    view: &AppViewModel,
    texture: Option<&egui::TextureHandle>,
) -> Vec<Msg> {
    let mut msgs = Vec::new();

    egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
        ui.label(status_text(&view.status, view.in_flight));
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        ui.horizontal(|ui| {
            let mut url = view.url_input.clone();
            let width = (ui.available_width() - URL_ROW_RESERVED_WIDTH).max(120.0);
            let response = ui.add(
                egui::TextEdit::singleline(&mut url)
                    .hint_text(URL_HINT)
                    .desired_width(width),
            );
            if response.changed() {
                msgs.push(Msg::InputChanged(url));
            }
            let submitted =
                response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            if ui.button(DOWNLOAD_LABEL).clicked() || submitted {
                msgs.push(Msg::DownloadClicked);
            }
            if view.busy {
                ui.add(egui::Spinner::new());
            }
        });

        if let Some(error) = &view.error {
            ui.horizontal(|ui| {
                let color = ui.visuals().error_fg_color;
                ui.colored_label(color, error);
                if ui.small_button(DISMISS_LABEL).clicked() {
                    msgs.push(Msg::ErrorDismissed);
                }
            });
        }

        ui.separator();

        ui.centered_and_justified(|ui| match texture {
            Some(texture) => {
                ui.add(egui::Image::from_texture(texture).shrink_to_fit());
            }
            None => {
                ui.weak(EMPTY_HINT);
            }
        });
    });

    msgs
}

pub fn status_text(status: &StatusView, in_flight: usize) -> String {
    let base = match status {
        StatusView::Ready => "Ready".to_string(),
        StatusView::Fetching {
            target,
            stage,
            bytes,
        } => match (stage, bytes) {
            (Stage::Connecting, _) => format!("Connecting for {target}..."),
            (Stage::Downloading, Some(bytes)) => {
                format!("Downloading {target} ({})", format_bytes(*bytes))
            }
            (Stage::Downloading, None) => format!("Downloading {target}..."),
            (Stage::Decoding, _) => format!("Decoding {target}..."),
        },
        StatusView::Loaded { width, height } => format!("Loaded {width}x{height}"),
        StatusView::Failed => "Download failed".to_string(),
    };
    if in_flight > 1 {
        format!("{base} | {in_flight} downloads running")
    } else {
        base
    }
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
