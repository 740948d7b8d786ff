//! Imgui windows: splash overlay, stats and the settings panel.

use crate::assets::source::Progress;
use crate::settings::Toggle;
use crate::stage::{Readiness, Stage};
use crate::stats::FrameStats;

const ERROR_COLOR: [f32; 4] = [1.0, 0.3, 0.3, 1.0];

/// Something the user asked for this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Start,
    Toggle(Toggle, bool),
}

/// Line shown under the Start button while loading.
fn progress_text(step: impl std::fmt::Display, progress: Option<Progress>) -> String {
    match progress.and_then(|progress| progress.percent()) {
        Some(percent) => format!("Loading {}: {}%", step, percent.round() as u32),
        None => format!("Loading {}...", step),
    }
}

pub fn draw(ui: &imgui::Ui, stage: &Stage) -> Vec<UiAction> {
    let mut actions = Vec::new();

    if *stage.readiness() != Readiness::Ready {
        draw_splash(ui, stage, &mut actions);
    }
    draw_stats(ui, stage.stats());
    if stage.panel_built() {
        draw_settings(ui, stage, &mut actions);
    }

    actions
}

fn draw_splash(ui: &imgui::Ui, stage: &Stage, actions: &mut Vec<UiAction>) {
    let [width, height] = ui.io().display_size;

    ui.window("toonstage")
        .position([width * 0.5, height * 0.5], imgui::Condition::Always)
        .position_pivot([0.5, 0.5])
        .always_auto_resize(true)
        .resizable(false)
        .collapsible(false)
        .build(|| match stage.readiness() {
            Readiness::NotStarted => {
                ui.text("Click to load the stage and start playback.");
                if ui.button("Start") {
                    actions.push(UiAction::Start);
                }
            }
            Readiness::Loading(step) => {
                let progress = stage
                    .progress()
                    .filter(|(current, _)| current == step)
                    .map(|(_, progress)| progress);
                ui.text(progress_text(step, progress));
            }
            Readiness::Failed(reason) => {
                ui.text_colored(ERROR_COLOR, "Failed to start");
                ui.text_wrapped(reason);
            }
            Readiness::Ready => {}
        });
}

fn draw_stats(ui: &imgui::Ui, stats: &FrameStats) {
    ui.window("Stats")
        .position([10.0, 10.0], imgui::Condition::FirstUseEver)
        .always_auto_resize(true)
        .build(|| {
            ui.text(format!("FPS: {:.0}", stats.fps()));
            ui.text(format!("Frame: {:.2} ms", stats.average_ms()));
            ui.text(format!("Worst: {:.2} ms", stats.max_ms()));
        });
}

fn draw_settings(ui: &imgui::Ui, stage: &Stage, actions: &mut Vec<UiAction>) {
    let [width, _] = ui.io().display_size;

    ui.window("Settings")
        .position([width - 10.0, 10.0], imgui::Condition::FirstUseEver)
        .position_pivot([1.0, 0.0])
        .always_auto_resize(true)
        .build(|| {
            for toggle in Toggle::ALL {
                let mut value = stage.settings().get(toggle);
                if ui.checkbox(toggle.label(), &mut value) {
                    actions.push(UiAction::Toggle(toggle, value));
                }
            }
        });
}
