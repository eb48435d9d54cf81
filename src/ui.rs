use egui::Context;

use crate::view::Frame;

/// Display-only overlay. Never consumes input.
pub fn build_hud(ctx: &Context, frame: &Frame) {
    if frame.engaged {
        draw_crosshair(ctx);
    } else {
        draw_engage_hint(ctx);
    }
    draw_debug_window(ctx, frame);
    if frame.stats.pending > 0 {
        draw_loading(ctx, frame);
    }
}

fn draw_crosshair(ctx: &Context) {
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Foreground, egui::Id::new("crosshair")));
    let center = ctx.screen_rect().center();
    let size = 6.0;
    let stroke = egui::Stroke::new(1.0, egui::Color32::from_white_alpha(200));
    painter.line_segment(
        [egui::Pos2::new(center.x - size, center.y), egui::Pos2::new(center.x + size, center.y)],
        stroke,
    );
    painter.line_segment(
        [egui::Pos2::new(center.x, center.y - size), egui::Pos2::new(center.x, center.y + size)],
        stroke,
    );
}

fn draw_engage_hint(ctx: &Context) {
    egui::Area::new(egui::Id::new("engage_hint"))
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new("Click to explore").size(18.0).color(egui::Color32::WHITE));
            ui.label(
                egui::RichText::new("WASD move, Space/Shift up and down, Esc to release")
                    .small()
                    .color(egui::Color32::LIGHT_GRAY),
            );
        });
}

fn draw_debug_window(ctx: &Context, frame: &Frame) {
    let eye = frame.camera.eye;
    let stats = frame.stats;

    egui::Window::new("Debug")
        .default_pos([8.0, 8.0])
        .collapsible(true)
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(format!("FPS: {:.0}", stats.fps)).small());
            ui.label(egui::RichText::new(format!("Pos: x: {:.2} y: {:.2} z: {:.2}", eye.x, eye.y, eye.z)).small());
            ui.label(
                egui::RichText::new(format!(
                    "Yaw: {:.1} Pitch: {:.1}",
                    frame.camera.yaw.to_degrees(),
                    frame.camera.pitch.to_degrees()
                ))
                .small(),
            );
            ui.separator();
            ui.label(
                egui::RichText::new(format!(
                    "Models: {} loaded, {} pending, {} failed",
                    stats.loaded, stats.pending, stats.failed
                ))
                .small(),
            );
            ui.label(egui::RichText::new(format!("Tick: {}", stats.tick)).small());
        });
}

fn draw_loading(ctx: &Context, frame: &Frame) {
    egui::Area::new(egui::Id::new("loading"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -12.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(
                egui::RichText::new(format!("Loading {} asset(s)...", frame.stats.pending))
                    .small()
                    .color(egui::Color32::LIGHT_GRAY),
            );
        });
}
