//! imgui rendition of the debug parameters

use crate::{
    debug::{DebugParameterSet, ParamKind, ParamValue},
    gfx::{color::Color, scene::Scene},
};

/// Draws one collapsible section per parameter group
///
/// Edits are routed through [`DebugParameterSet::write`]; the widget shows the
/// stored value again on the next frame, so a clamped value snaps back.
pub fn debug_panel(ui: &imgui::Ui, params: &mut DebugParameterSet, scene: &mut Scene) {
    let display_size = ui.io().display_size;
    if display_size[0] <= 0.0 || display_size[1] <= 0.0 {
        return;
    }

    ui.window("Garden")
        .size([320.0, 420.0], imgui::Condition::FirstUseEver)
        .position([display_size[0] - 340.0, 20.0], imgui::Condition::FirstUseEver)
        .collapsible(true)
        .build(|| {
            for group in params.groups() {
                if !ui.collapsing_header(group, imgui::TreeNodeFlags::DEFAULT_OPEN) {
                    continue;
                }

                let entries: Vec<_> = params
                    .params()
                    .iter()
                    .filter(|p| p.group == group)
                    .map(|p| (p.name, p.label, p.kind, p.value.clone()))
                    .collect();

                for (name, label, kind, value) in entries {
                    if let Some(edit) = draw_widget(ui, label, kind, &value) {
                        if let Err(err) = params.write(scene, name, edit) {
                            log::warn!("Rejected edit of '{}': {}", name, err);
                        }
                    }
                }
            }
        });
}

fn draw_widget(ui: &imgui::Ui, label: &str, kind: ParamKind, value: &ParamValue) -> Option<ParamValue> {
    match (kind, value) {
        (ParamKind::Color, ParamValue::Color(hex)) => {
            let mut rgb = Color::from_hex(hex).unwrap_or_default().to_array();
            ui.color_edit3(label, &mut rgb)
                .then(|| ParamValue::Color(Color::from_array(rgb).to_hex()))
        }
        (ParamKind::Slider { min, max, .. }, ParamValue::Number(current)) => {
            let mut number = *current;
            ui.slider_config(label, min, max)
                .build(&mut number)
                .then_some(ParamValue::Number(number))
        }
        _ => {
            ui.text_disabled(format!("{}: unsupported", label));
            None
        }
    }
}
