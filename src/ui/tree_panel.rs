use eframe::egui::{self, Align2, CornerRadius, FontId, RichText, ScrollArea, Sense, Stroke};

use crate::state::dialog::MenuTarget;
use crate::state::tree::{FileTree, RowKind, TreeRow, TreeStatus};
use crate::state::UserAction;
use crate::theme::Theme;

const ROW_HEIGHT: f32 = 24.0;
const INDENT: f32 = 16.0;

/// Drag payload carried while a tree row is being dragged.
#[derive(Debug, Clone)]
struct DraggedEntry {
    path: String,
}

pub fn show(
    ui: &mut egui::Ui,
    theme: &Theme,
    tree: &FileTree,
    active: Option<&str>,
    emit: &mut dyn FnMut(UserAction),
) {
    ui.horizontal(|ui| {
        ui.strong("工作区");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("⟳").on_hover_text("刷新").clicked() {
                emit(UserAction::RefreshTree);
            }
            if ui.small_button("🗀+").on_hover_text("新建文件夹").clicked() {
                emit(UserAction::NewDirectoryAtRoot);
            }
            if ui.small_button("🗋+").on_hover_text("新建文件").clicked() {
                emit(UserAction::NewFileAtRoot);
            }
        });
    });
    ui.separator();

    let placeholder = match tree.status() {
        TreeStatus::Loading => Some(("加载中...".to_string(), theme.text_muted)),
        TreeStatus::Empty => Some(("工作区为空".to_string(), theme.text_muted)),
        TreeStatus::Failed(message) => Some((message.clone(), theme.danger)),
        TreeStatus::Ready => None,
    };

    ScrollArea::vertical()
        .id_salt("workspace_tree")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            ui.spacing_mut().item_spacing.y = 0.0;
            if let Some((text, color)) = placeholder {
                ui.add_space(theme.spacing_8);
                ui.label(RichText::new(text).color(color).size(13.0));
            } else {
                for row in tree.rows(active).iter().filter(|row| row.visible) {
                    show_row(ui, theme, row, emit);
                    if let RowKind::Directory {
                        expanded: true,
                        empty: true,
                    } = row.kind
                    {
                        show_empty_placeholder(ui, theme, row.depth + 1);
                    }
                }
            }

            // Right-clicking the blank area below the rows targets the root.
            let rest = ui.available_rect_before_wrap();
            if rest.height() > 0.0 {
                let response = ui.interact(rest, ui.id().with("tree_background"), Sense::click());
                if response.secondary_clicked() {
                    emit(UserAction::ShowContextMenu {
                        target: MenuTarget::root(),
                        position: pointer_or(ui, rest.left_top()),
                    });
                }
            }
        });
}

fn pointer_or(ui: &egui::Ui, fallback: egui::Pos2) -> egui::Pos2 {
    ui.ctx().pointer_latest_pos().unwrap_or(fallback)
}

fn show_empty_placeholder(ui: &mut egui::Ui, theme: &Theme, depth: usize) {
    let (rect, _) = ui.allocate_exact_size(
        egui::vec2(ui.available_width(), ROW_HEIGHT),
        Sense::hover(),
    );
    ui.painter().text(
        rect.left_center() + egui::vec2(theme.spacing_8 + INDENT * depth as f32, 0.0),
        Align2::LEFT_CENTER,
        "空目录",
        FontId::proportional(12.0),
        theme.text_muted,
    );
}

fn show_row(ui: &mut egui::Ui, theme: &Theme, row: &TreeRow, emit: &mut dyn FnMut(UserAction)) {
    let (rect, response) = ui.allocate_exact_size(
        egui::vec2(ui.available_width(), ROW_HEIGHT),
        Sense::click_and_drag(),
    );

    if response.drag_started() {
        egui::DragAndDrop::set_payload(
            ui.ctx(),
            DraggedEntry {
                path: row.path.clone(),
            },
        );
    }

    let drop_hover = row.is_dir()
        && response
            .dnd_hover_payload::<DraggedEntry>()
            .is_some_and(|dragged| dragged.path != row.path);

    let painter = ui.painter();
    let radius = CornerRadius::same(theme.radius_8 / 2);
    if row.active {
        painter.rect_filled(rect, radius, theme.tree_active_fill);
    } else if response.hovered() {
        painter.rect_filled(rect, radius, theme.hover_overlay);
    }
    if drop_hover {
        painter.rect_stroke(
            rect.shrink(1.0),
            radius,
            Stroke::new(1.0, theme.accent_primary),
            egui::StrokeKind::Inside,
        );
    }

    let glyph = match row.kind {
        RowKind::Directory { expanded: true, .. } => "▾ 📂",
        RowKind::Directory { expanded: false, .. } => "▸ 📁",
        RowKind::File(icon) => icon.glyph(),
    };
    let indent = theme.spacing_8 + INDENT * row.depth as f32;
    let text_color = if row.active {
        theme.text_on_accent
    } else {
        theme.text_primary
    };
    painter.text(
        rect.left_center() + egui::vec2(indent, 0.0),
        Align2::LEFT_CENTER,
        format!("{glyph} {}", row.name),
        FontId::proportional(13.0),
        text_color,
    );

    let response = response.on_hover_text(row.path.as_str());

    if let Some(dragged) = response.dnd_release_payload::<DraggedEntry>() {
        emit(UserAction::Drop {
            source: dragged.path.clone(),
            target: row.path.clone(),
            target_is_dir: row.is_dir(),
        });
        return;
    }

    if response.clicked() {
        if row.is_dir() {
            emit(UserAction::ToggleDirectory(row.path.clone()));
        } else {
            emit(UserAction::OpenFile(row.path.clone()));
        }
    }

    if response.secondary_clicked() {
        emit(UserAction::ShowContextMenu {
            target: MenuTarget {
                path: row.path.clone(),
                name: row.name.clone(),
                is_directory: row.is_dir(),
            },
            position: pointer_or(ui, rect.left_bottom()),
        });
    }
}
