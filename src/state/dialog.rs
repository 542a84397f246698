use egui::{Pos2, Rect, Vec2};

use super::tree::join_path;

/// What a tree node context menu was opened on. The workspace root has an
/// empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuTarget {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
}

impl MenuTarget {
    pub fn root() -> Self {
        Self {
            path: String::new(),
            name: "根目录".to_string(),
            is_directory: true,
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    fn type_text(&self) -> &'static str {
        if self.is_directory {
            "文件夹"
        } else {
            "文件"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    NewFile,
    NewDirectory,
    Rename,
    Delete,
}

impl MenuItem {
    pub fn label(self) -> &'static str {
        match self {
            Self::NewFile => "🗋 新建文件",
            Self::NewDirectory => "🗀 新建文件夹",
            Self::Rename => "✏ 重命名",
            Self::Delete => "🗑 删除",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    pub target: MenuTarget,
    pub position: Pos2,
}

impl ContextMenu {
    pub fn items(&self) -> Vec<MenuItem> {
        let mut items = Vec::new();
        if self.target.is_directory {
            items.extend([MenuItem::NewFile, MenuItem::NewDirectory]);
        }
        if !self.target.is_root() {
            items.extend([MenuItem::Rename, MenuItem::Delete]);
        }
        items
    }
}

/// Keeps a popup of `size` opened at `position` inside `viewport`.
pub fn clamp_to_viewport(position: Pos2, size: Vec2, viewport: Rect) -> Pos2 {
    let max_x = (viewport.max.x - size.x).max(viewport.min.x);
    let max_y = (viewport.max.y - size.y).max(viewport.min.y);
    Pos2::new(
        position.x.clamp(viewport.min.x, max_x),
        position.y.clamp(viewport.min.y, max_y),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    CreateFile { parent: String },
    CreateDirectory { parent: String },
    Rename { path: String, current_name: String },
    Delete { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogKind {
    Prompt { label: String, value: String },
    Confirm { message: String },
}

/// A blocking modal; exactly one can be open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub kind: DialogKind,
    pub action: DialogAction,
}

impl Dialog {
    pub fn for_menu(item: MenuItem, target: &MenuTarget) -> Self {
        match item {
            MenuItem::NewFile => Self::new_file(&target.path),
            MenuItem::NewDirectory => Self::new_directory(&target.path),
            MenuItem::Rename => Self {
                title: format!("重命名{}", target.type_text()),
                kind: DialogKind::Prompt {
                    label: format!("输入新的{}名称:", target.type_text()),
                    value: target.name.clone(),
                },
                action: DialogAction::Rename {
                    path: target.path.clone(),
                    current_name: target.name.clone(),
                },
            },
            MenuItem::Delete => {
                let mut message = format!("确定要删除{} \"{}\" 吗?", target.type_text(), target.name);
                if target.is_directory {
                    message.push_str("\n注意：这将删除其中的所有内容！");
                }
                Self {
                    title: format!("删除{}", target.type_text()),
                    kind: DialogKind::Confirm { message },
                    action: DialogAction::Delete {
                        path: target.path.clone(),
                    },
                }
            }
        }
    }

    pub fn new_file(parent: &str) -> Self {
        Self {
            title: "新建文件".to_string(),
            kind: DialogKind::Prompt {
                label: "输入新文件名称:".to_string(),
                value: "newfile.txt".to_string(),
            },
            action: DialogAction::CreateFile {
                parent: parent.to_string(),
            },
        }
    }

    pub fn new_directory(parent: &str) -> Self {
        Self {
            title: "新建文件夹".to_string(),
            kind: DialogKind::Prompt {
                label: "输入新文件夹名称:".to_string(),
                value: "newfolder".to_string(),
            },
            action: DialogAction::CreateDirectory {
                parent: parent.to_string(),
            },
        }
    }

    /// Resolves the confirmed dialog into a workspace mutation, if any.
    pub fn resolve(self) -> Option<Mutation> {
        let input = match &self.kind {
            DialogKind::Prompt { value, .. } => value.trim().to_string(),
            DialogKind::Confirm { .. } => String::new(),
        };
        match self.action {
            DialogAction::CreateFile { parent } if !input.is_empty() => {
                Some(Mutation::CreateFile(join_path(&parent, &input)))
            }
            DialogAction::CreateDirectory { parent } if !input.is_empty() => {
                Some(Mutation::CreateDirectory(join_path(&parent, &input)))
            }
            DialogAction::Rename { path, current_name }
                if !input.is_empty() && input != current_name =>
            {
                Some(Mutation::Rename {
                    path,
                    new_name: input,
                })
            }
            DialogAction::Delete { path } => Some(Mutation::Delete(path)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateFile(String),
    CreateDirectory(String),
    Rename { path: String, new_name: String },
    Delete(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(path: &str, is_directory: bool) -> MenuTarget {
        MenuTarget {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            is_directory,
        }
    }

    #[test]
    fn menu_items_depend_on_target() {
        let menu = |target| ContextMenu {
            target,
            position: Pos2::ZERO,
        };
        assert_eq!(
            menu(target("src", true)).items(),
            vec![MenuItem::NewFile, MenuItem::NewDirectory, MenuItem::Rename, MenuItem::Delete]
        );
        assert_eq!(
            menu(target("a.py", false)).items(),
            vec![MenuItem::Rename, MenuItem::Delete]
        );
        assert_eq!(
            menu(MenuTarget::root()).items(),
            vec![MenuItem::NewFile, MenuItem::NewDirectory]
        );
    }

    #[test]
    fn clamps_menu_inside_viewport() {
        let viewport = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let size = Vec2::new(160.0, 120.0);
        assert_eq!(
            clamp_to_viewport(Pos2::new(780.0, 590.0), size, viewport),
            Pos2::new(640.0, 480.0)
        );
        assert_eq!(
            clamp_to_viewport(Pos2::new(10.0, 20.0), size, viewport),
            Pos2::new(10.0, 20.0)
        );
    }

    #[test]
    fn prompts_resolve_to_mutations() {
        let dialog = Dialog::for_menu(MenuItem::NewFile, &target("src", true));
        assert_eq!(dialog.resolve(), Some(Mutation::CreateFile("src/newfile.txt".to_string())));

        let dialog = Dialog::new_directory("");
        assert_eq!(dialog.resolve(), Some(Mutation::CreateDirectory("newfolder".to_string())));
    }

    #[test]
    fn rename_requires_a_changed_name() {
        let mut dialog = Dialog::for_menu(MenuItem::Rename, &target("src/a.py", false));
        assert_eq!(dialog.clone().resolve(), None);

        if let DialogKind::Prompt { value, .. } = &mut dialog.kind {
            *value = "  ".to_string();
        }
        assert_eq!(dialog.clone().resolve(), None);

        if let DialogKind::Prompt { value, .. } = &mut dialog.kind {
            *value = "b.py".to_string();
        }
        assert_eq!(
            dialog.resolve(),
            Some(Mutation::Rename {
                path: "src/a.py".to_string(),
                new_name: "b.py".to_string(),
            })
        );
    }

    #[test]
    fn directory_delete_warns_about_contents() {
        let dialog = Dialog::for_menu(MenuItem::Delete, &target("docs", true));
        assert_eq!(dialog.title, "删除文件夹");
        let DialogKind::Confirm { message } = &dialog.kind else {
            panic!("delete uses a confirm dialog");
        };
        assert!(message.contains("删除其中的所有内容"));
        assert_eq!(dialog.resolve(), Some(Mutation::Delete("docs".to_string())));
    }
}
