use std::collections::BTreeSet;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// One entry of the server-reported workspace structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<TreeNode>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeStatus {
    Loading,
    Empty,
    Failed(String),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileIcon {
    Code,
    Text,
    Image,
    Generic,
}

impl FileIcon {
    pub fn for_name(name: &str) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "js" | "jsx" | "ts" | "tsx" | "html" | "htm" | "xml" | "css" | "scss" | "sass"
            | "less" | "py" | "pyc" | "json" | "yaml" | "yml" | "toml" => Self::Code,
            "md" | "txt" => Self::Text,
            "jpg" | "jpeg" | "png" | "gif" | "svg" => Self::Image,
            _ => Self::Generic,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Self::Code => "📜",
            Self::Text => "📄",
            Self::Image => "🖼",
            Self::Generic => "🗋",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    File(FileIcon),
    Directory { expanded: bool, empty: bool },
}

/// Flattened view of a single node, in preorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub name: String,
    pub path: String,
    pub kind: RowKind,
    /// False when some ancestor directory is collapsed.
    pub visible: bool,
    pub active: bool,
}

impl TreeRow {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, RowKind::Directory { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropRejection {
    NotADirectory,
    SameNode,
    IntoOwnSubtree,
}

/// Decides whether `source` may be dropped onto `target`.
pub fn check_drop(source: &str, target: &str, target_is_dir: bool) -> Result<(), DropRejection> {
    if !target_is_dir {
        return Err(DropRejection::NotADirectory);
    }
    if source == target {
        return Err(DropRejection::SameNode);
    }
    if target.starts_with(&format!("{source}/")) {
        return Err(DropRejection::IntoOwnSubtree);
    }
    Ok(())
}

/// Joins a parent path and a child name; the workspace root is `""`.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Client-side model of the workspace tree.
///
/// Node paths are derived from the name chain from the root, so every row
/// satisfies `path == parent.path + "/" + name`. The expanded set is keyed the
/// same way.
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<TreeNode>,
    status: TreeStatus,
    expanded: BTreeSet<String>,
}

impl Default for FileTree {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            status: TreeStatus::Loading,
            expanded: BTreeSet::new(),
        }
    }
}

impl FileTree {
    pub fn status(&self) -> &TreeStatus {
        &self.status
    }

    /// Shows the loading placeholder, but only while nothing is displayed yet.
    pub fn mark_loading(&mut self) {
        if self.nodes.is_empty() {
            self.status = TreeStatus::Loading;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.nodes.clear();
        self.status = TreeStatus::Failed(message.into());
    }

    /// Replaces the tree with a fresh snapshot and restores expansion for every
    /// directory whose name-chain path still resolves. Returns the expanded
    /// paths that were dropped because they no longer exist.
    pub fn reconcile(&mut self, nodes: Vec<TreeNode>) -> Vec<String> {
        let previous = std::mem::take(&mut self.expanded);
        self.nodes = nodes;
        self.status = if self.nodes.is_empty() {
            TreeStatus::Empty
        } else {
            TreeStatus::Ready
        };

        let mut dropped = Vec::new();
        for path in previous {
            if self.find(&path).is_some_and(TreeNode::is_dir) {
                self.expanded.insert(path);
            } else {
                dropped.push(path);
            }
        }
        dropped
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn toggle(&mut self, path: &str) {
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_string());
        }
    }

    /// Expands `path` and all of its ancestors.
    pub fn expand(&mut self, path: &str) {
        let mut prefix = String::new();
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            prefix = join_path(&prefix, segment);
            self.expanded.insert(prefix.clone());
        }
    }

    /// Looks a node up by its name-chain path.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        let mut level = &self.nodes;
        let mut found = None;
        for segment in path.split('/') {
            let node = level.iter().find(|node| node.name == segment)?;
            level = &node.children;
            found = Some(node);
        }
        found
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Flattens the tree in preorder. Hidden descendants of collapsed
    /// directories are included with `visible == false`.
    pub fn rows(&self, active: Option<&str>) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        self.collect_rows(&self.nodes, "", 0, true, active, &mut rows);
        rows
    }

    fn collect_rows(
        &self,
        nodes: &[TreeNode],
        parent: &str,
        depth: usize,
        visible: bool,
        active: Option<&str>,
        rows: &mut Vec<TreeRow>,
    ) {
        for node in nodes {
            let path = join_path(parent, &node.name);
            let kind = match node.kind {
                NodeKind::File => RowKind::File(FileIcon::for_name(&node.name)),
                NodeKind::Directory => RowKind::Directory {
                    expanded: self.is_expanded(&path),
                    empty: node.children.is_empty(),
                },
            };
            rows.push(TreeRow {
                depth,
                name: node.name.clone(),
                path: path.clone(),
                kind,
                visible,
                active: active == Some(path.as_str()),
            });
            if node.is_dir() {
                let children_visible = visible && self.is_expanded(&path);
                self.collect_rows(&node.children, &path, depth + 1, children_visible, active, rows);
            }
        }
    }
}
