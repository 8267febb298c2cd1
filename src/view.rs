//! Vista jerárquica de los ficheros de un usuario.
//!
//! El listado llega plano (cada nodo apunta a su carpeta padre) y aquí se
//! reconstruye lo que necesita el navegador de ficheros:
//!   - los hijos directos de la carpeta actual, separados en ficheros y carpetas;
//!   - las migas de pan desde la raíz hasta la carpeta actual.

use std::collections::{HashMap, HashSet};

use mime_guess::MimeGuess;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{FileNode, FolderNode, Node, RawNodeRecord};

pub const UNNAMED_FOLDER: &str = "Unnamed Folder";
pub const UNNAMED_FILE: &str = "Unnamed File";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("folder hierarchy contains a cycle at {0}")]
    CycleDetected(String),
}

/// Un eslabón de las migas de pan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub id: String,
    pub name: String,
}

/// Hijos directos de una carpeta, en el orden del listado.
#[derive(Debug, Default)]
pub struct Children<'a> {
    pub files: Vec<&'a FileNode>,
    pub folders: Vec<&'a FolderNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedFile {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub size: Option<i64>,
    pub created_at: Option<String>,
    pub folder_name: Option<String>,
    pub parent_folder_id: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub id: String,
    pub name: String,
}

/// Lo que consume el navegador de ficheros para una carpeta concreta.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderView {
    pub current_folder_id: Option<String>,
    pub files: Vec<ManagedFile>,
    pub folders: Vec<FolderSummary>,
    pub breadcrumb: Vec<Crumb>,
}

impl FolderView {
    pub fn empty(current_folder_id: Option<&str>) -> Self {
        Self {
            current_folder_id: current_folder_id.map(str::to_string),
            files: Vec::new(),
            folders: Vec::new(),
            breadcrumb: Vec::new(),
        }
    }
}

/// Convierte el listado crudo en nodos tipados, descartando (y registrando)
/// los registros que no se pueden interpretar.
///
/// Los ids repetidos se conservan (las migas de pan resuelven por tipo) pero
/// se avisan en el log.
pub fn validate_records(records: Vec<RawNodeRecord>) -> Vec<Node> {
    let nodes: Vec<Node> = records
        .into_iter()
        .filter_map(|record| match Node::try_from(record) {
            Ok(node) => Some(node),
            Err(rejection) => {
                warn!("Registro de fichero descartado: {rejection}");
                None
            }
        })
        .collect();

    let mut seen = HashSet::new();
    for node in &nodes {
        if !seen.insert(node.id()) {
            warn!("Id de nodo repetido en el listado: {}", node.id());
        }
    }
    nodes
}

pub fn children_of<'a>(nodes: &'a [Node], folder_id: Option<&str>) -> Children<'a> {
    let mut children = Children::default();
    for node in nodes.iter().filter(|n| n.parent_folder_id() == folder_id) {
        match node {
            Node::File(file) => children.files.push(file),
            Node::Folder(folder) => children.folders.push(folder),
        }
    }
    children
}

pub fn folder_display_name(folder: &FolderNode) -> String {
    usable(&folder.name)
        .or_else(|| usable(&folder.folder_name))
        .unwrap_or(UNNAMED_FOLDER)
        .to_string()
}

pub fn file_display_name(file: &FileNode) -> String {
    usable(&file.name).unwrap_or(UNNAMED_FILE).to_string()
}

fn usable(name: &Option<String>) -> Option<&str> {
    name.as_deref().filter(|n| !n.is_empty())
}

/// Índice `id -> carpeta` de una instantánea del listado.
///
/// Solo indexa carpetas: si un fichero comparte id con una carpeta, las
/// migas de pan siguen a la carpeta. Con ids de carpeta duplicados gana la
/// primera aparición.
pub struct FolderIndex<'a> {
    folders: HashMap<&'a str, &'a FolderNode>,
}

impl<'a> FolderIndex<'a> {
    pub fn build(nodes: &'a [Node]) -> Self {
        let mut folders = HashMap::new();
        for node in nodes {
            if let Node::Folder(folder) = node {
                folders.entry(folder.id.as_str()).or_insert(folder);
            }
        }
        Self { folders }
    }

    pub fn get(&self, id: &str) -> Option<&'a FolderNode> {
        self.folders.get(id).copied()
    }

    /// Sube desde `folder_id` por los padres hasta la raíz o hasta el primer
    /// padre que no está en el listado.
    pub fn breadcrumb_path(&self, folder_id: Option<&str>) -> Result<Vec<Crumb>, ViewError> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = folder_id;

        while let Some(id) = current {
            let Some(folder) = self.get(id) else {
                break;
            };
            if !visited.insert(id) {
                return Err(ViewError::CycleDetected(id.to_string()));
            }
            path.push(Crumb {
                id: folder.id.clone(),
                name: folder_display_name(folder),
            });
            current = folder.parent_folder_id.as_deref();
        }

        path.reverse();
        Ok(path)
    }
}

pub fn breadcrumb_path(nodes: &[Node], folder_id: Option<&str>) -> Result<Vec<Crumb>, ViewError> {
    FolderIndex::build(nodes).breadcrumb_path(folder_id)
}

/// Construye la vista completa de `folder_id` (None = raíz).
pub fn build_view(nodes: &[Node], folder_id: Option<&str>) -> Result<FolderView, ViewError> {
    let breadcrumb = breadcrumb_path(nodes, folder_id)?;
    let children = children_of(nodes, folder_id);

    Ok(FolderView {
        current_folder_id: folder_id.map(str::to_string),
        files: children.files.into_iter().map(managed_file).collect(),
        folders: children
            .folders
            .into_iter()
            .map(|folder| FolderSummary {
                id: folder.id.clone(),
                name: folder_display_name(folder),
            })
            .collect(),
        breadcrumb,
    })
}

fn managed_file(file: &FileNode) -> ManagedFile {
    let name = file_display_name(file);
    let content_type = MimeGuess::from_path(&name)
        .first()
        .or_else(|| file.url.as_deref().and_then(|u| MimeGuess::from_path(u).first()))
        .map(|m| m.to_string());

    ManagedFile {
        id: file.id.clone(),
        name,
        url: file.url.clone(),
        size: file.size,
        created_at: file.created_at.clone(),
        folder_name: file.folder_name.clone(),
        parent_folder_id: file.parent_folder_id.clone(),
        content_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str, name: &str, parent: Option<&str>) -> Node {
        Node::Folder(FolderNode {
            id: id.to_string(),
            name: Some(name.to_string()).filter(|n| !n.is_empty()),
            folder_name: None,
            parent_folder_id: parent.map(str::to_string),
        })
    }

    fn file(id: &str, name: &str, parent: Option<&str>) -> Node {
        Node::File(FileNode {
            id: id.to_string(),
            name: Some(name.to_string()).filter(|n| !n.is_empty()),
            folder_name: None,
            parent_folder_id: parent.map(str::to_string),
            url: None,
            size: Some(10),
            created_at: None,
        })
    }

    fn sample() -> Vec<Node> {
        vec![
            folder("root", "Root", None),
            file("readme", "readme.txt", None),
            folder("a", "2023", Some("root")),
            file("r1", "report.pdf", Some("root")),
            folder("b", "Q4", Some("a")),
            file("r2", "invoice.pdf", Some("b")),
            file("r3", "notes.md", Some("root")),
        ]
    }

    #[test]
    fn children_partition_the_matching_subset() {
        let nodes = sample();
        for target in [None, Some("root"), Some("a"), Some("b"), Some("missing")] {
            let children = children_of(&nodes, target);
            let mut ids: Vec<&str> = children
                .files
                .iter()
                .map(|f| f.id.as_str())
                .chain(children.folders.iter().map(|f| f.id.as_str()))
                .collect();
            ids.sort();
            let mut expected: Vec<&str> = nodes
                .iter()
                .filter(|n| n.parent_folder_id() == target)
                .map(Node::id)
                .collect();
            expected.sort();
            assert_eq!(ids, expected, "carpeta {target:?}");
        }
    }

    #[test]
    fn children_keep_listing_order() {
        let nodes = sample();
        let children = children_of(&nodes, Some("root"));
        let files: Vec<&str> = children.files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(files, ["r1", "r3"]);
        assert_eq!(children.folders.len(), 1);
        assert_eq!(children.folders[0].id, "a");
    }

    #[test]
    fn breadcrumb_of_root_is_empty() {
        assert_eq!(breadcrumb_path(&sample(), None).unwrap(), Vec::<Crumb>::new());
    }

    #[test]
    fn breadcrumb_walks_from_root_to_current() {
        let path = breadcrumb_path(&sample(), Some("b")).unwrap();
        let ids: Vec<&str> = path.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["root", "a", "b"]);
        assert_eq!(path[2].name, "Q4");
    }

    #[test]
    fn breadcrumb_stops_at_missing_parent() {
        let nodes = vec![folder("orphan", "Orphan", Some("gone")), folder("child", "Child", Some("orphan"))];
        let ids: Vec<String> = breadcrumb_path(&nodes, Some("child"))
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["orphan", "child"]);
    }

    #[test]
    fn breadcrumb_of_unknown_or_file_target_is_empty() {
        let nodes = sample();
        assert!(breadcrumb_path(&nodes, Some("nope")).unwrap().is_empty());
        assert!(breadcrumb_path(&nodes, Some("r1")).unwrap().is_empty());
    }

    #[test]
    fn breadcrumb_follows_folder_when_ids_collide() {
        let nodes = vec![
            file("dup", "clash.txt", Some("elsewhere")),
            folder("top", "Top", None),
            folder("dup", "Real", Some("top")),
        ];
        let path = breadcrumb_path(&nodes, Some("dup")).unwrap();
        assert_eq!(
            path,
            vec![
                Crumb { id: "top".into(), name: "Top".into() },
                Crumb { id: "dup".into(), name: "Real".into() },
            ]
        );
    }

    #[test]
    fn breadcrumb_detects_cycles() {
        let nodes = vec![folder("x", "X", Some("y")), folder("y", "Y", Some("x"))];
        assert!(matches!(
            breadcrumb_path(&nodes, Some("x")),
            Err(ViewError::CycleDetected(_))
        ));

        let self_loop = vec![folder("s", "S", Some("s"))];
        assert_eq!(
            breadcrumb_path(&self_loop, Some("s")),
            Err(ViewError::CycleDetected("s".to_string()))
        );
    }

    #[test]
    fn missing_names_fall_back_to_labels() {
        let mut nodes = vec![folder("f", "", None), file("d", "", None)];
        let view = build_view(&nodes, None).unwrap();
        assert_eq!(view.folders[0].name, UNNAMED_FOLDER);
        assert_eq!(view.files[0].name, UNNAMED_FILE);

        if let Node::Folder(f) = &mut nodes[0] {
            f.folder_name = Some("Legacy".into());
        }
        let view = build_view(&nodes, None).unwrap();
        assert_eq!(view.folders[0].name, "Legacy");
    }

    #[test]
    fn view_guesses_content_type_from_name() {
        let view = build_view(&sample(), Some("b")).unwrap();
        assert_eq!(view.current_folder_id.as_deref(), Some("b"));
        assert_eq!(view.files[0].content_type.as_deref(), Some("application/pdf"));
        assert_eq!(view.breadcrumb.len(), 3);
    }

    #[test]
    fn validation_drops_malformed_records() {
        let records = vec![
            RawNodeRecord { id: Some("ok".into()), kind: Some("file".into()), ..Default::default() },
            RawNodeRecord { id: None, kind: Some("file".into()), ..Default::default() },
            RawNodeRecord { id: Some("odd".into()), kind: Some("link".into()), ..Default::default() },
        ];
        let nodes = validate_records(records);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id(), "ok");
    }
}
