//! プロジェクトストア
//!
//! 文字列キーの永続ストアに、プロジェクト一覧をJSON配列として丸ごと読み書きする

mod backend;

pub use backend::{FileStore, KeyValueStore, MemoryStore};

use crate::error::{IcodeError, Result};
use crate::project::Project;
use std::time::{SystemTime, UNIX_EPOCH};

/// プロジェクト一覧を保存するキー
pub const PROJECTS_KEY: &str = "iCodeWinProjects";

/// 永続化されたプロジェクト一覧と、その読み書き先
pub struct ProjectStore {
    backend: Box<dyn KeyValueStore>,
    projects: Vec<Project>,
}

impl ProjectStore {
    /// ストアから一覧を読み込む。未保存なら空
    pub fn load(backend: Box<dyn KeyValueStore>) -> Result<Self> {
        let projects: Vec<Project> = match backend.get(PROJECTS_KEY)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        };
        log::debug!("loaded {} projects", projects.len());
        Ok(Self { backend, projects })
    }

    /// 一覧全体を書き戻す
    pub fn save(&mut self) -> Result<()> {
        let raw = serde_json::to_string(&self.projects)?;
        self.backend.set(PROJECTS_KEY, &raw)?;
        log::debug!("saved {} projects", self.projects.len());
        Ok(())
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|project| project.id == id)
    }

    /// 雛形付きのプロジェクトを作成して保存する
    pub fn create_project(&mut self, name: &str) -> Result<&Project> {
        let id = self.generate_id();
        let project = Project::new(id, name.trim())?;
        log::info!("created project {} ({})", project.name, project.id);
        self.projects.push(project);
        self.save()?;
        Ok(&self.projects[self.projects.len() - 1])
    }

    /// プロジェクトを削除して保存する
    pub fn delete_project(&mut self, id: &str) -> Result<Project> {
        let index = self
            .projects
            .iter()
            .position(|project| project.id == id)
            .ok_or_else(|| IcodeError::not_found(id))?;
        let removed = self.projects.remove(index);
        self.save()?;
        log::info!("deleted project {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    pub fn set_icon(&mut self, id: &str, icon: &str) -> Result<()> {
        let project = self.get_mut(id).ok_or_else(|| IcodeError::not_found(id))?;
        project.icon = Some(icon.to_string());
        self.save()
    }

    /// `project_<ミリ秒>` 形式の一意なID
    fn generate_id(&self) -> String {
        let mut stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|dur| dur.as_millis())
            .unwrap_or_default();
        loop {
            let id = format!("project_{}", stamp);
            if self.get(&id).is_none() {
                return id;
            }
            stamp += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Category;

    #[test]
    fn test_empty_store_loads_no_projects() {
        let store = ProjectStore::load(Box::new(MemoryStore::new())).unwrap();
        assert!(store.projects().is_empty());
    }

    #[test]
    fn test_create_persists_immediately() {
        let backend = MemoryStore::new();
        let mut store = ProjectStore::load(Box::new(backend.clone())).unwrap();
        let id = store.create_project("Demo").unwrap().id.clone();

        let reloaded = ProjectStore::load(Box::new(backend)).unwrap();
        let project = reloaded.get(&id).unwrap();
        assert_eq!(project.name, "Demo");
        assert!(project.has_file(Category::Markup, "index.html"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut store = ProjectStore::load(Box::new(MemoryStore::new())).unwrap();
        let first = store.create_project("One").unwrap().id.clone();
        let second = store.create_project("Two").unwrap().id.clone();
        assert_ne!(first, second);
        assert!(first.starts_with("project_"));
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let mut store = ProjectStore::load(Box::new(MemoryStore::new())).unwrap();
        assert!(matches!(
            store.create_project(""),
            Err(IcodeError::Validation(_))
        ));
        assert!(store.projects().is_empty());
    }

    #[test]
    fn test_delete_unknown_project_is_not_found() {
        let mut store = ProjectStore::load(Box::new(MemoryStore::new())).unwrap();
        let kept = store.create_project("Keep").unwrap().id.clone();
        assert!(matches!(
            store.delete_project("project_0"),
            Err(IcodeError::NotFound(_))
        ));
        assert!(store.get(&kept).is_some());
    }

    #[test]
    fn test_set_icon_round_trips() {
        let backend = MemoryStore::new();
        let mut store = ProjectStore::load(Box::new(backend.clone())).unwrap();
        let id = store.create_project("Iconic").unwrap().id.clone();
        store.set_icon(&id, "data:image/png;base64,AAAA").unwrap();

        let reloaded = ProjectStore::load(Box::new(backend)).unwrap();
        assert_eq!(
            reloaded.get(&id).unwrap().icon.as_deref(),
            Some("data:image/png;base64,AAAA")
        );
    }

    #[test]
    fn test_corrupt_record_is_storage_error() {
        let backend = MemoryStore::new();
        backend.insert(PROJECTS_KEY, "{not json");
        assert!(matches!(
            ProjectStore::load(Box::new(backend)),
            Err(IcodeError::Storage(_))
        ));
    }
}
