use crate::error::{AppError, AppResult};
use crate::ports::{UserDirectory, UserFilter};
use crate::utils::remove_duplicates;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Department and branch membership loaded once from a JSON file:
///
/// ```json
/// { "departments": { "d-1": ["u-1", "u-2"] }, "branches": { "b-1": ["u-3"] } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticUserDirectory {
    #[serde(default)]
    departments: HashMap<String, Vec<String>>,
    #[serde(default)]
    branches: HashMap<String, Vec<String>>,
}

impl StaticUserDirectory {
    pub fn new(departments: HashMap<String, Vec<String>>, branches: HashMap<String, Vec<String>>) -> Self {
        Self { departments, branches }
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read directory file {}: {}", path.display(), e))
        })?;
        let directory: Self = serde_json::from_str(&raw)?;
        info!(
            "Loaded user directory: {} department(s), {} branch(es)",
            directory.departments.len(),
            directory.branches.len()
        );
        Ok(directory)
    }

    fn members<'a>(groups: &'a HashMap<String, Vec<String>>, ids: &'a [String]) -> impl Iterator<Item = String> + 'a {
        ids.iter()
            .filter_map(move |id| groups.get(id))
            .flat_map(|users| users.iter().cloned())
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn list_user_ids(&self, filter: UserFilter) -> AppResult<Vec<String>> {
        let users: Vec<String> = Self::members(&self.departments, &filter.department_ids)
            .chain(Self::members(&self.branches, &filter.branch_ids))
            .collect();
        Ok(remove_duplicates(users))
    }
}
