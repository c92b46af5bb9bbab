use crate::dispatcher::DispatchError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One object and the number of attempts already spent on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTask<T> {
    pub object: T,
    #[serde(default)]
    pub attempt: u32,
}

impl<T> DispatchTask<T> {
    pub fn new(object: T) -> Self {
        Self { object, attempt: 0 }
    }
}

/// Pending dispatcher tasks, persisted as TOML
///
/// ```toml
/// [[tasks]]
/// object = "https://shop.example/p/1"
/// attempt = 0
///
/// [[tasks]]
/// object = "https://shop.example/p/2"
/// attempt = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchState<T> {
    #[serde(default = "Vec::new")]
    pub tasks: Vec<DispatchTask<T>>,
}

impl<T> Default for DispatchState<T> {
    fn default() -> Self {
        Self { tasks: Vec::new() }
    }
}

impl<T> DispatchState<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Reads a state file; a missing file yields `Ok(None)`
    pub fn load(path: &Path) -> Result<Option<Self>, DispatchError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(toml::from_str(&content)?))
    }

    /// Writes the state to a sibling temporary file and renames it into place
    pub fn save(&self, path: &Path) -> Result<(), DispatchError> {
        let content = toml::to_string(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp: PathBuf = path.to_path_buf();
        tmp.as_mut_os_string().push(".tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_file_layout() {
        let state = DispatchState {
            tasks: vec![
                DispatchTask::new("https://shop.example/p/1".to_string()),
                DispatchTask {
                    object: "https://shop.example/p/2".to_string(),
                    attempt: 2,
                },
            ],
        };
        let text = toml::to_string(&state).unwrap();
        assert!(text.contains("[[tasks]]"));
        assert!(text.contains("attempt = 2"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("download.toml");
        let state = DispatchState {
            tasks: vec![DispatchTask {
                object: "a".to_string(),
                attempt: 1,
            }],
        };
        state.save(&path).unwrap();

        let loaded: DispatchState<String> = DispatchState::load(&path).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        let missing: Option<DispatchState<String>> =
            DispatchState::load(&dir.path().join("none.toml")).unwrap();
        assert!(missing.is_none());

        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();
        let empty: DispatchState<String> = DispatchState::load(&path).unwrap().unwrap();
        assert!(empty.tasks.is_empty());
    }

    #[test]
    fn test_attempt_defaults_to_zero() {
        let state: DispatchState<String> =
            toml::from_str("[[tasks]]\nobject = \"x\"\n").unwrap();
        assert_eq!(state.tasks, vec![DispatchTask::new("x".to_string())]);
    }
}
