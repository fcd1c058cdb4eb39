use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: TodoStatus,
}

/// Shared todo list with a full-replacement write model: each update replaces
/// the entire list.
#[derive(Clone, Default)]
pub struct TodoStore {
    inner: Arc<Mutex<Vec<Todo>>>,
}

impl TodoStore {
    pub fn replace(&self, todos: Vec<Todo>) {
        let mut guard = self.inner.lock().expect("todo store mutex poisoned");
        *guard = todos;
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        self.inner.lock().expect("todo store mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_overwrites_the_entire_list() {
        let store = TodoStore::default();
        store.replace(vec![Todo {
            title: "first".to_string(),
            description: "a".to_string(),
            status: TodoStatus::Todo,
        }]);
        store.replace(vec![Todo {
            title: "second".to_string(),
            description: "b".to_string(),
            status: TodoStatus::Completed,
        }]);

        let todos = store.snapshot();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "second");
        assert_eq!(todos[0].status, TodoStatus::Completed);
    }
}
