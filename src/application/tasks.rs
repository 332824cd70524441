use crate::domain::models::Todo;
use crate::infrastructure::clock::Clock;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskListSummary {
    pub completed_count: usize,
    pub total_count: usize,
}

/// Session-only to-do list in insertion order. Everything is lost when the
/// process exits.
pub struct TaskListStore {
    todos: Vec<Todo>,
    clock: Arc<dyn Clock>,
    last_id: i64,
}

impl TaskListStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            todos: Vec::new(),
            clock,
            last_id: 0,
        }
    }

    pub fn seeded(clock: Arc<dyn Clock>) -> Self {
        let mut store = Self::new(clock);
        store.todos = vec![
            seed_todo("1", "Complete project proposal", false),
            seed_todo("2", "Review design mockups", true),
            seed_todo("3", "Prepare presentation slides", false),
        ];
        store
    }

    pub fn list(&self) -> &[Todo] {
        &self.todos
    }

    pub fn summary(&self) -> TaskListSummary {
        TaskListSummary {
            completed_count: self.todos.iter().filter(|todo| todo.completed).count(),
            total_count: self.todos.len(),
        }
    }

    /// Blank input is ignored. Duplicate text is allowed.
    pub fn add(&mut self, text: &str) -> Option<Todo> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let todo = Todo {
            id: self.next_id(),
            text: text.to_string(),
            completed: false,
        };
        self.todos.push(todo.clone());
        Some(todo)
    }

    pub fn toggle(&mut self, id: &str) -> Option<Todo> {
        let todo = self.todos.iter_mut().find(|todo| todo.id == id)?;
        todo.completed = !todo.completed;
        Some(todo.clone())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.todos.len();
        self.todos.retain(|todo| todo.id != id);
        self.todos.len() != before
    }

    // Millisecond timestamp, bumped past the previous id when two adds land
    // in the same millisecond.
    fn next_id(&mut self) -> String {
        let candidate = self.clock.now().timestamp_millis();
        self.last_id = candidate.max(self.last_id + 1);
        self.last_id.to_string()
    }
}

fn seed_todo(id: &str, text: &str, completed: bool) -> Todo {
    Todo {
        id: id.to_string(),
        text: text.to_string(),
        completed,
    }
}
