use relay_protocol::{TodoItem, TodoStatus};

/// The todo list one run plans against. Ids start at 1 and are never reused.
#[derive(Debug, Default, Clone)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    pub fn add(&mut self, text: impl Into<String>) -> TodoItem {
        let id = u32::try_from(self.items.len() + 1).unwrap_or(u32::MAX);
        let item = TodoItem::new(id, text);
        self.items.push(item.clone());
        item
    }

    pub fn set_status(&mut self, id: u32, status: TodoStatus) -> Option<TodoItem> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.status = status;
        Some(item.clone())
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn remaining(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status != TodoStatus::Done)
            .count()
    }
}
