// Presentation of a single task row
//
// A row is a pure function of (task, show_active). It never touches the store;
// user interaction is turned into a `RowIntent` and handed to the callbacks.

use crate::error::Result;
use crate::store::TaskStore;
use crate::task::TodoTask;
use colored::Colorize;

/// Title opacity for rows in the completed list
pub const DIMMED_ALPHA: f32 = 0.5;

/// Icon opacity when the task is not a favorite
pub const MUTED_ICON_ALPHA: f32 = 0.38;

/// Callbacks a parent supplies to receive user intent from a row
pub trait TaskRowCallbacks {
    fn on_select(&mut self, task: &TodoTask);
    fn on_complete(&mut self, task: &TodoTask, completed: bool);
    fn on_favorite(&mut self, task: &TodoTask, favorite: bool);
    fn on_delete(&mut self, task: &TodoTask);
}

/// Things a user can do to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEvent {
    /// Tap anywhere on the row
    Tap,
    /// Toggle the completion checkbox
    Checkbox,
    /// Tap the trailing icon
    Trailing,
}

/// What a row event asks the parent to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIntent {
    Select,
    SetCompleted(bool),
    SetFavorite(bool),
    Delete,
}

impl RowIntent {
    /// Forward a store-bound intent for `task`
    ///
    /// Returns `false` for `Select`, which is a navigation concern of the caller.
    pub async fn apply(self, store: &TaskStore, task: &TodoTask) -> Result<bool> {
        match self {
            RowIntent::Select => return Ok(false),
            RowIntent::SetCompleted(value) => store.set_completed(&task.id, value).await?,
            RowIntent::SetFavorite(value) => store.set_favorite(&task.id, value).await?,
            RowIntent::Delete => store.delete(&task.id).await?,
        }
        Ok(true)
    }
}

/// Callbacks that record intents so they can be applied to the store afterwards
///
/// Row callbacks are synchronous while store writes are async; the queue bridges
/// the two.
#[derive(Debug, Default)]
pub struct IntentQueue {
    pending: Vec<(TodoTask, RowIntent)>,
}

impl IntentQueue {
    pub fn pending(&self) -> &[(TodoTask, RowIntent)] {
        &self.pending
    }

    /// Apply queued intents in order and return the tasks that were selected
    pub async fn flush(&mut self, store: &TaskStore) -> Result<Vec<TodoTask>> {
        let mut selected = Vec::new();
        for (task, intent) in self.pending.drain(..) {
            if !intent.apply(store, &task).await? {
                selected.push(task);
            }
        }
        Ok(selected)
    }
}

impl TaskRowCallbacks for IntentQueue {
    fn on_select(&mut self, task: &TodoTask) {
        self.pending.push((task.clone(), RowIntent::Select));
    }

    fn on_complete(&mut self, task: &TodoTask, completed: bool) {
        self.pending.push((task.clone(), RowIntent::SetCompleted(completed)));
    }

    fn on_favorite(&mut self, task: &TodoTask, favorite: bool) {
        self.pending.push((task.clone(), RowIntent::SetFavorite(favorite)));
    }

    fn on_delete(&mut self, task: &TodoTask) {
        self.pending.push((task.clone(), RowIntent::Delete));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingIcon {
    Star,
    Delete,
}

impl TrailingIcon {
    fn glyph(self) -> &'static str {
        match self {
            TrailingIcon::Star => "★",
            TrailingIcon::Delete => "✗",
        }
    }
}

/// Everything needed to draw one row
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub checked: bool,
    pub title: String,
    pub title_alpha: f32,
    pub strikethrough: bool,
    pub icon: TrailingIcon,
    /// Icon uses the accent color
    pub icon_tinted: bool,
    pub icon_alpha: f32,
}

impl RowView {
    /// Render for a terminal
    pub fn render(&self) -> String {
        let checkbox = if self.checked { "[x]" } else { "[ ]" };

        let title = if self.strikethrough {
            self.title.as_str().strikethrough().dimmed()
        } else {
            self.title.as_str().normal()
        };

        let glyph = self.icon.glyph();
        let icon = match (self.icon, self.icon_tinted) {
            (TrailingIcon::Star, true) => glyph.yellow().bold(),
            (TrailingIcon::Delete, true) => glyph.red().bold(),
            (_, false) => glyph.dimmed(),
        };

        format!("{} {} {}", checkbox, title, icon)
    }
}

/// One task as shown in the active or completed list
#[derive(Debug, Clone, Copy)]
pub struct TaskRow<'a> {
    task: &'a TodoTask,
    show_active: bool,
}

impl<'a> TaskRow<'a> {
    pub fn new(task: &'a TodoTask, show_active: bool) -> Self {
        Self { task, show_active }
    }

    pub fn task(&self) -> &'a TodoTask {
        self.task
    }

    pub fn view(&self) -> RowView {
        RowView {
            checked: self.task.completed,
            title: self.task.title.clone(),
            title_alpha: if self.show_active { 1.0 } else { DIMMED_ALPHA },
            strikethrough: !self.show_active,
            icon: if self.show_active {
                TrailingIcon::Star
            } else {
                TrailingIcon::Delete
            },
            icon_tinted: self.task.favorite,
            icon_alpha: if self.task.favorite { 1.0 } else { MUTED_ICON_ALPHA },
        }
    }

    pub fn intent(&self, event: RowEvent) -> RowIntent {
        match (event, self.show_active) {
            (RowEvent::Checkbox, _) => RowIntent::SetCompleted(!self.task.completed),
            (RowEvent::Tap, true) => RowIntent::Select,
            (RowEvent::Trailing, true) => RowIntent::SetFavorite(!self.task.favorite),
            (RowEvent::Tap | RowEvent::Trailing, false) => RowIntent::Delete,
        }
    }

    /// Resolve an event and invoke the matching callback
    pub fn handle<C: TaskRowCallbacks + ?Sized>(&self, event: RowEvent, callbacks: &mut C) -> RowIntent {
        let intent = self.intent(event);
        match intent {
            RowIntent::Select => callbacks.on_select(self.task),
            RowIntent::SetCompleted(value) => callbacks.on_complete(self.task, value),
            RowIntent::SetFavorite(value) => callbacks.on_favorite(self.task, value),
            RowIntent::Delete => callbacks.on_delete(self.task),
        }
        intent
    }

    pub fn render(&self) -> String {
        self.view().render()
    }
}
