// Query shapes the store can subscribe to

use crate::task::TodoTask;

/// The reactive queries exposed by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskQuery {
    /// Tasks with `completed == false`, favorites first
    Active,
    /// Tasks with `completed == true`, storage order
    Completed,
}

impl TaskQuery {
    pub const ALL: [TaskQuery; 2] = [TaskQuery::Active, TaskQuery::Completed];

    /// Value bound to the `completed = ?` predicate
    pub fn completed_value(self) -> bool {
        matches!(self, TaskQuery::Completed)
    }

    /// Whether a task belongs to this query's result set
    pub fn matches(self, task: &TodoTask) -> bool {
        task.completed == self.completed_value()
    }

    /// Order rows already in storage order for presentation
    pub fn arrange(self, mut tasks: Vec<TodoTask>) -> Vec<TodoTask> {
        if self == TaskQuery::Active {
            // sort_by_key is stable, so storage order holds within each group
            tasks.sort_by_key(|task| !task.favorite);
        }
        tasks
    }
}

impl std::fmt::Display for TaskQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskQuery::Active => write!(f, "active"),
            TaskQuery::Completed => write!(f, "completed"),
        }
    }
}
