use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use depot_events::{DepotEvent, TaskStage};
use depot_id::{Identifier, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    api::{str_field, Filters, ListPage, Pagination, ResourceApi, TaskRef},
    error::{GatewayError, Result},
    session::Session,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Waiting,
    Running,
    Canceling,
    Completed,
    Failed,
    Canceled,
    Skipped,
}

impl TaskState {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "waiting" => TaskState::Waiting,
            "running" => TaskState::Running,
            "canceling" => TaskState::Canceling,
            "completed" => TaskState::Completed,
            "failed" => TaskState::Failed,
            "canceled" => TaskState::Canceled,
            "skipped" => TaskState::Skipped,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Canceling => "canceling",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
            TaskState::Skipped => "skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Skipped
        )
    }

    fn stage(self) -> TaskStage {
        match self {
            TaskState::Waiting => TaskStage::Waiting,
            TaskState::Running | TaskState::Canceling => TaskStage::Running,
            TaskState::Completed => TaskStage::Completed,
            TaskState::Failed => TaskStage::Failed,
            TaskState::Canceled => TaskStage::Canceled,
            TaskState::Skipped => TaskStage::Skipped,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn state_of(record: &Value) -> Result<TaskState> {
    let state = str_field(record, "state")?;
    TaskState::parse(state).ok_or_else(|| {
        GatewayError::InvalidResponse {
            path: "tasks".to_string(),
            reason: format!("unknown task state `{state}`"),
        }
    })
}

pub struct TaskApi<'s> {
    session: &'s Session,
}

impl<'s> TaskApi<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn resource(&self) -> Result<ResourceApi<'s>> {
        ResourceApi::for_kind(self.session, ResourceKind::Task)
    }

    pub fn list(&self, pagination: Pagination, filters: &Filters) -> Result<ListPage> {
        self.resource()?.list(pagination, filters)
    }

    pub fn read(&self, task: &Identifier) -> Result<Value> {
        self.resource()?.read(task)
    }

    /// Asks the backend to cancel a task. A task that already finished
    /// cannot be canceled.
    pub fn cancel(&self, task: &Identifier) -> Result<Value> {
        match self.resource()?.update(task, json!({ "state": "canceled" })) {
            Ok(outcome) => outcome.into_record(),
            Err(GatewayError::Validation { status: 409, .. }) => {
                Err(GatewayError::TaskCancelConflict {
                    task: task.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Waits for tasks to reach a terminal state.
pub struct TaskPoller<'s> {
    session: &'s Session,
    interval: Duration,
    timeout: Duration,
}

impl<'s> TaskPoller<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            interval: session.tasks().poll_interval(),
            timeout: session.tasks().timeout(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Polls `task` until it is terminal and returns the final record.
    ///
    /// Anything other than `completed` is an error carrying the task's own
    /// error body. An unauthorized status read is retried once; a second
    /// one is returned as is.
    pub fn wait(&self, task: &TaskRef) -> Result<Value> {
        let api = TaskApi::new(self.session);
        let id = task.task.to_string();
        let started = Instant::now();
        let mut retried = false;
        let mut last: Option<TaskState> = None;

        loop {
            let record = match api.read(&task.task) {
                Ok(record) => record,
                Err(e) if e.is_unauthorized() && !retried => {
                    warn!(task = %id, "task read unauthorized, retrying once");
                    retried = true;
                    self.session.emit(DepotEvent::TaskProgress {
                        task: id.clone(),
                        stage: TaskStage::RetryingUnauthorized,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let state = state_of(&record)?;
            if last != Some(state) {
                debug!(task = %id, state = %state, "task state");
                self.session.emit(DepotEvent::TaskProgress {
                    task: id.clone(),
                    stage: state.stage(),
                });
                last = Some(state);
            }

            match state {
                TaskState::Completed => return Ok(record),
                TaskState::Failed | TaskState::Canceled | TaskState::Skipped => {
                    return Err(GatewayError::TaskFailed {
                        task: id,
                        state: state.to_string(),
                        error: record.get("error").cloned().unwrap_or(Value::Null),
                    });
                }
                _ => {}
            }

            if started.elapsed() >= self.timeout {
                return Err(GatewayError::TaskTimeout { task: id });
            }
            thread::sleep(self.interval);
        }
    }

    /// Waits for `task` and returns the resources it created.
    pub fn created_resources(&self, task: &TaskRef) -> Result<Vec<Identifier>> {
        let record = self.wait(task)?;
        let Some(resources) = record.get("created_resources").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        resources
            .iter()
            .filter_map(Value::as_str)
            .map(|id| Identifier::decode(id).map_err(GatewayError::from))
            .collect()
    }
}
