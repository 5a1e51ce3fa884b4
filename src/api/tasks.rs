//! Task CRUD endpoints and their wire types.

// self
use crate::{_prelude::*, api::ApiEnvelope, client::ApiClient};

/// Priority levels accepted by the task API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
	/// Lowest urgency.
	Low,
	/// Default urgency.
	Medium,
	/// Highest urgency.
	High,
}
impl TaskPriority {
	/// Returns the wire label used in query strings.
	pub const fn as_str(self) -> &'static str {
		match self {
			TaskPriority::Low => "LOW",
			TaskPriority::Medium => "MEDIUM",
			TaskPriority::High => "HIGH",
		}
	}
}

/// Workflow states a task moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
	/// Created but not started.
	Pending,
	/// Actively being worked on.
	InProgress,
	/// Finished.
	Completed,
}
impl TaskStatus {
	/// Returns the wire label used in query strings.
	pub const fn as_str(self) -> &'static str {
		match self {
			TaskStatus::Pending => "PENDING",
			TaskStatus::InProgress => "IN_PROGRESS",
			TaskStatus::Completed => "COMPLETED",
		}
	}
}

/// Task entity returned by the API.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
	/// Server-assigned identifier.
	pub id: String,
	/// Short title.
	pub title: String,
	/// Free-form description.
	pub description: String,
	/// Priority level.
	pub priority: TaskPriority,
	/// Workflow state.
	pub status: TaskStatus,
	/// Creation timestamp as reported by the server.
	pub created_at: String,
	/// Last-update timestamp as reported by the server.
	pub updated_at: String,
}

/// Payload for creating or replacing a task.
#[derive(Clone, Debug, Serialize)]
pub struct TaskDraft {
	/// Short title.
	pub title: String,
	/// Optional free-form description.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Priority level.
	pub priority: TaskPriority,
	/// Workflow state.
	pub status: TaskStatus,
}

/// Optional server-side filters for task listings.
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
	/// Restricts results to one priority.
	pub priority: Option<TaskPriority>,
	/// Restricts results to one workflow state.
	pub status: Option<TaskStatus>,
	/// Free-text search over title and description.
	pub search: Option<String>,
}
impl TaskFilter {
	/// Creates an empty filter matching every task.
	pub fn new() -> Self {
		Self::default()
	}

	/// Restricts results to the provided priority.
	pub fn with_priority(mut self, priority: TaskPriority) -> Self {
		self.priority = Some(priority);

		self
	}

	/// Restricts results to the provided workflow state.
	pub fn with_status(mut self, status: TaskStatus) -> Self {
		self.status = Some(status);

		self
	}

	/// Applies a free-text search term.
	pub fn with_search(mut self, search: impl Into<String>) -> Self {
		self.search = Some(search.into());

		self
	}

	pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
		let mut query = Vec::new();

		if let Some(priority) = self.priority {
			query.push(("priority", priority.as_str().to_string()));
		}
		if let Some(status) = self.status {
			query.push(("status", status.as_str().to_string()));
		}
		if let Some(search) = &self.search {
			query.push(("search", search.clone()));
		}

		query
	}
}

impl ApiClient {
	/// Lists tasks matching the provided filters.
	pub async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
		let envelope: ApiEnvelope<Vec<Task>> = self.get_json("/tasks", &filter.query()).await?;

		envelope.into_data()
	}

	/// Fetches a single task by identifier.
	pub async fn task(&self, id: &str) -> Result<Task> {
		let envelope: ApiEnvelope<Task> = self.get_json(&format!("/tasks/{id}"), &[]).await?;

		envelope.into_data()
	}

	/// Creates a task.
	pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
		let envelope: ApiEnvelope<Task> = self.post_json("/tasks", draft).await?;

		envelope.into_data()
	}

	/// Replaces an existing task.
	pub async fn update_task(&self, id: &str, draft: &TaskDraft) -> Result<Task> {
		let envelope: ApiEnvelope<Task> = self.put_json(&format!("/tasks/{id}"), draft).await?;

		envelope.into_data()
	}

	/// Deletes a task.
	pub async fn delete_task(&self, id: &str) -> Result<()> {
		let _: ApiEnvelope<()> = self.delete_json(&format!("/tasks/{id}")).await?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn wire_labels_match_the_api_contract() {
		assert_eq!(
			serde_json::to_string(&TaskStatus::InProgress)
				.expect("Status should serialize to JSON."),
			"\"IN_PROGRESS\"",
		);
		assert_eq!(TaskPriority::High.as_str(), "HIGH");
	}

	#[test]
	fn filter_query_includes_only_set_fields() {
		let query = TaskFilter::new()
			.with_priority(TaskPriority::Medium)
			.with_search("report")
			.query();

		assert_eq!(
			query,
			vec![("priority", "MEDIUM".to_string()), ("search", "report".to_string())],
		);
		assert!(TaskFilter::new().query().is_empty());
	}

	#[test]
	fn draft_skips_absent_descriptions() {
		let draft = TaskDraft {
			title: "Write report".into(),
			description: None,
			priority: TaskPriority::Low,
			status: TaskStatus::Pending,
		};
		let payload =
			serde_json::to_string(&draft).expect("Draft should serialize to JSON.");

		assert!(!payload.contains("description"));
	}

	#[test]
	fn task_deserializes_camel_case_timestamps() {
		let task: Task = serde_json::from_str(
			"{\"id\":\"t-1\",\"title\":\"Demo\",\"description\":\"\",\"priority\":\"LOW\",\
			 \"status\":\"PENDING\",\"createdAt\":\"2024-01-01T00:00:00Z\",\
			 \"updatedAt\":\"2024-01-02T00:00:00Z\"}",
		)
		.expect("Task fixture should deserialize.");

		assert_eq!(task.created_at, "2024-01-01T00:00:00Z");
		assert_eq!(task.updated_at, "2024-01-02T00:00:00Z");
	}
}
