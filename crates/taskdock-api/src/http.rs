use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{FromRequest, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use taskdock_exec::ContainerInfo;
use taskdock_model::{
    Completed, DEFAULT_QUEUE, DeploymentRequest, DescriptorPatch, Dispatched, Manifest,
    ParamSpec, PathLayout, ResultState, TaskDescriptor, TaskHandle,
};
use taskdock_prometheus::PrometheusMetrics;

use crate::{
    error::ApiError,
    handler::{DeployOutcome, Invocation, ToolHandler},
};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    metrics: Option<Arc<PrometheusMetrics>>,
}

impl<H> HttpApi<H>
where
    H: ToolHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            metrics: None,
        }
    }

    /// Serve `GET /metrics` from this registry.
    pub fn with_metrics(mut self, metrics: Arc<PrometheusMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Every tool is `POST /tools/<name>` with a JSON body and a JSON reply
    /// carrying `success` and `message`. Also mounts `GET /healthz` and, with
    /// metrics attached, `GET /metrics`.
    pub fn router(self) -> Router {
        let tools = Router::new()
            .route("/tools/register_task_info", post(register_task_info::<H>))
            .route("/tools/get_task_details", post(get_task_details::<H>))
            .route("/tools/get_available_tasks", post(get_available_tasks::<H>))
            .route(
                "/tools/get_tasks_by_category_name",
                post(get_tasks_by_category_name::<H>),
            )
            .route("/tools/get_task_categories", post(get_task_categories::<H>))
            .route("/tools/remove_task", post(remove_task::<H>))
            .route("/tools/update_task_info", post(update_task_info::<H>))
            .route("/tools/trigger_celery_task", post(trigger_celery_task::<H>))
            .route("/tools/send_celery_task", post(send_celery_task::<H>))
            .route("/tools/get_celery_result", post(get_celery_result::<H>))
            .route("/tools/deploy_task", post(deploy_task::<H>))
            .route("/tools/deploy_folder", post(deploy_folder::<H>))
            .route("/tools/stop_deployed_task", post(stop_deployed_task::<H>))
            .route("/tools/list_deployed_tasks", post(list_deployed_tasks::<H>))
            .route("/healthz", get(healthz::<H>))
            .with_state(self.handler);

        match self.metrics {
            Some(metrics) => tools.merge(
                Router::new()
                    .route("/metrics", get(render_metrics))
                    .with_state(metrics),
            ),
            None => tools,
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// JSON body whose rejections render as [`ApiError`].
struct Args<T>(T);

impl<S, T> FromRequest<S> for Args<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Args(value)),
            Err(rejection) => Err(ApiError::InvalidRequest(rejection.body_text())),
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::InvalidRequest(format!("{field} cannot be empty")));
    }
    Ok(value)
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct Reply<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
    message: String,
}

fn reply<T: Serialize>(data: T, message: impl Into<String>) -> Json<Reply<T>> {
    Json(Reply {
        success: true,
        data,
        message: message.into(),
    })
}

#[derive(Debug, Deserialize)]
struct TaskInfoBody {
    task_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Vec<ParamSpec>,
    return_type: Option<String>,
    category: Option<String>,
    queue: Option<String>,
}

impl TaskInfoBody {
    fn queue(&self) -> String {
        self.queue.clone().unwrap_or_else(|| DEFAULT_QUEUE.to_string())
    }

    fn into_descriptor(self) -> TaskDescriptor {
        let queue = self.queue();
        let mut d = TaskDescriptor::new(self.task_name)
            .with_description(self.description)
            .with_parameters(self.parameters)
            .with_queue(queue);
        if let Some(rt) = self.return_type {
            d = d.with_return_type(rt);
        }
        if let Some(category) = self.category {
            d = d.with_category(category);
        }
        d
    }
}

#[derive(Debug, Deserialize)]
struct TaskNameBody {
    task_name: String,
}

#[derive(Debug, Deserialize)]
struct CategoryBody {
    category: String,
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    task_name: String,
    #[serde(flatten)]
    patch: DescriptorPatch,
}

#[derive(Debug, Deserialize)]
struct TriggerBody {
    #[serde(flatten)]
    call: Invocation,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    task_id: TaskHandle,
}

#[derive(Debug, Deserialize)]
struct DeployBody {
    #[serde(flatten)]
    info: TaskInfoBody,
    #[serde(default)]
    files: Manifest,
    entrypoint: Option<String>,
    container_file: Option<String>,
    #[serde(default)]
    file_count: usize,
    layout: Option<PathLayout>,
}

#[derive(Debug, Deserialize)]
struct DeployFolderBody {
    #[serde(flatten)]
    info: TaskInfoBody,
    code_folder_path: Option<PathBuf>,
    entrypoint: Option<String>,
    container_file: Option<String>,
    layout: Option<PathLayout>,
}

#[derive(Debug, Deserialize)]
struct StopBody {
    task_name: String,
    queue: Option<String>,
}

fn deployment_request(
    info: &TaskInfoBody,
    entrypoint: Option<String>,
    container_file: Option<String>,
    layout: Option<PathLayout>,
) -> DeploymentRequest {
    let mut request = DeploymentRequest::new(info.task_name.clone(), info.queue());
    request.entrypoint = entrypoint;
    request.container_file = container_file;
    request.layout = layout.unwrap_or_default();
    request
}

#[derive(Debug, Serialize)]
struct TaskNameReply {
    task_name: String,
}

#[derive(Debug, Serialize)]
struct TaskReply {
    task: TaskDescriptor,
}

#[derive(Debug, Serialize)]
struct TaskListReply {
    tasks: Vec<TaskDescriptor>,
    total_count: usize,
}

#[derive(Debug, Serialize)]
struct CategoryTasksReply {
    category: String,
    tasks: Vec<TaskDescriptor>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct CategoriesReply {
    categories: Vec<String>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct RemovedReply {
    task_name: String,
    removed: bool,
}

#[derive(Debug, Serialize)]
struct CompletedReply {
    #[serde(flatten)]
    completed: Completed,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SentReply {
    #[serde(flatten)]
    dispatched: Dispatched,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ResultReply {
    task_id: TaskHandle,
    #[serde(flatten)]
    state: ResultState,
}

#[derive(Debug, Serialize)]
struct StoppedReply {
    container: String,
}

#[derive(Debug, Serialize)]
struct DeploymentsReply {
    deployments: Vec<ContainerInfo>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct HealthReply {
    status: &'static str,
}

// ============================================================================
// Registry tools
// ============================================================================

/// POST /tools/register_task_info
async fn register_task_info<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<TaskInfoBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let descriptor = body.into_descriptor();
    let task_name = descriptor.name.clone();
    handler.register_task(descriptor).await?;

    let message = format!("registered task '{task_name}'");
    Ok(reply(TaskNameReply { task_name }, message))
}

/// POST /tools/get_task_details
async fn get_task_details<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<TaskNameBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let name = required("task_name", &body.task_name)?;
    let task = handler.task_details(name).await?;

    let message = format!("details of task '{name}'");
    Ok(reply(TaskReply { task }, message))
}

/// POST /tools/get_available_tasks
async fn get_available_tasks<H>(
    State(handler): State<Arc<H>>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let tasks = handler.list_tasks().await?;
    let total_count = tasks.len();

    Ok(reply(
        TaskListReply { tasks, total_count },
        format!("{total_count} task(s) available"),
    ))
}

/// POST /tools/get_tasks_by_category_name
async fn get_tasks_by_category_name<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<CategoryBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let category = required("category", &body.category)?.to_string();
    let tasks = handler.list_tasks_by_category(&category).await?;
    let count = tasks.len();

    let message = format!("{count} task(s) in category '{category}'");
    Ok(reply(
        CategoryTasksReply {
            category,
            tasks,
            count,
        },
        message,
    ))
}

/// POST /tools/get_task_categories
async fn get_task_categories<H>(
    State(handler): State<Arc<H>>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let categories = handler.list_categories().await?;
    let count = categories.len();

    Ok(reply(
        CategoriesReply { categories, count },
        format!("{count} categor(ies)"),
    ))
}

/// POST /tools/remove_task
async fn remove_task<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<TaskNameBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let name = required("task_name", &body.task_name)?.to_string();
    let removed = handler.remove_task(&name).await?;

    let message = match removed {
        true => format!("removed task '{name}'"),
        false => format!("task '{name}' was not registered"),
    };
    Ok(reply(
        RemovedReply {
            task_name: name,
            removed,
        },
        message,
    ))
}

/// POST /tools/update_task_info
async fn update_task_info<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<UpdateBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let name = required("task_name", &body.task_name)?.to_string();
    handler.update_task(&name, body.patch).await?;

    let message = format!("updated task '{name}'");
    Ok(reply(TaskNameReply { task_name: name }, message))
}

// ============================================================================
// Dispatch tools
// ============================================================================

/// POST /tools/trigger_celery_task
///
/// Waits for the result up to `timeout_ms`, or the server default.
async fn trigger_celery_task<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<TriggerBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    required("task_name", &body.call.task_name)?;
    let timeout = body.timeout_ms.map(Duration::from_millis);
    let completed = handler.trigger_task(body.call, timeout).await?;

    let message = format!("task {} finished", completed.task_id);
    Ok(reply(
        CompletedReply {
            completed,
            status: "SUCCESS",
        },
        message,
    ))
}

/// POST /tools/send_celery_task
async fn send_celery_task<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<Invocation>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    required("task_name", &body.task_name)?;
    let dispatched = handler.send_task(body).await?;

    let message = format!(
        "sent to queue '{}' as {}",
        dispatched.queue, dispatched.task_id
    );
    Ok(reply(
        SentReply {
            dispatched,
            status: "SENT",
        },
        message,
    ))
}

/// POST /tools/get_celery_result
async fn get_celery_result<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<ResultBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let state = handler.task_result(&body.task_id).await?;

    let message = match &state {
        ResultState::Pending => "task has not finished".to_string(),
        ResultState::Success { .. } => "task succeeded".to_string(),
        ResultState::Failure { error } => format!("task failed: {error}"),
    };
    Ok(reply(
        ResultReply {
            task_id: body.task_id,
            state,
        },
        message,
    ))
}

// ============================================================================
// Deployment tools
// ============================================================================

/// Failed deployments still carry the full result, under 422.
fn deployed(outcome: DeployOutcome) -> (StatusCode, Json<Reply<DeployOutcome>>) {
    let success = outcome.deployment.success;
    let status = match success {
        true => StatusCode::OK,
        false => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let message = outcome.deployment.summary();
    debug!(success, registered = outcome.registered, "deploy tool finished");
    (
        status,
        Json(Reply {
            success,
            data: outcome,
            message,
        }),
    )
}

/// POST /tools/deploy_task
async fn deploy_task<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<DeployBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    required("task_name", &body.info.task_name)?;
    let request = deployment_request(
        &body.info,
        body.entrypoint,
        body.container_file,
        body.layout,
    )
    .with_files(body.files)
    .with_file_count(body.file_count);

    let outcome = handler
        .deploy_task(request, body.info.into_descriptor())
        .await?;
    Ok(deployed(outcome))
}

/// POST /tools/deploy_folder
async fn deploy_folder<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<DeployFolderBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    required("task_name", &body.info.task_name)?;
    let request = deployment_request(
        &body.info,
        body.entrypoint,
        body.container_file,
        body.layout,
    );

    let outcome = handler
        .deploy_folder(body.code_folder_path, request, body.info.into_descriptor())
        .await?;
    Ok(deployed(outcome))
}

/// POST /tools/stop_deployed_task
async fn stop_deployed_task<H>(
    State(handler): State<Arc<H>>,
    Args(body): Args<StopBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let name = required("task_name", &body.task_name)?;
    let container = handler
        .stop_deployment(name, body.queue.as_deref())
        .await?;

    let message = format!("stopped {container}");
    Ok(reply(StoppedReply { container }, message))
}

/// POST /tools/list_deployed_tasks
async fn list_deployed_tasks<H>(
    State(handler): State<Arc<H>>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    let deployments = handler.list_deployments().await?;
    let count = deployments.len();

    Ok(reply(
        DeploymentsReply { deployments, count },
        format!("{count} deployed worker(s)"),
    ))
}

// ============================================================================
// Service endpoints
// ============================================================================

/// GET /healthz
async fn healthz<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ToolHandler,
{
    handler.health().await?;
    Ok(Json(HealthReply { status: "ok" }))
}

/// GET /metrics
async fn render_metrics(
    State(metrics): State<Arc<PrometheusMetrics>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = metrics
        .encode_text()
        .map_err(|e| ApiError::Internal(format!("metrics encoding: {e}")))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
