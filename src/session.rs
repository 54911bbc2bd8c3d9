//! A builder session: the graph plus the asynchronous calls made on its
//! behalf.
//!
//! Single-threaded. Graph borrows are never held across an await; an
//! execution that resolves after the session closed, or after a newer run
//! started, is dropped without touching the graph.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::future::Future;

use tracing::{debug, warn};

use crate::compiler::{compile, dataset_request};
use crate::error::{ExecutionError, GraphError, PersistenceError, SaveError};
use crate::request::{DatasetRequest, QueryResult, SaveVisualizationRequest};
use crate::store::{ExecutionTicket, QueryGraph};

/// Identifier of a persisted visualization.
pub type RecordId = i64;

/// Runs compiled queries.
pub trait QueryExecutor {
    fn execute(
        &self,
        request: &DatasetRequest,
    ) -> impl Future<Output = Result<QueryResult, ExecutionError>>;
}

/// Persists visualizations.
pub trait VisualizationStore {
    fn create(
        &self,
        request: &SaveVisualizationRequest,
    ) -> impl Future<Output = Result<RecordId, PersistenceError>>;
}

/// User-supplied part of a saved visualization.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationMeta {
    pub name: String,
    pub description: Option<String>,
    pub visualization_type: String,
    pub visualization_settings: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed { row_count: u64 },
    /// The message is stored as the graph error.
    Failed(String),
    /// The session closed or a newer run started before this one resolved.
    Superseded,
    /// Nothing to run yet.
    NotReady(GraphError),
}

pub struct BuilderSession {
    graph: RefCell<QueryGraph>,
    closed: Cell<bool>,
}

impl Default for BuilderSession {
    fn default() -> Self {
        Self::new(QueryGraph::new())
    }
}

impl BuilderSession {
    pub fn new(graph: QueryGraph) -> Self {
        Self {
            graph: RefCell::new(graph),
            closed: Cell::new(false),
        }
    }

    pub fn graph(&self) -> Ref<'_, QueryGraph> {
        self.graph.borrow()
    }

    pub fn graph_mut(&self) -> RefMut<'_, QueryGraph> {
        self.graph.borrow_mut()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Tear the session down. In-flight executions are invalidated.
    pub fn close(&self) {
        self.closed.set(true);
        self.graph.borrow_mut().cancel_execution();
        debug!("session.closed");
    }

    /// Compile and run the current graph. `is_executing` is reset on every
    /// path, including when the returned future is dropped mid-flight.
    pub async fn execute<E: QueryExecutor>(&self, executor: &E) -> ExecutionOutcome {
        if self.is_closed() {
            return ExecutionOutcome::Superseded;
        }
        let request = match dataset_request(&self.graph.borrow()) {
            Ok(request) => request,
            Err(err) => return ExecutionOutcome::NotReady(err),
        };

        let ticket = self.graph.borrow_mut().begin_execution();
        let _guard = ExecutionGuard {
            graph: &self.graph,
            ticket,
        };
        debug!(database = request.database, "session.execute");
        let outcome = executor.execute(&request).await;

        let mut graph = self.graph.borrow_mut();
        match outcome {
            Ok(result) => {
                let row_count = result.row_count;
                if graph.finish_execution(ticket, Ok(result)) {
                    ExecutionOutcome::Completed { row_count }
                } else {
                    warn!("session.stale_result");
                    ExecutionOutcome::Superseded
                }
            }
            Err(err) => {
                let message = err.to_string();
                if graph.finish_execution(ticket, Err(err)) {
                    warn!(error = %message, "session.execute_failed");
                    ExecutionOutcome::Failed(message)
                } else {
                    warn!(error = %message, "session.stale_failure");
                    ExecutionOutcome::Superseded
                }
            }
        }
    }

    /// Request body for saving the current graph.
    pub fn save_request(&self, meta: VisualizationMeta) -> Result<SaveVisualizationRequest, GraphError> {
        let graph = self.graph.borrow();
        let query = compile(&graph).ok_or(GraphError::NotCompilable)?;
        let database_id = graph.database_id().ok_or(GraphError::MissingDatabase)?;
        Ok(SaveVisualizationRequest {
            name: meta.name,
            description: meta.description,
            database_id,
            query_type: "structured",
            query,
            visualization_type: meta.visualization_type,
            visualization_settings: meta.visualization_settings,
        })
    }

    /// Persist the current graph. Failures go to the caller; the graph's
    /// error field is left alone.
    pub async fn save<S: VisualizationStore>(&self, store: &S, meta: VisualizationMeta) -> Result<RecordId, SaveError> {
        let request = self.save_request(meta)?;
        let id = store.create(&request).await?;
        debug!(id, name = %request.name, "session.saved");
        Ok(id)
    }
}

/// Clears `is_executing` if the execution future is dropped before it
/// resolves. A no-op once the ticket is finished or stale.
struct ExecutionGuard<'a> {
    graph: &'a RefCell<QueryGraph>,
    ticket: ExecutionTicket,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut graph) = self.graph.try_borrow_mut() {
            graph.abandon_execution(self.ticket);
        }
    }
}
