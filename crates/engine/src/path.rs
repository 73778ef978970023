//! Path resolution, validation, and the execution trigger.
//!
//! A broken or incomplete path is an expected state in a mid-edit graph,
//! so traversal and validation errors are recovered right here: callers of
//! `get_path` see an empty path and console-level diagnostics, never an
//! error. Only direct callers of `validate_path` get the raw result.

use tracing::{debug, error};

use flowboard_core::diff::{node_by_id, NodePatch};
use flowboard_core::edge::Handle;
use flowboard_core::error::CoreError;
use flowboard_core::ids::NodeId;
use flowboard_core::node::NodeKind;
use flowboard_core::traverse::{self, PathStep};
use flowboard_storage::{PermissionService, Persistence, RunStep};

use crate::save::wire_node;
use crate::{Engine, EngineError};

impl<S: Persistence + PermissionService> Engine<S> {
    /// Ordered upstream dependency closure of `start`, or empty when the
    /// start node is unknown, the graph cycles, or a required input is
    /// missing.
    pub fn get_path(&mut self, start: NodeId) -> Vec<PathStep> {
        let Some(node) = node_by_id(&self.nodes, start).cloned() else {
            return Vec::new();
        };

        let path = match traverse::upstream(&self.nodes, &self.edges, &node) {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "traversal aborted");
                return Vec::new();
            }
        };

        match self.validate_path(&path) {
            Ok(()) => {
                debug!(len = path.len(), "valid path detected");
                path
            }
            Err(e) => {
                error!(error = %e, "invalid path");
                Vec::new()
            }
        }
    }

    /// Per-node input completeness over a resolved path.
    ///
    /// Output nodes (generated image, mesh) pass when they either already
    /// carry their output and are not flagged for a re-run, or have a
    /// geometry edge whose source itself carries its required input. A
    /// node that fails is cleared of its re-run flag before the error is
    /// raised, so a later run does not demand regeneration from a node
    /// that cannot deliver it.
    pub fn validate_path(&mut self, path: &[PathStep]) -> Result<(), CoreError> {
        for step in path {
            match step.node.kind {
                NodeKind::GeneratedImg | NodeKind::Mesh => {
                    let has_output = match step.node.kind {
                        NodeKind::GeneratedImg => step.node.data.img.is_some(),
                        _ => step.node.data.playground.is_some(),
                    };
                    let geo_edge = step
                        .incoming
                        .iter()
                        .find(|e| e.target_handle == Some(Handle::Geometry));

                    if (has_output && !step.node.re_run) || geo_edge.is_some() {
                        if let Some(edge) = geo_edge {
                            let source = node_by_id(&self.nodes, edge.source);
                            traverse::require_input(source)?;
                        }
                    } else {
                        self.update_node_inner(step.node.id, &NodePatch::re_run(false));
                        return Err(CoreError::input_missing(step.node.id, "geometry"));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolve, validate, and dispatch the upstream path of a node to the
    /// execution backend. Silent no-op without edit rights; an invalid
    /// path silently fails to execute.
    pub fn run(&mut self, start: NodeId, re_run: bool) -> Result<(), EngineError> {
        if !self.can_edit() {
            return Ok(());
        }

        let path = self.get_path(start);
        if path.is_empty() {
            debug!(node = %start, "no valid path; skipping dispatch");
            return Ok(());
        }

        let steps: Vec<RunStep> = path
            .iter()
            .map(|step| {
                let mut run_step = RunStep::from_path(step, re_run);
                if let Some(status) = self.node_status.get(&step.node.id) {
                    run_step.node.status = *status;
                }
                run_step.node = wire_node(&run_step.node);
                run_step
            })
            .collect();

        let statuses = self.api.run_path(self.board_id, &steps)?;
        debug!(count = statuses.len(), "path dispatched");
        Ok(())
    }
}
