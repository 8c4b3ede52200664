use crate::error::{EngineError, EngineResult};
use crate::frame::Frame;
use crate::module::{ModuleCtx, Resources};
use crate::phase::{PhaseGraph, PhaseId};
use crate::sched::TaskSwitch;

/// Task body. Receives the shared context and the frame snapshot.
pub type TaskFn = Box<dyn FnMut(&mut ModuleCtx<'_>) -> EngineResult<()>>;

/// Task identity inside one executor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskId(u32);

struct TaskRecord {
    phase: PhaseId,
    owner: &'static str,
    switch: TaskSwitch,
    run: TaskFn,
}

/// Executor state captured by [`Executor::mark`].
pub(crate) struct ExecutorMark {
    graph: PhaseGraph,
    tasks: usize,
}

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub invoked: usize,
    pub disabled: usize,
}

/// Single-threaded, strictly ordered task pump over one phase graph.
///
/// Tasks can be registered at any time; phases are frozen by `finalize`.
/// Within a phase tasks run in registration order.
pub struct Executor {
    label: &'static str,
    graph: PhaseGraph,
    order: Option<Vec<PhaseId>>,
    tasks: Vec<TaskRecord>,
    // phase index -> task indices, in registration order
    buckets: Vec<Vec<usize>>,
}

impl Executor {
    #[inline]
    pub fn new(label: &'static str, graph: PhaseGraph) -> Self {
        Self {
            label,
            graph,
            order: None,
            tasks: Vec::new(),
            buckets: Vec::new(),
        }
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn graph(&self) -> &PhaseGraph {
        &self.graph
    }

    /// Mutable graph access; refused once the order is frozen.
    pub fn graph_mut(&mut self) -> EngineResult<&mut PhaseGraph> {
        if self.order.is_some() {
            return Err(EngineError::InvalidState {
                op: "graph_mut",
                state: "finalized",
            });
        }
        Ok(&mut self.graph)
    }

    pub fn register_task(
        &mut self,
        phase: PhaseId,
        owner: &'static str,
        run: TaskFn,
        enabled: bool,
    ) -> EngineResult<TaskId> {
        if !self.graph.contains(phase) {
            return Err(EngineError::other(format!(
                "{}: task of '{owner}' bound to a phase of another graph",
                self.label
            )));
        }

        let idx = self.tasks.len();
        self.tasks.push(TaskRecord {
            phase,
            owner,
            switch: TaskSwitch::new(enabled),
            run,
        });

        if self.buckets.len() <= phase.index() {
            self.buckets.resize_with(phase.index() + 1, Vec::new);
        }
        self.buckets[phase.index()].push(idx);

        log::trace!(
            "{}: task #{idx} of '{owner}' bound to '{}' (enabled={enabled})",
            self.label,
            self.graph.name(phase)
        );
        Ok(TaskId(idx as u32))
    }

    /// Returns `false` for an unknown task.
    pub fn set_task_enabled(&mut self, task: TaskId, enabled: bool) -> bool {
        match self.tasks.get(task.0 as usize) {
            Some(t) => {
                t.switch.set(enabled);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn is_task_enabled(&self, task: TaskId) -> Option<bool> {
        self.tasks.get(task.0 as usize).map(|t| t.switch.is_enabled())
    }

    /// Shared handle to a task's enable flag.
    #[inline]
    pub fn switch(&self, task: TaskId) -> Option<TaskSwitch> {
        self.tasks.get(task.0 as usize).map(|t| t.switch.clone())
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.order.is_some()
    }

    /// Freezes the phase order. Calling it again returns the same order.
    pub fn finalize(&mut self) -> EngineResult<&[PhaseId]> {
        if self.order.is_none() {
            let order = self.graph.finalize()?;
            log::debug!(
                "{}: finalized {} phases, {} tasks",
                self.label,
                order.len(),
                self.tasks.len()
            );
            self.order = Some(order);
        }

        match &self.order {
            Some(order) => Ok(order),
            None => unreachable!("order assigned above"),
        }
    }

    /// `(phase, task)` pairs the next tick would invoke, in order.
    pub fn plan(&self) -> Vec<(PhaseId, TaskId)> {
        let Some(order) = &self.order else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(self.tasks.len());
        for &phase in order {
            for &idx in self.bucket(phase) {
                if self.tasks[idx].switch.is_enabled() {
                    out.push((phase, TaskId(idx as u32)));
                }
            }
        }
        out
    }

    /// Runs every enabled task, phase by phase.
    ///
    /// A recoverable failure lets the rest of its phase run, then ends the tick:
    /// later phases are skipped and the first error is returned, attributed to
    /// the task's module and phase. A fatal failure ends the tick at once.
    /// What to do with either is the caller's decision.
    pub fn tick(&mut self, resources: &mut Resources, frame: Frame) -> EngineResult<TickReport> {
        let Some(order) = self.order.as_ref() else {
            return Err(EngineError::InvalidState {
                op: "tick",
                state: "not finalized",
            });
        };

        let mut report = TickReport::default();

        for &phase in order {
            let Some(bucket) = self.buckets.get(phase.index()) else {
                continue;
            };

            let mut failed: Option<EngineError> = None;
            for &idx in bucket {
                let task = &mut self.tasks[idx];
                if !task.switch.is_enabled() {
                    report.disabled += 1;
                    continue;
                }

                let mut ctx = ModuleCtx::new(resources, frame, task.owner);
                if let Err(e) = (task.run)(&mut ctx) {
                    let phase_name = self.graph.name(phase);
                    if e.is_fatal() {
                        log::error!("{}: '{}' failed in '{phase_name}': {e}", self.label, task.owner);
                        return Err(EngineError::with_module_phase(task.owner, phase_name, e));
                    }

                    log::warn!(
                        "{}: '{}' failed in '{phase_name}', skipping later phases: {e}",
                        self.label,
                        task.owner
                    );
                    if failed.is_none() {
                        failed = Some(EngineError::with_module_phase(task.owner, phase_name, e));
                    }
                    continue;
                }
                report.invoked += 1;
            }

            if let Some(err) = failed {
                return Err(err);
            }
        }

        Ok(report)
    }

    /// Captures graph and task registrations so a failed module build can be undone.
    pub(crate) fn mark(&self) -> ExecutorMark {
        ExecutorMark {
            graph: self.graph.clone(),
            tasks: self.tasks.len(),
        }
    }

    /// Drops every task registered and every graph change made since `mark`.
    pub(crate) fn rollback(&mut self, mark: ExecutorMark) {
        for task in self.tasks.drain(mark.tasks..) {
            if let Some(bucket) = self.buckets.get_mut(task.phase.index()) {
                bucket.retain(|&i| i < mark.tasks);
            }
        }
        self.graph = mark.graph;
    }

    #[inline]
    fn bucket(&self, phase: PhaseId) -> &[usize] {
        self.buckets.get(phase.index()).map_or(&[], Vec::as_slice)
    }

    #[inline]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}
