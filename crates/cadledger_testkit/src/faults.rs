//! Fault injection: a kernel that fails on demand and an operation that
//! fails after mutating.

use cadledger_core::{
    BuiltShape, CommandOutput, CoreError, CoreResult, EntityKind, GeometricKernel, KernelInput,
    KernelOp, Mutator, Operation, Point3, ReferenceKernel, ShapeData, World,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// When a [`FaultyKernel`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultPlan {
    /// Never.
    Never,
    /// On every call for the named operation (see [`KernelOp::name`]).
    OnOperation(&'static str),
    /// On the n-th call, counting from zero, and only that one.
    OnCall(usize),
}

/// Reference kernel with injected failures.
#[derive(Debug)]
pub struct FaultyKernel {
    inner: ReferenceKernel,
    plan: FaultPlan,
    calls: AtomicUsize,
}

impl FaultyKernel {
    /// Creates a kernel failing according to `plan`.
    pub fn new(plan: FaultPlan) -> Self {
        Self {
            inner: ReferenceKernel::new(),
            plan,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every construction of `operation`.
    pub fn failing_on(operation: &'static str) -> Self {
        Self::new(FaultPlan::OnOperation(operation))
    }

    /// Fails the `call`-th construction.
    pub fn failing_at(call: usize) -> Self {
        Self::new(FaultPlan::OnCall(call))
    }

    /// Number of constructions requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeometricKernel for FaultyKernel {
    fn name(&self) -> &str {
        "faulty"
    }

    fn construct(&self, op: &KernelOp, inputs: &[KernelInput]) -> CoreResult<Vec<BuiltShape>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = match &self.plan {
            FaultPlan::Never => false,
            FaultPlan::OnOperation(name) => op.name() == *name,
            FaultPlan::OnCall(n) => call == *n,
        };
        if fail {
            return Err(CoreError::kernel(format!(
                "injected failure in {} (call {call})",
                op.name()
            )));
        }
        self.inner.construct(op, inputs)
    }
}

/// Operation that creates a vertex, then optionally fails.
///
/// Chained in a composite it also exercises sibling outputs: every step
/// connects its vertex to the ones earlier steps created.
#[derive(Debug, Clone)]
pub struct FailingStep {
    point: Point3,
    fail: bool,
}

impl FailingStep {
    /// A step that succeeds.
    pub fn ok(point: Point3) -> Self {
        Self { point, fail: false }
    }

    /// A step that creates its vertex and then fails.
    pub fn failing(point: Point3) -> Self {
        Self { point, fail: true }
    }
}

impl Operation for FailingStep {
    fn name(&self) -> &'static str {
        "step"
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let vertex = m.create(EntityKind::GeomVertex, ShapeData::point(self.point))?;
        for earlier in m.prior_output().created {
            m.connect(earlier, vertex)?;
        }
        if self.fail {
            return Err(CoreError::invalid_operation("injected step failure"));
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        format!("step {}", world.names_of(&output.created))
    }
}
