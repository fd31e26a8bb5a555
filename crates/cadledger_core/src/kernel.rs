//! Geometric kernel interface and the in-tree reference kernel.
//!
//! Commands only call the kernel through [`GeometricKernel::construct`] and
//! never ask it to undo anything: undo works on entity snapshots.

use crate::error::{CoreError, CoreResult};
use crate::shape::{Plane, Point3, ShapeData, Transform, EPSILON};
use crate::types::Dimension;

/// Points closer than this are merged by [`KernelOp::Glue`].
pub const GLUE_TOLERANCE: f64 = 1e-6;

/// A construction request.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelOp {
    /// A vertex at a point. No inputs.
    Vertex(Point3),
    /// A curve through two vertices.
    Segment,
    /// A surface bounded by curves.
    Surface,
    /// A volume bounded by surfaces.
    Volume,
    /// One copy per input.
    Copy,
    /// One transformed shape per input.
    Transform(Transform),
    /// Union of all inputs.
    Fuse,
    /// First input minus the others.
    Cut,
    /// Common part of all inputs.
    Intersect,
    /// Each input split in two by a plane.
    Section(Plane),
    /// Inputs with coincident points merged.
    Glue,
    /// Curves concatenated into one.
    Join,
    /// One curve split into equal parts, followed by the joint vertices.
    Split {
        /// Number of parts, at least 2.
        parts: usize,
    },
    /// Each input swept along a vector, one dimension up.
    Extrude(Point3),
}

impl KernelOp {
    /// Short operation name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vertex(_) => "vertex",
            Self::Segment => "segment",
            Self::Surface => "surface",
            Self::Volume => "volume",
            Self::Copy => "copy",
            Self::Transform(t) => t.verb(),
            Self::Fuse => "fuse",
            Self::Cut => "cut",
            Self::Intersect => "intersect",
            Self::Section(_) => "section",
            Self::Glue => "glue",
            Self::Join => "join",
            Self::Split { .. } => "split",
            Self::Extrude(_) => "extrude",
        }
    }
}

/// One input shape handed to the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelInput {
    /// Dimension of the entity the shape belongs to.
    pub dimension: Dimension,
    /// The shape.
    pub shape: ShapeData,
}

/// One shape produced by the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltShape {
    /// Dimension of the entity to create.
    pub dimension: Dimension,
    /// The shape.
    pub shape: ShapeData,
    /// Indices of the inputs this shape was built from.
    pub sources: Vec<usize>,
}

impl BuiltShape {
    fn new(dimension: Dimension, shape: ShapeData, sources: Vec<usize>) -> Self {
        Self {
            dimension,
            shape,
            sources,
        }
    }
}

/// A construction request together with its input shapes.
///
/// Two equal requests produce equal results, which is what lets a command
/// reuse shapes built ahead of execution.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelRequest {
    /// Operation to run.
    pub op: KernelOp,
    /// Input shapes, in the order the operation expects.
    pub inputs: Vec<KernelInput>,
}

impl KernelRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(op: KernelOp, inputs: Vec<KernelInput>) -> Self {
        Self { op, inputs }
    }

    /// Runs the request on `kernel`.
    pub fn run(&self, kernel: &dyn GeometricKernel) -> CoreResult<Vec<BuiltShape>> {
        kernel.construct(&self.op, &self.inputs)
    }
}

/// Opaque geometric construction service.
///
/// Implementations must be callable from worker threads: pooled execution
/// runs construction while only a read lock is held.
pub trait GeometricKernel: Send + Sync {
    /// Kernel name, for traces.
    fn name(&self) -> &str {
        "kernel"
    }

    /// Builds the shapes requested by `op` from `inputs`.
    fn construct(&self, op: &KernelOp, inputs: &[KernelInput]) -> CoreResult<Vec<BuiltShape>>;
}

/// Point-set kernel used by tests, the CLI and the demo.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceKernel;

impl ReferenceKernel {
    /// Creates the kernel.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn require(inputs: &[KernelInput], min: usize, op: &KernelOp) -> CoreResult<()> {
    if inputs.len() < min {
        return Err(CoreError::kernel(format!(
            "{} needs at least {min} inputs, got {}",
            op.name(),
            inputs.len()
        )));
    }
    Ok(())
}

fn require_dim(inputs: &[KernelInput], dim: Dimension, op: &KernelOp) -> CoreResult<()> {
    match inputs.iter().find(|i| i.dimension != dim) {
        Some(bad) => Err(CoreError::kernel(format!(
            "{} expects dimension {dim} inputs, got {}",
            op.name(),
            bad.dimension
        ))),
        None => Ok(()),
    }
}

fn merged(inputs: &[KernelInput]) -> ShapeData {
    let mut shape = ShapeData::default();
    for input in inputs {
        shape.merge(&input.shape);
    }
    shape
}

impl GeometricKernel for ReferenceKernel {
    fn name(&self) -> &str {
        "reference"
    }

    fn construct(&self, op: &KernelOp, inputs: &[KernelInput]) -> CoreResult<Vec<BuiltShape>> {
        let all: Vec<usize> = (0..inputs.len()).collect();
        match op {
            KernelOp::Vertex(p) => Ok(vec![BuiltShape::new(
                Dimension::D0,
                ShapeData::point(*p),
                Vec::new(),
            )]),
            KernelOp::Segment => {
                require(inputs, 2, op)?;
                require_dim(inputs, Dimension::D0, op)?;
                let shape = merged(&inputs[..2]);
                if shape.points.len() < 2 {
                    return Err(CoreError::kernel("segment endpoints coincide"));
                }
                Ok(vec![BuiltShape::new(Dimension::D1, shape, vec![0, 1])])
            }
            KernelOp::Surface => {
                require(inputs, 1, op)?;
                require_dim(inputs, Dimension::D1, op)?;
                Ok(vec![BuiltShape::new(Dimension::D2, merged(inputs), all)])
            }
            KernelOp::Volume => {
                require(inputs, 1, op)?;
                require_dim(inputs, Dimension::D2, op)?;
                Ok(vec![BuiltShape::new(Dimension::D3, merged(inputs), all)])
            }
            KernelOp::Copy => Ok(inputs
                .iter()
                .enumerate()
                .map(|(i, input)| BuiltShape::new(input.dimension, input.shape.clone(), vec![i]))
                .collect()),
            KernelOp::Transform(transform) => {
                if let Some(reason) = transform.degeneracy() {
                    return Err(CoreError::kernel(reason));
                }
                Ok(inputs
                    .iter()
                    .enumerate()
                    .map(|(i, input)| {
                        BuiltShape::new(input.dimension, input.shape.transformed(transform), vec![i])
                    })
                    .collect())
            }
            KernelOp::Fuse => {
                require(inputs, 2, op)?;
                let dim = inputs.iter().map(|i| i.dimension).max().unwrap_or(Dimension::D0);
                Ok(vec![BuiltShape::new(dim, merged(inputs), all)])
            }
            KernelOp::Cut => {
                require(inputs, 2, op)?;
                let tools = merged(&inputs[1..]);
                let kept: Vec<Point3> = inputs[0]
                    .shape
                    .points
                    .iter()
                    .copied()
                    .filter(|p| !tools.contains(*p))
                    .collect();
                if kept.is_empty() {
                    return Err(CoreError::kernel("cut removes the whole shape"));
                }
                Ok(vec![BuiltShape::new(
                    inputs[0].dimension,
                    ShapeData::new(kept),
                    all,
                )])
            }
            KernelOp::Intersect => {
                require(inputs, 2, op)?;
                let common: Vec<Point3> = inputs[0]
                    .shape
                    .points
                    .iter()
                    .copied()
                    .filter(|p| inputs[1..].iter().all(|i| i.shape.contains(*p)))
                    .collect();
                if common.is_empty() {
                    return Err(CoreError::kernel("intersection is empty"));
                }
                let dim = inputs.iter().map(|i| i.dimension).min().unwrap_or(Dimension::D0);
                Ok(vec![BuiltShape::new(dim, ShapeData::new(common), all)])
            }
            KernelOp::Section(plane) => section(inputs, plane),
            KernelOp::Glue => {
                require(inputs, 2, op)?;
                let mut seen: Vec<Point3> = Vec::new();
                let mut out = Vec::with_capacity(inputs.len());
                for (i, input) in inputs.iter().enumerate() {
                    let points = input
                        .shape
                        .points
                        .iter()
                        .map(|p| match seen.iter().copied().find(|q| (*q - *p).norm() < GLUE_TOLERANCE) {
                            Some(q) => q,
                            None => {
                                seen.push(*p);
                                *p
                            }
                        })
                        .collect();
                    out.push(BuiltShape::new(input.dimension, ShapeData::new(points), vec![i]));
                }
                Ok(out)
            }
            KernelOp::Join => {
                require(inputs, 2, op)?;
                require_dim(inputs, Dimension::D1, op)?;
                Ok(vec![BuiltShape::new(Dimension::D1, merged(inputs), all)])
            }
            KernelOp::Split { parts } => split(inputs, *parts, op),
            KernelOp::Extrude(vector) => {
                if vector.norm() < EPSILON {
                    return Err(CoreError::kernel("zero extrusion vector"));
                }
                inputs
                    .iter()
                    .enumerate()
                    .map(|(i, input)| {
                        let dim = input.dimension.up().ok_or_else(|| {
                            CoreError::kernel("cannot extrude a volume")
                        })?;
                        let mut shape = input.shape.clone();
                        shape.merge(&input.shape.transformed(&Transform::Translate {
                            vector: *vector,
                        }));
                        Ok(BuiltShape::new(dim, shape, vec![i]))
                    })
                    .collect()
            }
        }
    }
}

fn section(inputs: &[KernelInput], plane: &Plane) -> CoreResult<Vec<BuiltShape>> {
    let mut out = Vec::new();
    for (i, input) in inputs.iter().enumerate() {
        let mut above = Vec::new();
        let mut below = Vec::new();
        for p in &input.shape.points {
            let d = plane
                .signed_distance(*p)
                .ok_or_else(|| CoreError::kernel("degenerate section plane"))?;
            if d >= -EPSILON {
                above.push(*p);
            }
            if d <= EPSILON {
                below.push(*p);
            }
        }
        // a shape lying entirely on one side is not cut
        if above.len() == input.shape.points.len() || below.len() == input.shape.points.len() {
            continue;
        }
        out.push(BuiltShape::new(input.dimension, ShapeData::new(above), vec![i]));
        out.push(BuiltShape::new(input.dimension, ShapeData::new(below), vec![i]));
    }
    if out.is_empty() {
        return Err(CoreError::kernel("plane does not cut any input"));
    }
    Ok(out)
}

fn split(inputs: &[KernelInput], parts: usize, op: &KernelOp) -> CoreResult<Vec<BuiltShape>> {
    require(inputs, 1, op)?;
    require_dim(inputs, Dimension::D1, op)?;
    if parts < 2 {
        return Err(CoreError::kernel("split needs at least 2 parts"));
    }
    let points = &inputs[0].shape.points;
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(CoreError::kernel("cannot split an empty curve"));
    };
    let at = |k: usize| first.lerp(*last, k as f64 / parts as f64);
    let mut out: Vec<BuiltShape> = (0..parts)
        .map(|k| BuiltShape::new(Dimension::D1, ShapeData::new(vec![at(k), at(k + 1)]), vec![0]))
        .collect();
    out.extend(
        (1..parts).map(|k| BuiltShape::new(Dimension::D0, ShapeData::point(at(k)), vec![0])),
    );
    Ok(out)
}
