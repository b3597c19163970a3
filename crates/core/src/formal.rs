use derive_more::{From, Into};

use geometer_common::prelude::{NumCircle, NumLine, PointId};

use crate::quantities::Angle;

/// Opaque handle to a formal line in the engine's arena.
#[derive(Clone, Copy, Debug, Hash, From, Into, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineId(u32);

/// Opaque handle to a formal circle in the engine's arena.
#[derive(Clone, Copy, Debug, Hash, From, Into, PartialEq, Eq, PartialOrd, Ord)]
pub struct CircleId(u32);

/// Database record for a maximal set of points known to be collinear.
///
/// Immutable once created; merges replace the whole record and repoint
/// every pair key, so a handle held across a merge must be re-resolved
/// through `pair_to_line`.
#[derive(Clone, Debug)]
pub struct FormalLine
{
    /// Members, sorted by position along the numeric line.
    pub points: Vec<PointId>,
    /// The pair whose direction variable stands for the whole line.
    pub main_pair: (PointId, PointId),
    pub direction: Angle,
    pub line: NumLine,
}

impl FormalLine
{
    #[must_use]
    pub fn contains(&self, p: PointId) -> bool
    {
        self.points.contains(&p)
    }
}

/// Database record for a set of points known to be concyclic.
#[derive(Clone, Debug)]
pub struct FormalCircle
{
    /// The three points pinning down the geometric realisation.
    pub defining: (PointId, PointId, PointId),
    pub points: Vec<PointId>,
    /// Known centers; zero, one, or more.
    pub centers: Vec<PointId>,
    pub circle: NumCircle,
}

impl FormalCircle
{
    #[must_use]
    pub fn contains(&self, p: PointId) -> bool
    {
        self.points.contains(&p)
    }
}
