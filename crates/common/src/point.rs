use derive_more::{From, Into};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{Cplx, Real};

/// Dense index identifying a point for the lifetime of an engine.
///
/// Identity, not the display name, is the key in every geometric map: two
/// points may share a name after a merge, but never an id.
#[derive(Clone, Copy, Debug, Hash, From, Into, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointId(u32);

impl PointId
{
    #[must_use]
    pub const fn new(index: u32) -> Self
    {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize
    {
        self.0 as usize
    }
}

/// A named point with a fixed 2-D position. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point
{
    pub id: PointId,
    pub name: String,
    pub pos: Cplx,
}

impl Point
{
    #[must_use]
    pub fn new(id: PointId, name: impl Into<String>, x: Real, y: Real) -> Self
    {
        Self {
            id,
            name: name.into(),
            pos: Cplx::new(x, y),
        }
    }
}

impl std::fmt::Display for Point
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "{}", self.name)
    }
}
