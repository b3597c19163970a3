use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use geometer_common::prelude::{PointId, Rational};

use crate::error::EngineError;

/// The predicate vocabulary understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PredKind
{
    Coll,
    Cong,
    Perp,
    Para,
    EqAngle,
    AConst,
    SAngle,
    AngEq,
    Cyclic,
    CyclicWithCenters,
    DistMEq,
    DistSEq,
    RConst,
    EqRatio,
    Overlap,
    ACompute,
}

impl PredKind
{
    #[must_use]
    pub const fn as_str(self) -> &'static str
    {
        match self {
            Self::Coll => "coll",
            Self::Cong => "cong",
            Self::Perp => "perp",
            Self::Para => "para",
            Self::EqAngle => "eqangle",
            Self::AConst => "aconst",
            Self::SAngle => "s_angle",
            Self::AngEq => "angeq",
            Self::Cyclic => "cyclic",
            Self::CyclicWithCenters => "cyclic_with_centers",
            Self::DistMEq => "distmeq",
            Self::DistSEq => "distseq",
            Self::RConst => "rconst",
            Self::EqRatio => "eqratio",
            Self::Overlap => "overlap",
            Self::ACompute => "acompute",
        }
    }
}

impl FromStr for PredKind
{
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s {
            "coll" => Ok(Self::Coll),
            "cong" => Ok(Self::Cong),
            "perp" => Ok(Self::Perp),
            "para" => Ok(Self::Para),
            "eqangle" => Ok(Self::EqAngle),
            "aconst" => Ok(Self::AConst),
            "s_angle" => Ok(Self::SAngle),
            "angeq" => Ok(Self::AngEq),
            "cyclic" => Ok(Self::Cyclic),
            "cyclic_with_centers" => Ok(Self::CyclicWithCenters),
            "distmeq" => Ok(Self::DistMEq),
            "distseq" => Ok(Self::DistSEq),
            "rconst" => Ok(Self::RConst),
            "eqratio" => Ok(Self::EqRatio),
            "overlap" => Ok(Self::Overlap),
            "acompute" => Ok(Self::ACompute),
            _ => Err(EngineError::UnknownPredicate(s.to_owned())),
        }
    }
}

impl std::fmt::Display for PredKind
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.write_str(self.as_str())
    }
}

/// A symbolic predicate over resolved points: a kind, the point arguments
/// in order, and the numeric constants in order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pred
{
    pub kind: PredKind,
    pub points: Vec<PointId>,
    pub constants: Vec<Rational>,
}

impl Pred
{
    #[must_use]
    pub fn new(kind: PredKind, points: Vec<PointId>, constants: Vec<Rational>) -> Self
    {
        Self {
            kind,
            points,
            constants,
        }
    }

    /// The point arguments read as consecutive (segment) pairs.
    pub(crate) fn point_pairs(&self) -> impl Iterator<Item = (PointId, PointId)> + '_
    {
        self.points.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Outcome of a query against the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Verdict
{
    /// The predicate is entailed by the installed constraints.
    Entailed,
    /// Not derivable from what is currently known.
    Unknown,
    /// An `acompute` answer: the angle, as a rational multiple of pi.
    Angle(Rational),
}

impl Verdict
{
    #[must_use]
    pub const fn is_entailed(&self) -> bool
    {
        matches!(self, Self::Entailed)
    }
}

impl std::fmt::Display for Verdict
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        match self {
            Self::Entailed => f.write_str("entailed"),
            Self::Unknown => f.write_str("unknown"),
            Self::Angle(r) => write!(f, "{r} pi"),
        }
    }
}
