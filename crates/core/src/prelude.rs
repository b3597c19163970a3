pub use geometer_common::prelude::*;

pub use crate::comb::LinComb;
pub use crate::elim::Elimination;
pub use crate::engine::Engine;
pub use crate::error::{EngineError, EngineResult};
pub use crate::formal::{CircleId, FormalCircle, FormalLine, LineId};
pub use crate::parse::{ParsedPred, Problem};
pub use crate::pred::{Pred, PredKind, Verdict};
pub use crate::quantities::{Angle, DistAdd, DistMul};
pub use crate::var::Var;
