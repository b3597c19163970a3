/// Errors raised by the strict installation paths of the engine.
///
/// Exploratory search rules never raise; they report "learned nothing"
/// through a changed-flag instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError
{
    /// A forced constraint whose numeric value is not the identity: the
    /// caller supplied a predicate that is false in the diagram.
    NumericInconsistency(String),
    /// Points declared collinear or concyclic are not numerically so.
    GeometricInconsistency(String),
    /// Too few distinct points to define the requested object.
    DegenerateInput(String),
    /// Unrecognised predicate name.
    UnknownPredicate(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl std::fmt::Display for EngineError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        match self {
            Self::NumericInconsistency(what) => {
                write!(f, "numerically inconsistent constraint: {what}")
            }
            Self::GeometricInconsistency(what) => {
                write!(f, "geometrically inconsistent declaration: {what}")
            }
            Self::DegenerateInput(what) => write!(f, "degenerate input: {what}"),
            Self::UnknownPredicate(name) => write!(f, "unknown predicate: {name}"),
        }
    }
}

impl std::error::Error for EngineError {}
