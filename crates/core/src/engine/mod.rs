use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use itertools::Itertools;
use num_traits::Signed;

use geometer_common::prelude::*;

use crate::comb::LinComb;
use crate::elim::Elimination;
use crate::error::{EngineError, EngineResult};
use crate::formal::{CircleId, FormalCircle, FormalLine, LineId};
use crate::pred::{Pred, PredKind, Verdict};
use crate::quantities::{coeff_to_ratio, coeff_to_real, ratio_to_coeff, Angle, DistAdd, DistMul};
use crate::var::Var;

mod rules;

/// The elimination variables attached to a pair of points: the direction of
/// the line through them, the log of their distance, and their distance.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PairVars
{
    pub dir: Var,
    pub dist_mul: Var,
    pub dist_add: Var,
}

/// The deduction engine: a numeric model of the configuration, three
/// elimination cores, and the geometry database the inference rules read
/// and extend.
#[derive(Clone, Debug, Default)]
pub struct Engine
{
    /// Every point ever created, indexed by id. Never shrinks.
    points: Vec<Point>,
    /// Ids of the currently live points; shrinks on merge.
    pub(crate) live: Vec<PointId>,
    /// Original id -> current representative. Applied to every incoming
    /// predicate, so merged points stay transparent to callers.
    point_subst: HashMap<PointId, PointId>,
    by_name: HashMap<String, PointId>,

    pub(crate) lines: BTreeMap<LineId, FormalLine>,
    pub(crate) circles: BTreeMap<CircleId, FormalCircle>,
    pub(crate) pair_to_line: HashMap<(PointId, PointId), LineId>,
    pub(crate) triple_to_circle: HashMap<(PointId, PointId, PointId), CircleId>,
    next_line: u32,
    next_circle: u32,

    pair_vars: HashMap<(PointId, PointId), PairVars>,

    pub(crate) angles: Elimination,
    pub(crate) dist_muls: Elimination,
    pub(crate) dist_adds: Elimination,

    var_names: Vec<String>,
    var_values: Vec<Real>,

    pub(crate) known_similar: HashSet<([PointId; 3], [PointId; 3])>,
    /// Equidistance clusters too small to be circles on the last pass;
    /// a merge may grow one to three members retroactively.
    pub(crate) last_small_circles: Vec<(PointId, Vec<PointId>)>,

    dist_mul_cache: HashMap<(PointId, PointId), DistMul>,
    direction_cache: HashMap<(PointId, PointId), Angle>,
}

impl Engine
{
    /// Build an engine over the given named positions. Quantity variables
    /// are allocated eagerly for every pair further apart than the
    /// tolerance; coincident pairs carry no variables.
    #[must_use]
    pub fn new<I, S>(decls: I) -> Self
    where
        I: IntoIterator<Item = (S, Real, Real)>,
        S: Into<String>,
    {
        let mut engine = Self::default();
        for (i, (name, x, y)) in decls.into_iter().enumerate() {
            let id = PointId::new(i as u32);
            let point = Point::new(id, name, x, y);
            engine.by_name.insert(point.name.clone(), id);
            engine.live.push(id);
            engine.points.push(point);
        }

        let ids = engine.live.clone();
        for (&a, &b) in ids.iter().tuple_combinations() {
            let pa = engine.pos(a);
            let pb = engine.pos(b);
            let dist = distance(pa, pb);
            if dist * dist <= ATOM {
                continue;
            }
            let dir = engine.new_var(
                format!("d({},{})", engine.name_of(a), engine.name_of(b)),
                NumLine::through(pa, pb).direction(),
            );
            let dist_mul = engine.new_var(
                format!("lm({},{})", engine.name_of(a), engine.name_of(b)),
                dist.ln(),
            );
            let dist_add = engine.new_var(
                format!("la({},{})", engine.name_of(a), engine.name_of(b)),
                dist,
            );
            engine.pair_vars.insert(
                pair_key(a, b),
                PairVars {
                    dir,
                    dist_mul,
                    dist_add,
                },
            );
        }
        engine.update_cache();
        engine
    }

    #[must_use]
    pub fn live_points(&self) -> &[PointId]
    {
        &self.live
    }

    #[must_use]
    pub fn point_named(&self, name: &str) -> Option<PointId>
    {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn name_of(&self, p: PointId) -> &str
    {
        &self.points[p.index()].name
    }

    #[must_use]
    pub(crate) fn pos(&self, p: PointId) -> Cplx
    {
        self.points[p.index()].pos
    }

    /// Current representative of a (possibly merged-away) point.
    #[must_use]
    pub fn resolve(&self, p: PointId) -> PointId
    {
        self.point_subst.get(&p).copied().unwrap_or(p)
    }

    /// Bind a parsed predicate's point names to ids.
    pub fn resolve_parsed(&self, parsed: &crate::parse::ParsedPred) -> EngineResult<Pred>
    {
        let points = parsed
            .points
            .iter()
            .map(|name| {
                self.point_named(name).ok_or_else(|| {
                    EngineError::DegenerateInput(format!("unknown point {name}"))
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Pred::new(parsed.kind, points, parsed.constants.clone()))
    }

    /// Textual form of a predicate, point names restored.
    #[must_use]
    pub fn pred_text(&self, pred: &Pred) -> String
    {
        let mut tokens = vec![pred.kind.to_string()];
        let constants_first = matches!(
            pred.kind,
            PredKind::AngEq | PredKind::DistMEq | PredKind::DistSEq | PredKind::CyclicWithCenters
        );
        let constants = pred.constants.iter().map(ToString::to_string);
        let points = pred
            .points
            .iter()
            .map(|&p| self.name_of(self.resolve(p)).to_owned());
        if constants_first {
            tokens.extend(constants);
            tokens.extend(points);
        } else {
            tokens.extend(points);
            tokens.extend(constants);
        }
        tokens.join(" ")
    }

    fn new_var(&mut self, name: String, value: Real) -> Var
    {
        let id = self.var_names.len() as u32;
        self.var_names.push(name);
        self.var_values.push(value);
        Var::Lhs(id)
    }

    fn var_value(&self, var: Var) -> Real
    {
        match var {
            Var::Lhs(id) => self.var_values[id as usize],
            _ => var.constant_value().unwrap_or(Real::NAN),
        }
    }

    pub(crate) fn comb_value(&self, comb: &LinComb) -> Real
    {
        comb.iter()
            .map(|(var, coeff)| coeff_to_real(coeff) * self.var_value(*var))
            .sum()
    }

    // ------------------------------------------------------------------
    // Per-pair quantities
    // ------------------------------------------------------------------

    pub(crate) fn pair_dir(&self, a: PointId, b: PointId) -> Option<Angle>
    {
        let pv = self.pair_vars.get(&pair_key(a, b))?;
        Some(Angle::from_var(pv.dir, self.var_value(pv.dir)))
    }

    pub(crate) fn pair_dmul(&self, a: PointId, b: PointId) -> Option<DistMul>
    {
        let pv = self.pair_vars.get(&pair_key(a, b))?;
        Some(DistMul::from_var(pv.dist_mul, self.var_value(pv.dist_mul)))
    }

    pub(crate) fn pair_dadd(&self, a: PointId, b: PointId) -> Option<DistAdd>
    {
        let pv = self.pair_vars.get(&pair_key(a, b))?;
        Some(DistAdd::from_var(pv.dist_add, self.var_value(pv.dist_add)))
    }

    pub(crate) fn has_pair_vars(&self, a: PointId, b: PointId) -> bool
    {
        self.pair_vars.contains_key(&pair_key(a, b))
    }

    pub(crate) fn pair_vars_of(&self, a: PointId, b: PointId) -> Option<PairVars>
    {
        self.pair_vars.get(&pair_key(a, b)).copied()
    }

    pub(crate) fn simplify_angle(&self, q: &Angle) -> Angle
    {
        let comb = self.angles.simplified(q.comb());
        let value = self.comb_value(&comb);
        Angle::new(comb, value)
    }

    pub(crate) fn simplify_mul(&self, q: &DistMul) -> DistMul
    {
        let comb = self.dist_muls.simplified(q.comb());
        let value = self.comb_value(&comb);
        DistMul::new(comb, value)
    }

    pub(crate) fn simplify_add(&self, q: &DistAdd) -> DistAdd
    {
        let comb = self.dist_adds.simplified(q.comb());
        let value = self.comb_value(&comb);
        DistAdd::new(comb, value)
    }

    /// Simplified direction of a pair, from the cache when fresh.
    pub(crate) fn dir_cached(&self, a: PointId, b: PointId) -> Option<Angle>
    {
        let key = pair_key(a, b);
        if let Some(cached) = self.direction_cache.get(&key) {
            return Some(cached.clone());
        }
        self.pair_dir(a, b).map(|q| self.simplify_angle(&q))
    }

    /// Simplified multiplicative distance of a pair, from the cache when
    /// fresh.
    pub(crate) fn mul_cached(&self, a: PointId, b: PointId) -> Option<DistMul>
    {
        let key = pair_key(a, b);
        if let Some(cached) = self.dist_mul_cache.get(&key) {
            return Some(cached.clone());
        }
        self.pair_dmul(a, b).map(|q| self.simplify_mul(&q))
    }

    /// Re-simplify the per-pair quantities. Run after every rule that
    /// installed a constraint, so the tight search loops stay cheap.
    pub(crate) fn update_cache(&mut self)
    {
        let keys: Vec<(PointId, PointId)> = self
            .live
            .iter()
            .tuple_combinations()
            .map(|(&a, &b)| pair_key(a, b))
            .filter(|key| self.pair_vars.contains_key(key))
            .collect();
        self.direction_cache.clear();
        self.dist_mul_cache.clear();
        for key in keys {
            if let Some(q) = self.pair_dir(key.0, key.1) {
                let simplified = self.simplify_angle(&q);
                self.direction_cache.insert(key, simplified);
            }
            if let Some(q) = self.pair_dmul(key.0, key.1) {
                let simplified = self.simplify_mul(&q);
                self.dist_mul_cache.insert(key, simplified);
            }
        }
    }

    // ------------------------------------------------------------------
    // Numeric gates and installation
    // ------------------------------------------------------------------

    fn num_identity_angle(&self, comb: &LinComb) -> bool
    {
        let frac = self.comb_value(comb).rem_euclid(1.0);
        frac < ATOM_SQRT || frac > 1.0 - ATOM_SQRT
    }

    fn num_identity_linear(&self, comb: &LinComb) -> bool
    {
        self.comb_value(comb).abs() < ATOM_SQRT
    }

    /// Tolerant installation for search rules: a candidate that fails the
    /// numeric gate is dropped silently.
    pub(crate) fn try_install_angle(&mut self, q: Angle) -> bool
    {
        if !self.num_identity_angle(q.comb()) {
            log::debug!("dropping numerically false angle candidate");
            return false;
        }
        self.angles.add_constraint(q.into_comb())
    }

    pub(crate) fn try_install_mul(&mut self, q: DistMul) -> bool
    {
        if !self.num_identity_linear(q.comb()) {
            log::debug!("dropping numerically false ratio candidate");
            return false;
        }
        self.dist_muls.add_constraint(q.into_comb())
    }

    pub(crate) fn try_install_add(&mut self, q: DistAdd) -> bool
    {
        if !self.num_identity_linear(q.comb()) {
            log::debug!("dropping numerically false sum candidate");
            return false;
        }
        self.dist_adds.add_constraint(q.into_comb())
    }

    // ------------------------------------------------------------------
    // Predicate translation
    // ------------------------------------------------------------------

    fn substitute(&self, pred: &Pred) -> Pred
    {
        Pred {
            kind: pred.kind,
            points: pred.points.iter().map(|&p| self.resolve(p)).collect(),
            constants: pred.constants.clone(),
        }
    }

    /// Both readings of an angle equality: the directed form and its
    /// reflection. The numeric oracle picks the branch on installation.
    fn translate_eqangle(&self, p: &[PointId]) -> Option<(Angle, Angle)>
    {
        let ang1 = self.pair_dir(p[0], p[1])? - self.pair_dir(p[2], p[3])?;
        let ang2 = self.pair_dir(p[4], p[5])? - self.pair_dir(p[6], p[7])?;
        Some((ang1.clone() - ang2.clone(), ang1 + ang2))
    }

    fn translate_para(&self, p: &[PointId]) -> Option<Angle>
    {
        Some(self.pair_dir(p[0], p[1])? - self.pair_dir(p[2], p[3])?)
    }

    fn translate_perp(&self, p: &[PointId]) -> Option<Angle>
    {
        let half = Angle::from_rational(Rational::new(1, 2));
        Some(self.pair_dir(p[0], p[1])? - self.pair_dir(p[2], p[3])? - half)
    }

    fn translate_aconst(&self, p: &[PointId], degrees: Rational) -> Option<(Angle, Angle)>
    {
        let turn = Angle::from_rational(degrees / 180);
        let diff = self.pair_dir(p[0], p[1])? - self.pair_dir(p[2], p[3])?;
        Some((diff.clone() - turn.clone(), -diff - turn))
    }

    /// angeq c1..ck n; p1 q1 .. pk qk: sum of ci * d(pi, qi) = n degrees.
    fn translate_angeq(&self, pred: &Pred) -> Option<(Angle, Angle)>
    {
        let (&degrees, coeffs) = pred.constants.split_last()?;
        if coeffs.len() != pred.points.len() / 2 {
            return None;
        }
        let mut sum = Angle::zero();
        for (&c, (a, b)) in coeffs.iter().zip(pred.point_pairs()) {
            sum = sum + self.pair_dir(a, b)?.scaled(c);
        }
        let turn = Angle::from_rational(degrees / 180);
        Some((sum.clone() - turn.clone(), sum + turn))
    }

    fn translate_cong(&self, p: &[PointId]) -> Option<DistMul>
    {
        Some(self.pair_dmul(p[0], p[1])? / self.pair_dmul(p[2], p[3])?)
    }

    fn translate_rconst(&self, p: &[PointId], ratio: Rational) -> Option<DistMul>
    {
        let konst = DistMul::from_ratio(ratio)?;
        Some(self.translate_cong(p)? / konst)
    }

    fn translate_eqratio(&self, p: &[PointId]) -> Option<DistMul>
    {
        let lhs = self.pair_dmul(p[0], p[1])? / self.pair_dmul(p[2], p[3])?;
        let rhs = self.pair_dmul(p[4], p[5])? / self.pair_dmul(p[6], p[7])?;
        Some(lhs / rhs)
    }

    /// distmeq c1..ck n; pairs: product of |pi qi|^ci = n, in log form.
    fn translate_distmeq(&self, pred: &Pred) -> Option<DistMul>
    {
        let (&konst, coeffs) = pred.constants.split_last()?;
        if coeffs.len() != pred.points.len() / 2 {
            return None;
        }
        let mut comb = LinComb::new();
        let mut value = 0.;
        for (&c, (a, b)) in coeffs.iter().zip(pred.point_pairs()) {
            let term = self.pair_dmul(a, b)?;
            comb.add_scaled(&ratio_to_coeff(c), term.comb());
            value += coeff_to_real(&ratio_to_coeff(c)) * term.value();
        }
        let rhs = DistMul::from_ratio(konst)?;
        Some(DistMul::new(comb, value) / rhs)
    }

    /// distseq c1..ck n; pairs: sum of ci * |pi qi| = n. The additive core
    /// has no constant atom, so only n = 0 is expressible.
    fn translate_distseq(&self, pred: &Pred) -> Option<DistAdd>
    {
        let (_, coeffs) = pred.constants.split_last()?;
        if coeffs.len() != pred.points.len() / 2 {
            return None;
        }
        let mut comb = LinComb::new();
        let mut value = 0.;
        for (&c, (a, b)) in coeffs.iter().zip(pred.point_pairs()) {
            let term = self.pair_dadd(a, b)?;
            comb.add_scaled(&ratio_to_coeff(c), term.comb());
            value += coeff_to_real(&ratio_to_coeff(c)) * term.value();
        }
        Some(DistAdd::new(comb, value))
    }

    // ------------------------------------------------------------------
    // force_pred / check_pred
    // ------------------------------------------------------------------

    /// Install an assumption. Returns whether anything new was learned.
    pub fn force_pred(&mut self, pred: &Pred) -> EngineResult<bool>
    {
        let pred = self.substitute(pred);
        match pred.kind {
            PredKind::Coll => {
                let pts = pred.points.clone();
                self.force_collinear(&pts)
            }
            PredKind::Cyclic => self.force_concyclic(&pred.points.clone(), &[]),
            PredKind::CyclicWithCenters => self.force_cyclic_with_centers(&pred),
            PredKind::Overlap => {
                let [a, b] = two_points(&pred)?;
                self.force_equal_points(a, b)
            }
            PredKind::ACompute => {
                log::warn!("acompute cannot be forced; ignoring");
                Ok(false)
            }
            PredKind::EqAngle => {
                let p = n_points(&pred, 8)?;
                let branches = self.translate_eqangle(&p);
                self.force_angle_branches(&pred, branches)
            }
            PredKind::AConst | PredKind::SAngle => {
                let p = n_points(&pred, 4)?;
                let degrees = one_constant(&pred)?;
                let branches = self.translate_aconst(&p, degrees);
                self.force_angle_branches(&pred, branches)
            }
            PredKind::AngEq => {
                let branches = self.translate_angeq(&pred);
                self.force_angle_branches(&pred, branches)
            }
            PredKind::Para => {
                let p = n_points(&pred, 4)?;
                let q = self.translate_para(&p).ok_or_else(|| degenerate(&pred))?;
                self.force_angle(&pred, q)
            }
            PredKind::Perp => {
                let p = n_points(&pred, 4)?;
                let q = self.translate_perp(&p).ok_or_else(|| degenerate(&pred))?;
                self.force_angle(&pred, q)
            }
            PredKind::Cong => {
                let p = n_points(&pred, 4)?;
                let q = self.translate_cong(&p).ok_or_else(|| degenerate(&pred))?;
                self.force_mul(&pred, q)
            }
            PredKind::RConst => {
                let p = n_points(&pred, 4)?;
                let ratio = one_constant(&pred)?;
                let q = self
                    .translate_rconst(&p, ratio)
                    .ok_or_else(|| degenerate(&pred))?;
                self.force_mul(&pred, q)
            }
            PredKind::EqRatio => {
                let p = n_points(&pred, 8)?;
                let q = self
                    .translate_eqratio(&p)
                    .ok_or_else(|| degenerate(&pred))?;
                self.force_mul(&pred, q)
            }
            PredKind::DistMEq => {
                let q = self
                    .translate_distmeq(&pred)
                    .ok_or_else(|| degenerate(&pred))?;
                self.force_mul(&pred, q)
            }
            PredKind::DistSEq => {
                let (&konst, _) = pred
                    .constants
                    .split_last()
                    .ok_or_else(|| degenerate(&pred))?;
                if konst != Rational::from_integer(0) {
                    return Err(EngineError::DegenerateInput(
                        "distseq requires a zero right-hand side".to_owned(),
                    ));
                }
                let q = self
                    .translate_distseq(&pred)
                    .ok_or_else(|| degenerate(&pred))?;
                self.force_add(&pred, q)
            }
        }
    }

    fn force_angle_branches(
        &mut self,
        pred: &Pred,
        branches: Option<(Angle, Angle)>,
    ) -> EngineResult<bool>
    {
        let (directed, reflected) = branches.ok_or_else(|| degenerate(pred))?;
        if self.num_identity_angle(directed.comb()) {
            return Ok(self.angles.add_constraint(directed.into_comb()));
        }
        if self.num_identity_angle(reflected.comb()) {
            return Ok(self.angles.add_constraint(reflected.into_comb()));
        }
        Err(numeric_error(pred))
    }

    fn force_angle(&mut self, pred: &Pred, q: Angle) -> EngineResult<bool>
    {
        if !self.num_identity_angle(q.comb()) {
            return Err(numeric_error(pred));
        }
        Ok(self.angles.add_constraint(q.into_comb()))
    }

    fn force_mul(&mut self, pred: &Pred, q: DistMul) -> EngineResult<bool>
    {
        if !self.num_identity_linear(q.comb()) {
            return Err(numeric_error(pred));
        }
        Ok(self.dist_muls.add_constraint(q.into_comb()))
    }

    fn force_add(&mut self, pred: &Pred, q: DistAdd) -> EngineResult<bool>
    {
        if !self.num_identity_linear(q.comb()) {
            return Err(numeric_error(pred));
        }
        Ok(self.dist_adds.add_constraint(q.into_comb()))
    }

    fn force_cyclic_with_centers(&mut self, pred: &Pred) -> EngineResult<bool>
    {
        let count = *pred.constants.first().ok_or_else(|| degenerate(pred))?;
        if !count.is_integer() || !count.is_positive() {
            return Err(degenerate(pred));
        }
        let count = *count.numer() as usize;
        if count >= pred.points.len() {
            return Err(degenerate(pred));
        }
        let centers = pred.points[..count].to_vec();
        let members = pred.points[count..].to_vec();

        let distinct: Vec<PointId> = dedupe(&members)
            .into_iter()
            .filter(|m| !centers.contains(m))
            .collect();
        if distinct.len() >= 3 {
            return self.force_concyclic(&members, &centers);
        }

        // Too few points to pin down a circle: record the equal distances
        // to the first center instead.
        let c0 = centers[0];
        let mut changed = false;
        let first = *distinct.first().ok_or_else(|| degenerate(pred))?;
        for &m in distinct.iter().skip(1) {
            let q = self
                .pair_dmul(c0, m)
                .zip(self.pair_dmul(c0, first))
                .map(|(num, den)| num / den)
                .ok_or_else(|| degenerate(pred))?;
            changed |= self.force_mul(pred, q)?;
        }
        Ok(changed)
    }

    /// Query a predicate against the current closure.
    #[must_use]
    pub fn check_pred(&self, pred: &Pred) -> Verdict
    {
        let pred = self.substitute(pred);
        match pred.kind {
            PredKind::Coll => self.check_collinear(&pred.points),
            PredKind::Cyclic => self.check_concyclic(&pred.points, &[]),
            PredKind::CyclicWithCenters => {
                let Some(count) = pred.constants.first() else {
                    return Verdict::Unknown;
                };
                if !count.is_integer() || !count.is_positive() {
                    return Verdict::Unknown;
                }
                let count = (*count.numer() as usize).min(pred.points.len());
                self.check_concyclic(&pred.points[count..], &pred.points[..count])
            }
            PredKind::Overlap => {
                if pred.points.len() == 2 && pred.points[0] == pred.points[1] {
                    Verdict::Entailed
                } else {
                    Verdict::Unknown
                }
            }
            PredKind::ACompute => {
                if pred.points.len() != 4 {
                    return Verdict::Unknown;
                }
                let Some(diff) = self.translate_para(&pred.points) else {
                    return Verdict::Unknown;
                };
                let canonical = self.simplify_angle(&diff);
                match canonical.constant().as_ref().and_then(coeff_to_ratio) {
                    Some(r) => Verdict::Angle(r),
                    None => Verdict::Unknown,
                }
            }
            PredKind::EqAngle => {
                if pred.points.len() != 8 {
                    return Verdict::Unknown;
                }
                self.check_angle_branches(self.translate_eqangle(&pred.points))
            }
            PredKind::AConst | PredKind::SAngle => {
                if pred.points.len() != 4 || pred.constants.len() != 1 {
                    return Verdict::Unknown;
                }
                self.check_angle_branches(self.translate_aconst(&pred.points, pred.constants[0]))
            }
            PredKind::AngEq => self.check_angle_branches(self.translate_angeq(&pred)),
            PredKind::Para => self.check_angle(pred.points.get(..4).and_then(|p| {
                self.translate_para(p)
            })),
            PredKind::Perp => self.check_angle(pred.points.get(..4).and_then(|p| {
                self.translate_perp(p)
            })),
            PredKind::Cong => self.check_mul(pred.points.get(..4).and_then(|p| {
                self.translate_cong(p)
            })),
            PredKind::RConst => {
                let Some(&ratio) = pred.constants.first() else {
                    return Verdict::Unknown;
                };
                self.check_mul(pred.points.get(..4).and_then(|p| {
                    self.translate_rconst(p, ratio)
                }))
            }
            PredKind::EqRatio => self.check_mul(pred.points.get(..8).and_then(|p| {
                self.translate_eqratio(p)
            })),
            PredKind::DistMEq => self.check_mul(self.translate_distmeq(&pred)),
            PredKind::DistSEq => {
                let Some(q) = self.translate_distseq(&pred) else {
                    return Verdict::Unknown;
                };
                if self.simplify_add(&q).is_identity() {
                    Verdict::Entailed
                } else {
                    Verdict::Unknown
                }
            }
        }
    }

    fn check_angle(&self, q: Option<Angle>) -> Verdict
    {
        match q {
            Some(q) if self.simplify_angle(&q).is_identity() => Verdict::Entailed,
            _ => Verdict::Unknown,
        }
    }

    fn check_angle_branches(&self, branches: Option<(Angle, Angle)>) -> Verdict
    {
        let Some((directed, reflected)) = branches else {
            return Verdict::Unknown;
        };
        if self.simplify_angle(&directed).is_identity()
            || self.simplify_angle(&reflected).is_identity()
        {
            Verdict::Entailed
        } else {
            Verdict::Unknown
        }
    }

    fn check_mul(&self, q: Option<DistMul>) -> Verdict
    {
        match q {
            Some(q) if self.simplify_mul(&q).is_identity() => Verdict::Entailed,
            _ => Verdict::Unknown,
        }
    }

    fn check_collinear(&self, points: &[PointId]) -> Verdict
    {
        let distinct = dedupe(points);
        if distinct.len() <= 2 {
            return Verdict::Entailed;
        }
        let Some(&line_id) = self.pair_to_line.get(&pair_key(distinct[0], distinct[1])) else {
            return Verdict::Unknown;
        };
        let line = &self.lines[&line_id];
        if distinct.iter().all(|&p| line.contains(p)) {
            Verdict::Entailed
        } else {
            Verdict::Unknown
        }
    }

    fn check_concyclic(&self, members: &[PointId], centers: &[PointId]) -> Verdict
    {
        let distinct = dedupe(members);
        let centers = dedupe(centers);
        if distinct.len() <= 2 && centers.is_empty() {
            return Verdict::Entailed;
        }
        let on_record = self.circles.values().any(|circle| {
            distinct.iter().all(|&p| circle.contains(p))
                && centers.iter().all(|c| circle.centers.contains(c))
        });
        if on_record {
            return Verdict::Entailed;
        }
        // With a center, equal distances are just as good as a record.
        if let (Some(&c0), Some(&m0)) = (centers.first(), distinct.first()) {
            let equidistant = distinct.iter().skip(1).all(|&m| {
                self.pair_dmul(c0, m)
                    .zip(self.pair_dmul(c0, m0))
                    .is_some_and(|(num, den)| self.simplify_mul(&(num / den)).is_identity())
            });
            if equidistant && centers.len() == 1 {
                return Verdict::Entailed;
            }
        }
        Verdict::Unknown
    }

    // ------------------------------------------------------------------
    // Structural installation: collinearity, concyclicity, merging
    // ------------------------------------------------------------------

    /// Install the collinearity of a point set: merge every formal line
    /// sharing two members, glue directions, emit additive length sums,
    /// and rebuild the pair index. Returns whether anything new was
    /// learned.
    pub fn force_collinear(&mut self, points: &[PointId]) -> EngineResult<bool>
    {
        let distinct: Vec<PointId> = dedupe(points).into_iter().map(|p| self.resolve(p)).collect();
        let distinct = dedupe(&distinct);
        if distinct.len() < 2 {
            return Err(EngineError::DegenerateInput(
                "collinearity needs two distinct points".to_owned(),
            ));
        }

        let (fa, fb) = self.farthest_pair(&distinct);
        if distance(self.pos(fa), self.pos(fb)) < ATOM_SQRT {
            return Err(EngineError::DegenerateInput(
                "collinearity over coincident points".to_owned(),
            ));
        }
        let numline = NumLine::through(self.pos(fa), self.pos(fb));
        for &p in &distinct {
            if !numline.contains(self.pos(p)) {
                return Err(EngineError::GeometricInconsistency(format!(
                    "{} is not on the declared line",
                    self.name_of(p)
                )));
            }
        }

        // Transitive closure: any existing line sharing two members is the
        // same line.
        let mut members: BTreeSet<PointId> = distinct.iter().copied().collect();
        let mut merged: Vec<LineId> = Vec::new();
        loop {
            let mut grew = false;
            for (&id, line) in &self.lines {
                if merged.contains(&id) {
                    continue;
                }
                let shared = line.points.iter().filter(|p| members.contains(p)).count();
                if shared >= 2 {
                    merged.push(id);
                    members.extend(line.points.iter().copied());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        for &p in &members {
            if !numline.contains(self.pos(p)) {
                return Err(EngineError::GeometricInconsistency(format!(
                    "merged member {} is not on the line",
                    self.name_of(p)
                )));
            }
        }

        // Already recorded and nothing to extend: learn nothing.
        if let [only] = merged.as_slice() {
            if members.len() == self.lines[only].points.len() {
                return Ok(false);
            }
        }

        let mut sorted: Vec<PointId> = members.into_iter().collect();
        sorted.sort_by(|&x, &y| {
            let px = numline.position_along(self.pos(x));
            let py = numline.position_along(self.pos(y));
            px.partial_cmp(&py).unwrap_or(std::cmp::Ordering::Equal)
        });

        let main_pair = merged
            .first()
            .map_or((fa, fb), |id| self.lines[id].main_pair);
        let main_dir = self
            .pair_dir(main_pair.0, main_pair.1)
            .ok_or_else(|| EngineError::DegenerateInput("degenerate main pair".to_owned()))?;

        // Glue every member pair's direction to the main direction.
        let glue: Vec<Angle> = sorted
            .iter()
            .tuple_combinations()
            .filter(|(&x, &y)| pair_key(x, y) != pair_key(main_pair.0, main_pair.1))
            .filter_map(|(&x, &y)| self.pair_dir(x, y))
            .map(|d| d - main_dir.clone())
            .collect();
        for q in glue {
            self.angles.add_constraint(q.into_comb());
        }

        // |ab| + |bc| = |ac| for every ordered triple along the line.
        let sums: Vec<DistAdd> = sorted
            .iter()
            .tuple_combinations()
            .filter_map(|(&x, &y, &z)| {
                let xy = self.pair_dadd(x, y)?;
                let yz = self.pair_dadd(y, z)?;
                let xz = self.pair_dadd(x, z)?;
                Some(xy + yz - xz)
            })
            .collect();
        for q in sums {
            self.dist_adds.add_constraint(q.into_comb());
        }

        for id in merged {
            self.drop_line(id);
        }
        let id = LineId::from(self.next_line);
        self.next_line += 1;
        for (&x, &y) in sorted.iter().tuple_combinations() {
            self.pair_to_line.insert(pair_key(x, y), id);
        }
        self.lines.insert(
            id,
            FormalLine {
                points: sorted,
                main_pair,
                direction: main_dir,
                line: numline,
            },
        );
        Ok(true)
    }

    /// Install the concyclicity of a member set, with optional known
    /// centers. Merges circles sharing a triple, emits inscribed-angle
    /// relations and center equidistances, and rebuilds the triple index.
    pub fn force_concyclic(
        &mut self,
        members: &[PointId],
        centers: &[PointId],
    ) -> EngineResult<bool>
    {
        let distinct: Vec<PointId> =
            dedupe(&members.iter().map(|&p| self.resolve(p)).collect::<Vec<_>>());
        let centers: Vec<PointId> =
            dedupe(&centers.iter().map(|&p| self.resolve(p)).collect::<Vec<_>>());
        if distinct.len() < 3 {
            return Err(EngineError::DegenerateInput(
                "a circle needs three distinct points".to_owned(),
            ));
        }

        // Transitive closure: any circle sharing three members is the same
        // circle.
        let mut member_set: BTreeSet<PointId> = distinct.iter().copied().collect();
        let mut center_set: BTreeSet<PointId> = centers.iter().copied().collect();
        let mut merged: Vec<CircleId> = Vec::new();
        loop {
            let mut grew = false;
            for (&id, circle) in &self.circles {
                if merged.contains(&id) {
                    continue;
                }
                let shared = circle
                    .points
                    .iter()
                    .filter(|p| member_set.contains(p))
                    .count();
                if shared >= 3 {
                    merged.push(id);
                    member_set.extend(circle.points.iter().copied());
                    center_set.extend(circle.centers.iter().copied());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }

        if let [only] = merged.as_slice() {
            let existing = &self.circles[only];
            if existing.points.len() == member_set.len()
                && existing.centers.len() == center_set.len()
            {
                return Ok(false);
            }
        }

        let defining;
        let numcircle;
        if let Some(&first) = merged.first() {
            let circle = &self.circles[&first];
            defining = circle.defining;
            numcircle = circle.circle;
        } else if let Some(&c0) = center_set.iter().next() {
            let m0 = distinct[0];
            numcircle = NumCircle::from_center(self.pos(c0), self.pos(m0));
            defining = (distinct[0], distinct[1], distinct[2]);
        } else {
            let Some((a, b, c)) = self.noncollinear_triple(&distinct) else {
                return Err(EngineError::GeometricInconsistency(
                    "declared circle members are collinear".to_owned(),
                ));
            };
            let Some(circle) = NumCircle::through(self.pos(a), self.pos(b), self.pos(c)) else {
                return Err(EngineError::GeometricInconsistency(
                    "no circle through the declared members".to_owned(),
                ));
            };
            defining = (a, b, c);
            numcircle = circle;
        }

        for &p in &member_set {
            if !numcircle.contains(self.pos(p)) {
                return Err(EngineError::GeometricInconsistency(format!(
                    "{} is not on the declared circle",
                    self.name_of(p)
                )));
            }
        }
        for &c in &center_set {
            let off = distance(self.pos(c), numcircle.center);
            if off * off >= ATOM {
                return Err(EngineError::GeometricInconsistency(format!(
                    "{} is not the center of the declared circle",
                    self.name_of(c)
                )));
            }
        }

        // Inscribed angles over the reference chord (a, b): for members
        // x and u off the chord, d(x,u) - d(x,b) - d(a,u) + d(a,b) = 0.
        // These generate every directed angle relation on the circle.
        let (ref_a, ref_b) = (defining.0, defining.1);
        let mut relations: Vec<Angle> = Vec::new();
        if let Some(dab) = self.pair_dir(ref_a, ref_b) {
            for &x in &member_set {
                if x == ref_a || x == ref_b {
                    continue;
                }
                for &u in &member_set {
                    if u == ref_a || u == ref_b || u == x {
                        continue;
                    }
                    let Some(dxu) = self.pair_dir(x, u) else {
                        continue;
                    };
                    let Some(dxb) = self.pair_dir(x, ref_b) else {
                        continue;
                    };
                    let Some(dau) = self.pair_dir(ref_a, u) else {
                        continue;
                    };
                    relations.push(dxu - dxb - dau + dab.clone());
                }
            }
        }
        for q in relations {
            self.try_install_angle(q);
        }

        // Equal distances from the first known center.
        if let Some(&c0) = center_set.iter().next() {
            let list: Vec<PointId> = member_set.iter().copied().collect();
            let base = list.iter().find_map(|&m| self.pair_dmul(c0, m));
            if let Some(base) = base {
                let quotients: Vec<DistMul> = list
                    .iter()
                    .filter_map(|&m| self.pair_dmul(c0, m))
                    .map(|d| d / base.clone())
                    .collect();
                for q in quotients {
                    self.try_install_mul(q);
                }
            }
        }

        for id in merged {
            self.drop_circle(id);
        }
        let id = CircleId::from(self.next_circle);
        self.next_circle += 1;
        let points: Vec<PointId> = member_set.into_iter().collect();
        for (&x, &y, &z) in points.iter().tuple_combinations() {
            for perm in [(x, y, z), (x, z, y), (y, x, z), (y, z, x), (z, x, y), (z, y, x)] {
                self.triple_to_circle.insert(perm, id);
            }
        }
        self.circles.insert(
            id,
            FormalCircle {
                defining,
                points,
                centers: center_set.into_iter().collect(),
                circle: numcircle,
            },
        );
        Ok(true)
    }

    /// Merge two points known to coincide. The second argument is
    /// eliminated; every database object and future predicate reference is
    /// rewritten to the first.
    pub fn force_equal_points(&mut self, a: PointId, b: PointId) -> EngineResult<bool>
    {
        let a = self.resolve(a);
        let b = self.resolve(b);
        if a == b {
            return Ok(false);
        }
        let gap = distance(self.pos(a), self.pos(b));
        if gap * gap >= ATOM {
            return Err(EngineError::NumericInconsistency(format!(
                "overlap of {} and {} at distinct positions",
                self.name_of(a),
                self.name_of(b)
            )));
        }

        // Lines containing exactly one of the pair first learn the other.
        let one_sided: Vec<Vec<PointId>> = self
            .lines
            .values()
            .filter(|line| line.contains(a) != line.contains(b))
            .map(|line| {
                let mut pts = line.points.clone();
                pts.push(if line.contains(a) { b } else { a });
                pts
            })
            .collect();
        for pts in one_sided {
            self.force_collinear(&pts)?;
        }

        // Rebuild every line containing b without it.
        let affected: Vec<LineId> = self
            .lines
            .iter()
            .filter(|(_, line)| line.contains(b))
            .map(|(&id, _)| id)
            .collect();
        for id in affected {
            let Some(old) = self.lines.get(&id).cloned() else {
                continue;
            };
            self.drop_line(id);
            let points: Vec<PointId> = old.points.iter().copied().filter(|&p| p != b).collect();
            if points.len() < 2 {
                continue;
            }
            let mut main_pair = (
                substitute_point(old.main_pair.0, b, a),
                substitute_point(old.main_pair.1, b, a),
            );
            if main_pair.0 == main_pair.1 || !self.has_pair_vars(main_pair.0, main_pair.1) {
                main_pair = self.farthest_pair(&points);
            }
            let Some(direction) = self.pair_dir(main_pair.0, main_pair.1) else {
                continue;
            };
            let new_id = LineId::from(self.next_line);
            self.next_line += 1;
            for (&x, &y) in points.iter().tuple_combinations() {
                self.pair_to_line.insert(pair_key(x, y), new_id);
            }
            self.lines.insert(
                new_id,
                FormalLine {
                    points,
                    main_pair,
                    direction,
                    line: old.line,
                },
            );
        }

        // Circles: substitute a for b everywhere.
        let affected: Vec<CircleId> = self
            .circles
            .iter()
            .filter(|(_, c)| c.contains(b) || c.centers.contains(&b) || {
                let (x, y, z) = c.defining;
                x == b || y == b || z == b
            })
            .map(|(&id, _)| id)
            .collect();
        for id in affected {
            let Some(old) = self.circles.get(&id).cloned() else {
                continue;
            };
            self.drop_circle(id);
            let points = dedupe(
                &old.points
                    .iter()
                    .map(|&p| substitute_point(p, b, a))
                    .collect::<Vec<_>>(),
            );
            if points.len() < 3 {
                continue;
            }
            let centers = dedupe(
                &old.centers
                    .iter()
                    .map(|&p| substitute_point(p, b, a))
                    .collect::<Vec<_>>(),
            );
            let mut defining = (
                substitute_point(old.defining.0, b, a),
                substitute_point(old.defining.1, b, a),
                substitute_point(old.defining.2, b, a),
            );
            if defining.0 == defining.1 || defining.1 == defining.2 || defining.0 == defining.2 {
                defining = (points[0], points[1], points[2]);
            }
            let new_id = CircleId::from(self.next_circle);
            self.next_circle += 1;
            for (&x, &y, &z) in points.iter().tuple_combinations() {
                for perm in [(x, y, z), (x, z, y), (y, x, z), (y, z, x), (z, x, y), (z, y, x)] {
                    self.triple_to_circle.insert(perm, new_id);
                }
            }
            self.circles.insert(
                new_id,
                FormalCircle {
                    defining,
                    points,
                    centers,
                    circle: old.circle,
                },
            );
        }

        // Glue the quantities of b's pairs to a's, so facts expressed
        // through either point mean the same thing afterwards.
        let glue: Vec<(Option<DistMul>, Option<Angle>, Option<DistAdd>)> = self
            .live
            .clone()
            .into_iter()
            .filter(|&x| x != a && x != b)
            .map(|x| {
                let mul = self
                    .pair_dmul(x, a)
                    .zip(self.pair_dmul(x, b))
                    .map(|(to_a, to_b)| to_a / to_b);
                let dir = self
                    .pair_dir(x, a)
                    .zip(self.pair_dir(x, b))
                    .map(|(to_a, to_b)| to_a - to_b);
                let add = self
                    .pair_dadd(x, a)
                    .zip(self.pair_dadd(x, b))
                    .map(|(to_a, to_b)| to_a - to_b);
                (mul, dir, add)
            })
            .collect();
        for (mul, dir, add) in glue {
            if let Some(q) = mul {
                self.dist_muls.add_constraint(q.into_comb());
            }
            if let Some(q) = dir {
                self.angles.add_constraint(q.into_comb());
            }
            if let Some(q) = add {
                self.dist_adds.add_constraint(q.into_comb());
            }
        }

        // Redirect the substitution table and retire b.
        for target in self.point_subst.values_mut() {
            if *target == b {
                *target = a;
            }
        }
        self.point_subst.insert(b, a);
        self.live.retain(|&p| p != b);

        // A stashed equidistance cluster may have reached three members.
        let stashed = std::mem::take(&mut self.last_small_circles);
        for (center, cluster) in &stashed {
            let center = self.resolve(*center);
            let cluster: Vec<PointId> =
                dedupe(&cluster.iter().map(|&p| self.resolve(p)).collect::<Vec<_>>());
            let distinct = self.numerically_distinct(&cluster);
            if distinct.len() >= 3 {
                if let Err(err) = self.force_concyclic(&distinct, &[center]) {
                    log::debug!("stashed cluster did not form a circle: {err}");
                }
            }
        }
        self.last_small_circles = stashed;

        self.update_cache();
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn drop_line(&mut self, id: LineId)
    {
        if let Some(line) = self.lines.remove(&id) {
            for (&x, &y) in line.points.iter().tuple_combinations() {
                if self.pair_to_line.get(&pair_key(x, y)) == Some(&id) {
                    self.pair_to_line.remove(&pair_key(x, y));
                }
            }
        }
    }

    fn drop_circle(&mut self, id: CircleId)
    {
        if self.circles.remove(&id).is_some() {
            self.triple_to_circle.retain(|_, &mut target| target != id);
        }
    }

    fn farthest_pair(&self, points: &[PointId]) -> (PointId, PointId)
    {
        let mut best = (points[0], points[0]);
        let mut best_dist = -1.;
        for (&x, &y) in points.iter().tuple_combinations() {
            let d = distance(self.pos(x), self.pos(y));
            if d > best_dist {
                best_dist = d;
                best = (x, y);
            }
        }
        best
    }

    fn noncollinear_triple(&self, points: &[PointId]) -> Option<(PointId, PointId, PointId)>
    {
        points
            .iter()
            .tuple_combinations()
            .map(|(&x, &y, &z)| (x, y, z))
            .find(|&(x, y, z)| orientation(self.pos(x), self.pos(y), self.pos(z)) != 0)
    }

    pub(crate) fn numerically_distinct(&self, points: &[PointId]) -> Vec<PointId>
    {
        let mut kept: Vec<PointId> = Vec::new();
        for &p in points {
            if kept
                .iter()
                .all(|&q| distance(self.pos(p), self.pos(q)) >= ATOM_SQRT)
            {
                kept.push(p);
            }
        }
        kept
    }
}

pub(crate) fn pair_key(a: PointId, b: PointId) -> (PointId, PointId)
{
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn substitute_point(p: PointId, from: PointId, to: PointId) -> PointId
{
    if p == from {
        to
    } else {
        p
    }
}

fn dedupe(points: &[PointId]) -> Vec<PointId>
{
    let mut seen = BTreeSet::new();
    points
        .iter()
        .copied()
        .filter(|p| seen.insert(*p))
        .collect()
}

fn degenerate(pred: &Pred) -> EngineError
{
    EngineError::DegenerateInput(format!("malformed arguments for {}", pred.kind))
}

fn numeric_error(pred: &Pred) -> EngineError
{
    EngineError::NumericInconsistency(format!("{} does not hold in the diagram", pred.kind))
}

fn two_points(pred: &Pred) -> EngineResult<[PointId; 2]>
{
    match pred.points.as_slice() {
        [a, b] => Ok([*a, *b]),
        _ => Err(degenerate(pred)),
    }
}

fn n_points(pred: &Pred, n: usize) -> EngineResult<Vec<PointId>>
{
    if pred.points.len() == n {
        Ok(pred.points.clone())
    } else {
        Err(degenerate(pred))
    }
}

fn one_constant(pred: &Pred) -> EngineResult<Rational>
{
    pred.constants
        .first()
        .copied()
        .ok_or_else(|| degenerate(pred))
}
