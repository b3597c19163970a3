use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use num_traits::Signed;

use geometer_common::prelude::*;

use crate::formal::{CircleId, FormalLine};
use crate::quantities::{coeff_to_ratio, Angle, DistAdd, DistMul};

use super::{pair_key, Engine};

impl Engine
{
    /// Run the inference rules to a fixed point. Returns whether anything
    /// at all was learned. `verbose` logs a status line per rule;
    /// `progress` prints one dot per outer iteration.
    pub fn deduction_closure(&mut self, verbose: bool, progress: bool) -> bool
    {
        use std::io::Write;

        self.update_cache();
        let mut learned = false;
        loop {
            let mut changed = false;
            let pass: [(&str, fn(&mut Self) -> bool); 6] = [
                ("similar triangles", Self::search_similar),
                ("concyclic points", Self::search_concyclic),
                ("equidistant circles", Self::search_circles),
                ("coincident points", Self::search_equal_points),
                ("length bridge", Self::bridge_add_mul),
                ("arc-chord bridge", Self::bridge_arc_chord),
            ];
            for (name, rule) in pass {
                let installed = rule(self);
                if verbose {
                    log::info!(
                        "{name}: {}",
                        if installed { "installed" } else { "nothing new" }
                    );
                }
                if installed {
                    self.update_cache();
                    changed = true;
                }
            }
            if progress {
                eprint!(".");
                let _ = std::io::stderr().flush();
            }
            if !changed {
                break;
            }
            learned = true;
        }
        learned
    }

    /// Similar-triangle search: bucket ordered nondegenerate triples by
    /// canonical side-ratio and angle keys (SSS, AA, SAS, SSA); any
    /// collision marks the two triangles similar.
    pub(crate) fn search_similar(&mut self) -> bool
    {
        let live = self.live.clone();
        let mut sss: HashMap<(DistMul, DistMul), [PointId; 3]> = HashMap::new();
        let mut aa: HashMap<(Angle, Angle), [PointId; 3]> = HashMap::new();
        let mut sas: HashMap<(Angle, DistMul, i8), [PointId; 3]> = HashMap::new();
        let mut ssa: HashMap<(Angle, DistMul, i8), [PointId; 3]> = HashMap::new();
        let mut matches: Vec<([PointId; 3], [PointId; 3])> = Vec::new();

        for &a in &live {
            for &b in &live {
                if b == a {
                    continue;
                }
                for &c in &live {
                    if c == a || c == b {
                        continue;
                    }
                    let orient = orientation(self.pos(a), self.pos(b), self.pos(c));
                    if orient == 0 {
                        continue;
                    }
                    // Only triples some equation already references can
                    // produce a collision that means anything.
                    if !self.triple_encountered(a, b, c) {
                        continue;
                    }
                    let Some(dab) = self.dir_cached(a, b) else {
                        continue;
                    };
                    let Some(dac) = self.dir_cached(a, c) else {
                        continue;
                    };
                    let Some(dcb) = self.dir_cached(c, b) else {
                        continue;
                    };
                    let Some(mab) = self.mul_cached(a, b) else {
                        continue;
                    };
                    let Some(mac) = self.mul_cached(a, c) else {
                        continue;
                    };
                    let Some(mcb) = self.mul_cached(c, b) else {
                        continue;
                    };

                    let ang_a = dab - dac.clone();
                    let ang_c = dcb - dac;
                    let ratio1 = mab / mac.clone();
                    let ratio2 = mcb / mac;
                    let triple = [a, b, c];

                    probe_single(
                        &mut sss,
                        (ratio1.clone(), ratio2.clone()),
                        triple,
                        &mut matches,
                    );
                    probe(
                        &mut aa,
                        (ang_a.clone(), ang_c.clone()),
                        (-ang_a.clone(), -ang_c),
                        triple,
                        &mut matches,
                    );
                    probe(
                        &mut sas,
                        (ang_a.clone(), ratio1.clone(), orient),
                        (-ang_a.clone(), ratio1, -orient),
                        triple,
                        &mut matches,
                    );
                    if distance(self.pos(c), self.pos(b)) > distance(self.pos(c), self.pos(a)) {
                        probe(
                            &mut ssa,
                            (ang_a.clone(), ratio2.clone(), orient),
                            (-ang_a, ratio2, -orient),
                            triple,
                            &mut matches,
                        );
                    }
                }
            }
        }

        let mut changed = false;
        for (t1, t2) in matches {
            changed |= self.force_similar(t1, t2);
        }
        changed
    }

    /// Mark two triangles similar: record all six symmetric markings, then
    /// force two angle equalities (sign-flipped when the orientations
    /// disagree) and two side-ratio equalities.
    pub(crate) fn force_similar(&mut self, t1: [PointId; 3], t2: [PointId; 3]) -> bool
    {
        if self.known_similar.contains(&(t1, t2)) {
            return false;
        }
        let [a, b, c] = t1;
        let [x, y, z] = t2;
        let o1 = orientation(self.pos(a), self.pos(b), self.pos(c));
        let o2 = orientation(self.pos(x), self.pos(y), self.pos(z));
        if o1 == 0 || o2 == 0 {
            return false;
        }
        let flip = o1 != o2;

        for rot in [[0, 1, 2], [1, 2, 0], [2, 0, 1]] {
            let r1 = [t1[rot[0]], t1[rot[1]], t1[rot[2]]];
            let r2 = [t2[rot[0]], t2[rot[1]], t2[rot[2]]];
            self.known_similar.insert((r1, r2));
            self.known_similar.insert((r2, r1));
        }

        let signed = |ang: Angle| if flip { -ang } else { ang };
        let mut changed = false;

        if let (Some(dab), Some(dac), Some(dxy), Some(dxz)) = (
            self.pair_dir(a, b),
            self.pair_dir(a, c),
            self.pair_dir(x, y),
            self.pair_dir(x, z),
        ) {
            changed |= self.try_install_angle(dab - dac - signed(dxy - dxz));
        }
        if let (Some(dbc), Some(dba), Some(dyz), Some(dyx)) = (
            self.pair_dir(b, c),
            self.pair_dir(b, a),
            self.pair_dir(y, z),
            self.pair_dir(y, x),
        ) {
            changed |= self.try_install_angle(dbc - dba - signed(dyz - dyx));
        }
        if let (Some(mab), Some(mac), Some(mxy), Some(mxz)) = (
            self.pair_dmul(a, b),
            self.pair_dmul(a, c),
            self.pair_dmul(x, y),
            self.pair_dmul(x, z),
        ) {
            changed |= self.try_install_mul(mab / mac / (mxy / mxz));
        }
        if let (Some(mcb), Some(mca), Some(mzy), Some(mzx)) = (
            self.pair_dmul(c, b),
            self.pair_dmul(c, a),
            self.pair_dmul(z, y),
            self.pair_dmul(z, x),
        ) {
            changed |= self.try_install_mul(mcb / mca / (mzy / mzx));
        }
        changed
    }

    /// Concyclicity search: per base pair (a, b), bucket the other points
    /// by the canonical angle they see the pair under. Zero angles are
    /// collinear with the pair; matching non-zero angles are concyclic.
    /// Points equidistant from a and b become center candidates under the
    /// half-turn-shifted key.
    pub(crate) fn search_concyclic(&mut self) -> bool
    {
        let mut changed = false;
        let live = self.live.clone();
        for (i, &a) in live.iter().enumerate() {
            for &b in &live[i + 1..] {
                if !self.has_pair_vars(a, b) {
                    continue;
                }
                let mut colls: Vec<PointId> = Vec::new();
                let mut buckets: BTreeMap<Angle, Vec<PointId>> = BTreeMap::new();
                let mut center_cands: BTreeMap<Angle, Vec<PointId>> = BTreeMap::new();

                for &c in &live {
                    if c == a || c == b {
                        continue;
                    }
                    let (Some(dca), Some(dcb)) = (self.dir_cached(c, a), self.dir_cached(c, b))
                    else {
                        continue;
                    };
                    let seen_under = dca.clone() - dcb;
                    if seen_under.is_identity() {
                        colls.push(c);
                    } else if !collinear(self.pos(a), self.pos(b), self.pos(c)) {
                        buckets.entry(seen_under).or_default().push(c);
                    }

                    let (Some(mca), Some(mcb)) = (self.mul_cached(c, a), self.mul_cached(c, b))
                    else {
                        continue;
                    };
                    if (mca / mcb).is_identity() {
                        let Some(dab) = self.dir_cached(a, b) else {
                            continue;
                        };
                        let key = Angle::from_rational(Rational::new(1, 2)) + dca - dab;
                        center_cands.entry(key).or_default().push(c);
                    }
                }

                if !colls.is_empty() {
                    let mut pts = vec![a, b];
                    pts.extend(&colls);
                    match self.force_collinear(&pts) {
                        Ok(learned) => changed |= learned,
                        Err(err) => log::debug!("collinear bucket rejected: {err}"),
                    }
                }
                for (key, cands) in buckets {
                    if cands.len() < 2 {
                        continue;
                    }
                    let Some(circle) =
                        NumCircle::through(self.pos(a), self.pos(b), self.pos(cands[0]))
                    else {
                        continue;
                    };
                    let kept: Vec<PointId> = cands
                        .iter()
                        .copied()
                        .filter(|&c| circle.contains(self.pos(c)))
                        .collect();
                    if kept.len() < 2 {
                        continue;
                    }
                    let centers: Vec<PointId> = center_cands
                        .get(&key)
                        .map(|cs| {
                            cs.iter()
                                .copied()
                                .filter(|&c| {
                                    let off = distance(self.pos(c), circle.center);
                                    off * off < ATOM
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    let mut members = vec![a, b];
                    members.extend(kept);
                    match self.force_concyclic(&members, &centers) {
                        Ok(learned) => changed |= learned,
                        Err(err) => log::debug!("concyclic bucket rejected: {err}"),
                    }
                }
            }
        }
        changed
    }

    /// Circle search by equidistance: group the other points by their
    /// canonical distance from each point a; three or more numerically
    /// distinct members force a circle centered at a. Smaller clusters are
    /// stashed for the merge rule.
    pub(crate) fn search_circles(&mut self) -> bool
    {
        let mut changed = false;
        let live = self.live.clone();
        let mut small: Vec<(PointId, Vec<PointId>)> = Vec::new();
        for &a in &live {
            let mut groups: BTreeMap<DistMul, Vec<PointId>> = BTreeMap::new();
            for &x in &live {
                if x == a {
                    continue;
                }
                let Some(m) = self.mul_cached(a, x) else {
                    continue;
                };
                groups.entry(m).or_default().push(x);
            }
            for (_, group) in groups {
                if group.len() < 2 {
                    continue;
                }
                let distinct = self.numerically_distinct(&group);
                if distinct.len() < 3 {
                    small.push((a, group));
                    continue;
                }
                let radius = distance(self.pos(a), self.pos(distinct[0]));
                let on_circle = distinct.iter().all(|&x| {
                    let off = distance(self.pos(a), self.pos(x)) - radius;
                    off * off < ATOM
                });
                if !on_circle {
                    continue;
                }
                match self.force_concyclic(&distinct, &[a]) {
                    Ok(learned) => changed |= learned,
                    Err(err) => log::debug!("equidistant cluster rejected: {err}"),
                }
            }
        }
        self.last_small_circles = small;
        changed
    }

    /// Merge rule: two numerically coincident points lying on two formal
    /// lines of distinct direction are the same point.
    pub(crate) fn search_equal_points(&mut self) -> bool
    {
        let live = self.live.clone();
        let mut to_merge: Vec<(PointId, PointId)> = Vec::new();
        for (i, &a) in live.iter().enumerate() {
            for &b in &live[i + 1..] {
                if distance(self.pos(a), self.pos(b)) >= ATOM_SQRT {
                    continue;
                }
                let shared: Vec<&FormalLine> = self
                    .lines
                    .values()
                    .filter(|line| line.contains(a) && line.contains(b))
                    .collect();
                let crossing = shared.iter().tuple_combinations().any(|(l1, l2)| {
                    let gap = (l1.line.direction() - l2.line.direction()).rem_euclid(1.0);
                    gap > ATOM_SQRT && gap < 1.0 - ATOM_SQRT
                });
                if crossing {
                    to_merge.push((a, b));
                }
            }
        }
        let mut changed = false;
        for (a, b) in to_merge {
            match self.force_equal_points(a, b) {
                Ok(learned) => changed |= learned,
                Err(err) => log::debug!("merge rejected: {err}"),
            }
        }
        changed
    }

    /// Bridge between the additive and multiplicative cores: pairs whose
    /// normalised form in one representation collide get the matching
    /// constraint installed in the other, with the exact rational scale
    /// carried across.
    pub(crate) fn bridge_add_mul(&mut self) -> bool
    {
        let mut changed = false;
        let live = self.live.clone();
        let mut by_mul: HashMap<DistMul, ((PointId, PointId), Rational)> = HashMap::new();
        let mut by_add: HashMap<DistAdd, ((PointId, PointId), Coeff)> = HashMap::new();
        let pairs: Vec<(PointId, PointId)> = live
            .iter()
            .tuple_combinations()
            .map(|(&a, &b)| pair_key(a, b))
            .filter(|&(a, b)| self.has_pair_vars(a, b))
            .collect();

        for (p, q) in pairs {
            if let Some(mul) = self.mul_cached(p, q) {
                let (k, rest) = mul.normalize();
                match by_mul.get(&rest) {
                    Some(&((r, s), k2)) if (r, s) != (p, q) => {
                        // |pq| = (k / k2) |rs|, now known additively too.
                        let ratio = k / k2;
                        if ratio.is_positive() {
                            let constraint = self
                                .pair_dadd(p, q)
                                .zip(self.pair_dadd(r, s))
                                .map(|(apq, ars)| apq - ars.scaled(ratio));
                            if let Some(constraint) = constraint {
                                changed |= self.try_install_add(constraint);
                            }
                        }
                    }
                    Some(_) => {}
                    None => {
                        by_mul.insert(rest, ((p, q), k));
                    }
                }
            }

            let Some(add_raw) = self.pair_dadd(p, q) else {
                continue;
            };
            let add = self.simplify_add(&add_raw);
            let (scale, rest) = add.normalize();
            match by_add.get(&rest) {
                Some(((r, s), scale2)) if (*r, *s) != (p, q) => {
                    // |pq| / |rs| = scale / scale2, now known multiplicatively.
                    let (r, s) = (*r, *s);
                    let ratio_coeff = &scale / scale2;
                    if ratio_coeff.is_positive() {
                        let constraint = coeff_to_ratio(&ratio_coeff)
                            .and_then(DistMul::from_ratio)
                            .and_then(|konst| {
                                self.pair_dmul(p, q)
                                    .zip(self.pair_dmul(r, s))
                                    .map(|(mpq, mrs)| mpq / mrs / konst)
                            });
                        if let Some(constraint) = constraint {
                            changed |= self.try_install_mul(constraint);
                        }
                    }
                }
                Some(_) => {}
                None => {
                    by_add.insert(rest, ((p, q), scale));
                }
            }
        }
        changed
    }

    /// Bridge between directed arcs and chord lengths, per circle with at
    /// least four members: equal arcs force equal chords and conversely,
    /// restricted to member pairs positively oriented about the center.
    pub(crate) fn bridge_arc_chord(&mut self) -> bool
    {
        let mut changed = false;
        let ids: Vec<CircleId> = self.circles.keys().copied().collect();
        for id in ids {
            let Some(circle) = self.circles.get(&id).cloned() else {
                continue;
            };
            if circle.points.len() < 4 {
                continue;
            }
            let center = circle.circle.center;
            let mut by_arc: HashMap<Angle, ((PointId, PointId), DistMul)> = HashMap::new();
            let mut by_chord: HashMap<DistMul, ((PointId, PointId), Angle)> = HashMap::new();

            for &a in &circle.points {
                for &b in &circle.points {
                    if a == b || orientation(center, self.pos(a), self.pos(b)) <= 0 {
                        continue;
                    }
                    let witness = circle.points.iter().copied().find(|&w| {
                        w != a && w != b && self.has_pair_vars(w, a) && self.has_pair_vars(w, b)
                    });
                    let Some(w) = witness else {
                        continue;
                    };
                    let (Some(dwa), Some(dwb)) = (self.dir_cached(w, a), self.dir_cached(w, b))
                    else {
                        continue;
                    };
                    let arc = dwa - dwb;
                    let Some(chord) = self.mul_cached(a, b) else {
                        continue;
                    };

                    if let Some(((r, s), other_chord)) = by_arc.get(&arc) {
                        if (*r, *s) != (a, b) {
                            let constraint = chord.clone() / other_chord.clone();
                            changed |= self.try_install_mul(constraint);
                        }
                    } else {
                        by_arc.insert(arc.clone(), ((a, b), chord.clone()));
                    }

                    if let Some(((r, s), other_arc)) = by_chord.get(&chord) {
                        if (*r, *s) != (a, b) {
                            let constraint = arc - other_arc.clone();
                            changed |= self.try_install_angle(constraint);
                        }
                    } else {
                        by_chord.insert(chord, ((a, b), arc));
                    }
                }
            }
        }
        changed
    }

    fn triple_encountered(&self, a: PointId, b: PointId, c: PointId) -> bool
    {
        [(a, b), (a, c), (b, c)].iter().any(|&(x, y)| {
            self.pair_vars_of(x, y).is_some_and(|pv| {
                self.angles.was_encountered(pv.dir) || self.dist_muls.was_encountered(pv.dist_mul)
            })
        })
    }
}

fn probe<K>(
    map: &mut HashMap<K, [PointId; 3]>,
    straight: K,
    reflected: K,
    triple: [PointId; 3],
    matches: &mut Vec<([PointId; 3], [PointId; 3])>,
) where
    K: Eq + std::hash::Hash,
{
    if let Some(&other) = map.get(&straight) {
        if other != triple {
            matches.push((other, triple));
        }
        return;
    }
    if let Some(&other) = map.get(&reflected) {
        if other != triple {
            matches.push((other, triple));
        }
        return;
    }
    map.insert(straight, triple);
}

fn probe_single<K>(
    map: &mut HashMap<K, [PointId; 3]>,
    key: K,
    triple: [PointId; 3],
    matches: &mut Vec<([PointId; 3], [PointId; 3])>,
) where
    K: Eq + std::hash::Hash,
{
    if let Some(&other) = map.get(&key) {
        if other != triple {
            matches.push((other, triple));
        }
        return;
    }
    map.insert(key, triple);
}
