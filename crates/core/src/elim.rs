use std::collections::{BTreeSet, HashMap};

use crate::comb::LinComb;
use crate::var::Var;

/// Incremental Gaussian elimination over linear combinations.
///
/// Rows are kept fully reduced: a pivot's expression mentions free
/// variables only, so a single substitution pass canonicalises any input
/// combination modulo the installed quotient.
#[derive(Clone, Debug, Default)]
pub struct Elimination
{
    /// pivot -> expression of the pivot in terms of free variables.
    /// The pivot itself never appears in its own row.
    instantiated: HashMap<Var, LinComb>,
    /// free variable -> pivots whose row mentions it.
    free_to_usage: HashMap<Var, BTreeSet<Var>>,
}

impl Elimination
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn num_pivots(&self) -> usize
    {
        self.instantiated.len()
    }

    /// Reduce `comb` to its canonical form modulo the current quotient:
    /// every pivot occurring in it is replaced by its expression.
    pub fn simplify(&self, comb: &mut LinComb)
    {
        let pivots: Vec<Var> = comb
            .vars()
            .filter(|v| self.instantiated.contains_key(v))
            .collect();
        for var in pivots {
            if let Some(coeff) = comb.remove(var) {
                comb.add_scaled(&coeff, &self.instantiated[&var]);
            }
        }
    }

    #[must_use]
    pub fn simplified(&self, comb: &LinComb) -> LinComb
    {
        let mut out = comb.clone();
        self.simplify(&mut out);
        out
    }

    /// Install the equation `eq = 0`.
    ///
    /// Returns false when the simplified equation has no pivot-eligible
    /// variable left (it is redundant modulo the current quotient). The
    /// caller guarantees the equation is consistent; see the predicate
    /// layer's numeric gate.
    pub fn add_constraint(&mut self, mut eq: LinComb) -> bool
    {
        self.simplify(&mut eq);
        let Some(pivot) = self.choose_pivot(&eq) else {
            return false;
        };
        let Some(coeff) = eq.remove(pivot) else {
            return false;
        };

        // Rescale so that eq expresses the pivot in terms of the rest:
        // from c*pivot + rest = 0 to pivot = rest * (-1/c).
        let scale = -coeff.recip();
        eq.scale(&scale);

        // Substitute the new pivot out of every row that mentions it.
        if let Some(users) = self.free_to_usage.remove(&pivot) {
            for user in users {
                let Some(mut row) = self.instantiated.remove(&user) else {
                    continue;
                };
                let before: BTreeSet<Var> = row.vars().collect();
                if let Some(c) = row.remove(pivot) {
                    row.add_scaled(&c, &eq);
                }
                let after: BTreeSet<Var> = row.vars().collect();
                for gone in before.difference(&after) {
                    if *gone == pivot {
                        continue;
                    }
                    if let Some(usage) = self.free_to_usage.get_mut(gone) {
                        usage.remove(&user);
                    }
                }
                for new in after.difference(&before) {
                    self.free_to_usage.entry(*new).or_default().insert(user);
                }
                self.instantiated.insert(user, row);
            }
        }

        for var in eq.vars() {
            self.free_to_usage.entry(var).or_default().insert(pivot);
        }
        self.instantiated.insert(pivot, eq);
        true
    }

    /// True iff the variable currently appears anywhere in the system,
    /// as a pivot or on the free side of some row.
    #[must_use]
    pub fn was_encountered(&self, var: Var) -> bool
    {
        self.instantiated.contains_key(&var)
            || self
                .free_to_usage
                .get(&var)
                .is_some_and(|users| !users.is_empty())
    }

    /// Least-used pivot-eligible variable; ties broken by variable order
    /// so that installation is deterministic.
    fn choose_pivot(&self, eq: &LinComb) -> Option<Var>
    {
        eq.lhs_vars().min_by_key(|v| {
            let usage = self.free_to_usage.get(v).map_or(0, BTreeSet::len);
            (usage, *v)
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use geometer_common::prelude::Coeff;

    fn single(v: u32) -> LinComb
    {
        LinComb::singleton(Var::Lhs(v))
    }

    fn coeff(n: i64) -> Coeff
    {
        Coeff::from_integer(n.into())
    }

    #[test]
    fn redundant_equation_is_rejected()
    {
        let mut elim = Elimination::new();
        // x0 - x1 = 0
        let mut eq = single(0);
        eq -= &single(1);
        assert!(elim.add_constraint(eq.clone()));
        // Installing the same equation again learns nothing.
        assert!(!elim.add_constraint(eq));
    }

    #[test]
    fn simplify_reaches_canonical_form()
    {
        let mut elim = Elimination::new();
        // x0 = x1, x1 = x2
        let mut eq = single(0);
        eq -= &single(1);
        assert!(elim.add_constraint(eq));
        let mut eq = single(1);
        eq -= &single(2);
        assert!(elim.add_constraint(eq));

        // x0 - x2 simplifies to the empty combination.
        let mut probe = single(0);
        probe -= &single(2);
        elim.simplify(&mut probe);
        assert!(probe.is_empty());
    }

    #[test]
    fn entailed_combinations_share_canonical_form()
    {
        let mut elim = Elimination::new();
        // x0 + x1 - 2 x2 = 0
        let mut eq = single(0);
        eq += &single(1);
        eq.add_term(Var::Lhs(2), &coeff(-2));
        assert!(elim.add_constraint(eq));

        // x0 + x1 and 2 x2 must simplify identically.
        let mut lhs = single(0);
        lhs += &single(1);
        let mut rhs = LinComb::new();
        rhs.add_term(Var::Lhs(2), &coeff(2));
        assert_eq!(elim.simplified(&lhs), elim.simplified(&rhs));
    }

    #[test]
    fn was_encountered_tracks_rows()
    {
        let mut elim = Elimination::new();
        assert!(!elim.was_encountered(Var::Lhs(0)));

        let mut eq = single(0);
        eq -= &single(1);
        elim.add_constraint(eq);
        assert!(elim.was_encountered(Var::Lhs(0)));
        assert!(elim.was_encountered(Var::Lhs(1)));
        assert!(!elim.was_encountered(Var::Lhs(2)));
    }

    #[test]
    fn substitution_keeps_rows_reduced()
    {
        let mut elim = Elimination::new();
        // x0 = x1 + x2
        let mut eq = single(0);
        eq -= &single(1);
        eq -= &single(2);
        assert!(elim.add_constraint(eq));
        // x1 = x3
        let mut eq = single(1);
        eq -= &single(3);
        assert!(elim.add_constraint(eq));

        // x0 - x2 - x3 is now entailed.
        let mut probe = single(0);
        probe -= &single(2);
        probe -= &single(3);
        elim.simplify(&mut probe);
        assert!(probe.is_empty());
    }
}
