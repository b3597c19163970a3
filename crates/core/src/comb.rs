use std::collections::BTreeMap;

use num_traits::Zero;

use geometer_common::prelude::Coeff;

use crate::var::Var;

/// A sparse linear combination of elimination variables with exact rational
/// coefficients. Zero entries are never stored, so equality and hashing are
/// structural on the map contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinComb
{
    terms: BTreeMap<Var, Coeff>,
}

impl LinComb
{
    #[must_use]
    pub const fn new() -> Self
    {
        Self {
            terms: BTreeMap::new(),
        }
    }

    /// The combination consisting of `var` with coefficient one.
    #[must_use]
    pub fn singleton(var: Var) -> Self
    {
        let mut comb = Self::new();
        comb.terms.insert(var, Coeff::from_integer(1.into()));
        comb
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.terms.len()
    }

    #[must_use]
    pub fn coeff(&self, var: Var) -> Option<&Coeff>
    {
        self.terms.get(&var)
    }

    pub fn remove(&mut self, var: Var) -> Option<Coeff>
    {
        self.terms.remove(&var)
    }

    /// Set the coefficient of `var`, dropping the entry when it is zero.
    pub fn insert(&mut self, var: Var, coeff: Coeff)
    {
        if coeff.is_zero() {
            self.terms.remove(&var);
        } else {
            self.terms.insert(var, coeff);
        }
    }

    /// self += coeff * var
    pub fn add_term(&mut self, var: Var, coeff: &Coeff)
    {
        if coeff.is_zero() {
            return;
        }
        let entry = self.terms.entry(var).or_insert_with(Coeff::zero);
        *entry += coeff;
        if entry.is_zero() {
            self.terms.remove(&var);
        }
    }

    /// self += k * other, in place.
    pub fn add_scaled(&mut self, k: &Coeff, other: &Self)
    {
        if k.is_zero() {
            return;
        }
        for (var, coeff) in &other.terms {
            self.add_term(*var, &(k * coeff));
        }
    }

    /// self *= k. Scaling by zero empties the combination.
    pub fn scale(&mut self, k: &Coeff)
    {
        if k.is_zero() {
            self.terms.clear();
            return;
        }
        for coeff in self.terms.values_mut() {
            *coeff *= k;
        }
    }

    pub fn negate(&mut self)
    {
        for coeff in self.terms.values_mut() {
            *coeff = -coeff.clone();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Coeff)>
    {
        self.terms.iter()
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_
    {
        self.terms.keys().copied()
    }

    pub fn lhs_vars(&self) -> impl Iterator<Item = Var> + '_
    {
        self.vars().filter(|v| v.is_lhs())
    }

    #[must_use]
    pub fn has_lhs(&self) -> bool
    {
        self.lhs_vars().next().is_some()
    }
}

impl std::ops::AddAssign<&Self> for LinComb
{
    fn add_assign(&mut self, rhs: &Self)
    {
        for (var, coeff) in &rhs.terms {
            self.add_term(*var, coeff);
        }
    }
}

impl std::ops::SubAssign<&Self> for LinComb
{
    fn sub_assign(&mut self, rhs: &Self)
    {
        for (var, coeff) in &rhs.terms {
            self.add_term(*var, &-coeff.clone());
        }
    }
}

impl std::ops::Add for LinComb
{
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output
    {
        self += &rhs;
        self
    }
}

impl std::ops::Sub for LinComb
{
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self::Output
    {
        self -= &rhs;
        self
    }
}

impl std::ops::Neg for LinComb
{
    type Output = Self;

    fn neg(mut self) -> Self::Output
    {
        self.negate();
        self
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn coeff(n: i64, d: i64) -> Coeff
    {
        Coeff::new(n.into(), d.into())
    }

    #[test]
    fn zero_entries_are_absent()
    {
        let mut comb = LinComb::singleton(Var::Lhs(0));
        comb.add_term(Var::Lhs(0), &coeff(-1, 1));
        assert!(comb.is_empty());

        comb.insert(Var::Lhs(1), coeff(0, 1));
        assert!(comb.is_empty());
    }

    #[test]
    fn add_scaled_accumulates()
    {
        let mut a = LinComb::singleton(Var::Lhs(0));
        let mut b = LinComb::singleton(Var::Lhs(0));
        b.add_term(Var::Lhs(1), &coeff(2, 1));

        a.add_scaled(&coeff(1, 2), &b);
        assert_eq!(a.coeff(Var::Lhs(0)), Some(&coeff(3, 2)));
        assert_eq!(a.coeff(Var::Lhs(1)), Some(&coeff(1, 1)));
    }

    #[test]
    fn structural_equality()
    {
        let mut a = LinComb::singleton(Var::Lhs(3));
        a.add_term(Var::AngleUnit, &coeff(1, 2));

        let mut b = LinComb::new();
        b.add_term(Var::AngleUnit, &coeff(1, 2));
        b.add_term(Var::Lhs(3), &coeff(1, 1));

        assert_eq!(a, b);

        b.add_term(Var::Lhs(4), &coeff(1, 3));
        assert_ne!(a, b);
    }
}
