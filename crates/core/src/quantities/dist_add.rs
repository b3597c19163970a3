use num_traits::{One, Signed};

use geometer_common::prelude::{Coeff, Rational, Real};

use super::{coeff_to_real, ratio_to_coeff};
use crate::comb::LinComb;
use crate::var::Var;

/// An additive distance combination; zero is the empty combination.
#[derive(Clone, Debug)]
pub struct DistAdd
{
    comb: LinComb,
    value: Real,
}

impl DistAdd
{
    #[must_use]
    pub const fn new(comb: LinComb, value: Real) -> Self
    {
        Self { comb, value }
    }

    #[must_use]
    pub fn zero() -> Self
    {
        Self::new(LinComb::new(), 0.)
    }

    #[must_use]
    pub fn from_var(var: Var, dist: Real) -> Self
    {
        Self::new(LinComb::singleton(var), dist)
    }

    #[must_use]
    pub const fn comb(&self) -> &LinComb
    {
        &self.comb
    }

    #[must_use]
    pub fn into_comb(self) -> LinComb
    {
        self.comb
    }

    #[must_use]
    pub const fn value(&self) -> Real
    {
        self.value
    }

    #[must_use]
    pub fn is_identity(&self) -> bool
    {
        self.comb.is_empty()
    }

    #[must_use]
    pub fn scaled(&self, k: Rational) -> Self
    {
        let k = ratio_to_coeff(k);
        let mut comb = self.comb.clone();
        comb.scale(&k);
        Self::new(comb, self.value * coeff_to_real(&k))
    }

    /// Divide by the smallest absolute coefficient and fix the sign of the
    /// leading term, so that proportional combinations share one canonical
    /// remainder. `self = scale * remainder`.
    #[must_use]
    pub fn normalize(&self) -> (Coeff, Self)
    {
        let Some(min_abs) = self.comb.iter().map(|(_, c)| c.abs()).min() else {
            return (Coeff::one(), Self::zero());
        };
        let mut scale = min_abs;
        let mut rest = self.comb.clone();
        rest.scale(&scale.recip());
        let negative_leading = rest
            .iter()
            .next()
            .is_some_and(|(_, leading)| leading.is_negative());
        if negative_leading {
            rest.negate();
            scale = -scale;
        }
        let value = self.value / coeff_to_real(&scale);
        (scale, Self::new(rest, value))
    }
}

impl std::ops::Add for DistAdd
{
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output
    {
        Self::new(self.comb + rhs.comb, self.value + rhs.value)
    }
}

impl std::ops::Sub for DistAdd
{
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output
    {
        Self::new(self.comb - rhs.comb, self.value - rhs.value)
    }
}

impl PartialEq for DistAdd
{
    fn eq(&self, other: &Self) -> bool
    {
        self.comb == other.comb
    }
}

impl Eq for DistAdd {}

impl PartialOrd for DistAdd
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering>
    {
        Some(self.cmp(other))
    }
}

impl Ord for DistAdd
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering
    {
        self.comb.cmp(&other.comb)
    }
}

impl std::hash::Hash for DistAdd
{
    fn hash<H: std::hash::Hasher>(&self, state: &mut H)
    {
        self.comb.hash(state);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn normalize_is_scale_invariant()
    {
        let mut comb = LinComb::singleton(Var::Lhs(0));
        comb.add_term(Var::Lhs(1), &ratio_to_coeff(Rational::new(2, 1)));
        let a = DistAdd::new(comb, 3.);
        let b = a.scaled(Rational::new(5, 3));

        let (_, rest_a) = a.normalize();
        let (_, rest_b) = b.normalize();
        assert_eq!(rest_a, rest_b);
    }

    #[test]
    fn normalize_fixes_leading_sign()
    {
        let a = DistAdd::from_var(Var::Lhs(0), 2.);
        let b = a.scaled(Rational::new(-1, 2));
        let (scale, rest) = b.normalize();
        assert_eq!(rest, a);
        assert!(scale.is_negative());
    }

    #[test]
    fn sum_with_negation_vanishes()
    {
        let a = DistAdd::from_var(Var::Lhs(0), 2.);
        let b = a.scaled(Rational::new(-1, 1));
        assert!((a + b).is_identity());
    }
}
