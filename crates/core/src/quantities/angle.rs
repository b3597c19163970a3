use num_traits::{One, Signed, ToPrimitive, Zero};

use geometer_common::prelude::{Coeff, Rational, Real};

use super::{coeff_to_real, ratio_to_coeff};
use crate::comb::LinComb;
use crate::var::Var;

/// A formal directed angle in units of pi, periodic in one half-turn.
///
/// The `AngleUnit` coefficient is reduced into [0, 1) at construction, so
/// an angle is known to vanish exactly when its combination is empty.
/// Equality and hashing ignore the advisory numeric value.
#[derive(Clone, Debug)]
pub struct Angle
{
    comb: LinComb,
    value: Real,
}

impl Angle
{
    #[must_use]
    pub fn new(mut comb: LinComb, value: Real) -> Self
    {
        if let Some(unit) = comb.remove(Var::AngleUnit) {
            let mut unit = unit.fract();
            if unit.is_negative() {
                unit += Coeff::one();
            }
            comb.insert(Var::AngleUnit, unit);
        }
        Self {
            comb,
            value: value.rem_euclid(1.0),
        }
    }

    #[must_use]
    pub fn zero() -> Self
    {
        Self {
            comb: LinComb::new(),
            value: 0.,
        }
    }

    #[must_use]
    pub fn from_var(var: Var, value: Real) -> Self
    {
        Self::new(LinComb::singleton(var), value)
    }

    /// A constant angle of `r` half-turns.
    #[must_use]
    pub fn from_rational(r: Rational) -> Self
    {
        let mut comb = LinComb::new();
        comb.add_term(Var::AngleUnit, &ratio_to_coeff(r));
        let value = ratio_to_coeff(r).to_f64().unwrap_or(Real::NAN);
        Self::new(comb, value)
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

    /// The constant part, when the angle is fully determined: the empty
    /// combination is zero, a bare `AngleUnit` term is its coefficient.
    /// `None` while any unknown remains.
    #[must_use]
    pub fn constant(&self) -> Option<Coeff>
    {
        if self.comb.is_empty() {
            return Some(Coeff::zero());
        }
        if self.comb.len() == 1 {
            return self.comb.coeff(Var::AngleUnit).cloned();
        }
        None
    }

    #[must_use]
    pub fn scaled(&self, k: Rational) -> Self
    {
        let mut comb = self.comb.clone();
        comb.scale(&ratio_to_coeff(k));
        let k_val = coeff_to_real(&ratio_to_coeff(k));
        Self::new(comb, self.value * k_val)
    }
}

impl std::ops::Add for Angle
{
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output
    {
        Self::new(self.comb + rhs.comb, self.value + rhs.value)
    }
}

impl std::ops::Sub for Angle
{
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output
    {
        Self::new(self.comb - rhs.comb, self.value - rhs.value)
    }
}

impl std::ops::Neg for Angle
{
    type Output = Self;

    fn neg(self) -> Self::Output
    {
        Self::new(-self.comb, -self.value)
    }
}

impl PartialEq for Angle
{
    fn eq(&self, other: &Self) -> bool
    {
        self.comb == other.comb
    }
}

impl Eq for Angle {}

impl PartialOrd for Angle
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering>
    {
        Some(self.cmp(other))
    }
}

impl Ord for Angle
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering
    {
        self.comb.cmp(&other.comb)
    }
}

impl std::hash::Hash for Angle
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
    fn unit_coefficient_reduced_into_unit_interval()
    {
        let a = Angle::from_rational(Rational::new(7, 2));
        assert_eq!(a.constant(), Some(Coeff::new(1.into(), 2.into())));

        let b = Angle::from_rational(Rational::new(-1, 4));
        assert_eq!(b.constant(), Some(Coeff::new(3.into(), 4.into())));
    }

    #[test]
    fn whole_turns_are_identity()
    {
        let a = Angle::from_rational(Rational::new(3, 1));
        assert!(a.is_identity());

        let b = Angle::from_rational(Rational::new(1, 2));
        assert!((b.clone() + b).is_identity());
    }

    #[test]
    fn equality_ignores_numeric_value()
    {
        let a = Angle::from_var(Var::Lhs(0), 0.25);
        let b = Angle::from_var(Var::Lhs(0), 0.75);
        assert_eq!(a, b);
    }

    #[test]
    fn negation_cancels()
    {
        let a = Angle::from_var(Var::Lhs(0), 0.3) - Angle::from_var(Var::Lhs(1), 0.1);
        let sum = a.clone() + -a;
        assert!(sum.is_identity());
    }
}
