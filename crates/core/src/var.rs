use std::sync::Mutex;

use lazy_static::lazy_static;
use num_traits::Signed;

use geometer_common::prelude::{Rational, Real};

/// An elimination atom: a tagged variable with an associated numeric value.
///
/// `Lhs` atoms are pivot-eligible; the other tags are constants that only
/// ever appear on the free side of a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Var
{
    /// An unknown geometric quantity introduced by the engine.
    Lhs(u32),
    /// The constant pi; numeric value 1 in units of pi.
    AngleUnit,
    /// log p for a prime p. One atom per prime, shared process-wide.
    DistMulConst(u64),
}

impl Var
{
    #[must_use]
    pub const fn is_lhs(self) -> bool
    {
        matches!(self, Self::Lhs(_))
    }

    /// Numeric value of a constant atom; `None` for engine unknowns.
    #[must_use]
    pub fn constant_value(self) -> Option<Real>
    {
        match self {
            Self::Lhs(_) => None,
            Self::AngleUnit => Some(1.),
            Self::DistMulConst(p) => Some((p as Real).ln()),
        }
    }
}

/// Lazily extended table of primes, shared by every engine in the process.
#[derive(Debug)]
struct PrimeTable
{
    primes: Vec<u64>,
}

impl PrimeTable
{
    const fn new() -> Self
    {
        Self { primes: Vec::new() }
    }

    fn nth(&mut self, i: usize) -> u64
    {
        while self.primes.len() <= i {
            self.push_next();
        }
        self.primes[i]
    }

    fn push_next(&mut self)
    {
        let mut candidate = match self.primes.last() {
            None => 2,
            Some(2) => 3,
            Some(p) => p + 2,
        };
        loop {
            if self.is_prime(candidate) {
                self.primes.push(candidate);
                return;
            }
            candidate += 2;
        }
    }

    fn is_prime(&self, n: u64) -> bool
    {
        for &p in &self.primes {
            if p * p > n {
                break;
            }
            if n % p == 0 {
                return false;
            }
        }
        true
    }

    /// Prime factorisation by trial division, growing the table as needed.
    fn factorize(&mut self, mut n: u64) -> Vec<(u64, i64)>
    {
        let mut factors = Vec::new();
        let mut i = 0;
        while n > 1 {
            let p = self.nth(i);
            if p * p > n {
                factors.push((n, 1));
                break;
            }
            if n % p == 0 {
                let mut exp = 0;
                while n % p == 0 {
                    n /= p;
                    exp += 1;
                }
                factors.push((p, exp));
            }
            i += 1;
        }
        factors
    }
}

lazy_static! {
    static ref PRIMES: Mutex<PrimeTable> = Mutex::new(PrimeTable::new());
}

/// Express a positive rational as integer exponents over `DistMulConst`
/// atoms: numerator primes positive, denominator primes negative.
/// `None` for zero or negative inputs, which have no logarithm.
#[must_use]
pub fn factor_rational(q: Rational) -> Option<Vec<(Var, i64)>>
{
    if !q.is_positive() {
        return None;
    }
    let mut table = match PRIMES.lock() {
        Ok(lock) => lock,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut exponents = Vec::new();
    for (p, e) in table.factorize(*q.numer() as u64) {
        exponents.push((Var::DistMulConst(p), e));
    }
    for (p, e) in table.factorize(*q.denom() as u64) {
        exponents.push((Var::DistMulConst(p), -e));
    }
    Some(exponents)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn factorize_small()
    {
        let mut table = PrimeTable::new();
        assert_eq!(table.factorize(360), vec![(2, 3), (3, 2), (5, 1)]);
        assert_eq!(table.factorize(97), vec![(97, 1)]);
        assert_eq!(table.factorize(1), vec![]);
    }

    #[test]
    fn factor_rational_signs()
    {
        let factors = factor_rational(Rational::new(4, 3)).unwrap();
        assert_eq!(
            factors,
            vec![(Var::DistMulConst(2), 2), (Var::DistMulConst(3), -1)]
        );
        assert!(factor_rational(Rational::new(-1, 2)).is_none());
        assert!(factor_rational(Rational::new(0, 1)).is_none());
    }

    #[test]
    fn lhs_ordering_precedes_constants()
    {
        assert!(Var::Lhs(7) < Var::AngleUnit);
        assert!(Var::AngleUnit < Var::DistMulConst(2));
    }
}
