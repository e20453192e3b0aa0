// === UTILITY FUNCTIONS ===
//
// Utility drives surplus checks; the marginal rate of substitution drives
// quote computation. Inventories are exact decimals, but utility itself is
// evaluated in floating point against a threshold epsilon.

use serde::{Deserialize, Serialize};

/// MRS values are clamped into this band so corner endowments (an agent
/// holding zero of one good) still publish finite quotes.
pub const MRS_MIN: f64 = 1e-3;
pub const MRS_MAX: f64 = 1e3;

/// Interior shift applied inside logarithms and power terms. Keeps the
/// curves defined at zero holdings without changing their ordering away
/// from the corners.
const LOG_SHIFT: f64 = 1.0;

/// Floor for Stone-Geary holdings below the subsistence parameters.
const SUBSISTENCE_FLOOR: f64 = 0.01;

/// A two-good utility function. Each variant exposes `value(a, b)` and the
/// marginal rate of substitution of A in B.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Utility {
    /// `alpha·ln(A+1) + (1-alpha)·ln(B+1)` — smooth diminishing returns in
    /// both goods, the workhorse variant.
    CobbDouglas { alpha: f64 },

    /// Constant elasticity of substitution with share `alpha` and
    /// exponent `rho` (`rho < 1`, `rho != 0`).
    Ces { alpha: f64, rho: f64 },

    /// Perfect complements: `min(A/a, B/b)`.
    Leontief { a: f64, b: f64 },

    /// Perfect substitutes: `a·A + b·B`.
    Linear { a: f64, b: f64 },

    /// Bliss-point preferences: `a1·A - a2·A²/2 + b1·B - b2·B²/2`.
    /// Marginal utilities are floored at zero past the bliss point.
    Quadratic { a1: f64, a2: f64, b1: f64, b2: f64 },

    /// Transcendental-log form over shifted log holdings.
    Translog {
        alpha_a: f64,
        alpha_b: f64,
        beta_aa: f64,
        beta_bb: f64,
        beta_ab: f64,
    },

    /// Subsistence requirements `gamma_a`, `gamma_b` before Cobb-Douglas
    /// preferences kick in.
    StoneGeary {
        alpha: f64,
        gamma_a: f64,
        gamma_b: f64,
    },
}

impl Utility {
    pub fn label(&self) -> &'static str {
        match self {
            Utility::CobbDouglas { .. } => "cobb_douglas",
            Utility::Ces { .. } => "ces",
            Utility::Leontief { .. } => "leontief",
            Utility::Linear { .. } => "linear",
            Utility::Quadratic { .. } => "quadratic",
            Utility::Translog { .. } => "translog",
            Utility::StoneGeary { .. } => "stone_geary",
        }
    }

    /// Total utility at holdings `(a, b)`.
    pub fn value(&self, a: f64, b: f64) -> f64 {
        match *self {
            Utility::CobbDouglas { alpha } => {
                alpha * (a + LOG_SHIFT).ln() + (1.0 - alpha) * (b + LOG_SHIFT).ln()
            }
            Utility::Ces { alpha, rho } => {
                let inner = alpha * (a + LOG_SHIFT).powf(rho)
                    + (1.0 - alpha) * (b + LOG_SHIFT).powf(rho);
                inner.powf(1.0 / rho)
            }
            Utility::Leontief { a: ca, b: cb } => (a / ca).min(b / cb),
            Utility::Linear { a: ca, b: cb } => ca * a + cb * b,
            Utility::Quadratic { a1, a2, b1, b2 } => {
                a1 * a - 0.5 * a2 * a * a + b1 * b - 0.5 * b2 * b * b
            }
            Utility::Translog {
                alpha_a,
                alpha_b,
                beta_aa,
                beta_bb,
                beta_ab,
            } => {
                let la = (a + LOG_SHIFT).ln();
                let lb = (b + LOG_SHIFT).ln();
                let ln_u = alpha_a * la
                    + alpha_b * lb
                    + 0.5 * beta_aa * la * la
                    + 0.5 * beta_bb * lb * lb
                    + beta_ab * la * lb;
                ln_u.exp()
            }
            Utility::StoneGeary {
                alpha,
                gamma_a,
                gamma_b,
            } => {
                let sa = (a - gamma_a).max(SUBSISTENCE_FLOOR);
                let sb = (b - gamma_b).max(SUBSISTENCE_FLOOR);
                alpha * sa.ln() + (1.0 - alpha) * sb.ln()
            }
        }
    }

    /// Marginal utility of each good at `(a, b)`.
    fn marginal_utilities(&self, a: f64, b: f64) -> (f64, f64) {
        match *self {
            Utility::CobbDouglas { alpha } => {
                (alpha / (a + LOG_SHIFT), (1.0 - alpha) / (b + LOG_SHIFT))
            }
            Utility::Ces { alpha, rho } => {
                let sa = a + LOG_SHIFT;
                let sb = b + LOG_SHIFT;
                let inner = alpha * sa.powf(rho) + (1.0 - alpha) * sb.powf(rho);
                let outer = inner.powf(1.0 / rho - 1.0);
                (
                    outer * alpha * sa.powf(rho - 1.0),
                    outer * (1.0 - alpha) * sb.powf(rho - 1.0),
                )
            }
            Utility::Leontief { a: ca, b: cb } => {
                // Marginal utility accrues only to the binding good.
                if a / ca < b / cb {
                    (1.0 / ca, 0.0)
                } else if b / cb < a / ca {
                    (0.0, 1.0 / cb)
                } else {
                    (0.5 / ca, 0.5 / cb)
                }
            }
            Utility::Linear { a: ca, b: cb } => (ca, cb),
            Utility::Quadratic { a1, a2, b1, b2 } => {
                ((a1 - a2 * a).max(0.0), (b1 - b2 * b).max(0.0))
            }
            Utility::Translog {
                alpha_a,
                alpha_b,
                beta_aa,
                beta_bb,
                beta_ab,
            } => {
                let sa = a + LOG_SHIFT;
                let sb = b + LOG_SHIFT;
                let la = sa.ln();
                let lb = sb.ln();
                let u = self.value(a, b);
                let elast_a = alpha_a + beta_aa * la + beta_ab * lb;
                let elast_b = alpha_b + beta_bb * lb + beta_ab * la;
                ((u * elast_a / sa).max(0.0), (u * elast_b / sb).max(0.0))
            }
            Utility::StoneGeary {
                alpha,
                gamma_a,
                gamma_b,
            } => {
                let sa = (a - gamma_a).max(SUBSISTENCE_FLOOR);
                let sb = (b - gamma_b).max(SUBSISTENCE_FLOOR);
                (alpha / sa, (1.0 - alpha) / sb)
            }
        }
    }

    /// MRS of A in B: how many units of B one marginal unit of A is worth.
    /// Clamped into `[MRS_MIN, MRS_MAX]` so quotes stay finite.
    pub fn mrs_a_in_b(&self, a: f64, b: f64) -> f64 {
        let (mu_a, mu_b) = self.marginal_utilities(a, b);
        let mrs = if mu_b <= 0.0 {
            MRS_MAX
        } else if mu_a <= 0.0 {
            MRS_MIN
        } else {
            mu_a / mu_b
        };
        mrs.clamp(MRS_MIN, MRS_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cobb_douglas_mrs_reflects_scarcity() {
        let u = Utility::CobbDouglas { alpha: 0.5 };
        // Scarce A, abundant B: A should be worth many units of B.
        let scarce_a = u.mrs_a_in_b(0.0, 10.0);
        let abundant_a = u.mrs_a_in_b(10.0, 0.0);
        assert!(scarce_a > 1.0);
        assert!(abundant_a < 1.0);
        // Symmetric holdings, symmetric MRS.
        assert!((u.mrs_a_in_b(5.0, 5.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mrs_is_clamped_at_corners() {
        let u = Utility::Leontief { a: 1.0, b: 1.0 };
        // A strictly binding: MU_B is zero, MRS pegs at the cap.
        assert_eq!(u.mrs_a_in_b(1.0, 5.0), MRS_MAX);
        assert_eq!(u.mrs_a_in_b(5.0, 1.0), MRS_MIN);
    }

    #[test]
    fn linear_mrs_is_constant() {
        let u = Utility::Linear { a: 2.0, b: 1.0 };
        assert_eq!(u.mrs_a_in_b(0.0, 0.0), 2.0);
        assert_eq!(u.mrs_a_in_b(100.0, 3.0), 2.0);
    }

    #[test]
    fn quadratic_mu_floors_at_bliss() {
        let u = Utility::Quadratic {
            a1: 10.0,
            a2: 1.0,
            b1: 10.0,
            b2: 1.0,
        };
        // Past the bliss point in A, more A is worthless.
        assert_eq!(u.mrs_a_in_b(20.0, 0.0), MRS_MIN);
    }

    #[test]
    fn ces_value_monotone_in_both_goods() {
        let u = Utility::Ces {
            alpha: 0.5,
            rho: 0.5,
        };
        let base = u.value(2.0, 2.0);
        assert!(u.value(3.0, 2.0) > base);
        assert!(u.value(2.0, 3.0) > base);
    }

    #[test]
    fn stone_geary_prizes_subsistence_good() {
        let u = Utility::StoneGeary {
            alpha: 0.5,
            gamma_a: 2.0,
            gamma_b: 2.0,
        };
        // Below subsistence in A, A is extremely valuable.
        let mrs = u.mrs_a_in_b(1.0, 10.0);
        assert!(mrs > 10.0);
    }

    #[test]
    fn translog_reduces_toward_cobb_douglas_without_cross_terms() {
        let tl = Utility::Translog {
            alpha_a: 0.5,
            alpha_b: 0.5,
            beta_aa: 0.0,
            beta_bb: 0.0,
            beta_ab: 0.0,
        };
        let cd = Utility::CobbDouglas { alpha: 0.5 };
        // Same MRS surface when all second-order terms vanish.
        for &(a, b) in &[(1.0, 4.0), (4.0, 1.0), (3.0, 3.0)] {
            let diff = (tl.mrs_a_in_b(a, b) - cd.mrs_a_in_b(a, b)).abs();
            assert!(diff < 1e-9, "mrs mismatch at ({a}, {b}): {diff}");
        }
    }
}
