//! The closed family of utility functions that drives quotes and surplus.
//!
//! Every variant exposes goods-only utility `value(a, b)`, marginal
//! utilities, and finite reservation-price bounds. Bounds feed the quote
//! dictionary; `value` feeds the compensating-block acceptance checks.

use serde::{Deserialize, Serialize};

use crate::types::{Good, Inventory, Price};

/// Substitute for a zero inventory amount so derivatives stay finite.
pub const INVENTORY_EPS: f64 = 1e-6;

/// Stand-in for "refuses at any price"; finite so quote math never sees ∞.
pub const REFUSAL_PRICE: Price = 1e6;

/// Stand-in for "sells at any positive price".
pub const ANY_PRICE: Price = 1e-6;

const PRICE_FLOOR: Price = 1e-9;
const PRICE_CEIL: Price = 1e9;

fn clamp_price(p: f64) -> Price {
    if p.is_nan() { 1.0 } else { p.clamp(PRICE_FLOOR, PRICE_CEIL) }
}

// === RESERVATION BOUNDS ===

/// Finite interval of prices at which an infinitesimal trade is weakly
/// acceptable. `min > max` encodes an empty interval (no acceptable price).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservationBounds {
    pub min: Price,
    pub max: Price,
}

impl ReservationBounds {
    pub fn point(p: Price) -> Self {
        Self { min: p, max: p }
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

// === UTILITY FAMILY ===

/// Tagged utility variant with fixed parameters. Matching happens once per
/// agent per evaluation; anything reusable is cached in the quote dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Utility {
    /// CES `(w_a·A^ρ + w_b·B^ρ)^(1/ρ)` for ρ ∈ (-∞,1]\{0}; `rho = 0` is the
    /// Cobb-Douglas limit `A^w_a · B^w_b` (weights summing to 1).
    Ces { w_a: f64, w_b: f64, rho: f64 },
    /// Perfect substitutes `v_a·A + v_b·B`.
    Linear { v_a: f64, v_b: f64 },
    /// Bliss point `−[(A−Ā)²/σ_a² + (B−B̄)²/σ_b² + γ(A−Ā)(B−B̄)]`.
    Quadratic {
        a_bliss: f64,
        b_bliss: f64,
        sigma_a: f64,
        sigma_b: f64,
        gamma: f64,
    },
    /// `exp(α₀ + α_a·ln A + α_b·ln B + ½·β quadratic-in-logs terms)`.
    Translog {
        alpha_0: f64,
        alpha_a: f64,
        alpha_b: f64,
        beta_aa: f64,
        beta_bb: f64,
        beta_ab: f64,
    },
    /// Stone-Geary LES `α_a·ln(A−γ_a) + α_b·ln(B−γ_b)` with subsistence
    /// floors γ.
    StoneGeary {
        alpha_a: f64,
        alpha_b: f64,
        gamma_a: f64,
        gamma_b: f64,
    },
}

impl Utility {
    /// Goods-only utility of holding `a` units of A and `b` of B.
    pub fn value(&self, a: u32, b: u32) -> f64 {
        let (af, bf) = (f64::from(a), f64::from(b));
        match *self {
            Utility::Ces { w_a, w_b, rho } => {
                if a == 0 && b == 0 {
                    return 0.0;
                }
                if rho == 0.0 {
                    // Cobb-Douglas limit.
                    af.powf(w_a) * bf.powf(w_b)
                } else if rho < 0.0 {
                    // ε-shift keeps u(1,0) small-positive so zero-inventory
                    // agents still see a foraging gain.
                    let af = af.max(INVENTORY_EPS);
                    let bf = bf.max(INVENTORY_EPS);
                    (w_a * af.powf(rho) + w_b * bf.powf(rho)).powf(1.0 / rho)
                } else {
                    (w_a * af.powf(rho) + w_b * bf.powf(rho)).powf(1.0 / rho)
                }
            }
            Utility::Linear { v_a, v_b } => v_a * af + v_b * bf,
            Utility::Quadratic {
                a_bliss,
                b_bliss,
                sigma_a,
                sigma_b,
                gamma,
            } => {
                let da = af - a_bliss;
                let db = bf - b_bliss;
                -(da * da / (sigma_a * sigma_a) + db * db / (sigma_b * sigma_b) + gamma * da * db)
            }
            Utility::Translog {
                alpha_0,
                alpha_a,
                alpha_b,
                beta_aa,
                beta_bb,
                beta_ab,
            } => {
                let la = af.max(INVENTORY_EPS).ln();
                let lb = bf.max(INVENTORY_EPS).ln();
                let core = alpha_0
                    + alpha_a * la
                    + alpha_b * lb
                    + 0.5 * (beta_aa * la * la + beta_bb * lb * lb + 2.0 * beta_ab * la * lb);
                core.exp()
            }
            Utility::StoneGeary {
                alpha_a,
                alpha_b,
                gamma_a,
                gamma_b,
            } => {
                alpha_a * (af - gamma_a).max(INVENTORY_EPS).ln()
                    + alpha_b * (bf - gamma_b).max(INVENTORY_EPS).ln()
            }
        }
    }

    /// Marginal utility of good A at `(a, b)`. Always finite: zero amounts
    /// are ε-shifted wherever the derivative would blow up.
    pub fn mu_a(&self, a: u32, b: u32) -> f64 {
        let af = f64::from(a).max(INVENTORY_EPS);
        let bf = f64::from(b).max(INVENTORY_EPS);
        match *self {
            Utility::Ces { w_a, w_b, rho } => {
                if rho == 0.0 {
                    // d(A^wa·B^wb)/dA = wa · u / A
                    w_a * af.powf(w_a - 1.0) * bf.powf(w_b)
                } else {
                    let s = w_a * af.powf(rho) + w_b * bf.powf(rho);
                    w_a * af.powf(rho - 1.0) * s.powf(1.0 / rho - 1.0)
                }
            }
            Utility::Linear { v_a, .. } => v_a,
            Utility::Quadratic {
                a_bliss,
                b_bliss,
                sigma_a,
                gamma,
                ..
            } => {
                let da = f64::from(a) - a_bliss;
                let db = f64::from(b) - b_bliss;
                -(2.0 * da / (sigma_a * sigma_a) + gamma * db)
            }
            Utility::Translog {
                alpha_a,
                beta_aa,
                beta_ab,
                ..
            } => {
                let u = self.value(a, b);
                let la = af.ln();
                let lb = bf.ln();
                u * (alpha_a + beta_aa * la + beta_ab * lb) / af
            }
            Utility::StoneGeary {
                alpha_a, gamma_a, ..
            } => alpha_a / (f64::from(a) - gamma_a).max(INVENTORY_EPS),
        }
    }

    pub fn mu_b(&self, a: u32, b: u32) -> f64 {
        self.swapped().mu_a(b, a)
    }

    /// Reservation interval for trading A, priced in B per unit of A.
    pub fn bounds_a_in_b(&self, a: u32, b: u32) -> ReservationBounds {
        match *self {
            Utility::Ces { w_a, w_b, rho } => {
                let af = f64::from(a).max(INVENTORY_EPS);
                let bf = f64::from(b).max(INVENTORY_EPS);
                ReservationBounds::point(clamp_price(w_a / w_b * (af / bf).powf(rho - 1.0)))
            }
            Utility::Linear { v_a, v_b } => ReservationBounds::point(clamp_price(v_a / v_b)),
            Utility::Quadratic { .. } => {
                let mu_a = self.mu_a(a, b);
                let mu_b = self.mu_b(a, b);
                if mu_a <= 0.0 && mu_b <= 0.0 {
                    // Saturated in both goods: no price buys anything.
                    ReservationBounds {
                        min: REFUSAL_PRICE,
                        max: 0.0,
                    }
                } else if mu_a <= 0.0 {
                    // A is a "bad": sell it at any positive price.
                    ReservationBounds::point(ANY_PRICE)
                } else if mu_b <= 0.0 {
                    // B is disposable: demand A, give B away freely.
                    ReservationBounds::point(REFUSAL_PRICE)
                } else {
                    ReservationBounds::point(clamp_price(mu_a / mu_b))
                }
            }
            Utility::Translog { .. } => {
                ReservationBounds::point(clamp_price(self.mu_a(a, b) / self.mu_b(a, b)))
            }
            Utility::StoneGeary {
                gamma_a, gamma_b, ..
            } => {
                let below_a = f64::from(a) - gamma_a <= 0.0;
                let below_b = f64::from(b) - gamma_b <= 0.0;
                match (below_a, below_b) {
                    (true, true) => ReservationBounds::point(1.0),
                    // Scarce in A: refuse to part with it (huge A-in-B price).
                    (true, false) => ReservationBounds::point(REFUSAL_PRICE),
                    // Scarce in B: refuse to part with B, i.e. the B-in-A
                    // refusal value reciprocated into A-in-B terms.
                    (false, true) => ReservationBounds::point(1.0 / REFUSAL_PRICE),
                    (false, false) => {
                        ReservationBounds::point(clamp_price(self.mu_a(a, b) / self.mu_b(a, b)))
                    }
                }
            }
        }
    }

    /// Reservation interval for trading B, priced in A per unit of B.
    pub fn bounds_b_in_a(&self, a: u32, b: u32) -> ReservationBounds {
        self.swapped().bounds_a_in_b(b, a)
    }

    /// Utility gain from one harvested unit of `good` on top of `inv`.
    pub fn forage_gain(&self, inv: Inventory, good: Good) -> f64 {
        match good {
            Good::A => self.value(inv.a + 1, inv.b) - self.value(inv.a, inv.b),
            Good::B => self.value(inv.a, inv.b + 1) - self.value(inv.a, inv.b),
        }
    }

    /// The same preferences with the roles of A and B exchanged. Lets the
    /// B-side derivations reuse the A-side code paths.
    fn swapped(&self) -> Utility {
        match *self {
            Utility::Ces { w_a, w_b, rho } => Utility::Ces {
                w_a: w_b,
                w_b: w_a,
                rho,
            },
            Utility::Linear { v_a, v_b } => Utility::Linear {
                v_a: v_b,
                v_b: v_a,
            },
            Utility::Quadratic {
                a_bliss,
                b_bliss,
                sigma_a,
                sigma_b,
                gamma,
            } => Utility::Quadratic {
                a_bliss: b_bliss,
                b_bliss: a_bliss,
                sigma_a: sigma_b,
                sigma_b: sigma_a,
                gamma,
            },
            Utility::Translog {
                alpha_0,
                alpha_a,
                alpha_b,
                beta_aa,
                beta_bb,
                beta_ab,
            } => Utility::Translog {
                alpha_0,
                alpha_a: alpha_b,
                alpha_b: alpha_a,
                beta_aa: beta_bb,
                beta_bb: beta_aa,
                beta_ab,
            },
            Utility::StoneGeary {
                alpha_a,
                alpha_b,
                gamma_a,
                gamma_b,
            } => Utility::StoneGeary {
                alpha_a: alpha_b,
                alpha_b: alpha_a,
                gamma_a: gamma_b,
                gamma_b: gamma_a,
            },
        }
    }

    /// Scenario-load validation; the returned string names the bad parameter.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Utility::Ces { w_a, w_b, rho } => {
                if w_a <= 0.0 || w_b <= 0.0 {
                    return Err("utility_params.w_a/w_b must be > 0".into());
                }
                if rho > 1.0 {
                    return Err("utility_params.rho must be ≤ 1".into());
                }
                if rho == 0.0 && (w_a + w_b - 1.0).abs() > 1e-9 {
                    return Err("utility_params: Cobb-Douglas weights must sum to 1".into());
                }
                Ok(())
            }
            Utility::Linear { v_a, v_b } => {
                if v_a <= 0.0 || v_b <= 0.0 {
                    return Err("utility_params.v_a/v_b must be > 0".into());
                }
                Ok(())
            }
            Utility::Quadratic {
                sigma_a, sigma_b, ..
            } => {
                if sigma_a <= 0.0 || sigma_b <= 0.0 {
                    return Err("utility_params.sigma_a/sigma_b must be > 0".into());
                }
                Ok(())
            }
            Utility::Translog { .. } => Ok(()),
            Utility::StoneGeary {
                alpha_a,
                alpha_b,
                gamma_a,
                gamma_b,
            } => {
                if alpha_a <= 0.0 || alpha_b <= 0.0 {
                    return Err("utility_params.alpha_a/alpha_b must be > 0".into());
                }
                if gamma_a < 0.0 || gamma_b < 0.0 {
                    return Err("utility_params.gamma_a/gamma_b must be ≥ 0".into());
                }
                Ok(())
            }
        }
    }
}
