//! Per-frame aggregate extraction: compartment occupancy, the imbalance
//! "voltage proxy" traces, and the Goldman-style log-ratio overlay.
//!
//! Particles inside the membrane slab count toward neither compartment.

const EPS: f64 = 1e-3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpeciesCounts {
    pub a_left: usize,
    pub a_right: usize,
    pub b_left: usize,
    pub b_right: usize,
}

/// Count particles left of the membrane and right of it for one frame
/// slice of x coordinates.
pub fn compartment_counts(xs: &[f32], left_wall: f64, right_wall: f64) -> (usize, usize) {
    let mut left = 0;
    let mut right = 0;
    for &x in xs {
        let x = f64::from(x);
        if x < left_wall {
            left += 1;
        } else if x > right_wall {
            right += 1;
        }
    }
    (left, right)
}

/// Same split, partitioned by species (type 0 is A, anything else is B).
pub fn species_counts(
    xs: &[f32],
    types: &[u8],
    left_wall: f64,
    right_wall: f64,
) -> SpeciesCounts {
    let mut counts = SpeciesCounts::default();
    for (&x, &ty) in xs.iter().zip(types) {
        let x = f64::from(x);
        if x < left_wall {
            if ty == 0 {
                counts.a_left += 1;
            } else {
                counts.b_left += 1;
            }
        } else if x > right_wall {
            if ty == 0 {
                counts.a_right += 1;
            } else {
                counts.b_right += 1;
            }
        }
    }
    counts
}

/// Signed single-species imbalance: negative when the left compartment
/// dominates.
pub fn voltage_proxy(left: usize, right: usize) -> f64 {
    -(left as f64 - right as f64)
}

/// Permeability-weighted log concentration ratio. `p_a`/`p_b` are the
/// species channel-window widths, floored so a closed channel still yields
/// a finite ratio.
pub fn goldman_log_ratio(p_a: f64, p_b: f64, counts: &SpeciesCounts) -> f64 {
    let p_a = p_a.max(EPS);
    let p_b = p_b.max(EPS);
    let numer = p_a * counts.a_right as f64 + p_b * counts.b_right as f64 + EPS;
    let denom = p_a * counts.a_left as f64 + p_b * counts.b_left as f64 + EPS;
    (numer / denom).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_ignore_particles_inside_the_wall() {
        let xs = [-5.0f32, -1.9, 0.0, 1.9, 5.0];
        let (left, right) = compartment_counts(&xs, -2.0, 2.0);
        assert_eq!(left, 1);
        assert_eq!(right, 1);
    }

    #[test]
    fn voltage_proxy_sign_convention() {
        assert_eq!(voltage_proxy(10, 4), -6.0);
        assert_eq!(voltage_proxy(4, 10), 6.0);
        assert_eq!(voltage_proxy(7, 7), 0.0);
    }

    #[test]
    fn species_counts_partition_by_type() {
        let xs = [-5.0f32, -5.0, 5.0, 5.0, 0.0];
        let types = [0u8, 1, 0, 1, 0];
        let counts = species_counts(&xs, &types, -2.0, 2.0);
        assert_eq!(
            counts,
            SpeciesCounts {
                a_left: 1,
                a_right: 1,
                b_left: 1,
                b_right: 1,
            }
        );
    }

    #[test]
    fn goldman_ratio_balanced_is_zero() {
        let counts = SpeciesCounts {
            a_left: 10,
            a_right: 10,
            b_left: 5,
            b_right: 5,
        };
        assert_eq!(goldman_log_ratio(1.0, 30.0, &counts), 0.0);
    }

    #[test]
    fn goldman_ratio_is_finite_for_empty_compartments() {
        let counts = SpeciesCounts::default();
        assert!(goldman_log_ratio(0.0, 0.0, &counts).is_finite());

        let one_sided = SpeciesCounts {
            a_left: 50,
            ..SpeciesCounts::default()
        };
        let v = goldman_log_ratio(1.0, 1.0, &one_sided);
        assert!(v.is_finite() && v < 0.0);
    }
}
