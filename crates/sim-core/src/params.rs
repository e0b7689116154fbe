//! Parameter structs, per-scenario clamp limits, and the normalizer that
//! silently repairs whatever the UI hands over. No input is ever rejected:
//! non-finite values fall back to the scenario default, everything else is
//! clamped into its physical range.

/// Electrostatic drift acting on every particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldMode {
    None,
    /// Inverse-distance pull toward a fixed attractor point.
    PointCharge { x: f64, y: f64, strength: f64 },
    /// Horizontal-only pull toward a vertical charged wall.
    PlanarWall { x: f64, strength: f64 },
}

impl FieldMode {
    pub fn strength(&self) -> f64 {
        match *self {
            FieldMode::None => 0.0,
            FieldMode::PointCharge { strength, .. } | FieldMode::PlanarWall { strength, .. } => {
                strength
            }
        }
    }
}

/// Membrane permeability rule. Windows are y-intervals on the wall.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gating {
    /// No membrane: particles move freely.
    Open,
    Channel {
        y_min: f64,
        y_max: f64,
    },
    /// Species A passes through `a`, species B through `b`.
    PerSpecies {
        a: (f64, f64),
        b: (f64, f64),
    },
}

/// Initial particle placement. Placement consumes generator draws, so each
/// variant pins its own draw order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InitMode {
    /// Gaussian cluster around the origin.
    Cluster { sd: f64 },
    /// Uniform over the left half of the box, up to the midline.
    LeftHalf,
    /// Uniform strictly left of the membrane.
    LeftCompartment,
    /// Uniform strictly right of the membrane.
    RightCompartment,
    /// Left/right split by fraction, y clustered around the channel band.
    SplitChannelBand { left_frac: f64 },
    /// Species assigned up front, then each species split left/right with
    /// y inside that species' channel window.
    SplitPerSpecies { left_frac: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeciesParams {
    /// Probability that a particle is species A (type 0).
    pub type0_fraction: f64,
    /// When set, type 0 carries +1 and type 1 carries -1, and the electric
    /// force is signed by charge.
    pub charged: bool,
}

/// Reversed-sign point field active on a frame window, modelling a
/// transient depolarizing stimulus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepolWindow {
    pub strength: f64,
    pub start_frac: f64,
    pub end_frac: f64,
}

/// Which per-frame voltage proxies the integrator records.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TraceMode {
    None,
    SingleSpecies,
    PerSpecies { goldman: bool },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimParams {
    pub total_time: f64,
    pub dt: f64,
    pub num_particles: usize,
    pub box_width: f64,
    pub box_height: f64,
    pub wall_thickness: f64,
    pub diffusion_sd: f64,
    pub repulsion_strength: f64,
    pub init: InitMode,
    pub field: FieldMode,
    pub gating: Gating,
    pub species: Option<SpeciesParams>,
    pub depol: Option<DepolWindow>,
    pub trace: TraceMode,
}

/// The clamp constants that vary between scenario families. Everything
/// else shares one fixed range (see `SimParams::normalized`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    pub t_min: f64,
    pub n_min: usize,
    pub n_max: usize,
    pub box_min: f64,
}

impl Limits {
    pub const DIFFUSION: Limits = Limits {
        t_min: 20.0,
        n_min: 1,
        n_max: 5000,
        box_min: 20.0,
    };
    /// The O(N^2) repulsion pass caps the population harder.
    pub const CROWDED: Limits = Limits {
        t_min: 20.0,
        n_min: 1,
        n_max: 1000,
        box_min: 20.0,
    };
    pub const CROWDED_TWO_SPECIES: Limits = Limits {
        t_min: 20.0,
        n_min: 1,
        n_max: 500,
        box_min: 20.0,
    };
    pub const RESTING: Limits = Limits {
        t_min: 50.0,
        n_min: 10,
        n_max: 300,
        box_min: 40.0,
    };
}

pub const T_MAX: f64 = 20_000.0;
pub const DT_MIN: f64 = 0.05;
pub const DT_MAX: f64 = 20.0;
pub const SD_MAX: f64 = 20.0;
pub const STRENGTH_MAX: f64 = 10.0;
pub const BOX_MAX: f64 = 500.0;
pub const WALL_MIN: f64 = 0.5;
pub const WALL_MAX: f64 = 50.0;
/// Narrowest renderable channel slit.
pub const MIN_CHANNEL_WIDTH: f64 = 0.5;

pub fn clampf(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

/// Order a raw (a, b) channel window, clamp it into the box, and widen a
/// degenerate window to the minimum slit.
pub fn normalize_channel(a: f64, b: f64, box_height: f64) -> (f64, f64) {
    let half = box_height / 2.0;
    let lo = clampf(a.min(b), -half, half);
    let hi = clampf(a.max(b), -half, half);
    if hi - lo < MIN_CHANNEL_WIDTH {
        (lo, (lo + MIN_CHANNEL_WIDTH).min(half))
    } else {
        (lo, hi)
    }
}

impl SimParams {
    /// Pure repair pass: every field of the result is physically valid.
    /// Idempotent, and never fails — malformed numbers fall back to the
    /// scenario defaults before clamping.
    pub fn normalized(&self, limits: &Limits, defaults: &SimParams) -> SimParams {
        let total_time = clampf(
            finite_or(self.total_time, defaults.total_time).round(),
            limits.t_min,
            T_MAX,
        );
        let dt = clampf(finite_or(self.dt, defaults.dt), DT_MIN, DT_MAX);
        let num_particles = self.num_particles.clamp(limits.n_min, limits.n_max);
        let box_width = clampf(
            finite_or(self.box_width, defaults.box_width),
            limits.box_min,
            BOX_MAX,
        );
        let box_height = clampf(
            finite_or(self.box_height, defaults.box_height),
            limits.box_min,
            BOX_MAX,
        );
        let wall_thickness = clampf(
            finite_or(self.wall_thickness, defaults.wall_thickness),
            WALL_MIN,
            WALL_MAX.min(box_width - 2.0),
        );
        let diffusion_sd = clampf(finite_or(self.diffusion_sd, 0.0), 0.0, SD_MAX);
        let repulsion_strength = clampf(finite_or(self.repulsion_strength, 0.0), 0.0, STRENGTH_MAX);

        let half_w = box_width / 2.0;
        let half_h = box_height / 2.0;

        let field = match self.field {
            FieldMode::None => FieldMode::None,
            FieldMode::PointCharge { x, y, strength } => FieldMode::PointCharge {
                x: clampf(finite_or(x, 0.0), -half_w, half_w),
                y: clampf(finite_or(y, 0.0), -half_h, half_h),
                strength: clampf(finite_or(strength, 0.0), 0.0, STRENGTH_MAX),
            },
            FieldMode::PlanarWall { x, strength } => FieldMode::PlanarWall {
                x: clampf(finite_or(x, 0.0), -half_w, half_w),
                strength: clampf(finite_or(strength, 0.0), 0.0, STRENGTH_MAX),
            },
        };

        let gating = match self.gating {
            Gating::Open => Gating::Open,
            Gating::Channel { y_min, y_max } => {
                let (lo, hi) =
                    normalize_channel(finite_or(y_min, 0.0), finite_or(y_max, 0.0), box_height);
                Gating::Channel { y_min: lo, y_max: hi }
            }
            Gating::PerSpecies { a, b } => Gating::PerSpecies {
                a: normalize_channel(finite_or(a.0, 0.0), finite_or(a.1, 0.0), box_height),
                b: normalize_channel(finite_or(b.0, 0.0), finite_or(b.1, 0.0), box_height),
            },
        };

        let init = match self.init {
            InitMode::Cluster { sd } => InitMode::Cluster {
                sd: clampf(finite_or(sd, 0.0), 0.0, SD_MAX),
            },
            InitMode::SplitChannelBand { left_frac } => InitMode::SplitChannelBand {
                left_frac: clampf(finite_or(left_frac, 0.5), 0.0, 1.0),
            },
            InitMode::SplitPerSpecies { left_frac } => InitMode::SplitPerSpecies {
                left_frac: clampf(finite_or(left_frac, 0.5), 0.0, 1.0),
            },
            other => other,
        };

        let species = self.species.map(|s| SpeciesParams {
            type0_fraction: clampf(finite_or(s.type0_fraction, 0.5), 0.0, 1.0),
            charged: s.charged,
        });

        let depol = self.depol.map(|d| DepolWindow {
            strength: clampf(finite_or(d.strength, 0.0), 0.0, STRENGTH_MAX),
            start_frac: clampf(finite_or(d.start_frac, 0.0), 0.0, 1.0),
            end_frac: clampf(finite_or(d.end_frac, 1.0), 0.0, 1.0),
        });

        SimParams {
            total_time,
            dt,
            num_particles,
            box_width,
            box_height,
            wall_thickness,
            diffusion_sd,
            repulsion_strength,
            init,
            field,
            gating,
            species,
            depol,
            trace: self.trace,
        }
    }
}

/// A scenario bundles page defaults with that page's clamp limits.
#[derive(Clone, Copy, Debug)]
pub struct Scenario {
    pub defaults: SimParams,
    pub limits: Limits,
}

impl Scenario {
    pub fn by_name(name: &str) -> Option<Scenario> {
        match name {
            "pure_diffusion" => Some(Self::pure_diffusion()),
            "gated_membrane" => Some(Self::gated_membrane()),
            "two_species_membrane" => Some(Self::two_species_membrane()),
            "field_comparison" => Some(Self::field_comparison()),
            "crowded_drift" => Some(Self::crowded_drift()),
            "two_species_drift" => Some(Self::two_species_drift()),
            "resting_potential" => Some(Self::resting_potential()),
            "two_ion_point" => Some(Self::two_ion_point()),
            "two_ion_wall" => Some(Self::two_ion_wall()),
            "two_ion_goldman" => Some(Self::two_ion_goldman()),
            _ => None,
        }
    }

    /// Free Brownian motion, no membrane, no forces.
    pub fn pure_diffusion() -> Scenario {
        Scenario {
            defaults: SimParams {
                total_time: 1000.0,
                dt: 1.0,
                num_particles: 100,
                box_width: 500.0,
                box_height: 500.0,
                wall_thickness: 4.0,
                diffusion_sd: 0.5,
                repulsion_strength: 0.0,
                init: InitMode::Cluster { sd: 0.1 },
                field: FieldMode::None,
                gating: Gating::Open,
                species: None,
                depol: None,
                trace: TraceMode::None,
            },
            limits: Limits::DIFFUSION,
        }
    }

    /// One ion species against a single gated membrane channel.
    pub fn gated_membrane() -> Scenario {
        Scenario {
            defaults: SimParams {
                total_time: 1000.0,
                dt: 1.0,
                num_particles: 100,
                box_width: 100.0,
                box_height: 60.0,
                wall_thickness: 4.0,
                diffusion_sd: 0.3,
                repulsion_strength: 0.0,
                init: InitMode::LeftHalf,
                field: FieldMode::None,
                gating: Gating::Channel {
                    y_min: -10.0,
                    y_max: 10.0,
                },
                species: None,
                depol: None,
                trace: TraceMode::None,
            },
            limits: Limits::DIFFUSION,
        }
    }

    /// Two species with disjoint selective channels, no drift.
    pub fn two_species_membrane() -> Scenario {
        Scenario {
            defaults: SimParams {
                total_time: 1000.0,
                dt: 3.0,
                num_particles: 500,
                box_width: 100.0,
                box_height: 80.0,
                wall_thickness: 4.0,
                diffusion_sd: 0.5,
                repulsion_strength: 0.0,
                init: InitMode::LeftCompartment,
                field: FieldMode::None,
                gating: Gating::PerSpecies {
                    a: (10.0, 11.0),
                    b: (-30.0, -10.0),
                },
                species: Some(SpeciesParams {
                    type0_fraction: 0.5,
                    charged: false,
                }),
                depol: None,
                trace: TraceMode::None,
            },
            limits: Limits::DIFFUSION,
        }
    }

    /// Weak-vs-strong field comparison: the caller runs this twice with the
    /// same seed, overriding only the field strength.
    pub fn field_comparison() -> Scenario {
        Scenario {
            defaults: SimParams {
                total_time: 1000.0,
                dt: 1.0,
                num_particles: 100,
                box_width: 100.0,
                box_height: 60.0,
                wall_thickness: 4.0,
                diffusion_sd: 0.5,
                repulsion_strength: 0.0,
                init: InitMode::RightCompartment,
                field: FieldMode::PointCharge {
                    x: -45.0,
                    y: 0.0,
                    strength: 0.001,
                },
                gating: Gating::Channel {
                    y_min: -10.0,
                    y_max: 10.0,
                },
                species: None,
                depol: None,
                trace: TraceMode::None,
            },
            limits: Limits::DIFFUSION,
        }
    }

    /// Point-charge drift plus pairwise repulsion crowding.
    pub fn crowded_drift() -> Scenario {
        Scenario {
            defaults: SimParams {
                total_time: 1000.0,
                dt: 1.0,
                num_particles: 100,
                box_width: 100.0,
                box_height: 60.0,
                wall_thickness: 4.0,
                diffusion_sd: 0.5,
                repulsion_strength: 0.2,
                init: InitMode::RightCompartment,
                field: FieldMode::PointCharge {
                    x: -35.0,
                    y: 0.0,
                    strength: 0.3,
                },
                gating: Gating::Channel {
                    y_min: -10.0,
                    y_max: 10.0,
                },
                species: None,
                depol: None,
                trace: TraceMode::None,
            },
            limits: Limits::CROWDED,
        }
    }

    /// Two uncharged species, selective channels, shared drift and crowding.
    pub fn two_species_drift() -> Scenario {
        Scenario {
            defaults: SimParams {
                total_time: 1000.0,
                dt: 1.0,
                num_particles: 200,
                box_width: 100.0,
                box_height: 100.0,
                wall_thickness: 4.0,
                diffusion_sd: 0.5,
                repulsion_strength: 0.05,
                init: InitMode::RightCompartment,
                field: FieldMode::PointCharge {
                    x: -30.0,
                    y: 0.0,
                    strength: 0.1,
                },
                gating: Gating::PerSpecies {
                    a: (30.0, 31.0),
                    b: (-40.0, -10.0),
                },
                species: Some(SpeciesParams {
                    type0_fraction: 0.5,
                    charged: false,
                }),
                depol: None,
                trace: TraceMode::None,
            },
            limits: Limits::CROWDED_TWO_SPECIES,
        }
    }

    /// Resting-potential proxy with a transient depolarization window.
    pub fn resting_potential() -> Scenario {
        Scenario {
            defaults: SimParams {
                total_time: 2400.0,
                dt: 1.0,
                num_particles: 140,
                box_width: 200.0,
                box_height: 200.0,
                wall_thickness: 4.0,
                diffusion_sd: 0.1,
                repulsion_strength: 0.05,
                init: InitMode::SplitChannelBand { left_frac: 0.65 },
                field: FieldMode::PointCharge {
                    x: -80.0,
                    y: 0.0,
                    strength: 0.1,
                },
                gating: Gating::Channel {
                    y_min: -10.0,
                    y_max: 10.0,
                },
                species: None,
                depol: Some(DepolWindow {
                    strength: 0.2,
                    start_frac: 1.0 / 3.0,
                    end_frac: 2.0 / 3.0,
                }),
                trace: TraceMode::SingleSpecies,
            },
            limits: Limits::RESTING,
        }
    }

    fn two_ion_base() -> SimParams {
        SimParams {
            total_time: 2000.0,
            dt: 1.0,
            num_particles: 120,
            box_width: 100.0,
            box_height: 100.0,
            wall_thickness: 4.0,
            diffusion_sd: 0.5,
            repulsion_strength: 0.05,
            init: InitMode::SplitPerSpecies { left_frac: 0.6 },
            field: FieldMode::PointCharge {
                x: -30.0,
                y: 0.0,
                strength: 0.1,
            },
            gating: Gating::PerSpecies {
                a: (30.0, 31.0),
                b: (-40.0, -10.0),
            },
            species: Some(SpeciesParams {
                type0_fraction: 0.5,
                charged: true,
            }),
            depol: None,
            trace: TraceMode::PerSpecies { goldman: false },
        }
    }

    /// Two opposite-charge ions drifting toward a point attractor.
    pub fn two_ion_point() -> Scenario {
        Scenario {
            defaults: Self::two_ion_base(),
            limits: Limits::RESTING,
        }
    }

    /// Two opposite-charge ions in a horizontal charged-wall field.
    pub fn two_ion_wall() -> Scenario {
        let mut defaults = Self::two_ion_base();
        defaults.total_time = 2200.0;
        defaults.num_particles = 140;
        defaults.repulsion_strength = 0.01;
        defaults.field = FieldMode::PlanarWall {
            x: -45.0,
            strength: 0.1,
        };
        Scenario {
            defaults,
            limits: Limits::RESTING,
        }
    }

    /// Charged-wall variant with the Goldman log-ratio overlay.
    pub fn two_ion_goldman() -> Scenario {
        let mut defaults = Self::two_ion_base();
        defaults.total_time = 2200.0;
        defaults.repulsion_strength = 0.05;
        defaults.field = FieldMode::PlanarWall {
            x: -45.0,
            strength: 0.1,
        };
        defaults.trace = TraceMode::PerSpecies { goldman: true };
        Scenario {
            defaults,
            limits: Limits::RESTING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_normalization_orders_and_widens() {
        // Inverted window is reordered.
        assert_eq!(normalize_channel(10.0, -10.0, 60.0), (-10.0, 10.0));
        // Degenerate window widens to the minimum slit.
        let (lo, hi) = normalize_channel(5.0, 5.0, 60.0);
        assert_eq!(lo, 5.0);
        assert_eq!(hi, 5.5);
        // Window pinned at the top edge widens downward no further than the
        // box allows.
        let (lo, hi) = normalize_channel(30.0, 30.0, 60.0);
        assert_eq!(lo, 30.0);
        assert_eq!(hi, 30.0);
        assert!(hi - lo < MIN_CHANNEL_WIDTH);
    }

    #[test]
    fn channel_normalization_is_idempotent() {
        for &(a, b, h) in &[
            (10.0, -10.0, 60.0),
            (5.0, 5.0, 60.0),
            (-400.0, 400.0, 100.0),
            (29.9, 30.0, 60.0),
            (0.0, 0.3, 60.0),
        ] {
            let once = normalize_channel(a, b, h);
            let twice = normalize_channel(once.0, once.1, h);
            assert_eq!(once, twice, "({a}, {b}, {h})");
            assert!(once.0 >= -h / 2.0 && once.1 <= h / 2.0);
        }
    }

    #[test]
    fn normalize_is_idempotent_for_every_scenario() {
        for name in [
            "pure_diffusion",
            "gated_membrane",
            "two_species_membrane",
            "field_comparison",
            "crowded_drift",
            "two_species_drift",
            "resting_potential",
            "two_ion_point",
            "two_ion_wall",
            "two_ion_goldman",
        ] {
            let sc = Scenario::by_name(name).unwrap();
            let once = sc.defaults.normalized(&sc.limits, &sc.defaults);
            let twice = once.normalized(&sc.limits, &sc.defaults);
            assert_eq!(once, twice, "{name}");
        }
    }

    #[test]
    fn normalize_repairs_out_of_range_input() {
        let sc = Scenario::gated_membrane();
        let mut raw = sc.defaults;
        raw.total_time = 9e9;
        raw.dt = -3.0;
        raw.num_particles = 1_000_000;
        raw.diffusion_sd = f64::NAN;
        raw.gating = Gating::Channel {
            y_min: 500.0,
            y_max: -500.0,
        };
        let p = raw.normalized(&sc.limits, &sc.defaults);
        assert_eq!(p.total_time, T_MAX);
        assert_eq!(p.dt, DT_MIN);
        assert_eq!(p.num_particles, 5000);
        assert_eq!(p.diffusion_sd, 0.0);
        assert_eq!(
            p.gating,
            Gating::Channel {
                y_min: -30.0,
                y_max: 30.0
            }
        );
    }

    #[test]
    fn nan_falls_back_to_scenario_default() {
        let sc = Scenario::resting_potential();
        let mut raw = sc.defaults;
        raw.total_time = f64::NAN;
        raw.box_width = f64::INFINITY;
        let p = raw.normalized(&sc.limits, &sc.defaults);
        assert_eq!(p.total_time, sc.defaults.total_time);
        assert_eq!(p.box_width, sc.defaults.box_width);
    }

    #[test]
    fn resting_limits_are_tighter() {
        let sc = Scenario::resting_potential();
        let mut raw = sc.defaults;
        raw.num_particles = 1;
        raw.total_time = 20.0;
        let p = raw.normalized(&sc.limits, &sc.defaults);
        assert_eq!(p.num_particles, 10);
        assert_eq!(p.total_time, 50.0);
    }

    #[test]
    fn wall_thickness_tracks_box_width() {
        let sc = Scenario::gated_membrane();
        let mut raw = sc.defaults;
        raw.box_width = 20.0;
        raw.wall_thickness = 50.0;
        let p = raw.normalized(&sc.limits, &sc.defaults);
        assert_eq!(p.wall_thickness, 18.0);
    }

    #[test]
    fn scenario_lookup_rejects_unknown_names() {
        assert!(Scenario::by_name("no_such_page").is_none());
    }

    #[test]
    fn scenario_defaults_are_pinned() {
        let gated = Scenario::gated_membrane().defaults;
        assert_eq!(gated.box_height, 60.0);
        assert_eq!(gated.diffusion_sd, 0.3);
        assert_eq!(
            gated.gating,
            Gating::Channel {
                y_min: -10.0,
                y_max: 10.0
            }
        );

        let resting = Scenario::resting_potential().defaults;
        assert_eq!(resting.total_time, 2400.0);
        assert_eq!(resting.num_particles, 140);
        assert_eq!(resting.init, InitMode::SplitChannelBand { left_frac: 0.65 });
        assert_eq!(
            resting.field,
            FieldMode::PointCharge {
                x: -80.0,
                y: 0.0,
                strength: 0.1
            }
        );
        let depol = resting.depol.unwrap();
        assert_eq!(depol.strength, 0.2);

        let goldman = Scenario::two_ion_goldman().defaults;
        assert_eq!(
            goldman.field,
            FieldMode::PlanarWall {
                x: -45.0,
                strength: 0.1
            }
        );
        assert_eq!(
            goldman.gating,
            Gating::PerSpecies {
                a: (30.0, 31.0),
                b: (-40.0, -10.0)
            }
        );
        assert_eq!(goldman.trace, TraceMode::PerSpecies { goldman: true });

        // Every scenario's defaults already satisfy their own limits.
        for name in [
            "pure_diffusion",
            "gated_membrane",
            "two_species_membrane",
            "field_comparison",
            "crowded_drift",
            "two_species_drift",
            "resting_potential",
            "two_ion_point",
            "two_ion_wall",
            "two_ion_goldman",
        ] {
            let sc = Scenario::by_name(name).unwrap();
            let normalized = sc.defaults.normalized(&sc.limits, &sc.defaults);
            assert_eq!(normalized, sc.defaults, "{name} defaults out of range");
        }
    }
}
