//! Euler-Maruyama particle integrator: Brownian diffusion, optional
//! electrostatic drift, optional O(N^2) pairwise repulsion, and membrane
//! channel gating, all advanced inside a rectangular box split by a thin
//! vertical wall.
//!
//! The per-frame, per-particle operation order is a determinism contract:
//! repulsion is accumulated against the previous frame for every particle
//! before any position is written, then each particle draws its x noise
//! before its y noise from the one shared generator. Reordering any of it
//! changes every trajectory downstream of the first draw.

use crate::params::{clampf, DepolWindow, FieldMode, Gating, InitMode, SimParams, TraceMode};
use crate::rng::Rng;
use crate::stats;

const EPS: f64 = 1e-3;

/// Voltage-proxy traces recorded while integrating, one value per frame.
pub enum Traces {
    Single {
        v: Vec<f32>,
    },
    PerSpecies {
        va: Vec<f32>,
        vb: Vec<f32>,
        total: Vec<f32>,
        goldman: Option<Vec<f32>>,
    },
}

/// A finished trajectory. Positions are dense, indexed
/// `frame * num_particles + particle`; nothing mutates the buffers after
/// `simulate` returns — a parameter change means a fresh run.
pub struct SimResult {
    pub params: SimParams,
    pub frames: usize,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub t: Vec<f32>,
    pub types: Option<Vec<u8>>,
    pub charges: Option<Vec<i8>>,
    pub left_wall: f64,
    pub right_wall: f64,
    pub traces: Option<Traces>,
}

impl SimResult {
    pub fn frame_x(&self, frame: usize) -> &[f32] {
        let n = self.params.num_particles;
        let f = frame.min(self.frames - 1);
        &self.x[f * n..(f + 1) * n]
    }

    pub fn frame_y(&self, frame: usize) -> &[f32] {
        let n = self.params.num_particles;
        let f = frame.min(self.frames - 1);
        &self.y[f * n..(f + 1) * n]
    }
}

pub fn frame_count(total_time: f64, dt: f64) -> usize {
    ((total_time / dt).floor() as usize).max(2)
}

/// Playback cursor over a precomputed trajectory. The host advances it
/// from its animation callback; pausing is simply not advancing.
#[derive(Default)]
pub struct Playhead {
    pos: f64,
}

impl Playhead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rewind(&mut self) {
        self.pos = 0.0;
    }

    /// Advance by wall-clock seconds at `rate` frames per second and
    /// return the frame to display. Wraps modulo the trajectory length.
    pub fn advance(&mut self, elapsed_seconds: f64, rate: f64, frames: usize) -> usize {
        self.pos += elapsed_seconds * rate;
        if frames > 0 && self.pos >= frames as f64 {
            self.pos %= frames as f64;
        }
        self.frame(frames)
    }

    pub fn frame(&self, frames: usize) -> usize {
        if frames == 0 {
            return 0;
        }
        clampf(self.pos.floor(), 0.0, (frames - 1) as f64) as usize
    }
}

// Channel window a particle of the given type is allowed through. Open
// gating reads as a full-height window.
fn gate_window(gating: &Gating, ty: u8, half_h: f64) -> (f64, f64) {
    match *gating {
        Gating::Open => (-half_h, half_h),
        Gating::Channel { y_min, y_max } => (y_min, y_max),
        Gating::PerSpecies { a, b } => {
            if ty == 0 {
                a
            } else {
                b
            }
        }
    }
}

struct Placement<'a> {
    x: &'a mut [f32],
    y: &'a mut [f32],
    types: Option<Vec<u8>>,
    charges: Option<Vec<i8>>,
}

// Seed frame 0. Draw order is scenario-specific and load-bearing: most
// layouts draw species inline right before the particle's coordinates,
// but the per-species split assigns every type up front and then places
// one species at a time.
fn place_initial(p: &SimParams, rng: &mut Rng, placement: &mut Placement<'_>) {
    let n = p.num_particles;
    let half_w = p.box_width / 2.0;
    let half_h = p.box_height / 2.0;
    let left_wall = -p.wall_thickness / 2.0;
    let right_wall = p.wall_thickness / 2.0;

    if let InitMode::SplitPerSpecies { left_frac } = p.init {
        let frac = p.species.map_or(1.0, |s| s.type0_fraction);
        let charged = p.species.is_some_and(|s| s.charged);
        let mut idx_a = Vec::new();
        let mut idx_b = Vec::new();
        let types = placement.types.get_or_insert_with(|| vec![0u8; n]);
        if charged {
            placement.charges = Some(vec![0i8; n]);
        }
        for pi in 0..n {
            let is_a = rng.next() < frac;
            types[pi] = u8::from(!is_a);
            if let Some(charges) = placement.charges.as_mut() {
                charges[pi] = if is_a { 1 } else { -1 };
            }
            if is_a {
                idx_a.push(pi);
            } else {
                idx_b.push(pi);
            }
        }
        for (indices, ty) in [(idx_a, 0u8), (idx_b, 1u8)] {
            let (y_min, y_max) = gate_window(&p.gating, ty, half_h);
            let n_left = (indices.len() as f64 * left_frac).floor() as usize;
            for (j, &pi) in indices.iter().enumerate() {
                let x0 = if j < n_left {
                    rng.uniform(-half_w + 1.0, left_wall - 1.0)
                } else {
                    rng.uniform(right_wall + 1.0, half_w - 1.0)
                };
                placement.x[pi] = x0 as f32;
                placement.y[pi] = rng.uniform(y_min, y_max) as f32;
            }
        }
        return;
    }

    if let Some(species) = p.species {
        placement.types = Some(vec![0u8; n]);
        if species.charged {
            placement.charges = Some(vec![0i8; n]);
        }
    }

    let n_left = match p.init {
        InitMode::SplitChannelBand { left_frac } => (n as f64 * left_frac).floor() as usize,
        _ => 0,
    };

    for pi in 0..n {
        if let Some(species) = p.species {
            let is_a = rng.next() < species.type0_fraction;
            if let Some(types) = placement.types.as_mut() {
                types[pi] = u8::from(!is_a);
            }
            if let Some(charges) = placement.charges.as_mut() {
                charges[pi] = if is_a { 1 } else { -1 };
            }
        }
        match p.init {
            InitMode::Cluster { sd } => {
                placement.x[pi] = rng.normal(0.0, sd) as f32;
                placement.y[pi] = rng.normal(0.0, sd) as f32;
            }
            InitMode::LeftHalf => {
                placement.x[pi] = rng.uniform(-half_w + 1.0, 0.0) as f32;
                placement.y[pi] = rng.uniform(-half_h + 1.0, half_h - 1.0) as f32;
            }
            InitMode::LeftCompartment => {
                placement.x[pi] = rng.uniform(-half_w + 1.0, left_wall - 1.0) as f32;
                placement.y[pi] = rng.uniform(-half_h + 1.0, half_h - 1.0) as f32;
            }
            InitMode::RightCompartment => {
                placement.x[pi] = rng.uniform(right_wall + 1.0, half_w - 1.0) as f32;
                placement.y[pi] = rng.uniform(-half_h + 1.0, half_h - 1.0) as f32;
            }
            InitMode::SplitChannelBand { .. } => {
                let ty = placement.types.as_ref().map_or(0, |t| t[pi]);
                let (y_min, y_max) = gate_window(&p.gating, ty, half_h);
                let x0 = if pi < n_left {
                    rng.uniform(-half_w + 1.0, left_wall - 1.0)
                } else {
                    rng.uniform(right_wall + 1.0, half_w - 1.0)
                };
                placement.x[pi] = x0 as f32;
                placement.y[pi] = rng.uniform(y_min - 5.0, y_max + 5.0) as f32;
            }
            InitMode::SplitPerSpecies { .. } => unreachable!("handled above"),
        }
    }
}

fn depol_frames(depol: &DepolWindow, frames: usize) -> (usize, usize) {
    let start = (((frames as f64) * depol.start_frac).floor() as usize).min(frames - 1);
    let end = (((frames as f64) * depol.end_frac).floor() as usize).clamp(start, frames - 1);
    (start, end)
}

/// Run the whole trajectory in one call. Expects normalized parameters;
/// the result owns its buffers and stays immutable afterwards.
pub fn simulate(params: &SimParams, seed: u32) -> SimResult {
    let p = *params;
    let n = p.num_particles;
    let frames = frame_count(p.total_time, p.dt);
    let half_h = p.box_height / 2.0;
    let left_wall = -p.wall_thickness / 2.0;
    let right_wall = p.wall_thickness / 2.0;
    let mut rng = Rng::new(seed);

    let mut x = vec![0.0f32; frames * n];
    let mut y = vec![0.0f32; frames * n];
    let mut t = vec![0.0f32; frames];
    for (i, ti) in t.iter_mut().enumerate() {
        *ti = (i as f64 * p.dt) as f32;
    }

    let mut placement = Placement {
        x: &mut x[..n],
        y: &mut y[..n],
        types: None,
        charges: None,
    };
    place_initial(&p, &mut rng, &mut placement);
    let types = placement.types;
    let charges = placement.charges;

    let mut traces = match p.trace {
        TraceMode::None => None,
        TraceMode::SingleSpecies => Some(Traces::Single {
            v: vec![0.0; frames],
        }),
        TraceMode::PerSpecies { goldman } => Some(Traces::PerSpecies {
            va: vec![0.0; frames],
            vb: vec![0.0; frames],
            total: vec![0.0; frames],
            goldman: goldman.then(|| vec![0.0; frames]),
        }),
    };

    let depol_window = p.depol.map(|d| depol_frames(&d, frames));

    let mut repel_x = vec![0.0f64; n];
    let mut repel_y = vec![0.0f64; n];

    for i in 1..frames {
        let prev = (i - 1) * n;
        let curr = i * n;

        // Repulsion reads a frozen snapshot of the previous frame; it must
        // finish for every particle before any new position is written.
        if p.repulsion_strength > 0.0 {
            for j in 0..n {
                let xj = f64::from(x[prev + j]);
                let yj = f64::from(y[prev + j]);
                let mut fx = 0.0;
                let mut fy = 0.0;
                for k in 0..n {
                    if k == j {
                        continue;
                    }
                    let dx = xj - f64::from(x[prev + k]);
                    let dy = yj - f64::from(y[prev + k]);
                    let inv = 1.0 / (dx * dx + dy * dy + EPS);
                    fx += dx * inv;
                    fy += dy * inv;
                }
                repel_x[j] = p.repulsion_strength * fx;
                repel_y[j] = p.repulsion_strength * fy;
            }
        }

        for pi in 0..n {
            let x_prev = f64::from(x[prev + pi]);
            let y_prev = f64::from(y[prev + pi]);
            let dxdt = rng.normal(0.0, p.diffusion_sd);
            let dydt = rng.normal(0.0, p.diffusion_sd);

            let charge = charges.as_ref().map_or(1.0, |c| f64::from(c[pi]));
            let (mut force_x, mut force_y) = match p.field {
                FieldMode::None => (0.0, 0.0),
                FieldMode::PointCharge { x: ax, y: ay, strength } => {
                    let dx = ax - x_prev;
                    let dy = ay - y_prev;
                    let dist = (dx * dx + dy * dy).sqrt() + EPS;
                    (
                        strength * charge * dx / dist,
                        strength * charge * dy / dist,
                    )
                }
                FieldMode::PlanarWall { x: ax, strength } => {
                    let dx = ax - x_prev;
                    let dist = dx.abs() + EPS;
                    (strength * charge * dx / dist, 0.0)
                }
            };

            if let (Some(depol), Some((start, end))) = (p.depol, depol_window) {
                if i >= start && i <= end {
                    if let FieldMode::PointCharge { x: ax, y: ay, .. } = p.field {
                        // Reversed-sign push away from the attractor.
                        let dx = x_prev - ax;
                        let dy = y_prev - ay;
                        let dist = (dx * dx + dy * dy).sqrt() + EPS;
                        force_x += depol.strength * dx / dist;
                        force_y += depol.strength * dy / dist;
                    }
                }
            }

            let (repulse_x, repulse_y) = if p.repulsion_strength > 0.0 {
                (repel_x[pi], repel_y[pi])
            } else {
                (0.0, 0.0)
            };

            let mut x_new = x_prev + (dxdt + force_x + repulse_x) * p.dt;
            let y_new = clampf(y_prev + (dydt + force_y + repulse_y) * p.dt, -half_h, half_h);

            if !matches!(p.gating, Gating::Open) {
                let crossing_left = x_prev < left_wall && x_new >= left_wall;
                let crossing_right = x_prev > right_wall && x_new <= right_wall;
                if crossing_left || crossing_right {
                    let ty = types.as_ref().map_or(0, |t| t[pi]);
                    let (g_min, g_max) = gate_window(&p.gating, ty, half_h);
                    // Gating tests the pre-step y: arriving at the channel
                    // this step does not yet grant passage.
                    if !(y_prev >= g_min && y_prev <= g_max) {
                        x_new = x_prev;
                    }
                }
            }

            x[curr + pi] = x_new as f32;
            y[curr + pi] = y_new as f32;
        }

        match traces.as_mut() {
            None => {}
            Some(Traces::Single { v }) => {
                let (left, right) =
                    stats::compartment_counts(&x[curr..curr + n], left_wall, right_wall);
                v[i] = stats::voltage_proxy(left, right) as f32;
            }
            Some(Traces::PerSpecies {
                va,
                vb,
                total,
                goldman,
            }) => {
                let types = types.as_deref().unwrap_or(&[]);
                let counts =
                    stats::species_counts(&x[curr..curr + n], types, left_wall, right_wall);
                va[i] = (counts.a_left as f64 - counts.a_right as f64) as f32;
                vb[i] = (counts.b_left as f64 - counts.b_right as f64) as f32;
                total[i] = va[i] + vb[i];
                if let Some(goldman) = goldman.as_mut() {
                    if let Gating::PerSpecies { a, b } = p.gating {
                        goldman[i] =
                            stats::goldman_log_ratio(a.1 - a.0, b.1 - b.0, &counts) as f32;
                    }
                }
            }
        }
    }

    SimResult {
        params: p,
        frames,
        x,
        y,
        t,
        types,
        charges,
        left_wall,
        right_wall,
        traces,
    }
}
