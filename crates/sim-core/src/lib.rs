//! Simulation core for the membrane electro-diffusion and spiking-network
//! explorer pages.
//!
//! Everything numerical lives here: the seeded PRNG, the parameter
//! normalizer, the particle trajectory integrator with membrane gating,
//! the per-frame occupancy statistics, and the three-neuron Izhikevich
//! network with its wall-clock runner. The JS side owns the DOM, canvas
//! drawing, and input widgets; it talks to this crate through the
//! [`ParticleSim`] and [`NeuronNet`] session objects and consumes plain
//! typed arrays.

mod neuron;
mod params;
mod particle;
mod ring;
mod rng;
mod stats;

pub use neuron::{
    preset, Channels, Drive, Izh3Net, NetParams, NetRunner, Preset, PRESETS, SOLVER_DT,
    TRACE_SAMPLE_DT, V_PEAK, V_REST,
};
pub use params::{
    normalize_channel, DepolWindow, FieldMode, Gating, InitMode, Limits, Scenario, SimParams,
    SpeciesParams, TraceMode,
};
pub use particle::{frame_count, simulate, Playhead, SimResult, Traces};
pub use ring::RingBuffer;
pub use rng::Rng;
pub use stats::{compartment_counts, goldman_log_ratio, species_counts, voltage_proxy, SpeciesCounts};

use js_sys::{Array, Float32Array, Int8Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

#[cfg(feature = "console_error_panic_hook")]
#[wasm_bindgen(start)]
fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

const SCENARIO_NAMES: [&str; 10] = [
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
];

/// A precomputed particle trajectory plus its playback cursor.
///
/// Construction runs the whole simulation synchronously; changing a
/// parameter means constructing a fresh session. Playback afterwards is a
/// read-only scan driven by `advance_playhead`.
#[wasm_bindgen]
pub struct ParticleSim {
    result: SimResult,
    playhead: Playhead,
    seed: u32,
}

#[wasm_bindgen]
impl ParticleSim {
    /// `overrides` is a plain JS object; missing or non-numeric fields
    /// keep the scenario default, and every value is clamped into range
    /// before simulating.
    #[wasm_bindgen(constructor)]
    pub fn new(scenario: &str, overrides: JsValue, seed: u32) -> Result<ParticleSim, JsValue> {
        let sc = Scenario::by_name(scenario)
            .ok_or_else(|| JsValue::from_str(&format!("unknown scenario: {scenario}")))?;
        let raw = apply_overrides(sc.defaults, &overrides);
        let normalized = raw.normalized(&sc.limits, &sc.defaults);
        Ok(ParticleSim {
            result: simulate(&normalized, seed),
            playhead: Playhead::new(),
            seed,
        })
    }

    pub fn scenario_names() -> Array {
        SCENARIO_NAMES.iter().map(|n| JsValue::from_str(n)).collect()
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn frames(&self) -> u32 {
        self.result.frames as u32
    }

    pub fn num_particles(&self) -> u32 {
        self.result.params.num_particles as u32
    }

    pub fn dt(&self) -> f64 {
        self.result.params.dt
    }

    pub fn total_time(&self) -> f64 {
        self.result.params.total_time
    }

    /// Flat positions, indexed `frame * num_particles + particle`.
    pub fn x(&self) -> Float32Array {
        Float32Array::from(self.result.x.as_slice())
    }

    pub fn y(&self) -> Float32Array {
        Float32Array::from(self.result.y.as_slice())
    }

    /// Per-frame time axis.
    pub fn t(&self) -> Float32Array {
        Float32Array::from(self.result.t.as_slice())
    }

    /// Per-particle species (empty for single-species scenarios).
    pub fn types(&self) -> Uint8Array {
        match &self.result.types {
            Some(types) => Uint8Array::from(types.as_slice()),
            None => Uint8Array::new_with_length(0),
        }
    }

    /// Per-particle signed charge (empty unless the scenario is charged).
    pub fn charges(&self) -> Int8Array {
        match &self.result.charges {
            Some(charges) => Int8Array::from(charges.as_slice()),
            None => Int8Array::new_with_length(0),
        }
    }

    /// Wall positions, box extents, channel windows, and the attractor, as
    /// one plain object for the renderer.
    pub fn geometry(&self) -> Object {
        let o = Object::new();
        let p = &self.result.params;
        set_num(&o, "leftWall", self.result.left_wall);
        set_num(&o, "rightWall", self.result.right_wall);
        set_num(&o, "boxWidth", p.box_width);
        set_num(&o, "boxHeight", p.box_height);
        match p.gating {
            Gating::Open => {}
            Gating::Channel { y_min, y_max } => {
                set_num(&o, "channelYMin", y_min);
                set_num(&o, "channelYMax", y_max);
            }
            Gating::PerSpecies { a, b } => {
                set_num(&o, "type0YMin", a.0);
                set_num(&o, "type0YMax", a.1);
                set_num(&o, "type1YMin", b.0);
                set_num(&o, "type1YMax", b.1);
            }
        }
        match p.field {
            FieldMode::None => {}
            FieldMode::PointCharge { x, y, .. } => {
                set_num(&o, "negX", x);
                set_num(&o, "negY", y);
            }
            FieldMode::PlanarWall { x, .. } => {
                set_num(&o, "negX", x);
            }
        }
        o
    }

    /// Voltage-proxy trace by name: `v`, `va`, `vb`, `vtotal`, `goldman`.
    /// Unrecorded traces come back empty.
    pub fn trace(&self, name: &str) -> Float32Array {
        let series: Option<&[f32]> = match (&self.result.traces, name) {
            (Some(Traces::Single { v }), "v") => Some(v),
            (Some(Traces::PerSpecies { va, .. }), "va") => Some(va),
            (Some(Traces::PerSpecies { vb, .. }), "vb") => Some(vb),
            (Some(Traces::PerSpecies { total, .. }), "vtotal") => Some(total),
            (Some(Traces::PerSpecies { goldman, .. }), "goldman") => goldman.as_deref(),
            _ => None,
        };
        match series {
            Some(values) => Float32Array::from(values),
            None => Float32Array::new_with_length(0),
        }
    }

    /// Compartment occupancy at one frame, split by species when present.
    pub fn counts(&self, frame: u32) -> Object {
        let o = Object::new();
        let frame = (frame as usize).min(self.result.frames - 1);
        let xs = self.result.frame_x(frame);
        match &self.result.types {
            Some(types) => {
                let c = species_counts(xs, types, self.result.left_wall, self.result.right_wall);
                set_num(&o, "aLeft", c.a_left as f64);
                set_num(&o, "aRight", c.a_right as f64);
                set_num(&o, "bLeft", c.b_left as f64);
                set_num(&o, "bRight", c.b_right as f64);
            }
            None => {
                let (left, right) =
                    compartment_counts(xs, self.result.left_wall, self.result.right_wall);
                set_num(&o, "left", left as f64);
                set_num(&o, "right", right as f64);
            }
        }
        o
    }

    /// Advance playback by wall-clock seconds at `rate` frames per second
    /// and return the frame to display. The host simply stops calling this
    /// while paused.
    pub fn advance_playhead(&mut self, elapsed_seconds: f64, rate: f64) -> u32 {
        self.playhead.advance(elapsed_seconds, rate, self.result.frames) as u32
    }

    pub fn frame(&self) -> u32 {
        self.playhead.frame(self.result.frames) as u32
    }

    pub fn rewind(&mut self) {
        self.playhead.rewind();
    }
}

/// Live three-neuron network session. The host calls `tick` from its
/// animation loop with elapsed wall-clock milliseconds and redraws from
/// the scalar getters and ring-buffer snapshots.
#[wasm_bindgen]
pub struct NeuronNet {
    runner: NetRunner,
}

#[wasm_bindgen]
impl NeuronNet {
    #[wasm_bindgen(constructor)]
    pub fn new(history_len: u32, seed: u32) -> NeuronNet {
        NeuronNet {
            runner: NetRunner::new(PRESETS[0].params, seed, (history_len as usize).max(2)),
        }
    }

    pub fn preset_keys() -> Array {
        PRESETS.iter().map(|p| JsValue::from_str(p.key)).collect()
    }

    pub fn preset_label(key: &str) -> JsValue {
        match preset(key) {
            Some(p) => JsValue::from_str(p.label),
            None => JsValue::UNDEFINED,
        }
    }

    /// Swap in a named parameter set; state and history keep running.
    pub fn apply_preset(&mut self, key: &str) -> bool {
        match preset(key) {
            Some(p) => {
                self.runner.net.params = p.params;
                true
            }
            None => false,
        }
    }

    /// Field-wise parameter update from a plain JS object; missing or
    /// non-finite fields are ignored.
    pub fn set_params(&mut self, params: JsValue) {
        if !params.is_object() {
            return;
        }
        let p = &mut self.runner.net.params;
        if let Some(v) = get_f64(&params, "iAmp") {
            if v.is_finite() {
                p.drive = p.drive.with_amp(v);
            }
        }
        if let Some(v) = get_f64(&params, "pulsePeriod") {
            if v.is_finite() && v > 0.0 {
                let width = match p.drive {
                    Drive::Pulse { width, .. } => width.min(v),
                    Drive::Constant { .. } => v / 2.0,
                };
                p.drive = Drive::Pulse {
                    period: v,
                    width,
                    amp: p.drive.amp(),
                };
            }
        }
        if let Some(v) = get_f64(&params, "pulseWidth") {
            if v.is_finite() && v >= 0.0 {
                if let Drive::Pulse { period, amp, .. } = p.drive {
                    p.drive = Drive::Pulse {
                        period,
                        width: v.min(period),
                        amp,
                    };
                }
            }
        }
        if let Some(v) = get_f64(&params, "wAB") {
            if v.is_finite() {
                p.w_ab = v;
            }
        }
        if let Some(v) = get_f64(&params, "wBC") {
            if v.is_finite() {
                p.w_bc = v;
            }
        }
        if let Some(v) = get_f64(&params, "wCA") {
            if v.is_finite() {
                p.w_ca = v;
            }
        }
        if let Some(v) = get_f64(&params, "eA") {
            if v.is_finite() {
                p.e_a = v;
            }
        }
        if let Some(v) = get_f64(&params, "eB") {
            if v.is_finite() {
                p.e_b = v;
            }
        }
        if let Some(v) = get_f64(&params, "eC") {
            if v.is_finite() {
                p.e_c = v;
            }
        }
    }

    /// Returns solver steps taken this tick.
    pub fn tick(&mut self, elapsed_ms: f64) -> u32 {
        self.runner.tick(elapsed_ms) as u32
    }

    pub fn reset(&mut self) {
        self.runner.reset();
    }

    pub fn time(&self) -> f64 {
        self.runner.net.t
    }

    pub fn v(&self) -> Float32Array {
        Float32Array::from(self.runner.net.v.as_slice())
    }

    pub fn u(&self) -> Float32Array {
        Float32Array::from(self.runner.net.u.as_slice())
    }

    pub fn g(&self) -> Float32Array {
        Float32Array::from(self.runner.net.g.as_slice())
    }

    pub fn spikes(&self) -> Uint8Array {
        let flags: Vec<u8> = self.runner.net.spike.iter().map(|&s| u8::from(s)).collect();
        Uint8Array::from(flags.as_slice())
    }

    pub fn trace_len(&self) -> u32 {
        self.runner.channels.t.count() as u32
    }

    /// History snapshot, oldest to newest: `t`, `vA`..`vC`, `gA`..`gC`.
    pub fn trace(&self, channel: &str) -> Float32Array {
        let rb = match channel {
            "t" => &self.runner.channels.t,
            "vA" => &self.runner.channels.v[0],
            "vB" => &self.runner.channels.v[1],
            "vC" => &self.runner.channels.v[2],
            "gA" => &self.runner.channels.g[0],
            "gB" => &self.runner.channels.g[1],
            "gC" => &self.runner.channels.g[2],
            _ => return Float32Array::new_with_length(0),
        };
        ring_snapshot(rb)
    }
}

fn ring_snapshot(rb: &RingBuffer) -> Float32Array {
    let mut out = Vec::with_capacity(rb.count());
    for i in 0..rb.count() {
        out.push(rb.at(i));
    }
    Float32Array::from(out.as_slice())
}

// Overlay UI-provided fields onto the scenario defaults. Only fields the
// scenario's strategy shape actually carries are consulted; the normalizer
// does all range repair afterwards.
fn apply_overrides(mut p: SimParams, obj: &JsValue) -> SimParams {
    if !obj.is_object() {
        return p;
    }
    if let Some(v) = get_f64(obj, "T") {
        p.total_time = v;
    }
    if let Some(v) = get_f64(obj, "dt") {
        p.dt = v;
    }
    if let Some(v) = get_f64(obj, "numParticles") {
        if v.is_finite() && v >= 0.0 {
            p.num_particles = v.round() as usize;
        }
    }
    if let Some(v) = get_f64(obj, "boxWidth") {
        p.box_width = v;
    }
    if let Some(v) = get_f64(obj, "boxHeight") {
        p.box_height = v;
    }
    if let Some(v) = get_f64(obj, "wallThickness") {
        p.wall_thickness = v;
    }
    if let Some(v) = get_f64(obj, "diffusionSd") {
        p.diffusion_sd = v;
    }
    if let Some(v) = get_f64(obj, "repulsionStrength") {
        p.repulsion_strength = v;
    }

    match &mut p.field {
        FieldMode::None => {}
        FieldMode::PointCharge { x, y, strength } => {
            if let Some(v) = get_f64(obj, "negX") {
                *x = v;
            }
            if let Some(v) = get_f64(obj, "negY") {
                *y = v;
            }
            if let Some(v) = get_f64(obj, "electricStrength") {
                *strength = v;
            }
        }
        FieldMode::PlanarWall { x, strength } => {
            if let Some(v) = get_f64(obj, "negX") {
                *x = v;
            }
            if let Some(v) = get_f64(obj, "electricStrength") {
                *strength = v;
            }
        }
    }

    match &mut p.gating {
        Gating::Open => {}
        Gating::Channel { y_min, y_max } => {
            if let Some(v) = get_f64(obj, "channelYMin") {
                *y_min = v;
            }
            if let Some(v) = get_f64(obj, "channelYMax") {
                *y_max = v;
            }
        }
        Gating::PerSpecies { a, b } => {
            if let Some(v) = get_f64(obj, "type0YMin") {
                a.0 = v;
            }
            if let Some(v) = get_f64(obj, "type0YMax") {
                a.1 = v;
            }
            if let Some(v) = get_f64(obj, "type1YMin") {
                b.0 = v;
            }
            if let Some(v) = get_f64(obj, "type1YMax") {
                b.1 = v;
            }
        }
    }

    match &mut p.init {
        InitMode::Cluster { sd } => {
            if let Some(v) = get_f64(obj, "initClusterSd") {
                *sd = v;
            }
        }
        InitMode::SplitChannelBand { left_frac } | InitMode::SplitPerSpecies { left_frac } => {
            if let Some(v) = get_f64(obj, "initialLeftFrac") {
                *left_frac = v;
            }
        }
        _ => {}
    }

    if let Some(species) = &mut p.species {
        if let Some(v) = get_f64(obj, "type0Fraction") {
            species.type0_fraction = v;
        }
    }

    if let Some(depol) = &mut p.depol {
        if let Some(v) = get_f64(obj, "electricStrengthDepol") {
            depol.strength = v;
        }
        if let Some(v) = get_f64(obj, "depolStartFrac") {
            depol.start_frac = v;
        }
        if let Some(v) = get_f64(obj, "depolEndFrac") {
            depol.end_frac = v;
        }
    }

    p
}

fn get_f64(obj: &JsValue, key: &str) -> Option<f64> {
    let v = Reflect::get(obj, &JsValue::from_str(key)).ok()?;
    if v.is_undefined() || v.is_null() {
        return None;
    }
    v.as_f64()
}

fn set_num(o: &Object, key: &str, value: f64) {
    let _ = Reflect::set(o, &JsValue::from_str(key), &JsValue::from_f64(value));
}
