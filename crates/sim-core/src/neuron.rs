//! Three-neuron Izhikevich network with conductance-based synapses, and
//! the wall-clock runner that decouples the fixed-step solver from the
//! host's animation callbacks.
//!
//! Topology is purely parametric: A receives external drive, B listens to
//! A, C listens to B, and an optional C→A weight closes the loop. Making
//! a weight negative turns that projection inhibitory; no structural
//! change is ever needed.

use crate::ring::RingBuffer;
use crate::rng::Rng;

// Regular-spiking cell constants.
pub const CAP: f64 = 100.0;
pub const V_REST: f64 = -60.0;
pub const V_THRESH: f64 = -40.0;
pub const V_PEAK: f64 = 35.0;
pub const K_GAIN: f64 = 0.7;
pub const A_RECOV: f64 = 0.03;
pub const B_RECOV: f64 = -2.0;
pub const C_RESET: f64 = -50.0;
pub const D_JUMP: f64 = 100.0;

// Synapse constants.
pub const PSP_AMP: f64 = 1000.0;
pub const PSP_DECAY: f64 = 100.0;

/// Fixed solver step, in simulated milliseconds.
pub const SOLVER_DT: f64 = 0.01;
/// Coarser step at which history samples are pushed into the ring buffers.
pub const TRACE_SAMPLE_DT: f64 = 1.0;

/// External drive delivered to neuron A.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Drive {
    Constant { amp: f64 },
    /// Periodic square pulse: `amp` while `t mod period < width`, else 0.
    Pulse { period: f64, width: f64, amp: f64 },
}

impl Drive {
    pub fn current(&self, t: f64) -> f64 {
        match *self {
            Drive::Constant { amp } => amp,
            Drive::Pulse { period, width, amp } => {
                if period <= 0.0 || t % period < width {
                    amp
                } else {
                    0.0
                }
            }
        }
    }

    pub fn amp(&self) -> f64 {
        match *self {
            Drive::Constant { amp } | Drive::Pulse { amp, .. } => amp,
        }
    }

    pub fn with_amp(&self, amp: f64) -> Drive {
        match *self {
            Drive::Constant { .. } => Drive::Constant { amp },
            Drive::Pulse { period, width, .. } => Drive::Pulse { period, width, amp },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetParams {
    pub drive: Drive,
    pub w_ab: f64,
    pub w_bc: f64,
    pub w_ca: f64,
    pub e_a: f64,
    pub e_b: f64,
    pub e_c: f64,
}

pub struct Preset {
    pub key: &'static str,
    pub label: &'static str,
    pub params: NetParams,
}

pub static PRESETS: [Preset; 4] = [
    Preset {
        key: "n1",
        label: "N1: A -> B -> C",
        params: NetParams {
            drive: Drive::Constant { amp: 200.0 },
            w_ab: 80.0,
            w_bc: 80.0,
            w_ca: 0.0,
            e_a: 0.0,
            e_b: 0.0,
            e_c: 0.0,
        },
    },
    Preset {
        key: "n2",
        label: "N2: A -> B -| C",
        params: NetParams {
            drive: Drive::Constant { amp: 200.0 },
            w_ab: 80.0,
            w_bc: -120.0,
            w_ca: 0.0,
            e_a: 0.0,
            e_b: 300.0,
            e_c: 0.0,
        },
    },
    Preset {
        key: "n3",
        label: "N3: A -> B(inhib) -| C",
        params: NetParams {
            drive: Drive::Constant { amp: 200.0 },
            w_ab: 100.0,
            w_bc: -140.0,
            w_ca: 0.0,
            e_a: 0.0,
            e_b: 0.0,
            e_c: 0.0,
        },
    },
    Preset {
        key: "n4",
        label: "N4: A -> B -> C -> A",
        params: NetParams {
            drive: Drive::Constant { amp: 200.0 },
            w_ab: 70.0,
            w_bc: 70.0,
            w_ca: 70.0,
            e_a: 0.0,
            e_b: 0.0,
            e_c: 0.0,
        },
    },
];

pub fn preset(key: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.key == key)
}

/// Live network state, Euler-integrated in place at `SOLVER_DT`.
pub struct Izh3Net {
    pub params: NetParams,
    pub t: f64,
    pub v: [f32; 3],
    pub u: [f32; 3],
    pub g: [f32; 3],
    pub spike: [bool; 3],
    spike_prev: [bool; 3],
    rng: Rng,
}

impl Izh3Net {
    pub fn new(params: NetParams, seed: u32) -> Self {
        let mut net = Izh3Net {
            params,
            t: 0.0,
            v: [0.0; 3],
            u: [0.0; 3],
            g: [0.0; 3],
            spike: [false; 3],
            spike_prev: [false; 3],
            rng: Rng::new(seed),
        };
        net.reset();
        net
    }

    /// Back to initial conditions with a fresh jitter on the voltages.
    pub fn reset(&mut self) {
        self.t = 0.0;
        for j in 0..3 {
            self.v[j] = (V_REST + self.rng.next() * 5.0) as f32;
            self.u[j] = 0.0;
            self.g[j] = 0.0;
            self.spike[j] = false;
            self.spike_prev[j] = false;
        }
    }

    /// One fixed solver step for all three neurons.
    pub fn step(&mut self) {
        let input = [
            self.params.drive.current(self.t) + self.params.w_ca * f64::from(self.g[2])
                + self.params.e_a,
            self.params.w_ab * f64::from(self.g[0]) + self.params.e_b,
            self.params.w_bc * f64::from(self.g[1]) + self.params.e_c,
        ];

        self.spike = [false; 3];

        for j in 0..3 {
            let v = f64::from(self.v[j]);
            let u = f64::from(self.u[j]);
            let g = f64::from(self.g[j]);

            let dvdt = (K_GAIN * (v - V_REST) * (v - V_THRESH) - u + input[j]) / CAP;
            let dudt = A_RECOV * (B_RECOV * (v - V_REST) - u);
            // g chases the previous step's spike flag: a one-step synaptic
            // delay by construction.
            let spiked = if self.spike_prev[j] { PSP_AMP } else { 0.0 };
            let dgdt = (-g + spiked) / PSP_DECAY;

            self.v[j] = (v + dvdt * SOLVER_DT) as f32;
            self.u[j] = (u + dudt * SOLVER_DT) as f32;
            self.g[j] = (g + dgdt * SOLVER_DT) as f32;

            // Reset after the Euler update: overshoot clips to exactly c.
            if f64::from(self.v[j]) >= V_PEAK {
                self.v[j] = C_RESET as f32;
                self.u[j] += D_JUMP as f32;
                self.spike[j] = true;
            }
        }

        self.spike_prev = self.spike;
        self.t += SOLVER_DT;
    }
}

/// One ring buffer per plotted channel.
pub struct Channels {
    pub t: RingBuffer,
    pub v: [RingBuffer; 3],
    pub g: [RingBuffer; 3],
}

impl Channels {
    fn new(capacity: usize) -> Self {
        Channels {
            t: RingBuffer::new(capacity),
            v: [
                RingBuffer::new(capacity),
                RingBuffer::new(capacity),
                RingBuffer::new(capacity),
            ],
            g: [
                RingBuffer::new(capacity),
                RingBuffer::new(capacity),
                RingBuffer::new(capacity),
            ],
        }
    }
}

// Wall-clock elapsed time is clamped per tick so a backgrounded tab does
// not queue an unbounded backlog.
const MAX_ELAPSED_MS: f64 = 100.0;
const MAX_STEPS_PER_TICK: usize = 5000;

/// Accumulator-driven runner: call `tick` with elapsed wall-clock
/// milliseconds from any host loop (animation frame, timer, or a test) and
/// it advances the fixed-step solver and the coarser trace sampler.
pub struct NetRunner {
    pub net: Izh3Net,
    pub channels: Channels,
    accumulator: f64,
    next_sample_time: f64,
    // Max voltage reached since the last sample, with spiking steps pinned
    // to the peak so the coarse trace never misses a spike.
    v_sample_max: [f64; 3],
}

impl NetRunner {
    pub fn new(params: NetParams, seed: u32, history_len: usize) -> Self {
        let mut runner = NetRunner {
            net: Izh3Net::new(params, seed),
            channels: Channels::new(history_len),
            accumulator: 0.0,
            next_sample_time: 0.0,
            v_sample_max: [0.0; 3],
        };
        runner.seed_history();
        runner
    }

    fn seed_history(&mut self) {
        self.channels.t.clear(0.0);
        for j in 0..3 {
            self.channels.v[j].clear(V_REST as f32);
            self.channels.g[j].clear(0.0);
        }
        self.accumulator = 0.0;
        for j in 0..3 {
            self.v_sample_max[j] = f64::from(self.net.v[j]);
        }
        self.push_sample(self.net.t);
        self.next_sample_time = self.net.t + TRACE_SAMPLE_DT;
    }

    fn push_sample(&mut self, sample_time: f64) {
        self.channels.t.push(sample_time as f32);
        for j in 0..3 {
            self.channels.v[j].push(self.v_sample_max[j] as f32);
            self.channels.g[j].push(self.net.g[j]);
        }
        for j in 0..3 {
            self.v_sample_max[j] = f64::from(self.net.v[j]);
        }
    }

    /// Advance by `elapsed_ms` of wall-clock time (one simulated
    /// millisecond per real millisecond). Returns solver steps taken. If
    /// the per-tick cap is hit, the leftover backlog is discarded.
    pub fn tick(&mut self, elapsed_ms: f64) -> usize {
        self.accumulator += elapsed_ms.min(MAX_ELAPSED_MS);
        let mut steps = 0;
        while self.accumulator >= SOLVER_DT && steps < MAX_STEPS_PER_TICK {
            self.net.step();
            for j in 0..3 {
                let v = if self.net.spike[j] {
                    V_PEAK
                } else {
                    f64::from(self.net.v[j])
                };
                if v > self.v_sample_max[j] {
                    self.v_sample_max[j] = v;
                }
            }
            while self.net.t >= self.next_sample_time {
                let sample_time = self.next_sample_time;
                self.push_sample(sample_time);
                self.next_sample_time += TRACE_SAMPLE_DT;
            }
            self.accumulator -= SOLVER_DT;
            steps += 1;
        }
        if steps >= MAX_STEPS_PER_TICK {
            self.accumulator = 0.0;
        }
        steps
    }

    /// Reset state and history; parameters are kept.
    pub fn reset(&mut self) {
        self.net.reset();
        self.seed_history();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solo_params(amp: f64) -> NetParams {
        NetParams {
            drive: Drive::Constant { amp },
            w_ab: 0.0,
            w_bc: 0.0,
            w_ca: 0.0,
            e_a: 0.0,
            e_b: 0.0,
            e_c: 0.0,
        }
    }

    #[test]
    fn driven_neuron_spikes_and_obeys_the_reset_law() {
        let mut net = Izh3Net::new(solo_params(200.0), 3);
        let mut spikes = 0;
        for _ in 0..200_000 {
            net.step();
            // Post-step voltage never sits at or above the peak.
            assert!(f64::from(net.v[0]) < V_PEAK);
            if net.spike[0] {
                spikes += 1;
                assert_eq!(f64::from(net.v[0]), C_RESET);
            }
        }
        assert!(spikes > 10, "expected sustained spiking, got {spikes}");
    }

    #[test]
    fn undriven_neuron_stays_subthreshold() {
        let mut net = Izh3Net::new(solo_params(0.0), 3);
        for _ in 0..100_000 {
            net.step();
            assert!(!net.spike[1]);
            assert!(!net.spike[2]);
        }
    }

    #[test]
    fn conductance_rises_one_step_after_a_spike() {
        let mut net = Izh3Net::new(solo_params(400.0), 5);
        loop {
            net.step();
            if net.spike[0] {
                break;
            }
        }
        // The spike is only visible to g on the following step.
        let g_at_spike = f64::from(net.g[0]);
        net.step();
        assert!(f64::from(net.g[0]) > g_at_spike);
    }

    #[test]
    fn feedforward_coupling_recruits_downstream_neurons() {
        let preset = preset("n1").unwrap();
        let mut net = Izh3Net::new(preset.params, 11);
        let mut spiked = [false; 3];
        for _ in 0..500_000 {
            net.step();
            for j in 0..3 {
                spiked[j] |= net.spike[j];
            }
        }
        assert!(spiked[0] && spiked[1] && spiked[2], "{spiked:?}");
    }

    #[test]
    fn same_seed_reproduces_the_voltage_path() {
        let mut a = Izh3Net::new(solo_params(200.0), 42);
        let mut b = Izh3Net::new(solo_params(200.0), 42);
        for _ in 0..10_000 {
            a.step();
            b.step();
            assert_eq!(a.v, b.v);
            assert_eq!(a.u, b.u);
            assert_eq!(a.g, b.g);
        }
    }

    #[test]
    fn jittered_start_is_near_rest() {
        let net = Izh3Net::new(solo_params(0.0), 77);
        for j in 0..3 {
            let v = f64::from(net.v[j]);
            assert!((V_REST..V_REST + 5.0).contains(&v));
        }
    }

    #[test]
    fn pulse_drive_gates_on_and_off() {
        let d = Drive::Pulse {
            period: 1000.0,
            width: 300.0,
            amp: 200.0,
        };
        assert_eq!(d.current(0.0), 200.0);
        assert_eq!(d.current(299.9), 200.0);
        assert_eq!(d.current(300.0), 0.0);
        assert_eq!(d.current(999.0), 0.0);
        assert_eq!(d.current(1000.0), 200.0);
        assert_eq!(d.current(1250.0), 200.0);
    }

    #[test]
    fn runner_paces_steps_by_wall_clock() {
        let mut runner = NetRunner::new(solo_params(200.0), 1, 64);
        let steps = runner.tick(16.0);
        // 16 ms at dt = 0.01, give or take accumulator rounding.
        assert!((1599..=1600).contains(&steps), "steps = {steps}");
        assert!((runner.net.t - 16.0).abs() < 2.0 * SOLVER_DT);
        // One trace sample per simulated millisecond plus the seed sample.
        let samples = runner.channels.t.count();
        assert!((16..=17).contains(&samples), "samples = {samples}");
    }

    #[test]
    fn runner_caps_steps_and_discards_backlog() {
        let mut runner = NetRunner::new(solo_params(200.0), 1, 64);
        // 100 ms of backlog is 10000 steps, over the per-tick cap.
        let steps = runner.tick(5000.0);
        assert_eq!(steps, MAX_STEPS_PER_TICK);
        // Backlog was discarded: the next small tick runs normally.
        let steps = runner.tick(1.0);
        assert!((99..=100).contains(&steps), "steps = {steps}");
    }

    #[test]
    fn trace_samples_catch_spike_peaks() {
        let mut runner = NetRunner::new(solo_params(300.0), 9, 2048);
        for _ in 0..40 {
            runner.tick(100.0);
        }
        let v = &runner.channels.v[0];
        let mut peak: f32 = f32::MIN;
        for i in 0..v.count() {
            peak = peak.max(v.at(i));
        }
        assert_eq!(f64::from(peak), V_PEAK);
    }

    #[test]
    fn reset_rewinds_clock_and_history() {
        let mut runner = NetRunner::new(solo_params(200.0), 21, 128);
        runner.tick(50.0);
        assert!(runner.net.t > 0.0);
        runner.reset();
        assert_eq!(runner.net.t, 0.0);
        assert_eq!(runner.channels.t.count(), 1);
        assert_eq!(runner.channels.t.at(0), 0.0);
    }

    #[test]
    fn presets_cover_the_four_topologies() {
        assert_eq!(PRESETS.len(), 4);
        assert!(preset("n2").unwrap().params.w_bc < 0.0);
        assert!(preset("n4").unwrap().params.w_ca > 0.0);
        assert!(preset("nope").is_none());
    }
}
