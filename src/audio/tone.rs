use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const BEEP_ON_SECS: f32 = 0.4;
const BEEP_PERIOD_SECS: f32 = 0.6;

/// Pulsed sine alarm tone. Beeps for 400ms out of every 600ms; the optional
/// brown-noise bed softens the "nature" sound.
pub struct AlarmTone {
    frequency: f32,
    num_sample: usize,
    noise: Option<NoiseBed>,
}

struct NoiseBed {
    last_value: f32,
    rng: StdRng,
}

impl NoiseBed {
    fn next(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        self.last_value = ((self.last_value + white * 0.02).clamp(-1.0, 1.0)) * 0.9999;
        self.last_value
    }
}

impl AlarmTone {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            num_sample: 0,
            noise: None,
        }
    }

    pub fn with_noise_bed(frequency: f32) -> Self {
        Self {
            noise: Some(NoiseBed {
                last_value: 0.0,
                rng: StdRng::from_entropy(),
            }),
            ..Self::new(frequency)
        }
    }
}

impl Iterator for AlarmTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.num_sample = self.num_sample.wrapping_add(1);
        let t = self.num_sample as f32 / SAMPLE_RATE as f32;

        let beep = if t % BEEP_PERIOD_SECS < BEEP_ON_SECS {
            (2.0 * PI * self.frequency * t).sin() * 0.25
        } else {
            0.0
        };
        let bed = self.noise.as_mut().map(|n| n.next() * 0.1).unwrap_or(0.0);

        Some(beep + bed)
    }
}

impl Source for AlarmTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
