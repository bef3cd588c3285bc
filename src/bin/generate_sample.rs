use std::f64::consts::PI;
use std::path::Path;

use anyhow::Result;
use chrono::{Datelike, NaiveDate, Timelike};

use rusty_timescale::data::loader::save_file;
use rusty_timescale::data::model::{hourly_index, TagKey, TaggedTable};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

/// Slow weather fluctuation: AR(1) with a correlation time of a few days.
fn weather(n: usize, persistence: f64, rng: &mut SimpleRng) -> Vec<f64> {
    let mut state = 0.0;
    (0..n)
        .map(|_| {
            state = persistence * state + rng.gauss(0.0, (1.0 - persistence * persistence).sqrt());
            state
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    // Three years, 2020 being a leap year
    let start = NaiveDate::from_ymd_opt(2018, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("invalid start date"))?;
    let n = 365 * 24 * 2 + 366 * 24;
    let index = hourly_index(start, n);

    // (region, latitude factor, capacity in MW)
    let regions = [("DE", 0.8, 50_000.0), ("FR", 1.0, 40_000.0), ("ES", 1.3, 30_000.0)];

    let mut columns = Vec::new();
    for &(region, sun, capacity) in &regions {
        let clouds = weather(n, 0.97, &mut rng);
        let wind = weather(n, 0.99, &mut rng);

        let mut pv = Vec::with_capacity(n);
        let mut onshore = Vec::with_capacity(n);
        let mut load = Vec::with_capacity(n);
        for (t, ts) in index.iter().enumerate() {
            let season = (2.0 * PI * (ts.ordinal0() as f64 - 172.0) / 365.25).cos();
            let daylight = (PI * (ts.hour() as f64 - 6.0) / 12.0).sin().max(0.0);
            let weekday = ts.weekday().num_days_from_monday() as f64;

            let clear_sky = daylight * (0.6 + 0.4 * season) * sun;
            pv.push((capacity * 0.25 * clear_sky * (1.0 - 0.3 * clouds[t].abs())).max(0.0));

            let wind_cf = (0.3 - 0.1 * season + 0.15 * wind[t]).clamp(0.0, 1.0);
            onshore.push(capacity * 0.6 * wind_cf);

            let weekly = if weekday >= 5.0 { 0.85 } else { 1.0 };
            let daily = 1.0 + 0.15 * (2.0 * PI * (ts.hour() as f64 - 13.0) / 24.0).cos();
            load.push(capacity * (0.9 - 0.1 * season) * weekly * daily + rng.gauss(0.0, capacity * 0.01));
        }

        columns.push((TagKey::from([region, "pv"]), pv));
        columns.push((TagKey::from([region, "onshore"]), onshore));
        columns.push((TagKey::from([region, "load"]), load));
    }

    let table = TaggedTable::from_columns(index, ["region", "variable"], columns)?;

    let output_path = Path::new("sample_timeseries.parquet");
    save_file(output_path, &table)?;

    println!(
        "Wrote {} channels ({} hours each) to {}",
        table.n_columns(),
        table.len(),
        output_path.display()
    );
    Ok(())
}
