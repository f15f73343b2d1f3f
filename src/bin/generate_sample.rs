use std::path::PathBuf;

use anyhow::{Context, Result};

use batch_scorer::data::format::to_csv;
use batch_scorer::data::model::{Table, Value};
use batch_scorer::predictor::{LogisticRegression, ModelArtifact};
use batch_scorer::registry::FsModelRegistry;

/// Seeded splitmix64 stream; the same seed always yields the same sample.
struct SampleRng(u64);

impl SampleRng {
    /// Uniform in `[low, high)`.
    fn range(&mut self, low: f64, high: f64) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        let unit = (z >> 11) as f64 / (1u64 << 53) as f64;
        low + (high - low) * unit
    }
}

/// Usage: `generate_sample [registry_root] [input_csv]`
fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let registry_root = PathBuf::from(args.next().unwrap_or_else(|| "./models".to_string()));
    let input_path = PathBuf::from(args.next().unwrap_or_else(|| "input_table.csv".to_string()));

    // Churn-style classifier: long tenure lowers risk, support tickets raise it.
    let artifact = ModelArtifact::LogisticRegression(LogisticRegression {
        features: vec!["tenure_months".into(), "monthly_spend".into(), "support_tickets".into()],
        coefficients: vec![-0.08, 0.01, 0.6],
        intercept: -0.5,
        threshold: 0.5,
        classes: [0, 1],
    });

    let registry = FsModelRegistry::new(&registry_root);
    let model_path = registry.artifact_path("churn", "dev", "1");
    let model_dir = model_path.parent().context("model path has no parent")?;
    std::fs::create_dir_all(model_dir)
        .with_context(|| format!("creating {}", model_dir.display()))?;
    let body = serde_json::to_vec_pretty(&artifact).context("serializing model")?;
    std::fs::write(&model_path, body).with_context(|| format!("writing {}", model_path.display()))?;

    let mut rng = SampleRng(42);
    let n_rows = 20;
    let mut ids = Vec::with_capacity(n_rows);
    let mut tenure = Vec::with_capacity(n_rows);
    let mut spend = Vec::with_capacity(n_rows);
    let mut tickets = Vec::with_capacity(n_rows);
    for i in 0..n_rows {
        ids.push(Value::Integer(i as i64 + 1));
        tenure.push(Value::Integer(rng.range(1.0, 72.0) as i64));
        spend.push(Value::Float((rng.range(10.0, 120.0) * 100.0).round() / 100.0));
        tickets.push(Value::Integer(rng.range(0.0, 6.0) as i64));
    }

    let table = Table::from_columns(vec![
        ("customer_id", ids),
        ("tenure_months", tenure),
        ("monthly_spend", spend),
        ("support_tickets", tickets),
    ])?;
    std::fs::write(&input_path, to_csv(&table)?)
        .with_context(|| format!("writing {}", input_path.display()))?;

    println!(
        "Wrote model to {} and {} input rows to {}",
        model_path.display(),
        table.len(),
        input_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SampleRng(42);
        let mut b = SampleRng(42);
        let first: Vec<f64> = (0..16).map(|_| a.range(0.0, 1.0)).collect();
        let second: Vec<f64> = (0..16).map(|_| b.range(0.0, 1.0)).collect();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn draws_stay_in_range() {
        let mut rng = SampleRng(7);
        for _ in 0..1000 {
            let x = rng.range(1.0, 72.0);
            assert!((1.0..72.0).contains(&x), "{x}");
        }
    }
}
