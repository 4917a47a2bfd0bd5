use chrono::{TimeZone, Utc};
use demand_forecast::config::HarnessConfig;
use demand_forecast::data::DemandSeries;
use demand_forecast::frequency::Frequency;
use demand_forecast::harness::Harness;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Strategy Comparison Example");
    println!("============================================\n");

    // Three years of monthly demand with a trend and a yearly pattern
    let pattern = [
        4.0, 2.0, 6.0, 10.0, 14.0, 18.0, 20.0, 17.0, 12.0, 8.0, 5.0, 3.0,
    ];
    let values: Vec<f64> = (0..36)
        .map(|t| 100.0 + 1.5 * t as f64 + pattern[t % 12])
        .collect();
    let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let series = DemandSeries::regular(start, Frequency::monthly(), values)?.with_product("Widget");

    let harness = Harness::new(HarnessConfig::default())?;
    let report = harness.evaluate_series(&series)?;

    println!(
        "Trained on {} months, evaluated on {}\n",
        report.train_len, report.holdout_len
    );
    for record in report.ranking() {
        println!("  {:<28} RMSE {:.3}", record.strategy, record.rmse);
    }
    for (strategy, failure) in report.failures() {
        println!("  {:<28} failed: {}", strategy, failure.message);
    }

    if let Some(best) = report.best_strategy() {
        println!("\nBest strategy: {}", best.strategy);
    }

    Ok(())
}
