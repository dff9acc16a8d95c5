use std::path::Path;
use std::time::Instant;

use ironveil_core::{QualityReport, RandomGenerator, Result, quick_quality};
use serde::Serialize;

#[derive(Serialize)]
struct BenchResult {
    generator: &'static str,
    bytes: usize,
    seconds: f64,
    mib_per_sec: f64,
    quality: QualityReport,
}

fn measure(name: &'static str, generator: &dyn RandomGenerator, bytes: usize) -> Result<BenchResult> {
    let start = Instant::now();
    let data = generator.get_bytes(bytes)?;
    let seconds = start.elapsed().as_secs_f64();
    Ok(BenchResult {
        generator: name,
        bytes,
        seconds,
        mib_per_sec: bytes as f64 / (1024.0 * 1024.0) / seconds.max(1e-9),
        quality: quick_quality(&data),
    })
}

pub fn run(config_path: Option<&Path>, bytes: usize, output_path: Option<&str>) -> Result<()> {
    let ctx = super::make_context(config_path)?;
    let slow_bytes = (bytes / 16).max(1024);

    println!(
        "Benchmarking slow ({slow_bytes} B) and fast ({bytes} B) generators over {} sources...\n",
        ctx.slow().source_count()
    );

    let results = vec![
        measure("slow", &**ctx.slow(), slow_bytes)?,
        measure("fast", ctx.fast(), bytes)?,
    ];

    println!("{}", "=".repeat(68));
    println!(
        "{:<8} {:>5} {:>8} {:>8} {:>9} {:>12}",
        "Gen", "Grade", "Shannon", "Min-H∞", "Compress", "MiB/s"
    );
    println!("{}", "-".repeat(68));
    for r in &results {
        println!(
            "{:<8} {:>5} {:>8.4} {:>8.4} {:>9.3} {:>12.2}",
            r.generator,
            r.quality.grade,
            r.quality.shannon_entropy,
            r.quality.min_entropy,
            r.quality.compression_ratio,
            r.mib_per_sec
        );
    }
    println!(
        "\nFast generator reseeds: {}   slow output total: {} B",
        ctx.fast().reseed_count(),
        ctx.slow().total_output()
    );

    if let Some(path) = output_path {
        std::fs::write(path, serde_json::to_string_pretty(&results)?)?;
        println!("Results written to {path}");
    }
    Ok(())
}
