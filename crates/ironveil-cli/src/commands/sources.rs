use std::path::Path;

use ironveil_core::Result;

pub fn run(config_path: Option<&Path>, json: bool) -> Result<()> {
    let ctx = super::make_context(config_path)?;
    let summaries = ctx.slow().source_summaries();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!(
        "Slow generator: {} source(s), {}-byte blocks\n",
        summaries.len(),
        ctx.slow().digest_size_bytes()
    );
    for s in &summaries {
        println!(
            "  \u{2705} {:<16} {:<12} {:<20} {}",
            s.name,
            s.category,
            s.hashers.join("+"),
            s.description
        );
    }

    let policy = ctx.fast().policy();
    println!(
        "\nFast generator: reseed soft={} hard={} blocks",
        policy.soft_threshold, policy.hard_threshold
    );
    Ok(())
}
