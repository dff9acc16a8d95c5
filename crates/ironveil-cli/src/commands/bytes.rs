use std::io::Write;
use std::path::Path;

use ironveil_core::{RandomGenerator, Result};

const CHUNK: usize = 4096;

pub fn run(config_path: Option<&Path>, count: usize, generator: &str, format: &str) -> Result<()> {
    let ctx = super::make_context(config_path)?;
    let generator: &dyn RandomGenerator = match generator {
        "slow" => &**ctx.slow(),
        _ => ctx.fast(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut remaining = count;
    let mut chunk = vec![0u8; CHUNK.min(count)];

    while remaining > 0 {
        let want = remaining.min(CHUNK);
        let buf = &mut chunk[..want];
        generator.fill(buf)?;

        let written = match format {
            "raw" => out.write_all(buf),
            _ => out.write_all(super::hex(buf).as_bytes()),
        };
        if written.is_err() {
            break; // Broken pipe
        }
        remaining -= want;
    }

    if format != "raw" {
        let _ = writeln!(out);
    }
    let _ = out.flush();
    Ok(())
}
