//! Shared workloads and timing for the LuaGuard benchmarks

use std::time::Instant;

use serde::Serialize;

/// A synthetic Luau module with `functions` handlers
///
/// Every handler carries locals, string literals and a `[DEBUG]` print, so
/// each pass of the pipeline has work to do.
pub fn generate_script(functions: usize) -> String {
    let mut out = String::from("-- generated module\nlocal Players = game:GetService(\"Players\")\nlocal M = {}\n\n");
    for i in 0..functions {
        out.push_str(&format!(
            "function M.handler_{i}(player, amount)\n    local total = amount * {i}\n    local label = \"handler {i}\"\n    print(\"[DEBUG] handler\", {i})\n    print(label, player.Name)\n    total = total + 1\n    return total\nend\n\n"
        ));
    }
    out.push_str("return M\n");
    out
}

/// Wall-clock statistics over repeated runs
#[derive(Debug, Clone, Serialize)]
pub struct Timing {
    pub iterations: u32,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Run `f` once to warm up, then `iterations` timed times
pub fn time_runs<T>(iterations: u32, mut f: impl FnMut() -> T) -> Timing {
    std::hint::black_box(f());
    let mut times_ms = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations.max(1) {
        let start = Instant::now();
        std::hint::black_box(f());
        times_ms.push(start.elapsed().as_secs_f64() * 1000.0);
    }
    Timing {
        iterations: times_ms.len() as u32,
        mean_ms: times_ms.iter().sum::<f64>() / times_ms.len() as f64,
        min_ms: times_ms.iter().copied().fold(f64::INFINITY, f64::min),
        max_ms: times_ms.iter().copied().fold(0.0, f64::max),
    }
}
