//! Test command implementation.
//!
//! Runs collection passes against the local host and displays results.

use qnap_node_exporter::{Exporter, Status};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Runs `iterations` collection passes and prints a summary of each.
pub async fn command_test(
    iterations: usize,
    verbose: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 QNAP Node Exporter - Test Mode");
    println!("=================================");

    let exporter = Exporter::new(config.exporter_options(), Arc::new(Status::new()));

    let environment = exporter.environment().await;
    println!("\n🖥️  Host: {}", environment.hostname);
    println!("   ├─ Devices: {}", environment.devices.join(", "));
    println!("   ├─ Interfaces: {}", environment.interfaces.join(", "));
    let mut tools: Vec<String> = environment
        .tool_paths
        .iter()
        .map(|(name, path)| format!("{}={}", name, path.display()))
        .collect();
    tools.sort();
    println!("   ├─ Tools: {}", tools.join(", "));
    println!("   └─ Producers: {}", exporter.producer_count());

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let start = Instant::now();
        let mut body = Vec::new();
        let summary = exporter.write_metrics(&mut body).await?;
        let duration = start.elapsed();

        let text = String::from_utf8_lossy(&body);
        if verbose {
            for line in text.lines() {
                println!("   │ {}", line);
            }
        } else {
            for line in text.lines().filter(|l| l.starts_with("## ")) {
                println!("   ├─ ❌ {}", line.trim_start_matches("## "));
            }
        }

        println!(
            "   ⏱️  Collection duration: {:.2}ms",
            duration.as_secs_f64() * 1000.0
        );
        println!("   📊 Metrics: {}", summary.metric_count);
        println!("   ❌ Failed producers: {}", summary.failures);
    }

    exporter.close().await;
    println!("\n✅ Test completed successfully");
    Ok(())
}
