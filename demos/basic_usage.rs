use rectopt_core::{optimize_default, OptimizationSettings, Piece, RotationSet, Stock};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Cutting plan demo ===");

    let stocks = vec![Stock::new("Plywood sheet", 1220.0, 2440.0, 3)];
    let pieces = vec![
        Piece::new("Shelf", 400.0, 300.0, 6).with_rotation(RotationSet::ALL),
        Piece::new("Side panel", 600.0, 300.0, 4).with_rotation(RotationSet::ALL),
        Piece::new("Back panel", 1200.0, 600.0, 1),
    ];

    println!("Stocks: {}, piece types: {}", stocks.len(), pieces.len());

    let plan = optimize_default(stocks, pieces, OptimizationSettings::default())
        .await
        .expect("problem should validate");

    println!(
        "Placed {}/{} pieces, utilization {:.1}%, {:.2}s",
        plan.metrics.pieces_placed,
        plan.metrics.pieces_placed + plan.metrics.pieces_remaining,
        plan.metrics.utilization_percentage,
        plan.metrics.optimization_time_seconds
    );

    if !plan.warnings.is_empty() {
        println!("Warnings:");
        for warning in &plan.warnings {
            println!("  - {warning}");
        }
    }
}
