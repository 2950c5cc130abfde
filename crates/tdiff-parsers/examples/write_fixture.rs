/// Example writing a small truth tree file
///
/// The file holds one tree "T" with a "DST#G4TruthInfo" branch. Passing
/// `--perturb N` changes the momentum of one particle in record N, which
/// makes two fixtures differ from that record on.
///
/// Usage: cargo run --example write_fixture -- <output> [records] [--perturb N]
use std::env;

use tdiff_core::{Particle, Shower, TruthInfoContainer, Vertex};
use tdiff_parsers::{TreeFile, TreeFileWriter, WriterOptions};

fn make_record(event: u64, perturb: bool) -> TruthInfoContainer {
    let mut truth = TruthInfoContainer::new();

    let px = if perturb { 1.5 } else { 1.0 };
    truth.add_particle(1, Particle::new(1, 211, "pi+").with_momentum(px, 0.0, 2.0, 2.3));
    truth.add_particle(2, Particle::new(2, -211, "pi-").with_momentum(-1.0, 0.2, 1.0, 1.5));
    truth.add_vertex(1, Vertex::new(1, 0.0, 0.0, event as f64 * 0.1, 0.0));

    let mut shower = Shower::new(1, 1);
    shower.edep.insert(3, 0.25);
    shower.particle_ids.insert(1);
    truth.add_shower(1, shower);

    truth
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();

    let Some(output) = args.first() else {
        println!("Usage: cargo run --example write_fixture -- <output> [records] [--perturb N]");
        return Ok(());
    };

    let records: u64 = match args.get(1) {
        Some(n) if !n.starts_with("--") => n.parse()?,
        _ => 6,
    };

    let perturb: Option<u64> = match args.iter().position(|a| a == "--perturb") {
        Some(i) => Some(args.get(i + 1).ok_or("--perturb needs a record index")?.parse()?),
        None => None,
    };

    let mut writer = TreeFileWriter::create(output, WriterOptions::default())?;
    for event in 0..records {
        writer.fill("T", "DST#G4TruthInfo", &make_record(event, perturb == Some(event)))?;
    }
    writer.finish()?;

    // Read the file back as a quick sanity check
    let file = TreeFile::open(output)?;
    let entries = file
        .branch("T", "DST#G4TruthInfo")
        .map(|b| b.entries())
        .unwrap_or(0);

    println!("✓ Wrote {} records to {}", entries, output);
    if let Some(n) = perturb {
        println!("✓ Record {} has a perturbed particle", n);
    }

    Ok(())
}
