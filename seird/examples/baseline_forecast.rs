use seird::{forecast, Compartment, SeirdParams};

fn main() -> anyhow::Result<()> {
    // 59M population, 709 current infections, two-week horizon.
    let params = SeirdParams::new(59_000_000.0, 709.0, 0.0, 0.0, 2.3, 4.0, 14.0, 0.02, 14);

    let traj = forecast::forecast(&params)?;

    println!("day,t,S,E,I,R,D");
    for day in 0..traj.len() {
        let row = Compartment::ALL.map(|c| traj.series(c)[day]);
        println!(
            "{},{:.3},{},{},{},{},{}",
            day, traj.times[day], row[0], row[1], row[2], row[3], row[4]
        );
    }

    Ok(())
}
