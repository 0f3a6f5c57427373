use log::{info, LevelFilter};
use replica_placement::rp_interface::parse_timestamp;
use replica_placement::{
    derive_name, Dataset, Frequency, Member, Network, NetworkConfig, TimeRange, TreePolicy,
};
use simple_logger::SimpleLogger;

fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("logger already initialised: {}", e);
    }

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let frequency = Frequency::hours(1);
    let hourly = |column: &str, start: &str, end: &str| -> Result<Dataset, Box<dyn std::error::Error>> {
        let range = TimeRange::closed(parse_timestamp(start)?, parse_timestamp(end)?);
        Ok(Dataset::observed(frequency, range, &[column]))
    };

    let comfy = hourly("comfy", "1999-12-01", "2000-02-01")?;
    let nice = hourly("nice", "2000-01-01", "2000-02-01")?;
    let value = hourly("value", "2000-01-01", "2000-03-01")?;

    let mut network = Network::new(NetworkConfig {
        start_time: parse_timestamp("2000-02-01")?,
        frequency,
        policy: TreePolicy::BalancedLtoR,
        seed: None,
    });

    let members = [("comfy", comfy), ("nice", nice), ("value", value)]
        .into_iter()
        .map(|(column, data)| Member::with_data(derive_name(column.as_bytes()), data));
    network.add_members(members)?;

    info!("starting with {} members", network.len());
    println!("{}", network.tree());

    network.distribute("nice")?;
    network.tick();
    print_members(&network);

    network.distribute("nice")?;
    print_members(&network);

    Ok(())
}

fn print_members(network: &Network) {
    for member in network.members() {
        println!("{}", member);
    }
    println!();
}
