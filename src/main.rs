use clap::Parser;
use flashreport::{
    config::{CliArgs, Config},
    logging, open_backend,
    services::{AppInitializer, MockDataGenerator, MockDataOptions},
    Repositories,
};
use flashreport_core::DateRange;
use prettytable::{row, Table};
use time::OffsetDateTime;

fn main() {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    logging::init(&config.logging);

    if let Err(e) = run(&cli, &config) {
        tracing::error!(error = %e, "Flash Report failed");
        std::process::exit(1);
    }
}

fn run(cli: &CliArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(&config.storage)?;
    let repos = Repositories::new(backend.clone());

    let report = AppInitializer::new(backend, repos.clone(), &config.app.default_managing_partner_id).run();
    for warning in &report.warnings {
        eprintln!("Warning: {}", warning);
    }

    if let Some(days) = cli.mock_days {
        let options = MockDataOptions {
            days,
            ..Default::default()
        };
        let created = MockDataGenerator::new(repos.clone()).generate(&options)?;
        println!("Generated {} mock movements", created);
    }

    let today = OffsetDateTime::now_utc().date();
    let month = DateRange::between(today.replace_day(1)?, today);

    let mut table = Table::new();
    table.add_row(row!["Business unit", "Credits", "Debits", "Net", "Tickets"]);
    for unit in repos.business_units.get_all(false)? {
        let balance = repos.movements.get_balance(&unit.id, month)?;
        table.add_row(row![
            unit.name,
            r->balance.credits,
            r->balance.debits,
            r->balance.net(),
            r->balance.tickets
        ]);
    }

    println!("{}", repos.config.business_unit_name()?);
    table.printstd();
    Ok(())
}
