use ai2048::{config::Configuration, logging::init_logger, sim::Controller};

fn main() -> ai2048::Result<()> {
    let _logger = init_logger("info")?;

    let config = Configuration::from_env();
    let weights = config.weights()?;
    let controller = Controller::from_config(&config);

    let agent_config = config.clone();
    let results = controller.launch(move || agent_config.build_agent(weights.clone()));

    println!("games played: {}", results.games());
    println!("scores avg: {:.1}", results.mean_score());
    println!("max tile avg: {:.1}", results.mean_max_tile());
    for (tile, count) in results.max_tile_counts() {
        println!("max tile {tile: >5}: {count}");
    }
    Ok(())
}
