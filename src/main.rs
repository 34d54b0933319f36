use anyhow::Result;
use clap::Parser;
use specterr::logging::{self, LogTarget};

fn main() -> Result<()> {
    let cfg = specterr::config::Config::parse();
    if cfg.list_devices {
        logging::init(&cfg.log_level, LogTarget::Stderr)?;
        for name in specterr::signal::list_input_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let target = match cfg.log_file.as_deref() {
        Some(path) => LogTarget::File(path),
        None => LogTarget::Discard,
    };
    logging::init(&cfg.log_level, target)?;
    specterr::app::run(cfg)
}
