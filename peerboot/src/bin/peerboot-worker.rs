//! Reference worker: `peerboot-worker <worker_config> <serialized_topology> <slot_index>`.

use peerboot::exit_codes;
use peerboot::worker::{self, USAGE, WorkerArgs};

fn main() {
    peerboot::logging::init();
    let code = match WorkerArgs::parse(std::env::args().skip(1)) {
        Ok(args) => match worker::run(&args) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{:#}", err);
                exit_codes::INVALID
            }
        },
        Err(err) => {
            eprintln!("{:#}\n{USAGE}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}
