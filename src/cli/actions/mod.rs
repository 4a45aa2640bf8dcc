pub mod server;

use crate::cli::globals::ServerConfig;

#[derive(Debug)]
pub enum Action {
    Server { config: ServerConfig },
}
