use std::path::PathBuf;

use stable_fluid::config::{FluidConfig, LoggingConfig};
use stable_fluid::core::Engine;

fn main() {
    // 先以默认级别安装日志，配置加载的警告才不会丢失
    Engine::initialize_logging(&LoggingConfig::default());

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = FluidConfig::load_or_default(path.as_deref());

    if let Err(e) = Engine::run(config) {
        eprintln!("Stable fluid stopped with an error: {}", e);
        std::process::exit(1);
    }
}
