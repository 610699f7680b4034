#![no_main]

use libfuzzer_sys::fuzz_target;
use greenwave::config::loader::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let loader = ConfigLoader::with_defaults();

        // Must never panic; any accepted config must be usable by the engine
        if let Ok(loaded) = loader.load_from_str(yaml_str) {
            let _ = greenwave::engine::SignalController::new(loaded.config);
        }
    }
});
