#![no_main]

use dbprobe::config::{self, MapProvider, PermissiveDefaults, ProbeSettings, Strictness};
use libfuzzer_sys::fuzz_target;

const KEYS: [&str; 11] = [
    config::DB_HOST,
    config::DB_USER,
    config::DB_PASSWORD,
    config::DB_NAME,
    config::DB_PORT,
    config::DB_CONNECT_TIMEOUT,
    config::DB_SSL_KEY,
    config::DB_SSL_CERT,
    config::DB_SSL_CA,
    config::DB_SSL_MODE,
    config::DB_PROBE_MAX_ATTEMPTS,
];

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let provider: MapProvider = KEYS.iter().copied().zip(text.split('\0')).collect();

    // Must never panic, whatever the values.
    for strictness in [Strictness::Strict, Strictness::Permissive] {
        let _ = config::load_config(&provider, strictness, &PermissiveDefaults::default());
    }
    let _ = ProbeSettings::from_provider(&provider);
});
