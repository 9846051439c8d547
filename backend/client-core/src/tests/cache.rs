// Unit tests for the endpoint cache.

use crate::cache::{load_endpoint, load_server_host, save_endpoint};
use crate::error::cache::CacheError;

use common::ServerEndpointBuilder;

/// **VALUE**: Verifies the save/load round trip.
///
/// **WHY THIS MATTERS**: The cached endpoint is the canonical address for
/// every later session; a round-trip bug silently points all transports at
/// a stale or empty host.
#[test]
fn given_saved_endpoint_when_loaded_then_round_trips() {
    // GIVEN: A temp config dir and an endpoint
    let dir = tempfile::tempdir().unwrap();
    let endpoint = ServerEndpointBuilder::default()
        .with_host("10.0.0.5")
        .with_port(9092)
        .build()
        .unwrap();

    // WHEN: Saving then loading
    save_endpoint(dir.path(), &endpoint).unwrap();
    let loaded = load_endpoint(dir.path()).unwrap();

    // THEN: Identical endpoint, and the host half loads on its own
    assert_eq!(loaded, endpoint);
    assert_eq!(load_server_host(dir.path()).unwrap(), "10.0.0.5");
}

/// **VALUE**: Verifies a missing cache reports a read error, not a panic or
/// a default endpoint.
///
/// **WHY THIS MATTERS**: The coordinator treats "no cache" as "discover
/// first"; a fabricated default like 0.0.0.0 would be dialed instead.
#[test]
fn given_empty_config_dir_when_loading_then_read_error() {
    // GIVEN: A config dir without a cache file
    let dir = tempfile::tempdir().unwrap();

    // WHEN: Loading
    let result = load_endpoint(dir.path());

    // THEN
    assert!(matches!(result, Err(CacheError::Read { .. })));
}

/// **VALUE**: Verifies corrupt cache contents report a parse error.
#[test]
fn given_corrupt_cache_file_when_loading_then_parse_error() {
    // GIVEN: A config dir with garbage in the cache file
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("server_endpoint.json"), "not json").unwrap();

    // WHEN: Loading
    let result = load_endpoint(dir.path());

    // THEN
    assert!(matches!(result, Err(CacheError::Parse { .. })));
}

/// **VALUE**: Verifies saving creates the config directory when absent.
///
/// **BUG THIS CATCHES**: First run on a fresh machine has no `~/.mangahub`;
/// a missing create_dir_all turns the very first discovery into a cache
/// write error.
#[test]
fn given_missing_config_dir_when_saving_then_directory_created() {
    // GIVEN: A nested, not-yet-existing config dir
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("deep").join("config");
    let endpoint = ServerEndpointBuilder::default()
        .with_host("192.168.1.20")
        .with_port(9091)
        .build()
        .unwrap();

    // WHEN: Saving
    save_endpoint(&nested, &endpoint).unwrap();

    // THEN: Load succeeds from the created directory
    assert_eq!(load_endpoint(&nested).unwrap(), endpoint);
}
