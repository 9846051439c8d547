use crate::{ModelError, ServerEndpointBuilder};

/// **VALUE**: Verifies that builder validation rejects an empty host.
///
/// **WHY THIS MATTERS**: Discovery offers arrive from arbitrary peers on the
/// broadcast domain. An empty host would later produce a nonsense dial target
/// like ":9090" for the sync transport.
///
/// **BUG THIS CATCHES**: Would catch if host validation is removed and a
/// malformed offer is allowed to poison the cached endpoint.
#[test]
fn given_empty_host_when_building_endpoint_then_returns_validation_error() {
    // GIVEN: Builder with an empty host
    let builder = ServerEndpointBuilder::default().with_host("").with_port(9092);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert!(result.is_err());
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert_eq!(message, "Host cannot be empty");
        }
    }
}

/// **VALUE**: Verifies that builder validation rejects port zero.
///
/// **BUG THIS CATCHES**: Would catch if an offer with a missing/zero port field
/// slipped through and produced an unconnectable endpoint.
#[test]
fn given_zero_port_when_building_endpoint_then_returns_validation_error() {
    // GIVEN: Builder with port zero
    let builder = ServerEndpointBuilder::default()
        .with_host("10.0.0.5")
        .with_port(0);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert!(result.is_err());
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert_eq!(message, "Port must be non-zero");
        }
    }
}

/// **VALUE**: Verifies that a host already carrying a port is rejected.
///
/// **WHY THIS MATTERS**: The endpoint's `address()` appends the port itself.
/// A host of "10.0.0.5:9092" would silently become "10.0.0.5:9092:9092".
#[test]
fn given_host_with_port_when_building_endpoint_then_returns_validation_error() {
    // GIVEN: Builder whose host smuggles a port
    let builder = ServerEndpointBuilder::default()
        .with_host("10.0.0.5:9092")
        .with_port(9092);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert!(result.is_err());
}

/// **VALUE**: Verifies the happy path and the canonical Display form.
///
/// **BUG THIS CATCHES**: Would catch a Display/`address()` format drift - the
/// "host:port" form is what gets persisted and what the sync client parses.
#[test]
fn given_valid_fields_when_building_endpoint_then_displays_host_colon_port() {
    // GIVEN: Builder with valid fields
    let endpoint = ServerEndpointBuilder::default()
        .with_host("10.0.0.5")
        .with_port(9092)
        .build()
        .unwrap();

    // WHEN / THEN: Display and address agree on "host:port"
    assert_eq!(endpoint.to_string(), "10.0.0.5:9092");
    assert_eq!(endpoint.address(), "10.0.0.5:9092");
}
