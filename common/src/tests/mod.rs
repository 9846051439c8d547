mod endpoint_builder;
mod error_location;
mod messages;
mod redacted_token;
