//! Fixed test IDs for deterministic tests
//!
//! Owner ids are canonical 36 character ids so suffixed room ids parse the
//! same way they do in production call links.

// Owner IDs
pub const TEST_OWNER_SAM: &str = "00000000-0000-0000-0000-000000000100";
pub const TEST_OWNER_RILEY: &str = "00000000-0000-0000-0000-000000000101";

// Session tokens
pub const TEST_SESSION_SAM: &str = "test-session-sam";
pub const TEST_SESSION_RILEY: &str = "test-session-riley";

// Link suffix appended to a regenerated call link
pub const TEST_LINK_SUFFIX: &str = "a1b2c3d4";

// Push subscription ids
pub const TEST_PUSH_TOKEN_1: &str = "onesignal-subscription-1";
pub const TEST_PUSH_TOKEN_2: &str = "onesignal-subscription-2";

// Address every request from the test client arrives from
pub const TEST_CLIENT_ADDRESS: &str = "127.0.0.1";
