/// Default fuel level for WASM execution (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Minimum allowed fuel level (1 million instructions)
pub const MIN_FUEL_LEVEL: u64 = 1_000_000;
/// Maximum allowed fuel level (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;

/// Port the enclave executor listens on, inside the enclave.
pub const DEFAULT_ENCLAVE_PORT: u32 = 8080;
/// Context id of the enclave as seen from the parent instance.
pub const DEFAULT_ENCLAVE_CID: u32 = 16;
/// Client-facing relay address.
pub const DEFAULT_RELAY_LISTEN: &str = "0.0.0.0:8081";

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Program used by the external compiler.
pub const DEFAULT_WAT_COMPILER: &str = "wat2wasm";
