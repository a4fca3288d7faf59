/// Wallet answer window for a sign-and-send request
pub const DEFAULT_SIGN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 10;
/// Authorization waits on a human approving the prompt
pub const DEFAULT_AUTHORIZE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_BLOCKHASH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_APP_NAME: &str = "Signflow";
