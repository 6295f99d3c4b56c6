use dotenv::dotenv;

/// Loads a `.env` file if one is present next to the executable.
pub fn init() {
    _ = dotenv();
}
