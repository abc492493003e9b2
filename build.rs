use std::env;

fn main() {
    // Load .env file during build so deployment-specific values can be
    // embedded at compile time, with runtime env vars as fallback.
    if dotenvy::dotenv().is_err() {
        println!("cargo:warning=BUILD.RS: No .env file found. Using system environment variables.");
    }

    if let Ok(api_url) = env::var("TESTDESK_API_URL") {
        println!("cargo:rustc-env=TESTDESK_API_URL={}", api_url);
        println!("cargo:warning=Embedded TESTDESK_API_URL ({})", api_url);
    }

    tauri_build::build()
}
