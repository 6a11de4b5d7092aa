use anyhow::Result;
use anyhow::bail;
use courier_core::config;
use courier_core::config::CourierConfig;

/// Validates the environment the bot would start with. A missing platform
/// credential is fatal here, before any event loop would exist.
pub fn run() -> Result<()> {
    if config::chat_token_from_env().is_none() {
        bail!("{} is not set; run the installer to create .env", config::ENV_CHAT_TOKEN);
    }

    let config = CourierConfig::from_env();
    println!("credential: present");
    println!("priority owner: {}", config.priority_owner());
    println!("first reply timeout: {:?}", config.first_reply_timeout);
    println!("poll interval: {:?}", config.poll_interval);
    println!("stability threshold: {}", config.stability_threshold);
    Ok(())
}
