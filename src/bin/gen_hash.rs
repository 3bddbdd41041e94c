//! Prints an Argon2 PHC string for `QUEUE_ADMIN_PASSWORD_HASH`.
//!
//! Usage: `cargo run --bin gen_hash -- <password>`

use queue_buddy::core::auth::hash_password;
use queue_buddy::errors::{Error, Result};

fn main() -> Result<()> {
    let password = std::env::args().nth(1).ok_or_else(|| Error::Config {
        message: "usage: gen_hash <password>".to_string(),
    })?;
    println!("{}", hash_password(&password)?);
    Ok(())
}
