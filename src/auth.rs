use anyhow::{Result, bail};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "SYNCWIRE_PASSWORD";

/// Reads the password used to derive the stream key.
///
/// stdin carries the payload, so it is never read for the password.
pub fn read_password() -> Result<Zeroizing<String>> {
    //  Environment variable (or .env file)
    //  SYNCWIRE_PASSWORD="supersecret" syncwire encrypt --salt ... < file
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() || io::stderr().is_terminal() {
        let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("No password provided; set {PASSWORD_ENV}")
}
