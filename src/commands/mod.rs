//! Command handlers

pub mod auth;
mod context;
mod key;
mod token;

use std::io::{self, BufRead, Write};

/// Ask a yes/no question on stderr; anything but "y"/"yes" is a no.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{} [y/N]: ", prompt);
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
