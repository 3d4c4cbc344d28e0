use anyhow::{anyhow, Context, Result};
use std::io::{self, BufRead, Write};

/// Ask the user to confirm an action, re-asking until a clear answer arrives.
/// The prompt goes to stderr so it is visible even when stdout is captured.
pub fn prompt_confirmation(reader: &mut dyn BufRead) -> Result<bool> {
    loop {
        eprint!("Continue? [y/n] ");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        let read = reader
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;
        if read == 0 {
            return Err(anyhow!(
                "Failed to read confirmation: unexpected end of input"
            ));
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "" => eprintln!("Please enter 'y' or 'n'."),
            _ => eprintln!("Invalid response. Please enter 'y' or 'n'."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prompt_confirmation_accepts_variants() -> Result<()> {
        for (input, expected) in [
            ("y\n", true),
            ("yes\n", true),
            ("Y\n", true),
            ("n\n", false),
            ("no\n", false),
            ("NO\n", false),
        ] {
            let mut reader = Cursor::new(input.as_bytes());
            assert_eq!(prompt_confirmation(&mut reader)?, expected);
        }
        Ok(())
    }

    #[test]
    fn test_prompt_confirmation_reasks_on_garbage() -> Result<()> {
        let mut reader = Cursor::new(&b"maybe\n\ny\n"[..]);
        assert!(prompt_confirmation(&mut reader)?);
        Ok(())
    }
}
