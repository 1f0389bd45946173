//! Password command handlers.

use std::io::BufRead;

use anyhow::{Context, Result};
use layup_core::validation::{
    MAX_STRENGTH, StrengthLabel, password_strength, strength_percentage, validate_password,
    validate_password_confirmation,
};

pub fn check(password: Option<String>, confirm: Option<&str>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_stdin_line()?,
    };

    let score = password_strength(&password);
    println!(
        "Strength: {} ({score}/{MAX_STRENGTH}, {:.0}%)",
        StrengthLabel::from_score(score),
        strength_percentage(score)
    );

    let mut errors = validate_password(&password).errors;
    if let Some(confirm) = confirm {
        errors.extend(validate_password_confirmation(&password, confirm).errors);
    }

    if errors.is_empty() {
        println!("Password OK");
        return Ok(());
    }

    for error in &errors {
        println!("- {error}");
    }
    anyhow::bail!("Password rejected")
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
