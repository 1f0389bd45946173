use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_strong_password_passes() {
    cargo_bin_cmd!("layup")
        .args(["password", "check", "--password", "Abcdefghijklm12!"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Strength: Very Strong (5/5, 100%)"))
        .stdout(predicate::str::contains("Password OK"));
}

#[test]
fn test_short_password_is_rejected() {
    cargo_bin_cmd!("layup")
        .args(["password", "check", "--password", "abc"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Strength: Weak (1/5, 20%)"))
        .stdout(predicate::str::contains(
            "Password must be at least 10 characters",
        ))
        .stderr(predicate::str::contains("Password rejected"));
}

#[test]
fn test_password_from_stdin_with_mismatched_confirmation() {
    cargo_bin_cmd!("layup")
        .args(["password", "check", "--confirm", "different99"])
        .write_stdin("correcthorse9\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Passwords do not match"));
}
