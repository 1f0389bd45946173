use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("layup")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("password"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_auth_help_shows_subcommands() {
    cargo_bin_cmd!("layup")
        .args(["auth", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("save"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("clear"))
        .stdout(predicate::str::contains("end-session"));
}

#[test]
fn test_save_rejects_both_expiry_flags() {
    cargo_bin_cmd!("layup")
        .args([
            "auth",
            "save",
            "--action",
            "signup",
            "--expires-in",
            "60",
            "--expires-at",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
