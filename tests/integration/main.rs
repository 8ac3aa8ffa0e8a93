//! Integration tests for Stoker

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn stoker() -> Command {
        cargo_bin_cmd!("stoker")
    }

    /// A command with a fully specified environment rooted in a temp dir
    fn stoker_with_env(temp: &TempDir) -> Command {
        let mut cmd = stoker();
        cmd.env("DB_HOST", "db.internal")
            .env("DB_USER", "forum")
            .env("DB_PASSWORD", "hunter2")
            .env("DB_NAME", "forum")
            .env("SESSION_SECRET", "fixed-secret")
            .env("RUNTIME_BIN", "true")
            .env("APP_DIR", temp.path().join("app"))
            .env("CONFIG_DIR", temp.path().join("config"));
        cmd
    }

    #[test]
    fn help_displays() {
        stoker()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("orchestrator"));
    }

    #[test]
    fn version_displays() {
        stoker()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stoker"));
    }

    #[test]
    #[serial]
    fn launch_without_database_settings_names_missing_key() {
        stoker()
            .env_clear()
            .arg("launch")
            .assert()
            .failure()
            .stderr(predicate::str::contains("DB_HOST"));
    }

    #[test]
    #[serial]
    fn missing_db_name_named_specifically() {
        stoker()
            .env_clear()
            .env("DB_HOST", "db")
            .env("DB_USER", "u")
            .env("DB_PASSWORD", "p")
            .arg("launch")
            .assert()
            .failure()
            .stderr(predicate::str::contains("DB_NAME"));
    }

    #[test]
    fn config_show_renders_document() {
        let temp = TempDir::new().unwrap();
        stoker_with_env(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("db.internal"))
            .stdout(predicate::str::contains("\"session_store\": \"db\""));
    }

    #[test]
    fn config_show_is_deterministic_with_supplied_secret() {
        let temp = TempDir::new().unwrap();
        let first = stoker_with_env(&temp).args(["config", "show"]).output().unwrap();
        let second = stoker_with_env(&temp).args(["config", "show"]).output().unwrap();

        assert!(first.status.success());
        assert_eq!(first.stdout, second.stdout);
    }

    #[test]
    fn config_write_creates_both_copies() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        stoker_with_env(&temp)
            .args(["config", "write"])
            .assert()
            .success();

        assert!(temp.path().join("config/config.json").is_file());
        assert!(temp.path().join("app/config.json").is_file());
    }

    #[test]
    fn preflight_reports_every_missing_precondition() {
        let temp = TempDir::new().unwrap();
        // Nothing deployed yet: config file, executable and node_modules
        // are all missing and all three must be named.
        stoker_with_env(&temp)
            .arg("preflight")
            .assert()
            .failure()
            .stdout(predicate::str::contains("configuration file missing"))
            .stdout(predicate::str::contains("executable missing"))
            .stdout(predicate::str::contains("node_modules"));
    }

    #[test]
    fn build_requires_manifest() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        stoker_with_env(&temp)
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("manifest"));
    }

    #[test]
    fn invalid_package_manager_rejected() {
        let temp = TempDir::new().unwrap();
        stoker_with_env(&temp)
            .env("PACKAGE_MANAGER", "bower")
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("PACKAGE_MANAGER"));
    }
}
