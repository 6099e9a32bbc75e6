use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Integration tests for `xlink repair`
///
/// Covers:
/// 1. Suffix drift is fixed and a `<file>.backup` is written first
/// 2. Repair is idempotent
/// 3. --dry-run writes nothing and exits 1 when changes are pending
/// 4. A failed backup leaves the original file untouched
/// 5. Configured suffix strategies
/// 6. References into a domain that failed to load are kept
struct TestContext {
    #[allow(dead_code)]
    temp_dir: TempDir,
    data_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path().join("data");
        fs::create_dir_all(&data_dir).expect("create data dir");
        Self { temp_dir, data_dir }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.data_dir.join(relative)
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        Command::new(assert_cmd::cargo::cargo_bin!("xlink"))
            .env_remove("XLINK_DATA_DIR")
            .env_remove("RUST_LOG")
            .arg("--data-dir")
            .arg(&self.data_dir)
            .args(args)
            .assert()
    }

    fn steel_rust(&self) {
        self.write(MATERIALS, STEEL_RUST);
        self.write(
            "contaminants/Contaminants.yaml",
            "contamination_patterns:\n  rust-contamination:\n    relationships:\n      related_materials:\n        - id: steel\n",
        );
    }
}

const MATERIALS: &str = "materials/Materials.yaml";
const STEEL_RUST: &str = "materials:\n  steel:\n    name: Steel\n    relationships:\n      related_contaminants:\n        - id: rust\n          frequency: common\n";

#[test]
fn test_repair_fixes_suffix_drift_with_backup() {
    let ctx = TestContext::new();
    ctx.steel_rust();

    ctx.run(&["repair"])
        .success()
        .stdout(predicate::str::contains("'rust' -> 'rust-contamination'"))
        .stdout(predicate::str::contains("No broken references"));

    assert_eq!(ctx.read("materials/Materials.yaml.backup"), STEEL_RUST);
    let repaired = ctx.read(MATERIALS);
    assert!(repaired.contains("id: rust-contamination"));
    assert!(repaired.contains("frequency: common"));

    ctx.run(&["validate"]).success();
}

#[test]
fn test_second_repair_is_a_no_op() {
    let ctx = TestContext::new();
    ctx.steel_rust();

    ctx.run(&["repair"]).success();
    let after_first = ctx.read(MATERIALS);

    ctx.run(&["repair"])
        .success()
        .stdout(predicate::str::contains("Nothing to repair"));
    assert_eq!(ctx.read(MATERIALS), after_first);
}

#[test]
fn test_dry_run_reports_pending_changes() {
    let ctx = TestContext::new();
    ctx.steel_rust();

    ctx.run(&["repair", "--dry-run"])
        .code(1)
        .stdout(predicate::str::contains("Would apply 1 change(s)"));

    assert_eq!(ctx.read(MATERIALS), STEEL_RUST);
    assert!(!ctx.path("materials/Materials.yaml.backup").exists());
}

#[test]
fn test_dry_run_diff() {
    let ctx = TestContext::new();
    ctx.steel_rust();

    ctx.run(&["repair", "--dry-run", "--diff"])
        .code(1)
        .stdout(predicate::str::contains("+++ b/"))
        .stdout(predicate::str::contains("rust-contamination"));
}

#[test]
fn test_dry_run_on_clean_data_exits_zero() {
    let ctx = TestContext::new();
    ctx.write(MATERIALS, "materials:\n  steel: {}\n");

    ctx.run(&["repair", "--dry-run"])
        .success()
        .stdout(predicate::str::contains("Nothing to repair"));
}

#[test]
fn test_unfixable_reference_is_removed() {
    let ctx = TestContext::new();
    ctx.write(
        MATERIALS,
        "materials:\n  steel:\n    relationships:\n      related_compounds:\n        - id: unobtainium\n",
    );
    ctx.write("compounds/Compounds.yaml", "compounds:\n  iron-oxide: {}\n");

    ctx.run(&["repair"])
        .success()
        .stdout(predicate::str::contains("remove 'unobtainium'"));
    assert!(!ctx.read(MATERIALS).contains("unobtainium"));
}

#[test]
fn test_references_into_failed_domain_survive_repair() {
    let ctx = TestContext::new();
    let materials = "materials:\n  steel:\n    relationships:\n      related_compounds:\n        - id: iron-oxide\n        - id: ozone\n";
    ctx.write(MATERIALS, materials);
    ctx.write("compounds/Compounds.yaml", "compounds: [unclosed");

    ctx.run(&["repair"])
        .success()
        .stdout(predicate::str::contains("Nothing to repair"))
        .stderr(predicate::str::contains("2 reference(s) kept, compounds did not load"));
    assert_eq!(ctx.read(MATERIALS), materials);
    assert!(!ctx.path("materials/Materials.yaml.backup").exists());
}

#[cfg(unix)]
#[test]
fn test_repair_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::new();
    ctx.steel_rust();
    fs::set_permissions(ctx.path(MATERIALS), fs::Permissions::from_mode(0o644)).unwrap();

    ctx.run(&["repair"]).success();
    let mode = fs::metadata(ctx.path(MATERIALS)).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[test]
fn test_repair_json_output() {
    let ctx = TestContext::new();
    ctx.steel_rust();

    let output = Command::new(assert_cmd::cargo::cargo_bin!("xlink"))
        .env_remove("XLINK_DATA_DIR")
        .arg("--data-dir")
        .arg(&ctx.data_dir)
        .args(["repair", "--json"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["metadata"]["command"], "repair");
    let action = &json["data"]["stats"]["actions"][0];
    assert_eq!(action["action"], "fixed");
    assert_eq!(action["original_id"], "rust");
    assert_eq!(action["replacement"], "rust-contamination");
    assert_eq!(json["data"]["before"]["has_errors"], true);
    assert_eq!(json["data"]["after"]["has_errors"], false);
}

#[test]
fn test_failed_backup_aborts_file() {
    let ctx = TestContext::new();
    ctx.steel_rust();
    // a directory in the way makes the backup copy fail
    fs::create_dir_all(ctx.path("materials/Materials.yaml.backup")).unwrap();

    ctx.run(&["repair"])
        .code(1)
        .stderr(predicate::str::contains("not repaired"));
    assert_eq!(ctx.read(MATERIALS), STEEL_RUST);
}

#[test]
fn test_domain_scope_limits_repair() {
    let ctx = TestContext::new();
    ctx.steel_rust();

    ctx.run(&["repair", "--domain", "contaminants"])
        .success()
        .stdout(predicate::str::contains("Nothing to repair"));
    assert_eq!(ctx.read(MATERIALS), STEEL_RUST);
}

#[test]
fn test_configured_suffix_strategy() {
    let ctx = TestContext::new();
    ctx.write(
        MATERIALS,
        "materials:\n  steel:\n    relationships:\n      related_compounds:\n        - id: iron-oxide\n",
    );
    ctx.write("compounds/Compounds.yaml", "compounds:\n  iron-oxide-compound: {}\n");
    ctx.write("xlink.toml", "[repair.suffixes]\ncompounds = \"-compound\"\n");

    ctx.run(&["repair"])
        .success()
        .stdout(predicate::str::contains("'iron-oxide' -> 'iron-oxide-compound'"));
}

#[test]
fn test_custom_backup_suffix() {
    let ctx = TestContext::new();
    ctx.steel_rust();
    ctx.write("xlink.toml", "[repair]\nbackup_suffix = \"orig\"\n");

    ctx.run(&["repair"]).success();
    assert!(ctx.path("materials/Materials.yaml.orig").exists());
}
