use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_code-ctags"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "code-ctags init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".code-ctags.toml");
    assert!(config_path.exists(), ".code-ctags.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[map]"));
    assert!(content.contains("[tagger]"));

    // Must stay loadable by the library
    let _config: codectags_core::CtagsConfig = toml::from_str(&content).unwrap();
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".code-ctags.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_code-ctags"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn map_of_empty_repo_prints_nothing() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_code-ctags"))
        .args(["map", "--no-cache"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn map_without_ctags_lists_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".code-ctags.toml"),
        "[tagger]\nctags_bin = \"code-ctags-test-no-such-binary\"\n",
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/app.py"), "def run():\n    pass\n").unwrap();
    std::fs::write(dir.path().join("setup.py"), "run()\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_code-ctags"))
        .args(["map", "--no-cache"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "setup.py\nsrc/\n\tapp.py\n"
    );
}

#[test]
fn configured_prefix_heads_the_map() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".code-ctags.toml"),
        "[map]\nprefix = \"Repo {other}files{ctags_msg}:\\n\"\n\n\
         [tagger]\nctags_bin = \"code-ctags-test-no-such-binary\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("setup.py"), "run()\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_code-ctags"))
        .args(["map", "--no-cache"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Repo files:\nsetup.py\n"
    );
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".code-ctags.toml"),
        "[rank]\ndamping = 1.5\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_code-ctags"))
        .arg("map")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}
