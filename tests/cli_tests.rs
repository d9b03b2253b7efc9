use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CUE: &str = "REM GENRE Classical\r\n\
PERFORMER \"Orchestra\"\r\n\
TITLE \"Symphony\"\r\n\
FILE \"disc.flac\" WAVE\r\n\
  TRACK 01 AUDIO\r\n\
    TITLE \"Allegro\"\r\n\
    INDEX 01 00:00:00\r\n\
  TRACK 02 AUDIO\r\n\
    TITLE \"Andante: cantabile\"\r\n\
    INDEX 00 03:28:00\r\n\
    INDEX 01 03:30:00\r\n\
  TRACK 03 AUDIO\r\n\
    TITLE \"Finale\"\r\n\
    INDEX 01 07:12:37\r\n";

/// Command isolated from any user configuration
fn cuesplit(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cuesplit").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("APPDATA")
        .env_remove("RUST_LOG")
        .env_remove("CUESPLIT_CONFIG");
    cmd
}

fn write_cue(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("disc.cue");
    std::fs::write(&path, CUE).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    cuesplit(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn test_inspect_prints_tracks() {
    let dir = TempDir::new().unwrap();
    let cue = write_cue(&dir);

    cuesplit(&dir)
        .arg("inspect")
        .arg(&cue)
        .assert()
        .success()
        .stdout(predicate::str::contains("Album: Symphony"))
        .stdout(predicate::str::contains("02 Andante cantabile"))
        .stdout(predicate::str::contains("00:03:42.493"))
        .stdout(predicate::str::contains("Tracks: 3"));
}

#[test]
fn test_inspect_json_boundaries() {
    let dir = TempDir::new().unwrap();
    let cue = write_cue(&dir);

    let output = cuesplit(&dir)
        .args(["inspect", "--json"])
        .arg(&cue)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tracks = json["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 3);
    assert_eq!(json["album_performer"], "Orchestra");
    assert_eq!(tracks[1]["bytes"]["start"], 210 * 176_400);
    assert_eq!(tracks[0]["seek"]["duration_ms"], 210_000);
    assert_eq!(tracks[2]["seek"]["duration_ms"], 5_507_507);
}

#[test]
fn test_extract_without_cue_sheet_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("lonely.flac"), b"").unwrap();

    cuesplit(&dir)
        .args(["extract", "lonely.flac"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cue sheet not found"));
}

#[test]
fn test_extract_walks_directories_for_images() {
    let dir = TempDir::new().unwrap();
    let library = dir.path().join("library");
    std::fs::create_dir_all(library.join("A")).unwrap();
    std::fs::create_dir_all(library.join("B")).unwrap();
    std::fs::write(library.join("A").join("one.flac"), b"").unwrap();
    std::fs::write(library.join("B").join("two.ape"), b"").unwrap();
    std::fs::write(library.join("notes.txt"), b"").unwrap();

    cuesplit(&dir)
        .args(["extract", "library", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("one.flac"))
        .stdout(predicate::str::contains("two.ape"))
        .stdout(predicate::str::contains("notes.txt").not());
}

#[test]
fn test_extract_rejects_bad_track_list() {
    let dir = TempDir::new().unwrap();
    write_cue(&dir);

    cuesplit(&dir)
        .args(["extract", "disc.flac", "-l", "1,two"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid extract options"));
}

#[test]
fn test_convert_empty_directory_succeeds() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("library")).unwrap();

    cuesplit(&dir)
        .args(["convert", "library", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reports\""));
}

#[test]
fn test_explicit_missing_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let cue = write_cue(&dir);

    cuesplit(&dir)
        .args(["--config", "absent.toml", "inspect"])
        .arg(&cue)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
