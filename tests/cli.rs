use assert_cmd::Command;
use predicates::prelude::*;
use std::{fs, io::Read, path::Path};
use tempfile::TempDir;
use zip::ZipArchive;

const MANIFEST_TEMPLATE: &str = r#"{
  "Group": "${plugin_group}",
  "Name": "${plugin_name}",
  "Version": "${plugin_version}",
  "Description": "${plugin_description}",
  "Authors": [{ "Name": "${plugin_author}" }],
  "Website": "${plugin_website}",
  "ServerVersion": "${server_version}",
  "Main": "${plugin_main_entrypoint}",
  "MavenGroup": "${plugin_maven_group}"
}
"#;

const PROPERTIES: &str = "plugin_group=HytalesHub\n\
plugin_version=1.2.0\n\
plugin_description=Converts Minecraft regions\n\
plugin_author=Chase\n\
plugin_website=https://example.invalid\n\
server_version=*\n\
plugin_main_entrypoint=dev.chasem.hg.hubconverter.HytalesHubConverterPlugin\n";

fn hub(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hytaleshub").unwrap();
    cmd.arg("--project-dir").arg(project);
    cmd
}

fn project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("gradle.properties"), PROPERTIES).unwrap();

    let resources = root.join("src/main/resources");
    fs::create_dir_all(&resources).unwrap();
    fs::write(resources.join("manifest.json"), MANIFEST_TEMPLATE).unwrap();
    fs::write(resources.join("default-block-ids.txt"), "Rock_Stone\n").unwrap();

    let classes = root.join("build/classes/java/main/dev/chasem");
    fs::create_dir_all(&classes).unwrap();
    fs::write(classes.join("Plugin.class"), [0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
    temp_dir
}

fn read_entry(archive: &Path, name: &str) -> String {
    let mut zip = ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}

#[test]
fn version_uses_commit_sha_when_set() {
    let temp_dir = project();

    hub(temp_dir.path())
        .env("COMMIT_SHA_SHORT", "abc123")
        .arg("version")
        .assert()
        .success();

    let version = fs::read_to_string(temp_dir.path().join("version.env")).unwrap();
    assert!(version.contains("VERSION=1.2.0\n"));
    assert!(version.contains("IMPLEMENTATION_VERSION=1.2.0-abc123\n"));
}

#[test]
fn version_is_plain_without_commit_sha() {
    let temp_dir = project();

    hub(temp_dir.path())
        .env_remove("COMMIT_SHA_SHORT")
        .args(["version", "--output-file", "out/version.env"])
        .assert()
        .success();

    let version = fs::read_to_string(temp_dir.path().join("out/version.env")).unwrap();
    assert!(version.contains("IMPLEMENTATION_VERSION=1.2.0\n"));
}

#[test]
fn package_renders_manifest_and_stamps_archives() {
    let temp_dir = project();

    hub(temp_dir.path())
        .env("COMMIT_SHA_SHORT", "abc123")
        .arg("package")
        .assert()
        .success();

    let libs = temp_dir.path().join("build/libs");
    for name in [
        "HytalesHubConverter-1.2.0.jar",
        "HytalesHubConverter-1.2.0-sources.jar",
        "HytalesHubConverter-1.2.0-all.jar",
    ] {
        assert!(libs.join(name).is_file(), "missing {name}");
    }

    let bundle = libs.join("HytalesHubConverter-1.2.0-all.jar");
    let rendered = read_entry(&bundle, "manifest.json");
    assert!(!rendered.contains("${"));
    assert!(rendered.contains(r#""Name": "HytalesHubConverter""#));
    assert!(rendered.contains(r#""MavenGroup": "dev.chasem""#));

    let jar_manifest = read_entry(&bundle, "META-INF/MANIFEST.MF");
    assert!(jar_manifest.contains("Implementation-Version: 1.2.0-abc123\r\n"));
    assert!(jar_manifest.contains("Specification-Version: 1.2.0\r\n"));

    let sources = libs.join("HytalesHubConverter-1.2.0-sources.jar");
    assert!(read_entry(&sources, "manifest.json").contains("${plugin_name}"));
}

#[test]
fn template_fails_on_missing_placeholder() {
    let temp_dir = project();
    let props: String = PROPERTIES
        .lines()
        .filter(|line| !line.starts_with("plugin_author"))
        .map(|line| format!("{line}\n"))
        .collect();
    fs::write(temp_dir.path().join("gradle.properties"), props).unwrap();

    hub(temp_dir.path())
        .arg("template")
        .assert()
        .failure()
        .stderr(predicate::str::contains("plugin_author"));

    assert!(!temp_dir.path().join("build/libs").exists());
}

#[test]
fn property_flag_supplies_missing_placeholder() {
    let temp_dir = project();
    fs::write(temp_dir.path().join("gradle.properties"), "plugin_version=3.0.0\n").unwrap();

    let mut cmd = hub(temp_dir.path());
    for property in [
        "plugin_group=Hub",
        "plugin_description=desc",
        "plugin_author=Someone",
        "plugin_website=none",
        "server_version=1",
        "plugin_main_entrypoint=dev.Main",
    ] {
        cmd.args(["-P", property]);
    }
    cmd.arg("template").assert().success();

    let rendered = fs::read_to_string(
        temp_dir
            .path()
            .join("build/resources/main/manifest.json"),
    )
    .unwrap();
    assert!(rendered.contains(r#""Version": "3.0.0""#));
    assert!(rendered.contains(r#""Name": "Someone""#));
}

#[test]
fn unresolved_dependency_is_reported() {
    let temp_dir = project();
    fs::write(
        temp_dir.path().join("hytaleshub.json"),
        r#"{
            "dependencies": {
                "repositories": [{ "name": "local", "path": "repo" }],
                "declared": [{ "coordinates": "com.example:missing:1.0", "scope": "implementation" }]
            }
        }"#,
    )
    .unwrap();

    hub(temp_dir.path())
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("com.example:missing:1.0"));
}

#[test]
fn conversion_commands_handle_empty_workspace() {
    let temp_dir = project();

    hub(temp_dir.path()).arg("extract").assert().success();
    hub(temp_dir.path()).arg("map").assert().success();

    let converter_dir = temp_dir.path().join("config/HytalesHubConverter");
    assert!(!converter_dir.join("block-mapping.csv").exists());
}

#[test]
fn invalid_property_flag_is_rejected() {
    let temp_dir = project();

    hub(temp_dir.path())
        .args(["-P", "no_equals_sign", "template"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected key=value"));
}

fn seed_region_csv(project: &Path, csv: &str) -> std::path::PathBuf {
    let converter_dir = project.join("config/HytalesHubConverter");
    let regions = converter_dir.join("mc-regions");
    fs::create_dir_all(&regions).unwrap();
    fs::write(regions.join("r.0.0.csv"), csv).unwrap();
    converter_dir
}

#[test]
fn convert_then_spawn_counts_placed_blocks() {
    let temp_dir = project();
    let converter_dir = seed_region_csv(
        temp_dir.path(),
        "x,y,z,block\n1,2,3,minecraft:dirt\n4,5,6,minecraft:purpur_block\n",
    );
    fs::write(
        converter_dir.join("block-mapping.csv"),
        "minecraft_block,hytale_block,score,source\nminecraft:dirt,Soil_Dirt,1.0,manual\n",
    )
    .unwrap();

    hub(temp_dir.path()).arg("convert").assert().success();

    let converted = fs::read_to_string(
        converter_dir.join("hytale-region-csv/hytale-region-r.0.0.csv"),
    )
    .unwrap();
    assert_eq!(
        converted,
        "x,y,z,hytale_block\n1,102,3,Soil_Dirt\n4,105,6,Soil_Clay_Smooth_Grey\n"
    );

    hub(temp_dir.path())
        .args(["spawn", "--threads", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Soil_Dirt\t1"))
        .stdout(predicate::str::contains("Soil_Clay_Smooth_Grey\t1"));
}

#[test]
fn run_chains_the_whole_pipeline() {
    let temp_dir = project();
    let converter_dir = seed_region_csv(
        temp_dir.path(),
        "x,y,z,block\n0,64,0,minecraft:dirt\n0,65,0,minecraft:dirt\n",
    );

    hub(temp_dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Soil_Dirt\t2"));

    let mapping = fs::read_to_string(converter_dir.join("block-mapping.csv")).unwrap();
    assert!(mapping.contains("minecraft:dirt,Soil_Dirt,"));
    assert!(converter_dir.join("block-ids.txt").is_file());
    assert!(converter_dir
        .join("hytale-region-csv/hytale-region-r.0.0.csv")
        .is_file());
}
